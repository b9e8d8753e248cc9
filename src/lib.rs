use std::sync::Arc;

pub mod app;
pub mod cli;
pub mod config;
pub mod console;
pub mod dom;
pub mod fetch;
pub mod logging;
pub mod notification;
pub mod output;
pub mod pagination;
pub mod query;
pub mod runner;

/// A document shared between the banner timer and click handlers. Locks are
/// held only for synchronous DOM work, never across a network await or timer.
pub type SharedDocument = Arc<tokio::sync::Mutex<dom::Document>>;

#[cfg(test)]
mod tests;
