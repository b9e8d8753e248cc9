use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::dom::{Document, DomError, Selector};
use crate::SharedDocument;

pub const DEFAULT_DISMISS_DELAY: Duration = Duration::from_millis(2000);
pub const DEFAULT_SUCCESS_CLASS: &str = "alert-success";

/// Hides success banners once the reader has had time to see them.
///
/// The banner set is sampled when the delay expires, not when the timer is
/// armed; banners inserted afterwards are left alone.
#[derive(Clone, Debug)]
pub struct NotificationDismisser {
    delay: Duration,
    selector: Selector,
}

impl Default for NotificationDismisser {
    fn default() -> Self {
        Self {
            delay: DEFAULT_DISMISS_DELAY,
            selector: Selector::for_class(DEFAULT_SUCCESS_CLASS),
        }
    }
}

impl NotificationDismisser {
    pub fn new(delay: Duration, marker_class: &str) -> Result<Self, DomError> {
        Ok(Self {
            delay,
            selector: Selector::class(marker_class)?,
        })
    }

    /// Hides every banner currently in `doc`. Returns how many were matched.
    pub fn hide_now(&self, doc: &mut Document) -> usize {
        let banners = doc.query_selector_all(&self.selector);
        for banner in banners.iter() {
            // Matched nodes are elements, so neither call can fail.
            let _ = doc.set_style(*banner, "opacity", "0");
            let _ = doc.set_style(*banner, "display", "none");
        }
        banners.len()
    }

    pub async fn run(&self, doc: &SharedDocument) -> usize {
        debug!(
            event = "notification.timer_armed",
            delay_ms = self.delay.as_millis() as u64
        );
        tokio::time::sleep(self.delay).await;
        let hidden = {
            let mut doc = doc.lock().await;
            self.hide_now(&mut doc)
        };
        info!(
            event = "notification.dismissed",
            selector = %self.selector,
            count = hidden
        );
        hidden
    }

    /// Arms the timer on the runtime. Aborting or dropping the runtime before
    /// it fires leaves the document untouched.
    pub fn spawn(self, doc: SharedDocument) -> JoinHandle<usize> {
        tokio::spawn(async move { self.run(&doc).await })
    }
}
