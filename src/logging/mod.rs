use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Default directive for a `-v` count.
pub fn directive_for(verbose: u8) -> &'static str {
    match verbose {
        0 => "pagesplice=warn",
        1 => "pagesplice=info",
        _ => "pagesplice=debug",
    }
}

/// Installs the stderr subscriber. `RUST_LOG` wins over `-v` when set.
/// Calling it twice is harmless; the second install is ignored.
pub fn init_logging(verbose: u8) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(directive_for(verbose)));

    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .with(filter)
        .try_init();
}
