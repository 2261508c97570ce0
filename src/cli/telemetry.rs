use anyhow::Result;
use tracing_subscriber::{EnvFilter, Registry, fmt, layer::SubscriberExt};

/// Initialize the tracing subscriber.
///
/// An explicit verbosity wins; otherwise `RUST_LOG` applies, defaulting to
/// errors only.
///
/// # Errors
/// Returns an error if a subscriber was already installed.
pub fn init(level: Option<tracing::Level>) -> Result<()> {
    let filter = match level {
        Some(level) => EnvFilter::default().add_directive(level.into()),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("error")),
    };

    let subscriber = Registry::default().with(filter).with(fmt::layer());
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}
