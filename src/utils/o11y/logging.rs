//! Logging setup and helpers for reporting errors through `tracing`.
use std::fmt::Write as _;

use tracing::Subscriber;
use tracing_subscriber::{fmt::format::FmtSpan, layer::SubscriberExt, EnvFilter, Layer};

/// The error type returned when building a subscriber.
#[derive(Debug, thiserror::Error)]
pub enum BuildSubscriberError {
    #[error("failed to parse filtering directive")]
    Parse(#[from] tracing_subscriber::filter::ParseError),
}

/// Build a tracing subscriber.
///
/// Events are written to stderr, stdout belongs to the consumer's output.
/// The level is taken from `RUST_LOG` and defaults to `info`.
pub fn build_subscriber() -> Result<impl Subscriber, BuildSubscriberError> {
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(FmtSpan::CLOSE);
    let env_filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("info"))?;
    Ok(tracing_subscriber::registry().with(fmt_layer.with_filter(env_filter)))
}

/// Render the chain of sources below `error`, outermost first, separated by
/// `": "`. Returns an empty string when the error has no source.
pub fn source_chain(error: &dyn std::error::Error) -> String {
    let mut chain = String::new();
    let mut source = error.source();
    while let Some(inner) = source {
        if !chain.is_empty() {
            chain.push_str(": ");
        }
        let _ = write!(chain, "{}", inner);
        source = inner.source();
    }
    chain
}

/// Log an error value at the ERROR level, including its source chain.
///
/// ```ignore
/// log_error!(error);
/// log_error!(error, "failed to create topic {}", name);
/// ```
#[macro_export]
macro_rules! log_error {
    ($error:expr) => {{
        let error: &dyn ::std::error::Error = &$error;
        ::tracing::error!(
            error.message = %error,
            error.sources = %$crate::utils::o11y::logging::source_chain(error)
        );
    }};
    ($error:expr, $($arg:tt)+) => {{
        let error: &dyn ::std::error::Error = &$error;
        ::tracing::error!(
            error.message = %error,
            error.sources = %$crate::utils::o11y::logging::source_chain(error),
            $($arg)+
        );
    }};
}

/// Build a closure that logs its error argument, for use with
/// `Result::inspect_err`.
///
/// ```ignore
/// admin.create_topic(&spec).await.inspect_err(as_error!("failed to create topic"))?;
/// ```
#[macro_export]
macro_rules! as_error {
    () => {
        |error| $crate::log_error!(error)
    };
    ($($arg:tt)+) => {
        |error| $crate::log_error!(error, $($arg)+)
    };
}

pub use crate::{as_error, log_error};
