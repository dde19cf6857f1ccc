use std::{fmt, sync::Arc};

use tracing::{
    field::{Field, Visit},
    Event, Level, Metadata, Subscriber,
};
use tracing_subscriber::{
    layer::{Context, SubscriberExt},
    util::SubscriberInitExt,
    Layer,
};

/// Trait representing a logger that can log messages at various levels.
///
/// This trait should be implemented by any host that wants to receive the crate's log messages,
/// e.g. to show them in a browser console or forward them to its own logging pipeline.
///
/// # Examples
///
/// Implementing the `Logger` trait:
///
/// ```rust
/// use agekit_core::logger::{Logger, LogLevel};
///
/// struct MyLogger;
///
/// impl Logger for MyLogger {
///     fn log(&self, level: LogLevel, message: String) {
///         println!("[{:?}] {}", level, message);
///     }
/// }
/// ```
pub trait Logger: Sync + Send {
    /// Logs a message at the specified log level.
    ///
    /// # Arguments
    ///
    /// * `level` - The severity level of the log message.
    /// * `message` - The log message, followed by the event's fields as `name=value`.
    fn log(&self, level: LogLevel, message: String);
}

/// Enumeration of possible log levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Designates very low priority, often extremely detailed messages.
    Trace,
    /// Designates lower priority debugging information.
    Debug,
    /// Designates informational messages that highlight the progress of the flow.
    Info,
    /// Designates potentially harmful situations.
    Warn,
    /// Designates error events that might still allow the flow to continue.
    Error,
}

impl From<Level> for LogLevel {
    fn from(level: Level) -> Self {
        match level {
            Level::ERROR => Self::Error,
            Level::WARN => Self::Warn,
            Level::INFO => Self::Info,
            Level::DEBUG => Self::Debug,
            Level::TRACE => Self::Trace,
        }
    }
}

/// A tracing layer that forwards events to a user-provided `Logger` implementation.
///
/// Debug and trace events are only forwarded when they come from this crate, so that the HTTP
/// stack does not flood the host.
struct ForeignLogger {
    logger: Arc<dyn Logger>,
}

impl<S: Subscriber> Layer<S> for ForeignLogger {
    fn enabled(&self, metadata: &Metadata<'_>, _ctx: Context<'_, S>) -> bool {
        let is_from_agekit = metadata.target().starts_with("agekit");
        let is_debug_or_trace = *metadata.level() >= Level::DEBUG;
        is_from_agekit || !is_debug_or_trace
    }

    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);
        self.logger
            .log(LogLevel::from(*event.metadata().level()), visitor.finish());
    }
}

/// Collects the `message` of an event and renders its other fields after it.
#[derive(Default)]
struct MessageVisitor {
    message: String,
    fields: Vec<String>,
}

impl MessageVisitor {
    fn finish(self) -> String {
        if self.fields.is_empty() {
            return self.message;
        }
        format!("{} {}", self.message, self.fields.join(" "))
    }
}

impl Visit for MessageVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            self.fields.push(format!("{}={value}", field.name()));
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{value:?}");
        } else {
            self.fields.push(format!("{}={value:?}", field.name()));
        }
    }
}

/// Sets the global logger.
///
/// This function installs a tracing subscriber that forwards every event of the crate to
/// `logger`. It should be called once, before the client is configured.
///
/// # Note
///
/// If a global subscriber has already been set (by a previous call or by the host), this function
/// prints a message and does nothing.
pub fn set_logger(logger: Arc<dyn Logger>) {
    let result = tracing_subscriber::registry()
        .with(ForeignLogger { logger })
        .try_init();

    if let Err(e) = result {
        eprintln!("Failed to set logger: {e}");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<(LogLevel, String)>>);

    impl Logger for Recorder {
        fn log(&self, level: LogLevel, message: String) {
            self.0.lock().unwrap().push((level, message));
        }
    }

    fn with_recorder(f: impl FnOnce()) -> Vec<(LogLevel, String)> {
        let recorder = Arc::new(Recorder::default());
        let subscriber = tracing_subscriber::registry().with(ForeignLogger {
            logger: Arc::clone(&recorder) as Arc<dyn Logger>,
        });
        tracing::subscriber::with_default(subscriber, f);
        let entries = recorder.0.lock().unwrap().clone();
        entries
    }

    #[test]
    fn test_forwards_message_and_fields() {
        let entries = with_recorder(|| {
            let url = "https://api.example/status/s1".to_string();
            tracing::warn!(%url, attempt = 2, "status check failed");
        });

        assert_eq!(
            entries,
            vec![(
                LogLevel::Warn,
                "status check failed url=https://api.example/status/s1 attempt=2".to_string()
            )]
        );
    }

    #[test]
    fn test_debug_from_other_targets_is_skipped() {
        let entries = with_recorder(|| {
            tracing::debug!(target: "hyper::proto", "flushed");
            tracing::debug!(target: "agekit_core::poller", "polling finished");
            tracing::info!(target: "hyper::proto", "connected");
        });

        assert_eq!(
            entries,
            vec![
                (LogLevel::Debug, "polling finished".to_string()),
                (LogLevel::Info, "connected".to_string()),
            ]
        );
    }
}
