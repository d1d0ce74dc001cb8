use crate::log::log_level::LogLevel;

/// Anything that can swallow a log line.
///
/// Core components hold an `Arc<dyn LogSink>` so they never care whether
/// lines end up in a file, a test buffer, or nowhere.
pub trait LogSink: Send + Sync {
    fn log(&self, level: LogLevel, msg: &str, target: &'static str);
}
