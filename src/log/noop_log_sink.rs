use crate::log::{log_level::LogLevel, log_sink::LogSink};

/// Sink that discards everything. The default for tests.
#[derive(Debug, Clone, Default)]
pub struct NoopLogSink;

impl LogSink for NoopLogSink {
    #[inline]
    fn log(&self, _level: LogLevel, _msg: &str, _target: &'static str) {}
}
