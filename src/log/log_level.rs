/// Severity of a log message, lowest to highest.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    /// Per-frame noise: header bytes, readiness wakeups.
    Trace,
    /// Dispatch decisions useful when chasing a bug.
    Debug,
    /// Connection lifecycle and other coarse progress.
    Info,
    /// Something off, but the relay can keep going.
    Warn,
    /// Failures worth reading the log file for.
    Error,
}

impl LogLevel {
    /// Fixed-width tag for log lines.
    pub fn tag(self) -> &'static str {
        match self {
            LogLevel::Trace => "TRACE",
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO ",
            LogLevel::Warn => "WARN ",
            LogLevel::Error => "ERROR",
        }
    }
}
