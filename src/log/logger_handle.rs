use std::sync::mpsc;

use crate::log::{log_level::LogLevel, log_msg::LogMsg, log_sink::LogSink, now_millis};

/// Cloneable producer handle to the process logger.
///
/// A thin wrapper around a bounded `SyncSender`: enqueueing never
/// blocks, and a full queue drops the message instead of stalling the
/// event loop. Obtain one from [`Logger::handle`](crate::log::Logger::handle)
/// and clone it per component.
#[derive(Clone)]
pub struct LoggerHandle {
    pub(super) tx: mpsc::SyncSender<LogMsg>,
}

impl LogSink for LoggerHandle {
    #[inline]
    fn log(&self, level: LogLevel, msg: &str, target: &'static str) {
        let _ = self.try_log(level, msg, target);
    }
}

impl LoggerHandle {
    /// Enqueue a log message without blocking.
    ///
    /// The message is stamped with the current wall-clock time.
    ///
    /// # Errors
    /// - `TrySendError::Full` when the bounded queue is at capacity; the
    ///   message is dropped.
    /// - `TrySendError::Disconnected` when the writer thread is gone.
    pub fn try_log<S: Into<String>>(
        &self,
        level: LogLevel,
        text: S,
        target: &'static str,
    ) -> Result<(), mpsc::TrySendError<LogMsg>> {
        let msg = LogMsg {
            level,
            ts_ms: now_millis(),
            text: text.into(),
            target,
        };
        self.tx.try_send(msg)
    }
}
