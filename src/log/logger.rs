use crate::{
    config::{Config, expand_path},
    log::{log_msg::LogMsg, logger_handle::LoggerHandle},
};

use std::{
    fs::{self, OpenOptions},
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
    sync::{Arc, mpsc},
    thread,
    time::{SystemTime, UNIX_EPOCH},
};

// -----------------------------------------------------------------------------
// COMPILE-TIME CONFIGURATION
// -----------------------------------------------------------------------------

/// Flush to disk every 100 lines if debugging/tracing (to see crashes near real-time).
#[cfg(feature = "log-debug")]
const FLUSH_BATCH_SIZE: u32 = 100;

/// Flush to disk every 1000 lines in production/default (to save I/O & CPU).
#[cfg(not(feature = "log-debug"))]
const FLUSH_BATCH_SIZE: u32 = 1_000;

// -----------------------------------------------------------------------------

/// Bounded, non-blocking logger writing to a per-process log file.
///
/// Producers call [`try_log`](Self::try_log) (or go through a
/// [`LoggerHandle`]); a dedicated background thread consumes the bounded
/// channel, writes lines to disk and flushes every `FLUSH_BATCH_SIZE`
/// lines. Nothing in here ever panics: if the log file cannot be opened
/// the worker falls back to a temp file, and failing that to
/// `io::sink()`.
pub struct Logger {
    handle: LoggerHandle,
    _thread: Option<thread::JoinHandle<()>>,
    file_path: PathBuf,
}

impl Logger {
    /// Start the logger for the client binary, resolving the filename
    /// prefix and directory from `[logging] client_log_filename` /
    /// `client_log_path`.
    #[must_use]
    pub fn start_client(cap: usize, config: Arc<Config>) -> Self {
        Self::start("client_log_filename", "client_log_path", cap, config)
    }

    /// Start the logger for the server binary, resolving the filename
    /// prefix and directory from `[logging] server_log_filename` /
    /// `server_log_path`.
    #[must_use]
    pub fn start_server(cap: usize, config: Arc<Config>) -> Self {
        Self::start("server_log_filename", "server_log_path", cap, config)
    }

    #[must_use]
    fn start(fn_key: &str, path_key: &str, cap: usize, config: Arc<Config>) -> Self {
        let app_name = config.get_non_empty("logging", fn_key);

        if let Some(dir_str) = config.get_non_empty("logging", path_key) {
            let dir = expand_path(dir_str);
            Self::start_in_dir(dir, app_name, cap)
        } else {
            Self::start_default(app_name, cap)
        }
    }

    /// Create a `logs/` directory next to the executable and start the
    /// logger there.
    ///
    /// # Example Filename
    /// `target/debug/logs/relay_server-20260825_023045-pid1234.log`
    #[must_use]
    pub fn start_default(app_name: Option<&str>, cap: usize) -> Self {
        let base = exe_dir_fallback_cwd().join("logs");
        Self::start_in_dir(base, app_name, cap)
    }

    /// Start the logger in a specific directory.
    ///
    /// Creates the directory if missing, derives a unique filename from
    /// the timestamp and process ID, then spawns the writer thread.
    pub fn start_in_dir<D: AsRef<Path>>(dir: D, app_name: Option<&str>, cap: usize) -> Self {
        let dir = dir.as_ref().to_path_buf();
        let _ = fs::create_dir_all(&dir);

        let ts = timestamp_for_filename();
        let pid = std::process::id();

        let fname = if let Some(name) = app_name {
            format!("{}-{}-pid{}.log", name, ts, pid)
        } else {
            format!("{}-pid{}.log", ts, pid)
        };

        let file_path = dir.join(&fname);

        let (tx, rx) = mpsc::sync_channel::<LogMsg>(cap);
        let handle = LoggerHandle { tx };

        let file_path_clone = file_path.clone();

        let _thread = thread::Builder::new()
            .name("logger-worker".into())
            .spawn(move || {
                // Try target file -> temp file -> sink (never panic).
                let writer: Box<dyn Write + Send> = if let Ok(f) = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&file_path_clone)
                {
                    Box::new(f)
                } else {
                    let fallback = std::env::temp_dir().join("rustyrelay-fallback.log");
                    match OpenOptions::new().create(true).append(true).open(&fallback) {
                        Ok(f) => Box::new(f),
                        Err(_) => Box::new(io::sink()),
                    }
                };

                let mut out: BufWriter<Box<dyn Write + Send>> = BufWriter::new(writer);
                let mut lines_written: u32 = 0;

                while let Ok(m) = rx.recv() {
                    let _ = writeln!(
                        &mut out,
                        "[{}] {} {} | {}",
                        m.level.tag(),
                        m.ts_ms,
                        m.target,
                        m.text
                    );
                    lines_written = lines_written.wrapping_add(1);

                    // Flush periodically so a crash loses little.
                    if lines_written.is_multiple_of(FLUSH_BATCH_SIZE) {
                        let _ = out.flush();
                    }
                }

                let _ = out.flush();
            })
            .ok();

        Self {
            handle,
            _thread,
            file_path,
        }
    }

    /// Enqueue a log message without blocking; a full queue drops it.
    ///
    /// # Errors
    /// The [`mpsc::TrySendError`] from the bounded channel when the
    /// queue is full or the writer thread is gone.
    pub fn try_log<S: Into<String>>(
        &self,
        level: crate::log::log_level::LogLevel,
        text: S,
        target: &'static str,
    ) -> Result<(), mpsc::TrySendError<LogMsg>> {
        self.handle.try_log(level, text, target)
    }

    /// Cloneable handle for handing the logging capability to other
    /// components without giving up the `Logger` itself.
    #[must_use]
    pub fn handle(&self) -> LoggerHandle {
        self.handle.clone()
    }

    /// Path of the active log file, for telling the user where to look.
    #[must_use]
    pub fn file_path(&self) -> &Path {
        &self.file_path
    }
}

/// Directory of the running executable (target/{debug,release}), or the
/// current working directory when that cannot be determined.
fn exe_dir_fallback_cwd() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
}

/// Human-readable timestamp for filenames, no external dependencies.
///
/// Output format: `YYYYMMDD_HHMMSS` (e.g., `20260825_023045`)
fn timestamp_for_filename() -> String {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();

    unix_to_utc(secs).map_or_else(
        |_| format!("unix_{secs}"), // graceful fallback, never panics
        |tm| {
            format!(
                "{:04}{:02}{:02}_{:02}{:02}{:02}",
                tm.year, tm.mon, tm.day, tm.hour, tm.min, tm.sec
            )
        },
    )
}

#[derive(Clone, Copy, Debug)]
struct SimpleUtc {
    year: i32,
    mon: u32,
    day: u32,
    hour: u32,
    min: u32,
    sec: u32,
}

#[derive(Debug)]
enum UtcConvError {
    Year,
    Month,
    Day,
}

/// Minimal UNIX-to-Gregorian conversion to avoid importing `chrono`.
///
/// # Errors
///
/// Returns a [`UtcConvError`] naming the component that did not fit its
/// integer type; with sane clocks this cannot happen.
#[allow(clippy::missing_const_for_fn, clippy::many_single_char_names)]
fn unix_to_utc(mut s: u64) -> Result<SimpleUtc, UtcConvError> {
    use std::convert::TryFrom;

    let sec = (s % 60) as u32;
    s /= 60;
    let min = (s % 60) as u32;
    s /= 60;
    let hour = (s % 24) as u32;
    s /= 24;

    // i128 keeps the intermediate day arithmetic overflow-free.
    let z: i128 = i128::from(s) + 719_468;

    let era = (if z >= 0 { z } else { z - 146_096 }) / 146_097;
    let doe = z - era * 146_097; // [0, 146096]
    let yoe = (doe - doe / 1_460 + doe / 36_524 - doe / 146_096) / 365;
    let y = yoe + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100); // [0, 365]
    let mp = (5 * doy + 2) / 153; // [0, 11]
    let d = doy - (153 * mp + 2) / 5 + 1; // [1, 31]
    let m = mp + if mp < 10 { 3 } else { -9 }; // [1, 12]

    let year_i = y + i128::from(m <= 2);

    let year = i32::try_from(year_i).map_err(|_| UtcConvError::Year)?;
    let mon = u32::try_from(m).map_err(|_| UtcConvError::Month)?;
    let day = u32::try_from(d).map_err(|_| UtcConvError::Day)?;

    Ok(SimpleUtc {
        year,
        mon,
        day,
        hour,
        min,
        sec,
    })
}
