use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use mio::Waker;
use mio::net::TcpListener;

use crate::log::{LogSink, NoopLogSink};
use crate::relay::event_loop::EventLoop;
use crate::relay::files::FileStore;
use crate::relay::server::Server;
use crate::sink_info;

/// Top-level runtime object for the relay service.
///
/// Owns the bind address, the downloads directory and the logging sink,
/// and knows how to assemble the core and its event loop. Binding is
/// the only fatal failure; everything after that is handled per
/// connection.
pub struct RelayServer {
    bind_addr: String,
    files_dir: PathBuf,
    log: Arc<dyn LogSink>,
}

impl RelayServer {
    pub fn new<S, P>(bind_addr: S, files_dir: P, log: Arc<dyn LogSink>) -> Self
    where
        S: Into<String>,
        P: Into<PathBuf>,
    {
        Self {
            bind_addr: bind_addr.into(),
            files_dir: files_dir.into(),
            log,
        }
    }

    /// Convenience: a relay that logs nowhere. Good for tests.
    pub fn no_log<S, P>(bind_addr: S, files_dir: P) -> Self
    where
        S: Into<String>,
        P: Into<PathBuf>,
    {
        Self::new(bind_addr, files_dir, Arc::new(NoopLogSink))
    }

    /// Bind the listener and wire up the loop, without blocking yet.
    ///
    /// Returns the runner (call [`RelayRunner::run`] to serve) and a
    /// cloneable handle that stops it from any thread.
    pub fn start(self) -> io::Result<(RelayRunner, ShutdownHandle)> {
        let Self {
            bind_addr,
            files_dir,
            log,
        } = self;

        let addr: SocketAddr = bind_addr.parse().map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("bad bind address {bind_addr}: {e}"),
            )
        })?;
        let listener = TcpListener::bind(addr)?;

        let files = FileStore::new(files_dir);
        sink_info!(log, "serving files from {}", files.dir().display());

        let server = Server::with_log(files, log.clone());
        let shutdown = Arc::new(AtomicBool::new(false));
        let (event_loop, waker) = EventLoop::new(listener, server, shutdown.clone(), log.clone())?;

        sink_info!(log, "relay listening on {}", event_loop.local_addr()?);

        Ok((
            RelayRunner { event_loop },
            ShutdownHandle {
                waker: Arc::new(waker),
                shutdown,
            },
        ))
    }
}

/// The bound, not-yet-running relay.
pub struct RelayRunner {
    event_loop: EventLoop,
}

impl RelayRunner {
    /// Actual bound address; useful when binding to port 0.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.event_loop.local_addr()
    }

    /// Serve until a [`ShutdownHandle`] says stop.
    pub fn run(mut self) -> io::Result<()> {
        self.event_loop.run()
    }
}

/// Stops a running relay from any thread. Cloneable, idempotent.
#[derive(Clone)]
pub struct ShutdownHandle {
    waker: Arc<Waker>,
    shutdown: Arc<AtomicBool>,
}

impl ShutdownHandle {
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
        // The loop may already be gone; nothing useful to do then.
        let _ = self.waker.wake();
    }
}
