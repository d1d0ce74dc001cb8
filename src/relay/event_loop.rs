//! Readiness-multiplexed socket loop.
//!
//! One thread, one `mio::Poll`, three token classes: the listener, the
//! shutdown waker, and one token per connection. The loop owns every
//! socket; the [`Server`] core never sees one.

use std::collections::{HashMap, VecDeque};
use std::io::{self, Write};
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use bytes::Bytes;
use mio::net::{TcpListener, TcpStream};
use mio::{Events, Interest, Poll, Token, Waker};

use crate::log::LogSink;
use crate::relay::protocol::{FrameError, FrameProgress, FrameReader, encode_packet};
use crate::relay::server::Server;
use crate::relay::types::ConnId;
use crate::{sink_debug, sink_error, sink_info, sink_trace, sink_warn};

/// Poll token of the listening socket.
const LISTENER: Token = Token(0);
/// Poll token of the shutdown waker.
const WAKER: Token = Token(1);
/// Connection ids start above the reserved tokens and never wrap.
const FIRST_CONN_ID: ConnId = 2;

const EVENTS_CAPACITY: usize = 256;

/// One accepted socket plus its frame assembly and write state.
struct Conn {
    stream: TcpStream,
    reader: FrameReader,
    write_queue: VecDeque<Bytes>,
    write_pos: usize,
    /// Whether the stream is currently registered for writable events.
    write_interest: bool,
}

impl Conn {
    fn new(stream: TcpStream) -> Self {
        Self {
            stream,
            reader: FrameReader::new(),
            write_queue: VecDeque::new(),
            write_pos: 0,
            write_interest: false,
        }
    }

    /// Write queued frames until done or the socket pushes back.
    ///
    /// Ok(true) means the queue is empty.
    fn flush(&mut self) -> io::Result<bool> {
        while let Some(front) = self.write_queue.front() {
            while self.write_pos < front.len() {
                match self.stream.write(&front[self.write_pos..]) {
                    Ok(0) => {
                        return Err(io::Error::new(
                            io::ErrorKind::WriteZero,
                            "socket accepted no bytes",
                        ));
                    }
                    Ok(n) => self.write_pos += n,
                    Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(false),
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                    Err(e) => return Err(e),
                }
            }
            self.write_queue.pop_front();
            self.write_pos = 0;
        }
        Ok(true)
    }
}

pub struct EventLoop {
    poll: Poll,
    events: Events,
    listener: TcpListener,
    conns: HashMap<ConnId, Conn>,
    next_conn_id: ConnId,
    server: Server,
    shutdown: Arc<AtomicBool>,
    log: Arc<dyn LogSink>,
}

impl EventLoop {
    /// Set up polling around an already-bound listener.
    ///
    /// The returned [`Waker`] is the only way to interrupt [`run`]
    /// from another thread.
    ///
    /// [`run`]: Self::run
    pub fn new(
        mut listener: TcpListener,
        server: Server,
        shutdown: Arc<AtomicBool>,
        log: Arc<dyn LogSink>,
    ) -> io::Result<(Self, Waker)> {
        let poll = Poll::new()?;
        let waker = Waker::new(poll.registry(), WAKER)?;
        poll.registry()
            .register(&mut listener, LISTENER, Interest::READABLE)?;

        Ok((
            Self {
                poll,
                events: Events::with_capacity(EVENTS_CAPACITY),
                listener,
                conns: HashMap::new(),
                next_conn_id: FIRST_CONN_ID,
                server,
                shutdown,
                log,
            },
            waker,
        ))
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Block on readiness events until shutdown is requested.
    ///
    /// Every complete inbound frame is dispatched and its responses are
    /// flushed before the next buffered frame is taken, so one chatty
    /// client cannot starve the rest of a poll cycle.
    pub fn run(&mut self) -> io::Result<()> {
        loop {
            match self.poll.poll(&mut self.events, None) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }

            // Copy the batch out so handlers may borrow self freely.
            let ready: Vec<(Token, bool, bool)> = self
                .events
                .iter()
                .map(|ev| (ev.token(), ev.is_readable(), ev.is_writable()))
                .collect();

            for (token, readable, writable) in ready {
                match token {
                    LISTENER => self.accept_new_conns(),
                    WAKER => {
                        if self.shutdown.load(Ordering::SeqCst) {
                            sink_info!(
                                self.log,
                                "shutdown requested, dropping {} connection(s)",
                                self.conns.len()
                            );
                            self.close_all();
                            return Ok(());
                        }
                    }
                    Token(value) => {
                        self.handle_conn_event(value as ConnId, readable, writable);
                    }
                }
            }
        }
    }

    fn accept_new_conns(&mut self) {
        loop {
            match self.listener.accept() {
                Ok((stream, addr)) => {
                    if let Err(e) = self.admit_conn(stream, addr) {
                        sink_error!(self.log, "failed to admit conn from {}: {}", addr, e);
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    sink_error!(self.log, "accept failed: {}", e);
                    break;
                }
            }
        }
    }

    fn admit_conn(&mut self, mut stream: TcpStream, addr: SocketAddr) -> io::Result<()> {
        let conn_id = self.next_conn_id;
        self.next_conn_id += 1;

        self.poll.registry().register(
            &mut stream,
            Token(conn_id as usize),
            Interest::READABLE,
        )?;

        self.conns.insert(conn_id, Conn::new(stream));
        self.server.handle_connect(conn_id, addr);
        Ok(())
    }

    fn handle_conn_event(&mut self, conn_id: ConnId, readable: bool, writable: bool) {
        if !self.conns.contains_key(&conn_id) {
            // Stale event for a connection closed earlier in this batch.
            return;
        }

        if writable && !self.flush_conn_queue(conn_id) {
            return;
        }
        if readable {
            self.read_conn(conn_id);
        }
    }

    /// Drain the socket, dispatching each complete frame as it lands.
    fn read_conn(&mut self, conn_id: ConnId) {
        loop {
            let progress = {
                let Some(conn) = self.conns.get_mut(&conn_id) else {
                    return;
                };
                conn.reader.read_frame(&mut conn.stream)
            };

            match progress {
                Ok(FrameProgress::Frame(packet)) => {
                    sink_trace!(self.log, "conn {} -> {}", conn_id, packet.name());
                    self.server.handle(conn_id, packet);
                    self.dispatch_outgoing();
                    if !self.conns.contains_key(&conn_id) {
                        return;
                    }
                }
                Ok(FrameProgress::WouldBlock) => return,
                Ok(FrameProgress::Closed) => {
                    sink_info!(self.log, "conn {} closed by peer", conn_id);
                    self.close_conn(conn_id);
                    return;
                }
                Err(FrameError::Io(e)) => {
                    sink_warn!(self.log, "conn {} read error: {}", conn_id, e);
                    self.close_conn(conn_id);
                    return;
                }
                Err(FrameError::Proto(e)) => {
                    sink_warn!(self.log, "conn {} protocol error: {:?}", conn_id, e);
                    self.close_conn(conn_id);
                    return;
                }
            }
        }
    }

    /// Encode and queue everything the server wants sent, then try to
    /// flush the affected connections right away.
    fn dispatch_outgoing(&mut self) {
        let outgoing = self.server.drain_outgoing();
        let mut touched: Vec<ConnId> = Vec::new();

        for out in outgoing {
            let conn_id = out.conn_id_target;
            match encode_packet(&out.packet) {
                Ok(frame) => {
                    let Some(conn) = self.conns.get_mut(&conn_id) else {
                        sink_debug!(
                            self.log,
                            "dropping {} for vanished conn {}",
                            out.packet.name(),
                            conn_id
                        );
                        continue;
                    };
                    conn.write_queue.push_back(Bytes::from(frame));
                    if !touched.contains(&conn_id) {
                        touched.push(conn_id);
                    }
                }
                Err(e) => {
                    sink_error!(
                        self.log,
                        "failed to encode {} for conn {}: {:?}",
                        out.packet.name(),
                        conn_id,
                        e
                    );
                }
            }
        }

        for conn_id in touched {
            self.flush_conn_queue(conn_id);
        }
    }

    /// Flush one connection's queue as far as the socket allows.
    ///
    /// Keeps the poll registration honest: writable interest is held
    /// only while bytes are left over. Returns false when the flush
    /// killed the connection.
    fn flush_conn_queue(&mut self, conn_id: ConnId) -> bool {
        let flush_result = match self.conns.get_mut(&conn_id) {
            Some(conn) => conn.flush(),
            None => return false,
        };

        match flush_result {
            Ok(drained) => {
                if let Err(e) = self.update_write_interest(conn_id, !drained) {
                    sink_error!(self.log, "conn {} reregister failed: {}", conn_id, e);
                    self.close_conn(conn_id);
                    return false;
                }
                true
            }
            Err(e) => {
                sink_warn!(self.log, "conn {} write error: {}", conn_id, e);
                self.close_conn(conn_id);
                false
            }
        }
    }

    fn update_write_interest(&mut self, conn_id: ConnId, want_write: bool) -> io::Result<()> {
        let Some(conn) = self.conns.get_mut(&conn_id) else {
            return Ok(());
        };
        if conn.write_interest == want_write {
            return Ok(());
        }
        let interest = if want_write {
            Interest::READABLE | Interest::WRITABLE
        } else {
            Interest::READABLE
        };
        self.poll
            .registry()
            .reregister(&mut conn.stream, Token(conn_id as usize), interest)?;
        conn.write_interest = want_write;
        Ok(())
    }

    /// Single close path for every way a connection can die.
    fn close_conn(&mut self, conn_id: ConnId) {
        let Some(mut conn) = self.conns.remove(&conn_id) else {
            return;
        };
        // The registration dies with the socket either way.
        let _ = self.poll.registry().deregister(&mut conn.stream);
        // Dropping the stream closes the socket exactly once.
        drop(conn);

        self.server.handle_disconnect(conn_id);
        // Departure announcements, if any, go to the remaining clients.
        self.dispatch_outgoing();
    }

    /// Drop every client socket without ceremony. Queued writes are
    /// abandoned.
    fn close_all(&mut self) {
        let conn_ids: Vec<ConnId> = self.conns.keys().copied().collect();
        for conn_id in conn_ids {
            if let Some(mut conn) = self.conns.remove(&conn_id) {
                let _ = self.poll.registry().deregister(&mut conn.stream);
            }
        }
    }
}
