//! RustyRelay is a TCP chat relay for small groups on a local network.
//!
//! It provides two binaries:
//! - `relay_server`: a single-threaded relay that multiplexes every
//!   client over one poll loop and also serves file downloads.
//! - `relay_client`: a terminal client for chatting and fetching files.
//!
//! Clients and server speak a fixed-size-header framing protocol; the
//! whole wire format lives in [`relay::protocol`].

/// Configuration loading (INI-style files).
pub mod config;
/// Logging utilities for the whole crate.
pub mod log;
/// The relay server: protocol, connection registry, routing, files,
/// event loop.
pub mod relay;
/// Client-side library used by the terminal client binary.
pub mod relay_client;
