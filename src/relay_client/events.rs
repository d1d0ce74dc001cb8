use std::path::PathBuf;

/// What the reader thread reports to the terminal loop.
#[derive(Debug)]
pub enum ClientEvent {
    /// Chat text relayed from another user.
    Message { sender: Option<String>, text: String },
    /// Server notice: welcomes, joins, departures.
    Announcement(String),
    /// The files the server currently offers.
    FileList(Vec<String>),
    /// A download finished; `path` is where it was saved.
    Downloaded { filename: String, path: PathBuf },
    /// The server connection is gone; time to exit.
    Disconnected,
}
