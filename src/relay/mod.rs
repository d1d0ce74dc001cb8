pub mod event_loop;
pub mod files;
pub mod protocol;
pub mod registry;
pub mod router;
pub mod run;
pub mod server;
pub mod types;

pub use run::{RelayRunner, RelayServer, ShutdownHandle};
