pub mod client;
pub mod errors;
pub mod events;

pub use client::{ClaimResult, PendingClient, RelayClient};
pub use errors::ClientError;
pub use events::ClientEvent;
