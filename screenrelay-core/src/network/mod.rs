pub mod client;
pub mod listener;

pub use client::RelayClient;
pub use listener::{ClientConnection, ListenEndpoint};
