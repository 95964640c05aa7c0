//! Text-protocol client for the mod-host LV2 plugin host.
//!
//! mod-host listens on a TCP socket and answers every command with a line
//! of the form `resp <status>`, where a negative status is one of its
//! documented error codes. This crate speaks that protocol synchronously;
//! the engine only talks to mod-host at startup and teardown, so there is
//! no need for anything fancier.

pub mod client;
pub mod protocol;

pub use client::ModHost;
pub use protocol::ModHostError;
