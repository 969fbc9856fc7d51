//! wsgame-client library crate.
//!
//! A small console client for the wsgame server.  Lines typed by the user
//! are queued and transmitted one per send interval.  Text frames from the
//! server wait in a bounded buffer until they are printed.  Quitting performs
//! a bounded close handshake.
//!
//! ```text
//! stdin lines ──► ClientSession::queue ──► transmit task ──► server
//! server ──► receive task ──► bounded inbound buffer ──► ClientSession::next_message
//! ```

pub mod config;
pub mod session;

pub use config::ClientConfig;
pub use session::{ClientError, ClientSession, ClientState};
