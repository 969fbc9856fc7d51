//! Wire vocabulary shared by server and client.
//!
//! Frames are plain UTF-8 text; there is no envelope.  The only structure
//! is that two exact payloads are reserved commands, and that close frames
//! carry one of a few known reason strings.

pub mod close;
pub mod command;

pub use command::ReservedCommand;
