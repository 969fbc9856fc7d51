//! Infrastructure layer for wsgame-server.
//!
//! Everything that touches sockets, tasks or timers lives here.
//!
//! # Modules
//!
//! | Module       | Responsibility                                            |
//! |--------------|-----------------------------------------------------------|
//! | `connection` | One socket: write half, outbound queue, lifecycle, scopes |
//! | `registry`   | Id → connection map, draining flag, id allocation         |
//! | `broadcast`  | Fan-out of one message to every outbound queue            |
//! | `session`    | Per-connection receive and send loops, teardown           |
//! | `shutdown`   | Bounded, run-once drain of every connection               |
//! | `ws_server`  | Accept loop and HTTP upgrade                              |

pub mod broadcast;
pub mod connection;
pub mod registry;
pub mod session;
pub mod shutdown;
pub mod ws_server;

pub use broadcast::{BroadcastBus, BroadcastReport};
pub use connection::{Connection, EnqueueError, FrameSink, FrameStream, OutboundQueue, SessionError};
pub use registry::{ConnectionRegistry, RegistryError};
pub use session::{ReceiveExit, Session, SessionContext};
pub use shutdown::{ShutdownCoordinator, ShutdownReport};
pub use ws_server::{Server, ServerHandle};
