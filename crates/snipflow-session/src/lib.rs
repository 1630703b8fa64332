//! Interactive execution sessions.
//!
//! A client connects, sends `InitExecution` naming a stored snippet, and then
//! trades `InputRequest`/`InputResponse` messages with the running program
//! while `Output` lines stream back. The run ends with `ExecutionFinished` or
//! `Error`, after which the connection is closed.

mod error;
mod protocol;
mod registry;
mod session;

pub use error::SessionError;
pub use protocol::{ExecutionTarget, SessionMessage};
pub use registry::{SessionInfo, SessionRegistry, SessionSlot, SessionState};
pub use session::{Outbound, Session, SessionServices};
