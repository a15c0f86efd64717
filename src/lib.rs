//! Headless client library for the IBM TN5250 terminal protocol.
//!
//! Opens a TN5250 session over TCP or TLS, negotiates Telnet options per
//! RFC 1205/2877/4777, decodes the 5250 data stream onto an in-memory
//! screen model, and exposes a synchronous API for driving the keyboard
//! and reading the screen back. The `workflow` module scripts a session
//! through a closed set of steps, optionally fanned out over a batch of
//! input rows.

pub mod codec;
pub mod error;
pub mod keyboard;
pub mod protocol;
pub mod screen;
pub mod session;
pub mod telnet;
pub mod workflow;

pub use error::{Error, Result};
pub use keyboard::{Key, KeyOutcome, Keyboard};
pub use screen::{Field, Oia, Screen};
pub use session::{
    open_session, ConnectionState, ListenerFn, ListenerHandle, ListenerKind, ScreenSnapshot, Session, SessionConfig,
    TlsMode,
};
pub use workflow::{run_batch, run_workflow, BatchMetrics, Workflow, WorkflowResult, WorkflowTolerances};
