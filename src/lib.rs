//! tn3270r: a TN3270(E) terminal core
//!
//! The wire-level engine of a 3270 terminal: telnet option negotiation
//! with optional TLS, the 3270 data-stream interpreter over an
//! in-memory presentation space, outbound AID/read responses, and
//! IND$FILE file transfer over DDM structured fields.
//!
//! Rendering, scripting, and configuration discovery live outside this
//! crate; they drive a session through [`session::SessionController`]
//! and the presentation space snapshot API.

pub mod codec;
pub mod config;
pub mod error;
pub mod lib3270;
pub mod network;
pub mod session;
pub mod telnet;
pub mod transfer;

pub use codec::CodePage;
pub use config::SessionConfig;
pub use error::{Tn3270Error, Tn3270Result};
pub use lib3270::{AidKey, Display3270, ScreenSize};
pub use session::{ScreenSnapshot, SessionController, SessionEvent, SessionState};
pub use transfer::FileTransferState;
