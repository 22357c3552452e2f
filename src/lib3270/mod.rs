//! IBM 3270 data stream support
//!
//! The 3270 protocol is block-oriented: the host sends write commands
//! that address a shared screen buffer, and the terminal answers read
//! commands with AID-framed field data (RFC 2355, GA23-0059).
//!
//! Submodules:
//!
//! - [`codes`] - command, order, AID, WCC, attribute, and structured
//!   field constants
//! - [`field`] - field attributes and the derived field directory
//! - [`display`] - the presentation space and buffer addressing
//! - [`protocol`] - the data-stream interpreter and read responses

pub mod codes;
pub mod display;
pub mod field;
pub mod protocol;

pub use codes::{AidKey, CommandCode, OrderCode};
pub use display::{Cell, CharContext, Display3270, KeyboardState, ScreenSize};
pub use field::{Field, FieldDirectory};
pub use protocol::DataStreamProcessor;
