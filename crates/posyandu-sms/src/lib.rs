//! SMS command protocol for the Posyandu immunization registry.
//!
//! Converts inbound text messages into typed commands, applies them against
//! any [`posyandu_core::store::RegistryStore`], and renders the response
//! text. The wire format is `#`-delimited and case-insensitive:
//!
//! ```text
//! REG#NAMA_BAYI#TGL_LAHIR#NAMA_IBU#DESA    register a baby
//! LAPOR#ID_BAYI#JENIS[#DD-MM-YYYY]         health-worker completion report
//! INFO#ID_BAYI                             schedule lookup
//! HELP | BANTUAN | TOLONGAN                usage text
//! ```
//!
//! Parsing is pure ([`command::parse`]); all storage effects live in
//! [`dispatch::Dispatcher`]. No path lets a fault escape as a panic or error:
//! every inbound text terminates in a response string plus log entries.

pub mod command;
pub mod dispatch;
pub mod error;
pub mod messages;

pub use command::{Command, parse};
pub use dispatch::Dispatcher;
pub use error::ParseError;
