//! Shared foundation types for the TML compiler.
//!
//! Every other crate in the workspace depends on this one. It provides:
//!
//! - [`span`]: byte-offset source spans and the on-demand line index
//! - [`diag`]: diagnostics with stable short codes (`T057`, `C019`, ...),
//!   accumulation, and terminal rendering
//! - [`explain`]: the canonical paragraph catalog behind `tml explain <code>`

pub mod diag;
pub mod explain;
pub mod span;

pub use diag::{Diagnostic, DiagnosticBag, Level};
pub use span::{LineIndex, Span};
