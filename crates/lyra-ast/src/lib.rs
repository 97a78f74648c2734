//! Lyra Syntax-Tree Model
//!
//! Data model for the syntax tree the Lyra parser produces. This crate
//! carries no parsing logic; it only defines the nodes the rest of the
//! front end consumes, together with their source spans.

pub mod ast;
pub mod span;

pub use span::Span;
