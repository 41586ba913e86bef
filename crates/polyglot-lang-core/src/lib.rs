//! Shared types for the Polyglot language front-ends.
//!
//! This crate provides the foundational building blocks that every
//! front-end crate in the workspace shares:
//!
//! - **Source location tracking**: [`Span`], [`SourceBuffer`]
//! - **Diagnostics**: [`Diagnostic`], [`Stage`], [`Severity`], [`DiagKind`]
//! - **Language identity**: [`Language`]
//! - **Cooperative cancellation**: [`AbortFlag`]
//! - **Pipeline traits**: [`AstNode`]
//!
//! # Design Principles
//!
//! - **Near-zero dependencies**: only `serde` derives live here.
//!   Language crates add `thiserror` (and `miette` where warranted)
//!   on top for rich error types.
//! - **Shared, not prescriptive**: each front-end implements the
//!   pipeline in its own terms; this crate only fixes the contracts
//!   the orchestrator relies on.

mod abort;
mod diagnostic;
mod language;
mod source;
mod span;
mod traits;

pub use abort::AbortFlag;
pub use diagnostic::{DiagKind, Diagnostic, Severity, Stage};
pub use language::Language;
pub use source::SourceBuffer;
pub use span::Span;
pub use traits::AstNode;
