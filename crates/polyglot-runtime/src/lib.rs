//! Shared tree-walking interpreter primitives.
//!
//! Every front-end's interpreter is built from the same parts:
//!
//! - **Values** — a tagged union over primitives, lists, maps,
//!   callables, and class machinery ([`Value`])
//! - **Scopes** — an index-linked arena of lexical environments
//!   ([`ScopeArena`]), avoiding ownership cycles between closures and
//!   the scopes that hold them
//! - **Control flow** — non-local exits modelled as a sum type bubbled
//!   up through the evaluators ([`Flow`]), not host exceptions
//! - **Runtime errors** — one error enum mapping onto the shared
//!   diagnostic taxonomy ([`RuntimeError`])
//! - **Output capture** — ordered stdout chunks ([`Output`])
//!
//! The type parameter `F` throughout is the language crate's own
//! user-function representation (parameter list, body AST, captured
//! defining scope); the runtime never inspects it.

mod error;
mod flow;
mod output;
mod scope;
mod value;

pub use error::RuntimeError;
pub use flow::Flow;
pub use output::Output;
pub use scope::{Binding, ScopeArena, ScopeId, SymbolKind};
pub use value::{Builtin, ClassDef, Instance, Value};
