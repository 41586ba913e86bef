//! Non-local exits, modelled as data.
//!
//! `return`, `break`, `continue`, and PL/SQL `raise` bubble up through
//! the recursive evaluators as a sum type. Loops absorb `Break` and
//! `Continue`, call frames absorb `Return`, exception sections absorb
//! `Raise`; anything that reaches the top unabsorbed is a defect in
//! the source program and becomes a runtime diagnostic there.

use crate::value::Value;

/// Statement execution outcome.
#[derive(Debug)]
pub enum Flow<F> {
    /// Continue with the next statement.
    Normal,
    /// `return expr` — absorbed by the enclosing call frame.
    Return(Value<F>),
    /// `break` / `EXIT` — absorbed by the enclosing loop.
    Break,
    /// `continue` — absorbed by the enclosing loop.
    Continue,
    /// PL/SQL `RAISE name` — absorbed by an exception section whose
    /// handler list names it (or `WHEN OTHERS`).
    Raise {
        /// Exception name, uppercased.
        name: String,
        /// Message text for `SQLERRM`-style reporting.
        message: String,
    },
}

impl<F> Flow<F> {
    /// True for every variant except `Normal`.
    pub fn is_exit(&self) -> bool {
        !matches!(self, Flow::Normal)
    }
}
