//! Dynamic values shared by all interpreters.
//!
//! `F` is the owning language's user-function representation. Lists,
//! maps, and instances use shared interior mutability so that aliases
//! observe writes, matching the semantics of the dynamic source
//! languages being simulated.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

/// A builtin callable: a host-side tag plus an arity hint.
///
/// Interpreters dispatch on `name`; the runtime never calls through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Builtin {
    /// Host name, e.g. `print`, `console.log`, `writeln`.
    pub name: &'static str,
    /// Declared arity; `None` means variadic / unchecked.
    pub arity: Option<usize>,
}

/// A class descriptor: qualified name plus method table.
#[derive(Debug)]
pub struct ClassDef<F> {
    pub name: String,
    pub methods: HashMap<String, Rc<F>>,
}

impl<F> ClassDef<F> {
    pub fn method(&self, name: &str) -> Option<Rc<F>> {
        self.methods.get(name).cloned()
    }
}

/// An instance of a class: a class reference plus a field map.
#[derive(Debug)]
pub struct Instance<F> {
    pub class: Rc<ClassDef<F>>,
    pub fields: HashMap<String, Value<F>>,
}

impl<F> Instance<F> {
    pub fn new(class: Rc<ClassDef<F>>) -> Self {
        Self {
            class,
            fields: HashMap::new(),
        }
    }
}

/// A dynamic value.
#[derive(Debug)]
pub enum Value<F> {
    /// The language's null/None/undefined/NULL marker.
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    /// Ordered list with shared mutation.
    List(Rc<RefCell<Vec<Value<F>>>>),
    /// Key→value map; iteration order is not significant.
    Map(Rc<RefCell<HashMap<String, Value<F>>>>),
    /// Host builtin, dispatched by name.
    Builtin(Builtin),
    /// User-defined function (language-specific representation).
    Function(Rc<F>),
    Class(Rc<ClassDef<F>>),
    Instance(Rc<RefCell<Instance<F>>>),
    BoundMethod {
        receiver: Rc<RefCell<Instance<F>>>,
        method: Rc<F>,
    },
}

impl<F> Clone for Value<F> {
    fn clone(&self) -> Self {
        match self {
            Value::Null => Value::Null,
            Value::Bool(b) => Value::Bool(*b),
            Value::Int(n) => Value::Int(*n),
            Value::Float(x) => Value::Float(*x),
            Value::Str(s) => Value::Str(s.clone()),
            Value::List(l) => Value::List(Rc::clone(l)),
            Value::Map(m) => Value::Map(Rc::clone(m)),
            Value::Builtin(b) => Value::Builtin(b.clone()),
            Value::Function(f) => Value::Function(Rc::clone(f)),
            Value::Class(c) => Value::Class(Rc::clone(c)),
            Value::Instance(i) => Value::Instance(Rc::clone(i)),
            Value::BoundMethod { receiver, method } => Value::BoundMethod {
                receiver: Rc::clone(receiver),
                method: Rc::clone(method),
            },
        }
    }
}

impl<F> Value<F> {
    /// Build a list value.
    pub fn list(items: Vec<Value<F>>) -> Self {
        Value::List(Rc::new(RefCell::new(items)))
    }

    /// Build a map value.
    pub fn map(entries: HashMap<String, Value<F>>) -> Self {
        Value::Map(Rc::new(RefCell::new(entries)))
    }

    /// Tag name used in type-error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Int(_) => "integer",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::List(_) => "list",
            Value::Map(_) => "map",
            Value::Builtin(_) | Value::Function(_) => "function",
            Value::Class(_) => "class",
            Value::Instance(_) => "instance",
            Value::BoundMethod { .. } => "bound method",
        }
    }

    /// Numeric view, promoting int to float.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Int(n) => Some(*n as f64),
            Value::Float(x) => Some(*x),
            _ => None,
        }
    }

    /// Integer view (no coercion).
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Value::Int(_) | Value::Float(_))
    }

    /// Structural equality for primitives and lists; reference equality
    /// for callables and instances. Incompatible tags compare unequal.
    pub fn loose_eq(&self, other: &Value<F>) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => {
                *a as f64 == *b
            }
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => {
                let (a, b) = (a.borrow(), b.borrow());
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x.loose_eq(y))
            }
            (Value::Map(a), Value::Map(b)) => Rc::ptr_eq(a, b),
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            (Value::Class(a), Value::Class(b)) => Rc::ptr_eq(a, b),
            (Value::Instance(a), Value::Instance(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl<F> fmt::Display for Value<F> {
    /// Neutral rendering; language crates override formatting where
    /// their print builtin differs (e.g. Python `True` vs JS `true`).
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(n) => write!(f, "{n}"),
            Value::Float(x) => {
                if x.fract() == 0.0 && x.is_finite() {
                    write!(f, "{x:.1}")
                } else {
                    write!(f, "{x}")
                }
            }
            Value::Str(s) => f.write_str(s),
            Value::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.borrow().iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Value::Map(entries) => {
                write!(f, "{{{} entries}}", entries.borrow().len())
            }
            Value::Builtin(b) => write!(f, "<builtin {}>", b.name),
            Value::Function(_) => f.write_str("<function>"),
            Value::Class(c) => write!(f, "<class {}>", c.name),
            Value::Instance(i) => write!(f, "<{} instance>", i.borrow().class.name),
            Value::BoundMethod { receiver, .. } => {
                write!(f, "<bound method of {}>", receiver.borrow().class.name)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // A stand-in for a language crate's function repr.
    struct DummyFn;

    #[test]
    fn test_loose_eq_numeric_promotion() {
        let a: Value<DummyFn> = Value::Int(2);
        let b: Value<DummyFn> = Value::Float(2.0);
        assert!(a.loose_eq(&b));
        assert!(b.loose_eq(&a));
    }

    #[test]
    fn test_loose_eq_incompatible_tags() {
        let a: Value<DummyFn> = Value::Str("2".into());
        let b: Value<DummyFn> = Value::Int(2);
        assert!(!a.loose_eq(&b));
    }

    #[test]
    fn test_list_alias_sees_writes() {
        let list: Value<DummyFn> = Value::list(vec![Value::Int(1)]);
        let alias = list.clone();
        if let Value::List(items) = &list {
            items.borrow_mut().push(Value::Int(2));
        }
        if let Value::List(items) = &alias {
            assert_eq!(items.borrow().len(), 2);
        } else {
            unreachable!();
        }
    }

    #[test]
    fn test_display_float_keeps_fraction_marker() {
        let v: Value<DummyFn> = Value::Float(3.0);
        assert_eq!(v.to_string(), "3.0");
        let v: Value<DummyFn> = Value::Float(3.5);
        assert_eq!(v.to_string(), "3.5");
    }

    #[test]
    fn test_type_names() {
        let v: Value<DummyFn> = Value::Null;
        assert_eq!(v.type_name(), "null");
        let v: Value<DummyFn> = Value::list(vec![]);
        assert_eq!(v.type_name(), "list");
    }
}
