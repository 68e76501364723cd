//! Symbolic stand-ins for runtime values.
//!
//! The walker never computes real values; it shuttles [`SymbolicValue`]s
//! around a simulated operand stack. A value is either a mapping under
//! construction (a *bag*), a symbolic source-level expression, a literal, an
//! opaque placeholder, or absent.
//!
//! Bags have reference semantics: `new` followed by `dup` leaves two handles
//! to the same mapping on the stack, and a constructor call that fills the
//! mapping through one handle must be visible through the other. Cloning a
//! bag therefore clones the handle, not the contents.

use std::cell::RefCell;
use std::rc::Rc;

use serde_json::{Map, Value};

/// The walker's abstracted stand-in for a runtime value
#[derive(Debug, Clone, PartialEq)]
pub enum SymbolicValue {
    /// A mapping under construction, shared between stack copies
    Bag(Rc<RefCell<Map<String, Value>>>),
    /// A symbolic source-level expression such as `x.size()`
    Expr {
        /// Reconstructed expression text
        text: String,
    },
    /// A constant from the instruction stream
    Literal(Value),
    /// A value whose structure is not tracked
    Opaque,
    /// No value at all (void returns, unmodeled slots)
    Absent,
}

impl SymbolicValue {
    /// Creates an empty bag
    pub fn bag() -> Self {
        SymbolicValue::Bag(Rc::new(RefCell::new(Map::new())))
    }

    /// Creates a bag pre-filled from key/value pairs
    pub fn bag_from(entries: impl IntoIterator<Item = (String, Value)>) -> Self {
        SymbolicValue::Bag(Rc::new(RefCell::new(entries.into_iter().collect())))
    }

    /// Creates a symbolic expression value
    pub fn expr(text: impl Into<String>) -> Self {
        SymbolicValue::Expr { text: text.into() }
    }

    /// Creates a literal value
    pub fn literal(value: impl Into<Value>) -> Self {
        SymbolicValue::Literal(value.into())
    }

    /// Returns true for [`SymbolicValue::Absent`]
    pub fn is_absent(&self) -> bool {
        matches!(self, SymbolicValue::Absent)
    }

    /// String content of a literal, if this is a string literal
    pub fn as_str(&self) -> Option<&str> {
        match self {
            SymbolicValue::Literal(Value::String(s)) => Some(s),
            _ => None,
        }
    }

    /// Expression text, if this is an expression
    pub fn expr_text(&self) -> Option<&str> {
        match self {
            SymbolicValue::Expr { text } => Some(text),
            _ => None,
        }
    }

    /// Inserts into the bag, returning false if this is not a bag
    pub fn bag_insert(&self, key: impl Into<String>, value: Value) -> bool {
        match self {
            SymbolicValue::Bag(map) => {
                map.borrow_mut().insert(key.into(), value);
                true
            }
            _ => false,
        }
    }

    /// Reads a bag entry by key
    pub fn bag_get(&self, key: &str) -> Option<Value> {
        match self {
            SymbolicValue::Bag(map) => map.borrow().get(key).cloned(),
            _ => None,
        }
    }

    /// Copies every entry of `other`'s bag into this bag.
    ///
    /// No-op unless both sides are bags; existing keys are overwritten, which
    /// matches builder-state merging during constructor calls.
    pub fn merge_bag(&self, other: &SymbolicValue) {
        let (SymbolicValue::Bag(dst), SymbolicValue::Bag(src)) = (self, other) else {
            return;
        };
        if Rc::ptr_eq(dst, src) {
            return;
        }
        let src = src.borrow();
        let mut dst = dst.borrow_mut();
        for (key, value) in src.iter() {
            dst.insert(key.clone(), value.clone());
        }
    }

    /// Snapshot of this value as plain JSON.
    ///
    /// Bags become objects, literals pass through, expressions become their
    /// text, opaque and absent values become null.
    pub fn to_json(&self) -> Value {
        match self {
            SymbolicValue::Bag(map) => Value::Object(map.borrow().clone()),
            SymbolicValue::Expr { text } => Value::String(text.clone()),
            SymbolicValue::Literal(value) => value.clone(),
            SymbolicValue::Opaque | SymbolicValue::Absent => Value::Null,
        }
    }
}
