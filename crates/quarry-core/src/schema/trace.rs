//! Instruction traces: the linear record of field-producing operations.
//!
//! A trace-producing pass captures, per struct, the ordered operations its
//! serialization method performs: field writes, iterator stores, and nested
//! loop/condition regions whose depth mirrors the method's actual nesting.
//! Traces are plain data — serde-able so passes can park them in the
//! aggregate and the inference engine can pick them up later.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

/// Kind of one trace entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TraceOp {
    /// A value written to the wire
    Write,
    /// A value stored into a local (iterator/entry creation)
    Store,
    /// A nested loop region
    Loop,
    /// A nested conditional region
    Condition,
}

/// One entry of an instruction trace
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceInsn {
    /// Entry kind
    #[serde(rename = "operation")]
    pub op: TraceOp,
    /// Source-level field expression (`a`, `b.size()`, `x.isPresent()`)
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub field: String,
    /// Wire or container type tag (`varint`, `Iterator`, `Map.Entry`)
    #[serde(rename = "type", default, skip_serializing_if = "String::is_empty")]
    pub ty: String,
    /// Guard expression for conditional entries
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub condition: String,
    /// Nested entries for loop/condition regions
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub instructions: Vec<TraceInsn>,
}

impl TraceInsn {
    /// Creates a write entry
    pub fn write(field: impl Into<String>, ty: impl Into<String>) -> Self {
        Self {
            op: TraceOp::Write,
            field: field.into(),
            ty: ty.into(),
            condition: String::new(),
            instructions: Vec::new(),
        }
    }

    /// Creates a store entry
    pub fn store(field: impl Into<String>, ty: impl Into<String>) -> Self {
        Self {
            op: TraceOp::Store,
            ..Self::write(field, ty)
        }
    }

    /// Creates a loop region entry
    pub fn loop_block(instructions: Vec<TraceInsn>) -> Self {
        Self {
            op: TraceOp::Loop,
            field: String::new(),
            ty: String::new(),
            condition: String::new(),
            instructions,
        }
    }

    /// Creates a conditional region entry
    pub fn conditional(condition: impl Into<String>, instructions: Vec<TraceInsn>) -> Self {
        Self {
            op: TraceOp::Condition,
            field: String::new(),
            ty: String::new(),
            condition: condition.into(),
            instructions,
        }
    }
}

/// Serializes a trace for storage in the aggregate
pub fn trace_to_value(trace: &[TraceInsn]) -> Result<Value> {
    serde_json::to_value(trace).map_err(|e| Error::internal(e.to_string()))
}

/// Reads a trace back out of aggregate data
pub fn trace_from_value(value: &Value) -> Result<Vec<TraceInsn>> {
    serde_json::from_value(value.clone()).map_err(|e| Error::internal(e.to_string()))
}
