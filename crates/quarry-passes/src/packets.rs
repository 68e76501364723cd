//! Packet field traces: recording what a serialization method writes.
//!
//! A packet's write method is a straight run of buffer calls with loops and
//! presence checks folded in. [`PacketFieldsPass`] walks it with a recorder
//! callback that rebuilds source-level expressions from field reads and
//! accessor chains, emits one trace entry per buffer call, and mirrors the
//! method's loop/conditional nesting through the walker's block hooks. The
//! captured traces land in the aggregate for the schema inference engine.
//!
//! The pass is configured with the packet class list and a table mapping
//! buffer method names to wire type tags. Both are pass input: deriving them
//! from the binary is a separate identification concern, and the trace shape
//! alone can never recover them.

use std::collections::HashMap;

use quarry_core::repo::{BlockKind, ClassRepository, FieldRef, InvokeKind, MethodRef};
use quarry_core::schema::trace_to_value;
use quarry_core::walker::{walk_method, BlockControl, Walk, WalkerCallback};
use quarry_core::{
    Aggregate, Capability, ExtractionPass, Result, SymbolicValue, TraceInsn,
};
use serde_json::json;
use tracing::{debug, trace, warn};

/// Captures per-packet instruction traces. Provides `packets`.
#[derive(Debug, Default)]
pub struct PacketFieldsPass {
    buffer_class: String,
    packets: Vec<String>,
    writers: HashMap<String, String>,
}

impl PacketFieldsPass {
    /// Creates the pass for the given buffer class
    pub fn new(buffer_class: impl Into<String>) -> Self {
        Self {
            buffer_class: buffer_class.into(),
            packets: Vec::new(),
            writers: HashMap::new(),
        }
    }

    /// Adds a packet class to trace
    pub fn packet(mut self, class: impl Into<String>) -> Self {
        self.packets.push(class.into());
        self
    }

    /// Maps a buffer method name to its wire type tag
    pub fn writer(mut self, method: impl Into<String>, wire: impl Into<String>) -> Self {
        self.writers.insert(method.into(), wire.into());
        self
    }
}

impl ExtractionPass for PacketFieldsPass {
    fn id(&self) -> &str {
        "packet-fields"
    }

    fn provides(&self) -> Vec<Capability> {
        vec![Capability::from("packets")]
    }

    fn act(&self, aggregate: &mut Aggregate, repo: &dyn ClassRepository) -> Result<()> {
        let write_descriptor = format!("(L{};)V", self.buffer_class);

        for class_name in &self.packets {
            let Some(class) = repo.load_class(class_name) else {
                warn!(class = %class_name, "packet class missing from repository");
                continue;
            };

            // The serialization method is the instance method taking exactly
            // the buffer and returning nothing.
            let Some(method) = class
                .methods
                .iter()
                .find(|m| !m.is_static && m.descriptor == write_descriptor)
            else {
                warn!(class = %class_name, "packet has no serialization method");
                continue;
            };

            let mut recorder = TraceRecorder::new(&self.buffer_class, &self.writers);
            if let Err(e) = walk_method(&class, method, &mut recorder) {
                // One malformed packet must not cost the rest of the batch.
                warn!(class = %class_name, error = %e, "packet walk failed");
                continue;
            }

            let captured = recorder.finish();
            debug!(class = %class_name, entries = captured.len(), "captured packet trace");

            let entry = json!({
                "class": class_name,
                "instructions": trace_to_value(&captured)?,
            });
            aggregate.object_mut("packets").insert(class_name.clone(), entry);
        }

        Ok(())
    }
}

/// Recorder state for one nesting level
struct Level {
    pending: Option<Pending>,
    entries: Vec<TraceInsn>,
}

enum Pending {
    Loop,
    Condition(String),
}

/// Walker callback that reconstructs expressions and emits trace entries
struct TraceRecorder<'a> {
    buffer_class: &'a str,
    writers: &'a HashMap<String, String>,
    levels: Vec<Level>,
}

impl<'a> TraceRecorder<'a> {
    fn new(buffer_class: &'a str, writers: &'a HashMap<String, String>) -> Self {
        Self {
            buffer_class,
            writers,
            levels: vec![Level {
                pending: None,
                entries: Vec::new(),
            }],
        }
    }

    fn emit(&mut self, insn: TraceInsn) {
        if let Some(level) = self.levels.last_mut() {
            level.entries.push(insn);
        }
    }

    /// Closes any levels a truncated walk left open and returns the trace.
    fn finish(mut self) -> Vec<TraceInsn> {
        while self.levels.len() > 1 {
            self.close_level();
        }
        self.levels.pop().map(|l| l.entries).unwrap_or_default()
    }

    fn close_level(&mut self) {
        let Some(level) = self.levels.pop() else { return };
        let entry = match level.pending {
            Some(Pending::Loop) => TraceInsn::loop_block(level.entries),
            Some(Pending::Condition(condition)) => {
                TraceInsn::conditional(condition, level.entries)
            }
            None => return,
        };
        self.emit(entry);
    }
}

fn render_operand(value: &SymbolicValue) -> String {
    match value {
        SymbolicValue::Expr { text } => text.clone(),
        SymbolicValue::Literal(serde_json::Value::String(s)) => s.clone(),
        SymbolicValue::Literal(v) => v.to_string(),
        _ => "<unknown>".to_string(),
    }
}

impl WalkerCallback for TraceRecorder<'_> {
    fn on_new(&mut self, _class: &str) -> Result<Walk> {
        Ok(Walk::Push(SymbolicValue::Opaque))
    }

    fn on_invoke(
        &mut self,
        _kind: InvokeKind,
        target: &MethodRef,
        receiver: Option<SymbolicValue>,
        args: Vec<SymbolicValue>,
    ) -> Result<Walk> {
        if target.class == self.buffer_class {
            // A buffer call is a field write; the wire type comes from the
            // configured writer table, anything unmapped stays abstract so
            // inference flags it instead of losing the field.
            let field = args
                .first()
                .map(render_operand)
                .unwrap_or_default();
            match self.writers.get(&target.name) {
                Some(wire) => self.emit(TraceInsn::write(field, wire.clone())),
                None => {
                    trace!(method = %target.name, "buffer method not in writer table");
                    self.emit(TraceInsn::write(field, "abstract"));
                }
            }
            // Buffer methods chain.
            return Ok(Walk::Push(receiver.unwrap_or(SymbolicValue::Opaque)));
        }

        let desc = target.desc()?;
        let chained = receiver
            .as_ref()
            .and_then(SymbolicValue::expr_text)
            .map(|base| format!("{}.{}()", base, target.name));

        if desc.ret.class_name() == Some("java/util/Iterator") {
            let text = chained.unwrap_or_else(|| format!("{}()", target.name));
            self.emit(TraceInsn::store(text.clone(), "Iterator"));
            return Ok(Walk::Push(SymbolicValue::expr(text)));
        }

        if target.name == "next" {
            let text = chained.unwrap_or_else(|| "next()".to_string());
            self.emit(TraceInsn::store(text.clone(), desc.ret.display_name()));
            return Ok(Walk::Push(SymbolicValue::expr(text)));
        }

        if !desc.ret.is_void() {
            // Zero-argument accessors keep the expression chain alive.
            if args.is_empty() {
                if let Some(text) = chained {
                    return Ok(Walk::Push(SymbolicValue::expr(text)));
                }
            }
            return Ok(Walk::Push(SymbolicValue::Opaque));
        }

        Ok(Walk::Push(SymbolicValue::Absent))
    }

    fn on_get_field(
        &mut self,
        field: &FieldRef,
        receiver: Option<SymbolicValue>,
    ) -> Result<Walk> {
        let text = match receiver.as_ref().and_then(SymbolicValue::expr_text) {
            Some(base) => format!("{}.{}", base, field.name),
            None => field.name.clone(),
        };
        Ok(Walk::Push(SymbolicValue::expr(text)))
    }

    fn on_put_field(
        &mut self,
        _field: &FieldRef,
        _receiver: Option<SymbolicValue>,
        _value: SymbolicValue,
    ) -> Result<Walk> {
        Ok(Walk::Push(SymbolicValue::Absent))
    }

    fn on_invokedynamic(
        &mut self,
        _target: &MethodRef,
        _args: Vec<SymbolicValue>,
    ) -> Result<Walk> {
        Ok(Walk::Push(SymbolicValue::Opaque))
    }

    fn on_block_start(
        &mut self,
        kind: BlockKind,
        guard: Option<&SymbolicValue>,
    ) -> Result<BlockControl> {
        let pending = match kind {
            BlockKind::Loop => Pending::Loop,
            BlockKind::Conditional => {
                let condition = guard.map(render_operand).unwrap_or_default();
                Pending::Condition(condition)
            }
        };
        self.levels.push(Level {
            pending: Some(pending),
            entries: Vec::new(),
        });
        Ok(BlockControl::Enter)
    }

    fn on_block_end(&mut self, _kind: BlockKind) -> Result<()> {
        if self.levels.len() > 1 {
            self.close_level();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture;
    use pretty_assertions::assert_eq;
    use quarry_core::schema::trace_from_value;
    use quarry_core::{FieldType, IdentityResolver, SchemaInference, TraceOp};

    fn captured_trace() -> Vec<TraceInsn> {
        let repo = fixture::game_repo();
        let mut aggregate = Aggregate::new();
        fixture::packet_pass().act(&mut aggregate, &repo).unwrap();

        let value = aggregate
            .get_path(&["packets", "pkt", "instructions"])
            .unwrap();
        trace_from_value(value).unwrap()
    }

    #[test]
    fn test_trace_mirrors_method_structure() {
        let captured = captured_trace();

        let ops: Vec<TraceOp> = captured.iter().map(|i| i.op).collect();
        assert_eq!(
            ops,
            vec![
                TraceOp::Write,     // a
                TraceOp::Write,     // b.size()
                TraceOp::Store,     // b iterator
                TraceOp::Loop,      // b elements
                TraceOp::Write,     // c.isPresent()
                TraceOp::Condition, // c payload
                TraceOp::Write,     // d.size()
                TraceOp::Store,     // d iterator
                TraceOp::Loop,      // d entries
            ]
        );

        assert_eq!(captured[0].field, "a");
        assert_eq!(captured[0].ty, "varint");
        assert_eq!(captured[1].field, "b.size()");
        assert_eq!(captured[2].ty, "Iterator");
        assert_eq!(captured[5].condition, "c.isPresent()");
    }

    #[test]
    fn test_loop_bodies_are_nested() {
        let captured = captured_trace();

        let list_body = &captured[3].instructions;
        assert_eq!(list_body.len(), 2);
        assert_eq!(list_body[0].op, TraceOp::Store);
        assert_eq!(list_body[1].ty, "string");

        let map_body = &captured[8].instructions;
        assert_eq!(map_body.len(), 3);
        assert_eq!(map_body[0].ty, "Map.Entry");
        assert!(map_body[1].field.ends_with(".getKey()"));
        assert!(map_body[2].field.ends_with(".getValue()"));
    }

    #[test]
    fn test_captured_trace_infers_to_schema() {
        let repo = fixture::game_repo();
        let names = IdentityResolver;
        let engine = SchemaInference::new(&repo, &names);

        let fields = engine.infer_struct("pkt", &captured_trace());
        assert_eq!(fields.len(), 4);

        assert_eq!(fields[0].name, "a");
        assert_eq!(fields[0].ty, FieldType::Int { bits: 32, signed: false });
        assert!(fields[0].variable_length);

        assert_eq!(fields[1].name, "b");
        assert_eq!(fields[1].ty, FieldType::List(Box::new(FieldType::Str)));

        assert_eq!(fields[2].name, "c");
        assert_eq!(fields[2].ty, FieldType::Optional(Box::new(FieldType::Uuid)));

        assert_eq!(fields[3].name, "d");
        assert_eq!(
            fields[3].ty,
            FieldType::Map(
                Box::new(FieldType::Str),
                Box::new(FieldType::Int { bits: 64, signed: false })
            )
        );
    }

    #[test]
    fn test_missing_packet_class_is_skipped() {
        let repo = fixture::game_repo();
        let mut aggregate = Aggregate::new();
        let pass = PacketFieldsPass::new("buf")
            .packet("ghost")
            .writer("writeVarInt", "varint");
        pass.act(&mut aggregate, &repo).unwrap();
        assert!(aggregate.get_path(&["packets", "ghost"]).is_none());
    }

    #[test]
    fn test_unmapped_buffer_method_stays_abstract() {
        let writers = HashMap::new();
        let mut recorder = TraceRecorder::new("buf", &writers);
        recorder
            .on_invoke(
                InvokeKind::Virtual,
                &MethodRef::new("buf", "writeMystery", "(I)Lbuf;"),
                Some(SymbolicValue::Opaque),
                vec![SymbolicValue::expr("q")],
            )
            .unwrap();

        let captured = recorder.finish();
        assert_eq!(captured.len(), 1);
        assert_eq!(captured[0].ty, "abstract");
        assert_eq!(captured[0].field, "q");
    }
}
