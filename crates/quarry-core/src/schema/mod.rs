//! Schema inference engine: instruction traces to typed field descriptors.
//!
//! The engine consumes the linear trace a pass captured for one struct and
//! recognizes the handful of shapes obfuscated serialization code actually
//! takes:
//!
//! - **Collection**: a size write, an iterator-typed entry, and a loop region
//!   collapse into one list or map field (exactly 3 entries consumed).
//! - **Optional**: a presence-check write followed by a conditional guarded by
//!   the same check collapses into one optional field (2 entries consumed).
//! - **Bitfield**: a byte-sized write splits into one boolean per
//!   caller-supplied mask; packing is never inferred from trace shape.
//! - **Enum**: a field whose declared type is a constants class expands into
//!   variants in declaration order — that order is the wire ordinal.
//! - **Scalar**: everything in the fixed wire-type table.
//!
//! Anything else becomes an *unresolved* descriptor that carries its raw
//! trace for manual follow-up. Unrecognized input is never dropped and never
//! aborts the rest of the struct.

mod trace;
mod types;

use tracing::debug;

use crate::error::{Error, Result};
use crate::names::NameResolver;
use crate::repo::ClassRepository;

pub use trace::{trace_from_value, trace_to_value, TraceInsn, TraceOp};
pub use types::{EnumDef, FieldDescriptor, FieldType};

use types::scalar_type;

/// One caller-supplied mask for splitting a packed flags byte
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BitMask {
    /// Bit pattern within the byte
    pub mask: u8,
    /// Name for the resulting boolean field
    pub name: String,
}

impl BitMask {
    /// Creates a bit mask entry
    pub fn new(mask: u8, name: impl Into<String>) -> Self {
        Self {
            mask,
            name: name.into(),
        }
    }
}

/// Converts instruction traces into [`FieldDescriptor`]s
pub struct SchemaInference<'a> {
    repo: &'a dyn ClassRepository,
    names: &'a dyn NameResolver,
}

impl<'a> SchemaInference<'a> {
    /// Creates an engine over a class repository and a name resolver
    pub fn new(repo: &'a dyn ClassRepository, names: &'a dyn NameResolver) -> Self {
        Self { repo, names }
    }

    /// Infers every field of one struct from its trace.
    ///
    /// `owner` is the obfuscated class the trace was captured from; it anchors
    /// field-name resolution and enum expansion. This never fails: shapes the
    /// engine does not recognize come back as unresolved placeholders.
    pub fn infer_struct(&self, owner: &str, trace: &[TraceInsn]) -> Vec<FieldDescriptor> {
        let mut fields = Vec::new();
        let mut index = 0;
        while index < trace.len() {
            let (consumed, descriptor) = self.infer_field(owner, &trace[index..]);
            fields.push(descriptor);
            index += consumed.max(1);
        }
        fields
    }

    /// Expands a constants class into an enum definition.
    ///
    /// Qualifying members are the static fields typed as the class itself;
    /// variant order is their declaration order, which is the wire ordinal.
    pub fn expand_enum(&self, enum_class: &str) -> Result<EnumDef> {
        let class = self
            .repo
            .load_class(enum_class)
            .ok_or_else(|| Error::class_not_found(enum_class))?;

        let self_descriptor = format!("L{};", class.name);
        let variants: Vec<String> = class
            .fields
            .iter()
            .filter(|f| f.is_static && f.descriptor == self_descriptor)
            .map(|f| {
                self.names
                    .resolve_field(enum_class, &f.name)
                    .unwrap_or_else(|| f.name.clone())
            })
            .collect();

        if variants.is_empty() {
            return Err(Error::landmark(enum_class, "same-typed constant members"));
        }

        let resolved = self
            .names
            .resolve_class(enum_class)
            .unwrap_or_else(|| enum_class.to_string());
        let short = resolved
            .rsplit('/')
            .next()
            .and_then(|n| n.rsplit('$').next())
            .unwrap_or(&resolved);

        Ok(EnumDef::new(short, variants))
    }

    /// Splits a packed flags byte into one boolean descriptor per mask.
    ///
    /// Masks are pass input: the source of a trace knows which bits are real,
    /// the trace shape alone never does. A non-byte write or an empty mask
    /// list yields an unresolved placeholder instead.
    pub fn split_bitfield(&self, insn: &TraceInsn, masks: &[BitMask]) -> Vec<FieldDescriptor> {
        if insn.op != TraceOp::Write || insn.ty != "byte" || masks.is_empty() {
            return vec![FieldDescriptor::unresolved(
                insn.field.clone(),
                vec![insn.clone()],
            )];
        }

        masks
            .iter()
            .map(|mask| FieldDescriptor::new(mask.name.clone(), FieldType::Bool))
            .collect()
    }

    fn infer_field(&self, owner: &str, window: &[TraceInsn]) -> (usize, FieldDescriptor) {
        let insn = &window[0];

        if insn.op == TraceOp::Write && insn.field.ends_with(".size()") {
            if let (Some(next), Some(region)) = (window.get(1), window.get(2)) {
                if next.ty == "Iterator" && region.op == TraceOp::Loop {
                    return (3, self.collection_field(owner, insn, next, region));
                }
            }
        }

        if insn.op == TraceOp::Write && is_presence_check(&insn.field) {
            if let Some(next) = window.get(1) {
                if next.op == TraceOp::Condition && is_presence_check(&next.condition) {
                    return (2, self.optional_field(owner, insn, next));
                }
            }
        }

        if insn.op == TraceOp::Write {
            return (1, self.plain_field(owner, insn));
        }

        // A loop/condition/store with no introducing write has no field shape
        // the engine knows.
        let label = if insn.field.is_empty() {
            "<unnamed>".to_string()
        } else {
            insn.field.clone()
        };
        (1, FieldDescriptor::unresolved(label, vec![insn.clone()]))
    }

    /// The 3-entry iterator shape: size write, iterator store, loop region.
    fn collection_field(
        &self,
        owner: &str,
        size_insn: &TraceInsn,
        iter_insn: &TraceInsn,
        region: &TraceInsn,
    ) -> FieldDescriptor {
        let obf = size_insn.field.split('.').next().unwrap_or(&size_insn.field);
        let name = self.field_name(owner, obf);
        let body = &region.instructions;

        // 2-entry body: element store plus element write, a homogeneous list.
        if body.len() == 2 {
            if let Some((element, var)) = self.element_type(owner, &body[1]) {
                let mut descriptor = FieldDescriptor::new(name, FieldType::List(Box::new(element)));
                descriptor.variable_length = var;
                return descriptor;
            }
        }

        // 3-entry body: map entry store plus key/value writes, a mapping.
        if body.len() == 3
            && body[0].ty.starts_with("Map.Entry")
            && body[1].field.ends_with(".getKey()")
            && body[2].field.ends_with(".getValue()")
        {
            let key = self.element_type(owner, &body[1]);
            let value = self.element_type(owner, &body[2]);
            if let (Some((key, key_var)), Some((value, _))) = (key, value) {
                let mut descriptor =
                    FieldDescriptor::new(name, FieldType::Map(Box::new(key), Box::new(value)));
                // Only the key's encoding matters here; the value's is carried
                // by its own type.
                descriptor.variable_length = key_var;
                return descriptor;
            }
        }

        debug!(owner, field = %size_insn.field, "iterator shape with unrecognized body");
        FieldDescriptor::unresolved(
            name,
            vec![size_insn.clone(), iter_insn.clone(), region.clone()],
        )
    }

    /// The 2-entry optional shape: presence write plus guarded conditional.
    fn optional_field(
        &self,
        owner: &str,
        presence: &TraceInsn,
        conditional: &TraceInsn,
    ) -> FieldDescriptor {
        let obf = presence
            .field
            .split('.')
            .next()
            .and_then(|f| f.split(' ').next())
            .unwrap_or(&presence.field);
        let name = self.field_name(owner, obf);

        let mut payload = Vec::new();
        for entry in &conditional.instructions {
            match self.element_type(owner, entry) {
                Some((ty, var)) => payload.push((ty, var)),
                None => {
                    return FieldDescriptor::unresolved(
                        name,
                        vec![presence.clone(), conditional.clone()],
                    );
                }
            }
        }

        match payload.len() {
            0 => FieldDescriptor::unresolved(name, vec![presence.clone(), conditional.clone()]),
            1 => {
                let (ty, var) = payload.remove(0);
                let mut descriptor = FieldDescriptor::new(name, FieldType::Optional(Box::new(ty)));
                descriptor.variable_length = var;
                descriptor
            }
            _ => {
                let types = payload.into_iter().map(|(ty, _)| ty).collect();
                FieldDescriptor::new(
                    name,
                    FieldType::Optional(Box::new(FieldType::Tuple(types))),
                )
            }
        }
    }

    fn plain_field(&self, owner: &str, insn: &TraceInsn) -> FieldDescriptor {
        let expr = insn.field.strip_prefix("(float)").unwrap_or(&insn.field);

        if is_complex_expr(expr) {
            // Boolean projection of an arbitrary expression.
            if let Some(inner) = expr
                .strip_prefix('(')
                .and_then(|rest| rest.strip_suffix(") ? 1 : 0"))
            {
                let name = if is_complex_expr(inner) {
                    inner.to_string()
                } else {
                    self.field_name(owner, inner)
                };
                return FieldDescriptor::new(name, FieldType::Bool);
            }

            debug!(owner, field = %expr, "field expression not understood");
            return FieldDescriptor::unresolved(expr.to_string(), vec![insn.clone()]);
        }

        let name = self.field_name(owner, expr);

        if insn.ty == "enum" {
            return match self.enum_for_field(owner, expr) {
                Ok(def) => {
                    let mut descriptor =
                        FieldDescriptor::new(name, FieldType::Enum(def.name.clone()));
                    descriptor.enum_def = Some(def);
                    descriptor
                }
                Err(e) => {
                    debug!(owner, field = %expr, error = %e, "enum expansion failed");
                    FieldDescriptor::unresolved(name, vec![insn.clone()])
                }
            };
        }

        match scalar_type(&insn.ty, Some(&name)) {
            Some((ty, var)) => {
                let mut descriptor = FieldDescriptor::new(name, ty);
                descriptor.variable_length = var;
                descriptor
            }
            None => {
                debug!(owner, field = %expr, ty = %insn.ty, "wire type not in scalar table");
                FieldDescriptor::unresolved(name, vec![insn.clone()])
            }
        }
    }

    /// Type of one loop/conditional body entry. Element positions carry no
    /// usable field name, so integer signedness defaults to unsigned.
    fn element_type(&self, owner: &str, entry: &TraceInsn) -> Option<(FieldType, bool)> {
        if entry.ty == "enum" {
            let obf = entry.field.split('.').next().unwrap_or(&entry.field);
            let def = self.enum_for_field(owner, obf).ok()?;
            return Some((FieldType::Enum(def.name), false));
        }
        scalar_type(&entry.ty, None)
    }

    fn enum_for_field(&self, owner: &str, obf_field: &str) -> Result<EnumDef> {
        let class = self
            .repo
            .load_class(owner)
            .ok_or_else(|| Error::class_not_found(owner))?;
        let field = class
            .field(obf_field)
            .ok_or_else(|| Error::landmark(owner, format!("field '{obf_field}'")))?;
        let enum_class = field.ty()?;
        let enum_class = enum_class
            .class_name()
            .ok_or_else(|| Error::landmark(owner, format!("reference type for '{obf_field}'")))?;
        self.expand_enum(enum_class)
    }

    fn field_name(&self, owner: &str, obf: &str) -> String {
        self.names
            .resolve_field(owner, obf)
            .or_else(|| {
                // Nested classes share the outer class's field namespace in
                // most mapping corpora.
                let outer = owner.split('$').next()?;
                self.names.resolve_field(outer, obf)
            })
            .unwrap_or_else(|| obf.rsplit('/').next().unwrap_or(obf).to_string())
    }
}

fn is_presence_check(expr: &str) -> bool {
    expr.ends_with(".isPresent()") || expr.ends_with(" != null")
}

fn is_complex_expr(expr: &str) -> bool {
    expr.contains('.') || expr.contains(' ') || expr.contains('(')
}
