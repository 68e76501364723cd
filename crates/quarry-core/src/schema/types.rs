//! Field descriptor types and the scalar lookup table.

use serde::Serialize;

use crate::schema::trace::TraceInsn;

/// Target type of one reconstructed field
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    /// Fixed-width integer; signedness comes from the name heuristic
    Int {
        /// Width in bits (8, 16, 32, 64)
        bits: u8,
        /// Whether the coordinate-name heuristic chose the signed variant
        signed: bool,
    },
    /// IEEE float (32 or 64 bits)
    Float {
        /// Width in bits
        bits: u8,
    },
    /// Boolean
    Bool,
    /// UTF-8 string
    Str,
    /// UUID
    Uuid,
    /// Rich chat/text component
    Text,
    /// Namespaced identifier (resource location)
    Identifier,
    /// Packed block position
    Position,
    /// NBT compound
    Nbt,
    /// Item stack
    ItemStack,
    /// Entity metadata blob
    Metadata,
    /// Homogeneous list
    List(Box<FieldType>),
    /// Key to value mapping; keys unique, order structural only
    Map(Box<FieldType>, Box<FieldType>),
    /// Optional payload
    Optional(Box<FieldType>),
    /// Several values written under one guard
    Tuple(Vec<FieldType>),
    /// Enumeration, expanded in the descriptor's `enum_def`
    Enum(String),
    /// Shape not recognized; the raw trace rides along in the descriptor
    Unresolved,
}

/// An expanded enum definition.
///
/// Variant order matches declaration order in the constants class — that
/// order is the wire ordinal, so it must never be sorted or otherwise
/// rearranged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnumDef {
    /// Short source-level name of the enum class
    pub name: String,
    /// Variants; index is the wire ordinal
    pub variants: Vec<String>,
}

impl EnumDef {
    /// Creates an enum definition
    pub fn new(name: impl Into<String>, variants: Vec<String>) -> Self {
        Self {
            name: name.into(),
            variants,
        }
    }

    /// Wire ordinal of a variant, if present
    pub fn ordinal(&self, variant: &str) -> Option<usize> {
        self.variants.iter().position(|v| v == variant)
    }
}

/// Typed, named description of one reconstructed struct field
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldDescriptor {
    /// Source-level field name, or the obfuscated spelling if unmapped
    pub name: String,
    /// Target type
    #[serde(rename = "type")]
    pub ty: FieldType,
    /// Whether the value uses variable-length encoding on the wire
    pub variable_length: bool,
    /// Expanded definition for enum-typed fields
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enum_def: Option<EnumDef>,
    /// The unconsumed trace, kept only on unresolved fields for follow-up
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw: Option<Vec<TraceInsn>>,
}

impl FieldDescriptor {
    /// Creates a resolved descriptor with fixed-length encoding
    pub fn new(name: impl Into<String>, ty: FieldType) -> Self {
        Self {
            name: name.into(),
            ty,
            variable_length: false,
            enum_def: None,
            raw: None,
        }
    }

    /// Creates an unresolved placeholder carrying the raw trace
    pub fn unresolved(name: impl Into<String>, raw: Vec<TraceInsn>) -> Self {
        Self {
            name: name.into(),
            ty: FieldType::Unresolved,
            variable_length: false,
            enum_def: None,
            raw: Some(raw),
        }
    }

    /// Returns false for unresolved placeholders
    pub fn is_resolved(&self) -> bool {
        !matches!(self.ty, FieldType::Unresolved)
    }
}

/// Words that mark a field as coordinate-like, taking the signed variant
const COORDINATE_WORDS: [&str; 6] = ["x", "y", "z", "xa", "ya", "za"];

pub(crate) fn coordinate_like(name: &str) -> bool {
    to_snake_case(name)
        .split('_')
        .any(|word| COORDINATE_WORDS.contains(&word))
}

pub(crate) fn to_snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for (index, c) in name.chars().enumerate() {
        if c.is_ascii_uppercase() {
            if index > 0 {
                out.push('_');
            }
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

/// Looks up a wire type tag in the fixed scalar table.
///
/// Returns the field type and whether the encoding is variable-length.
/// Integer signedness defaults to unsigned (identifier/index-like) unless the
/// field name is coordinate-like; floats, booleans and composites have no
/// sign to pick. Array tags (`T[]`) wrap the element type in a list.
pub(crate) fn scalar_type(wire: &str, field_name: Option<&str>) -> Option<(FieldType, bool)> {
    if let Some(element) = wire.strip_suffix("[]") {
        let (inner, var) = scalar_type(element, field_name)?;
        return Some((FieldType::List(Box::new(inner)), var));
    }

    let signed = field_name.is_some_and(coordinate_like);

    let (ty, var) = match wire {
        "byte" => (FieldType::Int { bits: 8, signed }, false),
        "short" => (FieldType::Int { bits: 16, signed }, false),
        "int" => (FieldType::Int { bits: 32, signed }, false),
        "long" => (FieldType::Int { bits: 64, signed }, false),
        "varint" => (FieldType::Int { bits: 32, signed }, true),
        "varlong" => (FieldType::Int { bits: 64, signed }, true),
        "float" => (FieldType::Float { bits: 32 }, false),
        "double" => (FieldType::Float { bits: 64 }, false),
        "boolean" => (FieldType::Bool, false),
        "string" => (FieldType::Str, false),
        "chatcomponent" => (FieldType::Text, false),
        "identifier" => (FieldType::Identifier, false),
        "uuid" => (FieldType::Uuid, false),
        "position" => (FieldType::Position, false),
        "nbtcompound" => (FieldType::Nbt, false),
        "itemstack" => (FieldType::ItemStack, false),
        "metadata" => (FieldType::Metadata, false),
        _ => return None,
    };

    Some((ty, var))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_snake_case() {
        assert_eq!(to_snake_case("transactionId"), "transaction_id");
        assert_eq!(to_snake_case("xRot"), "x_rot");
        assert_eq!(to_snake_case("plain"), "plain");
    }

    #[test]
    fn test_coordinate_names_take_signed_variant() {
        assert_eq!(
            scalar_type("varint", Some("xa")),
            Some((FieldType::Int { bits: 32, signed: true }, true))
        );
        assert_eq!(
            scalar_type("int", Some("posX")),
            Some((FieldType::Int { bits: 32, signed: true }, false))
        );
    }

    #[test]
    fn test_identifier_names_take_unsigned_variant() {
        assert_eq!(
            scalar_type("varint", Some("entityId")),
            Some((FieldType::Int { bits: 32, signed: false }, true))
        );
        assert_eq!(
            scalar_type("long", None),
            Some((FieldType::Int { bits: 64, signed: false }, false))
        );
    }

    #[test]
    fn test_sign_is_meaningless_for_floats_and_composites() {
        assert_eq!(
            scalar_type("float", Some("x")),
            Some((FieldType::Float { bits: 32 }, false))
        );
        assert_eq!(scalar_type("uuid", Some("x")), Some((FieldType::Uuid, false)));
    }

    #[test]
    fn test_array_tags_become_lists() {
        assert_eq!(
            scalar_type("varint[]", None),
            Some((
                FieldType::List(Box::new(FieldType::Int { bits: 32, signed: false })),
                true
            ))
        );
    }

    #[test]
    fn test_unknown_wire_tag() {
        assert_eq!(scalar_type("bitset", None), None);
        assert_eq!(scalar_type("abstract", None), None);
    }

    #[test]
    fn test_enum_ordinals_follow_declaration_order() {
        let def = EnumDef::new("Color", vec!["RED".into(), "GREEN".into(), "BLUE".into()]);
        assert_eq!(def.ordinal("RED"), Some(0));
        assert_eq!(def.ordinal("GREEN"), Some(1));
        assert_eq!(def.ordinal("BLUE"), Some(2));
        assert_eq!(def.ordinal("MAUVE"), None);
    }
}
