//! Name resolution interface: obfuscated identifiers to source names and back.
//!
//! Schema output should carry source-level names where a mapping corpus is
//! available, and fall back to obfuscated names where it is not. Parsing the
//! mapping files themselves is a collaborator's job; this module only defines
//! the lookup surface plus an in-memory table that can be populated
//! programmatically.

use std::collections::HashMap;

/// Bidirectional identifier lookup against a deobfuscation corpus.
///
/// All lookups return `None` when the corpus has no entry; callers fall back
/// to the obfuscated spelling rather than failing.
pub trait NameResolver {
    /// Maps an obfuscated internal class name to its source name
    fn resolve_class(&self, obf: &str) -> Option<String>;

    /// Maps an obfuscated field of an obfuscated class to its source name
    fn resolve_field(&self, obf_class: &str, obf_field: &str) -> Option<String>;

    /// Maps an obfuscated method (disambiguated by descriptor) to its source name
    fn resolve_method(&self, obf_class: &str, obf_method: &str, descriptor: &str)
        -> Option<String>;

    /// Reverse lookup: maps a source class name back to its obfuscated name
    fn obfuscate_class(&self, name: &str) -> Option<String>;
}

/// A resolver that returns every identifier unchanged.
///
/// Useful when no mapping corpus exists (snapshot builds) or in tests whose
/// fixture classes already carry readable names.
#[derive(Debug, Default, Clone, Copy)]
pub struct IdentityResolver;

impl NameResolver for IdentityResolver {
    fn resolve_class(&self, obf: &str) -> Option<String> {
        Some(obf.to_string())
    }

    fn resolve_field(&self, _obf_class: &str, obf_field: &str) -> Option<String> {
        Some(obf_field.to_string())
    }

    fn resolve_method(
        &self,
        _obf_class: &str,
        obf_method: &str,
        _descriptor: &str,
    ) -> Option<String> {
        Some(obf_method.to_string())
    }

    fn obfuscate_class(&self, name: &str) -> Option<String> {
        Some(name.to_string())
    }
}

/// An in-memory mapping table populated through the `add_*` methods
#[derive(Debug, Default)]
pub struct MappingTable {
    classes: HashMap<String, String>,
    classes_rev: HashMap<String, String>,
    fields: HashMap<(String, String), String>,
    methods: HashMap<(String, String, String), String>,
}

impl MappingTable {
    /// Creates an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a class mapping (obfuscated name to source name)
    pub fn add_class(&mut self, obf: impl Into<String>, name: impl Into<String>) {
        let (obf, name) = (obf.into(), name.into());
        self.classes_rev.insert(name.clone(), obf.clone());
        self.classes.insert(obf, name);
    }

    /// Records a field mapping
    pub fn add_field(
        &mut self,
        obf_class: impl Into<String>,
        obf_field: impl Into<String>,
        name: impl Into<String>,
    ) {
        self.fields
            .insert((obf_class.into(), obf_field.into()), name.into());
    }

    /// Records a method mapping, keyed by descriptor to split overloads
    pub fn add_method(
        &mut self,
        obf_class: impl Into<String>,
        obf_method: impl Into<String>,
        descriptor: impl Into<String>,
        name: impl Into<String>,
    ) {
        self.methods.insert(
            (obf_class.into(), obf_method.into(), descriptor.into()),
            name.into(),
        );
    }
}

impl NameResolver for MappingTable {
    fn resolve_class(&self, obf: &str) -> Option<String> {
        self.classes.get(obf).cloned()
    }

    fn resolve_field(&self, obf_class: &str, obf_field: &str) -> Option<String> {
        self.fields
            .get(&(obf_class.to_string(), obf_field.to_string()))
            .cloned()
    }

    fn resolve_method(
        &self,
        obf_class: &str,
        obf_method: &str,
        descriptor: &str,
    ) -> Option<String> {
        self.methods
            .get(&(
                obf_class.to_string(),
                obf_method.to_string(),
                descriptor.to_string(),
            ))
            .cloned()
    }

    fn obfuscate_class(&self, name: &str) -> Option<String> {
        self.classes_rev.get(name).cloned()
    }
}
