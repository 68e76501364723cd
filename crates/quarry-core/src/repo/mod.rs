//! Class repository interface: lazy, memoized access to decompiled classes.
//!
//! The engine never touches archives or class-file bytes itself. A
//! [`ClassRepository`] hands out [`ClassDef`]s whose methods carry the
//! already-decompiled instruction lists from [`code`]; producing that form
//! from a real game binary is a collaborator's job.
//!
//! Two implementations ship here: [`MemoryClassRepository`], a pre-populated
//! map used for embedding and tests, and [`CachingClassRepository`], which
//! memoizes an arbitrary loader function the way an archive-backed repository
//! caches parsed entries. Lookup is idempotent, so the cache needs no
//! synchronization in the engine's single-threaded model.

mod code;
mod descriptor;

use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Arc;

pub use code::{visit_insns, BlockKind, FieldRef, Insn, InvokeKind, Literal, MethodRef};
pub use descriptor::{MethodDesc, TypeDesc};

use crate::error::Result;

/// Lookup of decompiled class definitions by internal name
pub trait ClassRepository {
    /// Loads the named class, or `None` if the archive does not contain it
    fn load_class(&self, name: &str) -> Option<Arc<ClassDef>>;

    /// Lists every class name the repository can serve, in a stable order
    fn class_names(&self) -> Vec<String>;
}

/// A decompiled class definition
#[derive(Debug, Clone, PartialEq)]
pub struct ClassDef {
    /// Internal (slashed) class name
    pub name: String,
    /// Internal name of the superclass, if any
    pub super_name: Option<String>,
    /// Fields in declaration order.
    ///
    /// Declaration order is load-bearing: for constants classes it is the
    /// wire ordinal of each variant.
    pub fields: Vec<FieldDef>,
    /// Methods in declaration order
    pub methods: Vec<MethodDef>,
}

impl ClassDef {
    /// Creates an empty class definition
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            super_name: None,
            fields: Vec::new(),
            methods: Vec::new(),
        }
    }

    /// Finds the first method with the given name
    pub fn method(&self, name: &str) -> Option<&MethodDef> {
        self.methods.iter().find(|m| m.name == name)
    }

    /// Finds the method with the given name and exact descriptor
    pub fn method_with_descriptor(&self, name: &str, descriptor: &str) -> Option<&MethodDef> {
        self.methods
            .iter()
            .find(|m| m.name == name && m.descriptor == descriptor)
    }

    /// Finds the first field with the given name
    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// A field of a decompiled class
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDef {
    /// Field name
    pub name: String,
    /// JVM type descriptor
    pub descriptor: String,
    /// Whether the field is static
    pub is_static: bool,
}

impl FieldDef {
    /// Creates a new instance field
    pub fn new(name: impl Into<String>, descriptor: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            descriptor: descriptor.into(),
            is_static: false,
        }
    }

    /// Creates a new static field
    pub fn new_static(name: impl Into<String>, descriptor: impl Into<String>) -> Self {
        Self {
            is_static: true,
            ..Self::new(name, descriptor)
        }
    }

    /// Parses the field's type descriptor
    pub fn ty(&self) -> Result<TypeDesc> {
        TypeDesc::parse(&self.descriptor)
    }
}

/// A method of a decompiled class
#[derive(Debug, Clone, PartialEq)]
pub struct MethodDef {
    /// Method name (`<init>` and `<clinit>` keep their JVM spellings)
    pub name: String,
    /// JVM method descriptor
    pub descriptor: String,
    /// Whether the method is static
    pub is_static: bool,
    /// Decompiled, linear instruction list
    pub instructions: Vec<Insn>,
}

impl MethodDef {
    /// Creates a new instance method
    pub fn new(
        name: impl Into<String>,
        descriptor: impl Into<String>,
        instructions: Vec<Insn>,
    ) -> Self {
        Self {
            name: name.into(),
            descriptor: descriptor.into(),
            is_static: false,
            instructions,
        }
    }

    /// Creates a new static method
    pub fn new_static(
        name: impl Into<String>,
        descriptor: impl Into<String>,
        instructions: Vec<Insn>,
    ) -> Self {
        Self {
            is_static: true,
            ..Self::new(name, descriptor, instructions)
        }
    }

    /// Parses the method descriptor
    pub fn desc(&self) -> Result<MethodDesc> {
        MethodDesc::parse(&self.descriptor)
    }
}

/// A repository over a pre-populated set of class definitions
#[derive(Debug, Default)]
pub struct MemoryClassRepository {
    classes: HashMap<String, Arc<ClassDef>>,
    // Insertion order, so class_names() is deterministic across runs.
    order: Vec<String>,
}

impl MemoryClassRepository {
    /// Creates an empty repository
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a class definition, replacing any previous definition by that name
    pub fn insert(&mut self, class: ClassDef) {
        let name = class.name.clone();
        if self.classes.insert(name.clone(), Arc::new(class)).is_none() {
            self.order.push(name);
        }
    }

    /// Builder-style [`insert`](Self::insert)
    pub fn with_class(mut self, class: ClassDef) -> Self {
        self.insert(class);
        self
    }
}

impl ClassRepository for MemoryClassRepository {
    fn load_class(&self, name: &str) -> Option<Arc<ClassDef>> {
        self.classes.get(name).cloned()
    }

    fn class_names(&self) -> Vec<String> {
        self.order.clone()
    }
}

/// A repository that memoizes an arbitrary loader function.
///
/// Models an archive-backed repository: the loader parses on first request and
/// every later request is served from the cache, including negative results.
pub struct CachingClassRepository<F>
where
    F: Fn(&str) -> Option<ClassDef>,
{
    loader: F,
    names: Vec<String>,
    cache: RefCell<HashMap<String, Option<Arc<ClassDef>>>>,
}

impl<F> CachingClassRepository<F>
where
    F: Fn(&str) -> Option<ClassDef>,
{
    /// Creates a repository over the archive's name listing and a loader
    pub fn new(names: Vec<String>, loader: F) -> Self {
        Self {
            loader,
            names,
            cache: RefCell::new(HashMap::new()),
        }
    }

    /// Number of lookups answered so far (cached and fresh)
    pub fn cached_len(&self) -> usize {
        self.cache.borrow().len()
    }
}

impl<F> ClassRepository for CachingClassRepository<F>
where
    F: Fn(&str) -> Option<ClassDef>,
{
    fn load_class(&self, name: &str) -> Option<Arc<ClassDef>> {
        if let Some(hit) = self.cache.borrow().get(name) {
            return hit.clone();
        }
        let loaded = (self.loader)(name).map(Arc::new);
        self.cache
            .borrow_mut()
            .insert(name.to_string(), loaded.clone());
        loaded
    }

    fn class_names(&self) -> Vec<String> {
        self.names.clone()
    }
}
