//! The decompiled instruction model exposed by class repositories.
//!
//! Repositories hand out method bodies in an already-linearized form: constant
//! pool references are resolved into inline member references, and backward
//! jumps are gone — loop and conditional regions arrive as nested
//! [`Insn::Block`] entries instead. The walker never follows real control
//! flow; it processes this list exactly once, in order.

use crate::error::Result;
use crate::repo::descriptor::MethodDesc;

/// A resolved reference to a field of some class
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldRef {
    /// Internal name of the declaring class
    pub class: String,
    /// Field name (obfuscated in real inputs)
    pub name: String,
    /// JVM type descriptor of the field
    pub descriptor: String,
}

impl FieldRef {
    /// Creates a new field reference
    pub fn new(
        class: impl Into<String>,
        name: impl Into<String>,
        descriptor: impl Into<String>,
    ) -> Self {
        Self {
            class: class.into(),
            name: name.into(),
            descriptor: descriptor.into(),
        }
    }
}

/// A resolved reference to a method of some class
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodRef {
    /// Internal name of the declaring class
    pub class: String,
    /// Method name (obfuscated in real inputs)
    pub name: String,
    /// JVM method descriptor
    pub descriptor: String,
}

impl MethodRef {
    /// Creates a new method reference
    pub fn new(
        class: impl Into<String>,
        name: impl Into<String>,
        descriptor: impl Into<String>,
    ) -> Self {
        Self {
            class: class.into(),
            name: name.into(),
            descriptor: descriptor.into(),
        }
    }

    /// Parses this reference's method descriptor
    pub fn desc(&self) -> Result<MethodDesc> {
        MethodDesc::parse(&self.descriptor)
    }
}

/// Dispatch flavor of an invocation instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvokeKind {
    /// `invokevirtual`
    Virtual,
    /// `invokespecial` (constructors, private methods, super calls)
    Special,
    /// `invokestatic`
    Static,
    /// `invokeinterface`
    Interface,
}

/// A constant operand pushed by a constant-loading instruction
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    /// Integer constant of any width
    Int(i64),
    /// Floating point constant of any width
    Float(f64),
    /// String constant
    Str(String),
    /// Class reference constant (`ldc` of a class)
    ClassRef(String),
    /// `aconst_null`
    Null,
}

/// Shape of a pre-inlined structured region
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    /// Body of a loop; executed-once semantics under the walker
    Loop,
    /// Body of a conditional; its guard value is on the stack when entered
    Conditional,
}

/// One decompiled instruction.
///
/// This is deliberately coarser than raw bytecode: only the categories the
/// walker models get their own variants, and anything else (arithmetic,
/// comparisons, version-specific oddities) arrives as [`Insn::Other`] and is
/// skipped with a trace log rather than failing the walk.
#[derive(Debug, Clone, PartialEq)]
pub enum Insn {
    /// Allocate an instance of the named class
    New {
        /// Internal name of the allocated class
        class: String,
    },
    /// Duplicate the top of stack
    Dup,
    /// Discard the top of stack
    Pop,
    /// Push a constant
    Const(Literal),
    /// Push the local in the given slot
    Load(u16),
    /// Pop into the local in the given slot
    Store(u16),
    /// Read an instance field (pops the receiver)
    GetField(FieldRef),
    /// Read a static field
    GetStatic(FieldRef),
    /// Write an instance field (pops value then receiver)
    PutField(FieldRef),
    /// Write a static field (pops the value)
    PutStatic(FieldRef),
    /// Call a method; operand effects follow the descriptor
    Invoke {
        /// Dispatch flavor
        kind: InvokeKind,
        /// Resolved target
        target: MethodRef,
    },
    /// Construct a call site (lambdas, bound method references)
    InvokeDynamic {
        /// Synthesized call site reference; its descriptor covers the
        /// captured arguments and the functional interface produced
        target: MethodRef,
    },
    /// Allocate an array (pops the length)
    NewArray {
        /// Element type descriptor
        element: String,
    },
    /// Return from the method, ending the walk
    Return {
        /// Whether a value is popped and returned
        value: bool,
    },
    /// A pre-inlined loop or conditional region
    Block {
        /// Structural shape of the region
        kind: BlockKind,
        /// Instructions inside the region
        body: Vec<Insn>,
    },
    /// An instruction the model does not represent
    Other {
        /// Original mnemonic, kept for diagnostics
        mnemonic: String,
    },
}

impl Insn {
    /// Convenience constructor for `invokevirtual`
    pub fn invoke_virtual(
        class: impl Into<String>,
        name: impl Into<String>,
        descriptor: impl Into<String>,
    ) -> Self {
        Insn::Invoke {
            kind: InvokeKind::Virtual,
            target: MethodRef::new(class, name, descriptor),
        }
    }

    /// Convenience constructor for `invokespecial`
    pub fn invoke_special(
        class: impl Into<String>,
        name: impl Into<String>,
        descriptor: impl Into<String>,
    ) -> Self {
        Insn::Invoke {
            kind: InvokeKind::Special,
            target: MethodRef::new(class, name, descriptor),
        }
    }

    /// Convenience constructor for `invokestatic`
    pub fn invoke_static(
        class: impl Into<String>,
        name: impl Into<String>,
        descriptor: impl Into<String>,
    ) -> Self {
        Insn::Invoke {
            kind: InvokeKind::Static,
            target: MethodRef::new(class, name, descriptor),
        }
    }

    /// Convenience constructor for `invokeinterface`
    pub fn invoke_interface(
        class: impl Into<String>,
        name: impl Into<String>,
        descriptor: impl Into<String>,
    ) -> Self {
        Insn::Invoke {
            kind: InvokeKind::Interface,
            target: MethodRef::new(class, name, descriptor),
        }
    }
}

/// Visits every instruction in order, descending into nested block bodies.
///
/// Landmark scans use this to find constants and member accesses regardless
/// of how deeply the decompiler nested the surrounding control flow.
pub fn visit_insns(instructions: &[Insn], visit: &mut impl FnMut(&Insn)) {
    for insn in instructions {
        visit(insn);
        if let Insn::Block { body, .. } = insn {
            visit_insns(body, visit);
        }
    }
}
