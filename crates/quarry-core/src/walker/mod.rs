//! Bytecode abstract interpreter.
//!
//! Given a decompiled method body and a [`WalkerCallback`], the walker
//! simulates the operand stack just enough to recover structure — who gets
//! constructed, what flows into which call, which field receives which value —
//! without executing anything. Instructions are processed exactly once in
//! original order; loops and conditionals arrive pre-inlined as
//! [`Insn::Block`] regions and are walked recursively within the same frame,
//! so recursion depth is bounded by the nesting actually present in the data.
//!
//! ## Callback protocol
//!
//! The callback never touches the stack. It receives already-popped operands
//! and answers with a [`Walk`]: a value for the walker to push, or
//! [`Walk::Stop`] to end the walk early. `Stop` is an ordinary control signal
//! — it is caught here, accumulated results are kept, and it never surfaces
//! as a failure. Genuine errors propagate to the enclosing pass.
//!
//! A callback may re-enter the walker for same-class helper methods by
//! calling [`walk_method_with_args`] directly from inside a hook; there is no
//! hidden interpreter state to collide with.
//!
//! ```no_run
//! use quarry_core::repo::{ClassDef, FieldRef, MethodRef, InvokeKind};
//! use quarry_core::walker::{Walk, WalkerCallback, walk_method};
//! use quarry_core::{Result, SymbolicValue};
//!
//! struct Counter(usize);
//!
//! impl WalkerCallback for Counter {
//!     fn on_new(&mut self, _class: &str) -> Result<Walk> {
//!         Ok(Walk::Push(SymbolicValue::bag()))
//!     }
//!     fn on_invoke(
//!         &mut self,
//!         _kind: InvokeKind,
//!         _target: &MethodRef,
//!         _receiver: Option<SymbolicValue>,
//!         _args: Vec<SymbolicValue>,
//!     ) -> Result<Walk> {
//!         self.0 += 1;
//!         Ok(Walk::Push(SymbolicValue::Opaque))
//!     }
//!     fn on_get_field(
//!         &mut self,
//!         _field: &FieldRef,
//!         _receiver: Option<SymbolicValue>,
//!     ) -> Result<Walk> {
//!         Ok(Walk::Push(SymbolicValue::Opaque))
//!     }
//!     fn on_put_field(
//!         &mut self,
//!         _field: &FieldRef,
//!         _receiver: Option<SymbolicValue>,
//!         _value: SymbolicValue,
//!     ) -> Result<Walk> {
//!         Ok(Walk::Push(SymbolicValue::Absent))
//!     }
//! }
//!
//! # fn demo(class: &ClassDef) -> Result<()> {
//! let method = class.method("<clinit>").unwrap();
//! let mut callback = Counter(0);
//! walk_method(class, method, &mut callback)?;
//! # Ok(())
//! # }
//! ```

mod value;

use std::collections::HashMap;

use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::repo::{BlockKind, ClassDef, FieldRef, Insn, InvokeKind, Literal, MethodDef, MethodRef};

pub use value::SymbolicValue;

/// A hook's answer: push a value and continue, or end the walk
#[derive(Debug, Clone, PartialEq)]
pub enum Walk {
    /// Continue walking; the value is pushed where the instruction produces one
    Push(SymbolicValue),
    /// End the walk early, keeping everything accumulated so far
    Stop,
}

/// A block hook's answer for a pre-inlined region
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockControl {
    /// Walk the region body
    Enter,
    /// Skip the region body entirely
    Skip,
    /// End the walk early
    Stop,
}

/// Hook set driven by the walker, one implementation per extraction pass.
///
/// `on_invokedynamic` fails by default because most passes never expect call
/// site construction in the methods they walk; passes that do see it override
/// the hook. The block hooks default to entering every region, so callbacks
/// that only care about data flow can ignore structure entirely.
pub trait WalkerCallback {
    /// An allocation instruction; the returned value seeds the new object
    fn on_new(&mut self, class: &str) -> Result<Walk>;

    /// A resolved call with its receiver (`None` for static) and arguments
    fn on_invoke(
        &mut self,
        kind: InvokeKind,
        target: &MethodRef,
        receiver: Option<SymbolicValue>,
        args: Vec<SymbolicValue>,
    ) -> Result<Walk>;

    /// A field read; the returned value is pushed in the field's place
    fn on_get_field(
        &mut self,
        field: &FieldRef,
        receiver: Option<SymbolicValue>,
    ) -> Result<Walk>;

    /// A field write; the pushed value of the returned [`Walk`] is ignored
    fn on_put_field(
        &mut self,
        field: &FieldRef,
        receiver: Option<SymbolicValue>,
        value: SymbolicValue,
    ) -> Result<Walk>;

    /// A call site construction; decide whether the closure matters
    fn on_invokedynamic(
        &mut self,
        target: &MethodRef,
        args: Vec<SymbolicValue>,
    ) -> Result<Walk> {
        let _ = args;
        Err(Error::UnhandledInvokeDynamic {
            class: target.class.clone(),
            method: target.name.clone(),
        })
    }

    /// Entry into a pre-inlined region; conditionals carry their guard value
    fn on_block_start(
        &mut self,
        kind: BlockKind,
        guard: Option<&SymbolicValue>,
    ) -> Result<BlockControl> {
        let _ = (kind, guard);
        Ok(BlockControl::Enter)
    }

    /// Exit from a region whose body was walked to completion
    fn on_block_end(&mut self, kind: BlockKind) -> Result<()> {
        let _ = kind;
        Ok(())
    }
}

/// Walks a method with every parameter slot filled with an opaque value.
pub fn walk_method(
    class: &ClassDef,
    method: &MethodDef,
    callback: &mut dyn WalkerCallback,
) -> Result<SymbolicValue> {
    walk_method_with_args(class, method, callback, Vec::new())
}

/// Walks a method with explicit argument values.
///
/// This is the re-entrant entry point: a callback that recognizes a same-class
/// helper call re-invokes the walker here, passing the already-resolved
/// argument values through so the helper body sees them in its locals.
/// Returns the method's symbolic return value, or [`SymbolicValue::Absent`]
/// for void methods and stopped walks.
pub fn walk_method_with_args(
    class: &ClassDef,
    method: &MethodDef,
    callback: &mut dyn WalkerCallback,
    args: Vec<SymbolicValue>,
) -> Result<SymbolicValue> {
    debug!(class = %class.name, method = %method.name, "walking method");

    let desc = method.desc()?;
    let mut frame = Frame::default();
    let mut slot: u16 = 0;

    if !method.is_static {
        frame.locals.insert(slot, SymbolicValue::Opaque);
        slot += 1;
    }

    // Wide primitives occupy a single logical slot in the decompiled form.
    let mut args = args.into_iter();
    for _ in 0..desc.args.len() {
        let value = args.next().unwrap_or(SymbolicValue::Opaque);
        frame.locals.insert(slot, value);
        slot += 1;
    }

    let ctx = WalkCtx {
        class: &class.name,
        method: &method.name,
    };

    match exec(&method.instructions, &mut frame, callback, &ctx)? {
        Exit::Returned(value) => Ok(value),
        Exit::Fallthrough | Exit::Stopped => Ok(SymbolicValue::Absent),
    }
}

#[derive(Default)]
struct Frame {
    stack: Vec<SymbolicValue>,
    locals: HashMap<u16, SymbolicValue>,
}

struct WalkCtx<'a> {
    class: &'a str,
    method: &'a str,
}

impl WalkCtx<'_> {
    fn underflow(&self) -> Error {
        Error::stack_underflow(self.class, self.method)
    }
}

enum Exit {
    /// Ran off the end of the instruction list
    Fallthrough,
    /// A hook answered with the stop signal
    Stopped,
    /// An explicit return instruction was reached
    Returned(SymbolicValue),
}

fn literal_value(literal: &Literal) -> SymbolicValue {
    match literal {
        Literal::Int(v) => SymbolicValue::literal(*v),
        Literal::Float(v) => SymbolicValue::literal(*v),
        Literal::Str(v) => SymbolicValue::literal(v.clone()),
        Literal::ClassRef(name) => SymbolicValue::literal(name.clone()),
        Literal::Null => SymbolicValue::Literal(serde_json::Value::Null),
    }
}

fn exec(
    insns: &[Insn],
    frame: &mut Frame,
    callback: &mut dyn WalkerCallback,
    ctx: &WalkCtx<'_>,
) -> Result<Exit> {
    for insn in insns {
        match insn {
            Insn::New { class } => match callback.on_new(class)? {
                Walk::Push(value) => frame.stack.push(value),
                Walk::Stop => return Ok(Exit::Stopped),
            },

            Insn::Dup => {
                let top = frame.stack.last().cloned().ok_or_else(|| ctx.underflow())?;
                frame.stack.push(top);
            }

            Insn::Pop => {
                frame.stack.pop().ok_or_else(|| ctx.underflow())?;
            }

            Insn::Const(literal) => frame.stack.push(literal_value(literal)),

            Insn::Load(slot) => {
                let value = frame
                    .locals
                    .get(slot)
                    .cloned()
                    .unwrap_or(SymbolicValue::Opaque);
                frame.stack.push(value);
            }

            Insn::Store(slot) => {
                let value = frame.stack.pop().ok_or_else(|| ctx.underflow())?;
                frame.locals.insert(*slot, value);
            }

            Insn::GetField(field) => {
                let receiver = frame.stack.pop().ok_or_else(|| ctx.underflow())?;
                match callback.on_get_field(field, Some(receiver))? {
                    Walk::Push(value) => frame.stack.push(value),
                    Walk::Stop => return Ok(Exit::Stopped),
                }
            }

            Insn::GetStatic(field) => match callback.on_get_field(field, None)? {
                Walk::Push(value) => frame.stack.push(value),
                Walk::Stop => return Ok(Exit::Stopped),
            },

            Insn::PutField(field) => {
                let value = frame.stack.pop().ok_or_else(|| ctx.underflow())?;
                let receiver = frame.stack.pop().ok_or_else(|| ctx.underflow())?;
                match callback.on_put_field(field, Some(receiver), value)? {
                    Walk::Push(_) => {}
                    Walk::Stop => return Ok(Exit::Stopped),
                }
            }

            Insn::PutStatic(field) => {
                let value = frame.stack.pop().ok_or_else(|| ctx.underflow())?;
                match callback.on_put_field(field, None, value)? {
                    Walk::Push(_) => {}
                    Walk::Stop => return Ok(Exit::Stopped),
                }
            }

            Insn::Invoke { kind, target } => {
                let desc = target.desc()?;
                let mut args = Vec::with_capacity(desc.args.len());
                for _ in 0..desc.args.len() {
                    args.push(frame.stack.pop().ok_or_else(|| ctx.underflow())?);
                }
                args.reverse();

                let receiver = if *kind == InvokeKind::Static {
                    None
                } else {
                    Some(frame.stack.pop().ok_or_else(|| ctx.underflow())?)
                };

                match callback.on_invoke(*kind, target, receiver, args)? {
                    Walk::Push(value) => {
                        if !desc.ret.is_void() {
                            frame.stack.push(value);
                        }
                    }
                    Walk::Stop => return Ok(Exit::Stopped),
                }
            }

            Insn::InvokeDynamic { target } => {
                let desc = target.desc()?;
                let mut args = Vec::with_capacity(desc.args.len());
                for _ in 0..desc.args.len() {
                    args.push(frame.stack.pop().ok_or_else(|| ctx.underflow())?);
                }
                args.reverse();

                match callback.on_invokedynamic(target, args)? {
                    Walk::Push(value) => {
                        if !desc.ret.is_void() {
                            frame.stack.push(value);
                        }
                    }
                    Walk::Stop => return Ok(Exit::Stopped),
                }
            }

            Insn::NewArray { element } => {
                frame.stack.pop().ok_or_else(|| ctx.underflow())?;
                trace!(element = %element, "array allocation treated as opaque");
                frame.stack.push(SymbolicValue::Opaque);
            }

            Insn::Return { value } => {
                let result = if *value {
                    frame.stack.pop().ok_or_else(|| ctx.underflow())?
                } else {
                    SymbolicValue::Absent
                };
                return Ok(Exit::Returned(result));
            }

            Insn::Block { kind, body } => {
                // The guard of a conditional is whatever the preceding
                // instructions left on top; a missing guard is tolerated
                // because some decompiled shapes fold it away.
                let guard = if *kind == BlockKind::Conditional {
                    frame.stack.pop()
                } else {
                    None
                };

                match callback.on_block_start(*kind, guard.as_ref())? {
                    BlockControl::Enter => match exec(body, frame, callback, ctx)? {
                        Exit::Fallthrough => callback.on_block_end(*kind)?,
                        exit => return Ok(exit),
                    },
                    BlockControl::Skip => {}
                    BlockControl::Stop => return Ok(Exit::Stopped),
                }
            }

            Insn::Other { mnemonic } => {
                trace!(
                    class = %ctx.class,
                    method = %ctx.method,
                    mnemonic = %mnemonic,
                    "skipping unmodeled instruction"
                );
            }
        }
    }

    Ok(Exit::Fallthrough)
}
