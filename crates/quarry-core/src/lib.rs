//! # quarry-core
//!
//! A library for reconstructing structured schema — packet field layouts,
//! block property tables, enum definitions — from compiled, obfuscated JVM
//! game clients whose source-level structure was erased by compilation.
//!
//! This is a *best effort* analysis: irregular, version-varying bytecode
//! shapes are tolerated per pass and per field, and anything unrecognized is
//! reported as explicitly unresolved rather than silently dropped.
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`scheduler`]: dependency-ordered execution of extraction passes with
//!   per-pass failure isolation over a shared [`Aggregate`]
//! - [`walker`]: the abstract bytecode interpreter driving per-pass callbacks
//! - [`schema`]: inference of typed field descriptors from captured traces
//! - [`repo`]: the class repository interface and decompiled instruction model
//! - [`names`]: the deobfuscation-corpus interface
//! - [`error`]: error types and handling
//!
//! ## Example
//!
//! ```no_run
//! use quarry_core::{
//!     Aggregate, Capability, ClassRepository, ExtractionPass, MemoryClassRepository, Result,
//!     Scheduler,
//! };
//! use serde_json::json;
//!
//! struct VersionPass;
//!
//! impl ExtractionPass for VersionPass {
//!     fn id(&self) -> &str {
//!         "version"
//!     }
//!     fn provides(&self) -> Vec<Capability> {
//!         vec![Capability::from("version")]
//!     }
//!     fn act(&self, aggregate: &mut Aggregate, _repo: &dyn ClassRepository) -> Result<()> {
//!         aggregate.insert("version", json!("1.19.4"));
//!         Ok(())
//!     }
//! }
//!
//! # fn run() -> Result<()> {
//! let repo = MemoryClassRepository::new();
//! let mut scheduler = Scheduler::new();
//! scheduler.register(VersionPass);
//!
//! let report = scheduler.run(&repo)?;
//! println!("{}", report.aggregate.to_json_string()?);
//! # Ok(())
//! # }
//! ```
//!
//! ## Extensibility
//!
//! The library is driven through three traits:
//!
//! - [`ExtractionPass`]: one self-contained analysis unit
//! - [`walker::WalkerCallback`]: the hook set a pass plugs into the walker
//! - [`ClassRepository`] / [`NameResolver`]: the collaborator interfaces for
//!   class loading and deobfuscation

#![deny(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unreachable_pub)]

pub mod error;
pub mod names;
pub mod repo;
pub mod schema;
pub mod scheduler;
pub mod walker;

// Re-export primary types for convenience
pub use error::{Error, Result};
pub use names::{IdentityResolver, MappingTable, NameResolver};
pub use repo::{CachingClassRepository, ClassDef, ClassRepository, MemoryClassRepository};
pub use schema::{
    BitMask, EnumDef, FieldDescriptor, FieldType, SchemaInference, TraceInsn, TraceOp,
};
pub use scheduler::{Aggregate, Capability, ExtractionPass, RunReport, Scheduler};
pub use walker::{walk_method, walk_method_with_args, SymbolicValue, Walk, WalkerCallback};

/// Crate version for programmatic access
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
