//! Extraction pass scheduling and the shared result aggregate.
//!
//! Passes are independent analysis units that communicate only through the
//! [`Aggregate`] and declare that communication as provided/depended
//! [`Capability`] keys. The [`Scheduler`] orders them leaves-first from those
//! declarations and runs them strictly sequentially.
//!
//! ## Failure isolation
//!
//! Configuration problems — a cycle, a dependency nobody provides, two
//! providers for one capability — are fatal and abort before any pass runs.
//! Everything else is confined: each `act` call runs against a snapshot
//! boundary, a pass that errors has its writes discarded wholesale, and later
//! passes whose dependencies consequently never materialized are skipped with
//! a warning. A completed run always carries its diagnostics in the
//! [`RunReport`].

mod graph;

use std::collections::HashSet;
use std::fmt;

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, error, warn};

use crate::error::{Error, Result};
use crate::repo::ClassRepository;

/// Opaque key naming a chunk of Aggregate data one pass produces
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Capability(String);

impl Capability {
    /// Creates a capability key
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The key as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Capability {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl From<String> for Capability {
    fn from(name: String) -> Self {
        Self(name)
    }
}

/// A self-contained analysis unit scheduled by provides/depends declarations
pub trait ExtractionPass {
    /// Stable identifier used in logs and reports
    fn id(&self) -> &str;

    /// Capabilities this pass contributes to the aggregate
    fn provides(&self) -> Vec<Capability>;

    /// Capabilities this pass reads; defaults to none
    fn depends(&self) -> Vec<Capability> {
        Vec::new()
    }

    /// Performs the extraction, mutating the aggregate.
    ///
    /// An error discards every aggregate write this call made and lets the
    /// rest of the run proceed.
    fn act(&self, aggregate: &mut Aggregate, repo: &dyn ClassRepository) -> Result<()>;
}

/// Shared, nested result store accumulated across all passes in one run.
///
/// Structurally this is an ordered JSON object tree; insertion order is
/// preserved so that repeated runs over the same inputs serialize
/// byte-identically.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Aggregate {
    root: Map<String, Value>,
}

impl Aggregate {
    /// Creates an empty aggregate
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true when no pass has written anything
    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }

    /// Reads a top-level entry
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.root.get(key)
    }

    /// Reads a nested entry by path
    pub fn get_path(&self, path: &[&str]) -> Option<&Value> {
        let (first, rest) = path.split_first()?;
        let mut current = self.root.get(*first)?;
        for key in rest {
            current = current.as_object()?.get(*key)?;
        }
        Some(current)
    }

    /// Reads a nested string entry by path
    pub fn get_str(&self, path: &[&str]) -> Option<&str> {
        self.get_path(path)?.as_str()
    }

    /// Writes a top-level entry, replacing any previous value
    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.root.insert(key.into(), value);
    }

    /// Returns the object under `key`, creating it if missing.
    ///
    /// A non-object value already sitting there is replaced; passes own their
    /// top-level keys, so this only happens on a pass bug.
    pub fn object_mut(&mut self, key: &str) -> &mut Map<String, Value> {
        let slot = self
            .root
            .entry(key.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !slot.is_object() {
            *slot = Value::Object(Map::new());
        }
        slot.as_object_mut().expect("slot was just made an object")
    }

    /// Snapshot of the whole tree as a plain JSON value
    pub fn to_value(&self) -> Value {
        Value::Object(self.root.clone())
    }

    /// Canonical serialized form, stable across identical runs
    pub fn to_json_string(&self) -> Result<String> {
        serde_json::to_string(&self.root).map_err(|e| Error::internal(e.to_string()))
    }
}

/// A pass skipped because an earlier soft failure removed its inputs
#[derive(Debug)]
pub struct SkippedPass {
    /// Identifier of the skipped pass
    pub id: String,
    /// Dependencies that never became available
    pub missing: Vec<Capability>,
}

/// A pass whose `act` returned an error
#[derive(Debug)]
pub struct FailedPass {
    /// Identifier of the failing pass
    pub id: String,
    /// The error it returned
    pub error: Error,
}

/// Outcome of a full scheduler run: best-effort output plus diagnostics
#[derive(Debug)]
pub struct RunReport {
    /// The accumulated result store
    pub aggregate: Aggregate,
    /// Identifiers of passes that completed, in execution order
    pub completed: Vec<String>,
    /// Passes skipped over missing runtime capabilities
    pub skipped: Vec<SkippedPass>,
    /// Passes that failed and were rolled back
    pub failed: Vec<FailedPass>,
}

impl RunReport {
    /// Returns true when every registered pass completed
    pub fn is_clean(&self) -> bool {
        self.skipped.is_empty() && self.failed.is_empty()
    }
}

/// Orders and runs extraction passes with per-pass failure isolation
#[derive(Default)]
pub struct Scheduler {
    passes: Vec<Box<dyn ExtractionPass>>,
}

impl Scheduler {
    /// Creates a scheduler with no passes
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a pass. Passes are immutable once registered.
    pub fn register(&mut self, pass: impl ExtractionPass + 'static) {
        self.passes.push(Box::new(pass));
    }

    /// Builder-style [`register`](Self::register)
    pub fn with_pass(mut self, pass: impl ExtractionPass + 'static) -> Self {
        self.register(pass);
        self
    }

    /// Number of registered passes
    pub fn len(&self) -> usize {
        self.passes.len()
    }

    /// Returns true when no pass is registered
    pub fn is_empty(&self) -> bool {
        self.passes.is_empty()
    }

    /// Computes the execution order without running anything.
    ///
    /// Every pass appears after all passes producing its declared
    /// dependencies. Fails on cycles, unknown dependencies, and duplicate
    /// providers.
    pub fn execution_order(&self) -> Result<Vec<&str>> {
        let order = graph::execution_order(&self.graph_nodes())?;
        Ok(order.into_iter().map(|i| self.passes[i].id()).collect())
    }

    /// Runs all passes leaves-first against the given repository.
    ///
    /// Only scheduling-configuration errors abort; per-pass failures are
    /// rolled back and reported.
    pub fn run(&self, repo: &dyn ClassRepository) -> Result<RunReport> {
        let order = graph::execution_order(&self.graph_nodes())?;

        let mut aggregate = Aggregate::new();
        let mut available: HashSet<Capability> = HashSet::new();
        let mut report = RunReport {
            aggregate: Aggregate::new(),
            completed: Vec::new(),
            skipped: Vec::new(),
            failed: Vec::new(),
        };

        for index in order {
            let pass = &self.passes[index];

            // Static declarations can outrun reality: if an earlier pass
            // soft-failed, a declared dependency may never have materialized.
            let missing: Vec<Capability> = pass
                .depends()
                .into_iter()
                .filter(|capability| !available.contains(capability))
                .collect();

            if !missing.is_empty() {
                warn!(
                    pass = pass.id(),
                    missing = ?missing.iter().map(Capability::as_str).collect::<Vec<_>>(),
                    "skipping pass, dependencies unavailable"
                );
                report.skipped.push(SkippedPass {
                    id: pass.id().to_string(),
                    missing,
                });
                continue;
            }

            debug!(pass = pass.id(), "running pass");
            let snapshot = aggregate.clone();

            match pass.act(&mut aggregate, repo) {
                Ok(()) => {
                    available.extend(pass.provides());
                    report.completed.push(pass.id().to_string());
                }
                Err(e) => {
                    // Don't leave things in a half-written state.
                    error!(pass = pass.id(), error = %e, "pass failed, rolling back");
                    aggregate = snapshot;
                    report.failed.push(FailedPass {
                        id: pass.id().to_string(),
                        error: e,
                    });
                }
            }
        }

        report.aggregate = aggregate;
        Ok(report)
    }

    fn graph_nodes(&self) -> Vec<graph::GraphNode> {
        self.passes
            .iter()
            .map(|pass| graph::GraphNode {
                id: pass.id().to_string(),
                provides: pass.provides(),
                depends: pass.depends(),
            })
            .collect()
    }
}
