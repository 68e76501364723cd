//! # quarry-passes
//!
//! Concrete extraction passes for the quarry engine: the domain units that
//! turn an obfuscated client build into block and packet schema through
//! `quarry-core`'s scheduler, walker and inference machinery.
//!
//! ## Passes
//!
//! - [`IdentifyPass`]: pins down the block registry class and its register
//!   method through an unobfuscatable string landmark
//! - [`BlockRegistrationPass`]: walks the registry initializer and records one
//!   property bag per registered block
//! - [`AdditionalBlockPropertiesPass`]: resolves the friction and
//!   tool-requirement setters, then folds both properties into the blocks
//! - [`PacketFieldsPass`]: captures per-packet instruction traces for the
//!   schema inference engine
//!
//! ## Example
//!
//! ```no_run
//! use quarry_core::{MemoryClassRepository, Result, Scheduler};
//! use quarry_passes::register_block_passes;
//!
//! # fn run(repo: MemoryClassRepository) -> Result<()> {
//! let mut scheduler = Scheduler::new();
//! register_block_passes(&mut scheduler);
//!
//! let report = scheduler.run(&repo)?;
//! for skipped in &report.skipped {
//!     eprintln!("skipped {}", skipped.id);
//! }
//! println!("{}", report.aggregate.to_json_string()?);
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unreachable_pub)]

mod blocks;
mod identify;
mod packets;

#[cfg(test)]
mod fixture;

pub use blocks::{AdditionalBlockPropertiesPass, BlockRegistrationPass};
pub use identify::IdentifyPass;
pub use packets::PacketFieldsPass;

use quarry_core::Scheduler;

/// Registers the block extraction passes in one call.
///
/// The scheduler orders them itself; registration order does not matter.
pub fn register_block_passes(scheduler: &mut Scheduler) {
    scheduler.register(IdentifyPass::new());
    scheduler.register(BlockRegistrationPass::new());
    scheduler.register(AdditionalBlockPropertiesPass::new());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture;
    use pretty_assertions::assert_eq;
    use quarry_core::{
        Aggregate, Capability, ClassRepository, Error, ExtractionPass, MemoryClassRepository,
        Result, RunReport,
    };
    use serde_json::json;

    /// Writes junk into the aggregate, then fails.
    struct SabotagePass;

    impl ExtractionPass for SabotagePass {
        fn id(&self) -> &str {
            "sabotage"
        }

        fn provides(&self) -> Vec<Capability> {
            vec![Capability::from("sabotage")]
        }

        fn act(&self, aggregate: &mut Aggregate, _repo: &dyn ClassRepository) -> Result<()> {
            aggregate.insert("sabotage", json!({"partial": true}));
            Err(Error::internal("induced failure"))
        }
    }

    fn full_run(with_sabotage: bool) -> RunReport {
        let repo = fixture::game_repo();
        let mut scheduler = Scheduler::new();
        register_block_passes(&mut scheduler);
        scheduler.register(fixture::packet_pass());
        if with_sabotage {
            scheduler.register(SabotagePass);
        }
        scheduler.run(&repo).unwrap()
    }

    #[test]
    fn test_full_pipeline_is_clean() {
        let report = full_run(false);
        assert!(report.is_clean());
        assert_eq!(report.completed.len(), 4);

        let aggregate = &report.aggregate;
        assert_eq!(aggregate.get_str(&["classes", "block.list"]), Some("blk"));
        assert!(aggregate.get_path(&["blocks", "block", "stone"]).is_some());
        assert_eq!(
            aggregate
                .get_path(&["blocks", "block", "ice", "friction"])
                .unwrap(),
            &json!(0.98)
        );
        assert!(aggregate
            .get_path(&["packets", "pkt", "instructions"])
            .is_some());
    }

    #[test]
    fn test_pipeline_is_idempotent() {
        let first = full_run(false).aggregate.to_json_string().unwrap();
        let second = full_run(false).aggregate.to_json_string().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_induced_failure_leaves_other_passes_untouched() {
        let sabotaged = full_run(true);
        let clean = full_run(false);

        assert_eq!(sabotaged.failed.len(), 1);
        assert_eq!(sabotaged.failed[0].id, "sabotage");
        assert!(sabotaged.aggregate.get("sabotage").is_none());

        // Outside the failing pass's own keys the aggregates are identical.
        assert_eq!(
            sabotaged.aggregate.to_json_string().unwrap(),
            clean.aggregate.to_json_string().unwrap()
        );
    }

    #[test]
    fn test_identification_failure_skips_dependent_passes() {
        let repo = MemoryClassRepository::new();
        let mut scheduler = Scheduler::new();
        register_block_passes(&mut scheduler);

        let report = scheduler.run(&repo).unwrap();

        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].id, "identify");

        let skipped: Vec<&str> = report.skipped.iter().map(|s| s.id.as_str()).collect();
        assert!(skipped.contains(&"block-registration"));
        assert!(skipped.contains(&"additional-block-properties"));
        assert!(report.aggregate.is_empty());
    }

    #[test]
    fn test_scheduler_orders_block_passes() {
        let mut scheduler = Scheduler::new();
        // Register in reverse to prove ordering comes from declarations.
        scheduler.register(AdditionalBlockPropertiesPass::new());
        scheduler.register(BlockRegistrationPass::new());
        scheduler.register(IdentifyPass::new());

        let order = scheduler.execution_order().unwrap();
        let pos = |id: &str| order.iter().position(|p| *p == id).unwrap();
        assert!(pos("identify") < pos("block-registration"));
        assert!(pos("block-registration") < pos("additional-block-properties"));
    }
}
