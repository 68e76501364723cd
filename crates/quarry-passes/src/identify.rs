//! Landmark identification: locating the block registry among obfuscated classes.
//!
//! Obfuscation renames everything but cannot rename string constants. The
//! registry class guards its static initializer with a well-known bootstrap
//! error message, so scanning every class for that literal pins the registry
//! down; the register method and the block superclass then fall out of its
//! method signatures.

use quarry_core::repo::{visit_insns, ClassRepository, Insn, Literal, MethodDesc, TypeDesc};
use quarry_core::{Aggregate, Capability, Error, ExtractionPass, Result};
use serde_json::json;
use tracing::debug;

/// Bootstrap guard literal emitted into the registry's static initializer
const REGISTRY_BOOTSTRAP_MARKER: &str = "Accessed Blocks before Bootstrap!";

/// Identifies the block registry class, its register method, and the block
/// superclass. Provides `block-list`, `block-register`, `block-superclass`.
#[derive(Debug, Default)]
pub struct IdentifyPass;

impl IdentifyPass {
    /// Creates the pass
    pub fn new() -> Self {
        Self
    }
}

impl ExtractionPass for IdentifyPass {
    fn id(&self) -> &str {
        "identify"
    }

    fn provides(&self) -> Vec<Capability> {
        vec![
            Capability::from("block-list"),
            Capability::from("block-register"),
            Capability::from("block-superclass"),
        ]
    }

    fn act(&self, aggregate: &mut Aggregate, repo: &dyn ClassRepository) -> Result<()> {
        let registry = repo
            .class_names()
            .into_iter()
            .filter_map(|name| repo.load_class(&name))
            .find(|class| {
                class
                    .methods
                    .iter()
                    .any(|m| contains_marker(&m.instructions))
            })
            .ok_or_else(|| {
                Error::landmark("<archive>", "the block registry bootstrap marker")
            })?;

        debug!(registry = %registry.name, "found block registry class");

        // The register method is the static (String, Block) -> Block entry;
        // the block superclass is whatever that second argument names.
        let mut register = None;
        for method in registry.methods.iter().filter(|m| m.is_static) {
            let desc = match method.desc() {
                Ok(desc) => desc,
                Err(_) => continue,
            };
            if is_register_signature(&desc) {
                register = Some((method, desc));
                break;
            }
        }

        let (register, desc) = register.ok_or_else(|| {
            Error::landmark(&registry.name, "the static block register method")
        })?;
        let superclass = desc.args[1]
            .class_name()
            .ok_or_else(|| Error::landmark(&registry.name, "the block superclass"))?;

        debug!(register = %register.name, superclass, "identified register method");

        let classes = aggregate.object_mut("classes");
        classes.insert("block.list".to_string(), json!(registry.name));
        classes.insert("block.register".to_string(), json!(register.name));
        classes.insert("block.superclass".to_string(), json!(superclass));
        Ok(())
    }
}

fn contains_marker(instructions: &[Insn]) -> bool {
    let mut found = false;
    visit_insns(instructions, &mut |insn| {
        if let Insn::Const(Literal::Str(text)) = insn {
            if text == REGISTRY_BOOTSTRAP_MARKER {
                found = true;
            }
        }
    });
    found
}

fn is_register_signature(desc: &MethodDesc) -> bool {
    desc.args.len() == 2
        && desc.args[0] == TypeDesc::Object("java/lang/String".to_string())
        && desc.args[1].class_name().is_some()
        && desc.args[1] == desc.ret
}
