//! Block extraction: registration walking and additional block properties.
//!
//! The registry class builds every block in its static initializer through
//! obfuscated builder chains. [`BlockRegistrationPass`] walks that initializer
//! and records one property bag per registered block. Afterwards,
//! [`AdditionalBlockPropertiesPass`] re-walks it with two setters resolved —
//! friction and tool requirement — and folds their values into the recorded
//! bags.
//!
//! Setter resolution never uses names: the friction setter is found through
//! its 0.6 default constant, and the tool-requirement setter through the
//! call chain that reads it back during block breaking. Both are landmark
//! scans over decompiled bodies, so a reshuffled obfuscation mapping does not
//! move them.

use std::collections::HashMap;

use quarry_core::repo::{
    visit_insns, ClassDef, ClassRepository, FieldRef, Insn, InvokeKind, Literal, MethodRef,
    TypeDesc,
};
use quarry_core::walker::{walk_method, walk_method_with_args, Walk, WalkerCallback};
use quarry_core::{
    Aggregate, Capability, Error, ExtractionPass, Result, SymbolicValue,
};
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

/// Walks the registry initializer and records every registered block.
/// Provides `blocks`.
#[derive(Debug, Default)]
pub struct BlockRegistrationPass;

impl BlockRegistrationPass {
    /// Creates the pass
    pub fn new() -> Self {
        Self
    }
}

impl ExtractionPass for BlockRegistrationPass {
    fn id(&self) -> &str {
        "block-registration"
    }

    fn provides(&self) -> Vec<Capability> {
        vec![Capability::from("blocks")]
    }

    fn depends(&self) -> Vec<Capability> {
        vec![
            Capability::from("block-list"),
            Capability::from("block-register"),
            Capability::from("block-superclass"),
        ]
    }

    fn act(&self, aggregate: &mut Aggregate, repo: &dyn ClassRepository) -> Result<()> {
        let (registry, block_class, props_class) = registry_context(aggregate, repo)?;
        let clinit = registry
            .method("<clinit>")
            .ok_or_else(|| Error::method_not_found(&registry.name, "<clinit>"))?;

        let mut walker = RegistryWalker::new(&registry, &block_class, &props_class);
        walk_method(&registry, clinit, &mut walker)?;

        let RegistryWalker {
            order,
            bags,
            by_field,
            ..
        } = walker;

        let mut block_map = Map::new();
        for id in &order {
            if let Some(bag) = bags.get(id) {
                block_map.insert(id.clone(), bag.to_json());
            }
        }

        let mut field_map = Map::new();
        for (field, bag) in &by_field {
            if let Some(id) = bag.bag_get("text_id") {
                field_map.insert(field.clone(), id);
            }
        }

        debug!(blocks = order.len(), "block registration complete");

        let blocks = aggregate.object_mut("blocks");
        blocks.insert("block".to_string(), Value::Object(block_map));
        blocks.insert("ordered_blocks".to_string(), json!(order));
        blocks.insert("block_fields".to_string(), Value::Object(field_map));
        Ok(())
    }
}

/// Resolves the friction and tool-requirement setters, then re-walks
/// registration to fold both properties into the recorded blocks.
/// Provides `blocks.friction` and `blocks.requires-correct-tool`.
#[derive(Debug, Default)]
pub struct AdditionalBlockPropertiesPass;

impl AdditionalBlockPropertiesPass {
    /// Creates the pass
    pub fn new() -> Self {
        Self
    }
}

impl ExtractionPass for AdditionalBlockPropertiesPass {
    fn id(&self) -> &str {
        "additional-block-properties"
    }

    fn provides(&self) -> Vec<Capability> {
        vec![
            Capability::from("blocks.friction"),
            Capability::from("blocks.requires-correct-tool"),
        ]
    }

    fn depends(&self) -> Vec<Capability> {
        vec![
            Capability::from("blocks"),
            Capability::from("block-superclass"),
        ]
    }

    fn act(&self, aggregate: &mut Aggregate, repo: &dyn ClassRepository) -> Result<()> {
        let (registry, block_class, props_class) = registry_context(aggregate, repo)?;

        let props = repo
            .load_class(&props_class)
            .ok_or_else(|| Error::class_not_found(&props_class))?;
        let friction_setter = find_friction_setter(&props)?;

        // The builder is a nested class of the behaviour it configures.
        let behaviour_name = props_class.split('$').next().unwrap_or(&props_class);
        let behaviour = repo
            .load_class(behaviour_name)
            .ok_or_else(|| Error::class_not_found(behaviour_name))?;
        let tool_setter = find_correct_tool_setter(repo, &behaviour)?;

        debug!(
            friction = %friction_setter.0,
            tool = %tool_setter.0,
            "resolved property setters"
        );

        let clinit = registry
            .method("<clinit>")
            .ok_or_else(|| Error::method_not_found(&registry.name, "<clinit>"))?;

        let mut walker = RegistryWalker::new(&registry, &block_class, &props_class)
            .with_setters(friction_setter, tool_setter);
        walk_method(&registry, clinit, &mut walker)?;

        let RegistryWalker { order, bags, .. } = walker;

        let blocks = aggregate.object_mut("blocks");
        let Some(Value::Object(block_map)) = blocks.get_mut("block") else {
            return Err(Error::missing_aggregate_key("blocks.block"));
        };

        for id in &order {
            let Some(bag) = bags.get(id) else { continue };
            let Value::Object(update) = bag.to_json() else { continue };
            match block_map.get_mut(id) {
                Some(Value::Object(existing)) => existing.extend(update),
                _ => {
                    block_map.insert(id.clone(), Value::Object(update));
                }
            }
        }

        Ok(())
    }
}

/// Loads the registry/block/properties classes recorded by identification.
fn registry_context(
    aggregate: &Aggregate,
    repo: &dyn ClassRepository,
) -> Result<(std::sync::Arc<ClassDef>, String, String)> {
    let registry_name = aggregate
        .get_str(&["classes", "block.list"])
        .ok_or_else(|| Error::missing_aggregate_key("classes.block.list"))?
        .to_string();
    let block_class = aggregate
        .get_str(&["classes", "block.superclass"])
        .ok_or_else(|| Error::missing_aggregate_key("classes.block.superclass"))?
        .to_string();

    let registry = repo
        .load_class(&registry_name)
        .ok_or_else(|| Error::class_not_found(&registry_name))?;
    let props_class = props_class_of(repo, &block_class)?;
    Ok((registry, block_class, props_class))
}

/// The properties class is the block constructor's builder argument.
fn props_class_of(repo: &dyn ClassRepository, block_class: &str) -> Result<String> {
    let class = repo
        .load_class(block_class)
        .ok_or_else(|| Error::class_not_found(block_class))?;
    let ctor = class
        .method("<init>")
        .ok_or_else(|| Error::method_not_found(block_class, "<init>"))?;
    ctor.desc()?
        .args
        .first()
        .and_then(TypeDesc::class_name)
        .map(str::to_string)
        .ok_or_else(|| Error::landmark(block_class, "a properties-typed constructor argument"))
}

/// Finds the friction setter through its 0.6 default.
///
/// The builder constructor assigns the default right after loading the 0.6
/// constant; the setter is then the single-float-argument method writing the
/// same field.
fn find_friction_setter(props: &ClassDef) -> Result<(String, String)> {
    let ctor = props
        .method("<init>")
        .ok_or_else(|| Error::method_not_found(&props.name, "<init>"))?;

    let mut found_const = false;
    let mut friction_field: Option<FieldRef> = None;
    visit_insns(&ctor.instructions, &mut |insn| match insn {
        Insn::Const(Literal::Float(v)) if (v - 0.6).abs() < 1e-5 => found_const = true,
        Insn::PutField(field) if found_const && friction_field.is_none() => {
            friction_field = Some(field.clone());
        }
        _ => {}
    });

    let friction_field =
        friction_field.ok_or_else(|| Error::landmark(&props.name, "the friction field"))?;

    for method in &props.methods {
        let Ok(desc) = method.desc() else { continue };
        if desc.args != [TypeDesc::Float] {
            continue;
        }
        if writes_field(&method.instructions, &friction_field) {
            return Ok((method.name.clone(), method.descriptor.clone()));
        }
    }

    Err(Error::landmark(&props.name, "the friction setter"))
}

/// Finds the tool-requirement setter by following the break-speed call chain:
/// destroy progress, the player's tool check, the state's requirement read,
/// the state constructor copying it out of the builder, and finally the
/// zero-argument builder method writing that field.
fn find_correct_tool_setter(
    repo: &dyn ClassRepository,
    behaviour: &ClassDef,
) -> Result<(String, String)> {
    let mut candidates = Vec::new();
    for method in &behaviour.methods {
        let Ok(desc) = method.desc() else { continue };
        if desc.ret == TypeDesc::Float
            && desc.args.len() == 4
            && desc.args.iter().all(|a| matches!(a, TypeDesc::Object(_)))
        {
            candidates.push((method, desc));
        }
    }

    if candidates.len() != 1 {
        return Err(Error::landmark(
            &behaviour.name,
            "a unique destroy progress method",
        ));
    }
    let (progress, desc) = candidates.remove(0);

    let player_class = desc.args[1]
        .class_name()
        .ok_or_else(|| Error::landmark(&behaviour.name, "a player-typed argument"))?;

    // The only call against the player argument is the tool check.
    let tool_check = first_virtual_call(&progress.instructions, Some(player_class))
        .ok_or_else(|| Error::landmark(&behaviour.name, "the player tool check call"))?;

    let player = repo
        .load_class(player_class)
        .ok_or_else(|| Error::class_not_found(player_class))?;
    let has_tool = player
        .method_with_descriptor(&tool_check.name, &tool_check.descriptor)
        .ok_or_else(|| Error::method_not_found(player_class, &tool_check.name))?;

    // First call inside the tool check targets the block state's requirement
    // accessor.
    let state_call = first_virtual_call(&has_tool.instructions, None)
        .ok_or_else(|| Error::landmark(&player.name, "the state requirement call"))?;
    let state = repo
        .load_class(&state_call.class)
        .ok_or_else(|| Error::class_not_found(&state_call.class))?;
    let requires = state
        .method_with_descriptor(&state_call.name, &state_call.descriptor)
        .ok_or_else(|| Error::method_not_found(&state.name, &state_call.name))?;

    let mut state_field: Option<FieldRef> = None;
    visit_insns(&requires.instructions, &mut |insn| {
        if state_field.is_none() {
            if let Insn::GetField(field) = insn {
                state_field = Some(field.clone());
            }
        }
    });
    let state_field =
        state_field.ok_or_else(|| Error::landmark(&state.name, "the requirement backing field"))?;

    // The state constructor copies the builder field into the state field;
    // the read feeding that write names the builder field.
    let ctor = state
        .method("<init>")
        .ok_or_else(|| Error::method_not_found(&state.name, "<init>"))?;
    let mut last_get: Option<FieldRef> = None;
    let mut props_field: Option<FieldRef> = None;
    visit_insns(&ctor.instructions, &mut |insn| match insn {
        Insn::GetField(field) if props_field.is_none() => last_get = Some(field.clone()),
        Insn::PutField(field) if props_field.is_none() && *field == state_field => {
            props_field = last_get.clone();
        }
        _ => {}
    });
    let props_field = props_field
        .ok_or_else(|| Error::landmark(&state.name, "the builder requirement field"))?;

    let props = repo
        .load_class(&props_field.class)
        .ok_or_else(|| Error::class_not_found(&props_field.class))?;
    for method in &props.methods {
        let Ok(desc) = method.desc() else { continue };
        if !desc.args.is_empty() {
            continue;
        }
        if writes_field(&method.instructions, &props_field) {
            return Ok((method.name.clone(), method.descriptor.clone()));
        }
    }

    Err(Error::landmark(&props.name, "the tool requirement setter"))
}

fn first_virtual_call(instructions: &[Insn], class: Option<&str>) -> Option<MethodRef> {
    let mut found: Option<MethodRef> = None;
    visit_insns(instructions, &mut |insn| {
        if found.is_none() {
            if let Insn::Invoke {
                kind: InvokeKind::Virtual,
                target,
            } = insn
            {
                if class.map_or(true, |c| target.class == c) {
                    found = Some(target.clone());
                }
            }
        }
    });
    found
}

fn writes_field(instructions: &[Insn], field: &FieldRef) -> bool {
    let mut writes = false;
    visit_insns(instructions, &mut |insn| {
        if let Insn::PutField(f) = insn {
            if f == field {
                writes = true;
            }
        }
    });
    writes
}

/// Callback for walking block registration.
///
/// Mostly the shape of a registry walk is builder chains: a fresh bag per
/// allocation and per foreign static factory, merged into the block through
/// its constructor, and committed under a text id at the static register
/// call. Iteration bytecode (`hasNext`) marks the end of registration.
struct RegistryWalker<'a> {
    registry: &'a ClassDef,
    block_class: &'a str,
    props_class: &'a str,
    friction_setter: Option<(String, String)>,
    tool_setter: Option<(String, String)>,
    order: Vec<String>,
    bags: HashMap<String, SymbolicValue>,
    by_field: Vec<(String, SymbolicValue)>,
}

impl<'a> RegistryWalker<'a> {
    fn new(registry: &'a ClassDef, block_class: &'a str, props_class: &'a str) -> Self {
        Self {
            registry,
            block_class,
            props_class,
            friction_setter: None,
            tool_setter: None,
            order: Vec::new(),
            bags: HashMap::new(),
            by_field: Vec::new(),
        }
    }

    fn with_setters(
        mut self,
        friction_setter: (String, String),
        tool_setter: (String, String),
    ) -> Self {
        self.friction_setter = Some(friction_setter);
        self.tool_setter = Some(tool_setter);
        self
    }

    fn is_register(&self, target: &MethodRef) -> Result<bool> {
        let desc = target.desc()?;
        Ok(desc.args.len() == 2
            && desc.args[0] == TypeDesc::Object("java/lang/String".to_string())
            && desc.args[1].class_name() == Some(self.block_class))
    }
}

impl WalkerCallback for RegistryWalker<'_> {
    fn on_new(&mut self, class: &str) -> Result<Walk> {
        let mut entries = vec![("class".to_string(), json!(class))];
        if self.tool_setter.is_some() {
            entries.push(("requires_correct_tool_for_drops".to_string(), json!(false)));
        }
        Ok(Walk::Push(SymbolicValue::bag_from(entries)))
    }

    fn on_invoke(
        &mut self,
        kind: InvokeKind,
        target: &MethodRef,
        receiver: Option<SymbolicValue>,
        args: Vec<SymbolicValue>,
    ) -> Result<Walk> {
        if kind == InvokeKind::Static {
            if target.class == self.registry.name {
                if self.is_register(target)? {
                    let block = args
                        .get(1)
                        .cloned()
                        .unwrap_or_else(SymbolicValue::bag);
                    match args.first().and_then(SymbolicValue::as_str) {
                        Some(id) => {
                            let id = id.to_string();
                            block.bag_insert("text_id", json!(id));
                            if !self.order.contains(&id) {
                                self.order.push(id.clone());
                            }
                            self.bags.insert(id, block.clone());
                        }
                        None => warn!(
                            registry = %self.registry.name,
                            "register call with non-constant id"
                        ),
                    }
                    return Ok(Walk::Push(block));
                }

                // Same-class helper (split registration methods); follow it
                // with the resolved arguments.
                let registry = self.registry;
                let method = registry
                    .method_with_descriptor(&target.name, &target.descriptor)
                    .ok_or_else(|| Error::method_not_found(&registry.name, &target.name))?
                    .clone();
                let result = walk_method_with_args(registry, &method, self, args)?;
                return Ok(Walk::Push(result));
            }

            // A foreign static factory; assume it starts a fresh builder.
            return Ok(Walk::Push(SymbolicValue::bag()));
        }

        if target.name == "hasNext" {
            // Registration is over; the initializer is iterating registry keys.
            return Ok(Walk::Stop);
        }

        let desc = target.desc()?;
        let receiver = receiver.unwrap_or(SymbolicValue::Opaque);

        if let Some((name, descriptor)) = &self.friction_setter {
            if target.name == *name && target.descriptor == *descriptor {
                if let Some(value) = args.first() {
                    receiver.bag_insert("friction", value.to_json());
                }
            }
        }

        if let Some((name, descriptor)) = &self.tool_setter {
            if target.name == *name && target.descriptor == *descriptor {
                receiver.bag_insert("requires_correct_tool_for_drops", json!(true));
            }
        }

        if target.name == "<init>" {
            // Most blocks take the builder as their only constructor argument,
            // but some put extra arguments before or after it; find it by type.
            for (index, arg_ty) in desc.args.iter().enumerate() {
                if arg_ty.class_name() == Some(self.props_class) {
                    if let Some(props) = args.get(index) {
                        receiver.merge_bag(props);
                    }
                    break;
                }
            }
        }

        match desc.ret.class_name() {
            Some(ret) if ret == self.props_class || ret == self.block_class => {
                Ok(Walk::Push(receiver))
            }
            _ if !desc.ret.is_void() => Ok(Walk::Push(SymbolicValue::Opaque)),
            _ => Ok(Walk::Push(SymbolicValue::Absent)),
        }
    }

    fn on_get_field(
        &mut self,
        field: &FieldRef,
        _receiver: Option<SymbolicValue>,
    ) -> Result<Walk> {
        if field.class == self.registry.name {
            // Reading back an already-registered block.
            if let Some((_, bag)) = self.by_field.iter().find(|(name, _)| name == &field.name) {
                return Ok(Walk::Push(bag.clone()));
            }
            return Ok(Walk::Push(SymbolicValue::Opaque));
        }

        if field.descriptor == "Ljava/util/function/ToIntFunction;" {
            // Light level function; its value depends on the block state.
            return Ok(Walk::Push(SymbolicValue::Absent));
        }

        Ok(Walk::Push(SymbolicValue::Opaque))
    }

    fn on_put_field(
        &mut self,
        field: &FieldRef,
        receiver: Option<SymbolicValue>,
        value: SymbolicValue,
    ) -> Result<Walk> {
        if receiver.is_none()
            && field.class == self.registry.name
            && matches!(value, SymbolicValue::Bag(_))
        {
            match self.by_field.iter().position(|(name, _)| name == &field.name) {
                Some(index) => self.by_field[index].1 = value,
                None => self.by_field.push((field.name.clone(), value)),
            }
        }
        Ok(Walk::Push(SymbolicValue::Absent))
    }

    fn on_invokedynamic(
        &mut self,
        target: &MethodRef,
        _args: Vec<SymbolicValue>,
    ) -> Result<Walk> {
        let desc = target.desc()?;
        if desc.ret.class_name() == Some("java/util/function/ToIntFunction") {
            // Light level lambda; nothing to evaluate here.
            return Ok(Walk::Push(SymbolicValue::Absent));
        }
        Ok(Walk::Push(SymbolicValue::Opaque))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture;
    use crate::identify::IdentifyPass;
    use pretty_assertions::assert_eq;

    fn aggregate_after_registration() -> Aggregate {
        let repo = fixture::game_repo();
        let mut aggregate = Aggregate::new();
        IdentifyPass::new().act(&mut aggregate, &repo).unwrap();
        BlockRegistrationPass::new()
            .act(&mut aggregate, &repo)
            .unwrap();
        aggregate
    }

    #[test]
    fn test_registration_records_blocks_in_order() {
        let aggregate = aggregate_after_registration();
        let order = aggregate
            .get_path(&["blocks", "ordered_blocks"])
            .unwrap()
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_str().unwrap().to_string())
            .collect::<Vec<_>>();

        assert_eq!(
            order,
            vec!["stone", "ice", "obsidian", "oak_log", "stone_stairs"]
        );
    }

    #[test]
    fn test_registration_stops_at_iteration() {
        let aggregate = aggregate_after_registration();
        assert!(aggregate
            .get_path(&["blocks", "block", "should_not_register"])
            .is_none());
    }

    #[test]
    fn test_helper_registered_block_is_captured() {
        let aggregate = aggregate_after_registration();
        let oak = aggregate
            .get_path(&["blocks", "block", "oak_log"])
            .unwrap();
        assert_eq!(oak["class"], json!("bsc"));
        assert_eq!(oak["text_id"], json!("oak_log"));
    }

    #[test]
    fn test_static_fields_map_to_text_ids() {
        let aggregate = aggregate_after_registration();
        let fields = aggregate
            .get_path(&["blocks", "block_fields"])
            .unwrap()
            .as_object()
            .unwrap();
        assert_eq!(fields["A"], json!("stone"));
        assert_eq!(fields["C"], json!("obsidian"));
    }

    #[test]
    fn test_find_friction_setter_by_default_constant() {
        let repo = fixture::game_repo();
        let props = repo.load_class("bbh$a").unwrap();
        let (name, descriptor) = find_friction_setter(&props).unwrap();
        assert_eq!(name, "s");
        assert_eq!(descriptor, "(F)Lbbh$a;");
    }

    #[test]
    fn test_find_correct_tool_setter_by_call_chain() {
        let repo = fixture::game_repo();
        let behaviour = repo.load_class("bbh").unwrap();
        let (name, descriptor) = find_correct_tool_setter(&repo, &behaviour).unwrap();
        assert_eq!(name, "t");
        assert_eq!(descriptor, "()Lbbh$a;");
    }

    #[test]
    fn test_additional_properties_fold_into_blocks() {
        let repo = fixture::game_repo();
        let mut aggregate = aggregate_after_registration();
        AdditionalBlockPropertiesPass::new()
            .act(&mut aggregate, &repo)
            .unwrap();

        let ice = aggregate.get_path(&["blocks", "block", "ice"]).unwrap();
        assert_eq!(ice["friction"], json!(0.98));

        let obsidian = aggregate
            .get_path(&["blocks", "block", "obsidian"])
            .unwrap();
        assert_eq!(obsidian["requires_correct_tool_for_drops"], json!(true));

        let stone = aggregate.get_path(&["blocks", "block", "stone"]).unwrap();
        assert_eq!(stone["requires_correct_tool_for_drops"], json!(false));
        assert!(stone.get("friction").is_none());
    }
}
