//! A synthetic obfuscated class set shaped like a real client build.
//!
//! Class names follow the obfuscator's output: `blk` is the block registry,
//! `bsc` the block superclass, `bbh` the block behaviour with its nested
//! builder `bbh$a`, `ply` the player, `bst` the block state, and `pkt` a
//! packet with a `(buf)V` serialization method.

use quarry_core::repo::{BlockKind, ClassDef, FieldDef, FieldRef, Insn, Literal, MethodDef};
use quarry_core::MemoryClassRepository;

use crate::packets::PacketFieldsPass;

const MARKER: &str = "Accessed Blocks before Bootstrap!";

pub(crate) fn game_repo() -> MemoryClassRepository {
    MemoryClassRepository::new()
        .with_class(registry_class())
        .with_class(block_class())
        .with_class(properties_class())
        .with_class(behaviour_class())
        .with_class(player_class())
        .with_class(state_class())
        .with_class(packet_class())
}

pub(crate) fn packet_pass() -> PacketFieldsPass {
    PacketFieldsPass::new("buf")
        .packet("pkt")
        .writer("writeVarInt", "varint")
        .writer("writeVarLong", "varlong")
        .writer("writeString", "string")
        .writer("writeBoolean", "boolean")
        .writer("writeUuid", "uuid")
}

fn register_call() -> Insn {
    Insn::invoke_static("blk", "a", "(Ljava/lang/String;Lbsc;)Lbsc;")
}

fn registry_class() -> ClassDef {
    let mut class = ClassDef::new("blk");
    for field in ["A", "B", "C", "D", "E"] {
        class.fields.push(FieldDef::new_static(field, "Lbsc;"));
    }

    let mut clinit = vec![
        Insn::Const(Literal::Str(MARKER.to_string())),
        Insn::Pop,
        // stone: plain builder
        Insn::Const(Literal::Str("stone".to_string())),
        Insn::New { class: "bsc".to_string() },
        Insn::Dup,
        Insn::invoke_static("bbh$a", "c", "()Lbbh$a;"),
        Insn::invoke_special("bsc", "<init>", "(Lbbh$a;)V"),
        register_call(),
        Insn::PutStatic(FieldRef::new("blk", "A", "Lbsc;")),
        // ice: friction 0.98
        Insn::Const(Literal::Str("ice".to_string())),
        Insn::New { class: "bsc".to_string() },
        Insn::Dup,
        Insn::invoke_static("bbh$a", "c", "()Lbbh$a;"),
        Insn::Const(Literal::Float(0.98)),
        Insn::invoke_virtual("bbh$a", "s", "(F)Lbbh$a;"),
        Insn::invoke_special("bsc", "<init>", "(Lbbh$a;)V"),
        register_call(),
        Insn::PutStatic(FieldRef::new("blk", "B", "Lbsc;")),
        // obsidian: requires the correct tool
        Insn::Const(Literal::Str("obsidian".to_string())),
        Insn::New { class: "bsc".to_string() },
        Insn::Dup,
        Insn::invoke_static("bbh$a", "c", "()Lbbh$a;"),
        Insn::invoke_virtual("bbh$a", "t", "()Lbbh$a;"),
        Insn::invoke_special("bsc", "<init>", "(Lbbh$a;)V"),
        register_call(),
        Insn::PutStatic(FieldRef::new("blk", "C", "Lbsc;")),
        // oak_log: registered through a helper method
        Insn::Const(Literal::Str("oak_log".to_string())),
        Insn::invoke_static("blk", "b", "(Ljava/lang/String;)Lbsc;"),
        Insn::PutStatic(FieldRef::new("blk", "D", "Lbsc;")),
        // stone_stairs: copies the stone block's properties
        Insn::Const(Literal::Str("stone_stairs".to_string())),
        Insn::New { class: "bsc".to_string() },
        Insn::Dup,
        Insn::GetStatic(FieldRef::new("blk", "A", "Lbsc;")),
        Insn::invoke_static("bbh$a", "d", "(Lbsc;)Lbbh$a;"),
        Insn::invoke_special("bsc", "<init>", "(Lbbh$a;)V"),
        register_call(),
        Insn::PutStatic(FieldRef::new("blk", "E", "Lbsc;")),
        // registration is over; the initializer starts iterating registry keys
        Insn::GetStatic(FieldRef::new("reg", "KEYS", "Ljava/util/Set;")),
        Insn::invoke_interface("java/util/Set", "iterator", "()Ljava/util/Iterator;"),
        Insn::invoke_interface("java/util/Iterator", "hasNext", "()Z"),
    ];
    // Anything past the iteration must never be seen by a walk.
    clinit.extend([
        Insn::Pop,
        Insn::Const(Literal::Str("should_not_register".to_string())),
        Insn::New { class: "bsc".to_string() },
        Insn::Dup,
        Insn::invoke_static("bbh$a", "c", "()Lbbh$a;"),
        Insn::invoke_special("bsc", "<init>", "(Lbbh$a;)V"),
        register_call(),
        Insn::Pop,
        Insn::Return { value: false },
    ]);

    class
        .methods
        .push(MethodDef::new_static("<clinit>", "()V", clinit));

    class.methods.push(MethodDef::new_static(
        "a",
        "(Ljava/lang/String;Lbsc;)Lbsc;",
        vec![Insn::Load(1), Insn::Return { value: true }],
    ));

    // 20w12a-style split registration helper.
    class.methods.push(MethodDef::new_static(
        "b",
        "(Ljava/lang/String;)Lbsc;",
        vec![
            Insn::Load(0),
            Insn::New { class: "bsc".to_string() },
            Insn::Dup,
            Insn::invoke_static("bbh$a", "c", "()Lbbh$a;"),
            Insn::invoke_special("bsc", "<init>", "(Lbbh$a;)V"),
            register_call(),
            Insn::Return { value: true },
        ],
    ));

    class
}

fn block_class() -> ClassDef {
    let mut class = ClassDef::new("bsc");
    class.super_name = Some("bbh".to_string());
    class.methods.push(MethodDef::new(
        "<init>",
        "(Lbbh$a;)V",
        vec![Insn::Return { value: false }],
    ));
    class
}

fn properties_class() -> ClassDef {
    let mut class = ClassDef::new("bbh$a");
    class.fields.push(FieldDef::new("f", "F"));
    class.fields.push(FieldDef::new("j", "F"));
    class.fields.push(FieldDef::new("rt", "Z"));
    class.fields.push(FieldDef::new("g", "Z"));

    class.methods.push(MethodDef::new(
        "<init>",
        "()V",
        vec![
            Insn::Load(0),
            Insn::Const(Literal::Float(0.6)),
            Insn::PutField(FieldRef::new("bbh$a", "f", "F")),
            Insn::Load(0),
            Insn::Const(Literal::Int(0)),
            Insn::PutField(FieldRef::new("bbh$a", "g", "Z")),
            Insn::Return { value: false },
        ],
    ));

    class.methods.push(MethodDef::new_static(
        "c",
        "()Lbbh$a;",
        vec![
            Insn::New { class: "bbh$a".to_string() },
            Insn::Dup,
            Insn::invoke_special("bbh$a", "<init>", "()V"),
            Insn::Return { value: true },
        ],
    ));

    class.methods.push(MethodDef::new_static(
        "d",
        "(Lbsc;)Lbbh$a;",
        vec![
            Insn::invoke_static("bbh$a", "c", "()Lbbh$a;"),
            Insn::Return { value: true },
        ],
    ));

    // Decoy single-float setter writing a different field (jump factor).
    class.methods.push(MethodDef::new(
        "u",
        "(F)Lbbh$a;",
        vec![
            Insn::Load(0),
            Insn::Load(1),
            Insn::PutField(FieldRef::new("bbh$a", "j", "F")),
            Insn::Load(0),
            Insn::Return { value: true },
        ],
    ));

    class.methods.push(MethodDef::new(
        "s",
        "(F)Lbbh$a;",
        vec![
            Insn::Load(0),
            Insn::Load(1),
            Insn::PutField(FieldRef::new("bbh$a", "f", "F")),
            Insn::Load(0),
            Insn::Return { value: true },
        ],
    ));

    class.methods.push(MethodDef::new(
        "t",
        "()Lbbh$a;",
        vec![
            Insn::Load(0),
            Insn::Const(Literal::Int(1)),
            Insn::PutField(FieldRef::new("bbh$a", "rt", "Z")),
            Insn::Load(0),
            Insn::Return { value: true },
        ],
    ));

    class
}

fn behaviour_class() -> ClassDef {
    let mut class = ClassDef::new("bbh");
    // getDestroyProgress analog: four object arguments, float return.
    class.methods.push(MethodDef::new(
        "p",
        "(Lbst;Lply;Lbgt;Lbps;)F",
        vec![
            Insn::Load(2),
            Insn::invoke_virtual("ply", "h", "()Z"),
            Insn::Pop,
            Insn::Const(Literal::Float(1.0)),
            Insn::Return { value: true },
        ],
    ));
    // Decoy float-returning method with the wrong arity.
    class.methods.push(MethodDef::new(
        "q",
        "(FF)F",
        vec![Insn::Const(Literal::Float(0.0)), Insn::Return { value: true }],
    ));
    class
}

fn player_class() -> ClassDef {
    let mut class = ClassDef::new("ply");
    class.methods.push(MethodDef::new(
        "h",
        "()Z",
        vec![
            Insn::Load(0),
            Insn::invoke_virtual("bst", "r", "()Z"),
            Insn::Return { value: true },
        ],
    ));
    class
}

fn state_class() -> ClassDef {
    let mut class = ClassDef::new("bst");
    class.fields.push(FieldDef::new("rtf", "Z"));
    class.fields.push(FieldDef::new("fr", "F"));

    class.methods.push(MethodDef::new(
        "r",
        "()Z",
        vec![
            Insn::Load(0),
            Insn::GetField(FieldRef::new("bst", "rtf", "Z")),
            Insn::Return { value: true },
        ],
    ));

    class.methods.push(MethodDef::new(
        "<init>",
        "(Lbbh$a;)V",
        vec![
            Insn::Load(0),
            Insn::Load(1),
            Insn::GetField(FieldRef::new("bbh$a", "rt", "Z")),
            Insn::PutField(FieldRef::new("bst", "rtf", "Z")),
            Insn::Load(0),
            Insn::Load(1),
            Insn::GetField(FieldRef::new("bbh$a", "f", "F")),
            Insn::PutField(FieldRef::new("bst", "fr", "F")),
            Insn::Return { value: false },
        ],
    ));

    class
}

fn packet_class() -> ClassDef {
    let mut class = ClassDef::new("pkt");
    class.fields.push(FieldDef::new("a", "I"));
    class.fields.push(FieldDef::new("b", "Ljava/util/List;"));
    class.fields.push(FieldDef::new("c", "Ljava/util/Optional;"));
    class.fields.push(FieldDef::new("d", "Ljava/util/Map;"));

    let write = vec![
        // buf.writeVarInt(this.a)
        Insn::Load(1),
        Insn::Load(0),
        Insn::GetField(FieldRef::new("pkt", "a", "I")),
        Insn::invoke_virtual("buf", "writeVarInt", "(I)Lbuf;"),
        Insn::Pop,
        // buf.writeVarInt(this.b.size()); for (x : this.b) buf.writeString(x)
        Insn::Load(1),
        Insn::Load(0),
        Insn::GetField(FieldRef::new("pkt", "b", "Ljava/util/List;")),
        Insn::invoke_interface("java/util/List", "size", "()I"),
        Insn::invoke_virtual("buf", "writeVarInt", "(I)Lbuf;"),
        Insn::Pop,
        Insn::Load(0),
        Insn::GetField(FieldRef::new("pkt", "b", "Ljava/util/List;")),
        Insn::invoke_interface("java/util/List", "iterator", "()Ljava/util/Iterator;"),
        Insn::Store(2),
        Insn::Block {
            kind: BlockKind::Loop,
            body: vec![
                Insn::Load(1),
                Insn::Load(2),
                Insn::invoke_interface("java/util/Iterator", "next", "()Ljava/lang/Object;"),
                Insn::invoke_virtual("buf", "writeString", "(Ljava/lang/String;)Lbuf;"),
                Insn::Pop,
            ],
        },
        // buf.writeBoolean(this.c.isPresent()); if present write the payload
        Insn::Load(1),
        Insn::Load(0),
        Insn::GetField(FieldRef::new("pkt", "c", "Ljava/util/Optional;")),
        Insn::invoke_virtual("java/util/Optional", "isPresent", "()Z"),
        Insn::invoke_virtual("buf", "writeBoolean", "(Z)Lbuf;"),
        Insn::Pop,
        Insn::Load(0),
        Insn::GetField(FieldRef::new("pkt", "c", "Ljava/util/Optional;")),
        Insn::invoke_virtual("java/util/Optional", "isPresent", "()Z"),
        Insn::Block {
            kind: BlockKind::Conditional,
            body: vec![
                Insn::Load(1),
                Insn::Load(0),
                Insn::GetField(FieldRef::new("pkt", "c", "Ljava/util/Optional;")),
                Insn::invoke_virtual("java/util/Optional", "get", "()Ljava/lang/Object;"),
                Insn::invoke_virtual("buf", "writeUuid", "(Ljava/util/UUID;)Lbuf;"),
                Insn::Pop,
            ],
        },
        // buf.writeVarInt(this.d.size()); for (e : this.d.entrySet()) { key; value }
        Insn::Load(1),
        Insn::Load(0),
        Insn::GetField(FieldRef::new("pkt", "d", "Ljava/util/Map;")),
        Insn::invoke_interface("java/util/Map", "size", "()I"),
        Insn::invoke_virtual("buf", "writeVarInt", "(I)Lbuf;"),
        Insn::Pop,
        Insn::Load(0),
        Insn::GetField(FieldRef::new("pkt", "d", "Ljava/util/Map;")),
        Insn::invoke_interface("java/util/Map", "entrySet", "()Ljava/util/Set;"),
        Insn::invoke_interface("java/util/Set", "iterator", "()Ljava/util/Iterator;"),
        Insn::Store(2),
        Insn::Block {
            kind: BlockKind::Loop,
            body: vec![
                Insn::Load(2),
                Insn::invoke_interface("java/util/Iterator", "next", "()Ljava/util/Map$Entry;"),
                Insn::Store(3),
                Insn::Load(1),
                Insn::Load(3),
                Insn::invoke_interface("java/util/Map$Entry", "getKey", "()Ljava/lang/Object;"),
                Insn::invoke_virtual("buf", "writeString", "(Ljava/lang/String;)Lbuf;"),
                Insn::Pop,
                Insn::Load(1),
                Insn::Load(3),
                Insn::invoke_interface("java/util/Map$Entry", "getValue", "()Ljava/lang/Object;"),
                Insn::invoke_virtual("buf", "writeVarLong", "(J)Lbuf;"),
                Insn::Pop,
            ],
        },
        Insn::Return { value: false },
    ];

    class.methods.push(MethodDef::new("w", "(Lbuf;)V", write));
    class
}
