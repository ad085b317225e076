// resolve.rs — Value resolution for the translation core
//
// Maps each IR value reference (a parameter or the result of an earlier
// instruction) to the wire name that represents it in the generated VHDL.
// Resolution is one level deep: a stage result resolves to the stage's
// output wire, never to the expression behind it.
//
// Preconditions: definitions are registered in program order, before use.
// Postconditions: every wire handed out is a legal VHDL basic identifier,
//                 unique (case-insensitively) within the design unit and
//                 distinct from the fixed port names.
// Failure modes: constants, globals and undefined locals return
//                `ResolveError`.
// Side effects: none.

use std::collections::{HashMap, HashSet};
use std::fmt;

use crate::chain::{RETURN_VALUE, TAG_IN, TAG_OUT};
use crate::ir::{Operand, Span};

/// Names the design unit itself declares.
const FIXED_NAMES: &[&str] = &["clk", "sreset", TAG_IN, TAG_OUT, RETURN_VALUE, "tag_width"];

/// VHDL-2008 reserved words (lowercase).
const RESERVED: &[&str] = &[
    "abs", "access", "after", "alias", "all", "and", "architecture", "array", "assert",
    "assume", "assume_guarantee", "attribute", "begin", "block", "body", "buffer", "bus",
    "case", "component", "configuration", "constant", "context", "cover", "default",
    "disconnect", "downto", "else", "elsif", "end", "entity", "exit", "fairness", "file",
    "for", "force", "function", "generate", "generic", "group", "guarded", "if", "impure",
    "in", "inertial", "inout", "is", "label", "library", "linkage", "literal", "loop", "map",
    "mod", "nand", "new", "next", "nor", "not", "null", "of", "on", "open", "or", "others",
    "out", "package", "parameter", "port", "postponed", "procedure", "process", "property",
    "protected", "pure", "range", "record", "register", "reject", "release", "rem", "report",
    "restrict", "restrict_guarantee", "return", "rol", "ror", "select", "sequence",
    "severity", "shared", "signal", "sla", "sll", "sra", "srl", "strong", "subtype", "then",
    "to", "transport", "type", "unaffected", "units", "until", "use", "variable", "vmode",
    "vprop", "vunit", "wait", "when", "while", "with", "xnor", "xor",
];

// ── Identifier normalization ────────────────────────────────────────────────

fn is_reserved(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    RESERVED.contains(&lower.as_str())
}

/// Whether `name` is a VHDL basic identifier: a letter, then letters, digits
/// and single underscores, not ending in an underscore, not a reserved word.
pub fn is_basic_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() => {}
        _ => return false,
    }
    name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !name.contains("__")
        && !name.ends_with('_')
        && !is_reserved(name)
}

/// Normalize an IR name into a VHDL basic identifier.
///
/// Legal identifiers pass through unchanged (`a` stays `a`). Otherwise
/// illegal characters become `_`, underscore runs collapse, trailing
/// underscores go, and a `v_` prefix is added unless the result starts with
/// a letter and is not a reserved word (`0` becomes `v_0`, `a.addr` becomes
/// `a_addr`, `in` becomes `v_in`).
pub fn signal_name(raw: &str) -> String {
    if is_basic_identifier(raw) {
        return raw.to_string();
    }
    let mut out = String::with_capacity(raw.len() + 2);
    for c in raw.chars() {
        let c = if c.is_ascii_alphanumeric() { c } else { '_' };
        if c == '_' && (out.is_empty() || out.ends_with('_')) {
            continue;
        }
        out.push(c);
    }
    while out.ends_with('_') {
        out.pop();
    }
    let starts_with_letter = out.chars().next().is_some_and(|c| c.is_ascii_alphabetic());
    if !starts_with_letter || is_reserved(&out) {
        out.insert_str(0, "v_");
    }
    if out == "v_" {
        out.push('0');
    }
    out
}

// ── Definitions ─────────────────────────────────────────────────────────────

/// How an IR local came to have a wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefKind {
    Param,
    /// Result of the pipeline stage with this chain index.
    Stage(usize),
    /// `alloca`: names its own storage.
    Alloca,
    /// `load`: forwards the wire of its source.
    Load,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueDef {
    pub wire: String,
    pub kind: DefKind,
}

/// Why a value has no wire.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolveError {
    /// A constant or global used where a wire is needed.
    Unsupported {
        kind: &'static str,
        value: String,
        span: Span,
    },
    /// A local that no earlier parameter or instruction defines.
    Undefined { name: String, span: Span },
}

impl fmt::Display for ResolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolveError::Unsupported { kind, value, .. } => {
                write!(f, "cannot translate {kind} '{value}' to a wire")
            }
            ResolveError::Undefined { name, .. } => {
                write!(f, "use of undefined value '%{name}'")
            }
        }
    }
}

// ── Resolver ────────────────────────────────────────────────────────────────

/// Per-function table from IR locals to wires.
#[derive(Debug, Clone)]
pub struct ValueResolver {
    defs: HashMap<String, ValueDef>,
    /// Lowercased wire names already taken.
    taken: HashSet<String>,
}

impl Default for ValueResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl ValueResolver {
    pub fn new() -> Self {
        ValueResolver {
            defs: HashMap::new(),
            taken: FIXED_NAMES.iter().map(|n| n.to_string()).collect(),
        }
    }

    /// Normalize `raw` and make it unique by appending `_<n>`.
    fn claim(&mut self, raw: &str) -> String {
        let base = signal_name(raw);
        let mut wire = base.clone();
        let mut n = 1;
        while self.taken.contains(&wire.to_ascii_lowercase()) {
            wire = format!("{base}_{n}");
            n += 1;
        }
        self.taken.insert(wire.to_ascii_lowercase());
        wire
    }

    fn insert(&mut self, local: &str, wire: String, kind: DefKind) -> String {
        self.defs.insert(
            local.to_string(),
            ValueDef {
                wire: wire.clone(),
                kind,
            },
        );
        wire
    }

    /// Register a parameter; returns its port name.
    pub fn define_param(&mut self, local: &str) -> String {
        let wire = self.claim(local);
        self.insert(local, wire, DefKind::Param)
    }

    /// Register a stage result; returns its output wire.
    pub fn define_stage(&mut self, local: &str, index: usize) -> String {
        let wire = self.claim(local);
        self.insert(local, wire, DefKind::Stage(index))
    }

    /// Register an alloca; it resolves to its own name.
    pub fn define_alloca(&mut self, local: &str) -> String {
        let wire = self.claim(local);
        self.insert(local, wire, DefKind::Alloca)
    }

    /// Register a load as an alias of an existing wire.
    pub fn define_load(&mut self, local: &str, source_wire: String) -> String {
        self.insert(local, source_wire, DefKind::Load)
    }

    /// Point every local currently resolving to `from` at `to`.
    pub fn redirect(&mut self, from: &str, to: &str) {
        for def in self.defs.values_mut() {
            if def.wire == from {
                def.wire = to.to_string();
            }
        }
    }

    pub fn lookup(&self, local: &str) -> Option<&ValueDef> {
        self.defs.get(local)
    }

    /// Wire name for an operand.
    pub fn resolve(&self, operand: &Operand, span: Span) -> Result<String, ResolveError> {
        match operand {
            Operand::Local(name) => self
                .defs
                .get(name)
                .map(|def| def.wire.clone())
                .ok_or_else(|| ResolveError::Undefined {
                    name: name.clone(),
                    span,
                }),
            other => Err(ResolveError::Unsupported {
                kind: other.kind_name(),
                value: other.to_string(),
                span,
            }),
        }
    }
}
