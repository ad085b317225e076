// In-memory LLVM IR for the translation core.
//
// Only the parts of LLVM IR the hardware translation consumes are modelled
// structurally; every other instruction survives as its opcode so the
// dispatcher can name it in a diagnostic. Every node carries a `SimpleSpan`
// for error reporting in downstream phases.
//
// Preconditions: produced by the parser from a valid token stream.
// Postconditions: each function has at least one block; each block has
//                 exactly one terminator.
// Failure modes: none (data-only module).
// Side effects: none.

use std::fmt;

use chumsky::span::SimpleSpan;
use serde::Serialize;

/// Byte-offset span (alias for chumsky's `SimpleSpan`).
pub type Span = SimpleSpan;

// ── Root ──

/// A parsed `.ll` module: the function definitions it contains.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Module {
    pub source_filename: Option<String>,
    pub functions: Vec<Function>,
    /// Names of external functions (`declare` lines), in source order.
    pub declarations: Vec<String>,
}

// ── Functions ──

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Function {
    /// Symbol name without the `@` sigil, still mangled.
    pub name: String,
    pub return_type: Type,
    pub params: Vec<Param>,
    pub blocks: Vec<Block>,
    #[serde(skip)]
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Param {
    pub name: String,
    pub ty: Type,
    #[serde(skip)]
    pub span: Span,
}

/// A basic block: straight-line instructions closed by one terminator.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Block {
    /// `None` for the implicit entry block.
    pub label: Option<String>,
    pub insts: Vec<Inst>,
    pub terminator: Terminator,
}

// ── Instructions ──

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Inst {
    /// Local the instruction defines (`%x = …`), if any.
    pub result: Option<String>,
    pub kind: InstKind,
    #[serde(skip)]
    pub span: Span,
}

/// Integer binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    UDiv,
    SDiv,
    URem,
    SRem,
    Shl,
    LShr,
    AShr,
    And,
    Or,
    Xor,
}

impl BinOp {
    pub const ALL: [BinOp; 13] = [
        BinOp::Add,
        BinOp::Sub,
        BinOp::Mul,
        BinOp::UDiv,
        BinOp::SDiv,
        BinOp::URem,
        BinOp::SRem,
        BinOp::Shl,
        BinOp::LShr,
        BinOp::AShr,
        BinOp::And,
        BinOp::Or,
        BinOp::Xor,
    ];

    pub fn from_opcode(opcode: &str) -> Option<Self> {
        Some(match opcode {
            "add" => BinOp::Add,
            "sub" => BinOp::Sub,
            "mul" => BinOp::Mul,
            "udiv" => BinOp::UDiv,
            "sdiv" => BinOp::SDiv,
            "urem" => BinOp::URem,
            "srem" => BinOp::SRem,
            "shl" => BinOp::Shl,
            "lshr" => BinOp::LShr,
            "ashr" => BinOp::AShr,
            "and" => BinOp::And,
            "or" => BinOp::Or,
            "xor" => BinOp::Xor,
            _ => return None,
        })
    }

    pub fn opcode(self) -> &'static str {
        match self {
            BinOp::Add => "add",
            BinOp::Sub => "sub",
            BinOp::Mul => "mul",
            BinOp::UDiv => "udiv",
            BinOp::SDiv => "sdiv",
            BinOp::URem => "urem",
            BinOp::SRem => "srem",
            BinOp::Shl => "shl",
            BinOp::LShr => "lshr",
            BinOp::AShr => "ashr",
            BinOp::And => "and",
            BinOp::Or => "or",
            BinOp::Xor => "xor",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "inst", rename_all = "snake_case")]
pub enum InstKind {
    Binary {
        op: BinOp,
        ty: Type,
        lhs: Operand,
        rhs: Operand,
    },
    Load {
        ty: Type,
        src: Operand,
    },
    Store {
        ty: Type,
        value: Operand,
        dst: Operand,
    },
    Alloca {
        ty: Type,
    },
    Call {
        return_type: Type,
        callee: Operand,
    },
    /// Any opcode the front-end does not model.
    Other {
        opcode: String,
    },
}

impl InstKind {
    /// The LLVM opcode this instruction was written with.
    pub fn opcode(&self) -> &str {
        match self {
            InstKind::Binary { op, .. } => op.opcode(),
            InstKind::Load { .. } => "load",
            InstKind::Store { .. } => "store",
            InstKind::Alloca { .. } => "alloca",
            InstKind::Call { .. } => "call",
            InstKind::Other { opcode } => opcode,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "term", rename_all = "snake_case")]
pub enum Terminator {
    Ret {
        ty: Type,
        value: Option<Operand>,
        #[serde(skip)]
        span: Span,
    },
    Br {
        targets: Vec<String>,
        #[serde(skip)]
        span: Span,
    },
    /// `switch`, `unreachable`, `invoke`, …
    Other {
        opcode: String,
        #[serde(skip)]
        span: Span,
    },
}

impl Terminator {
    pub fn opcode(&self) -> &str {
        match self {
            Terminator::Ret { .. } => "ret",
            Terminator::Br { .. } => "br",
            Terminator::Other { opcode, .. } => opcode,
        }
    }

    pub fn span(&self) -> Span {
        match self {
            Terminator::Ret { span, .. } | Terminator::Br { span, .. } | Terminator::Other { span, .. } => {
                *span
            }
        }
    }

    pub fn is_terminator_opcode(opcode: &str) -> bool {
        matches!(
            opcode,
            "ret"
                | "br"
                | "switch"
                | "indirectbr"
                | "invoke"
                | "callbr"
                | "resume"
                | "catchswitch"
                | "catchret"
                | "cleanupret"
                | "unreachable"
        )
    }
}

// ── Values and types ──

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Operand {
    /// `%name`: parameter or instruction result.
    Local(String),
    /// `@name`: global variable or function.
    Global(String),
    /// Integer constant (`true`/`false` lex as 1/0).
    Int(i64),
    /// Any other constant expression (`null`, `undef`, float, …).
    Constant(String),
}

impl Operand {
    /// Human-readable value kind for diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Operand::Local(_) => "local value",
            Operand::Global(_) => "global value",
            Operand::Int(_) => "integer constant",
            Operand::Constant(_) => "constant",
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Local(name) => write!(f, "%{name}"),
            Operand::Global(name) => write!(f, "@{name}"),
            Operand::Int(v) => write!(f, "{v}"),
            Operand::Constant(text) => write!(f, "{text}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "of", rename_all = "snake_case")]
pub enum Type {
    Int(u32),
    Float(u32),
    Ptr,
    Void,
    Label,
    Array(u64, Box<Type>),
    Vector(u64, Box<Type>),
    Struct(Vec<Type>),
    /// Named struct type (`%struct.S`).
    Named(String),
}

impl Type {
    /// Bit width if this is an integer type.
    pub fn int_width(&self) -> Option<u32> {
        match self {
            Type::Int(bits) => Some(*bits),
            _ => None,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Int(bits) => write!(f, "i{bits}"),
            Type::Float(16) => write!(f, "half"),
            Type::Float(32) => write!(f, "float"),
            Type::Float(64) => write!(f, "double"),
            Type::Float(bits) => write!(f, "f{bits}"),
            Type::Ptr => write!(f, "ptr"),
            Type::Void => write!(f, "void"),
            Type::Label => write!(f, "label"),
            Type::Array(n, elem) => write!(f, "[{n} x {elem}]"),
            Type::Vector(n, elem) => write!(f, "<{n} x {elem}>"),
            Type::Struct(fields) => {
                write!(f, "{{ ")?;
                for (i, field) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{field}")?;
                }
                write!(f, " }}")
            }
            Type::Named(name) => write!(f, "%{name}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binop_opcode_roundtrip() {
        for op in ["add", "sub", "mul", "shl", "lshr", "ashr", "and", "or", "xor"] {
            assert_eq!(BinOp::from_opcode(op).map(BinOp::opcode), Some(op));
        }
        assert_eq!(BinOp::from_opcode("fadd"), None);
    }

    #[test]
    fn all_binops_listed_once() {
        for op in BinOp::ALL {
            assert_eq!(BinOp::from_opcode(op.opcode()), Some(op));
        }
        let mut names: Vec<&str> = BinOp::ALL.iter().map(|op| op.opcode()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), 13);
    }

    fn span() -> Span {
        use chumsky::span::Span as _;
        Span::new((), 0..0)
    }

    #[test]
    fn instruction_json_tags() {
        let inst = Inst {
            result: Some("s".to_string()),
            kind: InstKind::Binary {
                op: BinOp::Add,
                ty: Type::Int(32),
                lhs: Operand::Local("a".to_string()),
                rhs: Operand::Int(1),
            },
            span: span(),
        };
        let value = serde_json::to_value(&inst).unwrap();
        assert_eq!(value["kind"]["inst"], "binary");
        assert_eq!(value["kind"]["op"], "add");
        assert_eq!(value["kind"]["rhs"]["kind"], "int");

        let term = Terminator::Other {
            opcode: "unreachable".to_string(),
            span: span(),
        };
        let value = serde_json::to_value(&term).unwrap();
        assert_eq!(value["term"], "other");
        assert_eq!(value["opcode"], "unreachable");
    }

    #[test]
    fn type_display() {
        let ty = Type::Struct(vec![
            Type::Int(32),
            Type::Array(4, Box::new(Type::Int(8))),
            Type::Ptr,
        ]);
        assert_eq!(ty.to_string(), "{ i32, [4 x i8], ptr }");
        assert_eq!(Type::Float(64).to_string(), "double");
    }

    #[test]
    fn only_integers_have_width() {
        assert_eq!(Type::Int(17).int_width(), Some(17));
        assert_eq!(Type::Ptr.int_width(), None);
        assert_eq!(Type::Float(32).int_width(), None);
    }

    #[test]
    fn terminator_opcodes() {
        assert!(Terminator::is_terminator_opcode("ret"));
        assert!(Terminator::is_terminator_opcode("switch"));
        assert!(!Terminator::is_terminator_opcode("add"));
    }
}
