// translate.rs — Instruction dispatcher
//
// Turns one IR function into a design unit. Parameters become input ports;
// integer binary instructions become pipeline stages in program order;
// allocas become declared signals and loads alias them; `ret` routes the
// returned stage to the `return_value` port. Everything else is rejected.
//
// The most recent stage is held back until the next one arrives so that a
// `ret` of that stage can rename it before it is appended.
//
// Preconditions: `func` comes from the parser (every block terminated).
// Postconditions: on success the unit's chain holds one instance per binary
//                 instruction, in program order, and at most one of them
//                 drives `return_value`.
// Failure modes: the first unsupported construct aborts the function with a
//                `TranslateError`; nothing partial is returned.
// Side effects: none.

use std::collections::BTreeMap;
use std::fmt;

use crate::chain::{PipelineInstance, RETURN_VALUE};
use crate::diag::{codes, Diagnostic};
use crate::ir::{Function, Inst, InstKind, Operand, Span, Terminator, Type};
use crate::resolve::{DefKind, ResolveError, ValueResolver};
use crate::vhdl::{input_port, DesignUnit};

// ── Public types ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct TranslateOptions {
    /// Library qualifying operator entities; `work` when `None`.
    pub library: Option<String>,
}

/// A successfully translated function.
#[derive(Debug, Clone)]
pub struct Translation {
    pub unit: DesignUnit,
    /// Warnings raised along the way.
    pub diagnostics: Vec<Diagnostic>,
    /// Stage count per operation name.
    pub statistics: BTreeMap<String, usize>,
}

impl Translation {
    pub fn stage_count(&self) -> usize {
        self.unit.chain().len()
    }
}

/// Why a function could not be translated.
#[derive(Debug, Clone, PartialEq)]
pub enum TranslateError {
    UnsupportedInstruction {
        opcode: String,
        span: Span,
    },
    UnsupportedValue {
        kind: &'static str,
        value: String,
        span: Span,
    },
    /// `what` names the offending construct, e.g. `parameter %x`.
    NonIntegerType {
        what: String,
        ty: Type,
        span: Span,
    },
    UndefinedValue {
        name: String,
        span: Span,
    },
    ReturnNotStage {
        value: String,
        span: Span,
    },
    DuplicateReturn {
        span: Span,
    },
}

impl TranslateError {
    pub fn span(&self) -> Span {
        match self {
            TranslateError::UnsupportedInstruction { span, .. }
            | TranslateError::UnsupportedValue { span, .. }
            | TranslateError::NonIntegerType { span, .. }
            | TranslateError::UndefinedValue { span, .. }
            | TranslateError::ReturnNotStage { span, .. }
            | TranslateError::DuplicateReturn { span } => *span,
        }
    }

    pub fn to_diagnostic(&self) -> Diagnostic {
        let diag = Diagnostic::error(self.span(), self.to_string());
        match self {
            TranslateError::UnsupportedInstruction { opcode, .. } => {
                let diag = diag.with_code(codes::E0101);
                match opcode.as_str() {
                    "br" | "switch" | "indirectbr" => {
                        diag.with_hint("only straight-line single-block functions can be translated")
                    }
                    "call" => diag.with_hint("calls are only reported by --emit call-graph"),
                    _ => diag,
                }
            }
            TranslateError::UnsupportedValue { .. } => diag
                .with_code(codes::E0102)
                .with_hint("operands must be parameters or results of earlier instructions"),
            TranslateError::NonIntegerType { .. } => diag
                .with_code(codes::E0103)
                .with_hint("ports are std_ulogic_vector and need an integer width"),
            TranslateError::UndefinedValue { .. } => diag.with_code(codes::E0104),
            TranslateError::ReturnNotStage { .. } => diag
                .with_code(codes::E0105)
                .with_hint("the returned value must be the result of a binary instruction"),
            TranslateError::DuplicateReturn { .. } => diag.with_code(codes::E0106),
        }
    }
}

impl fmt::Display for TranslateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TranslateError::UnsupportedInstruction { opcode, .. } => {
                write!(f, "unsupported instruction '{opcode}'")
            }
            TranslateError::UnsupportedValue { kind, value, .. } => {
                write!(f, "cannot translate {kind} '{value}' to a wire")
            }
            TranslateError::NonIntegerType { what, ty, .. } => {
                write!(f, "{what} has non-integer type '{ty}'")
            }
            TranslateError::UndefinedValue { name, .. } => {
                write!(f, "use of undefined value '%{name}'")
            }
            TranslateError::ReturnNotStage { value, .. } => {
                write!(f, "returned value '{value}' is not produced by a pipeline stage")
            }
            TranslateError::DuplicateReturn { .. } => {
                write!(f, "function returns more than once")
            }
        }
    }
}

impl From<ResolveError> for TranslateError {
    fn from(err: ResolveError) -> Self {
        match err {
            ResolveError::Unsupported { kind, value, span } => {
                TranslateError::UnsupportedValue { kind, value, span }
            }
            ResolveError::Undefined { name, span } => TranslateError::UndefinedValue { name, span },
        }
    }
}

// ── Public entry point ──────────────────────────────────────────────────────

/// Translate `func` into a design unit named `entity_name`.
pub fn translate_function(
    func: &Function,
    entity_name: &str,
    options: &TranslateOptions,
) -> Result<Translation, TranslateError> {
    let return_width = func
        .return_type
        .int_width()
        .ok_or_else(|| TranslateError::NonIntegerType {
            what: "return type".to_string(),
            ty: func.return_type.clone(),
            span: func.span,
        })?;

    let mut unit = DesignUnit::new(entity_name, return_width);
    if let Some(library) = &options.library {
        unit.set_library(library.clone());
    }

    let mut ctx = Dispatcher {
        unit,
        resolver: ValueResolver::new(),
        pending: None,
        stages: 0,
        returned: false,
        diagnostics: Vec::new(),
        statistics: BTreeMap::new(),
    };

    for param in &func.params {
        ctx.add_param(&param.name, &param.ty, param.span)?;
    }
    for block in &func.blocks {
        for inst in &block.insts {
            ctx.dispatch(inst)?;
        }
        ctx.terminate(&block.terminator)?;
    }
    ctx.flush();

    Ok(Translation {
        unit: ctx.unit,
        diagnostics: ctx.diagnostics,
        statistics: ctx.statistics,
    })
}

// ── Internal context ────────────────────────────────────────────────────────

/// A stage that has not been appended yet.
struct Pending {
    local: String,
    instance: PipelineInstance,
}

struct Dispatcher {
    unit: DesignUnit,
    resolver: ValueResolver,
    pending: Option<Pending>,
    /// Stages created so far; the next stage's chain index.
    stages: usize,
    returned: bool,
    diagnostics: Vec<Diagnostic>,
    statistics: BTreeMap<String, usize>,
}

impl Dispatcher {
    fn add_param(&mut self, name: &str, ty: &Type, span: Span) -> Result<(), TranslateError> {
        let width = ty.int_width().ok_or_else(|| TranslateError::NonIntegerType {
            what: format!("parameter %{name}"),
            ty: ty.clone(),
            span,
        })?;
        let port = self.resolver.define_param(name);
        self.unit.add_port(input_port(&port, width));
        Ok(())
    }

    fn flush(&mut self) {
        if let Some(pending) = self.pending.take() {
            self.unit.add_instance(pending.instance);
        }
    }

    fn dispatch(&mut self, inst: &Inst) -> Result<(), TranslateError> {
        match &inst.kind {
            InstKind::Binary { op, ty, lhs, rhs } => {
                let width = ty.int_width().ok_or_else(|| TranslateError::NonIntegerType {
                    what: format!("'{}' operand", op.opcode()),
                    ty: ty.clone(),
                    span: inst.span,
                })?;
                let a = self.resolver.resolve(lhs, inst.span)?;
                let b = self.resolver.resolve(rhs, inst.span)?;
                let local = inst.result.clone().unwrap_or_default();
                let index = self.stages;
                let output = self.resolver.define_stage(&local, index);
                self.stages += 1;
                *self.statistics.entry(op.opcode().to_string()).or_insert(0) += 1;

                self.flush();
                self.pending = Some(Pending {
                    local,
                    instance: PipelineInstance::new(*op, a, b, output, width),
                });
                Ok(())
            }
            InstKind::Load { src, .. } => {
                let wire = self.resolver.resolve(src, inst.span)?;
                if let Some(local) = &inst.result {
                    self.resolver.define_load(local, wire);
                }
                Ok(())
            }
            InstKind::Alloca { ty } => {
                let Some(local) = &inst.result else {
                    return Ok(());
                };
                let width = ty.int_width().ok_or_else(|| TranslateError::NonIntegerType {
                    what: format!("alloca %{local}"),
                    ty: ty.clone(),
                    span: inst.span,
                })?;
                let wire = self.resolver.define_alloca(local);
                self.unit.add_signal(wire, width);
                Ok(())
            }
            InstKind::Store { value, dst, .. } => {
                self.diagnostics.push(
                    Diagnostic::warning(
                        inst.span,
                        format!("store of {value} to {dst} has no hardware mapping and is ignored"),
                    )
                    .with_code(codes::W0102),
                );
                Ok(())
            }
            InstKind::Call { .. } | InstKind::Other { .. } => {
                Err(TranslateError::UnsupportedInstruction {
                    opcode: inst.kind.opcode().to_string(),
                    span: inst.span,
                })
            }
        }
    }

    fn terminate(&mut self, term: &Terminator) -> Result<(), TranslateError> {
        let (ty, value, span) = match term {
            Terminator::Ret { ty, value, span } => (ty, value, *span),
            other => {
                return Err(TranslateError::UnsupportedInstruction {
                    opcode: other.opcode().to_string(),
                    span: other.span(),
                })
            }
        };
        let Some(value) = value else {
            return Err(TranslateError::NonIntegerType {
                what: "returned value".to_string(),
                ty: ty.clone(),
                span,
            });
        };
        if ty.int_width().is_none() {
            return Err(TranslateError::NonIntegerType {
                what: "returned value".to_string(),
                ty: ty.clone(),
                span,
            });
        }
        if self.returned {
            return Err(TranslateError::DuplicateReturn { span });
        }

        let local = match value {
            Operand::Local(name) => name,
            other => {
                return Err(TranslateError::UnsupportedValue {
                    kind: other.kind_name(),
                    value: other.to_string(),
                    span,
                })
            }
        };
        let def = self
            .resolver
            .lookup(local)
            .cloned()
            .ok_or_else(|| TranslateError::UndefinedValue {
                name: local.clone(),
                span,
            })?;
        let DefKind::Stage(index) = def.kind else {
            return Err(TranslateError::ReturnNotStage {
                value: value.to_string(),
                span,
            });
        };

        match self.pending.take() {
            Some(pending) if pending.local == *local => {
                self.unit.add_return_instance(pending.instance);
            }
            other => {
                self.pending = other;
                self.flush();
                self.unit.route_to_return(index);
            }
        }
        self.resolver.redirect(&def.wire, RETURN_VALUE);
        self.returned = true;
        Ok(())
    }
}
