// pipeline.rs — Stage orchestration for one source file
//
// Runs Parse → Translate → Emit over one LLVM IR module, timing each stage
// and handing its diagnostics to a callback as soon as the stage completes.
// The failure policy decides whether a function that cannot be translated
// stops the run or is skipped.
//
// Preconditions: none.
// Postconditions: on `Ok`, `CompileOutput.text` holds the rendering for the
//                 selected emit target; every diagnostic raised was passed
//                 to `on_stage`.
// Failure modes: parse errors; translation errors under
//                `FailurePolicy::Abort`; output serialization errors.
// Side effects: calls `on_stage` after each stage; prints stage timings to
//               stderr when `verbose` is set.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::chain::DEFAULT_LIBRARY;
use crate::diag::codes;
use crate::diag::{DiagLevel, Diagnostic};
use crate::ir::{BinOp, Module};
use crate::translate::{translate_function, TranslateOptions};
use crate::vhdl::CONTEXT_CLAUSE;

// ── Options ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EmitTarget {
    /// VHDL design units (default).
    #[default]
    Vhdl,
    /// The parsed IR as pretty JSON.
    Ir,
    /// Graphviz DOT caller/callee report.
    CallGraph,
    /// Provenance JSON.
    BuildInfo,
}

/// What to do with a function that cannot be translated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Stop at the first failing function; no output.
    #[default]
    Abort,
    /// Report the failure, leave the function out, carry on.
    SkipFunction,
}

#[derive(Debug, Clone, Default)]
pub struct CompileOptions {
    pub emit: EmitTarget,
    /// Operator library; `work` when `None`.
    pub library: Option<String>,
    pub policy: FailurePolicy,
    pub verbose: bool,
}

// ── Stages ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Parse,
    Translate,
    Emit,
}

impl Stage {
    pub fn name(self) -> &'static str {
        match self {
            Stage::Parse => "parse",
            Stage::Translate => "translate",
            Stage::Emit => "emit",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ── Results ────────────────────────────────────────────────────────────────

/// Summary of one translated function.
#[derive(Debug, Clone)]
pub struct UnitReport {
    /// Symbol as written in the IR.
    pub function: String,
    pub entity: String,
    pub stages: usize,
    pub statistics: BTreeMap<String, usize>,
}

#[derive(Debug, Clone)]
pub struct CompileOutput {
    pub text: String,
    pub units: Vec<UnitReport>,
    pub diagnostics: Vec<Diagnostic>,
}

impl CompileOutput {
    /// True if any function was skipped under `FailurePolicy::SkipFunction`.
    pub fn has_errors(&self) -> bool {
        has_error_diags(&self.diagnostics)
    }
}

/// Compilation stopped at `failing_stage`.
#[derive(Debug)]
pub struct PipelineError {
    pub failing_stage: Stage,
    /// Everything reported up to and including the failing stage.
    pub diagnostics: Vec<Diagnostic>,
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let errors = self.diagnostics.iter().filter(|d| d.is_error()).count();
        write!(f, "{} failed with {} error(s)", self.failing_stage, errors)
    }
}

// ── Provenance ─────────────────────────────────────────────────────────────

/// Provenance metadata for `--emit build-info`.
#[derive(Debug, Clone, Serialize)]
pub struct Provenance {
    /// Hex SHA-256 of the raw `.ll` source text.
    pub source_hash: String,
    pub compiler_version: &'static str,
}

impl Provenance {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self).map(|mut s| {
            s.push('\n');
            s
        })
    }
}

fn bytes_to_hex(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        use std::fmt::Write;
        let _ = write!(s, "{:02x}", b);
    }
    s
}

pub fn compute_provenance(source: &str) -> Provenance {
    use sha2::{Digest, Sha256};

    let mut hasher = Sha256::new();
    hasher.update(source.as_bytes());
    Provenance {
        source_hash: bytes_to_hex(&hasher.finalize()),
        compiler_version: env!("CARGO_PKG_VERSION"),
    }
}

// ── Helpers ────────────────────────────────────────────────────────────────

fn has_error_diags(diags: &[Diagnostic]) -> bool {
    diags.iter().any(|d| d.level == DiagLevel::Error)
}

/// Per-stage post-processing: callback, accumulate, verbose, error check.
fn finish_stage(
    all_diags: &mut Vec<Diagnostic>,
    stage: Stage,
    diags: Vec<Diagnostic>,
    elapsed: Duration,
    fatal: bool,
    verbose: bool,
    on_stage: &mut impl FnMut(Stage, &[Diagnostic]),
) -> Result<(), PipelineError> {
    on_stage(stage, &diags);
    let is_err = has_error_diags(&diags);
    all_diags.extend(diags);
    if verbose {
        eprintln!(
            "llvm2hdl: {} complete, {:.1}ms",
            stage,
            elapsed.as_secs_f64() * 1000.0
        );
    }
    if is_err && fatal {
        return Err(PipelineError {
            failing_stage: stage,
            diagnostics: std::mem::take(all_diags),
        });
    }
    Ok(())
}

/// Entity names must be unique in the output; VHDL compares them
/// case-insensitively.
fn claim_entity(taken: &mut HashSet<String>, base: String) -> String {
    let mut name = base.clone();
    let mut n = 1;
    while !taken.insert(name.to_ascii_lowercase()) {
        name = format!("{base}_{n}");
        n += 1;
    }
    name
}

// ── Translate stage ────────────────────────────────────────────────────────

struct Translated {
    units: Vec<UnitReport>,
    texts: Vec<String>,
    diagnostics: Vec<Diagnostic>,
}

fn translate_module(module: &Module, options: &CompileOptions) -> Translated {
    let translate_options = TranslateOptions {
        library: options.library.clone(),
    };
    let mut out = Translated {
        units: Vec::new(),
        texts: Vec::new(),
        diagnostics: Vec::new(),
    };
    let mut taken = HashSet::new();
    // Operators live in the same library as the generated entities unless
    // redirected; an entity named like one would instantiate itself.
    let shares_operator_library = options
        .library
        .as_deref()
        .map_or(true, |library| library.is_empty() || library.eq_ignore_ascii_case(DEFAULT_LIBRARY));
    if shares_operator_library {
        taken.extend(BinOp::ALL.iter().map(|op| op.opcode().to_string()));
    }

    for func in &module.functions {
        let (base, warning) = crate::demangle::entity_name(&func.name, func.span);
        out.diagnostics.extend(warning);
        let entity = claim_entity(&mut taken, base);

        match translate_function(func, &entity, &translate_options) {
            Ok(translation) => {
                out.diagnostics.extend(translation.diagnostics.iter().cloned());
                out.texts.push(translation.unit.render());
                out.units.push(UnitReport {
                    function: func.name.clone(),
                    entity,
                    stages: translation.stage_count(),
                    statistics: translation.statistics,
                });
            }
            Err(err) => {
                let mut diag = err.to_diagnostic();
                diag.message = format!("in function @{}: {}", func.name, diag.message);
                out.diagnostics.push(diag);
                if options.policy == FailurePolicy::Abort {
                    break;
                }
            }
        }
    }
    out
}

// ── Pipeline runner ────────────────────────────────────────────────────────

/// Compile one `.ll` source.
///
/// Per-stage sequence: execute → on_stage(callback) → verbose → error check.
pub fn compile(
    source: &str,
    options: &CompileOptions,
    mut on_stage: impl FnMut(Stage, &[Diagnostic]),
) -> Result<CompileOutput, PipelineError> {
    let mut diagnostics = Vec::new();

    // ── Parse ──
    let t = Instant::now();
    let parsed = crate::parser::parse(source);
    let elapsed = t.elapsed();
    let parse_diags: Vec<Diagnostic> = parsed
        .errors
        .iter()
        .map(|e| Diagnostic::error(*e.span(), e.to_string()).with_code(codes::E0001))
        .collect();
    finish_stage(
        &mut diagnostics,
        Stage::Parse,
        parse_diags,
        elapsed,
        true,
        options.verbose,
        &mut on_stage,
    )?;
    let module = parsed.module.unwrap_or(Module {
        source_filename: None,
        functions: Vec::new(),
        declarations: Vec::new(),
    });
    if options.verbose {
        eprintln!(
            "llvm2hdl: parsed {} function(s), {} declaration(s)",
            module.functions.len(),
            module.declarations.len()
        );
    }

    // ── Translate ──
    let mut units = Vec::new();
    let mut texts = Vec::new();
    if options.emit == EmitTarget::Vhdl {
        let t = Instant::now();
        let translated = translate_module(&module, options);
        let elapsed = t.elapsed();
        units = translated.units;
        texts = translated.texts;
        finish_stage(
            &mut diagnostics,
            Stage::Translate,
            translated.diagnostics,
            elapsed,
            options.policy == FailurePolicy::Abort,
            options.verbose,
            &mut on_stage,
        )?;
    }

    // ── Emit ──
    let t = Instant::now();
    let rendered = match options.emit {
        EmitTarget::Vhdl => Ok(texts
            .iter()
            .map(|unit| format!("{CONTEXT_CLAUSE}{unit}"))
            .collect::<Vec<_>>()
            .join("\n")),
        EmitTarget::Ir => serde_json::to_string_pretty(&module).map(|s| s + "\n"),
        EmitTarget::CallGraph => Ok(crate::callgraph::emit_dot(&module)),
        EmitTarget::BuildInfo => compute_provenance(source).to_json(),
    };
    let elapsed = t.elapsed();
    let (text, emit_diags) = match rendered {
        Ok(text) => (text, Vec::new()),
        Err(e) => {
            let span = (0..0).into();
            let diag = Diagnostic::error(span, format!("cannot serialize output: {e}"))
                .with_code(codes::E0002);
            (String::new(), vec![diag])
        }
    };
    finish_stage(
        &mut diagnostics,
        Stage::Emit,
        emit_diags,
        elapsed,
        true,
        options.verbose,
        &mut on_stage,
    )?;

    Ok(CompileOutput {
        text,
        units,
        diagnostics,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const ADD: &str = "define i32 @f(i32 %a, i32 %b) {\n  %s = add i32 %a, %b\n  ret i32 %s\n}\n";

    const MIXED: &str = "define i32 @bad(float %x) {\n  ret i32 0\n}\n\
                         define i32 @good(i32 %a, i32 %b) {\n  %s = sub i32 %a, %b\n  ret i32 %s\n}\n";

    fn compile_quiet(source: &str, options: &CompileOptions) -> Result<CompileOutput, PipelineError> {
        compile(source, options, |_, _| {})
    }

    #[test]
    fn vhdl_has_context_clause() {
        let out = compile_quiet(ADD, &CompileOptions::default()).unwrap();
        assert!(out.text.starts_with("library ieee;\nuse ieee.std_logic_1164.all;\n\nentity f is\n"));
        assert!(out.text.ends_with("end architecture f;\n"));
        assert_eq!(out.units.len(), 1);
        assert_eq!(out.units[0].entity, "f");
        assert_eq!(out.units[0].stages, 1);
        assert!(!out.has_errors());
    }

    #[test]
    fn stages_reported_in_order() {
        let mut seen = Vec::new();
        compile(ADD, &CompileOptions::default(), |stage, _| seen.push(stage)).unwrap();
        assert_eq!(seen, vec![Stage::Parse, Stage::Translate, Stage::Emit]);
    }

    #[test]
    fn non_vhdl_targets_skip_translation() {
        let mut seen = Vec::new();
        let options = CompileOptions {
            emit: EmitTarget::CallGraph,
            ..CompileOptions::default()
        };
        compile(MIXED, &options, |stage, _| seen.push(stage)).unwrap();
        assert_eq!(seen, vec![Stage::Parse, Stage::Emit]);
    }

    #[test]
    fn parse_error_fails_parse_stage() {
        let err = compile_quiet("define i32 @f(i32 %a {\n", &CompileOptions::default()).unwrap_err();
        assert_eq!(err.failing_stage, Stage::Parse);
        assert!(err.diagnostics.iter().all(|d| d.code == Some(codes::E0001)));
    }

    #[test]
    fn abort_policy_stops_at_first_failure() {
        let err = compile_quiet(MIXED, &CompileOptions::default()).unwrap_err();
        assert_eq!(err.failing_stage, Stage::Translate);
        let errors: Vec<_> = err.diagnostics.iter().filter(|d| d.is_error()).collect();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].code, Some(codes::E0103));
    }

    #[test]
    fn skip_policy_keeps_good_functions() {
        let options = CompileOptions {
            policy: FailurePolicy::SkipFunction,
            ..CompileOptions::default()
        };
        let out = compile_quiet(MIXED, &options).unwrap();
        assert!(out.has_errors());
        assert_eq!(out.units.len(), 1);
        assert_eq!(out.units[0].entity, "good");
        assert!(out.text.contains("entity good is"));
        assert!(!out.text.contains("entity bad is"));
    }

    #[test]
    fn overloads_get_distinct_entities() {
        let src = "define i32 @_Z3addii(i32 %a, i32 %b) {\n  %s = add i32 %a, %b\n  ret i32 %s\n}\n\
                   define i64 @_Z3addll(i64 %a, i64 %b) {\n  %s = add i64 %a, %b\n  ret i64 %s\n}\n";
        let out = compile_quiet(src, &CompileOptions::default()).unwrap();
        let names: Vec<&str> = out.units.iter().map(|u| u.entity.as_str()).collect();
        assert_eq!(names, vec!["add_1", "add_2"]);
        assert!(!out.text.contains("entity add is"));
        assert!(out.text.contains("entity add_1 is"));
    }

    #[test]
    fn operator_names_free_in_custom_library() {
        let src = "define i32 @mul(i32 %a, i32 %b) {\n  %s = mul i32 %a, %b\n  ret i32 %s\n}\n";
        let out = compile_quiet(src, &CompileOptions::default()).unwrap();
        assert_eq!(out.units[0].entity, "mul_1");
        assert!(out.text.contains("entity work.mul is port map"));

        let options = CompileOptions {
            library: Some("ops".to_string()),
            ..CompileOptions::default()
        };
        let out = compile_quiet(src, &options).unwrap();
        assert_eq!(out.units[0].entity, "mul");
        assert!(out.text.contains("entity ops.mul is port map"));
    }

    #[test]
    fn failure_names_function_and_keeps_hint() {
        let src = "define i32 @f(i32 %a) {\n  %r = call i32 @g(i32 %a)\n  ret i32 %r\n}\n";
        let err = compile_quiet(src, &CompileOptions::default()).unwrap_err();
        let diag = err
            .diagnostics
            .iter()
            .find(|d| d.code == Some(codes::E0101))
            .unwrap();
        assert!(diag.message.starts_with("in function @f: "), "{}", diag.message);
        assert_eq!(diag.hint.as_deref(), Some("calls are only reported by --emit call-graph"));
    }

    #[test]
    fn build_info_is_json() {
        let options = CompileOptions {
            emit: EmitTarget::BuildInfo,
            ..CompileOptions::default()
        };
        let out = compile_quiet(ADD, &options).unwrap();
        let value: serde_json::Value = serde_json::from_str(&out.text).unwrap();
        assert_eq!(value["source_hash"].as_str().map(str::len), Some(64));
        assert_eq!(value["compiler_version"], env!("CARGO_PKG_VERSION"));
    }

    #[test]
    fn provenance_tracks_source() {
        assert_eq!(compute_provenance(ADD).source_hash, compute_provenance(ADD).source_hash);
        assert_ne!(compute_provenance(ADD).source_hash, compute_provenance(MIXED).source_hash);
    }

    #[test]
    fn ir_dump_names_functions() {
        let options = CompileOptions {
            emit: EmitTarget::Ir,
            ..CompileOptions::default()
        };
        let out = compile_quiet(ADD, &options).unwrap();
        let value: serde_json::Value = serde_json::from_str(&out.text).unwrap();
        assert_eq!(value["functions"][0]["name"], "f");
        let inst = &value["functions"][0]["blocks"][0]["insts"][0];
        assert_eq!(inst["result"], "s");
        assert_eq!(inst["kind"]["inst"], "binary");
        assert_eq!(inst["kind"]["op"], "add");
        assert_eq!(value["functions"][0]["blocks"][0]["terminator"]["term"], "ret");
    }

    #[test]
    fn empty_module_emits_nothing() {
        let out = compile_quiet("", &CompileOptions::default()).unwrap();
        assert_eq!(out.text, "");
    }
}
