// callgraph.rs — Graphviz DOT caller/callee report
//
// Lists every direct call instruction of a module as a `caller -> callee`
// edge, in program order, with demangled names. Indirect calls (through a
// local pointer) have no static callee and are left out.
//
// Preconditions: `module` is a parsed IR module.
// Postconditions: returns a DOT digraph; edge order follows the source.
// Failure modes: none (pure string formatting).
// Side effects: none.

use std::fmt::Write;

use crate::demangle::display_name;
use crate::ir::{InstKind, Module, Operand};

/// One static call site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallEdge {
    pub caller: String,
    pub callee: String,
}

/// Direct call edges of `module` in program order.
pub fn call_edges(module: &Module) -> Vec<CallEdge> {
    let mut edges = Vec::new();
    for func in &module.functions {
        let caller = display_name(&func.name);
        for inst in func.blocks.iter().flat_map(|b| &b.insts) {
            if let InstKind::Call {
                callee: Operand::Global(callee),
                ..
            } = &inst.kind
            {
                edges.push(CallEdge {
                    caller: caller.clone(),
                    callee: display_name(callee),
                });
            }
        }
    }
    edges
}

/// Escape a name for use inside a double-quoted DOT ID.
fn quote(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 2);
    out.push('"');
    for c in name.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}

/// Emit the call graph of `module` as a DOT string.
pub fn emit_dot(module: &Module) -> String {
    let mut buf = String::new();
    let _ = writeln!(buf, "digraph callgraph {{");
    for edge in call_edges(module) {
        let _ = writeln!(buf, "    {} -> {};", quote(&edge.caller), quote(&edge.callee));
    }
    let _ = writeln!(buf, "}}");
    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(src: &str) -> Module {
        let result = crate::parser::parse(src);
        assert!(result.errors.is_empty(), "parse errors: {:?}", result.errors);
        result.module.expect("parse failed in test")
    }

    #[test]
    fn empty_module_has_no_edges() {
        assert_eq!(emit_dot(&parse("")), "digraph callgraph {\n}\n");
    }

    #[test]
    fn edges_in_program_order() {
        let module = parse(
            "declare i32 @_Z3addii(i32, i32)\n\
             declare void @log(i32)\n\
             define i32 @main(i32 %x) {\n\
             \x20 %r = call i32 @_Z3addii(i32 %x, i32 %x)\n\
             \x20 call void @log(i32 %r)\n\
             \x20 ret i32 %r\n\
             }\n",
        );
        assert_eq!(
            emit_dot(&module),
            "digraph callgraph {\n    \"main\" -> \"add\";\n    \"main\" -> \"log\";\n}\n"
        );
    }

    #[test]
    fn indirect_calls_skipped() {
        let module = parse(
            "define i32 @f(ptr %fp) {\n  %r = call i32 %fp()\n  ret i32 %r\n}\n",
        );
        assert!(call_edges(&module).is_empty());
    }

    #[test]
    fn quotes_are_escaped() {
        assert_eq!(quote("a\"b"), "\"a\\\"b\"");
    }
}
