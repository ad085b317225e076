// Property-based tests for translation invariants.
//
// Three categories:
// 1. Instance chain: clause count, naming and tag linking for any op sequence
// 2. Dispatcher: generated straight-line functions translate into one stage
//    per binary instruction with exactly one stage driving the return port
// 3. Identifier normalization: any IR name maps to a legal VHDL identifier
//
// Uses proptest with explicit configuration to prevent CI flakiness.

use llvm2hdl::chain::{InstanceChain, PipelineInstance, RETURN_VALUE};
use llvm2hdl::ir::BinOp;
use llvm2hdl::translate::{translate_function, TranslateOptions};
use proptest::prelude::*;

// ── Generators ──────────────────────────────────────────────────────────────

const OPS: &[BinOp] = &[
    BinOp::Add,
    BinOp::Sub,
    BinOp::Mul,
    BinOp::And,
    BinOp::Or,
    BinOp::Xor,
    BinOp::Shl,
    BinOp::LShr,
    BinOp::AShr,
];

fn arb_op() -> impl Strategy<Value = BinOp> {
    (0..OPS.len()).prop_map(|i| OPS[i])
}

/// A straight-line function: `params` i32 parameters, one binary
/// instruction per entry of `insts` (operator plus two operand picks), and
/// the index of the returned instruction.
#[derive(Debug, Clone)]
struct StraightLine {
    params: usize,
    insts: Vec<(BinOp, usize, usize)>,
    returned: usize,
}

impl StraightLine {
    /// Operand `pick` of instruction `i`, chosen among the parameters and
    /// the results of instructions before `i`.
    fn operand(&self, i: usize, pick: usize) -> String {
        let pick = pick % (self.params + i);
        if pick < self.params {
            format!("%p{pick}")
        } else {
            format!("%t{}", pick - self.params)
        }
    }

    fn to_ll(&self) -> String {
        let params: Vec<String> = (0..self.params).map(|p| format!("i32 %p{p}")).collect();
        let mut src = format!("define i32 @f({}) {{\nentry:\n", params.join(", "));
        for (i, (op, a, b)) in self.insts.iter().enumerate() {
            src.push_str(&format!(
                "  %t{i} = {} i32 {}, {}\n",
                op.opcode(),
                self.operand(i, *a),
                self.operand(i, *b)
            ));
        }
        src.push_str(&format!("  ret i32 %t{}\n}}\n", self.returned));
        src
    }
}

fn arb_straight_line() -> impl Strategy<Value = StraightLine> {
    (1usize..4, prop::collection::vec((arb_op(), 0usize..64, 0usize..64), 1..10))
        .prop_flat_map(|(params, insts)| {
            let n = insts.len();
            (Just(params), Just(insts), 0..n)
        })
        .prop_map(|(params, insts, returned)| StraightLine {
            params,
            insts,
            returned,
        })
}

// ── 1. Instance chain ───────────────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 200,
        max_shrink_iters: 200,
        .. ProptestConfig::default()
    })]

    #[test]
    fn chain_renders_one_clause_per_instance(ops in prop::collection::vec(arb_op(), 0..20)) {
        let mut chain = InstanceChain::new();
        for (i, op) in ops.iter().enumerate() {
            let index = chain.append(PipelineInstance::new(*op, "a", "b", format!("w{i}"), 32));
            prop_assert_eq!(index, i);
        }

        let text = chain.render();
        let clauses: Vec<&str> = text.lines().filter(|l| !l.is_empty()).collect();
        prop_assert_eq!(clauses.len(), ops.len());
        for (i, (clause, op)) in clauses.iter().zip(&ops).enumerate() {
            let prefix = format!("inst_{}_{}: entity work.{} is port map (", i, op.opcode(), op.opcode());
            prop_assert!(clause.starts_with(&prefix), "clause {}: {}", i, clause);
        }
        prop_assert!(text.ends_with("\n\n") || ops.is_empty());
        prop_assert_eq!(chain.render(), text);
    }

    #[test]
    fn chain_tags_link_neighbours(n in 1usize..30) {
        let mut chain = InstanceChain::new();
        for i in 0..n {
            chain.append(PipelineInstance::new(BinOp::Add, "a", "b", format!("w{i}"), 8));
        }
        prop_assert_eq!(chain.tag_input_name(0), "tag_in");
        prop_assert_eq!(chain.tag_output_name(n - 1), "tag_out");
        for i in 0..n - 1 {
            prop_assert_eq!(chain.tag_output_name(i), chain.tag_input_name(i + 1));
            prop_assert_ne!(chain.tag_output_name(i), "tag_out");
        }
    }
}

// ── 2. Dispatcher ───────────────────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 100,
        max_shrink_iters: 200,
        .. ProptestConfig::default()
    })]

    #[test]
    fn straight_line_functions_translate(func in arb_straight_line()) {
        let src = func.to_ll();
        let parsed = llvm2hdl::parser::parse(&src);
        prop_assert!(parsed.errors.is_empty(), "parse errors for:\n{}\n{:?}", src, parsed.errors);
        let module = parsed.module.unwrap();

        let translation = translate_function(&module.functions[0], "f", &TranslateOptions::default());
        prop_assert!(translation.is_ok(), "translate failed for:\n{}\n{:?}", src, translation.err());
        let translation = translation.unwrap();

        let chain = translation.unit.chain();
        prop_assert_eq!(chain.len(), func.insts.len());
        prop_assert_eq!(translation.unit.ports().len(), 5 + func.params);

        let drivers: Vec<usize> = chain
            .instances()
            .iter()
            .enumerate()
            .filter(|(_, inst)| inst.output == RETURN_VALUE)
            .map(|(i, _)| i)
            .collect();
        prop_assert_eq!(drivers, vec![func.returned]);

        for (inst, (op, _, _)) in chain.instances().iter().zip(&func.insts) {
            prop_assert_eq!(inst.operation, *op);
        }

        let total: usize = translation.statistics.values().sum();
        prop_assert_eq!(total, func.insts.len());
    }
}

// ── 3. Identifier normalization ─────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 500,
        max_shrink_iters: 200,
        .. ProptestConfig::default()
    })]

    #[test]
    fn signal_names_are_basic_identifiers(raw in "[-a-zA-Z$._0-9]{0,12}") {
        let name = llvm2hdl::resolve::signal_name(&raw);
        prop_assert!(llvm2hdl::resolve::is_basic_identifier(&name), "{:?} -> {:?}", raw, name);
        if llvm2hdl::resolve::is_basic_identifier(&raw) {
            prop_assert_eq!(name, raw);
        }
    }
}
