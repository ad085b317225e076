// Parser for LLVM IR assembly (.ll) files.
//
// Parses a token stream (from the lexer) into the in-memory IR of `ir.rs`.
// Uses chumsky combinators. Function definitions are parsed structurally;
// every other top-level line (target triple, attributes, metadata, globals)
// is skipped. Inside a body, one line is one instruction, label or debug
// record; trailing attributes (`, align 4`, `, !dbg !7`) are skipped.
//
// Preconditions: input is a valid token stream from `lexer::lex()`.
// Postconditions: returns a Module plus any parse errors (non-fatal).
// Failure modes: syntax errors produce `Rich` diagnostics.
// Side effects: none.

use chumsky::input::{Stream, ValueInput};
use chumsky::prelude::*;
use chumsky::span::SimpleSpan;

use crate::ir::*;
use crate::lexer::Token;

/// Result of parsing: IR module plus any errors.
#[derive(Debug)]
pub struct ParseResult {
    pub module: Option<Module>,
    pub errors: Vec<Rich<'static, Token, SimpleSpan>>,
}

/// Parse an LLVM IR source string. Lexes then parses.
///
/// Returns a module (if parsing succeeded) plus any errors.
pub fn parse(source: &str) -> ParseResult {
    let lex_result = crate::lexer::lex(source);
    let len = source.len();

    // Convert lexer output to chumsky stream.
    let token_iter = lex_result.tokens.into_iter().map(|(tok, span)| {
        let cspan: SimpleSpan = (span.start..span.end).into();
        (tok, cspan)
    });
    let eoi: SimpleSpan = (len..len).into();
    let stream = Stream::from_iter(token_iter).map(eoi, |(t, s): (_, _)| (t, s));

    let (module, parse_errors) = module_parser().parse(stream).into_output_errors();

    // Merge lex errors + parse errors.
    let mut all_errors: Vec<Rich<'static, Token, SimpleSpan>> = lex_result
        .errors
        .into_iter()
        .map(|e| {
            let span: SimpleSpan = (e.span.start..e.span.end).into();
            Rich::custom(span, e.message)
        })
        .collect();
    all_errors.extend(parse_errors.into_iter().map(|e| e.into_owned()));

    ParseResult {
        module,
        errors: all_errors,
    }
}

// ── Line and item classification ──

/// One line of a function body, before grouping into blocks.
#[derive(Debug, Clone)]
enum Line {
    Label(String),
    Inst(Inst),
    Term(Terminator),
    Skip,
}

/// One top-level line of a module.
#[derive(Debug, Clone)]
enum Item {
    Function(Function),
    Declare(String),
    SourceFilename(String),
    Skip,
}

/// Words that start a type, so they can never be attributes.
fn is_type_word(word: &str) -> bool {
    matches!(
        word,
        "void"
            | "ptr"
            | "label"
            | "half"
            | "bfloat"
            | "float"
            | "double"
            | "x86_fp80"
            | "fp128"
            | "ppc_fp128"
            | "metadata"
    )
}

/// Opcodes with a dedicated instruction parser. A line starting with one of
/// these must match its structured form; anything else becomes `Other`.
fn is_modelled_opcode(word: &str) -> bool {
    BinOp::from_opcode(word).is_some()
        || Terminator::is_terminator_opcode(word)
        || matches!(
            word,
            "load" | "store" | "alloca" | "call" | "tail" | "musttail" | "notail"
        )
}

/// Group body lines into basic blocks. A block ends at its terminator; a
/// label opens the next one.
fn group_blocks(lines: Vec<Line>) -> Result<Vec<Block>, String> {
    let mut blocks = Vec::new();
    let mut label: Option<String> = None;
    let mut insts = Vec::new();
    let mut open = false;

    for line in lines {
        match line {
            Line::Label(name) => {
                if open {
                    return Err(format!(
                        "basic block {} has no terminator before label '{name}'",
                        block_display_name(&label, blocks.len()),
                    ));
                }
                label = Some(name);
                open = true;
            }
            Line::Inst(inst) => {
                insts.push(inst);
                open = true;
            }
            Line::Term(terminator) => {
                blocks.push(Block {
                    label: label.take(),
                    insts: std::mem::take(&mut insts),
                    terminator,
                });
                open = false;
            }
            Line::Skip => {}
        }
    }

    if open {
        return Err(format!(
            "basic block {} has no terminator",
            block_display_name(&label, blocks.len())
        ));
    }
    if blocks.is_empty() {
        return Err("function body has no basic blocks".to_string());
    }
    Ok(blocks)
}

fn block_display_name(label: &Option<String>, index: usize) -> String {
    match label {
        Some(name) => format!("'{name}'"),
        None => format!("#{index}"),
    }
}

/// Label names referenced by a `br` (`label %target`).
fn branch_targets(tokens: &[Token]) -> Vec<String> {
    tokens
        .windows(2)
        .filter_map(|pair| match pair {
            [Token::Word(w), Token::Local(target)] if w == "label" => Some(target.clone()),
            _ => None,
        })
        .collect()
}

fn build_module(items: Vec<Item>) -> Module {
    let mut module = Module {
        source_filename: None,
        functions: Vec::new(),
        declarations: Vec::new(),
    };
    for item in items {
        match item {
            Item::Function(f) => module.functions.push(f),
            Item::Declare(name) => module.declarations.push(name),
            Item::SourceFilename(name) => module.source_filename = Some(name),
            Item::Skip => {}
        }
    }
    module
}

// ── Main parser builder ──
//
// All grammar rules are built inside `module_parser` so the combinators share
// one concrete input type and no per-rule lifetime annotations are needed.

fn module_parser<'tokens, I>(
) -> impl Parser<'tokens, I, Module, extra::Err<Rich<'tokens, Token, SimpleSpan>>>
where
    I: ValueInput<'tokens, Token = Token, Span = SimpleSpan>,
{
    let kw = |word: &'static str| {
        any()
            .filter(move |t: &Token| matches!(t, Token::Word(w) if w == word))
            .ignored()
    };

    // ── Newlines ──

    let nl = just(Token::Newline).repeated().ignored();
    let line_break = just(Token::Newline).repeated().at_least(1).ignored();
    let rest_of_line = any()
        .and_is(just(Token::Newline).not())
        .repeated()
        .ignored();

    // ── Leaves ──

    let local = select! { Token::Local(name) => name };
    let global = select! { Token::Global(name) => name };
    let int_lit = select! { Token::Int(v) => v };

    // Parenthesised attribute argument, e.g. `dereferenceable(4)`.
    let paren_group = any()
        .and_is(just(Token::RParen).not())
        .and_is(just(Token::Newline).not())
        .repeated()
        .ignored()
        .delimited_by(just(Token::LParen), just(Token::RParen));

    // `noundef`, `align 4`, `dereferenceable(8)`, `dso_local`, …
    let attribute = select! { Token::Word(w) if !is_type_word(&w) => () }
        .then(paren_group.clone().or_not())
        .then(int_lit.or_not())
        .ignored();

    // ── Types ──

    let ty = recursive(|ty| {
        let scalar = select! {
            Token::IntType(bits) => Type::Int(bits),
            Token::Local(name) => Type::Named(name),
            Token::Word(w) if w == "void" => Type::Void,
            Token::Word(w) if w == "ptr" => Type::Ptr,
            Token::Word(w) if w == "label" => Type::Label,
            Token::Word(w) if w == "half" || w == "bfloat" => Type::Float(16),
            Token::Word(w) if w == "float" => Type::Float(32),
            Token::Word(w) if w == "double" => Type::Float(64),
            Token::Word(w) if w == "x86_fp80" => Type::Float(80),
            Token::Word(w) if w == "fp128" || w == "ppc_fp128" => Type::Float(128),
        };

        let count = select! { Token::Int(n) if n >= 0 => n as u64 };

        let array = count
            .clone()
            .then_ignore(kw("x"))
            .then(ty.clone())
            .delimited_by(just(Token::LBracket), just(Token::RBracket))
            .map(|(n, elem)| Type::Array(n, Box::new(elem)));

        let vector = count
            .then_ignore(kw("x"))
            .then(ty.clone())
            .delimited_by(just(Token::Lt), just(Token::Gt))
            .map(|(n, elem)| Type::Vector(n, Box::new(elem)));

        let structure = ty
            .clone()
            .separated_by(just(Token::Comma))
            .collect::<Vec<_>>()
            .delimited_by(just(Token::LBrace), just(Token::RBrace))
            .map(Type::Struct);

        // Legacy typed pointers (`i32*`) collapse to `ptr`.
        choice((scalar, array, vector, structure))
            .then(just(Token::Star).repeated().collect::<Vec<_>>())
            .map(|(base, stars)| if stars.is_empty() { base } else { Type::Ptr })
    });

    // ── Operands ──

    let operand = select! {
        Token::Local(name) => Operand::Local(name),
        Token::Global(name) => Operand::Global(name),
        Token::Int(v) => Operand::Int(v),
        Token::Word(w) if w == "true" => Operand::Int(1),
        Token::Word(w) if w == "false" => Operand::Int(0),
        Token::Word(w) if matches!(w.as_str(), "null" | "undef" | "poison" | "zeroinitializer" | "none") => Operand::Constant(w),
        Token::FloatLit(text) => Operand::Constant(text),
    };

    // ── Instructions ──

    let result = local.clone().then_ignore(just(Token::Equals)).or_not();

    let binop = select! { Token::Word(w) => w }.try_map(|w, span| {
        BinOp::from_opcode(&w)
            .ok_or_else(|| Rich::custom(span, format!("'{w}' is not a binary opcode")))
    });
    let wrap_flags = select! {
        Token::Word(w) if matches!(w.as_str(), "nsw" | "nuw" | "exact" | "disjoint") => ()
    }
    .repeated()
    .ignored();

    let binary = binop
        .then_ignore(wrap_flags)
        .then(ty.clone())
        .then(operand.clone())
        .then_ignore(just(Token::Comma))
        .then(operand.clone())
        .map(|(((op, ty), lhs), rhs)| InstKind::Binary { op, ty, lhs, rhs });

    let load = kw("load")
        .ignore_then(kw("volatile").or_not())
        .ignore_then(ty.clone())
        .then_ignore(just(Token::Comma))
        .then_ignore(ty.clone())
        .then(operand.clone())
        .map(|(ty, src)| InstKind::Load { ty, src });

    let store = kw("store")
        .ignore_then(kw("volatile").or_not())
        .ignore_then(ty.clone())
        .then(operand.clone())
        .then_ignore(just(Token::Comma))
        .then_ignore(ty.clone())
        .then(operand.clone())
        .map(|((ty, value), dst)| InstKind::Store { ty, value, dst });

    let alloca = kw("alloca")
        .ignore_then(kw("inalloca").or_not())
        .ignore_then(ty.clone())
        .map(|ty| InstKind::Alloca { ty });

    let callee = select! {
        Token::Global(name) => Operand::Global(name),
        Token::Local(name) => Operand::Local(name),
    };
    let call = choice((kw("tail"), kw("musttail"), kw("notail")))
        .or_not()
        .ignore_then(kw("call"))
        .ignore_then(attribute.clone().repeated())
        .ignore_then(ty.clone())
        // Explicit function type of a variadic callee: `(ptr, ...)`.
        .then_ignore(paren_group.clone().or_not())
        .then(callee)
        .map(|(return_type, callee)| InstKind::Call {
            return_type,
            callee,
        });

    let other_inst = select! {
        Token::Word(w) if !is_modelled_opcode(&w) => InstKind::Other { opcode: w },
    };

    let inst_line = result
        .clone()
        .then(choice((binary, load, store, alloca, call, other_inst)))
        .then_ignore(rest_of_line.clone())
        .map_with(|(result, kind), e| Inst {
            result,
            kind,
            span: e.span(),
        });

    // ── Terminators ──

    let ret = kw("ret")
        .ignore_then(
            kw("void")
                .to((Type::Void, None))
                .or(ty.clone().then(operand.clone()).map(|(ty, v)| (ty, Some(v)))),
        )
        .map_with(|(ty, value), e| Terminator::Ret {
            ty,
            value,
            span: e.span(),
        });

    let br = kw("br")
        .ignore_then(
            any()
                .and_is(just(Token::Newline).not())
                .repeated()
                .collect::<Vec<Token>>(),
        )
        .map_with(|tokens, e| Terminator::Br {
            targets: branch_targets(&tokens),
            span: e.span(),
        });

    // The case table of a `switch` spans several lines up to its `]`.
    let switch = kw("switch")
        .ignore_then(any().and_is(just(Token::RBracket).not()).repeated())
        .then_ignore(just(Token::RBracket))
        .map_with(|_, e| Terminator::Other {
            opcode: "switch".to_string(),
            span: e.span(),
        });

    let other_term = select! {
        Token::Word(w) if Terminator::is_terminator_opcode(&w) && !matches!(w.as_str(), "ret" | "br" | "switch") => w,
    }
    .map_with(|opcode, e| Terminator::Other {
        opcode,
        span: e.span(),
    });

    let term_line = result
        .ignore_then(choice((ret, br, switch, other_term)))
        .then_ignore(rest_of_line.clone());

    // ── Body lines ──

    let label = select! {
        Token::Word(name) => name,
        Token::Int(n) => n.to_string(),
        Token::StringLit(name) => name,
    }
    .then_ignore(just(Token::Colon));

    // `#dbg_value(...)` / `#dbg_declare(...)` records carry no semantics here.
    let debug_record = select! { Token::Hash(_) => () }.then(rest_of_line.clone());

    let line = choice((
        label.map(Line::Label),
        debug_record.to(Line::Skip),
        term_line.map(Line::Term),
        inst_line.map(Line::Inst),
    ))
    .boxed();

    let body = nl
        .clone()
        .ignore_then(
            line.separated_by(line_break.clone())
                .allow_trailing()
                .collect::<Vec<_>>(),
        )
        .then_ignore(nl.clone())
        .try_map(|lines, span| group_blocks(lines).map_err(|msg| Rich::custom(span, msg)));

    // ── Function definition ──

    let param = ty
        .clone()
        .then_ignore(attribute.clone().repeated())
        .then(local.or_not())
        .map_with(|(ty, name), e| (ty, name, e.span()));

    let params = param
        .map(Some)
        .or(kw("...").to(None))
        .separated_by(just(Token::Comma))
        .collect::<Vec<_>>()
        .delimited_by(just(Token::LParen), just(Token::RParen))
        .map(|params| {
            params
                .into_iter()
                .flatten()
                .enumerate()
                .map(|(i, (ty, name, span))| Param {
                    // Unnamed parameters are numbered like LLVM numbers them.
                    name: name.unwrap_or_else(|| i.to_string()),
                    ty,
                    span,
                })
                .collect::<Vec<_>>()
        });

    let function_attributes = any()
        .and_is(just(Token::LBrace).not())
        .and_is(just(Token::Newline).not())
        .repeated()
        .ignored();

    let function = kw("define")
        .ignore_then(attribute.clone().repeated())
        .ignore_then(ty.clone())
        .then(global.clone())
        .then(params)
        .then_ignore(function_attributes)
        .then(body.delimited_by(just(Token::LBrace), just(Token::RBrace)))
        .map_with(|(((return_type, name), params), blocks), e| Function {
            name,
            return_type,
            params,
            blocks,
            span: e.span(),
        })
        .boxed();

    // ── Other top-level lines ──

    let declare = kw("declare")
        .ignore_then(
            any()
                .and_is(global.clone().not())
                .and_is(just(Token::Newline).not())
                .repeated(),
        )
        .ignore_then(global)
        .then_ignore(rest_of_line.clone())
        .map(Item::Declare);

    let source_filename = kw("source_filename")
        .ignore_then(just(Token::Equals))
        .ignore_then(select! { Token::StringLit(s) => s })
        .map(Item::SourceFilename);

    // A line that does not start with `define` is skipped. Excluding
    // `define` keeps malformed functions from being silently ignored.
    let skipped = any()
        .filter(|t: &Token| {
            !matches!(t, Token::Newline) && !matches!(t, Token::Word(w) if w == "define")
        })
        .then(rest_of_line)
        .to(Item::Skip);

    let item = choice((
        function.map(Item::Function),
        declare,
        source_filename,
        skipped,
    ));

    // ── Module ──

    nl.clone()
        .ignore_then(
            item.separated_by(line_break)
                .allow_trailing()
                .collect::<Vec<_>>(),
        )
        .then_ignore(nl)
        .map(build_module)
}

// ── Tests ──
