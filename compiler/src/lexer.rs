// Lexer for LLVM IR assembly (.ll) files.
//
// Tokenizes the textual IR emitted by clang/opt. Only the lexical shapes the
// front-end needs are distinguished; every keyword is a plain `Word` so the
// parser decides what it means.
// Uses the `logos` crate for DFA-based lexing.
//
// Preconditions: input is valid UTF-8.
// Postconditions: returns all tokens with byte-offset spans, plus any lex errors.
// Failure modes: unrecognized characters produce `LexError`; lexing continues.
// Side effects: none.

use logos::Logos;
use std::fmt;

/// Byte-offset span in source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

/// A lexer error with location.
#[derive(Debug, Clone, PartialEq)]
pub struct LexError {
    pub span: Span,
    pub message: String,
}

/// Result of lexing: tokens plus any errors (non-fatal).
#[derive(Debug)]
pub struct LexResult {
    pub tokens: Vec<(Token, Span)>,
    pub errors: Vec<LexError>,
}

/// LLVM IR token types.
///
/// Sigils are stripped from identifiers: `%sum` lexes as `Local("sum")`,
/// `@main` as `Global("main")`.
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r]+|;[^\n]*")]
pub enum Token {
    // ── Identifiers ──
    /// Local value, label reference or named type: `%x`, `%0`, `%"a b"`.
    #[regex(r"%[-a-zA-Z$._0-9]+", strip_sigil)]
    #[regex(r#"%"[^"]*""#, strip_quoted_sigil)]
    Local(String),

    /// Global symbol: `@f`, `@"quoted name"`.
    #[regex(r"@[-a-zA-Z$._0-9]+", strip_sigil)]
    #[regex(r#"@"[^"]*""#, strip_quoted_sigil)]
    Global(String),

    /// Attribute group or debug record: `#0`, `#dbg_value`.
    #[regex(r"#[a-zA-Z0-9_]+", strip_sigil)]
    Hash(String),

    /// Metadata reference: `!0`, `!dbg`, or a bare `!` before `{`/`"`.
    #[regex(r"![-a-zA-Z$._0-9]*", strip_sigil)]
    Meta(String),

    // ── Types and literals ──
    /// Integer type `iN`, value is the bit width.
    #[regex(r"i[0-9]+", parse_int_type, priority = 5)]
    IntType(u32),

    /// Integer literal.
    #[regex(r"-?[0-9]+", parse_int)]
    Int(i64),

    /// Floating point literal, decimal or LLVM hex form (`0x3FF0…`, `0xK…`).
    #[regex(r"-?[0-9]+\.[0-9]+([eE][-+]?[0-9]+)?", |lex| lex.slice().to_string())]
    #[regex(r"0x[KLMHR]?[0-9A-Fa-f]+", |lex| lex.slice().to_string())]
    FloatLit(String),

    /// String literal, plain or `c"…"` byte array. No escape processing.
    #[regex(r#"c?"[^"]*""#, parse_string)]
    StringLit(String),

    /// Keyword, label name or any other bare word.
    #[regex(r"[a-zA-Z_.$][a-zA-Z0-9_.$]*", |lex| lex.slice().to_string())]
    Word(String),

    // ── Symbols ──
    #[token("=")]
    Equals,
    #[token(",")]
    Comma,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token("<")]
    Lt,
    #[token(">")]
    Gt,
    #[token("*")]
    Star,
    #[token(":")]
    Colon,
    #[token("|")]
    Pipe,

    // ── Structure ──
    /// One or more newlines (significant: one instruction per line).
    #[regex(r"\n+")]
    Newline,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Local(s) => write!(f, "%{s}"),
            Token::Global(s) => write!(f, "@{s}"),
            Token::Hash(s) => write!(f, "#{s}"),
            Token::Meta(s) => write!(f, "!{s}"),
            Token::IntType(bits) => write!(f, "i{bits}"),
            Token::Int(v) => write!(f, "{v}"),
            Token::FloatLit(s) => write!(f, "{s}"),
            Token::StringLit(s) => write!(f, "\"{s}\""),
            Token::Word(s) => write!(f, "{s}"),
            Token::Equals => write!(f, "="),
            Token::Comma => write!(f, ","),
            Token::LParen => write!(f, "("),
            Token::RParen => write!(f, ")"),
            Token::LBrace => write!(f, "{{"),
            Token::RBrace => write!(f, "}}"),
            Token::LBracket => write!(f, "["),
            Token::RBracket => write!(f, "]"),
            Token::Lt => write!(f, "<"),
            Token::Gt => write!(f, ">"),
            Token::Star => write!(f, "*"),
            Token::Colon => write!(f, ":"),
            Token::Pipe => write!(f, "|"),
            Token::Newline => write!(f, "<newline>"),
        }
    }
}

// ── Callbacks ──

fn strip_sigil(lex: &mut logos::Lexer<'_, Token>) -> String {
    lex.slice()[1..].to_string()
}

fn strip_quoted_sigil(lex: &mut logos::Lexer<'_, Token>) -> String {
    let slice = lex.slice();
    slice[2..slice.len() - 1].to_string()
}

fn parse_int_type(lex: &mut logos::Lexer<'_, Token>) -> Option<u32> {
    lex.slice()[1..].parse().ok()
}

fn parse_int(lex: &mut logos::Lexer<'_, Token>) -> Option<i64> {
    lex.slice().parse().ok()
}

fn parse_string(lex: &mut logos::Lexer<'_, Token>) -> String {
    let slice = lex.slice();
    let body = slice.strip_prefix('c').unwrap_or(slice);
    body[1..body.len() - 1].to_string()
}

// ── Public API ──

/// Lex an LLVM IR source string into tokens.
///
/// Returns all successfully parsed tokens together with any errors for
/// unrecognised characters. Lexing is non-fatal: errors are collected and
/// the lexer continues past bad characters.
pub fn lex(source: &str) -> LexResult {
    let lexer = Token::lexer(source);
    let mut tokens = Vec::new();
    let mut errors = Vec::new();

    for (result, range) in lexer.spanned() {
        let span = Span {
            start: range.start,
            end: range.end,
        };
        match result {
            Ok(token) => tokens.push((token, span)),
            Err(()) => errors.push(LexError {
                span,
                message: format!("unexpected character: {:?}", &source[span.start..span.end]),
            }),
        }
    }

    LexResult { tokens, errors }
}

// ── Tests ──
