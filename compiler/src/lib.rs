// llvm2hdl — LLVM IR to VHDL translator
//
// Library root. Front-end (lexer, parser, ir), translation core (resolve,
// translate, chain, vhdl) and the driver-facing pipeline.

pub mod callgraph;
pub mod chain;
pub mod demangle;
pub mod diag;
pub mod ir;
pub mod lexer;
pub mod parser;
pub mod pipeline;
pub mod resolve;
pub mod translate;
pub mod vhdl;
