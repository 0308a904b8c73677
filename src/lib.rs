//! Compiler for a GDScript-style, indentation-structured scripting
//! language.
//!
//! High-level layout:
//! - frontend: `lexer` + `parser` produce the shared AST (`ast`)
//! - `analyzer` resolves names and checks types over the AST
//! - `codegen` lowers the AST to the IR in `ir` and emits an assembly
//!   listing, a `GDOBJ` object blob, or a minimal native executable
//!
//! Each pass collects its own `diagnostics`; the driver stops at the first
//! pass that reports errors.
pub mod analyzer;
pub mod ast;
pub mod codegen;
pub mod diagnostics;
pub mod ir;
pub mod lexer;
pub mod parser;
pub mod token;
