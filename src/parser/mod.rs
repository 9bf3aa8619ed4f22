//! `MODULE.bazel` parsing.
//!
//! Split the way the teacher splits its HCL parser: a tokenizer
//! (`lexer`) feeding a semantic layer (`module_bazel`) that knows the
//! handful of call forms worth validating.

mod lexer;
mod module_bazel;

pub use module_bazel::parse;
