//! Storwize/SVC command-line grammar: tokeniser and output formatter.

pub mod format;
pub mod tokenizer;

pub use format::{ObjectView, RenderOptions, Table};
pub use tokenizer::{arity, tokenize, Arity, FlagValue, ParsedCommand, TokenizeError, FLAGS};
