//! A lexer generator: compiles named regular-expression rules into a
//! deterministic finite automaton and flattens it into a directly-indexable
//! transition table driven by a table-walking tokenizer.

#![deny(
    clippy::disallowed_methods,
    clippy::suspicious,
    clippy::style,
    clippy::clone_on_ref_ptr,
    missing_debug_implementations,
    missing_copy_implementations
)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod alphabet;
pub mod config;
pub mod dot;
pub mod graph;
pub mod lexer;
pub mod machine;
pub mod pattern;
pub mod table;

pub use self::{
    alphabet::Alphabet,
    config::{BuildError, Configuration, ConfigurationError, LexerRule, RuleId},
    graph::{DeterminizationError, Graph, Input, StateId},
    lexer::{LexError, Lexer, Token, TokenType},
    machine::Automaton,
    pattern::{Fragment, ParseError},
    table::LexerTable,
};
