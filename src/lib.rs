//! The core of a small interactive shell.
//!
//! A command line goes through three stages: the [`lexer`] splits it into
//! argument words, the [`resolver`] finds the executable for the first word
//! (remembering answers until `PATH` changes), and the [`external`] launcher
//! runs it and reports how it ended. [`Interpreter`] ties the stages together
//! with a handful of builtins (`cd`, `echo`, `exit`, `pwd`, `type`) and a
//! read-eval-print loop.
//!
//! Platform differences (path separators, `PATHEXT`, quoting dialect) are
//! isolated behind [`rules::SearchRules`] and selected with [`rules::Platform`],
//! so both flavours can be used on any host.

mod builtin;
pub mod command;
pub mod env;
pub mod error;
pub mod external;
mod interpreter;
pub mod lexer;
pub mod resolver;
pub mod rules;

/// Just a convenient re-export of the interactive command runner.
///
/// See [`Interpreter`] for the high-level API and examples.
pub use interpreter::Interpreter;
