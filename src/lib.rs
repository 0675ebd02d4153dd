//! An interactive command-line shell.
//!
//! The pipeline is: [`lexer`] turns an input line into tokens, [`parser`]
//! splits the tokens at control operators into a command chain, and the
//! [`Interpreter`] dispatches each chain command to a built-in or an
//! external program, threading pipe descriptors between them.
//!
//! The [`command`] module exposes the trait seams (`ExecutableCommand`,
//! `CommandFactory`, the stream traits) for wiring an interpreter with a
//! custom command set; [`env`] is the shell-side environment those
//! commands mutate.

mod builtin;
pub mod command;
pub mod env;
mod external;
mod interpreter;
mod io_adapters;
pub mod lexer;
pub mod parser;
mod sig;

pub use interpreter::Interpreter;
