//! Trait seams shared by builtins and external commands.

use crate::env::Environment;
use anyhow::Result;
use std::io::{Read, Write};
use std::process::Stdio;

/// Process exit status as the shell sees it: 0 is success, anything else is
/// failure. Control-operator continuation logic is driven by this value.
pub type ExitCode = i32;

/// Exit status reported for a command that was killed by a signal.
pub const EXIT_FAILURE: ExitCode = 1;

/// A command's input: readable in-process (for builtins) and convertible
/// into a [`Stdio`] handle (for spawning external children).
///
/// Implemented for the inherited standard input and for pipe read ends.
/// A blanket impl covers any `Read + Into<Stdio>` type such as `File`.
pub trait Stdin: Read {
    /// Consume this input and produce the [`Stdio`] to wire into a child.
    fn stdio(self: Box<Self>) -> Stdio;
}

impl<T: Read + Into<Stdio>> Stdin for T {
    fn stdio(self: Box<Self>) -> Stdio {
        (*self).into()
    }
}

/// A command's output: writable in-process and convertible into a [`Stdio`]
/// handle. Mirrors [`Stdin`] for the write side.
pub trait Stdout: Write {
    fn stdio(self: Box<Self>) -> Stdio;
}

impl<T: Write + Into<Stdio>> Stdout for T {
    fn stdio(self: Box<Self>) -> Stdio {
        (*self).into()
    }
}

/// Object-safe trait for anything the execution engine can run.
///
/// Execution consumes the input and output handles. For a piped command this
/// is what guarantees the pipe's write end is closed once the producer has
/// finished: the handle moves in here and is dropped (or inherited by the
/// child and closed in the parent) by the time `execute` returns.
pub trait ExecutableCommand {
    fn execute(
        self: Box<Self>,
        stdin: Box<dyn Stdin>,
        stdout: Box<dyn Stdout>,
        env: &mut Environment,
    ) -> Result<ExitCode>;
}

/// Factory that recognizes a command name and instantiates it.
///
/// Returns `None` when the name is not this factory's command; the engine
/// scans its factory list in order, so builtins shadow external programs of
/// the same name.
pub trait CommandFactory {
    fn try_create(
        &self,
        env: &Environment,
        name: &str,
        args: &[&str],
    ) -> Option<Box<dyn ExecutableCommand>>;
}
