//! Built-in commands: `exit`, `cd`, `pwd`, `echo`, `export`, `exec`.
//!
//! Builtins run inside the shell process. That is load-bearing for two of
//! them: `exit` terminates the shell itself, and `exec` replaces the shell's
//! process image without an extra fork.

use crate::command::{CommandFactory, EXIT_FAILURE, ExecutableCommand, ExitCode, Stdin, Stdout};
use crate::env::Environment;
use crate::interpreter::Factory;
use anyhow::{Context, Result};
use argh::{EarlyExit, FromArgs};
use std::fs;
use std::io::{Read, Write};
use std::os::unix::process::CommandExt;
use std::path::PathBuf;

/// A built-in command known to the shell at compile time.
///
/// Arguments are parsed with [`argh`] (`FromArgs`); execution gets the
/// command's input and output streams plus the mutable environment, and
/// returns a shell-convention exit status.
pub(crate) trait BuiltinCommand: Sized + FromArgs {
    /// Name the command is dispatched under, e.g. "echo".
    fn name() -> &'static str;

    /// Parse the raw argument vector. The default goes through argh;
    /// commands that take their arguments as opaque data (`echo`, `export`)
    /// override it so dash-leading tokens stay arguments instead of being
    /// read as options.
    fn parse(args: &[&str]) -> Result<Self, EarlyExit> {
        Self::from_args(&[Self::name()], args)
    }

    fn execute(
        self,
        stdin: &mut dyn Read,
        stdout: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode>;
}

impl<T: BuiltinCommand> ExecutableCommand for T {
    fn execute(
        self: Box<Self>,
        mut stdin: Box<dyn Stdin>,
        mut stdout: Box<dyn Stdout>,
        env: &mut Environment,
    ) -> Result<ExitCode> {
        let status = match T::execute(*self, &mut stdin, &mut stdout, env) {
            Ok(code) => code,
            Err(e) => {
                eprintln!("opsh: {}: {:#}", T::name(), e);
                EXIT_FAILURE
            }
        };
        // Per-command trace line; the supervisor prints the matching line
        // for external commands.
        eprintln!("{} exited with status {}", T::name(), status);
        Ok(status)
    }
}

/// Fallback command produced when argument parsing fails (or `--help` is
/// requested): prints argh's message and reports the corresponding status.
struct InvalidArgs {
    name: &'static str,
    output: String,
    is_error: bool,
}

impl ExecutableCommand for InvalidArgs {
    fn execute(
        self: Box<Self>,
        _stdin: Box<dyn Stdin>,
        mut stdout: Box<dyn Stdout>,
        _env: &mut Environment,
    ) -> Result<ExitCode> {
        let status = if self.is_error { EXIT_FAILURE } else { 0 };
        stdout.write_all(self.output.as_bytes())?;
        eprintln!("{} exited with status {}", self.name, status);
        Ok(status)
    }
}

impl<T: BuiltinCommand + 'static> CommandFactory for Factory<T> {
    fn try_create(
        &self,
        _env: &Environment,
        name: &str,
        args: &[&str],
    ) -> Option<Box<dyn ExecutableCommand>> {
        if name == T::name() {
            Some(match T::parse(args) {
                Ok(cmd) => Box::new(cmd),
                Err(EarlyExit { output, status }) => Box::new(InvalidArgs {
                    name: T::name(),
                    output,
                    is_error: status.is_err(),
                }),
            })
        } else {
            None
        }
    }
}

#[derive(FromArgs)]
/// Terminate the shell.
pub struct Exit {
    #[argh(positional)]
    /// exit status to terminate with; defaults to 0.
    pub code: Option<i32>,
}

impl BuiltinCommand for Exit {
    fn name() -> &'static str {
        "exit"
    }

    fn execute(
        self,
        _stdin: &mut dyn Read,
        _stdout: &mut dyn Write,
        _env: &mut Environment,
    ) -> Result<ExitCode> {
        std::process::exit(self.code.unwrap_or(0))
    }
}

#[derive(FromArgs)]
/// Change the shell's working directory.
pub struct Cd {
    #[argh(positional)]
    /// directory to change to, absolute or relative to the current one.
    pub target: String,
}

impl BuiltinCommand for Cd {
    fn name() -> &'static str {
        "cd"
    }

    fn execute(
        self,
        _stdin: &mut dyn Read,
        _stdout: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode> {
        let target = PathBuf::from(&self.target);
        let target = if target.is_absolute() {
            target
        } else {
            env.current_dir.join(target)
        };

        let canonical = fs::canonicalize(&target)
            .with_context(|| format!("can't resolve {}", target.display()))?;
        std::env::set_current_dir(&canonical)
            .with_context(|| format!("can't chdir to {}", canonical.display()))?;
        env.current_dir = canonical;
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Print the working directory.
pub struct Pwd {}

impl BuiltinCommand for Pwd {
    fn name() -> &'static str {
        "pwd"
    }

    fn execute(
        self,
        _stdin: &mut dyn Read,
        stdout: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode> {
        writeln!(stdout, "{}", env.current_dir.display())?;
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Write the arguments to the output, space-separated and newline-terminated.
pub struct Echo {
    #[argh(positional, greedy)]
    /// values to print as-is.
    pub args: Vec<String>,
}

impl BuiltinCommand for Echo {
    fn name() -> &'static str {
        "echo"
    }

    // Every token is data: `echo -n hi` prints "-n hi", not a usage error.
    fn parse(args: &[&str]) -> Result<Self, EarlyExit> {
        Ok(Self {
            args: args.iter().map(|a| a.to_string()).collect(),
        })
    }

    fn execute(
        self,
        _stdin: &mut dyn Read,
        stdout: &mut dyn Write,
        _env: &mut Environment,
    ) -> Result<ExitCode> {
        writeln!(stdout, "{}", self.args.join(" "))?;
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Set environment variables for the shell and its children.
pub struct Export {
    #[argh(positional, greedy)]
    /// assignments in key=value form.
    pub pairs: Vec<String>,
}

impl BuiltinCommand for Export {
    fn name() -> &'static str {
        "export"
    }

    // Assignments are opaque data, whatever character they start with.
    fn parse(args: &[&str]) -> Result<Self, EarlyExit> {
        Ok(Self {
            pairs: args.iter().map(|a| a.to_string()).collect(),
        })
    }

    fn execute(
        self,
        _stdin: &mut dyn Read,
        _stdout: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode> {
        for pair in &self.pairs {
            // Malformed assignments are reported and skipped, never fatal.
            match pair.split_once('=') {
                Some((key, value)) if !key.is_empty() && !value.is_empty() => {
                    env.set_var(key, value);
                }
                _ => eprintln!("opsh: export: expected key=value but got {pair:?}"),
            }
        }
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Replace the shell with another program.
///
/// On success this never returns: the shell's process image is gone.
pub struct Exec {
    #[argh(positional)]
    /// program to replace the shell with; resolved via PATH.
    pub program: String,

    #[argh(positional, greedy)]
    /// arguments passed to the program.
    pub args: Vec<String>,
}

impl BuiltinCommand for Exec {
    fn name() -> &'static str {
        "exec"
    }

    fn execute(
        self,
        _stdin: &mut dyn Read,
        _stdout: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode> {
        let err = std::process::Command::new(&self.program)
            .args(&self.args)
            .envs(&env.vars)
            .current_dir(&env.current_dir)
            .exec();
        // Only reachable when the replacement failed; the shell keeps running.
        eprintln!("opsh: exec: {}: {}", self.program, err);
        Ok(err.raw_os_error().unwrap_or(EXIT_FAILURE))
    }
}
