//! The execution engine and the interactive loop.

use crate::command::{CommandFactory, EXIT_FAILURE, ExecutableCommand, ExitCode, Stdin, Stdout};
use crate::env::Environment;
use crate::lexer::Tokenizer;
use crate::parser::{ChainCommand, ControlOp, split_commands};
use crate::sig;
use anyhow::{Context, Result};
use log::debug;
use nix::errno::Errno;
use nix::unistd;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::fs::File;
use std::io::{Read, Write};
use std::marker::PhantomData;
use std::os::fd::OwnedFd;
use std::process::Stdio;

/// Factory for command types defined in this crate; the generic parameter
/// selects which one. See the [`CommandFactory`] impls in `builtin` and
/// `external`.
pub(crate) struct Factory<T> {
    _phantom: PhantomData<T>,
}

impl<T> Default for Factory<T> {
    fn default() -> Self {
        Self {
            _phantom: PhantomData,
        }
    }
}

/// Input side of the descriptor state threaded across a command chain.
enum ChainInput {
    /// The shell's own standard input.
    Inherit,
    /// Read end of the pipe the previous command produced into.
    Pipe(OwnedFd),
}

impl ChainInput {
    fn into_stdin(self) -> Box<dyn Stdin> {
        match self {
            ChainInput::Inherit => Box::new(InheritedStdin(std::io::stdin().lock())),
            ChainInput::Pipe(fd) => Box::new(File::from(fd)),
        }
    }
}

/// Where a chain's final output goes. `Inherit` is the shell's stdout;
/// `Fd` lets callers (tests, notably) capture output through a descriptor
/// of their own, duplicated for each command that writes to it.
pub(crate) enum ChainOutput {
    Inherit,
    Fd(OwnedFd),
}

impl ChainOutput {
    fn for_command(&self) -> Result<Box<dyn Stdout>> {
        match self {
            ChainOutput::Inherit => Ok(Box::new(InheritedStdout(std::io::stdout()))),
            ChainOutput::Fd(fd) => {
                let dup = fd.try_clone().context("dup output descriptor")?;
                Ok(Box::new(File::from(dup)))
            }
        }
    }
}

/// The shell: an environment plus the ordered list of command factories
/// consulted to dispatch each parsed command.
///
/// [`Interpreter::default`] wires up the six builtins and the external
/// command launcher; [`Interpreter::repl`] runs the interactive loop.
pub struct Interpreter {
    env: Environment,
    commands: Vec<Box<dyn CommandFactory>>,
}

impl Interpreter {
    pub fn new(commands: Vec<Box<dyn CommandFactory>>) -> Self {
        Self {
            env: Environment::new(),
            commands,
        }
    }

    /// Read-eval-print loop. Returns `Ok` on end of input (Ctrl-D); an
    /// input-side failure is an error and ends the shell unsuccessfully.
    pub fn repl(&mut self) -> Result<()> {
        // Idle disposition; the supervisor takes over while a child runs.
        sig::ignore_interrupts()?;
        let mut editor = DefaultEditor::new()?;

        loop {
            match editor.readline(&self.prompt()) {
                Ok(line) => {
                    let _ = editor.add_history_entry(line.as_str());
                    // Per-command failures were already reported and turned
                    // into statuses; anything left is infrastructure.
                    if let Err(e) = self.execute_line(&line) {
                        eprintln!("opsh: {e:#}");
                    }
                }
                // Ctrl-C at the prompt: nothing is running, prompt again.
                Err(ReadlineError::Interrupted) => continue,
                Err(ReadlineError::Eof) => return Ok(()),
                Err(e) => return Err(e).context("reading input"),
            }
        }
    }

    fn prompt(&self) -> String {
        match std::env::current_dir() {
            Ok(dir) => format!("{}$ ", dir.display()),
            Err(_) => "$ ".to_string(),
        }
    }

    /// Parse and execute one input line, returning the last command's status.
    pub fn execute_line(&mut self, line: &str) -> Result<ExitCode> {
        let tokens: Vec<&str> = Tokenizer::new(line).collect();
        debug!("tokens: {tokens:?}");
        let commands = split_commands(&tokens);
        debug!("commands: {commands:?}");
        self.execute_chain(&commands)
    }

    pub fn execute_chain(&mut self, commands: &[ChainCommand]) -> Result<ExitCode> {
        self.execute_chain_to(commands, ChainOutput::Inherit)
    }

    /// Execute a command chain, threading descriptor state between stages.
    ///
    /// `Err` is reserved for infrastructure failures (opening a pipe,
    /// duplicating a descriptor); everything per-command comes back as a
    /// status fed to the control-operator continuation policy.
    pub(crate) fn execute_chain_to(
        &mut self,
        commands: &[ChainCommand],
        chain_out: ChainOutput,
    ) -> Result<ExitCode> {
        let mut input = ChainInput::Inherit;
        let mut last_status = 0;

        for command in commands {
            // A piped command writes into a fresh pipe; everything else
            // writes to the chain output.
            let (pipe_read, output): (Option<OwnedFd>, Box<dyn Stdout>) =
                if command.op == ControlOp::Pipe {
                    let (read_end, write_end) = unistd::pipe().context("opening pipe")?;
                    (Some(read_end), Box::new(File::from(write_end)))
                } else {
                    (None, chain_out.for_command()?)
                };

            let stdin = std::mem::replace(&mut input, ChainInput::Inherit).into_stdin();
            last_status = self.run_one(command, stdin, output);

            // The producer is done and its write end is closed; the read
            // end feeds the next command.
            if let Some(read_end) = pipe_read {
                input = ChainInput::Pipe(read_end);
            }

            if !should_continue(command.op, last_status) {
                break;
            }
        }

        Ok(last_status)
    }

    /// Dispatch and run a single command, converting every failure into a
    /// reported exit status.
    fn run_one(
        &mut self,
        command: &ChainCommand,
        stdin: Box<dyn Stdin>,
        stdout: Box<dyn Stdout>,
    ) -> ExitCode {
        let Some((&name, args)) = command.argv.split_first() else {
            // Adjacent operators (`; ;`) produce these; the original
            // behavior was undefined, ours is a reported failure.
            eprintln!("opsh: empty command");
            return EXIT_FAILURE;
        };

        let created = self
            .commands
            .iter()
            .find_map(|factory| factory.try_create(&self.env, name, args));

        match created {
            Some(cmd) => match cmd.execute(stdin, stdout, &mut self.env) {
                Ok(status) => status,
                Err(e) => {
                    eprintln!("opsh: {name}: {e:#}");
                    EXIT_FAILURE
                }
            },
            None => {
                let status = Errno::ENOENT as ExitCode;
                eprintln!("opsh: {name}: command not found");
                eprintln!("{name} exited with status {status}");
                status
            }
        }
    }
}

impl Default for Interpreter {
    /// The full shell: builtins in dispatch order, external launcher last.
    fn default() -> Self {
        use crate::builtin::{Cd, Echo, Exec, Exit, Export, Pwd};
        use crate::external::ExternalCommand;
        Self::new(vec![
            Box::new(Factory::<Exit>::default()),
            Box::new(Factory::<Cd>::default()),
            Box::new(Factory::<Pwd>::default()),
            Box::new(Factory::<Echo>::default()),
            Box::new(Factory::<Export>::default()),
            Box::new(Factory::<Exec>::default()),
            Box::new(Factory::<ExternalCommand>::default()),
        ])
    }
}

/// Continuation policy, keyed on the operator of the command that just ran.
fn should_continue(op: ControlOp, status: ExitCode) -> bool {
    match op {
        ControlOp::Or => status != 0,
        ControlOp::And | ControlOp::Pipe => status == 0,
        ControlOp::Seq => true,
        ControlOp::Nop => false,
    }
}

struct InheritedStdin(std::io::StdinLock<'static>);

impl Read for InheritedStdin {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.0.read(buf)
    }
}

impl Stdin for InheritedStdin {
    fn stdio(self: Box<Self>) -> Stdio {
        Stdio::inherit()
    }
}

struct InheritedStdout(std::io::Stdout);

impl Write for InheritedStdout {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.0.flush()
    }
}

impl Stdout for InheritedStdout {
    fn stdio(self: Box<Self>) -> Stdio {
        Stdio::inherit()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Run a line with the chain output captured through an OS pipe.
    fn run_captured(line: &str) -> (ExitCode, String) {
        let mut shell = Interpreter::default();
        let tokens: Vec<&str> = Tokenizer::new(line).collect();
        let commands = split_commands(&tokens);

        let (read_end, write_end) = unistd::pipe().expect("pipe");
        let status = shell
            .execute_chain_to(&commands, ChainOutput::Fd(write_end))
            .expect("chain execution");
        // The chain (and with it the last write-end duplicate) is done;
        // reading now sees all output and then EOF.
        let mut output = String::new();
        File::from(read_end)
            .read_to_string(&mut output)
            .expect("read captured output");
        (status, output)
    }

    #[test]
    fn or_recovers_from_failure() {
        let (status, out) = run_captured("false || echo recovered");
        assert_eq!(status, 0);
        assert_eq!(out, "recovered\n");
    }

    #[test]
    fn or_skips_after_success() {
        let (status, out) = run_captured("true || echo skipped");
        assert_eq!(status, 0);
        assert_eq!(out, "");
    }

    #[test]
    fn and_runs_after_success() {
        let (status, out) = run_captured("true && echo yes");
        assert_eq!(status, 0);
        assert_eq!(out, "yes\n");
    }

    #[test]
    fn and_skips_after_failure() {
        let (status, out) = run_captured("false && echo no");
        assert_ne!(status, 0);
        assert_eq!(out, "");
    }

    #[test]
    fn sequence_runs_unconditionally() {
        let (status, out) = run_captured("false ; echo still here");
        assert_eq!(status, 0);
        assert_eq!(out, "still here\n");
    }

    #[test]
    fn echo_passes_dash_leading_arguments_through() {
        let (status, out) = run_captured("echo -n hi");
        assert_eq!(status, 0);
        assert_eq!(out, "-n hi\n");
    }

    #[test]
    fn pipe_feeds_builtin_output_into_external_command() {
        let (status, out) = run_captured("echo hi | cat");
        assert_eq!(status, 0);
        assert_eq!(out, "hi\n");
    }

    #[test]
    fn pipe_stops_when_producer_fails() {
        let (status, out) = run_captured("false | echo unreachable");
        assert_ne!(status, 0);
        assert_eq!(out, "");
    }

    #[test]
    fn quoted_operator_is_not_an_operator() {
        let (status, out) = run_captured("echo 'a | b'");
        assert_eq!(status, 0);
        assert_eq!(out, "a | b\n");
    }

    #[test]
    fn comment_cuts_off_the_rest_of_the_line() {
        let (status, out) = run_captured("echo hi # ; echo invisible");
        assert_eq!(status, 0);
        assert_eq!(out, "hi\n");
    }

    #[test]
    fn empty_command_is_a_reported_failure() {
        let (status, out) = run_captured("; ;");
        assert_ne!(status, 0);
        assert_eq!(out, "");
    }

    #[test]
    fn unknown_command_reports_not_found() {
        let (status, out) = run_captured("opsh-no-such-command-xyz");
        assert_ne!(status, 0);
        assert_eq!(out, "");
    }

    #[test]
    fn blank_line_is_a_successful_no_op() {
        let (status, out) = run_captured("   ");
        assert_eq!(status, 0);
        assert_eq!(out, "");
    }

    #[test]
    fn export_is_visible_to_children() {
        let (status, out) = run_captured("export OPSH_CHAIN_TEST=seen ; printenv OPSH_CHAIN_TEST");
        assert_eq!(status, 0);
        assert_eq!(out, "seen\n");
    }
}
