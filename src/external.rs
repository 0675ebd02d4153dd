//! External commands: PATH resolution and supervised child processes.

use crate::command::{CommandFactory, EXIT_FAILURE, ExecutableCommand, ExitCode, Stdin, Stdout};
use crate::env::Environment;
use crate::interpreter::Factory;
use crate::sig;
use anyhow::{Context, Result};
use log::debug;
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use std::borrow::Cow;
use std::ffi::{OsStr, OsString};
use std::os::unix::process::ExitStatusExt;
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Interval between completion polls while a foreground child runs.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// A command resolved to an executable outside the shell.
pub struct ExternalCommand {
    /// Name as the user typed it; used for trace lines.
    name: String,
    /// Resolved executable path.
    path: OsString,
    args: Vec<OsString>,
}

impl CommandFactory for Factory<ExternalCommand> {
    fn try_create(
        &self,
        env: &Environment,
        name: &str,
        args: &[&str],
    ) -> Option<Box<dyn ExecutableCommand>> {
        let search_paths = env.get_var("PATH")?;
        let executable = find_command_path(OsStr::new(&search_paths), Path::new(name))?;
        Some(Box::new(ExternalCommand {
            name: name.to_string(),
            path: executable.as_os_str().to_owned(),
            args: args.iter().map(|a| a.into()).collect(),
        }))
    }
}

impl ExecutableCommand for ExternalCommand {
    fn execute(
        self: Box<Self>,
        stdin: Box<dyn Stdin>,
        stdout: Box<dyn Stdout>,
        env: &mut Environment,
    ) -> Result<ExitCode> {
        run_supervised(
            &self.name,
            &self.path,
            &self.args,
            stdin.stdio(),
            stdout.stdio(),
            env,
            sig::interrupt_flag(),
        )
    }
}

/// Run one external command under interrupt supervision.
///
/// SIGINT is routed to `cancel` for the child's lifetime; when the flag
/// goes up the signal is forwarded to the child and we block until it is
/// gone. The flag is cleared and SIGINT restored to ignored before
/// returning, whatever happened.
pub(crate) fn run_supervised(
    name: &str,
    program: &OsStr,
    args: &[OsString],
    stdin: Stdio,
    stdout: Stdio,
    env: &Environment,
    cancel: &AtomicBool,
) -> Result<ExitCode> {
    sig::catch_interrupts()?;
    let status = supervise(name, program, args, stdin, stdout, env, cancel);
    cancel.store(false, Ordering::SeqCst);
    sig::ignore_interrupts()?;
    status
}

fn supervise(
    name: &str,
    program: &OsStr,
    args: &[OsString],
    stdin: Stdio,
    stdout: Stdio,
    env: &Environment,
    cancel: &AtomicBool,
) -> Result<ExitCode> {
    let spawned = {
        let mut command = std::process::Command::new(program);
        command
            .args(args)
            .stdin(stdin)
            .stdout(stdout)
            .envs(&env.vars)
            .current_dir(&env.current_dir);
        command.spawn()
        // `command` is dropped here, closing the parent's copies of any
        // pipe descriptors before we wait. A pipe consumer must be able to
        // reach EOF once this child exits.
    };

    let mut child = match spawned {
        Ok(child) => child,
        Err(e) => {
            let status = e.raw_os_error().unwrap_or(EXIT_FAILURE);
            eprintln!("opsh: {name}: {e}");
            eprintln!("{name} exited with status {status}");
            return Ok(status);
        }
    };
    debug!("spawned {name} as pid {}", child.id());

    let status = loop {
        if let Some(status) = child.try_wait().context("waitpid")? {
            break status;
        }
        if cancel.load(Ordering::SeqCst) {
            debug!("interrupting pid {}", child.id());
            // The child may have exited between the poll and the kill;
            // wait() reaps it either way.
            let _ = signal::kill(Pid::from_raw(child.id() as i32), Signal::SIGINT);
            break child.wait().context("waitpid")?;
        }
        std::thread::sleep(POLL_INTERVAL);
    };

    Ok(classify(name, status))
}

/// Turn a wait status into a shell exit code, printing the trace line.
fn classify(name: &str, status: ExitStatus) -> ExitCode {
    if let Some(code) = status.code() {
        eprintln!("{name} exited with status {code}");
        code
    } else if let Some(signum) = status.signal() {
        eprintln!("{name} terminated by signal {signum}");
        EXIT_FAILURE
    } else {
        eprintln!("{name} finished in an unknown state");
        EXIT_FAILURE
    }
}

/// Resolve a command name the way a shell would.
///
/// - absolute paths and relative paths with directory components are taken
///   as-is if they exist,
/// - a bare name is looked up in each directory of `search_paths` in order,
/// - an empty name resolves to nothing.
pub fn find_command_path<'a>(search_paths: &OsStr, path: &'a Path) -> Option<Cow<'a, Path>> {
    if path.as_os_str().is_empty() {
        return None;
    }
    if path.is_absolute() || path.components().nth(1).is_some() {
        return path.exists().then_some(Cow::Borrowed(path));
    }
    std::env::split_paths(search_paths)
        .map(|dir| dir.join(path))
        .find(|candidate| candidate.exists())
        .map(Cow::Owned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nix::errno::Errno;
    use std::time::Instant;

    fn arg(s: &str) -> OsString {
        OsString::from(s)
    }

    #[test]
    fn finds_absolute_path() {
        let found = find_command_path(OsStr::new("/bin"), Path::new("/bin/sh"))
            .expect("/bin/sh should exist");
        assert_eq!(found.as_ref(), Path::new("/bin/sh"));
    }

    #[test]
    fn missing_absolute_path_is_none() {
        assert!(find_command_path(OsStr::new("/bin"), Path::new("/bin/nonexisting")).is_none());
    }

    #[test]
    fn bare_name_is_searched_in_path() {
        let found = find_command_path(OsStr::new("/nonexisting:/bin"), Path::new("sh"))
            .expect("'sh' should be found via /bin");
        assert_eq!(found.as_ref(), Path::new("/bin/sh"));
    }

    #[test]
    fn bare_name_not_in_path_is_none() {
        assert!(find_command_path(OsStr::new("/bin"), Path::new("no-such-cmd")).is_none());
    }

    #[test]
    fn empty_name_is_none() {
        assert!(find_command_path(OsStr::new("/bin"), Path::new("")).is_none());
    }

    #[test]
    fn surfaces_child_exit_code() {
        let env = Environment::new();
        let cancel = AtomicBool::new(false);
        let status = run_supervised(
            "false",
            OsStr::new("false"),
            &[],
            Stdio::null(),
            Stdio::null(),
            &env,
            &cancel,
        )
        .expect("supervision should succeed");
        assert_eq!(status, 1);

        let status = run_supervised(
            "true",
            OsStr::new("true"),
            &[],
            Stdio::null(),
            Stdio::null(),
            &env,
            &cancel,
        )
        .expect("supervision should succeed");
        assert_eq!(status, 0);
    }

    #[test]
    fn spawn_failure_surfaces_os_error_code() {
        let env = Environment::new();
        let cancel = AtomicBool::new(false);
        let status = run_supervised(
            "bogus",
            OsStr::new("/no/such/program"),
            &[],
            Stdio::null(),
            Stdio::null(),
            &env,
            &cancel,
        )
        .expect("spawn failure is not a supervision error");
        assert_eq!(status, Errno::ENOENT as i32);
    }

    #[test]
    fn non_executable_file_surfaces_permission_error() {
        let env = Environment::new();
        let cancel = AtomicBool::new(false);
        let status = run_supervised(
            "passwd-file",
            OsStr::new("/etc/passwd"),
            &[],
            Stdio::null(),
            Stdio::null(),
            &env,
            &cancel,
        )
        .expect("spawn failure is not a supervision error");
        assert_eq!(status, Errno::EACCES as i32);
    }

    #[test]
    fn cancellation_interrupts_long_running_child() {
        let env = Environment::new();
        let cancel = AtomicBool::new(false);
        let started = Instant::now();

        let status = std::thread::scope(|scope| {
            scope.spawn(|| {
                std::thread::sleep(Duration::from_millis(100));
                cancel.store(true, Ordering::SeqCst);
            });
            run_supervised(
                "sleep",
                OsStr::new("sleep"),
                &[arg("10")],
                Stdio::null(),
                Stdio::null(),
                &env,
                &cancel,
            )
            .expect("supervision should succeed")
        });

        assert_ne!(status, 0, "an interrupted child is a failed command");
        assert!(
            started.elapsed() < Duration::from_secs(5),
            "cancellation should not wait for the full sleep"
        );
        assert!(!cancel.load(Ordering::SeqCst), "flag is cleared on return");
    }
}
