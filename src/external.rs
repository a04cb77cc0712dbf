use crate::command::{CommandFactory, ExecutableCommand, ExitCode, NOT_FOUND};
use crate::env::Environment;
use crate::error::ShellError;
use crate::interpreter::Factory;
use anyhow::Result;
use log::debug;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use thiserror::Error;

/// How a child process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// The process exited on its own with this code.
    Exited(ExitCode),
    /// The process was killed by this signal number.
    Signaled(i32),
}

impl Termination {
    /// Shell status: the exit code itself, or 128 + signal number.
    pub fn code(self) -> ExitCode {
        match self {
            Termination::Exited(code) => code,
            Termination::Signaled(signal) => 128 + signal,
        }
    }
}

impl From<ExitStatus> for Termination {
    fn from(status: ExitStatus) -> Self {
        match status.code() {
            Some(code) => Termination::Exited(code),
            None => terminated_by_signal(status),
        }
    }
}

#[cfg(unix)]
fn terminated_by_signal(exit_status: ExitStatus) -> Termination {
    use std::os::unix::process::ExitStatusExt;
    match exit_status.signal() {
        Some(signal) => Termination::Signaled(signal),
        None => Termination::Exited(255),
    }
}

#[cfg(not(unix))]
fn terminated_by_signal(_exit_status: ExitStatus) -> Termination {
    Termination::Exited(255)
}

/// Conventional name of a signal number, for diagnostics.
pub fn signal_name(signal: i32) -> Option<&'static str> {
    // numbers shared by Linux and the BSDs
    let name = match signal {
        1 => "SIGHUP",
        2 => "SIGINT",
        3 => "SIGQUIT",
        4 => "SIGILL",
        5 => "SIGTRAP",
        6 => "SIGABRT",
        8 => "SIGFPE",
        9 => "SIGKILL",
        11 => "SIGSEGV",
        13 => "SIGPIPE",
        14 => "SIGALRM",
        15 => "SIGTERM",
        _ => return None,
    };
    Some(name)
}

/// Failure to run a resolved program.
#[derive(Debug, Error)]
pub enum LaunchError {
    /// The child process could not be created at all.
    #[error("{}: {source}", .path.display())]
    Spawn {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The child was started but its exit status could not be collected.
    #[error("{}: failed to wait for process: {source}", .path.display())]
    Wait {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl LaunchError {
    /// Status to record for the failed command, if any.
    ///
    /// A wait failure says nothing about how the child ended, so the previous
    /// status is kept.
    pub fn status(&self) -> Option<ExitCode> {
        match self {
            LaunchError::Spawn { .. } => Some(NOT_FOUND),
            LaunchError::Wait { .. } => None,
        }
    }
}

/// Run `path` in the foreground and wait for it to finish.
///
/// `argv[0]` is the name the user typed; on Unix it is passed to the child as
/// its `arg0`, elsewhere it is dropped. The remaining elements are passed as
/// arguments. Standard streams are inherited, variables and working directory
/// come from `env`.
pub fn launch(
    path: &Path,
    argv: &[String],
    env: &Environment,
) -> Result<Termination, LaunchError> {
    let mut cmd = Command::new(path);
    if let Some((arg0, args)) = argv.split_first() {
        set_arg0(&mut cmd, arg0);
        cmd.args(args);
    }
    cmd.stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .envs(env.vars.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .current_dir(&env.current_dir);

    debug!("spawning {} as {:?}", path.display(), argv);
    let mut child = cmd.spawn().map_err(|source| LaunchError::Spawn {
        path: path.to_path_buf(),
        source,
    })?;
    let status = child.wait().map_err(|source| LaunchError::Wait {
        path: path.to_path_buf(),
        source,
    })?;
    debug!("{} finished: {status}", path.display());
    Ok(status.into())
}

#[cfg(unix)]
fn set_arg0(cmd: &mut Command, arg0: &str) {
    use std::os::unix::process::CommandExt;
    cmd.arg0(arg0);
}

#[cfg(not(unix))]
fn set_arg0(_cmd: &mut Command, _arg0: &str) {}

/// Command that is not a builtin.
pub struct ExternalCommand {
    path: PathBuf,
    argv: Vec<String>,
}

impl ExternalCommand {
    pub fn new(path: PathBuf, argv: Vec<String>) -> Self {
        Self { path, argv }
    }
}

impl CommandFactory for Factory<ExternalCommand> {
    fn try_create(
        &self,
        env: &mut Environment,
        name: &str,
        args: &[&str],
    ) -> Option<Box<dyn ExecutableCommand>> {
        let executable = env.resolve(name)?;
        let argv = std::iter::once(name)
            .chain(args.iter().copied())
            .map(String::from)
            .collect();
        Some(Box::new(ExternalCommand::new(executable, argv)))
    }
}

impl ExecutableCommand for ExternalCommand {
    fn execute(
        self: Box<Self>,
        stdout: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode> {
        // the child writes straight to the terminal
        stdout.flush()?;
        let termination = launch(&self.path, &self.argv, env).map_err(ShellError::from)?;
        if let Termination::Signaled(signal) = termination {
            let name = self.argv.first().map(String::as_str).unwrap_or_default();
            match signal_name(signal) {
                Some(sig) => eprintln!("{name}: terminated by signal {sig} ({signal})"),
                None => eprintln!("{name}: terminated by signal {signal}"),
            }
        }
        Ok(termination.code())
    }
}
