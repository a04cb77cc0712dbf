use crate::command::{CommandFactory, ExitCode};
use crate::env::Environment;
use crate::error::ShellError;
use crate::lexer;
use crate::rules::Platform;
use anyhow::Context;
use log::debug;
use std::io::{self, BufRead, Write};

/// Printed before each physical line that continues a command.
const CONTINUATION_PROMPT: &str = "> ";

/// Factory allows creating instances of ExecutableCommand.
///
/// Only support commands defined in this crate — BuiltinCommand and ExternalCommand.
pub(crate) struct Factory<T> {
    _phantom: std::marker::PhantomData<T>,
}

impl<T> Default for Factory<T> {
    fn default() -> Self {
        Self {
            _phantom: std::marker::PhantomData,
        }
    }
}

/// A minimal shell-like interpreter that can execute built-in and external commands.
///
/// The interpreter maintains an [`Environment`] (variables, working directory,
/// last status and the executable lookup cache) and a list of [`CommandFactory`]
/// objects that are queried to create commands by name. See [`Default`] for the
/// built-in factories included out of the box.
///
/// Example
/// ```
/// use shell_core::Interpreter;
/// let mut sh = Interpreter::default();
/// let code = sh.run("echo", &["hello", "world"]).unwrap();
/// assert_eq!(code, 0);
/// assert_eq!(sh.run_line("exit 3"), 3);
/// ```
pub struct Interpreter {
    env: Environment,
    commands: Vec<Box<dyn CommandFactory>>,
}

impl Interpreter {
    /// Create a new interpreter with a custom set of command factories.
    pub fn new(commands: Vec<Box<dyn CommandFactory>>, platform: Platform) -> Self {
        Self::with_env(commands, Environment::with_platform(platform))
    }

    /// Create an interpreter around an already prepared environment.
    pub fn with_env(commands: Vec<Box<dyn CommandFactory>>, env: Environment) -> Self {
        Self { env, commands }
    }

    /// The default builtins plus external programs, using `platform` rules.
    pub fn for_platform(platform: Platform) -> Self {
        Self::new(default_commands(), platform)
    }

    pub fn env(&self) -> &Environment {
        &self.env
    }

    pub fn env_mut(&mut self) -> &mut Environment {
        &mut self.env
    }

    /// Status of the most recently completed command.
    pub fn last_status(&self) -> ExitCode {
        self.env.last_status
    }

    /// Run a single command invocation by name with arguments.
    ///
    /// Returns the command's exit code or an error if the command cannot be created
    /// or fails to execute. The last status is not updated; see [`Interpreter::run_line`].
    pub fn run(&mut self, name: &str, args: &[&str]) -> anyhow::Result<ExitCode> {
        self.run_with_output(name, args, &mut io::stdout())
    }

    fn run_with_output(
        &mut self,
        name: &str,
        args: &[&str],
        stdout: &mut dyn Write,
    ) -> anyhow::Result<ExitCode> {
        for factory in &self.commands {
            if let Some(cmd) = factory.try_create(&mut self.env, name, args) {
                return cmd.execute(stdout, &mut self.env);
            }
        }
        Err(ShellError::CommandNotFound(name.to_string()).into())
    }

    /// Tokenize and run one line of input, recording and returning its status.
    ///
    /// Failures are reported on stderr and never propagate: a syntax error
    /// aborts the line with status 2, an unknown command yields 127. An empty
    /// line leaves the status as it was.
    pub fn run_line(&mut self, line: &str) -> ExitCode {
        self.run_line_with_output(line, &mut io::stdout())
    }

    fn run_line_with_output(&mut self, line: &str, stdout: &mut dyn Write) -> ExitCode {
        let tokens = match lexer::split_into_tokens(line, self.env.platform().quote_style()) {
            Ok(tokens) => tokens,
            Err(err) => {
                self.report(ShellError::from(err).into());
                return self.env.last_status;
            }
        };
        debug!("tokens = {:?}", tokens);

        let Some((name, args)) = tokens.split_first() else {
            return self.env.last_status;
        };
        let args: Vec<&str> = args.iter().map(String::as_str).collect();

        match self.run_with_output(name, &args, stdout) {
            Ok(code) => self.env.last_status = code,
            Err(err) => self.report(err),
        }
        self.env.last_status
    }

    fn report(&mut self, err: anyhow::Error) {
        eprintln!("{:#}", err);
        match err.downcast_ref::<ShellError>().map(ShellError::status) {
            Some(Some(code)) => self.env.last_status = code,
            Some(None) => debug!("keeping last status {}", self.env.last_status),
            None => self.env.last_status = 1,
        }
    }

    /// Read-Eval-Print Loop over `input`.
    ///
    /// Prints `prompt`, runs each line, and stops at end of input or once a
    /// command (normally `exit`) asks the session to finish. Returns the last
    /// status, which is what the shell process should exit with.
    ///
    /// A line ending in an unescaped backslash is joined with the next one.
    /// Bytes that are not valid UTF-8 are replaced with U+FFFD.
    pub fn repl(
        &mut self,
        mut input: impl BufRead,
        output: &mut dyn Write,
        prompt: &str,
    ) -> anyhow::Result<ExitCode> {
        let style = self.env.platform().quote_style();
        while !self.env.should_exit {
            write!(output, "{}", prompt)?;
            output.flush()?;

            let Some(mut command) = read_physical_line(&mut input)? else {
                break;
            };
            while lexer::needs_continuation(&command, style) {
                write!(output, "{}", CONTINUATION_PROMPT)?;
                output.flush()?;
                // at end of input the backslash stays literal
                let Some(next) = read_physical_line(&mut input)? else {
                    break;
                };
                command.push('\n');
                command.push_str(&next);
            }
            self.run_line_with_output(&command, output);
        }
        Ok(self.env.last_status)
    }
}

/// Read one line without its `\n` or `\r\n` terminator, `None` at end of input.
fn read_physical_line(input: &mut impl BufRead) -> anyhow::Result<Option<String>> {
    let mut buf = Vec::new();
    if input.read_until(b'\n', &mut buf).context("failed to read input")? == 0 {
        return Ok(None);
    }
    let line = buf.strip_suffix(b"\n").unwrap_or(&buf[..]);
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    Ok(Some(String::from_utf8_lossy(line).into_owned()))
}

fn default_commands() -> Vec<Box<dyn CommandFactory>> {
    use crate::builtin::*;
    use crate::external::ExternalCommand;
    vec![
        Box::new(Factory::<Pwd>::default()),
        Box::new(Factory::<Cd>::default()),
        Box::new(Factory::<Echo>::default()),
        Box::new(Factory::<Exit>::default()),
        Box::new(Factory::<Type>::default()),
        Box::new(Factory::<ExternalCommand>::default()),
    ]
}

impl Default for Interpreter {
    /// Create an interpreter with the default set of commands for the host platform:
    /// - built-ins: `pwd`, `cd`, `echo`, `exit`, `type`
    /// - external command launcher
    fn default() -> Self {
        Self::for_platform(Platform::native())
    }
}
