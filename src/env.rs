use crate::command::ExitCode;
use crate::resolver::Resolver;
use crate::rules::Platform;
use std::collections::HashMap;
use std::env as stdenv;
use std::path::PathBuf;

/// Mutable, per-session state shared by the interpreter and its commands.
///
/// The environment contains:
/// - `vars`: a map of environment variables that will be visible to executed commands.
/// - `current_dir`: the working directory for command execution.
/// - `should_exit`: a flag that a REPL loop can check to know when to terminate.
/// - `last_status`: the status of the most recent foreground command.
///
/// It also owns the executable [`Resolver`] and its cache, so everything a
/// session remembers between commands lives in one place.
#[derive(Debug)]
pub struct Environment {
    /// Key-value store of environment variables (e.g., PATH, HOME).
    pub vars: HashMap<String, String>,
    /// The current working directory for command execution.
    pub current_dir: PathBuf,
    /// When set to true, indicates that an interactive loop should exit.
    pub should_exit: bool,
    /// Normalized status of the last command, as seen by `exit` without arguments.
    pub last_status: ExitCode,
    platform: Platform,
    resolver: Resolver,
}

impl Environment {
    /// Capture the current process state using the host platform's rules.
    pub fn new() -> Self {
        Self::with_platform(Platform::native())
    }

    /// Capture the current process state into a new `Environment` instance.
    ///
    /// This copies variables from `std::env::vars()` and initializes `current_dir`
    /// from `std::env::current_dir()`.
    pub fn with_platform(platform: Platform) -> Self {
        let vars = stdenv::vars().collect();
        let current_dir = stdenv::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self::from_parts(vars, current_dir, platform)
    }

    /// Build an environment from explicit parts, without reading process variables.
    pub fn from_parts(
        vars: HashMap<String, String>,
        current_dir: PathBuf,
        platform: Platform,
    ) -> Self {
        Self {
            vars,
            current_dir,
            should_exit: false,
            last_status: 0,
            platform,
            resolver: Resolver::new(platform.search_rules()),
        }
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    /// Get the value of an environment variable.
    ///
    /// Looks up the key in `self.vars` first, falling back to `std::env::var`.
    pub fn get_var(&self, key: &str) -> Option<String> {
        lookup_var(&self.vars, key)
    }

    /// Set or override an environment variable in `self.vars`.
    pub fn set_var(&mut self, key: impl Into<String>, val: impl Into<String>) {
        self.vars.insert(key.into(), val.into());
    }

    /// Resolve a command name to an executable using the session's search rules.
    ///
    /// Variables are re-read on every call, so a changed `PATH` is picked up
    /// (and the cache flushed) by the next resolution.
    pub fn resolve(&mut self, name: &str) -> Option<PathBuf> {
        let vars = &self.vars;
        self.resolver
            .resolve(name, &self.current_dir, |key| lookup_var(vars, key))
    }

    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

fn lookup_var(vars: &HashMap<String, String>, key: &str) -> Option<String> {
    vars.get(key).cloned().or_else(|| stdenv::var(key).ok())
}

#[cfg(test)]
mod tests {
    use crate::env::Environment;
    use crate::rules::Platform;
    use std::collections::HashMap;
    use std::env as stdenv;

    #[test]
    fn test_env_set_and_get_var() {
        let mut env = Environment::from_parts(
            HashMap::new(),
            stdenv::current_dir().unwrap(),
            Platform::Posix,
        );

        // initially absent
        assert_eq!(env.get_var("SOME_RANDOM_ENV_VAR_12345"), None);

        env.set_var("KEY", "VALUE");

        assert_eq!(env.get_var("KEY"), Some("VALUE".to_string()));
        assert_eq!(env.last_status, 0);
        assert!(!env.should_exit);
    }

    #[test]
    fn test_env_reads_from_process_env() {
        let env = Environment::new();
        assert!(env.get_var("PATH").is_some());
        assert_eq!(env.platform(), Platform::native());
    }

    #[test]
    #[cfg(unix)]
    fn test_resolve_follows_path_changes() {
        let mut env = Environment::from_parts(
            HashMap::new(),
            stdenv::current_dir().unwrap(),
            Platform::Posix,
        );

        env.set_var("PATH", "/nonexistent_dir_for_env_test");
        assert_eq!(env.resolve("sh"), None);

        env.set_var("PATH", "/bin");
        assert_eq!(env.resolve("sh"), Some("/bin/sh".into()));
        assert_eq!(env.resolver().cached_len(), 1);
    }
}
