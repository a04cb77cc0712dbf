//! Platform-specific rules for turning a command name into candidate files.
//!
//! [`PosixRules`] and [`ExtensionRules`] are the two flavours of executable
//! lookup a shell has to deal with. Both are plain data-free types so they can
//! be chosen at startup through [`Platform`] and exercised on any host.

use crate::lexer::QuoteStyle;
use std::fmt::Debug;
use std::fs::Metadata;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Extensions tried by [`ExtensionRules`] when `PATHEXT` is not set.
pub const DEFAULT_PATHEXT: &str = ".com;.exe;.bat;.cmd";

/// Directories and extensions derived from a snapshot of the environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchSpace {
    /// Directories to search, in order. An empty path means the current directory.
    pub dirs: Vec<PathBuf>,
    /// Normalized executable extensions (lowercase, leading dot), in order.
    pub extensions: Vec<String>,
}

/// Capability interface separating the lookup algorithm from platform details.
pub trait SearchRules: Debug {
    /// Environment variables whose raw values make up the resolver snapshot.
    fn variables(&self) -> &'static [&'static str];

    /// Whether `name` should be treated as a path instead of searched for.
    fn is_direct_path(&self, name: &str) -> bool;

    /// Key under which the outcome for `name` is cached.
    fn normalize_key(&self, name: &str) -> String;

    /// Derive the search space from values of [`SearchRules::variables`], in the same order.
    fn search_space(&self, values: &[Option<String>]) -> SearchSpace;

    /// Files to probe for `name`, in priority order.
    fn candidates(&self, name: &str, space: &SearchSpace, cwd: &Path) -> Vec<PathBuf>;

    /// Whether a regular file with this metadata may be executed.
    fn is_executable(&self, metadata: &Metadata) -> bool;
}

/// Colon-separated `PATH`, execute permission bits, exact names.
#[derive(Debug, Clone, Copy, Default)]
pub struct PosixRules;

impl SearchRules for PosixRules {
    fn variables(&self) -> &'static [&'static str] {
        &["PATH"]
    }

    fn is_direct_path(&self, name: &str) -> bool {
        name.contains('/')
    }

    fn normalize_key(&self, name: &str) -> String {
        name.to_owned()
    }

    fn search_space(&self, values: &[Option<String>]) -> SearchSpace {
        let dirs = match values.first() {
            Some(Some(path)) => path.split(':').map(PathBuf::from).collect(),
            _ => Vec::new(),
        };
        SearchSpace {
            dirs,
            extensions: Vec::new(),
        }
    }

    fn candidates(&self, name: &str, space: &SearchSpace, cwd: &Path) -> Vec<PathBuf> {
        space
            .dirs
            .iter()
            .map(|dir| cwd.join(dir).join(name))
            .collect()
    }

    #[cfg(unix)]
    fn is_executable(&self, metadata: &Metadata) -> bool {
        use std::os::unix::fs::PermissionsExt;
        metadata.permissions().mode() & 0o111 != 0
    }

    #[cfg(not(unix))]
    fn is_executable(&self, _metadata: &Metadata) -> bool {
        true
    }
}

/// Semicolon-separated `PATH` plus the `PATHEXT` extension list.
///
/// The current directory is always searched first and names are matched
/// case-insensitively. Any regular file is considered executable: the
/// extension is what makes it runnable.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExtensionRules;

impl ExtensionRules {
    fn normalize_extensions(raw: &str) -> Vec<String> {
        let mut extensions: Vec<String> = Vec::new();
        for entry in raw.split(';').map(str::trim).filter(|e| !e.is_empty()) {
            let mut ext = entry.to_lowercase();
            if !ext.starts_with('.') {
                ext.insert(0, '.');
            }
            if !extensions.contains(&ext) {
                extensions.push(ext);
            }
        }
        extensions
    }

    fn has_extension(name: &str) -> bool {
        Path::new(name).extension().is_some()
    }
}

impl SearchRules for ExtensionRules {
    fn variables(&self) -> &'static [&'static str] {
        &["PATH", "PATHEXT"]
    }

    fn is_direct_path(&self, name: &str) -> bool {
        let mut chars = name.chars();
        let drive_letter = matches!(
            (chars.next(), chars.next()),
            (Some(letter), Some(':')) if letter.is_ascii_alphabetic()
        );
        drive_letter || name.contains(['/', '\\'])
    }

    fn normalize_key(&self, name: &str) -> String {
        name.to_lowercase()
    }

    fn search_space(&self, values: &[Option<String>]) -> SearchSpace {
        let dirs = match values.first() {
            Some(Some(path)) => path
                .split(';')
                .filter(|dir| !dir.is_empty())
                .map(PathBuf::from)
                .collect(),
            _ => Vec::new(),
        };
        let mut extensions = match values.get(1) {
            Some(Some(raw)) => Self::normalize_extensions(raw),
            _ => Vec::new(),
        };
        if extensions.is_empty() {
            extensions = Self::normalize_extensions(DEFAULT_PATHEXT);
        }
        SearchSpace { dirs, extensions }
    }

    fn candidates(&self, name: &str, space: &SearchSpace, cwd: &Path) -> Vec<PathBuf> {
        let dirs = std::iter::once(cwd.to_path_buf())
            .chain(space.dirs.iter().map(|d| cwd.join(d)));
        let mut out = Vec::new();
        for dir in dirs {
            if Self::has_extension(name) {
                out.push(dir.join(name));
            } else {
                out.extend(
                    space
                        .extensions
                        .iter()
                        .map(|ext| dir.join(format!("{name}{ext}"))),
                );
            }
        }
        out
    }

    fn is_executable(&self, _metadata: &Metadata) -> bool {
        true
    }
}

/// Family of lookup and quoting rules the shell runs with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Posix,
    Windows,
}

impl Platform {
    /// The family matching the host the shell was built for.
    pub fn native() -> Self {
        if cfg!(windows) {
            Platform::Windows
        } else {
            Platform::Posix
        }
    }

    pub fn search_rules(self) -> Box<dyn SearchRules> {
        match self {
            Platform::Posix => Box::new(PosixRules),
            Platform::Windows => Box::new(ExtensionRules),
        }
    }

    pub fn quote_style(self) -> QuoteStyle {
        match self {
            Platform::Posix => QuoteStyle::Posix,
            Platform::Windows => QuoteStyle::Windows,
        }
    }
}

impl Default for Platform {
    fn default() -> Self {
        Self::native()
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "posix" | "unix" => Ok(Platform::Posix),
            "windows" | "win" => Ok(Platform::Windows),
            other => Err(format!("unknown platform `{other}`, expected `posix` or `windows`")),
        }
    }
}
