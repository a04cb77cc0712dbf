use crate::rules::{SearchRules, SearchSpace};
use log::{debug, trace};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Memoizing command-name to executable-path lookup.
///
/// The resolver keeps the raw values of the variables named by its
/// [`SearchRules`] as a snapshot. Every call to [`Resolver::resolve`] re-reads
/// them; when any value differs from the snapshot (plain string comparison)
/// the whole cache is dropped. Between such changes, repeated lookups of the
/// same name are answered from memory without touching the filesystem.
///
/// A cached path can go stale if the file is removed or its permissions
/// change after it was found. Callers must cope with the launch failing.
#[derive(Debug)]
pub struct Resolver {
    rules: Box<dyn SearchRules>,
    snapshot: Option<Vec<Option<String>>>,
    space: SearchSpace,
    cache: HashMap<String, Option<PathBuf>>,
    probes: usize,
}

impl Resolver {
    pub fn new(rules: Box<dyn SearchRules>) -> Self {
        Self {
            rules,
            snapshot: None,
            space: SearchSpace::default(),
            cache: HashMap::new(),
            probes: 0,
        }
    }

    /// Resolve `name` to an executable file.
    ///
    /// Names containing path structure are checked directly (relative to
    /// `cwd`) and returned canonicalized. Other names are searched for using
    /// the directories derived from `lookup`, which is asked for the current
    /// value of each environment variable the rules depend on.
    ///
    /// Returns `None` when nothing executable is found. Filesystem errors while
    /// probing are never reported: they only make that candidate a miss.
    pub fn resolve<F>(&mut self, name: &str, cwd: &Path, lookup: F) -> Option<PathBuf>
    where
        F: Fn(&str) -> Option<String>,
    {
        if name.is_empty() {
            return None;
        }

        if self.rules.is_direct_path(name) {
            return self.resolve_direct(&cwd.join(name));
        }

        self.refresh(lookup);

        let key = self.rules.normalize_key(name);
        if let Some(cached) = self.cache.get(&key) {
            debug!("resolve {name}: cached {cached:?}");
            return cached.clone();
        }

        let candidates = self.rules.candidates(name, &self.space, cwd);
        let found = candidates.into_iter().find(|c| self.probe(c));
        debug!("resolve {name}: found {found:?}");
        self.cache.insert(key, found.clone());
        found
    }

    /// Number of filesystem probes performed since creation.
    pub fn probe_count(&self) -> usize {
        self.probes
    }

    /// Number of names (hits and misses) currently remembered.
    pub fn cached_len(&self) -> usize {
        self.cache.len()
    }

    fn resolve_direct(&mut self, path: &Path) -> Option<PathBuf> {
        if !self.probe(path) {
            return None;
        }
        fs::canonicalize(path)
            .inspect_err(|err| trace!("canonicalize {}: {err}", path.display()))
            .ok()
    }

    fn refresh<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let current: Vec<Option<String>> = self
            .rules
            .variables()
            .iter()
            .map(|var| lookup(*var))
            .collect();

        if self.snapshot.as_ref() == Some(&current) {
            return;
        }

        if self.snapshot.is_some() {
            debug!(
                "search environment changed, dropping {} cached entries",
                self.cache.len()
            );
        }
        self.cache.clear();
        self.space = self.rules.search_space(&current);
        self.snapshot = Some(current);
    }

    fn probe(&mut self, candidate: &Path) -> bool {
        self.probes += 1;
        match fs::metadata(candidate) {
            Ok(meta) => meta.is_file() && self.rules.is_executable(&meta),
            Err(err) => {
                trace!("probe {}: {err}", candidate.display());
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::{ExtensionRules, PosixRules};
    use std::env as stdenv;
    use std::fs::File;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn make_unique_temp_dir(tag: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let p = stdenv::temp_dir().join(format!(
            "resolver_test_{}_{}_{}",
            tag,
            std::process::id(),
            nanos
        ));
        fs::create_dir_all(&p).expect("create temp dir");
        p
    }

    #[cfg(unix)]
    fn touch_executable(path: &Path) {
        use std::os::unix::fs::PermissionsExt;
        File::create(path).expect("touch");
        fs::set_permissions(path, fs::Permissions::from_mode(0o755)).expect("chmod");
    }

    fn env_with<'a>(vars: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
        move |key: &str| {
            vars.iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.to_string())
        }
    }

    #[test]
    #[cfg(unix)]
    fn test_resolves_first_match_in_path_order() {
        let tmp = make_unique_temp_dir("order");
        let (a, b) = (tmp.join("a"), tmp.join("b"));
        fs::create_dir_all(&a).unwrap();
        fs::create_dir_all(&b).unwrap();
        touch_executable(&a.join("tool"));
        touch_executable(&b.join("tool"));

        let path = format!("{}:{}", b.display(), a.display());
        let vars = [("PATH", path.as_str())];
        let mut resolver = Resolver::new(Box::new(PosixRules));

        let found = resolver.resolve("tool", &tmp, env_with(&vars));
        assert_eq!(found, Some(b.join("tool")));

        let _ = fs::remove_dir_all(tmp);
    }

    #[test]
    #[cfg(unix)]
    fn test_skips_non_executable_and_directories() {
        let tmp = make_unique_temp_dir("perm");
        let (a, b, c) = (tmp.join("a"), tmp.join("b"), tmp.join("c"));
        for d in [&a, &b, &c] {
            fs::create_dir_all(d).unwrap();
        }
        File::create(a.join("tool")).unwrap(); // mode 0644
        fs::create_dir_all(b.join("tool")).unwrap();
        touch_executable(&c.join("tool"));

        let path = format!("{}:{}:{}", a.display(), b.display(), c.display());
        let vars = [("PATH", path.as_str())];
        let mut resolver = Resolver::new(Box::new(PosixRules));

        assert_eq!(
            resolver.resolve("tool", &tmp, env_with(&vars)),
            Some(c.join("tool"))
        );

        let _ = fs::remove_dir_all(tmp);
    }

    #[test]
    #[cfg(unix)]
    fn test_second_lookup_is_served_from_cache() {
        let tmp = make_unique_temp_dir("cache");
        touch_executable(&tmp.join("tool"));

        let path = format!("/nonexistent_dir_for_resolver_test:{}", tmp.display());
        let vars = [("PATH", path.as_str())];
        let mut resolver = Resolver::new(Box::new(PosixRules));

        let first = resolver.resolve("tool", &tmp, env_with(&vars));
        let probes = resolver.probe_count();
        assert_eq!(probes, 2);

        let second = resolver.resolve("tool", &tmp, env_with(&vars));
        assert_eq!(first, second);
        assert_eq!(resolver.probe_count(), probes);

        // misses are remembered too
        assert_eq!(resolver.resolve("missing", &tmp, env_with(&vars)), None);
        let probes = resolver.probe_count();
        assert_eq!(resolver.resolve("missing", &tmp, env_with(&vars)), None);
        assert_eq!(resolver.probe_count(), probes);
        assert_eq!(resolver.cached_len(), 2);

        let _ = fs::remove_dir_all(tmp);
    }

    #[test]
    #[cfg(unix)]
    fn test_path_change_invalidates_cache() {
        let tmp = make_unique_temp_dir("invalidate");
        let (old, new) = (tmp.join("old"), tmp.join("new"));
        fs::create_dir_all(&old).unwrap();
        fs::create_dir_all(&new).unwrap();
        touch_executable(&old.join("tool"));
        touch_executable(&new.join("tool"));

        let mut resolver = Resolver::new(Box::new(PosixRules));

        let old_path = old.display().to_string();
        let vars = [("PATH", old_path.as_str())];
        assert_eq!(
            resolver.resolve("tool", &tmp, env_with(&vars)),
            Some(old.join("tool"))
        );

        let new_path = new.display().to_string();
        let vars = [("PATH", new_path.as_str())];
        assert_eq!(
            resolver.resolve("tool", &tmp, env_with(&vars)),
            Some(new.join("tool"))
        );

        // a miss cached under one PATH must not survive a change either
        let vars = [("PATH", "/nonexistent_dir_for_resolver_test")];
        assert_eq!(resolver.resolve("tool", &tmp, env_with(&vars)), None);
        let vars = [("PATH", new_path.as_str())];
        assert_eq!(
            resolver.resolve("tool", &tmp, env_with(&vars)),
            Some(new.join("tool"))
        );

        let _ = fs::remove_dir_all(tmp);
    }

    #[test]
    #[cfg(unix)]
    fn test_syntactic_path_change_also_invalidates() {
        let tmp = make_unique_temp_dir("syntactic");
        touch_executable(&tmp.join("tool"));
        let mut resolver = Resolver::new(Box::new(PosixRules));

        let path = tmp.display().to_string();
        let vars = [("PATH", path.as_str())];
        resolver.resolve("tool", &tmp, env_with(&vars));
        let probes = resolver.probe_count();

        let trailing = format!("{path}/");
        let vars = [("PATH", trailing.as_str())];
        resolver.resolve("tool", &tmp, env_with(&vars));
        assert_eq!(resolver.probe_count(), probes + 1);

        let _ = fs::remove_dir_all(tmp);
    }

    #[test]
    #[cfg(unix)]
    fn test_empty_path_entry_is_current_dir() {
        let tmp = make_unique_temp_dir("emptyentry");
        touch_executable(&tmp.join("tool"));

        let vars = [("PATH", "/nonexistent_dir_for_resolver_test:")];
        let mut resolver = Resolver::new(Box::new(PosixRules));
        assert_eq!(
            resolver.resolve("tool", &tmp, env_with(&vars)),
            Some(tmp.join("tool"))
        );

        let _ = fs::remove_dir_all(tmp);
    }

    #[test]
    #[cfg(unix)]
    fn test_direct_path_bypasses_search() {
        let tmp = make_unique_temp_dir("direct");
        fs::create_dir_all(tmp.join("bin")).unwrap();
        touch_executable(&tmp.join("bin").join("tool"));
        File::create(tmp.join("plain")).unwrap();

        let mut resolver = Resolver::new(Box::new(PosixRules));
        let lookup = |_: &str| -> Option<String> { panic!("direct paths must not read PATH") };

        let canonical = fs::canonicalize(tmp.join("bin").join("tool")).unwrap();
        assert_eq!(
            resolver.resolve("./bin/tool", &tmp, lookup),
            Some(canonical.clone())
        );
        assert_eq!(
            resolver.resolve(&canonical.display().to_string(), Path::new("/"), lookup),
            Some(canonical)
        );
        assert_eq!(resolver.resolve("./plain", &tmp, lookup), None);
        assert_eq!(resolver.resolve("./bin", &tmp, lookup), None);
        assert_eq!(resolver.resolve("./missing", &tmp, lookup), None);
        assert_eq!(resolver.probe_count(), 5);
        assert_eq!(resolver.cached_len(), 0);

        let _ = fs::remove_dir_all(tmp);
    }

    #[test]
    fn test_empty_name_and_unset_path() {
        let tmp = make_unique_temp_dir("empty");
        let mut resolver = Resolver::new(Box::new(PosixRules));
        assert_eq!(resolver.resolve("", &tmp, |_| None), None);
        assert_eq!(resolver.resolve("sh", &tmp, |_| None), None);
        assert_eq!(resolver.probe_count(), 0);
        let _ = fs::remove_dir_all(tmp);
    }

    #[test]
    fn test_extension_rules_search_cwd_then_path() {
        let tmp = make_unique_temp_dir("ext");
        let bin = tmp.join("bin");
        fs::create_dir_all(&bin).unwrap();
        File::create(bin.join("tool.bat")).unwrap();
        File::create(bin.join("tool.exe")).unwrap();
        File::create(bin.join("script.py")).unwrap();

        let path = bin.display().to_string();
        let vars = [("PATH", path.as_str()), ("PATHEXT", ".EXE;.BAT")];
        let mut resolver = Resolver::new(Box::new(ExtensionRules));

        assert_eq!(
            resolver.resolve("tool", &tmp, env_with(&vars)),
            Some(bin.join("tool.exe"))
        );
        assert_eq!(
            resolver.resolve("script.py", &tmp, env_with(&vars)),
            Some(bin.join("script.py"))
        );
        assert_eq!(resolver.resolve("script", &tmp, env_with(&vars)), None);

        // the current directory wins over PATH; invalidate by changing PATHEXT
        File::create(tmp.join("tool.bat")).unwrap();
        let vars = [("PATH", path.as_str()), ("PATHEXT", ".bat;.exe")];
        assert_eq!(
            resolver.resolve("tool", &tmp, env_with(&vars)),
            Some(tmp.join("tool.bat"))
        );

        let _ = fs::remove_dir_all(tmp);
    }

    #[test]
    fn test_extension_rules_cache_is_case_insensitive() {
        let tmp = make_unique_temp_dir("extcase");
        File::create(tmp.join("tool.exe")).unwrap();

        let vars = [("PATHEXT", ".exe")];
        let mut resolver = Resolver::new(Box::new(ExtensionRules));
        let first = resolver.resolve("tool", &tmp, env_with(&vars));
        assert_eq!(first, Some(tmp.join("tool.exe")));

        let probes = resolver.probe_count();
        assert_eq!(resolver.resolve("TOOL", &tmp, env_with(&vars)), first);
        assert_eq!(resolver.probe_count(), probes);

        let _ = fs::remove_dir_all(tmp);
    }
}
