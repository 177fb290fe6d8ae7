//! Shell-wide state: environment, aliases, options, the command
//! path cache, and history. Bundled into one [`Shell`] value rather than
//! scattered globals. The only thing that genuinely needs process-wide
//! visibility is the real OS environment, because child processes
//! inherit it via `exec`.

use std::collections::HashMap;
use std::path::PathBuf;

use crate::platform::Platform;

/// Mapping from variable name to string value. Backed by the real process
/// environment so that forked children inherit it without extra plumbing;
/// reads are served from an in-process copy seeded at startup so repeated
/// lookups don't round-trip through libc.
#[derive(Debug, Default)]
pub struct Environment {
    vars: HashMap<String, String>,
}

impl Environment {
    /// Seeds the map from the process's current environment.
    pub fn from_process() -> Self {
        Environment {
            vars: std::env::vars().collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(|s| s.as_str())
    }

    pub fn set(&mut self, platform: &dyn Platform, name: &str, value: &str) {
        self.vars.insert(name.to_string(), value.to_string());
        platform.setenv(name, value);
    }

    pub fn unset(&mut self, platform: &dyn Platform, name: &str) {
        self.vars.remove(name);
        platform.unsetenv(name);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Alias name -> replacement text, mutated only by `alias`/`unalias`.
#[derive(Debug, Default)]
pub struct AliasTable {
    aliases: HashMap<String, String>,
}

impl AliasTable {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.aliases.get(name).map(|s| s.as_str())
    }

    pub fn set(&mut self, name: &str, value: &str) {
        self.aliases.insert(name.to_string(), value.to_string());
    }

    pub fn remove(&mut self, name: &str) -> bool {
        self.aliases.remove(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.aliases.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Boolean flags controlling shell behavior. `cachepaths` is spelled
/// consistently here rather than also answering to `cachepath` (see
/// DESIGN.md for the rationale).
#[derive(Debug, Default, Clone, Copy)]
pub struct ShellOptions {
    pub errexit: bool,
    pub showcommands: bool,
    pub cachepaths: bool,
}

/// Bare command name -> resolved absolute path. Populated lazily, never
/// evicted within a run.
#[derive(Debug, Default)]
pub struct PathCache {
    resolved: HashMap<String, PathBuf>,
}

impl PathCache {
    pub fn get(&self, name: &str) -> Option<&PathBuf> {
        self.resolved.get(name)
    }

    pub fn insert(&mut self, name: String, path: PathBuf) {
        self.resolved.insert(name, path);
    }
}

/// Bundles every piece of shell-wide mutable state into one value that is
/// threaded explicitly through the evaluator, rather than relying on
/// process-wide globals.
pub struct Shell {
    pub env: Environment,
    pub aliases: AliasTable,
    pub options: ShellOptions,
    pub path_cache: PathCache,
    pub history: History,
    pub platform: Box<dyn Platform>,
    /// Exit status of the most recently completed command chain; backs
    /// `$?`.
    pub last_status: i32,
    /// This process's own pid; backs `$$`.
    pub pid: i32,
    pub interactive: bool,
}

impl Shell {
    pub fn new(platform: Box<dyn Platform>, interactive: bool) -> Self {
        let pid = std::process::id() as i32;
        Shell {
            env: Environment::from_process(),
            aliases: AliasTable::default(),
            options: ShellOptions::default(),
            path_cache: PathCache::default(),
            history: History::default(),
            platform,
            last_status: 0,
            pid,
            interactive,
        }
    }
}

/// Ordered list of accepted input lines, loaded from `$HOME/.vbls_history`
/// at interactive startup and flushed back on normal exit.
#[derive(Debug, Default)]
pub struct History {
    lines: Vec<String>,
}

impl History {
    pub fn from_lines(lines: Vec<String>) -> Self {
        History { lines }
    }

    pub fn push(&mut self, line: String) {
        self.lines.push(line);
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn to_file_contents(&self) -> String {
        self.lines.join("\n")
    }
}
