//! Shell-side view of the process environment.

use std::collections::HashMap;
use std::env as stdenv;
use std::path::PathBuf;

/// Mutable environment threaded through every command execution.
///
/// `vars` is what `export` mutates and what spawned children inherit;
/// `current_dir` is what `cd` mutates and where children are spawned.
/// Fields are public: the builtins are the only writers and they live in
/// this crate.
#[derive(Debug, Clone)]
pub struct Environment {
    pub vars: HashMap<String, String>,
    pub current_dir: PathBuf,
}

impl Environment {
    /// Snapshot the real process environment at shell startup.
    pub fn new() -> Self {
        let vars = stdenv::vars().collect();
        let current_dir = stdenv::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self { vars, current_dir }
    }

    pub fn get_var(&self, key: &str) -> Option<String> {
        self.vars.get(key).cloned()
    }

    pub fn set_var(&mut self, key: impl Into<String>, val: impl Into<String>) {
        self.vars.insert(key.into(), val.into());
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_then_get() {
        let mut env = Environment::new();
        assert_eq!(env.get_var("OPSH_TEST_UNSET_VAR"), None);
        env.set_var("OPSH_TEST_VAR", "value");
        assert_eq!(env.get_var("OPSH_TEST_VAR"), Some("value".to_string()));
    }

    #[test]
    fn snapshot_includes_process_env() {
        let env = Environment::new();
        assert!(env.get_var("PATH").is_some());
    }
}
