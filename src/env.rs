//! Access to environment variables.
//!
//! Credential lookups go through [`Environment`] so sessions can be driven
//! from a fixed map in tests instead of the process environment.

use std::collections::HashMap;

/// Source of environment variables.
pub trait Environment: Send + Sync {
    /// Look up a variable. Empty values count as missing.
    fn var(&self, key: &str) -> Option<String>;
}

/// The real process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl Environment for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok().filter(|v| !v.is_empty())
    }
}

impl Environment for HashMap<String, String> {
    fn var(&self, key: &str) -> Option<String> {
        self.get(key).filter(|v| !v.is_empty()).cloned()
    }
}
