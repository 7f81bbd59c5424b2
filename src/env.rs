//! Environment variable access behind an injectable reader.
//!
//! [`Env::real()`] reads the process environment; [`Env::mock()`] reads a
//! fixed map so configuration tests never mutate process state.

use std::collections::HashMap;

/// Environment variable reader.
#[derive(Clone, Debug, Default)]
pub struct Env {
    overrides: Option<HashMap<String, String>>,
}

impl Env {
    pub fn real() -> Self {
        Self { overrides: None }
    }

    /// An environment holding exactly `vars`.
    pub fn mock(vars: impl IntoIterator<Item = (impl Into<String>, impl Into<String>)>) -> Self {
        Self {
            overrides: Some(
                vars.into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect(),
            ),
        }
    }

    pub fn var(&self, name: &str) -> Result<String, std::env::VarError> {
        match &self.overrides {
            Some(map) => map.get(name).cloned().ok_or(std::env::VarError::NotPresent),
            None => std::env::var(name),
        }
    }

    /// The variable's value when set and non-blank.
    pub fn non_empty(&self, name: &str) -> Option<String> {
        self.var(name).ok().filter(|v| !v.trim().is_empty())
    }
}
