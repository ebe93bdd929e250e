//! Open-time configuration.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Configuration for [`Dataset::open`](crate::Dataset::open)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenOptions {
    /// Defer parameters and variables until first access
    pub lazy: bool,
    /// Symbols never to load; they stay visible in listings
    pub skip: BTreeSet<String>,
}

impl Default for OpenOptions {
    fn default() -> Self {
        Self {
            lazy: true,
            skip: BTreeSet::new(),
        }
    }
}

impl OpenOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lazy(mut self, lazy: bool) -> Self {
        self.lazy = lazy;
        self
    }

    pub fn skip(mut self, name: impl Into<String>) -> Self {
        self.skip.insert(name.into());
        self
    }

    pub fn skip_all<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.skip.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn is_skipped(&self, name: &str) -> bool {
        self.skip.contains(name)
    }
}
