use std::num::NonZeroUsize;

use crate::history::DEFAULT_MAX_DEPTH;
use crate::interpreter::DEFAULT_RECURSION_LIMIT;

/// Session configuration of a [`LiveSource`](crate::LiveSource).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// Entries kept per line before the oldest is evicted.
    pub max_depth: NonZeroUsize,
    /// Maximum nesting of function calls during a run.
    pub recursion_limit: usize,
}

impl Config {
    pub fn with_max_depth(mut self, max_depth: NonZeroUsize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_recursion_limit(mut self, recursion_limit: usize) -> Self {
        self.recursion_limit = recursion_limit;
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            recursion_limit: DEFAULT_RECURSION_LIMIT,
        }
    }
}
