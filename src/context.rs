//! Context handle threaded through every engine call: limits plus an out-of-band
//! diagnostic trail.

use crate::error::{ErrorKind, KsiError};

/// Bounds applied to untrusted input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// Maximum composite nesting depth accepted by decode and produced by encode.
    pub max_depth: usize,
    /// Maximum number of nodes visited by one top-level call.
    pub max_nodes: usize,
    /// Maximum number of bytes a [`TlvReader`](crate::reader::TlvReader) will consume.
    pub max_stream_bytes: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Config { max_depth: 64, max_nodes: 1 << 20, max_stream_bytes: None }
    }
}

impl Config {
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn with_max_nodes(mut self, nodes: usize) -> Self {
        self.max_nodes = nodes;
        self
    }

    pub fn with_max_stream_bytes(mut self, bytes: u64) -> Self {
        self.max_stream_bytes = Some(bytes);
        self
    }
}

/// One entry of the diagnostic trail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub kind: ErrorKind,
    pub message: String,
}

#[derive(Debug, Default)]
pub struct Context {
    config: Config,
    errors: Vec<Diagnostic>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: Config) -> Self {
        Context { config, errors: Vec::new() }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Failures recorded by the most recent top-level call, oldest first.
    ///
    /// Every top-level entry point in [`codec`](crate::codec) clears the trail before it
    /// starts, so a long-lived context holds at most one call's worth of entries.
    pub fn errors(&self) -> &[Diagnostic] {
        &self.errors
    }

    pub fn last_error(&self) -> Option<&Diagnostic> {
        self.errors.last()
    }

    pub fn clear_errors(&mut self) {
        self.errors.clear();
    }

    pub(crate) fn record(&mut self, err: &KsiError) {
        tracing::debug!(kind = %err.kind(), "{}", err.message());
        self.errors.push(Diagnostic { kind: err.kind(), message: err.message().to_string() });
    }
}
