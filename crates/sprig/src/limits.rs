//! Resource limits enforced by the heap and the evaluator.

use crate::error::{LispError, RunResult};

/// Default evaluator recursion bound. Tail calls never consume depth; this
/// bounds non-tail nesting so a runaway program cannot blow the host
/// stack (test threads get 2 MiB).
pub const DEFAULT_MAX_DEPTH: usize = 1_000;

/// Default heap bound in cells, far above anything a small program needs.
pub const DEFAULT_MAX_CELLS: usize = 1 << 24;

/// Depth bound for structural recursion over data (`equal?`, printing).
pub(crate) const MAX_DATA_RECURSION_DEPTH: usize = 512;

/// Caps on what one VM may consume.
///
/// Exceeding a limit raises a `resource-error`; it does not halt the VM,
/// so a host can catch it and keep the session alive.
#[derive(Debug, Clone, Copy)]
pub struct Limits {
    /// Maximum number of heap cells (the arena refuses to grow past this).
    pub max_cells: usize,
    /// Maximum evaluator recursion depth for non-tail positions.
    pub max_depth: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self { max_cells: DEFAULT_MAX_CELLS, max_depth: DEFAULT_MAX_DEPTH }
    }
}

impl Limits {
    /// A small heap for tests and constrained targets.
    #[must_use]
    pub fn small() -> Self {
        Self { max_cells: 1 << 16, max_depth: 256 }
    }

    pub(crate) fn check_depth(&self, depth: usize) -> RunResult<()> {
        if depth > self.max_depth {
            Err(LispError::resource(format!(
                "maximum recursion depth exceeded: {depth} > {max}",
                max = self.max_depth
            )))
        } else {
            Ok(())
        }
    }
}
