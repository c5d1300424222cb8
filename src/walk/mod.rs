mod fp;

use alloc::vec::Vec;
use core::{num::NonZeroUsize, slice};

use crate::Error;

pub use fp::FrameWalker;

/// Knobs for a single walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WalkConfig {
    /// Upper bound on collected entries. Reaching it ends the walk early.
    pub max_depth: NonZeroUsize,
    /// Saved frame pointer value marking the outermost frame.
    pub sentinel: usize,
}

impl WalkConfig {
    pub const DEFAULT_MAX_DEPTH: NonZeroUsize = match NonZeroUsize::new(64) {
        Some(depth) => depth,
        None => unreachable!(),
    };

    pub const fn new() -> Self {
        Self {
            max_depth: Self::DEFAULT_MAX_DEPTH,
            sentinel: 0,
        }
    }

    pub const fn with_max_depth(self, max_depth: NonZeroUsize) -> Self {
        Self { max_depth, ..self }
    }

    pub const fn with_sentinel(self, sentinel: usize) -> Self {
        Self { sentinel, ..self }
    }
}

impl Default for WalkConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// One recorded frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BacktraceEntry {
    /// 0 is the innermost recorded frame.
    pub depth: usize,
    /// Address of the saved-frame-pointer slot the return address sits above.
    pub frame_pointer: usize,
    pub return_address: usize,
}

/// Why a walk stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// Reached the outermost frame.
    Sentinel,
    /// Collected `max_depth` entries. There may have been more frames.
    DepthExceeded,
    /// A read was refused. The entries are what was collected before it.
    Aborted(Error),
}

/// Return addresses of the active frames, innermost first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Backtrace {
    entries: Vec<BacktraceEntry>,
    termination: Termination,
}

impl Backtrace {
    pub(crate) fn new(entries: Vec<BacktraceEntry>, termination: Termination) -> Self {
        Self {
            entries,
            termination,
        }
    }

    pub(crate) fn aborted(err: Error) -> Self {
        Self::new(Vec::new(), Termination::Aborted(err))
    }

    pub fn entries(&self) -> &[BacktraceEntry] {
        &self.entries
    }

    pub fn return_addresses(&self) -> impl Iterator<Item = usize> + '_ {
        self.entries.iter().map(|entry| entry.return_address)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn termination(&self) -> Termination {
        self.termination
    }

    /// Whether frames beyond the recorded ones may exist.
    pub fn is_truncated(&self) -> bool {
        !matches!(self.termination, Termination::Sentinel)
    }
}

impl<'a> IntoIterator for &'a Backtrace {
    type Item = &'a BacktraceEntry;
    type IntoIter = slice::Iter<'a, BacktraceEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
