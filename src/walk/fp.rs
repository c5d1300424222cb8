//! Frame pointer walker.
//!
//! With frame pointers, every prologue pushes the caller's frame pointer and
//! points the frame pointer register at that slot:
//!
//! ```text
//!   higher addresses
//!   [ return address ]  fp + word
//!   [ caller's fp    ]  fp  ───► next frame, same layout
//!   [ locals ...     ]
//!   lower addresses
//! ```
//!
//! so the stack is a linked list we can follow from callee to caller until
//! a saved frame pointer is the sentinel.


use alloc::vec::Vec;

use tracing::instrument;

use super::{Backtrace, BacktraceEntry, Termination, WalkConfig};
use crate::{memory::Memory, Error};

const PREALLOCATED_FRAMES: usize = 128;

pub struct FrameWalker<M> {
    memory: M,
    config: WalkConfig,
}

impl<M: Memory> FrameWalker<M> {
    pub fn new(memory: M, config: WalkConfig) -> Self {
        Self { memory, config }
    }

    /// Follows the chain starting at the frame whose saved-frame-pointer slot
    /// is at `start`.
    ///
    /// Never fails: a refused read ends the walk with
    /// [`Termination::Aborted`] and whatever was collected until then.
    #[instrument(level = "debug", skip(self))]
    pub fn walk(&self, start: usize) -> Backtrace {
        let max_depth = self.config.max_depth.get();
        let word = self.memory.word_size();
        let mut entries = Vec::with_capacity(max_depth.min(PREALLOCATED_FRAMES));
        let mut current = start;

        let termination = loop {
            if current == self.config.sentinel {
                break Termination::Sentinel;
            }

            let saved_fp = match self.memory.read_word(current) {
                Ok(saved_fp) => saved_fp,
                Err(err) => break self.abort(err, entries.len()),
            };

            // the outermost frame has nowhere to return to, its return slot is
            // not read at all
            if saved_fp == self.config.sentinel {
                break Termination::Sentinel;
            }

            let return_address = match current
                .checked_add(word)
                .ok_or(Error::AddressOverflow { address: current })
                .and_then(|ra_slot| self.memory.read_word(ra_slot))
            {
                Ok(return_address) => return_address,
                Err(err) => break self.abort(err, entries.len()),
            };

            trace!("fp={current:#x} ra={return_address:#x}");
            entries.push(BacktraceEntry {
                depth: entries.len(),
                frame_pointer: current,
                return_address,
            });
            current = saved_fp;

            if entries.len() == max_depth {
                break Termination::DepthExceeded;
            }
        };

        debug!(frames = entries.len(), ?termination, "walk finished");
        Backtrace::new(entries, termination)
    }

    fn abort(&self, err: Error, depth: usize) -> Termination {
        warn!(depth, "walk aborted: {err}");
        Termination::Aborted(err)
    }
}
