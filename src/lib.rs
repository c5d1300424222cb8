//! Backtraces from frame pointers.
//!
//! Follows the chain of saved frame pointers on the current thread's stack
//! and records one return address per frame, without looking at any unwind
//! tables. Code without frame pointers breaks the chain, so build with
//! `-C force-frame-pointers=yes`.
//!
//! ```no_run
//! let backtrace = fpwalk::capture();
//! for entry in &backtrace {
//!     println!("{:#x}", entry.return_address);
//! }
//!
//! // or, symbolized and written to stderr
//! fpwalk::print_backtrace();
//! ```

#![cfg_attr(not(test), no_std)]

extern crate alloc;

#[macro_use]
extern crate tracing;

mod arch;
mod error;
pub mod memory;
mod report;
mod stdext;
pub mod symbolize;
pub mod walk;

pub use error::{Error, Result};
pub use memory::{LiveStack, Memory, StackImage, WordSize};
pub use report::BacktraceReporter;
pub use stdext::StderrWriter;
pub use symbolize::{Descriptor, DladdrSymbolizer, RawSymbolizer, Symbolizer};
pub use walk::{Backtrace, BacktraceEntry, FrameWalker, Termination, WalkConfig};

/// Backtrace of the calling function, starting with the return address into
/// its caller.
#[inline(never)]
pub fn capture() -> Backtrace {
    let fp = arch::frame_pointer();
    walk_callers(fp, WalkConfig::new())
}

/// [`capture`] with a custom depth limit or sentinel.
#[inline(never)]
pub fn capture_with(config: WalkConfig) -> Backtrace {
    let fp = arch::frame_pointer();
    walk_callers(fp, config)
}

/// Captures the calling function's backtrace and writes it to stderr,
/// symbolized with `dladdr`.
#[inline(never)]
pub fn print_backtrace() {
    let fp = arch::frame_pointer();
    let backtrace = walk_callers(fp, WalkConfig::new());
    BacktraceReporter::new(DladdrSymbolizer, StderrWriter).report(&backtrace);
}

/// `fp` is the frame of the public entry point, which is skipped.
#[inline(always)]
fn walk_callers(fp: usize, config: WalkConfig) -> Backtrace {
    let stack = match LiveStack::current() {
        Ok(stack) => stack,
        Err(err) => {
            warn!("cannot walk the stack: {err}");
            return Backtrace::aborted(err);
        }
    };

    let backtrace = match stack.read_word(fp) {
        Ok(caller) => FrameWalker::new(&stack, config).walk(caller),
        Err(err) => {
            warn!("frame pointer {fp:#x} is not on this thread's stack: {err}");
            Backtrace::aborted(err)
        }
    };
    // keeps the walk from becoming a tail call, `fp` must stay our frame
    core::hint::black_box(backtrace)
}

#[cfg(test)]
mod tests {
    use core::num::NonZeroUsize;
    use std::hint::black_box;

    use super::*;

    #[inline(never)]
    fn leaf() -> Backtrace {
        black_box(capture())
    }

    #[inline(never)]
    fn inner() -> Backtrace {
        black_box(leaf())
    }

    #[inline(never)]
    fn outer() -> Backtrace {
        black_box(inner())
    }

    #[inline(never)]
    fn leaf_with(config: WalkConfig) -> Backtrace {
        black_box(capture_with(config))
    }

    #[inline(never)]
    fn inner_with(config: WalkConfig) -> Backtrace {
        black_box(leaf_with(config))
    }

    #[inline(never)]
    fn outer_with(config: WalkConfig) -> Backtrace {
        black_box(inner_with(config))
    }

    /// The named function whose code contains `address`, out of `candidates`.
    fn containing(address: usize, candidates: &[(&'static str, usize)]) -> &'static str {
        candidates
            .iter()
            .filter(|(_, start)| *start <= address)
            .max_by_key(|(_, start)| *start)
            .map(|(name, _)| *name)
            .unwrap_or("<none>")
    }

    fn candidates() -> Vec<(&'static str, usize)> {
        vec![
            ("leaf", leaf as *const () as usize),
            ("inner", inner as *const () as usize),
            ("outer", outer as *const () as usize),
            ("nested_calls", nested_calls as *const () as usize),
            ("leaf_with", leaf_with as *const () as usize),
            ("inner_with", inner_with as *const () as usize),
            ("outer_with", outer_with as *const () as usize),
            ("reporter_output", reporter_output as *const () as usize),
        ]
    }

    #[test]
    fn nested_calls() {
        let bt = outer();
        assert!(bt.len() >= 3, "{bt:?}");

        let candidates = candidates();
        let callers: Vec<_> = bt
            .return_addresses()
            .take(3)
            .map(|address| containing(address, &candidates))
            .collect();
        assert_eq!(callers, ["inner", "outer", "nested_calls"]);

        let depths: Vec<_> = bt.entries().iter().map(|entry| entry.depth).collect();
        assert_eq!(depths, (0..bt.len()).collect::<Vec<_>>());
    }

    #[test]
    fn frame_pointers_grow_towards_older_frames() {
        let bt = outer();
        let fps: Vec<_> = bt.entries().iter().take(3).map(|e| e.frame_pointer).collect();
        assert!(fps.windows(2).all(|pair| pair[0] < pair[1]), "{fps:x?}");
    }

    #[test]
    fn capture_respects_max_depth() {
        let config = WalkConfig::new().with_max_depth(NonZeroUsize::new(2).unwrap());
        let bt = outer_with(config);

        assert_eq!(bt.len(), 2);
        assert_eq!(bt.termination(), Termination::DepthExceeded);
        let candidates = candidates();
        assert_eq!(containing(bt.entries()[0].return_address, &candidates), "inner_with");
        assert_eq!(containing(bt.entries()[1].return_address, &candidates), "outer_with");
    }

    struct Named(Vec<(&'static str, usize)>);

    impl Symbolizer for Named {
        fn resolve(&self, address: usize) -> Descriptor {
            Descriptor::Symbol {
                name: containing(address, &self.0).to_string(),
                offset: 0,
                object: None,
            }
        }
    }

    #[test]
    fn reporter_output() {
        let bt = outer();
        let mut reporter = BacktraceReporter::new(Named(candidates()), String::new());
        reporter.report(&bt);
        let output = reporter.into_sink();

        let lines: Vec<_> = output.lines().take(3).collect();
        assert_eq!(lines.len(), 3, "{output}");
        assert!(lines[0].ends_with(" - inner+0x0"), "{output}");
        assert!(lines[1].ends_with(" - outer+0x0"), "{output}");
        assert!(lines[2].ends_with(" - reporter_output+0x0"), "{output}");
    }

    #[test]
    fn dladdr_report_has_a_line_per_frame() {
        let bt = outer();
        let mut reporter = BacktraceReporter::new(DladdrSymbolizer, String::new());
        reporter.report(&bt);
        let output = reporter.into_sink();

        assert_eq!(output.lines().count(), bt.len(), "{output}");
        for (line, entry) in output.lines().zip(&bt) {
            let prefix = format!("{:>4}: {:#018x} - ", entry.depth, entry.return_address);
            assert!(line.starts_with(&prefix), "{line}");
            assert!(line.len() > prefix.len(), "{line}");
        }
    }
}
