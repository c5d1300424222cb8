use core::fmt::{self, Write};

use crate::{
    symbolize::Symbolizer,
    walk::{Backtrace, Termination},
};

/// Writes one line per frame, innermost first:
///
/// ```text
///    0: 0x000055555555a1c3 - app::inner+0x13 (/usr/bin/app)
///    1: 0x000055555555a1f0 - <unknown>
/// ```
pub struct BacktraceReporter<S, W> {
    symbolizer: S,
    sink: W,
}

impl<S: Symbolizer, W: Write> BacktraceReporter<S, W> {
    pub fn new(symbolizer: S, sink: W) -> Self {
        Self { symbolizer, sink }
    }

    /// Never fails. Frames that do not resolve are printed as `<unknown>`,
    /// and a sink error only loses the line it happened on.
    pub fn report(&mut self, backtrace: &Backtrace) {
        for entry in backtrace {
            let descriptor = self.symbolizer.resolve(entry.return_address);
            let line = writeln!(
                self.sink,
                "{:>4}: {:#018x} - {descriptor}",
                entry.depth, entry.return_address
            );
            if let Err(fmt::Error) = line {
                debug!(depth = entry.depth, "failed to write backtrace frame");
            }
        }

        match backtrace.termination() {
            Termination::Sentinel => {}
            Termination::DepthExceeded => {
                warn!("backtrace stopped after {} frames, there may be more", backtrace.len());
            }
            Termination::Aborted(err) => {
                warn!("backtrace incomplete after {} frames: {err}", backtrace.len());
            }
        }
    }

    pub fn into_sink(self) -> W {
        self.sink
    }
}
