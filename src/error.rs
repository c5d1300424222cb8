use core::fmt;

use crate::stdext::with_os_error_str;

/// A word could not be read while walking, or the stack could not be located.
///
/// None of these are fatal to the program, they only end the current walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The word at `address` does not lie entirely inside `start..end`.
    OutOfRange {
        address: usize,
        start: usize,
        end: usize,
    },
    /// `address` is not a multiple of the word alignment.
    Misaligned { address: usize, align: usize },
    /// Stepping from `address` to the next word wraps around the address space.
    AddressOverflow { address: usize },
    /// `pthread_getattr_np` failed with `code`.
    StackBounds { code: i32 },
}

pub type Result<T, E = Error> = core::result::Result<T, E>;

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Error::OutOfRange {
                address,
                start,
                end,
            } => write!(
                f,
                "address {address:#x} is outside of the stack ({start:#x}..{end:#x})"
            ),
            Error::Misaligned { address, align } => {
                write!(f, "address {address:#x} is not aligned to {align} bytes")
            }
            Error::AddressOverflow { address } => {
                write!(f, "address {address:#x} overflows when stepping to the next word")
            }
            Error::StackBounds { code } => with_os_error_str(code, |err| {
                write!(f, "failed to query the stack bounds of this thread: {err}")
            }),
        }
    }
}
