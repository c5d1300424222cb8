//! Reading words off a stack.
//!
//! Everything the walker knows about memory goes through [`Memory`]. The
//! live implementation is the only place in the crate that dereferences
//! an address it did not create itself.

use alloc::vec::Vec;
use core::{marker::PhantomData, mem, ops::Range, ptr};

use crate::{arch, Error, Result};

/// A word-addressed view of (part of) a stack.
pub trait Memory {
    /// Size of a stack slot in bytes. Return addresses sit one word above
    /// the saved frame pointer.
    fn word_size(&self) -> usize;

    /// Reads the word at `address`, or explains why that address is off
    /// limits. Must never fault.
    fn read_word(&self, address: usize) -> Result<usize>;
}

impl<M: Memory + ?Sized> Memory for &M {
    fn word_size(&self) -> usize {
        (**self).word_size()
    }

    fn read_word(&self, address: usize) -> Result<usize> {
        (**self).read_word(address)
    }
}

/// Checks that a `word`-byte read at `address` stays inside `range`.
fn check_word(address: usize, word: usize, range: &Range<usize>) -> Result<()> {
    if address % word != 0 {
        return Err(Error::Misaligned {
            address,
            align: word,
        });
    }
    let last = address
        .checked_add(word)
        .ok_or(Error::AddressOverflow { address })?;
    if address < range.start || last > range.end {
        return Err(Error::OutOfRange {
            address,
            start: range.start,
            end: range.end,
        });
    }
    Ok(())
}

/// The calling thread's own stack, read in place.
///
/// Not `Send`: the bounds only hold for the thread that created it.
#[derive(Debug)]
pub struct LiveStack {
    range: Range<usize>,
    _thread_bound: PhantomData<*const ()>,
}

impl LiveStack {
    /// The stack of the current thread, from the current stack pointer up
    /// to the top of the mapping. Frames of callers all live in there.
    pub fn current() -> Result<Self> {
        let sp = arch::stack_pointer();
        let (low, high) = thread_stack_bounds()?;
        trace!("thread stack {low:#x}..{high:#x}, sp={sp:#x}");

        let range = sp.clamp(low, high)..high;
        Ok(Self {
            range,
            _thread_bound: PhantomData,
        })
    }

    /// # Safety
    /// Every word in `range` must be mapped and readable for as long as the
    /// returned value is used, and must belong to the current thread's stack.
    pub unsafe fn from_range(range: Range<usize>) -> Self {
        Self {
            range,
            _thread_bound: PhantomData,
        }
    }

    pub fn range(&self) -> Range<usize> {
        self.range.clone()
    }
}

impl Memory for LiveStack {
    fn word_size(&self) -> usize {
        mem::size_of::<usize>()
    }

    fn read_word(&self, address: usize) -> Result<usize> {
        check_word(address, self.word_size(), &self.range)?;
        // SAFETY: the word is aligned and inside the range our constructor
        // vouched for.
        Ok(unsafe { ptr::read_volatile(address as *const usize) })
    }
}

fn thread_stack_bounds() -> Result<(usize, usize)> {
    // SAFETY: attr is initialized by pthread_getattr_np before any other use
    // and destroyed exactly once.
    unsafe {
        let mut attr: libc::pthread_attr_t = mem::zeroed();
        let ret = libc::pthread_getattr_np(libc::pthread_self(), &mut attr);
        if ret != 0 {
            return Err(Error::StackBounds { code: ret });
        }

        let mut addr = ptr::null_mut();
        let mut size = 0;
        let ret = libc::pthread_attr_getstack(&attr, &mut addr, &mut size);
        libc::pthread_attr_destroy(&mut attr);
        if ret != 0 {
            return Err(Error::StackBounds { code: ret });
        }

        let low = addr as usize;
        Ok((low, low.saturating_add(size)))
    }
}

/// Width of a stack slot in a [`StackImage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WordSize {
    Four,
    Eight,
}

impl WordSize {
    pub const NATIVE: WordSize = if mem::size_of::<usize>() == 8 {
        WordSize::Eight
    } else {
        WordSize::Four
    };

    pub const fn bytes(self) -> usize {
        match self {
            WordSize::Four => 4,
            WordSize::Eight => 8,
        }
    }
}

/// A copy of stack memory together with the address it was copied from.
///
/// Words are little-endian. Saved frame pointers inside the image still
/// refer to the original addresses, so the chain can be walked without
/// the original stack being alive.
#[derive(Debug, Clone)]
pub struct StackImage {
    base: usize,
    bytes: Vec<u8>,
    word_size: WordSize,
}

impl StackImage {
    /// `base` must be aligned to `word_size`, the chain's frame pointers are
    /// checked against absolute alignment.
    pub fn new(base: usize, bytes: Vec<u8>, word_size: WordSize) -> Result<Self> {
        if base % word_size.bytes() != 0 {
            return Err(Error::Misaligned {
                address: base,
                align: word_size.bytes(),
            });
        }
        Ok(Self {
            base,
            bytes,
            word_size,
        })
    }

    /// An image of native words laid out from `base` upwards.
    pub fn from_words(base: usize, words: &[usize]) -> Result<Self> {
        let bytes = words.iter().flat_map(|w| w.to_le_bytes()).collect();
        Self::new(base, bytes, WordSize::NATIVE)
    }

    /// An image of a 32-bit stack laid out from `base` upwards.
    pub fn from_words32(base: usize, words: &[u32]) -> Result<Self> {
        let bytes = words.iter().flat_map(|w| w.to_le_bytes()).collect();
        Self::new(base, bytes, WordSize::Four)
    }

    pub fn range(&self) -> Range<usize> {
        self.base..self.base.saturating_add(self.bytes.len())
    }
}

impl Memory for StackImage {
    fn word_size(&self) -> usize {
        self.word_size.bytes()
    }

    fn read_word(&self, address: usize) -> Result<usize> {
        let word = self.word_size();
        check_word(address, word, &self.range())?;

        let offset = address - self.base;
        let slot = &self.bytes[offset..offset + word];
        Ok(match self.word_size {
            WordSize::Four => u32::from_le_bytes([slot[0], slot[1], slot[2], slot[3]]) as usize,
            WordSize::Eight => {
                let mut raw = [0; 8];
                raw.copy_from_slice(slot);
                u64::from_le_bytes(raw) as usize
            }
        })
    }
}
