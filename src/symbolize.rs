//! Turning return addresses into something a human can read.

use alloc::{
    format,
    string::{String, ToString},
};
use core::{ffi, fmt};

/// What a symbolizer knows about an address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Descriptor {
    /// Inside a named function.
    Symbol {
        name: String,
        offset: usize,
        object: Option<String>,
    },
    /// Inside a loaded object, but no symbol covers it.
    Object { path: String, offset: usize },
    /// No lookup was attempted.
    Raw(usize),
    Unknown,
}

impl fmt::Display for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Descriptor::Symbol {
                name,
                offset,
                object,
            } => {
                write!(f, "{name}+{offset:#x}")?;
                if let Some(object) = object {
                    write!(f, " ({object})")?;
                }
                Ok(())
            }
            Descriptor::Object { path, offset } => write!(f, "{path}+{offset:#x}"),
            Descriptor::Raw(address) => write!(f, "{address:#x}"),
            Descriptor::Unknown => f.write_str("<unknown>"),
        }
    }
}

pub trait Symbolizer {
    /// Describes the code at `address`. A miss is [`Descriptor::Unknown`],
    /// never an error.
    fn resolve(&self, address: usize) -> Descriptor;
}

impl<S: Symbolizer + ?Sized> Symbolizer for &S {
    fn resolve(&self, address: usize) -> Descriptor {
        (**self).resolve(address)
    }
}

/// Prints the address and nothing else.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawSymbolizer;

impl Symbolizer for RawSymbolizer {
    fn resolve(&self, address: usize) -> Descriptor {
        Descriptor::Raw(address)
    }
}

/// Asks the dynamic linker. Only sees symbols in the dynamic symbol table,
/// so executables need to be linked with `-rdynamic` for their own
/// functions to show up.
#[derive(Debug, Clone, Copy, Default)]
pub struct DladdrSymbolizer;

impl Symbolizer for DladdrSymbolizer {
    fn resolve(&self, address: usize) -> Descriptor {
        if address == 0 {
            return Descriptor::Unknown;
        }
        // a return address can be one past the end of a function that ends in a call
        let lookup = address - 1;

        // SAFETY: dladdr only inspects the address, and fills info on success.
        let info = unsafe {
            let mut info: libc::Dl_info = core::mem::zeroed();
            if libc::dladdr(lookup as *const ffi::c_void, &mut info) == 0 {
                trace!("dladdr found nothing for {address:#x}");
                return Descriptor::Unknown;
            }
            info
        };

        // SAFETY: dladdr returns either null or pointers to nul-terminated
        // strings owned by the loaded object.
        let object = unsafe { c_string(info.dli_fname) };
        let name = unsafe { c_string(info.dli_sname) };

        match (name, object) {
            (Some(name), object) if !info.dli_saddr.is_null() => Descriptor::Symbol {
                name: format!("{:#}", rustc_demangle::demangle(&name)),
                offset: address - info.dli_saddr as usize,
                object,
            },
            (_, Some(path)) => Descriptor::Object {
                path,
                offset: address.wrapping_sub(info.dli_fbase as usize),
            },
            _ => Descriptor::Unknown,
        }
    }
}

unsafe fn c_string(ptr: *const ffi::c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    let cstr = ffi::CStr::from_ptr(ptr);
    let string = cstr.to_string_lossy().to_string();
    (!string.is_empty()).then_some(string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display() {
        let symbol = Descriptor::Symbol {
            name: "fpwalk::capture".into(),
            offset: 0x1f,
            object: Some("/usr/bin/app".into()),
        };
        assert_eq!(symbol.to_string(), "fpwalk::capture+0x1f (/usr/bin/app)");

        let symbol = Descriptor::Symbol {
            name: "main".into(),
            offset: 4,
            object: None,
        };
        assert_eq!(symbol.to_string(), "main+0x4");

        let object = Descriptor::Object {
            path: "/lib/libc.so.6".into(),
            offset: 0x29d90,
        };
        assert_eq!(object.to_string(), "/lib/libc.so.6+0x29d90");

        assert_eq!(Descriptor::Raw(0x5555_1234).to_string(), "0x55551234");
        assert_eq!(Descriptor::Unknown.to_string(), "<unknown>");
    }

    #[test]
    fn raw_symbolizer_returns_the_address() {
        assert_eq!(RawSymbolizer.resolve(0x1234), Descriptor::Raw(0x1234));
    }

    #[test]
    fn dladdr_misses_are_unknown() {
        assert_eq!(DladdrSymbolizer.resolve(0), Descriptor::Unknown);
        assert_eq!(DladdrSymbolizer.resolve(0x10), Descriptor::Unknown);
    }

    #[test]
    fn dladdr_finds_libc() {
        // exported from libc, so it is in the dynamic symbol table
        let address = libc::write as *const () as usize + 1;
        match DladdrSymbolizer.resolve(address) {
            Descriptor::Symbol { name, offset, .. } => {
                assert!(name.contains("write"), "{name}");
                assert_eq!(offset, 1);
            }
            other => panic!("expected a symbol, got {other:?}"),
        }
    }
}
