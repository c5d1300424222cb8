use core::{ffi, fmt};

/// Diagnostic sink writing straight to file descriptor 2.
///
/// Does not allocate or take locks, so it can be used from a panic hook.
pub struct StderrWriter;

impl fmt::Write for StderrWriter {
    fn write_str(&mut self, mut s: &str) -> fmt::Result {
        while !s.is_empty() {
            // SAFETY: the pointer and length come from a live &str.
            let r = unsafe { libc::write(libc::STDERR_FILENO, s.as_ptr().cast(), s.len()) };
            if r < 0 {
                if errno() == libc::EINTR {
                    continue;
                }
                return Err(fmt::Error);
            }
            if r == 0 {
                return Err(fmt::Error);
            }
            s = &s[(r as usize)..];
        }
        Ok(())
    }
}

fn errno() -> i32 {
    // SAFETY: __errno_location always returns a valid pointer to this thread's errno.
    unsafe { *libc::__errno_location() }
}

/// Calls `f` with the message `strerror_r` gives for `code`.
pub(crate) fn with_os_error_str<R>(code: i32, f: impl FnOnce(&str) -> R) -> R {
    let mut buf: [u8; 512] = [0; 512];

    // SAFETY: Our buffer length is passed correctly
    let error = unsafe { libc::strerror_r(code, buf.as_mut_ptr().cast(), buf.len()) };
    let msg = if error != 0 {
        "<strerror_r returned an error>"
    } else {
        // strerror_r nul-terminates on success, and the buffer started zeroed anyway
        ffi::CStr::from_bytes_until_nul(&buf)
            .ok()
            .and_then(|cstr| cstr.to_str().ok())
            .unwrap_or("<error message contained invalid utf8>")
    };
    f(msg)
}
