//! StringBuilder primitives.

use std::ffi::{c_char, c_void};

use crate::string::{alloc_c_string, borrow};

struct RtStringBuilder {
    buffer: String,
}

#[no_mangle]
pub extern "C" fn sb_new() -> *mut c_void {
    Box::into_raw(Box::new(RtStringBuilder {
        buffer: String::new(),
    })) as *mut c_void
}

/// # Safety
/// `handle` must come from `sb_new`; `s` must be a valid string.
#[no_mangle]
pub unsafe extern "C" fn sb_append(handle: *mut c_void, s: *const c_char) {
    if let Some(sb) = (handle as *mut RtStringBuilder).as_mut() {
        sb.buffer.push_str(borrow(s));
    }
}

/// # Safety
/// `handle` must come from `sb_new`.
#[no_mangle]
pub unsafe extern "C" fn sb_append_char(handle: *mut c_void, c: u32) {
    if let Some(sb) = (handle as *mut RtStringBuilder).as_mut() {
        sb.buffer.push(char::from_u32(c).unwrap_or('\u{fffd}'));
    }
}

/// # Safety
/// `handle` must come from `sb_new`.
#[no_mangle]
pub unsafe extern "C" fn sb_len(handle: *mut c_void) -> i64 {
    (handle as *mut RtStringBuilder)
        .as_ref()
        .map(|sb| sb.buffer.len() as i64)
        .unwrap_or(0)
}

/// Produce the built string and release the builder.
///
/// # Safety
/// `handle` must come from `sb_new`, built at most once.
#[no_mangle]
pub unsafe extern "C" fn sb_build(handle: *mut c_void) -> *mut c_char {
    if handle.is_null() {
        return alloc_c_string("");
    }
    let sb = Box::from_raw(handle as *mut RtStringBuilder);
    alloc_c_string(&sb.buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CString;

    #[test]
    fn append_and_build() {
        unsafe {
            let sb = sb_new();
            let hello = CString::new("hello ").unwrap();
            sb_append(sb, hello.as_ptr());
            sb_append_char(sb, 'w' as u32);
            assert_eq!(sb_len(sb), 7);
            let built = sb_build(sb);
            assert_eq!(borrow(built), "hello w");
        }
    }
}
