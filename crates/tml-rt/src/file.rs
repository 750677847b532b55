//! File I/O primitives.
//!
//! A file handle is a heap-allocated reader/writer pair; NULL stands for a
//! failed open. `file_read_line` returns an empty string at end of input
//! (compiled code checks `file_is_open` / sizes before relying on it).

use std::ffi::{c_char, c_void};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Seek, SeekFrom, Write};

use crate::string::{alloc_c_string, borrow};

struct RtFile {
    reader: BufReader<File>,
    open: bool,
}

/// Open a file. Mode "r" reads, "w" truncates, "a" appends.
///
/// # Safety
/// `path` and `mode` must be NULL or valid NUL-terminated strings.
#[no_mangle]
pub unsafe extern "C" fn file_open(path: *const c_char, mode: *const c_char) -> *mut c_void {
    let path = borrow(path);
    let mode = borrow(mode);
    let file = match mode {
        "w" => OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .read(true)
            .open(path),
        "a" => OpenOptions::new()
            .append(true)
            .create(true)
            .read(true)
            .open(path),
        _ => File::open(path),
    };
    match file {
        Ok(file) => Box::into_raw(Box::new(RtFile {
            reader: BufReader::new(file),
            open: true,
        })) as *mut c_void,
        Err(_) => std::ptr::null_mut(),
    }
}

/// # Safety
/// `handle` must be NULL or a pointer from `file_open`.
#[no_mangle]
pub unsafe extern "C" fn file_is_open(handle: *mut c_void) -> bool {
    (handle as *mut RtFile)
        .as_ref()
        .map(|f| f.open)
        .unwrap_or(false)
}

/// Read one line without the trailing newline; empty at EOF.
///
/// # Safety
/// `handle` must be NULL or a pointer from `file_open`.
#[no_mangle]
pub unsafe extern "C" fn file_read_line(handle: *mut c_void) -> *mut c_char {
    let Some(file) = (handle as *mut RtFile).as_mut() else {
        return alloc_c_string("");
    };
    let mut line = String::new();
    match file.reader.read_line(&mut line) {
        Ok(_) => {
            while line.ends_with('\n') || line.ends_with('\r') {
                line.pop();
            }
            alloc_c_string(&line)
        }
        Err(_) => alloc_c_string(""),
    }
}

/// Write a string; returns bytes written or -1.
///
/// # Safety
/// `handle` must be NULL or a pointer from `file_open`; `s` a valid string.
#[no_mangle]
pub unsafe extern "C" fn file_write_str(handle: *mut c_void, s: *const c_char) -> i64 {
    let Some(file) = (handle as *mut RtFile).as_mut() else {
        return -1;
    };
    let text = borrow(s);
    match file.reader.get_mut().write_all(text.as_bytes()) {
        Ok(()) => text.len() as i64,
        Err(_) => -1,
    }
}

/// Total size in bytes, or -1.
///
/// # Safety
/// `handle` must be NULL or a pointer from `file_open`.
#[no_mangle]
pub unsafe extern "C" fn file_size(handle: *mut c_void) -> i64 {
    let Some(file) = (handle as *mut RtFile).as_mut() else {
        return -1;
    };
    let current = file.reader.stream_position().unwrap_or(0);
    let size = file
        .reader
        .seek(SeekFrom::End(0))
        .map(|s| s as i64)
        .unwrap_or(-1);
    let _ = file.reader.seek(SeekFrom::Start(current));
    size
}

/// # Safety
/// `handle` must be NULL or a pointer from `file_open`, closed at most once.
#[no_mangle]
pub unsafe extern "C" fn file_close(handle: *mut c_void) {
    if !handle.is_null() {
        drop(Box::from_raw(handle as *mut RtFile));
    }
}

/// # Safety
/// `handle` must be NULL or a pointer from `file_open`.
#[no_mangle]
pub unsafe extern "C" fn file_flush(handle: *mut c_void) {
    if let Some(file) = (handle as *mut RtFile).as_mut() {
        let _ = file.reader.get_mut().flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CString;

    #[test]
    fn write_then_read_round_trip() {
        let dir = std::env::temp_dir().join("tml-rt-file-test");
        std::fs::create_dir_all(&dir).expect("mkdir");
        let path = dir.join("io.txt");
        let c_path = CString::new(path.to_str().unwrap()).unwrap();
        unsafe {
            let w = file_open(c_path.as_ptr(), CString::new("w").unwrap().as_ptr());
            assert!(file_is_open(w));
            let line = CString::new("hello\n").unwrap();
            assert_eq!(file_write_str(w, line.as_ptr()), 6);
            file_flush(w);
            file_close(w);

            let r = file_open(c_path.as_ptr(), CString::new("r").unwrap().as_ptr());
            assert!(file_is_open(r));
            assert_eq!(file_size(r), 6);
            let read = file_read_line(r);
            assert_eq!(crate::string::borrow(read), "hello");
            file_close(r);
        }
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn missing_file_yields_null_handle() {
        let c_path = CString::new("/definitely/not/a/real/path.txt").unwrap();
        unsafe {
            let handle = file_open(c_path.as_ptr(), CString::new("r").unwrap().as_ptr());
            assert!(handle.is_null());
            assert!(!file_is_open(handle));
        }
    }
}
