//! List primitives.
//!
//! A runtime list is a growable array of pointer-sized slots. The compiler
//! packs scalars into slots (`inttoptr`) and unpacks on read; element
//! interpretation is entirely the compiled program's business.

use std::ffi::c_void;

/// The list header compiled code holds a pointer to.
pub struct RtList {
    items: Vec<*mut c_void>,
}

/// Allocate a list with the given capacity hint.
#[no_mangle]
pub extern "C" fn list_new(capacity: i64) -> *mut RtList {
    let list = Box::new(RtList {
        items: Vec::with_capacity(capacity.max(0) as usize),
    });
    Box::into_raw(list)
}

/// # Safety
/// `list` must be a pointer returned by `list_new` and not yet freed.
#[no_mangle]
pub unsafe extern "C" fn list_push(list: *mut RtList, item: *mut c_void) {
    if let Some(list) = list.as_mut() {
        list.items.push(item);
    }
}

/// # Safety
/// `list` must be a pointer returned by `list_new` and not yet freed.
#[no_mangle]
pub unsafe extern "C" fn list_len(list: *mut RtList) -> i64 {
    list.as_ref().map(|l| l.items.len() as i64).unwrap_or(0)
}

/// Read a slot; out-of-bounds panics like compiled index checks do.
///
/// # Safety
/// `list` must be a pointer returned by `list_new` and not yet freed.
#[no_mangle]
pub unsafe extern "C" fn list_get(list: *mut RtList, index: i64) -> *mut c_void {
    let Some(list) = list.as_ref() else {
        return std::ptr::null_mut();
    };
    match list.items.get(index as usize) {
        Some(&item) => item,
        None => {
            crate::panic::panic_str(&format!(
                "list index {index} out of bounds (len {})",
                list.items.len()
            ));
        }
    }
}

/// # Safety
/// `list` must be a pointer returned by `list_new` and not yet freed.
#[no_mangle]
pub unsafe extern "C" fn list_set(list: *mut RtList, index: i64, item: *mut c_void) {
    let Some(list) = list.as_mut() else { return };
    let len = list.items.len();
    match list.items.get_mut(index as usize) {
        Some(slot) => *slot = item,
        None => crate::panic::panic_str(&format!("list index {index} out of bounds (len {len})")),
    }
}

/// Pop the last slot; NULL when empty (the compiler checks length first).
///
/// # Safety
/// `list` must be a pointer returned by `list_new` and not yet freed.
#[no_mangle]
pub unsafe extern "C" fn list_pop(list: *mut RtList) -> *mut c_void {
    list.as_mut()
        .and_then(|l| l.items.pop())
        .unwrap_or(std::ptr::null_mut())
}

/// # Safety
/// `list` must be a pointer returned by `list_new` and not yet freed.
#[no_mangle]
pub unsafe extern "C" fn list_clear(list: *mut RtList) {
    if let Some(list) = list.as_mut() {
        list.items.clear();
    }
}

/// Slot identity membership test.
///
/// # Safety
/// `list` must be a pointer returned by `list_new` and not yet freed.
#[no_mangle]
pub unsafe extern "C" fn list_contains(list: *mut RtList, item: *mut c_void) -> bool {
    list.as_ref()
        .map(|l| l.items.contains(&item))
        .unwrap_or(false)
}

/// Release a list created by `list_new`.
///
/// # Safety
/// `list` must be a pointer returned by `list_new`, freed at most once.
#[no_mangle]
pub unsafe extern "C" fn list_free(list: *mut RtList) {
    if !list.is_null() {
        drop(Box::from_raw(list));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_len_get_round_trip() {
        unsafe {
            let list = list_new(0);
            assert_eq!(list_len(list), 0);
            list_push(list, 7usize as *mut c_void);
            list_push(list, 9usize as *mut c_void);
            assert_eq!(list_len(list), 2);
            assert_eq!(list_get(list, 0) as usize, 7);
            assert_eq!(list_get(list, 1) as usize, 9);
            list_free(list);
        }
    }

    #[test]
    fn set_and_contains() {
        unsafe {
            let list = list_new(4);
            list_push(list, 1usize as *mut c_void);
            list_set(list, 0, 5usize as *mut c_void);
            assert!(list_contains(list, 5usize as *mut c_void));
            assert!(!list_contains(list, 1usize as *mut c_void));
            list_free(list);
        }
    }

    #[test]
    fn pop_returns_null_when_empty() {
        unsafe {
            let list = list_new(0);
            assert!(list_pop(list).is_null());
            list_free(list);
        }
    }
}
