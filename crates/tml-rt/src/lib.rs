//! TML runtime library.
//!
//! Compiled TML programs call these functions directly from generated IR.
//! The crate builds twice:
//!
//! - a static library (`libtml_rt.a`) linked into every TML binary
//! - a Rust library for unit testing the same code paths
//!
//! ## ABI contract
//!
//! Every public `extern "C"` function here is part of the runtime ABI the
//! IR generator emits calls against; signatures must not change without a
//! matching generator change. Strings are NUL-terminated byte pointers.
//! Allocations handed to compiled code are made with the C allocator
//! convention (leaked unless the program frees them); the compiler never
//! emits frees for runtime-owned values.

pub mod file;
pub mod hash;
pub mod list;
pub mod math;
pub mod panic;
pub mod sb;
pub mod string;

pub use file::{
    file_close, file_flush, file_is_open, file_open, file_read_line, file_size, file_write_str,
};
pub use hash::hash_bytes;
pub use list::{
    list_clear, list_contains, list_free, list_get, list_len, list_new, list_pop, list_push,
    list_set,
};
pub use math::int_pow;
pub use panic::panic;
pub use sb::{sb_append, sb_append_char, sb_build, sb_len, sb_new};
pub use string::{
    print_i64, print_str, str_char_at, str_cmp, str_concat_opt, str_contains, str_ends_with,
    str_eq, str_from_bool, str_from_char, str_from_f64, str_from_i64, str_parse_i64, str_split,
    str_starts_with, str_substring, str_to_lower, str_to_upper, str_trim,
};
