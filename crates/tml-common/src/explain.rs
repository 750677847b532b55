//! The `explain` catalog: one canonical paragraph per stable error code.
//!
//! `tml explain T057` looks the code up here. Codes absent from the catalog
//! still render (diagnostics carry their own message); the catalog only adds
//! the longer prose.

/// Look up the canonical explanation paragraph for a diagnostic code.
pub fn explain(code: &str) -> Option<&'static str> {
    let text = match code {
        "T038" => {
            "A declaration tried to reuse a reserved primitive type name. The names \
             I8 through I128, U8 through U128, F32, F64, Bool, Char, Str, Unit, Never, \
             StringBuilder, Future, Context and Waker are built into the compiler and \
             cannot be redeclared as structs, enums, classes or type aliases. Rename \
             the declaration."
        }
        "T057" => {
            "The type of an expression does not match the type required by its \
             context. The message names both the expected and the found type. Common \
             causes: a function returning a different type than its signature \
             declares, an argument of the wrong type, or mismatched branches of an \
             if/when expression used as a value."
        }
        "T078" => {
            "A method call on a class instance did not resolve. The method was not \
             found on the class or any of its base classes. Check the spelling and \
             the class's ancestor chain; private methods of a base class are not \
             visible to callers."
        }
        "T079" => {
            "A method call through a dyn behavior value did not resolve: the named \
             behavior does not declare the method. Only methods declared in the \
             behavior itself (or behaviors it requires) are callable through a dyn \
             reference."
        }
        "T080" => {
            "A pointer method was called with the wrong shape: read() takes no \
             arguments. On @flags enums this code also reports a non-enum \
             declaration carrying the @flags decorator."
        }
        "T081" => {
            "Pointer write() requires exactly one argument (the value to store). \
             On @flags enums this code also reports generic parameters, which \
             bitflag enums cannot have."
        }
        "T082" => {
            "Pointer is_null() takes no arguments. On @flags enums this code also \
             reports a variant with a payload: bitflag variants must be unit \
             variants."
        }
        "T083" => {
            "Pointer offset() requires exactly one integer argument. On @flags \
             enums this code also reports too many variants: a @flags(U8) enum can \
             hold at most 8 flag variants, @flags(U16) 16, and so on -- one bit per \
             variant of the underlying width."
        }
        "T084" => {
            "Unknown pointer method. Raw pointers support read, write, is_null and \
             offset. On @flags enums this code also reports a non-integer \
             discriminant; explicit flag values must be integer literals."
        }
        "C003" => {
            "An intrinsic was called with the wrong number of arguments. Each \
             compiler intrinsic has a fixed arity; the message names the intrinsic \
             and the expected count."
        }
        "C006" => {
            "An intrinsic argument had an unsupported type. Arithmetic and bitwise \
             intrinsics accept integers and floats; atomics require integer or \
             pointer operands."
        }
        "C015" => {
            "A method call could not be lowered: the receiver type has no such \
             method at code generation time. This usually indicates a checker/\
             codegen disagreement and is a compiler bug worth reporting."
        }
        "C017" => {
            "An atomic intrinsic was given an invalid memory ordering. Valid \
             orderings are Relaxed, Acquire, Release, AcqRel and SeqCst; \
             compare-exchange orderings must not be weaker on success than on \
             failure."
        }
        "C018" => {
            "A SIMD intrinsic was applied to a non-vector operand, or the lane \
             index is out of range for the vector width."
        }
        "C019" => {
            "The program references a runtime symbol that is not provided by the \
             linked runtime. Ensure the C runtime object is on the link line and \
             matches the compiler version."
        }
        "C021" => {
            "transmute was used between types of different sizes. Both sides of a \
             transmute must have identical size and alignment."
        }
        "C035" => {
            "A reflection intrinsic (field_count, field_name, field_offset, ...) \
             was applied to a type without the Reflect derive."
        }
        "L001" => {
            "The plugin's ABI version does not match this compiler's \
             PLUGIN_ABI_VERSION. Rebuild the plugin against the current toolchain."
        }
        "L002" => {
            "The plugin file was found but one of the required exports \
             (plugin_query, plugin_init, plugin_shutdown) is missing."
        }
        "L003" => {
            "A compressed plugin artifact failed to decompress, or its checksum \
             did not match the cache. Delete the cache directory and retry; if it \
             persists the artifact is corrupt."
        }
        "L013" => {
            "The command requires a capability (for example parse, format or \
             test_run) that no loaded plugin provides. Install the providing \
             plugin next to the executable or set TML_PLUGIN_DIR."
        }
        _ => return None,
    };
    Some(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_codes_have_paragraphs() {
        for code in ["T038", "T057", "T083", "C019", "L001", "L013"] {
            assert!(explain(code).is_some(), "missing explanation for {code}");
        }
    }

    #[test]
    fn unknown_code_is_none() {
        assert!(explain("Z999").is_none());
    }
}
