//! Type errors with their stable short codes.
//!
//! Each variant maps to exactly one diagnostic code. The checker accumulates
//! errors instead of aborting; the driver decides after the phase whether to
//! continue. Messages render expected/found types pre-formatted so the error
//! type stays independent of the interner.

use tml_common::{Diagnostic, Span};

/// A type checking error.
#[derive(Debug, Clone)]
pub enum TypeError {
    /// A declaration reuses a reserved primitive type name.
    ReservedName { name: String, span: Span },
    /// Two declarations share a name.
    DuplicateDecl { name: String, span: Span },
    /// Expression type does not match the required type.
    Mismatch {
        expected: String,
        found: String,
        context: String,
        span: Span,
    },
    /// A name did not resolve to a type.
    UnknownType { name: String, span: Span },
    /// A generic type applied with the wrong number of arguments.
    WrongTypeArgCount {
        name: String,
        expected: usize,
        found: usize,
        span: Span,
    },
    /// An array size expression that is neither a literal nor a const param.
    BadConstExpr { span: Span },
    /// A variable is used but not defined in scope.
    UnboundVariable { name: String, span: Span },
    /// A function or method called with the wrong number of arguments.
    ArityMismatch {
        name: String,
        expected: usize,
        found: usize,
        span: Span,
    },
    /// A call to something that is not callable.
    NotCallable { found: String, span: Span },
    /// No such field on the receiver type.
    UnknownField {
        ty: String,
        field: String,
        span: Span,
    },
    /// No such variant on the enum.
    UnknownVariant {
        enum_name: String,
        variant: String,
        span: Span,
    },
    /// Method not found on a value receiver.
    UnknownMethod {
        ty: String,
        method: String,
        span: Span,
    },
    /// Method not found on a class or any ancestor.
    UnknownMethodOnClass {
        class: String,
        method: String,
        span: Span,
    },
    /// Method not declared by the behavior behind a dyn receiver.
    UnknownMethodOnDyn {
        behavior: String,
        method: String,
        span: Span,
    },
    /// Pointer `read()` called with arguments.
    PointerReadArity { span: Span },
    /// Pointer `write()` without exactly one argument.
    PointerWriteArity { span: Span },
    /// Pointer `is_null()` called with arguments.
    PointerIsNullArity { span: Span },
    /// Pointer `offset()` without exactly one integer argument.
    PointerOffsetArity { span: Span },
    /// A pointer method that does not exist.
    UnknownPointerMethod { method: String, span: Span },
    /// `@flags` on a non-enum declaration.
    FlagsOnNonEnum { span: Span },
    /// `@flags` enum with generic parameters.
    FlagsGenericParams { span: Span },
    /// `@flags` variant carrying a payload.
    FlagsNonUnitVariant { variant: String, span: Span },
    /// More `@flags` variants than bits in the underlying width.
    FlagsTooManyVariants {
        count: usize,
        width: u32,
        span: Span,
    },
    /// `@flags` discriminant that is not an integer literal.
    FlagsBadDiscriminant { variant: String, span: Span },
    /// A where-clause bound is not satisfied at an instantiation site.
    BoundUnsatisfied {
        ty: String,
        behavior: String,
        span: Span,
    },
    /// A member access that visibility rules forbid.
    VisibilityViolation {
        member: String,
        required: String,
        span: Span,
    },
    /// An impl block omits a method its behavior requires.
    MissingImplMethod {
        behavior: String,
        method: String,
        ty: String,
        span: Span,
    },
    /// Type inference failed to determine an expression's type.
    InferenceFailure { span: Span },
}

impl TypeError {
    /// The stable short code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            TypeError::ReservedName { .. } => "T038",
            TypeError::DuplicateDecl { .. } => "T039",
            TypeError::UnknownType { .. } => "T040",
            TypeError::WrongTypeArgCount { .. } => "T041",
            TypeError::BadConstExpr { .. } => "T042",
            TypeError::UnboundVariable { .. } => "T001",
            TypeError::ArityMismatch { .. } => "T045",
            TypeError::NotCallable { .. } => "T047",
            TypeError::UnknownField { .. } => "T046",
            TypeError::UnknownVariant { .. } => "T048",
            TypeError::UnknownMethod { .. } => "T044",
            TypeError::Mismatch { .. } => "T057",
            TypeError::InferenceFailure { .. } => "T058",
            TypeError::BoundUnsatisfied { .. } => "T060",
            TypeError::VisibilityViolation { .. } => "T061",
            TypeError::MissingImplMethod { .. } => "T062",
            TypeError::UnknownMethodOnClass { .. } => "T078",
            TypeError::UnknownMethodOnDyn { .. } => "T079",
            TypeError::PointerReadArity { .. } | TypeError::FlagsOnNonEnum { .. } => "T080",
            TypeError::PointerWriteArity { .. } | TypeError::FlagsGenericParams { .. } => "T081",
            TypeError::PointerIsNullArity { .. } | TypeError::FlagsNonUnitVariant { .. } => "T082",
            TypeError::PointerOffsetArity { .. } | TypeError::FlagsTooManyVariants { .. } => "T083",
            TypeError::UnknownPointerMethod { .. } | TypeError::FlagsBadDiscriminant { .. } => {
                "T084"
            }
        }
    }

    pub fn span(&self) -> Span {
        match self {
            TypeError::ReservedName { span, .. }
            | TypeError::DuplicateDecl { span, .. }
            | TypeError::Mismatch { span, .. }
            | TypeError::UnknownType { span, .. }
            | TypeError::WrongTypeArgCount { span, .. }
            | TypeError::BadConstExpr { span }
            | TypeError::UnboundVariable { span, .. }
            | TypeError::ArityMismatch { span, .. }
            | TypeError::NotCallable { span, .. }
            | TypeError::UnknownField { span, .. }
            | TypeError::UnknownVariant { span, .. }
            | TypeError::UnknownMethod { span, .. }
            | TypeError::UnknownMethodOnClass { span, .. }
            | TypeError::UnknownMethodOnDyn { span, .. }
            | TypeError::PointerReadArity { span }
            | TypeError::PointerWriteArity { span }
            | TypeError::PointerIsNullArity { span }
            | TypeError::PointerOffsetArity { span }
            | TypeError::UnknownPointerMethod { span, .. }
            | TypeError::FlagsOnNonEnum { span }
            | TypeError::FlagsGenericParams { span }
            | TypeError::FlagsNonUnitVariant { span, .. }
            | TypeError::FlagsTooManyVariants { span, .. }
            | TypeError::FlagsBadDiscriminant { span, .. }
            | TypeError::BoundUnsatisfied { span, .. }
            | TypeError::VisibilityViolation { span, .. }
            | TypeError::MissingImplMethod { span, .. }
            | TypeError::InferenceFailure { span } => *span,
        }
    }

    /// Render this error into a diagnostic.
    pub fn into_diagnostic(self) -> Diagnostic {
        let span = self.span();
        let code = self.code();
        let message = match self {
            TypeError::ReservedName { name, .. } => {
                format!("'{name}' is a reserved type name and cannot be redeclared")
            }
            TypeError::DuplicateDecl { name, .. } => {
                format!("'{name}' is declared more than once")
            }
            TypeError::Mismatch {
                expected,
                found,
                context,
                ..
            } => {
                if context.is_empty() {
                    format!("type mismatch: expected {expected}, found {found}")
                } else {
                    format!("type mismatch in {context}: expected {expected}, found {found}")
                }
            }
            TypeError::UnknownType { name, .. } => format!("unknown type '{name}'"),
            TypeError::WrongTypeArgCount {
                name,
                expected,
                found,
                ..
            } => format!("'{name}' expects {expected} type argument(s), found {found}"),
            TypeError::BadConstExpr { .. } => {
                "array size must be an integer literal or a const parameter".to_string()
            }
            TypeError::UnboundVariable { name, .. } => format!("unknown identifier '{name}'"),
            TypeError::ArityMismatch {
                name,
                expected,
                found,
                ..
            } => format!("'{name}' expects {expected} argument(s), found {found}"),
            TypeError::NotCallable { found, .. } => format!("value of type {found} is not callable"),
            TypeError::UnknownField { ty, field, .. } => {
                format!("no field '{field}' on type {ty}")
            }
            TypeError::UnknownVariant {
                enum_name, variant, ..
            } => format!("no variant '{variant}' on enum {enum_name}"),
            TypeError::UnknownMethod { ty, method, .. } => {
                format!("no method '{method}' on type {ty}")
            }
            TypeError::UnknownMethodOnClass { class, method, .. } => {
                format!("no method '{method}' on class {class} or its ancestors")
            }
            TypeError::UnknownMethodOnDyn {
                behavior, method, ..
            } => format!("behavior {behavior} declares no method '{method}'"),
            TypeError::PointerReadArity { .. } => "pointer read() takes no arguments".to_string(),
            TypeError::PointerWriteArity { .. } => {
                "pointer write() requires exactly one argument".to_string()
            }
            TypeError::PointerIsNullArity { .. } => {
                "pointer is_null() takes no arguments".to_string()
            }
            TypeError::PointerOffsetArity { .. } => {
                "pointer offset() requires exactly one integer argument".to_string()
            }
            TypeError::UnknownPointerMethod { method, .. } => {
                format!("unknown pointer method '{method}'")
            }
            TypeError::FlagsOnNonEnum { .. } => {
                "@flags can only be applied to an enum".to_string()
            }
            TypeError::FlagsGenericParams { .. } => {
                "@flags enum cannot have generic parameters".to_string()
            }
            TypeError::FlagsNonUnitVariant { variant, .. } => {
                format!("@flags variant '{variant}' must be a unit variant")
            }
            TypeError::FlagsTooManyVariants { count, width, .. } => {
                format!("@flags enum has {count} variants but the underlying type has only {width} bits")
            }
            TypeError::FlagsBadDiscriminant { variant, .. } => {
                format!("@flags discriminant of '{variant}' must be an integer literal")
            }
            TypeError::BoundUnsatisfied { ty, behavior, .. } => {
                format!("type {ty} does not implement required behavior {behavior}")
            }
            TypeError::VisibilityViolation {
                member, required, ..
            } => format!("'{member}' is not accessible here ({required} access required)"),
            TypeError::MissingImplMethod {
                behavior,
                method,
                ty,
                ..
            } => format!("impl of {behavior} for {ty} is missing method '{method}'"),
            TypeError::InferenceFailure { .. } => {
                "could not infer the type of this expression".to_string()
            }
        };
        Diagnostic::error(code, message, span)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_match_the_flag_and_pointer_families() {
        assert_eq!(
            TypeError::FlagsTooManyVariants {
                count: 9,
                width: 8,
                span: Span::dummy()
            }
            .code(),
            "T083"
        );
        assert_eq!(TypeError::PointerOffsetArity { span: Span::dummy() }.code(), "T083");
        assert_eq!(
            TypeError::ReservedName {
                name: "I8".into(),
                span: Span::dummy()
            }
            .code(),
            "T038"
        );
    }

    #[test]
    fn diagnostic_carries_code_and_message() {
        let diag = TypeError::Mismatch {
            expected: "I32".into(),
            found: "Str".into(),
            context: "return value".into(),
            span: Span::new(3, 7),
        }
        .into_diagnostic();
        assert_eq!(diag.code, "T057");
        assert!(diag.message.contains("expected I32, found Str"));
    }
}
