//! Patterns for `when`, `if let`, and `for` bindings.

use serde::Serialize;

use tml_common::Span;

/// A pattern. Patterns nest; each matched layer may bind names.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Pattern {
    /// `_`.
    Wildcard { span: Span },
    /// A name binding, e.g. `x` or `mut x`.
    Binding {
        name: String,
        mutable: bool,
        span: Span,
    },
    /// A literal scalar: integer, bool, char, or string.
    IntLit { value: i128, span: Span },
    BoolLit { value: bool, span: Span },
    CharLit { value: char, span: Span },
    StrLit { value: String, span: Span },
    /// `lo..hi` (exclusive) / `lo..=hi` (inclusive).
    Range {
        lo: i128,
        hi: i128,
        inclusive: bool,
        span: Span,
    },
    /// `Variant(p1, p2)` or `Enum::Variant(p1, p2)`.
    EnumVariant {
        enum_name: Option<String>,
        variant: String,
        payload: Vec<Pattern>,
        span: Span,
    },
    /// `Name { field: pat, .. }`.
    Struct {
        name: String,
        fields: Vec<(String, Pattern)>,
        has_rest: bool,
        span: Span,
    },
    /// `(p1, p2, p3)`.
    Tuple { elements: Vec<Pattern>, span: Span },
    /// `[p1, p2, ..rest]` -- `rest_binding` captures the remaining elements
    /// as a slice when present; `rest_at` is the element index of the `..`.
    Array {
        elements: Vec<Pattern>,
        rest_at: Option<usize>,
        rest_binding: Option<String>,
        span: Span,
    },
    /// `p1 | p2 | p3`. All alternatives must bind the same names.
    Or { alternatives: Vec<Pattern>, span: Span },
}

impl Pattern {
    pub fn span(&self) -> Span {
        match self {
            Pattern::Wildcard { span }
            | Pattern::Binding { span, .. }
            | Pattern::IntLit { span, .. }
            | Pattern::BoolLit { span, .. }
            | Pattern::CharLit { span, .. }
            | Pattern::StrLit { span, .. }
            | Pattern::Range { span, .. }
            | Pattern::EnumVariant { span, .. }
            | Pattern::Struct { span, .. }
            | Pattern::Tuple { span, .. }
            | Pattern::Array { span, .. }
            | Pattern::Or { span, .. } => *span,
        }
    }

    /// Collect the names this pattern binds, in source order.
    pub fn bound_names(&self, out: &mut Vec<String>) {
        match self {
            Pattern::Binding { name, .. } => out.push(name.clone()),
            Pattern::EnumVariant { payload, .. } => {
                for p in payload {
                    p.bound_names(out);
                }
            }
            Pattern::Struct { fields, .. } => {
                for (_, p) in fields {
                    p.bound_names(out);
                }
            }
            Pattern::Tuple { elements, .. } => {
                for p in elements {
                    p.bound_names(out);
                }
            }
            Pattern::Array {
                elements,
                rest_binding,
                ..
            } => {
                for p in elements {
                    p.bound_names(out);
                }
                if let Some(rest) = rest_binding {
                    out.push(rest.clone());
                }
            }
            // Or-patterns bind the same names in every alternative; take the first.
            Pattern::Or { alternatives, .. } => {
                if let Some(first) = alternatives.first() {
                    first.bound_names(out);
                }
            }
            _ => {}
        }
    }

    /// Whether this pattern matches unconditionally.
    pub fn is_irrefutable(&self) -> bool {
        match self {
            Pattern::Wildcard { .. } | Pattern::Binding { .. } => true,
            Pattern::Tuple { elements, .. } => elements.iter().all(Pattern::is_irrefutable),
            Pattern::Struct { fields, .. } => fields.iter().all(|(_, p)| p.is_irrefutable()),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bound_names_walk_nested_patterns() {
        let pat = Pattern::EnumVariant {
            enum_name: Some("Maybe".into()),
            variant: "Just".into(),
            payload: vec![Pattern::Tuple {
                elements: vec![
                    Pattern::Binding {
                        name: "a".into(),
                        mutable: false,
                        span: Span::dummy(),
                    },
                    Pattern::Binding {
                        name: "b".into(),
                        mutable: false,
                        span: Span::dummy(),
                    },
                ],
                span: Span::dummy(),
            }],
            span: Span::dummy(),
        };
        let mut names = Vec::new();
        pat.bound_names(&mut names);
        assert_eq!(names, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn wildcard_and_bindings_are_irrefutable() {
        assert!(Pattern::Wildcard { span: Span::dummy() }.is_irrefutable());
        assert!(!Pattern::IntLit { value: 3, span: Span::dummy() }.is_irrefutable());
    }
}
