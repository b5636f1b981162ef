//! Structural unification of open type patterns against concrete types.

use crate::descriptors::TypeRef;

/// Structurally matches `pattern` against `actual`, binding parameter positions.
///
/// A parameter already bound must match the same type again. Returns `false` on any
/// mismatch; `bindings` may then hold partial results and should be discarded.
pub(crate) fn unify(pattern: &TypeRef, actual: &TypeRef, bindings: &mut [Option<TypeRef>]) -> bool {
    match pattern {
        TypeRef::Param(i) => match bindings.get_mut(*i) {
            Some(Some(bound)) => bound == actual,
            Some(slot) => {
                *slot = Some(actual.clone());
                true
            }
            None => false,
        },
        TypeRef::Named { name, args } => match actual {
            TypeRef::Named { name: other, args: other_args }
                if name == other && args.len() == other_args.len() =>
            {
                args.iter()
                    .zip(other_args)
                    .all(|(p, a)| unify(p, a, bindings))
            }
            _ => false,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(name: &str) -> TypeRef {
        TypeRef::named(name)
    }

    fn unify_all(pattern: &TypeRef, actual: &TypeRef, arity: usize) -> Option<Vec<TypeRef>> {
        let mut bindings = vec![None; arity];
        if !unify(pattern, actual, &mut bindings) {
            return None;
        }
        bindings.into_iter().collect()
    }

    #[test]
    fn binds_nested_positions() {
        let pattern = TypeRef::generic("Map", [TypeRef::param(1), TypeRef::generic("Vec", [TypeRef::param(0)])]);
        let actual = TypeRef::generic("Map", [t("String"), TypeRef::generic("Vec", [t("u8")])]);
        assert_eq!(unify_all(&pattern, &actual, 2), Some(vec![t("u8"), t("String")]));
    }

    #[test]
    fn conflicting_binding_fails() {
        let pattern = TypeRef::generic("Pair", [TypeRef::param(0), TypeRef::param(0)]);
        let actual = TypeRef::generic("Pair", [t("u8"), t("i8")]);
        assert_eq!(unify_all(&pattern, &actual, 1), None);
    }

    #[test]
    fn unbound_position_is_reported() {
        let pattern = TypeRef::generic("Box", [TypeRef::param(0)]);
        let mut bindings = vec![None, None];
        assert!(unify(&pattern, &TypeRef::generic("Box", [t("u8")]), &mut bindings));
        assert_eq!(bindings, vec![Some(t("u8")), None]);
        assert_eq!(unify_all(&pattern, &TypeRef::generic("Box", [t("u8")]), 2), None);
    }
}
