//! Service keys for the resolution cache.

use std::fmt;
use std::hash::{Hash, Hasher};

use crate::descriptors::TypeRef;

/// A type together with the ordered contract chain it is resolved under.
///
/// Contract names compare case-insensitively, so `A[Prod]` and `A[prod]` name the
/// same cache slot. The formatted chain is the canonical rendering:
///
/// ```rust
/// use ferrous_resolve::{ServiceName, TypeRef};
///
/// let name = ServiceName::new(TypeRef::named("A"), vec!["c1".into(), "c2".into()]);
/// assert_eq!(name.to_string(), "A[c1->c2]");
/// assert_eq!(name, ServiceName::new(TypeRef::named("A"), vec!["C1".into(), "c2".into()]));
/// ```
#[derive(Debug, Clone)]
pub struct ServiceName {
    ty: TypeRef,
    contracts: Vec<String>,
}

impl ServiceName {
    pub fn new(ty: TypeRef, contracts: Vec<String>) -> Self {
        Self { ty, contracts }
    }

    /// A name with no contracts.
    pub fn plain(ty: TypeRef) -> Self {
        Self { ty, contracts: Vec::new() }
    }

    pub fn ty(&self) -> &TypeRef {
        &self.ty
    }

    pub fn contracts(&self) -> &[String] {
        &self.contracts
    }

    /// Formats a chain as `c1->c2`.
    pub fn format_contracts(contracts: &[String]) -> String {
        contracts.join("->")
    }
}

/// Case-insensitive membership test used wherever contract names are compared.
pub(crate) fn contains_contract(names: &[String], name: &str) -> bool {
    names.iter().any(|n| n.eq_ignore_ascii_case(name))
}

impl fmt::Display for ServiceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.ty)?;
        if !self.contracts.is_empty() {
            write!(f, "[{}]", Self::format_contracts(&self.contracts))?;
        }
        Ok(())
    }
}

impl PartialEq for ServiceName {
    fn eq(&self, other: &Self) -> bool {
        self.ty == other.ty
            && self.contracts.len() == other.contracts.len()
            && self
                .contracts
                .iter()
                .zip(&other.contracts)
                .all(|(a, b)| a.eq_ignore_ascii_case(b))
    }
}

impl Eq for ServiceName {}

impl Hash for ServiceName {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.ty.hash(state);
        state.write_usize(self.contracts.len());
        for contract in &self.contracts {
            for b in contract.bytes() {
                state.write_u8(b.to_ascii_lowercase());
            }
            state.write_u8(0xff);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn contracts_hash_case_insensitively() {
        let mut set = HashSet::new();
        set.insert(ServiceName::new(TypeRef::named("A"), vec!["Prod".into()]));
        assert!(set.contains(&ServiceName::new(TypeRef::named("A"), vec!["prod".into()])));
        assert!(!set.contains(&ServiceName::plain(TypeRef::named("A"))));
    }

    #[test]
    fn contract_order_matters() {
        let a = ServiceName::new(TypeRef::named("A"), vec!["x".into(), "y".into()]);
        let b = ServiceName::new(TypeRef::named("A"), vec!["y".into(), "x".into()]);
        assert_ne!(a, b);
    }

    #[test]
    fn plain_name_renders_without_brackets() {
        let name = ServiceName::plain(TypeRef::generic("Wrapper", [TypeRef::named("i32")]));
        assert_eq!(name.to_string(), "Wrapper<i32>");
    }
}
