//! The ordered stack of active contracts.

use smallvec::SmallVec;
use thiserror::Error;

use crate::key::contains_contract;

/// Errors raised while expanding contract unions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContractError {
    #[error("union [{union}] references unknown contract [{member}]")]
    UnknownUnionMember { union: String, member: String },
}

/// Result of [`ContractStack::push`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushOutcome {
    /// How many names were appended; the caller pops exactly this many.
    pub pushed: usize,
    /// The first name already on the stack, if any. Pushing stops there.
    pub duplicate: Option<String>,
}

/// Active contract names, outermost first.
///
/// ```rust
/// use ferrous_resolve::ContractStack;
///
/// let mut stack = ContractStack::new();
/// let outcome = stack.push(&["prod", "eu", "PROD"]);
/// assert_eq!(outcome.pushed, 2);
/// assert_eq!(outcome.duplicate.as_deref(), Some("PROD"));
/// stack.pop_last(outcome.pushed);
/// assert!(stack.is_empty());
/// ```
#[derive(Debug, Clone, Default)]
pub struct ContractStack {
    names: SmallVec<[String; 4]>,
}

impl ContractStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends names one at a time, stopping at the first case-insensitive duplicate.
    pub fn push<S: AsRef<str>>(&mut self, names: &[S]) -> PushOutcome {
        let mut pushed = 0;
        for name in names {
            let name = name.as_ref();
            if self.contains(name) {
                return PushOutcome { pushed, duplicate: Some(name.to_string()) };
            }
            self.names.push(name.to_string());
            pushed += 1;
        }
        PushOutcome { pushed, duplicate: None }
    }

    pub fn pop_last(&mut self, count: usize) {
        let keep = self.names.len().saturating_sub(count);
        self.names.truncate(keep);
    }

    pub fn snapshot(&self) -> Vec<String> {
        self.names.to_vec()
    }

    /// Swaps in a whole chain, returning the previous one for [`restore`](Self::restore).
    pub fn replace(&mut self, names: Vec<String>) -> Vec<String> {
        let old = self.snapshot();
        self.names = SmallVec::from_vec(names);
        old
    }

    pub fn restore(&mut self, old: Vec<String>) {
        self.names = SmallVec::from_vec(old);
    }

    pub fn contains(&self, name: &str) -> bool {
        contains_contract(&self.names, name)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Replaces the first contiguous run of union contracts by the cartesian product
    /// of their members.
    ///
    /// Returns `Ok(None)` when no contract in the chain is a union. Later runs stay in
    /// the expanded chains and are expanded when the nested resolutions reach them.
    pub fn expand_unions<U, K>(
        &self,
        union_of: U,
        is_known: K,
    ) -> Result<Option<Vec<Vec<String>>>, ContractError>
    where
        U: Fn(&str) -> Option<Vec<String>>,
        K: Fn(&str) -> bool,
    {
        let Some(start) = self.names.iter().position(|n| union_of(n).is_some()) else {
            return Ok(None);
        };

        let mut groups: Vec<Vec<String>> = Vec::new();
        let mut end = start;
        while end < self.names.len() {
            let Some(members) = union_of(&self.names[end]) else { break };
            if let Some(unknown) = members.iter().find(|m| !is_known(m)) {
                return Err(ContractError::UnknownUnionMember {
                    union: self.names[end].clone(),
                    member: unknown.clone(),
                });
            }
            groups.push(members);
            end += 1;
        }

        let mut chains: Vec<Vec<String>> = vec![self.names[..start].to_vec()];
        for members in &groups {
            chains = chains
                .into_iter()
                .flat_map(|prefix| {
                    members.iter().map(move |m| {
                        let mut chain = prefix.clone();
                        chain.push(m.clone());
                        chain
                    })
                })
                .collect();
        }
        for chain in &mut chains {
            chain.extend(self.names[end..].iter().cloned());
        }
        Ok(Some(chains))
    }
}

impl From<Vec<String>> for ContractStack {
    fn from(names: Vec<String>) -> Self {
        Self { names: SmallVec::from_vec(names) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn unions(name: &str) -> Option<Vec<String>> {
        match name {
            "all-db" => Some(vec!["pg".into(), "mysql".into()]),
            "all-env" => Some(vec!["eu".into(), "us".into()]),
            "broken" => Some(vec!["pg".into(), "nosuch".into()]),
            _ => None,
        }
    }

    fn known(name: &str) -> bool {
        matches!(name, "pg" | "mysql" | "eu" | "us" | "x")
    }

    #[test]
    fn replace_and_restore() {
        let mut stack = ContractStack::new();
        stack.push(&["a"]);
        let old = stack.replace(vec!["b".into(), "c".into()]);
        assert_eq!(stack.as_slice(), ["b", "c"]);
        stack.restore(old);
        assert_eq!(stack.as_slice(), ["a"]);
    }

    #[test]
    fn no_union_means_no_expansion() {
        let mut stack = ContractStack::new();
        stack.push(&["x"]);
        assert_eq!(stack.expand_unions(unions, known), Ok(None));
    }

    #[test]
    fn first_run_of_unions_becomes_a_product() {
        let mut stack = ContractStack::new();
        stack.push(&["x", "all-db", "all-env", "y"]);
        let chains = stack.expand_unions(unions, known).unwrap().unwrap();
        assert_eq!(
            chains,
            vec![
                vec!["x", "pg", "eu", "y"],
                vec!["x", "pg", "us", "y"],
                vec!["x", "mysql", "eu", "y"],
                vec!["x", "mysql", "us", "y"],
            ]
        );
    }

    #[test]
    fn later_union_run_waits_for_the_next_expansion() {
        let mut stack = ContractStack::new();
        stack.push(&["all-db", "x", "all-env"]);
        let chains = stack.expand_unions(unions, known).unwrap().unwrap();
        assert_eq!(chains, vec![vec!["pg", "x", "all-env"], vec!["mysql", "x", "all-env"]]);

        let nested = ContractStack::from(chains[0].clone()).expand_unions(unions, known).unwrap().unwrap();
        assert_eq!(nested, vec![vec!["pg", "x", "eu"], vec!["pg", "x", "us"]]);
    }

    #[test]
    fn unknown_member_is_an_error() {
        let mut stack = ContractStack::new();
        stack.push(&["broken"]);
        assert_eq!(
            stack.expand_unions(unions, known),
            Err(ContractError::UnknownUnionMember { union: "broken".into(), member: "nosuch".into() })
        );
    }

    proptest! {
        #[test]
        fn rollback_restores_the_previous_chain(
            base in proptest::collection::vec("[a-d]{1,2}", 0..4),
            extra in proptest::collection::vec("[a-d]{1,2}", 0..6),
        ) {
            let mut stack = ContractStack::new();
            let first = stack.push(&base);
            stack.pop_last(first.pushed);
            prop_assert!(stack.is_empty());

            stack.push(&base);
            let before = stack.snapshot();
            let outcome = stack.push(&extra);
            prop_assert_eq!(stack.len(), before.len() + outcome.pushed);
            if let Some(dup) = &outcome.duplicate {
                prop_assert!(stack.contains(dup));
            }
            stack.pop_last(outcome.pushed);
            prop_assert_eq!(stack.snapshot(), before);
        }
    }
}
