//! Deferred binding answers
//!
//! A call of the runtime's `GWT.create(Foo.class)` asks for an implementation
//! of `Foo` that is only known per permutation. A [`RebindOracle`] supplies
//! the answer type name.

use crate::config::PermutationDef;
use crate::errors::Result;
use indexmap::IndexMap;

pub trait RebindOracle: Send + Sync {
    /// The type that answers `requested` in the current permutation
    fn rebind(&self, requested: &str) -> Result<String>;

    /// Every answer `requested` can receive across all permutations
    fn all_possible_answers(&self, requested: &str) -> Vec<String>;
}

/// Answers from fixed tables; a type without a rule answers itself
#[derive(Debug, Clone, Default)]
pub struct StaticRebindOracle {
    rules: IndexMap<String, Vec<String>>,
}

impl StaticRebindOracle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `answer` as a possible answer for `requested`
    pub fn with_rule(mut self, requested: impl Into<String>, answer: impl Into<String>) -> Self {
        self.add_rule(requested.into(), answer.into());
        self
    }

    fn add_rule(&mut self, requested: String, answer: String) {
        let answers = self.rules.entry(requested).or_default();
        if !answers.contains(&answer) {
            answers.push(answer);
        }
    }

    /// The answers of one permutation
    pub fn for_permutation(permutation: &PermutationDef) -> Self {
        let mut oracle = Self::new();
        for (requested, answer) in &permutation.rebinds {
            oracle.add_rule(requested.clone(), answer.clone());
        }
        oracle
    }

    /// The union of several permutations' answers. A type that some
    /// permutation leaves unbound also answers itself.
    pub fn for_permutations(permutations: &[PermutationDef]) -> Self {
        let mut oracle = Self::new();
        let requested: Vec<&String> = permutations
            .iter()
            .flat_map(|p| p.rebinds.keys())
            .collect();
        for key in requested {
            for permutation in permutations {
                let answer = permutation.rebinds.get(key).unwrap_or(key);
                oracle.add_rule(key.clone(), answer.clone());
            }
        }
        oracle
    }
}

impl RebindOracle for StaticRebindOracle {
    fn rebind(&self, requested: &str) -> Result<String> {
        Ok(self
            .rules
            .get(requested)
            .and_then(|answers| answers.first())
            .cloned()
            .unwrap_or_else(|| requested.to_string()))
    }

    fn all_possible_answers(&self, requested: &str) -> Vec<String> {
        match self.rules.get(requested) {
            Some(answers) => answers.clone(),
            None => vec![requested.to_string()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn permutation(id: usize, rules: &[(&str, &str)]) -> PermutationDef {
        PermutationDef {
            id,
            rebinds: rules
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    #[test]
    fn test_unbound_type_answers_itself() {
        let oracle = StaticRebindOracle::new();
        assert_eq!(oracle.rebind("app.Impl").unwrap(), "app.Impl");
        assert_eq!(oracle.all_possible_answers("app.Impl"), vec!["app.Impl"]);
    }

    #[test]
    fn test_permutation_rules() {
        let oracle = StaticRebindOracle::for_permutation(&permutation(0, &[("app.Api", "app.WebkitApi")]));
        assert_eq!(oracle.rebind("app.Api").unwrap(), "app.WebkitApi");
    }

    #[test]
    fn test_union_collects_every_answer() {
        let permutations = vec![
            permutation(0, &[("app.Api", "app.WebkitApi")]),
            permutation(1, &[("app.Api", "app.GeckoApi")]),
            permutation(2, &[]),
        ];
        let oracle = StaticRebindOracle::for_permutations(&permutations);
        assert_eq!(
            oracle.all_possible_answers("app.Api"),
            vec!["app.WebkitApi", "app.GeckoApi", "app.Api"]
        );
    }
}
