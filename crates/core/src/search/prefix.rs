//! First-step constraint for a partially typed word.
//!
//! When the user has typed `"th"` the first decoded token must either be a
//! prefix of `"th"` (sub-word vocabularies) or extend it (`"the"`,
//! `"there"`). Later tokens are not constrained.

use std::collections::HashSet;

/// Whether `token` can start a completion of `prefix_suffix`.
pub fn is_consistent(token: &str, prefix_suffix: &str) -> bool {
    !token.is_empty() && (prefix_suffix.starts_with(token) || token.starts_with(prefix_suffix))
}

/// Legal first tokens for one decode call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefixConstraint {
    /// `None` when nothing was typed; every token is legal.
    legal: Option<HashSet<u32>>,
    exist_prefix: bool,
}

impl PrefixConstraint {
    /// Legal ids for `prefix_suffix` against the surface form of every id.
    /// Ids in `special_ids` are never legal for a non-empty suffix.
    pub fn build(prefix_suffix: &str, surfaces: &[String], special_ids: &[u32]) -> Self {
        if prefix_suffix.is_empty() {
            return Self::unconstrained();
        }

        let legal: HashSet<u32> = surfaces
            .iter()
            .enumerate()
            .map(|(id, surface)| (id as u32, surface))
            .filter(|(id, surface)| {
                !special_ids.contains(id) && is_consistent(surface, prefix_suffix)
            })
            .map(|(id, _)| id)
            .collect();

        let exist_prefix = !legal.is_empty();
        Self {
            legal: Some(legal),
            exist_prefix,
        }
    }

    /// Constraint that allows every token.
    pub fn unconstrained() -> Self {
        Self {
            legal: None,
            exist_prefix: true,
        }
    }

    /// Whether at least one vocabulary token matched the typed prefix.
    pub fn exist_prefix(&self) -> bool {
        self.exist_prefix
    }

    /// False when the constraint is a no-op.
    pub fn is_active(&self) -> bool {
        self.legal.is_some()
    }

    pub fn allows(&self, token_id: u32) -> bool {
        self.legal
            .as_ref()
            .map_or(true, |legal| legal.contains(&token_id))
    }

    /// Sorted legal ids, or `None` when every token is legal.
    pub fn legal_token_ids(&self) -> Option<Vec<u32>> {
        self.legal.as_ref().map(|legal| {
            let mut ids: Vec<u32> = legal.iter().copied().collect();
            ids.sort_unstable();
            ids
        })
    }
}
