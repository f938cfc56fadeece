//! Structural sharing of compiled network nodes across rules.
//!
//! The compiler looks a candidate node up here before creating one; a hit
//! bumps the existing node's reference count instead of duplicating state.
//! NCC/partner pairs are deliberately excluded — nested negated conjunctions
//! are rare enough, and distinct enough per occurrence, that sharing them
//! would add bookkeeping for little payoff (see DESIGN.md).

use crate::beta_network::JoinKey;
use crate::types::BetaId;
use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct NodeSharingRegistry {
    joins: HashMap<JoinKey, BetaId>,
    negatives: HashMap<JoinKey, BetaId>,
    /// Child beta memory for a given join node, if one has been built.
    beta_memories: HashMap<BetaId, BetaId>,
}

impl NodeSharingRegistry {
    pub fn find_join(&self, key: &JoinKey) -> Option<BetaId> {
        self.joins.get(key).copied()
    }

    pub fn register_join(&mut self, key: JoinKey, node: BetaId) {
        self.joins.insert(key, node);
    }

    pub fn forget_join(&mut self, key: &JoinKey) {
        self.joins.remove(key);
    }

    pub fn find_negative(&self, key: &JoinKey) -> Option<BetaId> {
        self.negatives.get(key).copied()
    }

    pub fn register_negative(&mut self, key: JoinKey, node: BetaId) {
        self.negatives.insert(key, node);
    }

    pub fn forget_negative(&mut self, key: &JoinKey) {
        self.negatives.remove(key);
    }

    pub fn find_beta_memory(&self, join: BetaId) -> Option<BetaId> {
        self.beta_memories.get(&join).copied()
    }

    pub fn register_beta_memory(&mut self, join: BetaId, memory: BetaId) {
        self.beta_memories.insert(join, memory);
    }

    pub fn forget_beta_memory(&mut self, join: BetaId) {
        self.beta_memories.remove(&join);
    }
}
