//! Alpha network: constant-test indexing of working memory.
//!
//! Each alpha memory holds every WME matching one pattern of constants. The
//! index keyed on `(id, attr, value)` with selective wildcards stands in for
//! the three-level constant-test tree from the design: testing the 8
//! combinations of "constant or wildcard" per field against a candidate WME
//! gives the same O(1)-per-level lookups a literal tree of test nodes would,
//! without the bookkeeping of intermediate single-field nodes.

use crate::types::{AlphaId, BetaId, Wme, WmeId};
use std::collections::HashMap;
use tracing::{debug, trace};

/// A constant pattern over a WME triple: `None` marks a wildcard (variable) field.
pub type AlphaPattern = (Option<String>, Option<String>, Option<String>);

/// An index of WMEs satisfying one [`AlphaPattern`].
#[derive(Debug, Default)]
pub struct AlphaMemory {
    pub pattern: AlphaPattern,
    pub items: Vec<WmeId>,
    /// Join and negative nodes right-activated when a WME is admitted here.
    pub successors: Vec<BetaId>,
    pub ref_count: usize,
}

impl AlphaMemory {
    pub fn contains(&self, wme_id: WmeId) -> bool {
        self.items.contains(&wme_id)
    }
}

/// Owns every alpha memory and the index used to find the ones a WME admits into.
#[derive(Debug, Default)]
pub struct AlphaNetwork {
    memories: Vec<AlphaMemory>,
    index: HashMap<AlphaPattern, AlphaId>,
}

impl AlphaNetwork {
    pub fn get(&self, id: AlphaId) -> &AlphaMemory {
        &self.memories[id]
    }

    pub fn get_mut(&mut self, id: AlphaId) -> &mut AlphaMemory {
        &mut self.memories[id]
    }

    /// Finds or creates the alpha memory for `pattern`, bumping its reference
    /// count either way. Returns `(id, created)`.
    pub fn get_or_create(&mut self, pattern: AlphaPattern) -> (AlphaId, bool) {
        if let Some(&id) = self.index.get(&pattern) {
            self.memories[id].ref_count += 1;
            return (id, false);
        }
        let id = self.memories.len();
        self.memories.push(AlphaMemory { pattern: pattern.clone(), ref_count: 1, ..Default::default() });
        self.index.insert(pattern, id);
        debug!(alpha_id = id, "created alpha memory");
        (id, true)
    }

    /// Decrements a shared alpha memory's reference count; once it drops to
    /// zero the memory is unindexed (but its slot is left in place so
    /// existing `AlphaId`s elsewhere stay valid pointers to a dead node).
    pub fn release(&mut self, id: AlphaId) {
        let mem = &mut self.memories[id];
        mem.ref_count = mem.ref_count.saturating_sub(1);
        if mem.ref_count == 0 {
            self.index.remove(&mem.pattern);
            mem.successors.clear();
            trace!(alpha_id = id, "alpha memory reference count dropped to zero");
        }
    }

    /// All alpha memories a WME should be admitted into, derived by probing
    /// the 8 wildcard/constant combinations of its own fields.
    pub fn matching_memories(&self, wme: &Wme) -> Vec<AlphaId> {
        let mut out = Vec::with_capacity(1);
        for id_opt in [Some(wme.id.clone()), None] {
            for attr_opt in [Some(wme.attr.clone()), None] {
                for value_opt in [Some(wme.value.clone()), None] {
                    let key = (id_opt.clone(), attr_opt.clone(), value_opt.clone());
                    if let Some(&id) = self.index.get(&key) {
                        out.push(id);
                    }
                }
            }
        }
        out
    }

    /// Admits `wme_id` into alpha memory `id` if not already present, then
    /// returns the successors that must be right-activated, in the reverse
    /// insertion order the design requires so the most recently wired
    /// subordinate sees the WME first.
    pub fn admit(&mut self, id: AlphaId, wme_id: WmeId) -> Option<Vec<BetaId>> {
        let mem = &mut self.memories[id];
        if mem.items.contains(&wme_id) {
            return None;
        }
        mem.items.push(wme_id);
        let mut successors = mem.successors.clone();
        successors.reverse();
        Some(successors)
    }

    pub fn remove_wme(&mut self, id: AlphaId, wme_id: WmeId) {
        self.memories[id].items.retain(|&w| w != wme_id);
    }

    /// Registers `node` as a successor of `id`, at the end of the current
    /// insertion order (so it is the first to see future WMEs once reversed).
    pub fn add_successor(&mut self, id: AlphaId, node: BetaId) {
        self.memories[id].successors.push(node);
    }
}
