//! Tokens, working-memory storage, and negative-join-result bookkeeping.
//!
//! Everything here is a plain arena keyed by a stable index: tokens and WMEs
//! form a cyclic, back-referenced graph (a token points at its WME and vice
//! versa), which is awkward to express as an owning tree in safe Rust.
//! Indices into a `Vec` give O(1) lookup and O(incident edges) deletion
//! without reference counting or interior mutability.

use crate::types::{Binding, BetaId, NjrId, TokenId, Wme, WmeId};
use std::collections::HashMap;

/// The beta memory that seeds every network: holds exactly the dummy root token.
pub const ROOT_BETA: BetaId = 0;
/// The dummy root token every match chain descends from.
pub const ROOT_TOKEN: TokenId = 0;

/// A partial match: a chain of `(parent, wme, binding)` triples.
///
/// `wme` is `None` for the root token and for tokens owned by negative,
/// NCC, filter, and bind nodes — none of those consume a new WME slot.
#[derive(Debug, Clone)]
pub struct TokenRecord {
    pub parent: Option<TokenId>,
    pub wme: Option<WmeId>,
    pub node: BetaId,
    pub children: Vec<TokenId>,
    pub binding: Binding,
    /// Negative-node-only: the [`NegativeJoinResult`]s currently blocking this token.
    pub join_results: Vec<NjrId>,
    /// NCC-node-only: partner tokens owned by this token.
    pub ncc_results: Vec<TokenId>,
    /// NCC-partner-only: the NCC token this partner token belongs to, if any.
    pub owner: Option<TokenId>,
}

impl TokenRecord {
    pub fn is_root(&self) -> bool {
        self.parent.is_none() && self.wme.is_none()
    }
}

/// Arena of live tokens, addressed by stable [`TokenId`].
#[derive(Debug, Default)]
pub struct TokenStore {
    tokens: Vec<TokenRecord>,
}

impl TokenStore {
    pub fn new() -> Self {
        let root = TokenRecord {
            parent: None,
            wme: None,
            node: ROOT_BETA,
            children: Vec::new(),
            binding: Binding::new(),
            join_results: Vec::new(),
            ncc_results: Vec::new(),
            owner: None,
        };
        Self { tokens: vec![root] }
    }

    pub fn get(&self, id: TokenId) -> &TokenRecord {
        &self.tokens[id]
    }

    pub fn get_mut(&mut self, id: TokenId) -> &mut TokenRecord {
        &mut self.tokens[id]
    }

    /// Creates a new token as a child of `parent`, registering the back-links
    /// described in the data model (parent's children, wme's token list).
    pub fn create(
        &mut self,
        parent: Option<TokenId>,
        wme: Option<WmeId>,
        node: BetaId,
        binding: Binding,
    ) -> TokenId {
        let id = self.tokens.len();
        self.tokens.push(TokenRecord {
            parent,
            wme,
            node,
            children: Vec::new(),
            binding,
            join_results: Vec::new(),
            ncc_results: Vec::new(),
            owner: None,
        });
        if let Some(p) = parent {
            self.tokens[p].children.push(id);
        }
        id
    }

    /// The full binding for `t`: the composition of every ancestor's local
    /// binding, root first. The compiler rejects variable reuse across
    /// levels, so later entries never need to clobber earlier ones in practice.
    pub fn full_binding(&self, t: TokenId) -> Binding {
        let mut chain = Vec::new();
        let mut cur = Some(t);
        while let Some(id) = cur {
            chain.push(id);
            cur = self.tokens[id].parent;
        }
        let mut binding = Binding::new();
        for id in chain.into_iter().rev() {
            binding.extend(self.tokens[id].binding.clone());
        }
        binding
    }

    /// Walks from `start` (inclusive) up the parent chain, counting only
    /// WME-bearing tokens, and returns the WME at the `hops`-th one counted
    /// from the bottom. `hops = 0` means "the nearest WME-bearing ancestor,
    /// or `start` itself if it carries one".
    pub fn nth_wme_ancestor(&self, start: TokenId, hops: usize) -> WmeId {
        let mut count = 0usize;
        let mut cur = Some(start);
        while let Some(id) = cur {
            let rec = &self.tokens[id];
            if let Some(wme) = rec.wme {
                if count == hops {
                    return wme;
                }
                count += 1;
            }
            cur = rec.parent;
        }
        unreachable!("nth_wme_ancestor({start}, {hops}): chain exhausted before reaching hop")
    }

    /// Walks exactly `hops` plain parent links up from `start`. Used for NCC
    /// owner lookup, where hop count is the nested conjunction's element
    /// count rather than a WME-bearing-ancestor count.
    pub fn nth_ancestor(&self, start: TokenId, hops: usize) -> TokenId {
        let mut cur = start;
        for _ in 0..hops {
            cur = self.tokens[cur].parent.expect("nth_ancestor: chain exhausted before reaching hop");
        }
        cur
    }

    pub fn remove_child(&mut self, parent: TokenId, child: TokenId) {
        self.tokens[parent].children.retain(|&c| c != child);
    }
}

/// A pending negative match: a WME in the paired alpha memory that currently
/// satisfies all of a negative node's equality tests for some owner token.
#[derive(Debug, Clone, Copy)]
pub struct NegativeJoinResult {
    pub owner: TokenId,
    pub wme: WmeId,
}

/// Arena of negative-join-results, tombstoned on removal so ids stay stable.
#[derive(Debug, Default)]
pub struct NjrStore {
    results: Vec<Option<NegativeJoinResult>>,
}

impl NjrStore {
    pub fn insert(&mut self, owner: TokenId, wme: WmeId) -> NjrId {
        let id = self.results.len();
        self.results.push(Some(NegativeJoinResult { owner, wme }));
        id
    }

    pub fn get(&self, id: NjrId) -> NegativeJoinResult {
        self.results[id].expect("negative join result already removed")
    }

    pub fn remove(&mut self, id: NjrId) {
        self.results[id] = None;
    }
}

/// A record of one asserted WME plus the back-references needed for O(1) retraction.
#[derive(Debug, Clone, Default)]
pub struct WmeRecord {
    pub wme: Option<Wme>,
    pub amems: Vec<crate::types::AlphaId>,
    pub tokens: Vec<TokenId>,
    pub negative_join_results: Vec<NjrId>,
}

/// Working memory: the live WME set, indexed for O(1) duplicate detection and retraction.
#[derive(Debug, Default)]
pub struct WmeStore {
    records: Vec<WmeRecord>,
    index: HashMap<Wme, WmeId>,
}

impl WmeStore {
    pub fn get(&self, id: WmeId) -> &Wme {
        self.records[id].wme.as_ref().expect("wme already retracted")
    }

    pub fn record(&self, id: WmeId) -> &WmeRecord {
        &self.records[id]
    }

    pub fn record_mut(&mut self, id: WmeId) -> &mut WmeRecord {
        &mut self.records[id]
    }

    pub fn lookup(&self, wme: &Wme) -> Option<WmeId> {
        self.index.get(wme).copied()
    }

    /// Inserts a new WME; the caller must have already checked [`Self::lookup`]
    /// returned `None` (re-asserting an existing WME is a documented no-op).
    pub fn insert(&mut self, wme: Wme) -> WmeId {
        let id = self.records.len();
        self.index.insert(wme.clone(), id);
        self.records.push(WmeRecord { wme: Some(wme), ..Default::default() });
        id
    }

    /// Tombstones a WME so its id cannot be looked up or re-admitted, while
    /// leaving the slot addressable for any token that still references it
    /// mid-deletion.
    pub fn tombstone(&mut self, id: WmeId) {
        if let Some(wme) = self.records[id].wme.take() {
            self.index.remove(&wme);
        }
    }
}
