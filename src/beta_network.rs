//! Beta network node kinds.
//!
//! Every node kind is one arm of a tagged union rather than a trait object
//! hierarchy, per the design notes: the NCC partner's asymmetric deletion
//! tail is the only place that genuinely needs to know its own kind, and a
//! `match` on [`BetaNodeKind`] expresses that directly.

use crate::condition::{BindExpr, Predicate};
use crate::types::{AlphaId, BetaId, TokenId, Variable, WmeField};

/// An equality test resolved against the token chain: the candidate WME's
/// `field` must equal `ancestor_field` of the WME found by walking
/// `ancestor_hops` WME-bearing ancestors up from the token being extended.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EqualityTest {
    pub field: WmeField,
    pub ancestor_hops: usize,
    pub ancestor_field: WmeField,
}

/// A variable newly bound by a join at the field it was first seen in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBinding {
    pub var: Variable,
    pub field: WmeField,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JoinKey {
    pub parent: BetaId,
    pub alpha_memory: AlphaId,
    pub tests: Vec<EqualityTest>,
}

/// The kind-specific state of a beta network node. Node identity, parent,
/// and children live on the enclosing [`BetaNode`] since every kind needs them.
pub enum BetaNodeKind {
    /// Fans incoming tokens out to children and remembers them for priming
    /// future joins. The sole beta memory with no parent is the network root.
    BetaMemory { items: Vec<TokenId> },
    /// Joins a beta memory (its parent) against an alpha memory.
    Join { alpha_memory: AlphaId, tests: Vec<EqualityTest>, new_bindings: Vec<NewBinding> },
    /// Like a join, but stores its own tokens and propagates only the unblocked ones.
    Negative { alpha_memory: AlphaId, tests: Vec<EqualityTest>, items: Vec<TokenId> },
    /// Propagates a token iff its paired partner produced zero results for it.
    Ncc { partner: BetaId, items: Vec<TokenId> },
    /// Terminal of an NCC's nested sub-conjunction; reports matches back to `ncc_node`.
    /// `ncc_node` is `None` for the brief window during compilation between the
    /// partner being built and the paired NCC node being wired in.
    NccPartner { ncc_node: Option<BetaId>, conjunct_count: usize, items: Vec<TokenId> },
    /// Drops tokens whose full binding fails `predicate`.
    Filter { vars: Vec<Variable>, predicate: Predicate, items: Vec<TokenId> },
    /// Computes `var` from the full binding and appends it to a forwarded token.
    Bind { var: Variable, vars: Vec<Variable>, expr: BindExpr, items: Vec<TokenId> },
    /// Terminal of one rule disjunct; accumulates the disjunct's conflict set.
    PNode { rule_id: crate::types::RuleId, disjunct: usize, items: Vec<TokenId> },
}

impl std::fmt::Debug for BetaNodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BetaNodeKind::BetaMemory { items } => {
                f.debug_struct("BetaMemory").field("items", &items.len()).finish()
            }
            BetaNodeKind::Join { alpha_memory, tests, new_bindings } => f
                .debug_struct("Join")
                .field("alpha_memory", alpha_memory)
                .field("tests", tests)
                .field("new_bindings", new_bindings)
                .finish(),
            BetaNodeKind::Negative { alpha_memory, tests, items } => f
                .debug_struct("Negative")
                .field("alpha_memory", alpha_memory)
                .field("tests", tests)
                .field("items", &items.len())
                .finish(),
            BetaNodeKind::Ncc { partner, items } => {
                f.debug_struct("Ncc").field("partner", partner).field("items", &items.len()).finish()
            }
            BetaNodeKind::NccPartner { ncc_node, conjunct_count, items } => f
                .debug_struct("NccPartner")
                .field("ncc_node", ncc_node)
                .field("conjunct_count", conjunct_count)
                .field("items", &items.len())
                .finish(),
            BetaNodeKind::Filter { vars, items, .. } => {
                f.debug_struct("Filter").field("vars", vars).field("items", &items.len()).finish()
            }
            BetaNodeKind::Bind { var, vars, items, .. } => f
                .debug_struct("Bind")
                .field("var", var)
                .field("vars", vars)
                .field("items", &items.len())
                .finish(),
            BetaNodeKind::PNode { rule_id, disjunct, items } => f
                .debug_struct("PNode")
                .field("rule_id", rule_id)
                .field("disjunct", disjunct)
                .field("items", &items.len())
                .finish(),
        }
    }
}

/// One node of the beta network: kind-specific state plus the DAG edges every kind shares.
#[derive(Debug)]
pub struct BetaNode {
    pub parent: Option<BetaId>,
    pub children: Vec<BetaId>,
    pub kind: BetaNodeKind,
    /// Number of compiled rule-disjuncts currently routed through this node.
    pub ref_count: usize,
}

impl BetaNode {
    /// Node-owned tokens for kinds that store them; `None` for `Join`, which is stateless.
    pub fn items(&self) -> Option<&[TokenId]> {
        match &self.kind {
            BetaNodeKind::BetaMemory { items }
            | BetaNodeKind::Negative { items, .. }
            | BetaNodeKind::Ncc { items, .. }
            | BetaNodeKind::NccPartner { items, .. }
            | BetaNodeKind::Filter { items, .. }
            | BetaNodeKind::Bind { items, .. }
            | BetaNodeKind::PNode { items, .. } => Some(items),
            BetaNodeKind::Join { .. } => None,
        }
    }

    pub fn items_mut(&mut self) -> Option<&mut Vec<TokenId>> {
        match &mut self.kind {
            BetaNodeKind::BetaMemory { items }
            | BetaNodeKind::Negative { items, .. }
            | BetaNodeKind::Ncc { items, .. }
            | BetaNodeKind::NccPartner { items, .. }
            | BetaNodeKind::Filter { items, .. }
            | BetaNodeKind::Bind { items, .. }
            | BetaNodeKind::PNode { items, .. } => Some(items),
            BetaNodeKind::Join { .. } => None,
        }
    }

    pub fn is_ncc_partner(&self) -> bool {
        matches!(self.kind, BetaNodeKind::NccPartner { .. })
    }
}

/// Arena of beta network nodes, addressed by stable [`BetaId`]; index 0 is
/// always the root beta memory.
#[derive(Debug, Default)]
pub struct BetaNetwork {
    nodes: Vec<BetaNode>,
}

impl BetaNetwork {
    pub fn new() -> Self {
        let root = BetaNode {
            parent: None,
            children: Vec::new(),
            kind: BetaNodeKind::BetaMemory { items: vec![crate::token::ROOT_TOKEN] },
            ref_count: 1,
        };
        Self { nodes: vec![root] }
    }

    pub fn get(&self, id: BetaId) -> &BetaNode {
        &self.nodes[id]
    }

    pub fn get_mut(&mut self, id: BetaId) -> &mut BetaNode {
        &mut self.nodes[id]
    }

    pub fn insert(&mut self, node: BetaNode) -> BetaId {
        let id = self.nodes.len();
        self.nodes.push(node);
        id
    }

    pub fn add_child(&mut self, parent: BetaId, child: BetaId) {
        self.nodes[parent].children.push(child);
    }
}
