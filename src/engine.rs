//! Engine coordination: owns every arena and exposes the public surface.
//!
//! The type itself is thin; the substantial logic lives beside it in
//! [`crate::rete_nodes`] (activation and the token-deletion invariant) and
//! [`crate::rete_network`] (compiling rules into the network). Splitting a
//! single type's behaviour across modules by concern, rather than nesting
//! everything into one file, mirrors how the upstream engine organizes its
//! rule-management, fact-processing, and network-construction code.

use crate::alpha_memory::AlphaNetwork;
use crate::beta_network::{BetaNetwork, BetaNodeKind};
use crate::condition::Rule;
use crate::error::{EngineError, EngineResult};
use crate::node_sharing::NodeSharingRegistry;
use crate::token::{NjrStore, TokenStore, WmeStore};
use crate::types::{Binding, RuleId, Wme};
use std::collections::HashMap;
use std::rc::Rc;
use tracing::{info, instrument, warn};

/// The compiled footprint of a single rule disjunct, kept so
/// [`ReteEngine::remove_rule`] can unwind exactly what compilation built.
pub(crate) struct CompiledDisjunct {
    pub(crate) pnode: crate::types::BetaId,
    /// Every beta node touched while compiling this disjunct, in creation order.
    pub(crate) nodes: Vec<crate::types::BetaId>,
    /// Every alpha memory touched while compiling this disjunct, one entry
    /// per positive or negative pattern, mirroring `nodes`' increments.
    pub(crate) alphas: Vec<crate::types::AlphaId>,
}

pub(crate) struct CompiledRule {
    pub(crate) rule: Rule,
    pub(crate) disjuncts: Vec<CompiledDisjunct>,
}

/// A forward-chaining production-rule engine built on the RETE algorithm.
///
/// `ReteEngine` owns the full network: working memory, the alpha and beta
/// networks, and the compiled rule set. It is single-threaded by design —
/// see the crate-level documentation for why `Rc` rather than `Arc` is
/// the right tool here.
pub struct ReteEngine {
    pub(crate) alpha: AlphaNetwork,
    pub(crate) beta: BetaNetwork,
    pub(crate) tokens: TokenStore,
    pub(crate) wmes: WmeStore,
    pub(crate) njrs: NjrStore,
    pub(crate) sharing: NodeSharingRegistry,
    pub(crate) rules: HashMap<RuleId, CompiledRule>,
}

impl Default for ReteEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ReteEngine {
    pub fn new() -> Self {
        Self {
            alpha: AlphaNetwork::default(),
            beta: BetaNetwork::new(),
            tokens: TokenStore::new(),
            wmes: WmeStore::default(),
            njrs: NjrStore::default(),
            sharing: NodeSharingRegistry::default(),
            rules: HashMap::new(),
        }
    }

    /// Asserts a WME into working memory. Re-asserting a WME already present
    /// is a documented no-op, matching set semantics for working memory.
    #[instrument(level = "debug", skip(self))]
    pub fn assert(&mut self, wme: Wme) -> EngineResult<()> {
        if let Some(field) = wme.first_variable_field() {
            return Err(EngineError::InvalidWme {
                id: wme.id,
                attr: wme.attr,
                value: wme.value,
                field,
            });
        }
        if self.wmes.lookup(&wme).is_some() {
            return Ok(());
        }
        let wme_id = self.wmes.insert(wme.clone());
        for alpha_id in self.alpha.matching_memories(&wme) {
            if let Some(successors) = self.alpha.admit(alpha_id, wme_id) {
                self.wmes.record_mut(wme_id).amems.push(alpha_id);
                for node in successors {
                    self.right_activate(node, wme_id);
                }
            }
        }
        Ok(())
    }

    /// Retracts a WME from working memory. Retracting a WME not present is a no-op.
    #[instrument(level = "debug", skip(self))]
    pub fn retract(&mut self, wme: &Wme) {
        let Some(wme_id) = self.wmes.lookup(wme) else {
            return;
        };
        let amems = self.wmes.record(wme_id).amems.clone();
        for a in &amems {
            self.alpha.remove_wme(*a, wme_id);
        }
        let owning_tokens = self.wmes.record(wme_id).tokens.clone();
        for t in owning_tokens {
            self.delete_token_and_descendants(t);
        }
        let njrs = self.wmes.record(wme_id).negative_join_results.clone();
        for njr_id in njrs {
            let njr = self.njrs.get(njr_id);
            self.tokens.get_mut(njr.owner).join_results.retain(|&j| j != njr_id);
            self.njrs.remove(njr_id);
            if self.tokens.get(njr.owner).join_results.is_empty() {
                let node = self.tokens.get(njr.owner).node;
                let children = self.beta.get(node).children.clone();
                for c in children {
                    self.propagate(c, njr.owner);
                }
            }
        }
        self.wmes.tombstone(wme_id);
    }

    /// Compiles and wires a rule into the network. On any validation error
    /// the network is left exactly as it was before the call.
    #[instrument(level = "info", skip(self, rule), fields(rule = %rule.id))]
    pub fn add_rule(&mut self, rule: Rule) -> EngineResult<()> {
        rule.validate_nonempty()?;
        for (i, disjunct) in rule.disjuncts.iter().enumerate() {
            let mut known = std::collections::HashSet::new();
            crate::rete_network::validate_conjunction(&rule.id, i, disjunct, &mut known)?;
        }
        let mut disjuncts = Vec::with_capacity(rule.disjuncts.len());
        for (i, disjunct) in rule.disjuncts.iter().enumerate() {
            let compiled = self.compile_disjunct(&rule.id, i, disjunct);
            disjuncts.push(compiled);
        }
        info!(disjuncts = disjuncts.len(), "rule compiled");
        self.rules.insert(rule.id.clone(), CompiledRule { rule, disjuncts });
        Ok(())
    }

    /// Removes a previously added rule, unwinding every node its disjuncts
    /// no longer share with anything else.
    #[instrument(level = "info", skip(self))]
    pub fn remove_rule(&mut self, rule_id: &str) -> EngineResult<()> {
        let compiled = self.rules.remove(rule_id).ok_or_else(|| EngineError::UnknownRule(rule_id.to_string()))?;
        for disjunct in &compiled.disjuncts {
            self.unwind_disjunct(disjunct);
        }
        Ok(())
    }

    /// Every current match of `rule_id`, one binding per disjunct p-node token.
    pub fn matches(&self, rule_id: &str) -> Vec<Binding> {
        let Some(compiled) = self.rules.get(rule_id) else {
            return Vec::new();
        };
        let mut out = Vec::new();
        for disjunct in &compiled.disjuncts {
            if let Some(items) = self.beta.get(disjunct.pnode).items() {
                for &t in items {
                    out.push(self.tokens.full_binding(t));
                }
            }
        }
        out
    }

    /// Fires every rule's production once per current match, in rule
    /// insertion order and p-node-item order within a rule; `limit` caps the
    /// total number of firings. There is no conflict-resolution strategy
    /// beyond that fixed order — see the design notes on rule priority.
    #[instrument(level = "debug", skip(self))]
    pub fn run(&mut self, limit: Option<usize>) -> EngineResult<usize> {
        let mut fired = 0usize;
        let rule_ids: Vec<RuleId> = self.rules.keys().cloned().collect();
        for rule_id in rule_ids {
            let Some(compiled) = self.rules.get(&rule_id) else { continue };
            let production = Rc::clone(&compiled.rule.production);
            let pnodes: Vec<_> = compiled.disjuncts.iter().map(|d| d.pnode).collect();
            for pnode in pnodes {
                let items = self.beta.get(pnode).items().unwrap_or(&[]).to_vec();
                for t in items {
                    if let Some(lim) = limit {
                        if fired >= lim {
                            return Ok(fired);
                        }
                    }
                    let binding = self.tokens.full_binding(t);
                    production.fire(&binding).map_err(|e| {
                        warn!(rule = %rule_id, error = %e, "production failed");
                        e
                    })?;
                    fired += 1;
                }
            }
        }
        Ok(fired)
    }

    /// Unwinds one compiled disjunct: deletes its p-node's tokens, then walks
    /// its node list leaf-first, decrementing reference counts and unlinking
    /// anything that drops to zero.
    fn unwind_disjunct(&mut self, disjunct: &CompiledDisjunct) {
        let pnode_tokens = self.beta.get(disjunct.pnode).items().unwrap_or(&[]).to_vec();
        for t in pnode_tokens {
            self.delete_token_and_descendants(t);
        }
        for &node in disjunct.nodes.iter().rev() {
            self.release_node(node);
        }
        for &alpha in &disjunct.alphas {
            self.alpha.release(alpha);
        }
    }

    /// Decrements `node`'s reference count; when it reaches zero, deletes any
    /// tokens it still owns and unlinks it from its parent and from sharing.
    fn release_node(&mut self, node: crate::types::BetaId) {
        self.beta.get_mut(node).ref_count = self.beta.get_mut(node).ref_count.saturating_sub(1);
        if self.beta.get(node).ref_count > 0 {
            return;
        }
        if let Some(items) = self.beta.get(node).items() {
            for t in items.to_vec() {
                self.delete_token_and_descendants(t);
            }
        }
        let parent = self.beta.get(node).parent;
        if let Some(p) = parent {
            self.beta.get_mut(p).children.retain(|&c| c != node);
        }
        match &self.beta.get(node).kind {
            BetaNodeKind::Join { alpha_memory, tests, .. } => {
                let key = crate::beta_network::JoinKey {
                    parent: parent.unwrap_or(crate::token::ROOT_BETA),
                    alpha_memory: *alpha_memory,
                    tests: tests.clone(),
                };
                self.alpha.get_mut(*alpha_memory).successors.retain(|&s| s != node);
                self.sharing.forget_join(&key);
            }
            BetaNodeKind::Negative { alpha_memory, tests, .. } => {
                let key = crate::beta_network::JoinKey {
                    parent: parent.unwrap_or(crate::token::ROOT_BETA),
                    alpha_memory: *alpha_memory,
                    tests: tests.clone(),
                };
                self.alpha.get_mut(*alpha_memory).successors.retain(|&s| s != node);
                self.sharing.forget_negative(&key);
            }
            BetaNodeKind::BetaMemory { .. } => {
                if let Some(join) = parent {
                    self.sharing.forget_beta_memory(join);
                }
            }
            _ => {}
        }
    }
}
