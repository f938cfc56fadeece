//! Beta node activation and the token-deletion invariant.
//!
//! Every beta node kind implements left- and/or right-activation the way the
//! reference Rete description does: a positive pattern's join stays
//! stateless and always funnels into a following beta memory, while
//! negative, NCC, filter, and bind nodes are both memory and activation
//! logic in one. [`ReteEngine::delete_token_and_descendants`] is the single
//! procedure every other piece of state correctness is built on: an
//! assertion or retraction never does anything to a token except create one
//! or delete it through here.

use crate::beta_network::BetaNodeKind;
use crate::engine::ReteEngine;
use crate::types::{BetaId, Binding, TokenId, WmeId};

impl ReteEngine {
    /// Dispatches a left-activation of `child` by `token`, whatever kind `child` is.
    pub(crate) fn propagate(&mut self, child: BetaId, token: TokenId) {
        match &self.beta.get(child).kind {
            BetaNodeKind::Join { .. } => self.join_left_activation(child, token),
            BetaNodeKind::Negative { .. } => self.negative_left_activation(child, token),
            BetaNodeKind::Ncc { .. } => self.ncc_left_activation(child, token),
            BetaNodeKind::Filter { .. } => self.filter_left_activation(child, token),
            BetaNodeKind::Bind { .. } => self.bind_left_activation(child, token),
            BetaNodeKind::PNode { .. } => self.pnode_left_activation(child, token),
            BetaNodeKind::NccPartner { .. } => self.partner_left_activation(child, token),
            BetaNodeKind::BetaMemory { .. } => {
                unreachable!("a beta memory is only ever reached through its owning join")
            }
        }
    }

    /// Feeds every item already held by `parent` through a freshly created
    /// `node`, using the same activation path live assertions take. Used
    /// once, right after compiling a node that was not found by sharing.
    pub(crate) fn prime(&mut self, node: BetaId, parent: BetaId) {
        let items = self.beta.get(parent).items().unwrap_or(&[]).to_vec();
        for t in items {
            self.propagate(node, t);
        }
    }

    fn test_all(&self, tests: &[crate::beta_network::EqualityTest], token: TokenId, candidate: WmeId) -> bool {
        tests.iter().all(|test| {
            let ancestor = self.tokens.nth_wme_ancestor(token, test.ancestor_hops);
            self.wmes.get(candidate).field(test.field) == self.wmes.get(ancestor).field(test.ancestor_field)
        })
    }

    fn join_binding(&self, new_bindings: &[crate::beta_network::NewBinding], wme: WmeId) -> Binding {
        let mut binding = Binding::new();
        for nb in new_bindings {
            binding.insert(nb.var.clone(), self.wmes.get(wme).field(nb.field).to_string());
        }
        binding
    }

    /// Join left-activation: a new upstream token arrived, so every item of
    /// the join's paired alpha memory is tested against it.
    pub(crate) fn join_left_activation(&mut self, join: BetaId, token: TokenId) {
        let (alpha_memory, tests, new_bindings, child) = match &self.beta.get(join).kind {
            BetaNodeKind::Join { alpha_memory, tests, new_bindings } => {
                (*alpha_memory, tests.clone(), new_bindings.clone(), self.beta.get(join).children.first().copied())
            }
            _ => unreachable!(),
        };
        let Some(child) = child else { return };
        let items = self.alpha.get(alpha_memory).items.clone();
        for wme in items {
            if self.test_all(&tests, token, wme) {
                let binding = self.join_binding(&new_bindings, wme);
                self.beta_memory_left_activation(child, token, wme, binding);
            }
        }
    }

    /// Join right-activation: a new WME was admitted to the join's alpha
    /// memory, so every item of the join's parent beta memory is tested
    /// against it.
    pub(crate) fn join_right_activation(&mut self, join: BetaId, wme: WmeId) {
        let (tests, new_bindings, parent, child) = match &self.beta.get(join).kind {
            BetaNodeKind::Join { tests, new_bindings, .. } => {
                (tests.clone(), new_bindings.clone(), self.beta.get(join).parent, self.beta.get(join).children.first().copied())
            }
            _ => unreachable!(),
        };
        let (Some(parent), Some(child)) = (parent, child) else { return };
        let tokens = self.beta.get(parent).items().unwrap_or(&[]).to_vec();
        for token in tokens {
            if self.test_all(&tests, token, wme) {
                let binding = self.join_binding(&new_bindings, wme);
                self.beta_memory_left_activation(child, token, wme, binding);
            }
        }
    }

    fn beta_memory_left_activation(&mut self, bm: BetaId, parent: TokenId, wme: WmeId, binding: Binding) {
        let t = self.tokens.create(Some(parent), Some(wme), bm, binding);
        self.wmes.record_mut(wme).tokens.push(t);
        if let Some(items) = self.beta.get_mut(bm).items_mut() {
            items.push(t);
        }
        let children = self.beta.get(bm).children.clone();
        for c in children {
            self.propagate(c, t);
        }
    }

    /// Negative left-activation: a new upstream token arrived with nothing
    /// yet known about whether the negated pattern matches it.
    pub(crate) fn negative_left_activation(&mut self, neg: BetaId, parent: TokenId) {
        let (alpha_memory, tests) = match &self.beta.get(neg).kind {
            BetaNodeKind::Negative { alpha_memory, tests, .. } => (*alpha_memory, tests.clone()),
            _ => unreachable!(),
        };
        let t = self.tokens.create(Some(parent), None, neg, Binding::new());
        if let BetaNodeKind::Negative { items, .. } = &mut self.beta.get_mut(neg).kind {
            items.push(t);
        }
        let candidates = self.alpha.get(alpha_memory).items.clone();
        for wme in candidates {
            if self.test_all(&tests, t, wme) {
                let njr = self.njrs.insert(t, wme);
                self.tokens.get_mut(t).join_results.push(njr);
                self.wmes.record_mut(wme).negative_join_results.push(njr);
            }
        }
        if self.tokens.get(t).join_results.is_empty() {
            let children = self.beta.get(neg).children.clone();
            for c in children {
                self.propagate(c, t);
            }
        }
    }

    /// Negative right-activation: a new WME was admitted to the negative
    /// node's alpha memory, possibly blocking tokens that were previously unblocked.
    pub(crate) fn negative_right_activation(&mut self, neg: BetaId, wme: WmeId) {
        let tests = match &self.beta.get(neg).kind {
            BetaNodeKind::Negative { tests, .. } => tests.clone(),
            _ => unreachable!(),
        };
        let items = self.beta.get(neg).items().unwrap_or(&[]).to_vec();
        for t in items {
            if self.test_all(&tests, t, wme) {
                let was_unblocked = self.tokens.get(t).join_results.is_empty();
                let njr = self.njrs.insert(t, wme);
                self.tokens.get_mut(t).join_results.push(njr);
                self.wmes.record_mut(wme).negative_join_results.push(njr);
                if was_unblocked {
                    self.delete_descendants(t);
                }
            }
        }
    }

    /// NCC left-activation: a new upstream token arrived. Any sub-conjunction
    /// matches already parked as ownerless under the partner are claimed now.
    pub(crate) fn ncc_left_activation(&mut self, ncc: BetaId, parent: TokenId) {
        let partner = match &self.beta.get(ncc).kind {
            BetaNodeKind::Ncc { partner, .. } => *partner,
            _ => unreachable!(),
        };
        let t = self.tokens.create(Some(parent), None, ncc, Binding::new());
        if let BetaNodeKind::Ncc { items, .. } = &mut self.beta.get_mut(ncc).kind {
            items.push(t);
        }
        let conjunct_count = match &self.beta.get(partner).kind {
            BetaNodeKind::NccPartner { conjunct_count, .. } => *conjunct_count,
            _ => unreachable!(),
        };
        let partner_items = self.beta.get(partner).items().unwrap_or(&[]).to_vec();
        let mut claimed = Vec::new();
        for pt in partner_items {
            if self.tokens.get(pt).owner.is_some() {
                continue;
            }
            if self.tokens.nth_ancestor(pt, conjunct_count) == parent {
                self.tokens.get_mut(pt).owner = Some(t);
                claimed.push(pt);
            }
        }
        self.tokens.get_mut(t).ncc_results = claimed.clone();
        if claimed.is_empty() {
            let children = self.beta.get(ncc).children.clone();
            for c in children {
                self.propagate(c, t);
            }
        }
    }

    /// NCC partner left-activation: the nested sub-conjunction produced a
    /// match. If the owning NCC token already exists, report to it directly
    /// (possibly deleting the NCC token's descendants); otherwise park ownerless.
    pub(crate) fn partner_left_activation(&mut self, partner: BetaId, parent: TokenId) {
        let t = self.tokens.create(Some(parent), None, partner, Binding::new());
        if let BetaNodeKind::NccPartner { items, .. } = &mut self.beta.get_mut(partner).kind {
            items.push(t);
        }
        let (ncc_node, conjunct_count) = match &self.beta.get(partner).kind {
            BetaNodeKind::NccPartner { ncc_node, conjunct_count, .. } => (*ncc_node, *conjunct_count),
            _ => unreachable!(),
        };
        let Some(ncc_node) = ncc_node else { return };
        let ancestor = self.tokens.nth_ancestor(t, conjunct_count);
        let ncc_items = self.beta.get(ncc_node).items().unwrap_or(&[]).to_vec();
        let owner = ncc_items.iter().find(|&&nt| self.tokens.get(nt).parent == Some(ancestor)).copied();
        if let Some(owner) = owner {
            self.tokens.get_mut(t).owner = Some(owner);
            let was_empty = self.tokens.get(owner).ncc_results.is_empty();
            self.tokens.get_mut(owner).ncc_results.push(t);
            if was_empty {
                self.delete_descendants(owner);
            }
        }
    }

    fn filter_left_activation(&mut self, filter: BetaId, parent: TokenId) {
        let predicate = match &self.beta.get(filter).kind {
            BetaNodeKind::Filter { predicate, .. } => predicate.clone(),
            _ => unreachable!(),
        };
        let binding = self.tokens.full_binding(parent);
        if !predicate(&binding) {
            return;
        }
        let t = self.tokens.create(Some(parent), None, filter, Binding::new());
        if let BetaNodeKind::Filter { items, .. } = &mut self.beta.get_mut(filter).kind {
            items.push(t);
        }
        let children = self.beta.get(filter).children.clone();
        for c in children {
            self.propagate(c, t);
        }
    }

    fn bind_left_activation(&mut self, bind: BetaId, parent: TokenId) {
        let (var, expr) = match &self.beta.get(bind).kind {
            BetaNodeKind::Bind { var, expr, .. } => (var.clone(), expr.clone()),
            _ => unreachable!(),
        };
        let binding = self.tokens.full_binding(parent);
        let value = expr(&binding);
        let mut local = Binding::new();
        local.insert(var, value);
        let t = self.tokens.create(Some(parent), None, bind, local);
        if let BetaNodeKind::Bind { items, .. } = &mut self.beta.get_mut(bind).kind {
            items.push(t);
        }
        let children = self.beta.get(bind).children.clone();
        for c in children {
            self.propagate(c, t);
        }
    }

    fn pnode_left_activation(&mut self, pnode: BetaId, parent: TokenId) {
        let t = self.tokens.create(Some(parent), None, pnode, Binding::new());
        if let BetaNodeKind::PNode { items, .. } = &mut self.beta.get_mut(pnode).kind {
            items.push(t);
        }
    }

    pub(crate) fn right_activate(&mut self, node: BetaId, wme: WmeId) {
        match &self.beta.get(node).kind {
            BetaNodeKind::Join { .. } => self.join_right_activation(node, wme),
            BetaNodeKind::Negative { .. } => self.negative_right_activation(node, wme),
            _ => unreachable!("only join and negative nodes are alpha memory successors"),
        }
    }

    /// Deletes every descendant of `t`, leaving `t` itself (and its own
    /// node-item membership, WME link, and parent link) untouched.
    pub(crate) fn delete_descendants(&mut self, t: TokenId) {
        let children = self.tokens.get(t).children.clone();
        for c in children {
            self.delete_token_and_descendants(c);
        }
        self.tokens.get_mut(t).children.clear();
    }

    /// The central correctness invariant: recursively deletes `t` and every
    /// descendant, severing every back-reference a live token holds. Safe to
    /// call twice on the same token — after the first call every list that
    /// would drive further work on `t` has been drained, so a repeat is a no-op.
    pub(crate) fn delete_token_and_descendants(&mut self, t: TokenId) {
        let children = self.tokens.get(t).children.clone();
        for c in children {
            self.delete_token_and_descendants(c);
        }
        self.tokens.get_mut(t).children.clear();

        let node = self.tokens.get(t).node;
        if !self.beta.get(node).is_ncc_partner() {
            if let Some(items) = self.beta.get_mut(node).items_mut() {
                items.retain(|&x| x != t);
            }
        }
        if let Some(wme_id) = self.tokens.get(t).wme {
            self.wmes.record_mut(wme_id).tokens.retain(|&x| x != t);
        }
        if let Some(parent) = self.tokens.get(t).parent {
            self.tokens.remove_child(parent, t);
        }

        match &self.beta.get(node).kind {
            BetaNodeKind::Negative { .. } => {
                let jrs = self.tokens.get(t).join_results.clone();
                for njr_id in jrs {
                    let njr = self.njrs.get(njr_id);
                    self.wmes.record_mut(njr.wme).negative_join_results.retain(|&x| x != njr_id);
                    self.njrs.remove(njr_id);
                }
                self.tokens.get_mut(t).join_results.clear();
            }
            BetaNodeKind::Ncc { .. } => {
                let results = self.tokens.get(t).ncc_results.clone();
                for rt in results {
                    if let Some(wme_id) = self.tokens.get(rt).wme {
                        self.wmes.record_mut(wme_id).tokens.retain(|&x| x != rt);
                    }
                    if let Some(p) = self.tokens.get(rt).parent {
                        self.tokens.remove_child(p, rt);
                    }
                }
                self.tokens.get_mut(t).ncc_results.clear();
            }
            BetaNodeKind::NccPartner { ncc_node, .. } => {
                let ncc_node = *ncc_node;
                if let Some(owner) = self.tokens.get(t).owner {
                    self.tokens.get_mut(owner).ncc_results.retain(|&x| x != t);
                    if self.tokens.get(owner).ncc_results.is_empty() {
                        if let Some(ncc_node) = ncc_node {
                            let children = self.beta.get(ncc_node).children.clone();
                            for c in children {
                                self.propagate(c, owner);
                            }
                        }
                    }
                }
                self.tokens.get_mut(t).owner = None;
            }
            _ => {}
        }
    }
}
