//! Compiling rule disjuncts into the beta network.
//!
//! Compilation walks a disjunct's conditions left to right, threading two
//! pieces of state: which variables are known and where in the WME-ancestor
//! chain they live, and the running count of WME-bearing levels so far (used
//! to turn a variable reference into an ancestor-hop count). Each step looks
//! its candidate node up in [`crate::node_sharing::NodeSharingRegistry`]
//! before creating one, so two rules with a shared prefix end up routed
//! through the same alpha memories and join nodes.
//!
//! A node found newly necessary is primed against whatever its parent
//! already holds before compilation moves on — this is what makes adding a
//! rule after facts already exist in working memory produce the same
//! eventual conflict set as adding the facts after the rule.

use crate::beta_network::{BetaNode, BetaNodeKind, EqualityTest, JoinKey, NewBinding};
use crate::condition::{Cond, Field, Pattern};
use crate::engine::{CompiledDisjunct, ReteEngine};
use crate::error::{EngineError, EngineResult};
use crate::types::{AlphaId, BetaId, RuleId, Variable, WmeField};
use std::collections::{HashMap, HashSet};

/// Where a known variable's value lives: how many WME-bearing ancestors up
/// the chain, and which field of that WME.
type KnownFields = HashMap<Variable, (usize, WmeField)>;

/// Pure, non-mutating pass over a conjunction (including nested NCC
/// sub-conjunctions) checking the variable-scoping rules the compiler itself
/// relies on. Run over every disjunct before any node is built, so a bad
/// rule never leaves the network partially wired.
pub(crate) fn validate_conjunction(
    rule: &str,
    disjunct: usize,
    conds: &[Cond],
    known: &mut HashSet<Variable>,
) -> EngineResult<()> {
    for cond in conds {
        match cond {
            Cond::Pos(p) => {
                let mut seen_here = HashSet::new();
                for field in [&p.id, &p.attr, &p.value] {
                    if let Field::Var(v) = field {
                        if known.contains(v) {
                            continue;
                        }
                        if !seen_here.insert(v.clone()) {
                            return Err(EngineError::RepeatedVariable {
                                rule: rule.to_string(),
                                disjunct,
                                var: v.clone(),
                            });
                        }
                    }
                }
                for field in [&p.id, &p.attr, &p.value] {
                    if let Field::Var(v) = field {
                        known.insert(v.clone());
                    }
                }
            }
            Cond::Neg(p) => {
                for field in [&p.id, &p.attr, &p.value] {
                    if let Field::Var(v) = field {
                        if !known.contains(v) {
                            return Err(EngineError::UnboundVariable {
                                rule: rule.to_string(),
                                disjunct,
                                var: v.clone(),
                            });
                        }
                    }
                }
            }
            Cond::Ncc(inner) => {
                let mut nested = known.clone();
                validate_conjunction(rule, disjunct, inner, &mut nested)?;
            }
            Cond::Filter { vars, .. } => {
                for v in vars {
                    if !known.contains(v) {
                        return Err(EngineError::UnboundVariable {
                            rule: rule.to_string(),
                            disjunct,
                            var: v.clone(),
                        });
                    }
                }
            }
            Cond::Bind { var, vars, .. } => {
                for v in vars {
                    if !known.contains(v) {
                        return Err(EngineError::UnboundVariable {
                            rule: rule.to_string(),
                            disjunct,
                            var: v.clone(),
                        });
                    }
                }
                known.insert(var.clone());
            }
        }
    }
    Ok(())
}

/// Per-compile bookkeeping threaded through every `compile_*` step:
/// variable scopes plus the trail of nodes/alpha-memories this disjunct
/// touched, so the caller can unwind exactly what was built if the rule is
/// later removed.
struct Compilation {
    known_fields: KnownFields,
    wme_depth: usize,
    nodes: Vec<BetaId>,
    alphas: Vec<AlphaId>,
}

impl ReteEngine {
    pub(crate) fn compile_disjunct(&mut self, rule: &RuleId, disjunct: usize, conds: &[Cond]) -> CompiledDisjunct {
        let mut compilation = Compilation { known_fields: HashMap::new(), wme_depth: 0, nodes: Vec::new(), alphas: Vec::new() };
        let last = self.compile_conjunction(conds, crate::token::ROOT_BETA, &mut compilation);
        let pnode = self.beta.insert(BetaNode {
            parent: Some(last),
            children: Vec::new(),
            kind: BetaNodeKind::PNode { rule_id: rule.clone(), disjunct, items: Vec::new() },
            ref_count: 1,
        });
        self.beta.add_child(last, pnode);
        self.prime(pnode, last);
        compilation.nodes.push(pnode);
        CompiledDisjunct { pnode, nodes: compilation.nodes, alphas: compilation.alphas }
    }

    fn compile_conjunction(&mut self, conds: &[Cond], start: BetaId, c: &mut Compilation) -> BetaId {
        let mut current = start;
        for cond in conds {
            current = match cond {
                Cond::Pos(p) => self.compile_positive(p, current, c),
                Cond::Neg(p) => self.compile_negative(p, current, c),
                Cond::Ncc(inner) => self.compile_ncc(inner, current, c),
                Cond::Filter { vars, predicate } => self.compile_filter(vars.clone(), predicate.clone(), current, c),
                Cond::Bind { var, vars, expr } => self.compile_bind(var.clone(), vars.clone(), expr.clone(), current, c),
            };
        }
        current
    }

    fn pattern_tests(&mut self, pattern: &Pattern, c: &Compilation) -> ((Option<String>, Option<String>, Option<String>), Vec<EqualityTest>, Vec<NewBinding>) {
        let mut alpha_pat = (None, None, None);
        let mut tests = Vec::new();
        let mut new_bindings = Vec::new();
        let slots: [(WmeField, &Field); 3] = [(WmeField::Id, &pattern.id), (WmeField::Attr, &pattern.attr), (WmeField::Value, &pattern.value)];
        for (slot, field) in slots {
            match field {
                Field::Const(v) => match slot {
                    WmeField::Id => alpha_pat.0 = Some(v.clone()),
                    WmeField::Attr => alpha_pat.1 = Some(v.clone()),
                    WmeField::Value => alpha_pat.2 = Some(v.clone()),
                },
                Field::Var(v) => {
                    if let Some(&(hops, bfield)) = c.known_fields.get(v) {
                        tests.push(EqualityTest { field: slot, ancestor_hops: c.wme_depth - hops, ancestor_field: bfield });
                    } else {
                        new_bindings.push(NewBinding { var: v.clone(), field: slot });
                    }
                }
            }
        }
        (alpha_pat, tests, new_bindings)
    }

    fn compile_positive(&mut self, pattern: &Pattern, current: BetaId, c: &mut Compilation) -> BetaId {
        let depth_before = c.wme_depth;
        let (alpha_pat, tests, new_bindings) = self.pattern_tests(pattern, c);
        let (alpha_id, _) = self.alpha.get_or_create(alpha_pat);
        c.alphas.push(alpha_id);

        let key = JoinKey { parent: current, alpha_memory: alpha_id, tests: tests.clone() };
        let mut newly_added = Vec::new();
        let (join_id, created) = if let Some(existing) = self.sharing.find_join(&key) {
            self.beta.get_mut(existing).ref_count += 1;
            if let BetaNodeKind::Join { new_bindings: nb, .. } = &mut self.beta.get_mut(existing).kind {
                for want in &new_bindings {
                    if !nb.contains(want) {
                        nb.push(want.clone());
                        newly_added.push(want.clone());
                    }
                }
            }
            (existing, false)
        } else {
            let id = self.beta.insert(BetaNode {
                parent: Some(current),
                children: Vec::new(),
                kind: BetaNodeKind::Join { alpha_memory: alpha_id, tests: tests.clone(), new_bindings: new_bindings.clone() },
                ref_count: 1,
            });
            self.beta.add_child(current, id);
            self.alpha.add_successor(alpha_id, id);
            self.sharing.register_join(key, id);
            (id, true)
        };
        c.nodes.push(join_id);
        if created {
            self.prime(join_id, current);
        }

        let (bm_id, bm_created) = if let Some(existing) = self.sharing.find_beta_memory(join_id) {
            self.beta.get_mut(existing).ref_count += 1;
            (existing, false)
        } else {
            let id = self.beta.insert(BetaNode {
                parent: Some(join_id),
                children: Vec::new(),
                kind: BetaNodeKind::BetaMemory { items: Vec::new() },
                ref_count: 1,
            });
            self.beta.add_child(join_id, id);
            self.sharing.register_beta_memory(join_id, id);
            (id, true)
        };
        c.nodes.push(bm_id);
        let _ = bm_created;

        // A later disjunct can reuse this join under a different variable
        // name at the same position (`JoinKey` doesn't include names), so its
        // new binding may be missing from tokens already sitting downstream.
        // Their `binding` is frozen at creation; backfill it in place rather
        // than re-priming, which would duplicate tokens instead of fixing them.
        if !newly_added.is_empty() {
            self.rebind_existing_tokens(bm_id, &newly_added);
        }

        for nb in &new_bindings {
            c.known_fields.insert(nb.var.clone(), (depth_before + 1, nb.field));
        }
        c.wme_depth = depth_before + 1;
        bm_id
    }

    /// Patches already-existing tokens at a shared beta memory with bindings
    /// a later disjunct introduced at the same join position. Each token's
    /// own matched WME still has the field; only its `binding` map needs to
    /// catch up, and inserting under the new name can't collide with what's
    /// already there since the compiler forbids rebinding a known variable.
    fn rebind_existing_tokens(&mut self, bm_id: BetaId, added: &[NewBinding]) {
        let items = self.beta.get(bm_id).items().unwrap_or(&[]).to_vec();
        for t in items {
            let Some(wme_id) = self.tokens.get(t).wme else { continue };
            for nb in added {
                let value = self.wmes.get(wme_id).field(nb.field).to_string();
                self.tokens.get_mut(t).binding.insert(nb.var.clone(), value);
            }
        }
    }

    fn compile_negative(&mut self, pattern: &Pattern, current: BetaId, c: &mut Compilation) -> BetaId {
        let (alpha_pat, tests, _new_bindings) = self.pattern_tests(pattern, c);
        let (alpha_id, _) = self.alpha.get_or_create(alpha_pat);
        c.alphas.push(alpha_id);

        let key = JoinKey { parent: current, alpha_memory: alpha_id, tests: tests.clone() };
        let (neg_id, created) = if let Some(existing) = self.sharing.find_negative(&key) {
            self.beta.get_mut(existing).ref_count += 1;
            (existing, false)
        } else {
            let id = self.beta.insert(BetaNode {
                parent: Some(current),
                children: Vec::new(),
                kind: BetaNodeKind::Negative { alpha_memory: alpha_id, tests: tests.clone(), items: Vec::new() },
                ref_count: 1,
            });
            self.beta.add_child(current, id);
            self.alpha.add_successor(alpha_id, id);
            self.sharing.register_negative(key, id);
            (id, true)
        };
        c.nodes.push(neg_id);
        if created {
            self.prime(neg_id, current);
        }
        neg_id
    }

    fn compile_ncc(&mut self, inner: &[Cond], current: BetaId, c: &mut Compilation) -> BetaId {
        let mut nested =
            Compilation { known_fields: c.known_fields.clone(), wme_depth: c.wme_depth, nodes: Vec::new(), alphas: Vec::new() };
        let partner_parent = self.compile_conjunction(inner, current, &mut nested);
        c.nodes.extend(nested.nodes.iter().copied());
        c.alphas.extend(nested.alphas.iter().copied());

        let partner_id = self.beta.insert(BetaNode {
            parent: Some(partner_parent),
            children: Vec::new(),
            kind: BetaNodeKind::NccPartner { ncc_node: None, conjunct_count: inner.len(), items: Vec::new() },
            ref_count: 1,
        });
        self.beta.add_child(partner_parent, partner_id);
        self.prime(partner_id, partner_parent);

        let ncc_id = self.beta.insert(BetaNode {
            parent: Some(current),
            children: Vec::new(),
            kind: BetaNodeKind::Ncc { partner: partner_id, items: Vec::new() },
            ref_count: 1,
        });
        self.beta.add_child(current, ncc_id);
        if let BetaNodeKind::NccPartner { ncc_node, .. } = &mut self.beta.get_mut(partner_id).kind {
            *ncc_node = Some(ncc_id);
        }
        c.nodes.push(partner_id);
        c.nodes.push(ncc_id);

        self.prime(ncc_id, current);
        ncc_id
    }

    fn compile_filter(&mut self, vars: Vec<Variable>, predicate: crate::condition::Predicate, current: BetaId, c: &mut Compilation) -> BetaId {
        let id = self.beta.insert(BetaNode {
            parent: Some(current),
            children: Vec::new(),
            kind: BetaNodeKind::Filter { vars, predicate, items: Vec::new() },
            ref_count: 1,
        });
        self.beta.add_child(current, id);
        self.prime(id, current);
        c.nodes.push(id);
        id
    }

    fn compile_bind(
        &mut self,
        var: Variable,
        vars: Vec<Variable>,
        expr: crate::condition::BindExpr,
        current: BetaId,
        c: &mut Compilation,
    ) -> BetaId {
        let id = self.beta.insert(BetaNode {
            parent: Some(current),
            children: Vec::new(),
            kind: BetaNodeKind::Bind { var: var.clone(), vars, expr, items: Vec::new() },
            ref_count: 1,
        });
        self.beta.add_child(current, id);
        self.prime(id, current);
        c.nodes.push(id);
        id
    }
}
