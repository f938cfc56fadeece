#![allow(missing_docs)]
//! # rete-core — a forward-chaining production-rule engine
//!
//! ## Overview
//!
//! `rete-core` matches triples of strings ("working-memory elements", or
//! WMEs) against rules compiled into a Rete network, incrementally: asserting
//! or retracting one WME touches only the parts of the network that could
//! possibly be affected, rather than re-evaluating every rule from scratch.
//!
//! ## Quick Start
//!
//! ```rust
//! use rete_core::{ReteEngine, Rule, Cond, Pattern, Field};
//!
//! let mut engine = ReteEngine::new();
//! let rule = Rule::new(
//!     "alice-is-adult",
//!     vec![vec![Cond::Pos(Pattern::new(
//!         Field::var("$who").unwrap(),
//!         Field::constant("age"),
//!         Field::var("$age").unwrap(),
//!     ))]],
//!     |_binding| Ok(()),
//! );
//! engine.add_rule(rule).unwrap();
//! engine.assert(rete_core::Wme::new("alice", "age", "34")).unwrap();
//! assert_eq!(engine.matches("alice-is-adult").len(), 1);
//! ```
//!
//! ## Architecture
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`engine`] | Owns every arena; the public `assert`/`retract`/`add_rule`/`run` surface |
//! | [`rete_network`] | Compiles rule disjuncts into the beta network, with structural sharing |
//! | [`rete_nodes`] | Node activation and the token-deletion invariant |
//! | [`alpha_memory`] | Constant-test indexing of working memory |
//! | [`beta_network`] | Beta network node kinds and the node arena |
//! | [`node_sharing`] | Lookup tables the compiler uses to reuse nodes across rules |
//! | [`token`] | Token/WME arenas and negative-join-result bookkeeping |
//! | [`condition`] | The condition surface (`Rule`, `Cond`, `Pattern`) the compiler consumes |
//! | [`types`] | Core data model: WMEs, variables, bindings |
//! | [`error`] | The engine's error taxonomy |

/// Constant-test indexing of working memory.
pub mod alpha_memory;
/// Beta network node kinds and the node arena.
pub mod beta_network;
/// The condition surface the compiler consumes: `Rule`, `Cond`, `Pattern`.
pub mod condition;
/// Core rules engine: arenas, `assert`/`retract`/`add_rule`/`run`.
pub mod engine;
/// The engine's error taxonomy.
pub mod error;
/// Structural sharing lookup tables used while compiling rules.
pub mod node_sharing;
/// Compiles rule disjuncts into the beta network.
pub mod rete_network;
/// Beta node activation and the token-deletion invariant.
pub mod rete_nodes;
/// Token/WME arenas and negative-join-result bookkeeping.
pub mod token;
/// Core data model: working-memory elements, variables, bindings.
pub mod types;

pub use condition::{BindExpr, Cond, Field, Pattern, Predicate, Production, Rule};
pub use engine::ReteEngine;
pub use error::{EngineError, EngineResult};
pub use types::{Binding, RuleId, Variable, Wme, WmeField};
