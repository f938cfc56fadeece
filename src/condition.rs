//! The condition surface consumed by the compiler.
//!
//! These types are the boundary the engine shares with the (out-of-scope)
//! fact/condition DSL: by the time a [`Rule`] reaches [`crate::engine::ReteEngine::add_rule`]
//! its pattern has already been normalised to disjunctive normal form, so
//! `disjuncts` is a flat `OR` of `AND`s. Negation has likewise already been
//! pushed down to individual patterns or nested conjunctions by that point.

use crate::error::{EngineError, EngineResult};
use crate::types::{Binding, Variable, is_var};
use std::rc::Rc;

/// One field of a [`Pattern`]: either a ground constant or a variable reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Field {
    Const(String),
    Var(Variable),
}

impl Field {
    pub fn var(name: impl Into<String>) -> EngineResult<Field> {
        let name = name.into();
        debug_assert!(is_var(&name), "variable field must start with $: {name}");
        Ok(Field::Var(name))
    }

    pub fn constant(value: impl Into<String>) -> Field {
        Field::Const(value.into())
    }
}

/// A positive or negated pattern: a triple of constants and/or variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    pub id: Field,
    pub attr: Field,
    pub value: Field,
}

impl Pattern {
    pub fn new(id: Field, attr: Field, value: Field) -> Self {
        Self { id, attr, value }
    }
}

/// A predicate over a token's full binding, used by [`Cond::Filter`].
pub type Predicate = Rc<dyn Fn(&Binding) -> bool>;

/// An expression computing a new binding from a token's full binding, used by [`Cond::Bind`].
pub type BindExpr = Rc<dyn Fn(&Binding) -> String>;

/// One element of a compiled conjunction.
#[derive(Clone)]
pub enum Cond {
    /// A positive pattern; may introduce new variable bindings.
    Pos(Pattern),
    /// `NOT` of a single positive pattern; may only reference already-bound variables.
    Neg(Pattern),
    /// `NOT(AND(...))` — a negated conjunctive condition over a nested sub-conjunction.
    Ncc(Vec<Cond>),
    /// An opaque predicate over the declared free variables.
    Filter { vars: Vec<Variable>, predicate: Predicate },
    /// Computes `var` from `vars` and binds it for the remainder of the conjunction.
    Bind { var: Variable, vars: Vec<Variable>, expr: BindExpr },
}

impl std::fmt::Debug for Cond {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Cond::Pos(p) => f.debug_tuple("Pos").field(p).finish(),
            Cond::Neg(p) => f.debug_tuple("Neg").field(p).finish(),
            Cond::Ncc(inner) => f.debug_tuple("Ncc").field(inner).finish(),
            Cond::Filter { vars, .. } => f.debug_struct("Filter").field("vars", vars).finish(),
            Cond::Bind { var, vars, .. } => {
                f.debug_struct("Bind").field("var", var).field("vars", vars).finish()
            }
        }
    }
}

/// A production's callable body: `fire(binding) -> effect`.
///
/// The decorator that binds a user function to a rule body (argument
/// extraction, keyword dispatch, etc.) lives outside the engine; this trait
/// is the minimal seam the core needs.
pub trait Production {
    fn fire(&self, binding: &Binding) -> EngineResult<()>;
}

impl<F> Production for F
where
    F: Fn(&Binding) -> EngineResult<()>,
{
    fn fire(&self, binding: &Binding) -> EngineResult<()> {
        self(binding)
    }
}

/// A production rule: an already-DNF set of disjuncts, each an ordered
/// conjunction of conditions, plus the production fired for any satisfying token.
#[derive(Clone)]
pub struct Rule {
    pub id: RuleIdRef,
    pub disjuncts: Vec<Vec<Cond>>,
    pub production: Rc<dyn Production>,
}

/// Re-exported alias kept local to this module to avoid a cyclic `use`.
pub type RuleIdRef = crate::types::RuleId;

impl Rule {
    pub fn new(
        id: impl Into<String>,
        disjuncts: Vec<Vec<Cond>>,
        production: impl Production + 'static,
    ) -> Self {
        Self { id: id.into(), disjuncts, production: Rc::new(production) }
    }

    pub(crate) fn validate_nonempty(&self) -> EngineResult<()> {
        for (i, disjunct) in self.disjuncts.iter().enumerate() {
            if disjunct.is_empty() {
                return Err(EngineError::EmptyDisjunct { rule: self.id.clone(), disjunct: i });
            }
        }
        Ok(())
    }
}
