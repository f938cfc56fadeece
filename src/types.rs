//! Core data model: working-memory elements, variables, and bindings.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Identifier for a compiled rule, assigned by the caller of [`crate::engine::ReteEngine::add_rule`].
pub type RuleId = String;

/// A token-chain symbol distinguished by a leading `$`, e.g. `$x`.
pub type Variable = String;

/// A mapping from variable to ground value, accumulated along a token chain.
pub type Binding = HashMap<Variable, String>;

/// Opaque handles into the engine's internal arenas. Stable for the lifetime
/// of the node/token they name; never reused after deletion.
pub type AlphaId = usize;
pub type BetaId = usize;
pub type TokenId = usize;
pub type NjrId = usize;
pub type WmeId = usize;

/// Returns true if `s` is a variable reference rather than a ground value.
pub fn is_var(s: &str) -> bool {
    s.starts_with('$')
}

/// One of the three fields of a [`Wme`], used to address equality tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WmeField {
    Id,
    Attr,
    Value,
}

/// An immutable working-memory element: a ground triple `⟨id, attr, value⟩`.
///
/// Equality and hashing are structural on the triple, matching the
/// "structural identity" rule used by alpha memories to dedupe admissions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Wme {
    pub id: String,
    pub attr: String,
    pub value: String,
}

impl Wme {
    pub fn new(id: impl Into<String>, attr: impl Into<String>, value: impl Into<String>) -> Self {
        Self { id: id.into(), attr: attr.into(), value: value.into() }
    }

    pub fn field(&self, which: WmeField) -> &str {
        match which {
            WmeField::Id => &self.id,
            WmeField::Attr => &self.attr,
            WmeField::Value => &self.value,
        }
    }

    /// Returns the name of whichever field is a variable and is not `$...`-free,
    /// or `None` if every field is a ground value.
    pub(crate) fn first_variable_field(&self) -> Option<&'static str> {
        if is_var(&self.id) {
            Some("id")
        } else if is_var(&self.attr) {
            Some("attr")
        } else if is_var(&self.value) {
            Some("value")
        } else {
            None
        }
    }
}

impl std::fmt::Display for Wme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({} ^{} {})", self.id, self.attr, self.value)
    }
}
