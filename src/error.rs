//! Error handling for the RETE engine.
//!
//! Mirrors the error taxonomy laid out in the engine design: validation
//! failures are reported at the call that caused them and never leave the
//! network partially mutated.

use thiserror::Error;

/// Errors produced by [`crate::engine::ReteEngine`] operations.
#[derive(Error, Debug, Clone)]
pub enum EngineError {
    /// A WME field started with `$`, which is reserved for variables.
    #[error("invalid WME ({id}, ^{attr}, {value}): field `{field}` must not start with `$`")]
    InvalidWme { id: String, attr: String, value: String, field: &'static str },

    /// A rule disjunct referenced a variable no earlier positive condition bound.
    #[error(
        "ill-formed condition in rule `{rule}` disjunct {disjunct}: variable `{var}` is never bound by an earlier positive condition"
    )]
    UnboundVariable { rule: String, disjunct: usize, var: String },

    /// The same variable was introduced twice within a single pattern.
    #[error(
        "ill-formed condition in rule `{rule}` disjunct {disjunct}: variable `{var}` is bound more than once in the same pattern"
    )]
    RepeatedVariable { rule: String, disjunct: usize, var: String },

    /// A rule disjunct had no conditions at all.
    #[error("rule `{rule}` disjunct {disjunct} has no conditions")]
    EmptyDisjunct { rule: String, disjunct: usize },

    /// A production's body raised while firing.
    #[error("production for rule `{rule}` failed to fire: {message}")]
    Firing { rule: String, message: String },

    /// `remove_rule` was called with an identifier the engine has never seen.
    #[error("no such rule: `{0}`")]
    UnknownRule(String),
}

/// Lets a production body return `anyhow::Error` from ordinary `?` usage;
/// the message is preserved, tagged against whichever rule is firing when
/// the conversion happens to be ambiguous without more context.
impl From<anyhow::Error> for EngineError {
    fn from(err: anyhow::Error) -> Self {
        EngineError::Firing { rule: "<unknown>".to_string(), message: err.to_string() }
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
