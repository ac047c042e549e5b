//! Validation results.

use std::fmt;

use futures::future::BoxFuture;

use crate::constraint::Constraint;

/// What a validator's check returns: an immediate verdict or a future that
/// resolves on acceptance and rejects on failure.
pub enum Check {
    /// Decided synchronously.
    Ready(bool),
    /// Decided later, e.g. by a remote request.
    Deferred(BoxFuture<'static, Result<(), Rejection>>),
}

impl Check {
    /// `Some(verdict)` when the check is already decided.
    pub fn ready(&self) -> Option<bool> {
        match self {
            Self::Ready(verdict) => Some(*verdict),
            Self::Deferred(_) => None,
        }
    }
}

impl From<bool> for Check {
    fn from(verdict: bool) -> Self {
        Self::Ready(verdict)
    }
}

impl fmt::Debug for Check {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ready(verdict) => f.debug_tuple("Ready").field(verdict).finish(),
            Self::Deferred(_) => f.write_str("Deferred(..)"),
        }
    }
}

/// Why a deferred check rejected. The message, when present, is shown
/// instead of the catalog message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Rejection {
    message: Option<String>,
}

impl Rejection {
    /// A rejection without a custom message.
    pub fn new() -> Self {
        Self::default()
    }

    /// A rejection carrying its own message.
    pub fn with_message(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
        }
    }

    /// The custom message.
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }
}

/// A failed constraint.
#[derive(Debug, Clone, PartialEq)]
pub struct Failure {
    /// The constraint that rejected the value.
    pub constraint: Constraint,
    /// Message supplied by the check itself, if any.
    pub message: Option<String>,
}

impl Failure {
    /// Pairs a constraint with an optional message.
    pub fn new(constraint: Constraint, message: Option<String>) -> Self {
        Self { constraint, message }
    }
}

/// Settled result of a validation run: `Ok` or every failing constraint.
pub type Outcome = Result<(), Vec<Failure>>;

/// Result of a validation, including the undecided state.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Validity {
    /// Every constraint accepted the value (or none applied).
    #[default]
    Valid,
    /// At least one constraint rejected the value.
    Invalid(Vec<Failure>),
    /// A deferred check has not settled yet.
    Pending,
}

impl Validity {
    /// `true` for [`Validity::Valid`].
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }

    /// `true` for [`Validity::Invalid`].
    pub fn is_invalid(&self) -> bool {
        matches!(self, Self::Invalid(_))
    }

    /// `true` for [`Validity::Pending`].
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }

    /// Failures of an invalid result; empty otherwise.
    pub fn failures(&self) -> &[Failure] {
        match self {
            Self::Invalid(failures) => failures,
            _ => &[],
        }
    }
}

impl From<Outcome> for Validity {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Ok(()) => Self::Valid,
            Err(failures) => Self::Invalid(failures),
        }
    }
}

impl From<Option<Outcome>> for Validity {
    /// `None` means the run has not settled.
    fn from(outcome: Option<Outcome>) -> Self {
        outcome.map_or(Self::Pending, Self::from)
    }
}
