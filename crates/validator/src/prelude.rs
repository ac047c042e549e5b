//! Prelude module for convenient imports.
//!
//! ```rust,ignore
//! use formguard_validator::prelude::*;
//!
//! let engine = Engine::new();
//! let mut field = engine.bind_field(Element::input("text").handle(), OptionLayer::new())?;
//! field.add_constraint("minlength", 3, None)?;
//! ```

// ============================================================================
// ENGINE AND ERRORS
// ============================================================================

pub use crate::engine::{Engine, EngineBuilder};
pub use crate::error::{ConfigError, ConfigResult, TransportError};

// ============================================================================
// BINDING AND VALIDATION
// ============================================================================

pub use crate::constraint::Constraint;
pub use crate::field::{Field, FieldKey, ValidateOptions};
pub use crate::form::{Form, FormValidateOptions, Interception, SubmitEvent, SyntheticSubmit};
pub use crate::outcome::{Check, Failure, Outcome, Rejection, Validity};
pub use crate::value::{FieldValue, Whitespace};

// ============================================================================
// CONFIGURATION
// ============================================================================

pub use crate::markup::{Container, Control, ControlId, ControlKind, Document, Element, Selector};
pub use crate::options::{Defaults, FocusPolicy, OptionLayer, Options};
pub use crate::registry::{CheckContext, Validator, ValidatorRegistry};
pub use crate::requirement::{Requirement, RequirementKind, RequirementType, Requirements};

// ============================================================================
// EVENTS AND REMOTE CHECKS
// ============================================================================

pub use crate::event::{Event, EventBus, EventKind, ListenerId, Origin, Propagation};
#[cfg(feature = "http")]
pub use crate::remote::HttpTransport;
pub use crate::remote::{AsyncValidator, NoTransport, RemoteTransport, RemoteValidators, Request, Response};
