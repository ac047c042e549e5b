//! # formguard-validator
//!
//! Declarative constraint validation for form fields.
//!
//! Fields are discovered from a [`Container`](markup::Container) of
//! [`Control`](markup::Control)s, constraints are read from namespaced
//! attributes (`data-parsley-minlength="3"`) or added in code, grouped by
//! priority and checked synchronously or through remote requests.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use formguard_validator::prelude::*;
//!
//! let doc = Arc::new(Document::new());
//! doc.append(Element::input("email").with_attr("required", "").with_attr("name", "mail"));
//!
//! let mut form = Engine::new().bind_form(doc.clone(), OptionLayer::new())?;
//! let outcome = form.when_validate(FormValidateOptions::default())?.await;
//! assert!(outcome.is_err());
//! ```
//!
//! ## Layout
//!
//! - [`registry`]: validators, requirement schemas, message catalog, built-ins
//! - [`requirement`]: typed requirement parsing
//! - [`options`]: layered option resolution
//! - [`field`] / [`form`]: binding, discovery, grouped validation
//! - [`remote`]: async strategies, request deduplication, HTTP transport
//! - [`event`]: lifecycle events with cancellable propagation
//!
//! ## Features
//!
//! - `http` (default): [`remote::HttpTransport`] backed by `reqwest`.

pub mod constraint;
pub mod engine;
pub mod error;
pub mod event;
pub mod field;
pub mod form;
pub mod markup;
pub mod options;
pub mod outcome;
pub mod prelude;
pub mod registry;
pub mod remote;
pub mod requirement;
pub mod value;

pub use engine::{Engine, EngineBuilder};
pub use error::{ConfigError, ConfigResult, TransportError};
pub use outcome::{Failure, Outcome, Validity};
