//! Configuration and transport errors.
//!
//! Everything in here is a programmer or markup mistake: an unknown
//! validator, a malformed requirement literal, a reference that resolves to
//! nothing. These are returned at parse/bind time and are never folded into
//! a validation result. A value that merely fails its constraints is *not*
//! an error; see [`Validity`](crate::outcome::Validity).

use thiserror::Error;

/// Errors raised while configuring fields, forms and validators.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// No validator is registered under this name.
    #[error("there is no validator named `{0}`")]
    UnknownValidator(String),

    /// A tuple requirement was not written as a bracketed list.
    #[error("requirement is not an array: \"{0}\"")]
    NotAnArray(String),

    /// A tuple requirement had the wrong number of elements.
    #[error("requirement has {found} values when {expected} are needed")]
    ArityMismatch {
        /// Number of elements supplied.
        found: usize,
        /// Number of elements the validator declares.
        expected: usize,
    },

    /// An `integer` requirement could not be parsed.
    #[error("requirement is not an integer: \"{0}\"")]
    NotAnInteger(String),

    /// A `number` requirement could not be parsed.
    #[error("requirement is not a number: \"{0}\"")]
    NotANumber(String),

    /// A `regexp` requirement failed to compile.
    #[error("invalid pattern `{pattern}`: {reason}")]
    InvalidPattern {
        /// The raw pattern as written.
        pattern: String,
        /// Compiler diagnostic.
        reason: String,
    },

    /// A `reference` requirement matched no control.
    #[error("no such reference: \"{0}\"")]
    NoSuchReference(String),

    /// A typed (non-string) requirement does not fit the declared type.
    #[error("requirement `{value}` cannot be used as {expected}")]
    RequirementType {
        /// The declared requirement type.
        expected: &'static str,
        /// The offending value, rendered.
        value: String,
    },

    /// The validator cannot check an array of values.
    #[error("validator `{0}` does not handle multiple values")]
    MultipleUnsupported(String),

    /// The validator only checks arrays of values.
    #[error("validator `{0}` only handles multiple values")]
    SingleUnsupported(String),

    /// `set_locale` was called for a locale with no catalog.
    #[error("{0} is not available in the catalog")]
    MissingLocale(String),

    /// The `type` validator was asked for a type it does not know.
    #[error("validator type `{0}` is not supported")]
    UnsupportedType(String),

    /// A radio, checkbox or multi-select control has neither a name nor a
    /// `multiple` option.
    #[error(
        "a radio, a checkbox and a multiple select input must have either a name or a multiple option (control `{0}`)"
    )]
    MissingGroupIdentity(String),

    /// A remote constraint named an async strategy that does not exist.
    #[error("calling an undefined async validator: `{0}`")]
    UnknownAsyncValidator(String),

    /// A selector in `inputs`/`excluded` could not be understood.
    #[error("unsupported selector `{0}`")]
    InvalidSelector(String),
}

/// Result alias for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors raised by a [`RemoteTransport`](crate::remote::RemoteTransport).
///
/// A transport error never escapes validation: the remote constraint is
/// simply rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum TransportError {
    /// The request could not be built or sent, or the body not read.
    #[error("request to {url} failed: {reason}")]
    Request {
        /// Target URL.
        url: String,
        /// Underlying error, rendered.
        reason: String,
    },

    /// The URL does not parse as an absolute URL.
    #[error("invalid request url `{0}`")]
    InvalidUrl(String),

    /// No transport is configured.
    #[error("no remote transport is configured")]
    Unavailable,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_offending_input() {
        assert_eq!(
            ConfigError::NotAnArray("3, 7".into()).to_string(),
            "requirement is not an array: \"3, 7\""
        );
        assert_eq!(
            ConfigError::ArityMismatch {
                found: 3,
                expected: 2
            }
            .to_string(),
            "requirement has 3 values when 2 are needed"
        );
        assert_eq!(
            ConfigError::MissingLocale("fr".into()).to_string(),
            "fr is not available in the catalog"
        );
        assert_eq!(
            TransportError::InvalidUrl("/check".into()).to_string(),
            "invalid request url `/check`"
        );
    }
}
