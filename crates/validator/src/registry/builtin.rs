//! Built-in validators and their English messages.

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::Regex;
use url::{Host, Url};

use super::{CheckContext, Validator, ValidatorRegistry};
use crate::error::ConfigError;
use crate::outcome::Check;
use crate::requirement::{Requirement, RequirementKind, RequirementType, Requirements};

static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^[\w!#$%&'*+/=?^`{|}~-]+(?:\.[\w!#$%&'*+/=?^`{|}~-]+)*@(?:[\p{L}\p{N}](?:[\p{L}\p{N}_~.-]*[\p{L}\p{N}])?\.)+\p{L}(?:[\p{L}\p{N}_~-]*\p{L})?$",
    )
    .unwrap()
});
static NUMBER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)^-?([0-9]*\.)?[0-9]+(e[-+]?[0-9]+)?$").unwrap());
static INTEGER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^-?[0-9]+$").unwrap());
static DIGITS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[0-9]+$").unwrap());
static ALPHANUM: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_]+$").unwrap());
static DECIMALS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?:\.(\d+))?(?:[eE]([+-]?\d+))?$").unwrap());

/// Sub-types understood by the `type` validator.
pub const TYPES: &[&str] = &["email", "url", "number", "integer", "digits", "alphanum", "range"];

const TYPE_MESSAGES: &[(&str, &str)] = &[
    ("type.email", "This value should be a valid email."),
    ("type.url", "This value should be a valid url."),
    ("type.number", "This value should be a valid number."),
    ("type.integer", "This value should be a valid integer."),
    ("type.digits", "This value should be digits."),
    ("type.alphanum", "This value should be alphanumeric."),
    ("type.range", "This value should be a valid number."),
];

/// Registers every built-in validator except `remote`, which needs a
/// transport and is added by the engine.
pub fn register_builtins(registry: &ValidatorRegistry) {
    registry.add_messages("en", TYPE_MESSAGES.iter().copied());

    registry.add_validator(
        Validator::new("notblank", RequirementKind::String)
            .string(|value, _, _| Check::from(has_content(value)))
            .message("en", "This value should not be blank."),
    );

    registry.add_validator(
        Validator::new("required", RequirementKind::Boolean)
            .priority(512)
            .string(|value, req, _| Check::from(!enabled(req) || has_content(value)))
            .multiple(|values, req, _| Check::from(!enabled(req) || !values.is_empty()))
            .message("en", "This value is required."),
    );

    registry.add_validator(
        Validator::new(
            "type",
            RequirementType::keyed(
                RequirementKind::String,
                [("step", RequirementKind::String), ("base", RequirementKind::Number)],
            ),
        )
        .priority(256)
        .guard(|req| match req.first().and_then(Requirement::as_str) {
            Some(t) if TYPES.contains(&t) => Ok(()),
            other => Err(ConfigError::UnsupportedType(other.unwrap_or_default().to_owned())),
        })
        .string(|value, req, _| Check::from(check_type(value, req))),
    );

    registry.add_validator(
        Validator::new("pattern", RequirementKind::Regexp)
            .priority(64)
            .string(|value, req, _| {
                Check::from(value.is_empty() || req.first().and_then(Requirement::as_pattern).is_some_and(|p| p.is_match(value)))
            })
            .message("en", "This value seems to be invalid."),
    );

    registry.add_validator(
        Validator::new("minlength", RequirementKind::Integer)
            .priority(30)
            .string(|value, req, _| Check::from(char_len(value) >= int(req, 0)))
            .message("en", "This value is too short. It should have %s characters or more."),
    );
    registry.add_validator(
        Validator::new("maxlength", RequirementKind::Integer)
            .priority(30)
            .string(|value, req, _| Check::from(char_len(value) <= int(req, 0)))
            .message("en", "This value is too long. It should have %s characters or fewer."),
    );
    registry.add_validator(
        Validator::new("length", int_pair())
            .priority(30)
            .string(|value, req, _| {
                let len = char_len(value);
                Check::from(len >= int(req, 0) && len <= int(req, 1))
            })
            .message("en", "This value length is invalid. It should be between %s and %s characters long."),
    );

    registry.add_validator(
        Validator::new("mincheck", RequirementKind::Integer)
            .priority(30)
            .multiple(|values, req, _| Check::from(count(values) >= int(req, 0)))
            .message("en", "You must select at least %s choices."),
    );
    registry.add_validator(
        Validator::new("maxcheck", RequirementKind::Integer)
            .priority(30)
            .multiple(|values, req, _| Check::from(count(values) <= int(req, 0)))
            .message("en", "You must select %s choices or fewer."),
    );
    registry.add_validator(
        Validator::new("check", int_pair())
            .priority(30)
            .multiple(|values, req, _| {
                let n = count(values);
                Check::from(n >= int(req, 0) && n <= int(req, 1))
            })
            .message("en", "You must select between %s and %s choices."),
    );

    registry.add_validator(
        Validator::new("min", RequirementKind::Number)
            .priority(30)
            .number(|value, req, _| Check::from(num(req, 0).is_some_and(|min| value >= min)))
            .message("en", "This value should be greater than or equal to %s."),
    );
    registry.add_validator(
        Validator::new("max", RequirementKind::Number)
            .priority(30)
            .number(|value, req, _| Check::from(num(req, 0).is_some_and(|max| value <= max)))
            .message("en", "This value should be lower than or equal to %s."),
    );
    registry.add_validator(
        Validator::new(
            "range",
            RequirementType::tuple([RequirementKind::Number, RequirementKind::Number]),
        )
        .priority(30)
        .number(|value, req, _| {
            Check::from(num(req, 0).is_some_and(|min| value >= min) && num(req, 1).is_some_and(|max| value <= max))
        })
        .message("en", "This value should be between %s and %s."),
    );

    registry.add_validator(
        Validator::new("equalto", RequirementKind::Reference)
            .priority(256)
            .string(|value, req, _: &CheckContext<'_>| {
                Check::from(
                    req.first()
                        .and_then(Requirement::as_reference)
                        .is_some_and(|r| r.value().to_string() == value),
                )
            })
            .message("en", "This value should be the same."),
    );
}

fn int_pair() -> RequirementType {
    RequirementType::tuple([RequirementKind::Integer, RequirementKind::Integer])
}

fn has_content(value: &str) -> bool {
    value.chars().any(|c| !c.is_whitespace())
}

fn enabled(req: &Requirements) -> bool {
    req.first().and_then(Requirement::as_bool).unwrap_or(true)
}

fn int(req: &Requirements, index: usize) -> i64 {
    req.get(index).and_then(Requirement::as_i64).unwrap_or(0)
}

fn num(req: &Requirements, index: usize) -> Option<f64> {
    req.get(index).and_then(Requirement::as_f64)
}

fn char_len(value: &str) -> i64 {
    i64::try_from(value.chars().count()).unwrap_or(i64::MAX)
}

fn count(values: &[String]) -> i64 {
    i64::try_from(values.len()).unwrap_or(i64::MAX)
}

fn check_type(value: &str, req: &Requirements) -> bool {
    if value.is_empty() {
        return true;
    }
    let Some(kind) = req.first().and_then(Requirement::as_str) else {
        return false;
    };
    match kind {
        "email" => EMAIL.is_match(value),
        "url" => is_url(value),
        "integer" => INTEGER.is_match(value),
        "digits" => DIGITS.is_match(value),
        "alphanum" => ALPHANUM.is_match(value),
        "range" => NUMBER.is_match(value),
        "number" => {
            let step = req.extra("step").and_then(Requirement::as_str).unwrap_or("any");
            let base = req.extra("base").and_then(Requirement::as_f64).unwrap_or(0.0);
            NUMBER.is_match(value) && on_step(value, step, base)
        }
        _ => false,
    }
}

/// `true` when `value` lies on the grid `base + k * step`.
fn on_step(value: &str, step: &str, base: f64) -> bool {
    if step.eq_ignore_ascii_case("any") {
        return true;
    }
    let (Ok(number), Ok(step_size)) = (value.parse::<f64>(), step.trim().parse::<f64>()) else {
        return false;
    };
    let decimals = decimal_places(step.trim()).max(decimal_places(&base.to_string()));
    if decimal_places(&number.to_string()) > decimals {
        return false;
    }
    let scale = 10f64.powi(i32::try_from(decimals).unwrap_or(i32::MAX));
    let to_int = |f: f64| (f * scale).round();
    let grid = to_int(step_size);
    grid != 0.0 && (to_int(number) - to_int(base)) % grid == 0.0
}

fn decimal_places(number: &str) -> u32 {
    let Some(captures) = DECIMALS.captures(number) else {
        return 0;
    };
    let fraction = captures.get(1).map_or(0, |m| m.as_str().len());
    let exponent = captures
        .get(2)
        .and_then(|m| m.as_str().parse::<i64>().ok())
        .unwrap_or(0);
    u32::try_from((i64::try_from(fraction).unwrap_or(0) - exponent).max(0)).unwrap_or(0)
}

fn is_url(value: &str) -> bool {
    if value.chars().any(char::is_whitespace) {
        return false;
    }
    let candidate = if value.contains("://") {
        Cow::Borrowed(value)
    } else {
        Cow::Owned(format!("http://{value}"))
    };
    let Ok(url) = Url::parse(&candidate) else {
        return false;
    };
    if !matches!(url.scheme(), "http" | "https" | "ftp") {
        return false;
    }
    match url.host() {
        Some(Host::Domain(domain)) => domain.rsplit_once('.').is_some_and(|(head, tld)| {
            !head.is_empty() && tld.len() >= 2 && tld.chars().all(char::is_alphabetic)
        }),
        Some(Host::Ipv4(_) | Host::Ipv6(_)) => true,
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::requirement::Detached;
    use crate::value::FieldValue;
    use rstest::rstest;
    use serde_json::{Value, json};

    fn verdict(name: &str, requirement: Value, value: FieldValue) -> bool {
        let registry = ValidatorRegistry::with_builtins();
        let req = registry.parse_requirements(name, &requirement, &Detached).unwrap();
        registry
            .validate(name, &value, &req, &CheckContext::default())
            .unwrap()
            .ready()
            .unwrap()
    }

    #[rstest]
    #[case("email", "a.b+tag@example.co.uk", true)]
    #[case("email", "jöhn@exämple.de", true)]
    #[case("email", "not-an-email", false)]
    #[case("email", "a@b", false)]
    #[case("url", "example.com/path?q=1", true)]
    #[case("url", "https://sub.example.org", true)]
    #[case("url", "ftp://192.168.0.1/file", true)]
    #[case("url", "gopher://example.com", false)]
    #[case("url", "no spaces.com", false)]
    #[case("url", "localhost", false)]
    #[case("number", "-1.5e3", true)]
    #[case("number", "1.2.3", false)]
    #[case("integer", "-12", true)]
    #[case("integer", "1.0", false)]
    #[case("digits", "0123", true)]
    #[case("digits", "-1", false)]
    #[case("alphanum", "abc_123", true)]
    #[case("alphanum", "abc-123", false)]
    #[case("range", "12", true)]
    #[case("email", "", true)]
    fn type_checks(#[case] kind: &str, #[case] value: &str, #[case] expected: bool) {
        assert_eq!(verdict("type", json!(kind), FieldValue::from(value)), expected, "{kind}: {value}");
    }

    #[rstest]
    #[case("1", "3", true)]
    #[case("1", "2.5", false)]
    #[case("0.5", "2.5", true)]
    #[case("0.01", "0.07", true)]
    #[case("0.01", "0.071", false)]
    #[case("2", "4", true)]
    #[case("2", "5", false)]
    #[case("any", "5.123", true)]
    fn number_steps(#[case] step: &str, #[case] value: &str, #[case] expected: bool) {
        let requirement = json!(["number", {"step": step}]);
        assert_eq!(verdict("type", requirement, FieldValue::from(value)), expected, "step {step}: {value}");
    }

    #[test]
    fn number_steps_are_relative_to_the_base() {
        let requirement = json!(["number", {"step": "2", "base": 1}]);
        assert!(verdict("type", requirement.clone(), FieldValue::from("5")));
        assert!(!verdict("type", requirement, FieldValue::from("4")));
    }

    #[test]
    fn unknown_types_are_rejected_at_parse_time() {
        let registry = ValidatorRegistry::with_builtins();
        assert_eq!(
            registry.parse_requirements("type", &json!("date"), &Detached),
            Err(ConfigError::UnsupportedType("date".into()))
        );
    }

    #[rstest]
    #[case("required", json!(true), FieldValue::from("  "), false)]
    #[case("required", json!(true), FieldValue::from(" x "), true)]
    #[case("required", json!(false), FieldValue::from(""), true)]
    #[case("required", json!(true), FieldValue::Multiple(vec![]), false)]
    #[case("notblank", json!(""), FieldValue::from("\t"), false)]
    #[case("pattern", json!("\\d{3}"), FieldValue::from("123"), true)]
    #[case("pattern", json!("\\d{3}"), FieldValue::from("1234"), false)]
    #[case("pattern", json!("/^a/i"), FieldValue::from("Abc"), true)]
    #[case("minlength", json!(3), FieldValue::from("héé"), true)]
    #[case("maxlength", json!("2"), FieldValue::from("abc"), false)]
    #[case("length", json!("[2, 4]"), FieldValue::from("abcd"), true)]
    #[case("length", json!([2, 4]), FieldValue::from("a"), false)]
    #[case("mincheck", json!(2), FieldValue::Multiple(vec!["a".into()]), false)]
    #[case("maxcheck", json!(2), FieldValue::Multiple(vec!["a".into()]), true)]
    #[case("check", json!("[1, 2]"), FieldValue::Multiple(vec!["a".into(), "b".into(), "c".into()]), false)]
    #[case("min", json!(10), FieldValue::from("9.5"), false)]
    #[case("max", json!("10"), FieldValue::from("9.5"), true)]
    #[case("range", json!("[1, 5]"), FieldValue::from("5"), true)]
    #[case("range", json!("[1, 5]"), FieldValue::from("abc"), false)]
    #[case("min", json!(10), FieldValue::from(""), true)]
    fn builtin_checks(#[case] name: &str, #[case] requirement: Value, #[case] value: FieldValue, #[case] expected: bool) {
        assert_eq!(verdict(name, requirement, value), expected, "{name}");
    }

    #[test]
    fn builtin_priorities() {
        let registry = ValidatorRegistry::with_builtins();
        let priority = |name: &str| registry.get(name).map(|v| v.default_priority());
        assert_eq!(priority("required"), Some(512));
        assert_eq!(priority("type"), Some(256));
        assert_eq!(priority("equalto"), Some(256));
        assert_eq!(priority("pattern"), Some(64));
        assert_eq!(priority("length"), Some(30));
        assert_eq!(priority("notblank"), Some(2));
    }

    #[test]
    fn decimal_places_account_for_exponents() {
        assert_eq!(decimal_places("1.25"), 2);
        assert_eq!(decimal_places("1.25e1"), 1);
        assert_eq!(decimal_places("5e-3"), 3);
        assert_eq!(decimal_places("7"), 0);
    }
}
