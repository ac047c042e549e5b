//! Radio groups, checkbox groups and multi-selects.
//!
//! Radio buttons and checkboxes sharing an identity form one field. The
//! identity is the `multiple` option, else the `name`, else the `id`
//! attribute, with selector metacharacters removed. It is written back to
//! every member as the namespaced `multiple` attribute so later discovery
//! passes land on the same field.

use std::sync::Arc;

use crate::error::{ConfigError, ConfigResult};
use crate::markup::{Control, ControlKind};
use crate::options::Options;
use crate::value::FieldValue;

const STRIPPED: &[char] = &[':', '.', '[', ']', '{', '}', '$'];

/// Resolves the group identity of a grouped control.
pub(crate) fn group_identity(control: &dyn Control, options: &Options) -> ConfigResult<String> {
    let explicit = options.string("multiple").filter(|m| !m.is_empty());
    let identity = match control.kind() {
        ControlKind::MultiSelect => explicit.unwrap_or_else(|| control.id().to_string()),
        _ => explicit
            .or_else(|| control.attribute("name").filter(|n| !n.is_empty()))
            .or_else(|| control.attribute("id").filter(|i| !i.is_empty()))
            .ok_or_else(|| ConfigError::MissingGroupIdentity(control.id().to_string()))?,
    };
    Ok(identity.replace(STRIPPED, ""))
}

/// Value of a radio or checkbox group.
pub(crate) fn group_value(kind: ControlKind, members: &[Arc<dyn Control>]) -> FieldValue {
    let mut checked = members.iter().filter(|m| m.is_attached() && m.is_checked());
    match kind {
        ControlKind::Radio => checked
            .next()
            .map_or_else(FieldValue::default, |m| FieldValue::Single(render(m.value()))),
        _ => FieldValue::Multiple(checked.map(|m| render(m.value())).collect()),
    }
}

fn render(value: FieldValue) -> String {
    match value {
        FieldValue::Single(s) => s,
        multiple => multiple.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markup::Element;
    use crate::options::OptionLayer;
    use rstest::rstest;

    fn options(layer: OptionLayer) -> Options {
        Options::new([Arc::new(layer)])
    }

    #[rstest]
    #[case(Some("colour.choice"), Some("pick"), "colourchoice")]
    #[case(None, Some("pick[]"), "pick")]
    #[case(None, None, "fallback")]
    fn identity_prefers_the_multiple_option(
        #[case] multiple: Option<&str>,
        #[case] name: Option<&str>,
        #[case] expected: &str,
    ) {
        let mut radio = Element::input("radio").with_attr("id", "fallback");
        if let Some(name) = name {
            radio = radio.with_attr("name", name);
        }
        let layer = multiple.map_or_else(OptionLayer::new, |m| OptionLayer::new().with("multiple", m));
        assert_eq!(group_identity(&radio, &options(layer)).unwrap(), expected);
    }

    #[test]
    fn anonymous_checkboxes_have_no_identity() {
        let checkbox = Element::input("checkbox");
        assert!(matches!(
            group_identity(&checkbox, &Options::default()),
            Err(ConfigError::MissingGroupIdentity(_))
        ));
    }

    #[test]
    fn multi_selects_fall_back_to_their_control_id() {
        let select = Element::select(true);
        assert_eq!(
            group_identity(&select, &Options::default()).unwrap(),
            select.id().to_string()
        );
    }

    #[test]
    fn radio_and_checkbox_values() {
        let a = Element::input("radio").with_value("a");
        let b = Element::input("radio").with_value("b");
        let radios = vec![a.handle(), b.handle()];
        assert_eq!(group_value(ControlKind::Radio, &radios), FieldValue::from(""));
        b.set_checked(true);
        assert_eq!(group_value(ControlKind::Radio, &radios), FieldValue::from("b"));

        let x = Element::input("checkbox").with_value("x").with_checked(true);
        let y = Element::input("checkbox").with_value("y").with_checked(true);
        let boxes = vec![x.handle(), y.handle()];
        assert_eq!(
            group_value(ControlKind::Checkbox, &boxes),
            FieldValue::Multiple(vec!["x".into(), "y".into()])
        );
        y.detach();
        assert_eq!(
            group_value(ControlKind::Checkbox, &boxes),
            FieldValue::Multiple(vec!["x".into()])
        );
    }
}
