//! The markup the engine reads from.
//!
//! The engine never touches a DOM. It needs four things from a control:
//! an identity, a way to enumerate and write configuration attributes, its
//! current value/checked state, and whether it is still attached. Those are
//! captured by [`Control`]. A form body is a [`Container`] of controls in
//! document order.
//!
//! [`Element`] and [`Document`] are in-memory implementations, good enough
//! for server-side validation of submitted data and for tests.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

use crate::error::{ConfigError, ConfigResult};
use crate::value::FieldValue;

// ============================================================================
// CONTROL
// ============================================================================

/// Stable identity of a control, unique per process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ControlId(u64);

impl ControlId {
    /// Allocates a fresh id.
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ControlId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "control-{}", self.0)
    }
}

/// What sort of control an element is, as far as validation cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlKind {
    /// A single-valued input, textarea or select.
    Text,
    /// A radio button; grouped with its siblings.
    Radio,
    /// A checkbox; grouped with its siblings.
    Checkbox,
    /// A `<select multiple>`.
    MultiSelect,
}

impl ControlKind {
    /// Radio buttons and checkboxes only make sense as a group.
    pub fn is_grouped(self) -> bool {
        matches!(self, Self::Radio | Self::Checkbox)
    }
}

/// A single form control.
///
/// Attribute access is the "configuration reader" the engine works from:
/// everything else (requirements, priorities, options) is derived from it on
/// every refresh.
pub trait Control: Send + Sync + fmt::Debug {
    /// Process-unique identity.
    fn id(&self) -> ControlId;

    /// Lower-case tag name: `input`, `textarea`, `select`.
    fn tag(&self) -> String;

    /// Reads one attribute.
    fn attribute(&self, name: &str) -> Option<String>;

    /// All attributes in declaration order.
    fn attributes(&self) -> Vec<(String, String)>;

    /// Writes one attribute back.
    fn set_attribute(&self, name: &str, value: &str);

    /// Current raw value. Multi-selects return the selected options.
    fn value(&self) -> FieldValue;

    /// Checked state for radio buttons and checkboxes.
    fn is_checked(&self) -> bool;

    /// `false` once the control has been removed from its document.
    fn is_attached(&self) -> bool;

    /// Moves input focus to the control. Hosts without focus ignore it.
    fn focus(&self) {}

    /// Derived control kind.
    fn kind(&self) -> ControlKind {
        let tag = self.tag();
        if tag == "select" && self.attribute("multiple").is_some() {
            return ControlKind::MultiSelect;
        }
        if tag == "input" {
            match self.input_type().as_deref() {
                Some("radio") => return ControlKind::Radio,
                Some("checkbox") => return ControlKind::Checkbox,
                _ => {}
            }
        }
        ControlKind::Text
    }

    /// Lower-case `type` attribute of an `<input>`.
    fn input_type(&self) -> Option<String> {
        self.attribute("type").map(|t| t.to_ascii_lowercase())
    }

    /// `name` attribute, falling back to `id`. Used as the request parameter
    /// name for remote checks.
    fn key(&self) -> Option<String> {
        self.attribute("name").or_else(|| self.attribute("id"))
    }
}

/// An ordered collection of controls (a form body).
pub trait Container: Send + Sync {
    /// Every control, in document order.
    fn controls(&self) -> Vec<Arc<dyn Control>>;

    /// Attributes of the container itself (form-level options).
    fn attributes(&self) -> Vec<(String, String)> {
        Vec::new()
    }

    /// Every control matching `selector`.
    fn select(&self, selector: &Selector) -> Vec<Arc<dyn Control>> {
        self.controls()
            .into_iter()
            .filter(|c| selector.matches(c.as_ref()))
            .collect()
    }

    /// First control matching a selector string.
    fn find(&self, selector: &str) -> ConfigResult<Option<Arc<dyn Control>>> {
        let selector = Selector::parse(selector)?;
        Ok(self
            .controls()
            .into_iter()
            .find(|c| selector.matches(c.as_ref())))
    }
}

// ============================================================================
// SELECTORS
// ============================================================================

/// A small CSS selector subset: comma-separated lists of compounds made of an
/// optional tag, an optional `#id` and any number of `[attr]` /
/// `[attr=value]` filters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    alternatives: Vec<Compound>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
struct Compound {
    tag: Option<String>,
    id: Option<String>,
    attributes: Vec<(String, Option<String>)>,
}

impl Selector {
    /// Parses a selector list. An empty string matches nothing.
    pub fn parse(source: &str) -> ConfigResult<Self> {
        let alternatives = source
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(|part| Compound::parse(part).ok_or_else(|| ConfigError::InvalidSelector(part.to_owned())))
            .collect::<ConfigResult<Vec<_>>>()?;
        Ok(Self { alternatives })
    }

    /// `true` when any alternative matches.
    pub fn matches(&self, control: &dyn Control) -> bool {
        self.alternatives.iter().any(|c| c.matches(control))
    }
}

impl Compound {
    fn parse(mut rest: &str) -> Option<Self> {
        let mut compound = Self::default();

        let tag_len = rest
            .find(|c: char| c == '#' || c == '[')
            .unwrap_or(rest.len());
        let tag = &rest[..tag_len];
        if !tag.is_empty() && tag != "*" {
            if !tag.chars().all(|c| c.is_ascii_alphanumeric()) {
                return None;
            }
            compound.tag = Some(tag.to_ascii_lowercase());
        }
        rest = &rest[tag_len..];

        while !rest.is_empty() {
            if let Some(after) = rest.strip_prefix('#') {
                let end = after.find('[').unwrap_or(after.len());
                compound.id = Some(after[..end].to_owned());
                rest = &after[end..];
            } else if let Some(after) = rest.strip_prefix('[') {
                let end = after.find(']')?;
                let body = &after[..end];
                let filter = match body.split_once('=') {
                    Some((name, value)) => (
                        name.trim().to_owned(),
                        Some(value.trim().trim_matches(|c| c == '"' || c == '\'').to_owned()),
                    ),
                    None => (body.trim().to_owned(), None),
                };
                compound.attributes.push(filter);
                rest = &after[end + 1..];
            } else {
                return None;
            }
        }
        Some(compound)
    }

    fn matches(&self, control: &dyn Control) -> bool {
        if let Some(tag) = &self.tag
            && control.tag() != *tag
        {
            return false;
        }
        if let Some(id) = &self.id
            && control.attribute("id").as_deref() != Some(id.as_str())
        {
            return false;
        }
        self.attributes.iter().all(|(name, expected)| {
            match (control.attribute(name), expected) {
                (None, _) => false,
                (Some(_), None) => true,
                // `type` compares case-insensitively, like the HTML attribute.
                (Some(actual), Some(expected)) if name == "type" => actual.eq_ignore_ascii_case(expected),
                (Some(actual), Some(expected)) => actual == *expected,
            }
        })
    }
}

// ============================================================================
// IN-MEMORY ELEMENT
// ============================================================================

/// An in-memory control. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct Element {
    inner: Arc<ElementInner>,
}

struct ElementInner {
    id: ControlId,
    tag: String,
    state: RwLock<ElementState>,
}

#[derive(Default)]
struct ElementState {
    attributes: Vec<(String, String)>,
    value: String,
    selected: Vec<String>,
    checked: bool,
    attached: bool,
    focused: bool,
}

impl Element {
    /// Creates a detached element with the given tag.
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(ElementInner {
                id: ControlId::next(),
                tag: tag.into().to_ascii_lowercase(),
                state: RwLock::new(ElementState {
                    attached: true,
                    ..ElementState::default()
                }),
            }),
        }
    }

    /// `<input type="…">`.
    pub fn input(input_type: &str) -> Self {
        Self::new("input").with_attr("type", input_type)
    }

    /// `<textarea>`.
    pub fn textarea() -> Self {
        Self::new("textarea")
    }

    /// `<select>`; pass `multiple = true` for a multi-select.
    pub fn select(multiple: bool) -> Self {
        let element = Self::new("select");
        if multiple {
            element.set_attribute("multiple", "");
        }
        element
    }

    /// Builder: sets an attribute.
    pub fn with_attr(self, name: &str, value: &str) -> Self {
        self.set_attribute(name, value);
        self
    }

    /// Builder: sets the value.
    pub fn with_value(self, value: &str) -> Self {
        self.set_value(value);
        self
    }

    /// Builder: sets the checked state.
    pub fn with_checked(self, checked: bool) -> Self {
        self.set_checked(checked);
        self
    }

    /// Replaces the current value.
    pub fn set_value(&self, value: &str) {
        self.inner.state.write().value = value.to_owned();
    }

    /// Replaces the selected options of a multi-select.
    pub fn set_selected<I, S>(&self, values: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inner.state.write().selected = values.into_iter().map(Into::into).collect();
    }

    /// Checks or unchecks a radio button/checkbox.
    pub fn set_checked(&self, checked: bool) {
        self.inner.state.write().checked = checked;
    }

    /// Removes an attribute.
    pub fn remove_attribute(&self, name: &str) {
        self.inner.state.write().attributes.retain(|(n, _)| n != name);
    }

    /// Marks the element as removed from its document.
    pub fn detach(&self) {
        self.inner.state.write().attached = false;
    }

    /// Whether [`Control::focus`] was the last focus call.
    pub fn is_focused(&self) -> bool {
        self.inner.state.read().focused
    }

    /// Type-erased handle.
    pub fn handle(&self) -> Arc<dyn Control> {
        Arc::new(self.clone())
    }
}

impl fmt::Debug for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.read();
        f.debug_struct("Element")
            .field("id", &self.inner.id)
            .field("tag", &self.inner.tag)
            .field("attributes", &state.attributes)
            .field("value", &state.value)
            .finish_non_exhaustive()
    }
}

impl Control for Element {
    fn id(&self) -> ControlId {
        self.inner.id
    }

    fn tag(&self) -> String {
        self.inner.tag.clone()
    }

    fn attribute(&self, name: &str) -> Option<String> {
        self.inner
            .state
            .read()
            .attributes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.clone())
    }

    fn attributes(&self) -> Vec<(String, String)> {
        self.inner.state.read().attributes.clone()
    }

    fn set_attribute(&self, name: &str, value: &str) {
        let mut state = self.inner.state.write();
        match state.attributes.iter_mut().find(|(n, _)| n == name) {
            Some(slot) => slot.1 = value.to_owned(),
            None => state.attributes.push((name.to_owned(), value.to_owned())),
        }
    }

    fn value(&self) -> FieldValue {
        let state = self.inner.state.read();
        if self.inner.tag == "select" && state.attributes.iter().any(|(n, _)| n == "multiple") {
            FieldValue::Multiple(state.selected.clone())
        } else {
            FieldValue::Single(state.value.clone())
        }
    }

    fn is_checked(&self) -> bool {
        self.inner.state.read().checked
    }

    fn is_attached(&self) -> bool {
        self.inner.state.read().attached
    }

    fn focus(&self) {
        self.inner.state.write().focused = true;
    }
}

// ============================================================================
// IN-MEMORY DOCUMENT
// ============================================================================

/// An in-memory form body.
#[derive(Default)]
pub struct Document {
    attributes: RwLock<Vec<(String, String)>>,
    elements: RwLock<Vec<Element>>,
}

impl Document {
    /// Empty document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: sets an attribute on the form itself.
    #[must_use]
    pub fn with_attr(self, name: &str, value: &str) -> Self {
        self.set_attribute(name, value);
        self
    }

    /// Sets an attribute on the form itself.
    pub fn set_attribute(&self, name: &str, value: &str) {
        let mut attributes = self.attributes.write();
        match attributes.iter_mut().find(|(n, _)| n == name) {
            Some(slot) => slot.1 = value.to_owned(),
            None => attributes.push((name.to_owned(), value.to_owned())),
        }
    }

    /// Appends an element and returns a handle to it.
    pub fn append(&self, element: Element) -> Element {
        self.elements.write().push(element.clone());
        element
    }

    /// Removes an element and marks it detached.
    pub fn remove(&self, id: ControlId) {
        let mut elements = self.elements.write();
        if let Some(pos) = elements.iter().position(|e| e.id() == id) {
            elements.remove(pos).detach();
        }
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.elements.read().len()
    }

    /// `true` when the document holds no elements.
    pub fn is_empty(&self) -> bool {
        self.elements.read().is_empty()
    }
}

impl Container for Document {
    fn controls(&self) -> Vec<Arc<dyn Control>> {
        self.elements.read().iter().map(Element::handle).collect()
    }

    fn attributes(&self) -> Vec<(String, String)> {
        self.attributes.read().clone()
    }
}
