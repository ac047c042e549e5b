//! The top-level scope.
//!
//! An [`Engine`] owns the validator registry, the remote strategy table, the
//! root event bus and the default options. Fields and forms bound through it
//! share all four. [`Engine::shared`] is a process-wide instance for callers
//! that do not need isolation; tests should build their own.

use std::fmt;
use std::sync::{Arc, LazyLock};

use crate::error::ConfigResult;
use crate::event::EventBus;
use crate::field::{Field, FieldScope};
use crate::form::Form;
use crate::markup::{Container, Control};
use crate::options::{Defaults, OptionLayer};
use crate::registry::ValidatorRegistry;
use crate::remote::{RemoteTransport, RemoteValidators};

static SHARED: LazyLock<Engine> = LazyLock::new(Engine::new);

pub(crate) struct EngineInner {
    pub(crate) registry: Arc<ValidatorRegistry>,
    pub(crate) remote: Arc<RemoteValidators>,
    pub(crate) bus: Arc<EventBus>,
    pub(crate) defaults: Arc<OptionLayer>,
}

/// Registry, remote table, root bus and defaults. Cheap to clone.
#[derive(Clone)]
pub struct Engine {
    inner: Arc<EngineInner>,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    /// An engine with the built-in validators, default options and, with the
    /// `http` feature, an HTTP transport for remote checks.
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Starts a customised engine.
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    /// The process-wide engine.
    pub fn shared() -> &'static Self {
        &SHARED
    }

    pub(crate) fn inner(&self) -> &EngineInner {
        &self.inner
    }

    /// Validators and message catalog.
    pub fn registry(&self) -> &Arc<ValidatorRegistry> {
        &self.inner.registry
    }

    /// Async strategies and the request cache.
    pub fn remote(&self) -> &Arc<RemoteValidators> {
        &self.inner.remote
    }

    /// Root event bus: receives every event no inner scope cancelled.
    pub fn bus(&self) -> &Arc<EventBus> {
        &self.inner.bus
    }

    /// The bottom option layer.
    pub fn defaults(&self) -> &OptionLayer {
        &self.inner.defaults
    }

    fn scope(&self, container: Option<Arc<dyn Container>>) -> FieldScope {
        FieldScope {
            registry: Arc::clone(&self.inner.registry),
            inherited: vec![Arc::clone(&self.inner.defaults)],
            parents: vec![Arc::clone(&self.inner.bus)],
            container,
        }
    }

    /// Binds a standalone field. Radio buttons and checkboxes become a group
    /// of one; use [`bind_group`](Self::bind_group) for the whole set.
    pub fn bind_field(&self, control: Arc<dyn Control>, overrides: OptionLayer) -> ConfigResult<Field> {
        Field::bind(control, overrides, self.scope(None))
    }

    /// Binds a standalone field whose `reference` requirements resolve in
    /// `container`.
    pub fn bind_field_in(
        &self,
        container: Arc<dyn Container>,
        control: Arc<dyn Control>,
        overrides: OptionLayer,
    ) -> ConfigResult<Field> {
        Field::bind(control, overrides, self.scope(Some(container)))
    }

    /// Binds sibling radio buttons or checkboxes as one field.
    pub fn bind_group(
        &self,
        controls: impl IntoIterator<Item = Arc<dyn Control>>,
        overrides: OptionLayer,
    ) -> ConfigResult<Field> {
        Field::bind_group(controls, overrides, self.scope(None))
    }

    /// Binds a form and discovers its fields.
    pub fn bind_form(&self, container: Arc<dyn Container>, overrides: OptionLayer) -> ConfigResult<Form> {
        Form::bind(self.clone(), container, overrides)
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("registry", &self.inner.registry)
            .field("remote", &self.inner.remote)
            .field("listeners", &self.inner.bus.len())
            .finish_non_exhaustive()
    }
}

/// Builder for [`Engine`].
pub struct EngineBuilder {
    defaults: Defaults,
    extra: OptionLayer,
    transport: Option<Arc<dyn RemoteTransport>>,
    builtins: bool,
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self {
            defaults: Defaults::default(),
            extra: OptionLayer::new(),
            transport: None,
            builtins: true,
        }
    }
}

impl EngineBuilder {
    /// Replaces the default options.
    #[must_use]
    pub fn defaults(mut self, defaults: Defaults) -> Self {
        self.defaults = defaults;
        self
    }

    /// Adds an engine-wide option, e.g. a validator requirement every field
    /// inherits.
    #[must_use]
    pub fn option(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.extra.insert(key, value);
        self
    }

    /// Transport for remote checks.
    #[must_use]
    pub fn transport(mut self, transport: Arc<dyn RemoteTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Starts with an empty registry instead of the built-ins. The `remote`
    /// validator is always registered.
    #[must_use]
    pub fn without_builtins(mut self) -> Self {
        self.builtins = false;
        self
    }

    /// Builds the engine.
    pub fn build(self) -> Engine {
        let registry = if self.builtins {
            ValidatorRegistry::with_builtins()
        } else {
            ValidatorRegistry::new()
        };
        let transport = self.transport.unwrap_or_else(default_transport);
        let remote = Arc::new(RemoteValidators::new(transport));
        registry.add_validator(remote.validator());

        let mut defaults = self.defaults.to_layer();
        defaults.merge(&self.extra);
        Engine {
            inner: Arc::new(EngineInner {
                registry: Arc::new(registry),
                remote,
                bus: Arc::new(EventBus::new()),
                defaults: Arc::new(defaults),
            }),
        }
    }
}

#[cfg(feature = "http")]
fn default_transport() -> Arc<dyn RemoteTransport> {
    Arc::new(crate::remote::HttpTransport::new())
}

#[cfg(not(feature = "http"))]
fn default_transport() -> Arc<dyn RemoteTransport> {
    Arc::new(crate::remote::NoTransport)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markup::Element;
    use crate::field::ValidateOptions;
    use crate::options::FocusPolicy;
    use crate::remote::NoTransport;

    #[test]
    fn builtins_and_remote_are_registered() {
        let engine = Engine::builder().transport(Arc::new(NoTransport)).build();
        for name in ["required", "type", "equalto", "remote"] {
            assert!(engine.registry().has_validator(name), "{name}");
        }
        let bare = Engine::builder().without_builtins().build();
        assert_eq!(bare.registry().names(), vec!["remote".to_owned()]);
    }

    #[test]
    fn defaults_reach_fields() {
        let engine = Engine::builder()
            .defaults(Defaults {
                namespace: "data-x-".into(),
                focus: FocusPolicy::Last,
                ..Defaults::default()
            })
            .option("trimValue", true)
            .build();
        assert_eq!(engine.defaults().get("namespace").and_then(|v| v.as_str()), Some("data-x-"));

        let input = Element::input("text")
            .with_attr("data-x-minlength", "3")
            .with_value(" ab ");
        let mut field = engine.bind_field(input.handle(), OptionLayer::new()).unwrap();
        assert!(field.constraint("minlength").is_some());
        assert!(field.validate(ValidateOptions::default()).unwrap().is_invalid());
    }

    #[test]
    fn shared_engine_is_a_singleton() {
        assert!(std::ptr::eq(Engine::shared(), Engine::shared()));
    }
}
