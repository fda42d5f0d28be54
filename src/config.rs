//! Binding configuration.
//!
//! Plain data describing how a bindable type maps onto controls. Types
//! usually return one from [`Bindable::bind_config`](crate::Bindable::bind_config);
//! a bind call can replace or extend it through [`BindOptions`].
//!
//! ```ignore
//! BindConfig::new("<li>{name} {editStart} {editCancel} {editSubmit}</li>")
//!     .field("name", FieldConfig::scalar())
//!     .field("attribs", FieldConfig::array_of::<Attrib>().reorderable(true))
//!     .control(ControlAction::EditStart, "editStart")
//!     .control(ControlAction::EditCancel, "editCancel")
//!     .control(ControlAction::EditSubmit, "editSubmit")
//!     .callback(CallbackKind::Change, "changed")
//! ```

use std::fmt;
use std::rc::Rc;

use crate::callback::CallbackEvent;
use crate::node::Node;
use crate::types::{CallbackKind, ControlAction, ElementType, Value};

/// Field validator run on submit. Returns false to block the submit.
pub type Validator = Rc<dyn Fn(&Value) -> bool>;

/// Bind-time callback, discarded once the node is attached.
pub type TempCallback = Rc<dyn Fn(&Node, &CallbackEvent)>;

// =============================================================================
// Field Config
// =============================================================================

/// Per-field accessor configuration.
#[derive(Clone, Default)]
pub struct FieldConfig {
    /// Control locator. Defaults to the field name.
    pub control: Option<String>,
    /// Element type of an array field. `None` means scalar.
    pub element: Option<ElementType>,
    pub validator: Option<Validator>,
    /// Whether elements may be reordered. Array fields only.
    pub reorderable: bool,
}

impl FieldConfig {
    pub fn scalar() -> Self {
        Self::default()
    }

    pub fn array_of<T: 'static>() -> Self {
        Self {
            element: Some(ElementType::of::<T>()),
            ..Self::default()
        }
    }

    pub fn control(mut self, locator: impl Into<String>) -> Self {
        self.control = Some(locator.into());
        self
    }

    pub fn validate(mut self, validator: impl Fn(&Value) -> bool + 'static) -> Self {
        let validator: Validator = Rc::new(validator);
        self.validator = Some(validator);
        self
    }

    pub fn reorderable(mut self, reorderable: bool) -> Self {
        self.reorderable = reorderable;
        self
    }

    pub fn is_array(&self) -> bool {
        self.element.is_some()
    }

    pub(crate) fn locator<'a>(&'a self, field: &'a str) -> &'a str {
        self.control.as_deref().unwrap_or(field)
    }
}

impl fmt::Debug for FieldConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldConfig")
            .field("control", &self.control)
            .field("element", &self.element.map(|e| e.name()))
            .field("validator", &self.validator.is_some())
            .field("reorderable", &self.reorderable)
            .finish()
    }
}

// =============================================================================
// Control Config
// =============================================================================

/// Locators of the lifecycle controls a node owns.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ControlConfig {
    pub edit_start: Option<String>,
    pub edit_cancel: Option<String>,
    pub edit_submit: Option<String>,
    pub remove_self: Option<String>,
    pub reset: Option<String>,
}

impl ControlConfig {
    pub fn locator(&self, action: ControlAction) -> Option<&str> {
        match action {
            ControlAction::EditStart => self.edit_start.as_deref(),
            ControlAction::EditCancel => self.edit_cancel.as_deref(),
            ControlAction::EditSubmit => self.edit_submit.as_deref(),
            ControlAction::RemoveSelf => self.remove_self.as_deref(),
            ControlAction::Reset => self.reset.as_deref(),
        }
    }

    pub fn set(&mut self, action: ControlAction, locator: impl Into<String>) {
        let slot = match action {
            ControlAction::EditStart => &mut self.edit_start,
            ControlAction::EditCancel => &mut self.edit_cancel,
            ControlAction::EditSubmit => &mut self.edit_submit,
            ControlAction::RemoveSelf => &mut self.remove_self,
            ControlAction::Reset => &mut self.reset,
        };
        *slot = Some(locator.into());
    }
}

// =============================================================================
// Bind Config
// =============================================================================

/// Everything needed to bind one instance.
#[derive(Clone, Default)]
pub struct BindConfig {
    pub template: String,
    /// Field bindings in declaration order.
    pub bind: Vec<(String, FieldConfig)>,
    pub control: ControlConfig,
    /// Permanent callbacks: slot → method name on the instance.
    pub callback: Vec<(CallbackKind, String)>,
    pub temp_callback: Vec<(CallbackKind, TempCallback)>,
    pub edit_on_init: bool,
}

impl BindConfig {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
            ..Self::default()
        }
    }

    pub fn field(mut self, name: impl Into<String>, config: FieldConfig) -> Self {
        self.bind.push((name.into(), config));
        self
    }

    pub fn control(mut self, action: ControlAction, locator: impl Into<String>) -> Self {
        self.control.set(action, locator);
        self
    }

    pub fn callback(mut self, kind: CallbackKind, method: impl Into<String>) -> Self {
        self.callback.push((kind, method.into()));
        self
    }

    pub fn temp_callback(
        mut self,
        kind: CallbackKind,
        callback: impl Fn(&Node, &CallbackEvent) + 'static,
    ) -> Self {
        let callback: TempCallback = Rc::new(callback);
        self.temp_callback.push((kind, callback));
        self
    }

    pub fn edit_on_init(mut self, edit_on_init: bool) -> Self {
        self.edit_on_init = edit_on_init;
        self
    }
}

impl fmt::Debug for BindConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BindConfig")
            .field("template", &self.template)
            .field("bind", &self.bind)
            .field("control", &self.control)
            .field("callback", &self.callback)
            .field("temp_callback", &self.temp_callback.len())
            .field("edit_on_init", &self.edit_on_init)
            .finish()
    }
}

// =============================================================================
// Bind Options
// =============================================================================

/// Per-call overrides for [`bind`](crate::bind).
#[derive(Clone, Default)]
pub struct BindOptions {
    /// Replaces the type's own config.
    pub config: Option<BindConfig>,
    /// Added to the config's temporary callbacks.
    pub temp_callback: Vec<(CallbackKind, TempCallback)>,
    /// Overrides the config's `edit_on_init`.
    pub edit_on_init: Option<bool>,
}

impl BindOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(mut self, config: BindConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn temp_callback(
        mut self,
        kind: CallbackKind,
        callback: impl Fn(&Node, &CallbackEvent) + 'static,
    ) -> Self {
        let callback: TempCallback = Rc::new(callback);
        self.temp_callback.push((kind, callback));
        self
    }

    pub fn edit_on_init(mut self, edit_on_init: bool) -> Self {
        self.edit_on_init = Some(edit_on_init);
        self
    }
}
