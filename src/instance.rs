//! Bound instances - The data side of a binding.
//!
//! Any type implementing [`Bindable`] can be wrapped in an [`Instance`] and
//! bound to a node. The instance is a shared handle: the caller, the parent
//! instance's array field and the node all hold clones of it.
//!
//! Attachment is a one-time claim. Once a node has been bound to an
//! instance, no other node can ever be bound to it. A bind that fails
//! leaves every instance it touched unclaimed.

use std::any::{Any, TypeId};
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use crate::callback::CallbackEvent;
use crate::config::BindConfig;
use crate::engine::{self, NodeId};
use crate::error::BindError;
use crate::node::Node;
use crate::types::Value;

// =============================================================================
// Bindable
// =============================================================================

/// Downcasting support for [`Bindable`] trait objects.
pub trait AsAny: Any {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// A data object whose named fields can be bound to controls.
///
/// Scalar fields are exposed as [`Value`]s. Array-typed fields are exposed
/// as sequences of further [`Instance`]s through `list`/`list_mut`.
pub trait Bindable: AsAny {
    /// Static per-type binding configuration. Types returning `None` can
    /// only be bound with an explicit config in the bind options.
    fn bind_config(&self) -> Option<BindConfig> {
        None
    }

    /// Read a scalar field.
    fn field(&self, _name: &str) -> Option<Value> {
        None
    }

    /// Write a scalar field. Returns false if the field does not exist or
    /// refuses the value.
    fn set_field(&mut self, _name: &str, _value: Value) -> bool {
        false
    }

    /// Read an array-typed field.
    fn list(&self, _name: &str) -> Option<&[Instance]> {
        None
    }

    fn list_mut(&mut self, _name: &str) -> Option<&mut Vec<Instance>> {
        None
    }

    /// Resolve a callback method by name.
    fn method(&self, _name: &str) -> Option<Method> {
        None
    }
}

/// A callback method resolved on an instance.
pub type Method = Rc<dyn Fn(&Instance, &CallbackEvent)>;

/// Wrap a `&mut self` method of a bindable type as a [`Method`].
///
/// ```ignore
/// fn method(&self, name: &str) -> Option<Method> {
///     match name {
///         "changed" => Some(method(Project::changed)),
///         _ => None,
///     }
/// }
/// ```
pub fn method<T: Bindable>(f: fn(&mut T, &CallbackEvent)) -> Method {
    Rc::new(move |instance: &Instance, event: &CallbackEvent| {
        instance.with_mut(|data: &mut T| f(data, event));
    })
}

// =============================================================================
// Instance
// =============================================================================

struct InstanceInner {
    data: RefCell<Box<dyn Bindable>>,
    type_id: TypeId,
    type_name: &'static str,
    node: Cell<Option<NodeId>>,
}

/// Shared handle to a bindable data object.
#[derive(Clone)]
pub struct Instance {
    inner: Rc<InstanceInner>,
}

impl Instance {
    pub fn new<T: Bindable>(data: T) -> Self {
        Self {
            inner: Rc::new(InstanceInner {
                data: RefCell::new(Box::new(data)),
                type_id: TypeId::of::<T>(),
                type_name: std::any::type_name::<T>(),
                node: Cell::new(None),
            }),
        }
    }

    pub fn type_id(&self) -> TypeId {
        self.inner.type_id
    }

    pub fn type_name(&self) -> &'static str {
        self.inner.type_name
    }

    pub fn is<T: Bindable>(&self) -> bool {
        self.inner.type_id == TypeId::of::<T>()
    }

    /// Identity comparison.
    pub fn ptr_eq(&self, other: &Instance) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Borrow the data as `T`. Returns `None` on a type mismatch.
    pub fn with<T: Bindable, R>(&self, f: impl FnOnce(&T) -> R) -> Option<R> {
        let data = self.inner.data.borrow();
        let any = AsAny::as_any(&**data);
        any.downcast_ref::<T>().map(f)
    }

    /// Mutably borrow the data as `T`.
    ///
    /// Changes made here bypass the node; call [`Node::update_ui`]
    /// afterwards to refresh the controls.
    pub fn with_mut<T: Bindable, R>(&self, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        let mut data = self.inner.data.borrow_mut();
        let any = AsAny::as_any_mut(&mut **data);
        any.downcast_mut::<T>().map(f)
    }

    /// Read a scalar field.
    pub fn get(&self, field: &str) -> Option<Value> {
        self.inner.data.borrow().field(field)
    }

    pub(crate) fn write(&self, field: &str, value: Value) -> bool {
        self.inner.data.borrow_mut().set_field(field, value)
    }

    pub(crate) fn bind_config(&self) -> Option<BindConfig> {
        self.inner.data.borrow().bind_config()
    }

    pub(crate) fn method(&self, name: &str) -> Option<Method> {
        self.inner.data.borrow().method(name)
    }

    /// Snapshot of an array-typed field.
    pub fn list(&self, field: &str) -> Option<Vec<Instance>> {
        self.inner.data.borrow().list(field).map(<[Instance]>::to_vec)
    }

    pub fn has_list(&self, field: &str) -> bool {
        self.inner.data.borrow().list(field).is_some()
    }

    /// Run `f` on the mutable sequence of an array-typed field.
    pub(crate) fn with_list_mut<R>(
        &self,
        field: &str,
        f: impl FnOnce(&mut Vec<Instance>) -> R,
    ) -> Option<R> {
        let mut data = self.inner.data.borrow_mut();
        data.list_mut(field).map(f)
    }

    /// Position of `self` within `owner`'s array field.
    pub fn position_in(&self, owner: &Instance, field: &str) -> Option<usize> {
        let data = owner.inner.data.borrow();
        data.list(field)?.iter().position(|e| e.ptr_eq(self))
    }

    // =========================================================================
    // Attachment
    // =========================================================================

    /// The node bound to this instance, if it is still alive.
    pub fn node(&self) -> Option<Node> {
        self.inner.node.get().and_then(engine::get_node)
    }

    /// Whether a live node is bound to this instance.
    pub fn is_attached(&self) -> bool {
        self.inner.node.get().is_some_and(engine::is_allocated)
    }

    /// Whether a node was ever bound to this instance.
    pub fn is_claimed(&self) -> bool {
        self.inner.node.get().is_some()
    }

    pub(crate) fn claim(&self, id: NodeId) -> Result<(), BindError> {
        if self.inner.node.get().is_some() {
            return Err(BindError::AlreadyAttached {
                type_name: self.type_name(),
            });
        }
        self.inner.node.set(Some(id));
        Ok(())
    }

    /// Drop the claim of a node whose bind never completed.
    pub(crate) fn release_claim(&self, id: NodeId) {
        if self.inner.node.get() == Some(id) {
            self.inner.node.set(None);
        }
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("type", &self.inner.type_name)
            .field("node", &self.inner.node.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Attrib {
        name: String,
        size: i64,
    }

    impl Bindable for Attrib {
        fn field(&self, name: &str) -> Option<Value> {
            match name {
                "name" => Some(Value::from(self.name.as_str())),
                "size" => Some(Value::from(self.size)),
                _ => None,
            }
        }

        fn set_field(&mut self, name: &str, value: Value) -> bool {
            match (name, value) {
                ("name", Value::Text(s)) => self.name = s,
                ("size", Value::Int(i)) => self.size = i,
                _ => return false,
            }
            true
        }

        fn method(&self, name: &str) -> Option<Method> {
            match name {
                "grow" => Some(method(Attrib::grow)),
                _ => None,
            }
        }
    }

    impl Attrib {
        fn grow(&mut self, _event: &CallbackEvent) {
            self.size += 1;
        }
    }

    struct Layout {
        attribs: Vec<Instance>,
    }

    impl Bindable for Layout {
        fn list(&self, name: &str) -> Option<&[Instance]> {
            (name == "attribs").then_some(self.attribs.as_slice())
        }

        fn list_mut(&mut self, name: &str) -> Option<&mut Vec<Instance>> {
            (name == "attribs").then_some(&mut self.attribs)
        }
    }

    fn attrib(name: &str) -> Instance {
        Instance::new(Attrib {
            name: name.to_string(),
            size: 4,
        })
    }

    #[test]
    fn test_field_access() {
        let inst = attrib("pos");
        assert_eq!(inst.get("name"), Some(Value::from("pos")));
        assert!(inst.write("size", Value::from(2)));
        assert_eq!(inst.get("size"), Some(Value::from(2)));
        assert!(!inst.write("size", Value::from("two")));
        assert!(!inst.write("color", Value::from(1)));
    }

    #[test]
    fn test_downcast() {
        let inst = attrib("pos");
        assert!(inst.is::<Attrib>());
        assert_eq!(inst.with(|a: &Attrib| a.size), Some(4));
        assert_eq!(inst.with(|l: &Layout| l.attribs.len()), None);

        inst.with_mut(|a: &mut Attrib| a.size = 3);
        assert_eq!(inst.get("size"), Some(Value::from(3)));
    }

    #[test]
    fn test_method_helper() {
        let inst = attrib("pos");
        let grow = inst.method("grow").unwrap();
        grow(&inst, &CallbackEvent::EditStart);
        assert_eq!(inst.get("size"), Some(Value::from(5)));
        assert!(inst.method("shrink").is_none());
    }

    #[test]
    fn test_position_in_list() {
        let a = attrib("a");
        let b = attrib("b");
        let layout = Instance::new(Layout {
            attribs: vec![a.clone(), b.clone()],
        });

        assert_eq!(b.position_in(&layout, "attribs"), Some(1));
        assert_eq!(a.position_in(&layout, "other"), None);
        assert!(layout.has_list("attribs"));

        layout.with_list_mut("attribs", |list| list.remove(0));
        assert_eq!(b.position_in(&layout, "attribs"), Some(0));
        assert_eq!(a.position_in(&layout, "attribs"), None);
    }

    #[test]
    fn test_claim_is_one_shot() {
        engine::reset_registry();

        let inst = attrib("pos");
        assert!(!inst.is_claimed());

        let first = engine::allocate_id();
        let second = engine::allocate_id();
        assert!(inst.claim(first).is_ok());
        assert!(inst.is_claimed());
        // No live node registered under the id
        assert!(!inst.is_attached());

        let err = inst.claim(second).unwrap_err();
        assert!(matches!(err, BindError::AlreadyAttached { .. }));
    }
}
