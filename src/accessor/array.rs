//! Array accessor - an array-typed field and the child nodes bound to its
//! elements.
//!
//! The child sequence always mirrors the instance's element order. The
//! accessor also holds the sibling-edit token: the id of the child that is
//! currently editing, if any. While it is set, structural operations on the
//! array are refused and reordering is disabled.

use crate::engine::NodeId;
use crate::error::BindError;
use crate::instance::Instance;
use crate::node::Node;
use crate::surface::ControlId;
use crate::types::ElementType;

pub struct ArrayAccessor {
    field: String,
    control: ControlId,
    element: ElementType,
    children: Vec<Node>,
    forced: bool,
    editing: Option<NodeId>,
    /// `None` when the field is not reorderable at all.
    reorderable: Option<bool>,
}

impl ArrayAccessor {
    pub fn new(
        field: impl Into<String>,
        control: ControlId,
        element: ElementType,
        children: Vec<Node>,
        reorderable: bool,
    ) -> Self {
        Self {
            field: field.into(),
            control,
            element,
            children,
            forced: false,
            editing: None,
            reorderable: reorderable.then_some(true),
        }
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    /// Container control the children render into.
    pub fn control(&self) -> ControlId {
        self.control
    }

    pub fn element(&self) -> ElementType {
        self.element
    }

    pub fn children(&self) -> &[Node] {
        &self.children
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    pub fn position_of(&self, instance: &Instance) -> Option<usize> {
        self.children
            .iter()
            .position(|child| child.instance().ptr_eq(instance))
    }

    pub fn position_of_node(&self, id: NodeId) -> Option<usize> {
        self.children.iter().position(|child| child.id() == id)
    }

    /// Reject elements whose runtime type differs from the declared one.
    pub fn check_element(&self, instance: &Instance) -> Result<(), BindError> {
        if self.element.matches(instance) {
            return Ok(());
        }
        log::error!(
            "array `{}` holds `{}`, refusing `{}`",
            self.field,
            self.element.name(),
            instance.type_name()
        );
        Err(BindError::ElementType {
            field: self.field.clone(),
            expected: self.element.name(),
            found: instance.type_name(),
        })
    }

    // =========================================================================
    // Sibling Edit Token
    // =========================================================================

    pub fn editing(&self) -> Option<NodeId> {
        self.editing
    }

    pub fn is_locked(&self) -> bool {
        self.editing.is_some()
    }

    /// Take the token for `id`. Fails if another child holds it.
    pub fn lock(&mut self, id: NodeId) -> Result<(), BindError> {
        match self.editing {
            Some(holder) if holder != id => Err(BindError::Locked {
                field: self.field.clone(),
            }),
            _ => {
                self.editing = Some(id);
                Ok(())
            }
        }
    }

    /// Release the token if `id` holds it.
    pub fn unlock(&mut self, id: NodeId) -> bool {
        if self.editing == Some(id) {
            self.editing = None;
            true
        } else {
            false
        }
    }

    pub(crate) fn ensure_unlocked(&self) -> Result<(), BindError> {
        if self.is_locked() {
            return Err(BindError::Locked {
                field: self.field.clone(),
            });
        }
        Ok(())
    }

    // =========================================================================
    // Reordering
    // =========================================================================

    /// Configured, switched on, and no element is mid-edit.
    pub fn is_reorderable(&self) -> bool {
        self.reorderable == Some(true) && self.editing.is_none()
    }

    pub fn set_reorderable(&mut self, enabled: bool) -> Result<(), BindError> {
        match &mut self.reorderable {
            Some(current) => {
                *current = enabled;
                Ok(())
            }
            None => Err(BindError::NotReorderable {
                field: self.field.clone(),
            }),
        }
    }

    // =========================================================================
    // Edit Lifecycle
    // =========================================================================

    pub fn edit_start(&mut self, force_dirty: bool) {
        self.forced = force_dirty;
    }

    pub fn edit_cancel(&mut self) {
        self.forced = false;
    }

    /// Structural changes commit immediately, so an array is only dirty when
    /// forced by the edit start.
    pub fn is_dirty(&self) -> bool {
        self.forced
    }

    // =========================================================================
    // Structure
    // =========================================================================

    pub(crate) fn push(&mut self, child: Node) {
        self.children.push(child);
    }

    pub(crate) fn remove(&mut self, index: usize) -> Node {
        self.children.remove(index)
    }

    pub(crate) fn move_child(&mut self, from: usize, to: usize) {
        let child = self.children.remove(from);
        self.children.insert(to, child);
    }

    pub(crate) fn replace_children(&mut self, children: Vec<Node>) -> Vec<Node> {
        std::mem::replace(&mut self.children, children)
    }

    pub(crate) fn check_index(&self, index: usize) -> Result<(), BindError> {
        if index < self.children.len() {
            return Ok(());
        }
        Err(BindError::IndexOutOfRange {
            field: self.field.clone(),
            index,
            len: self.children.len(),
        })
    }
}
