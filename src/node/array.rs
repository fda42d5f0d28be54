//! Array field operations.
//!
//! Every structural change keeps three sequences in the same order: the
//! instance's element list, the accessor's child nodes and the rendered
//! child controls inside the array's container control.

use super::{Node, ParentLink, bind::bind_node};
use crate::callback::CallbackEvent;
use crate::config::BindOptions;
use crate::engine::NodeId;
use crate::error::BindError;
use crate::instance::Instance;

impl Node {
    /// Toggle the lifecycle controls of every child of `field` except
    /// `except`.
    pub fn enable_all_except(
        &self,
        field: &str,
        except: Option<&Node>,
        enabled: bool,
    ) -> Result<(), BindError> {
        self.enable_siblings(field, except.map(Node::id), enabled)
    }

    pub(super) fn enable_siblings(
        &self,
        field: &str,
        except: Option<NodeId>,
        enabled: bool,
    ) -> Result<(), BindError> {
        let children = self.with_array(field, |array| array.children().to_vec())?;
        for child in children.iter().filter(|child| Some(child.id()) != except) {
            child.set_enabled(enabled);
        }
        Ok(())
    }

    /// Switch drag-reordering of `field` on or off. Fails for fields not
    /// configured as reorderable.
    pub fn set_reorderable(&self, field: &str, enabled: bool) -> Result<(), BindError> {
        self.with_array_mut(field, |array| array.set_reorderable(enabled))?
    }

    pub fn is_reorderable(&self, field: &str) -> bool {
        self.with_array(field, |array| array.is_reorderable())
            .unwrap_or(false)
    }

    /// The element of `field` currently being edited.
    pub fn editing_child(&self, field: &str) -> Option<Node> {
        let id = self.with_array(field, |array| array.editing()).ok()??;
        self.with_array(field, |array| {
            array.position_of_node(id).map(|i| array.children()[i].clone())
        })
        .ok()?
    }

    // =========================================================================
    // Structural Operations
    // =========================================================================

    /// Bind `instance` and append it to `field`.
    ///
    /// The element type must match the field's declared type. Refused while
    /// an element of the array is editing.
    pub fn add_child(
        &self,
        field: &str,
        instance: &Instance,
        edit_on_init: bool,
    ) -> Result<Node, BindError> {
        self.ensure_alive()?;
        self.with_array(field, |array| {
            array.ensure_unlocked()?;
            array.check_element(instance)
        })??;

        let child = self.bind_child(field, instance, Some(edit_on_init))?;
        self.inner
            .instance
            .with_list_mut(field, |list| list.push(instance.clone()));
        let index = self.with_array_mut(field, |array| {
            array.push(child.clone());
            array.len() - 1
        })?;

        log::debug!("{}.{}: added element {}", self.instance().type_name(), field, index);
        self.fire(CallbackEvent::Add {
            field: field.to_string(),
            index,
        });
        self.fire(CallbackEvent::Change {
            field: field.to_string(),
        });
        Ok(child)
    }

    /// Remove `instance` from `field`.
    ///
    /// Destroys the element's node, splices the instance out of the array,
    /// then reindexes the remaining elements. Refused while any element of
    /// the array is editing.
    pub fn remove_child(&self, field: &str, instance: &Instance) -> Result<(), BindError> {
        self.ensure_alive()?;
        let child = self.with_array(field, |array| -> Result<Node, BindError> {
            array.ensure_unlocked()?;
            let index = array.position_of(instance).ok_or_else(|| BindError::NotAnElement {
                field: field.to_string(),
            })?;
            Ok(array.children()[index].clone())
        })??;

        child.fire(CallbackEvent::RemoveSelf);
        child.destroy();

        self.with_array_mut(field, |array| {
            if let Some(index) = array.position_of_node(child.id()) {
                array.remove(index);
            }
        })?;
        self.inner.instance.with_list_mut(field, |list| {
            if let Some(index) = list.iter().position(|item| item.ptr_eq(instance)) {
                list.remove(index);
            }
        });
        self.reindex(field)?;

        log::debug!("{}.{}: removed {:?}", self.instance().type_name(), field, child.id());
        self.fire(CallbackEvent::ReIndex {
            field: field.to_string(),
        });
        self.fire(CallbackEvent::Change {
            field: field.to_string(),
        });
        Ok(())
    }

    /// Move the element at `from` to `to` in both the instance's array and
    /// the child nodes.
    pub fn reorder(&self, field: &str, from: usize, to: usize) -> Result<(), BindError> {
        self.ensure_alive()?;
        self.with_array(field, |array| {
            if !array.is_reorderable() {
                return Err(BindError::NotReorderable {
                    field: field.to_string(),
                });
            }
            array.check_index(from)?;
            array.check_index(to)
        })??;
        if from == to {
            return Ok(());
        }

        self.with_array_mut(field, |array| array.move_child(from, to))?;
        self.inner.instance.with_list_mut(field, |list| {
            if from < list.len() && to < list.len() {
                let item = list.remove(from);
                list.insert(to, item);
            }
        });
        self.reindex(field)?;

        self.fire(CallbackEvent::Reorder {
            field: field.to_string(),
            from,
            to,
        });
        self.fire(CallbackEvent::ReIndex {
            field: field.to_string(),
        });
        self.fire(CallbackEvent::Change {
            field: field.to_string(),
        });
        Ok(())
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn bind_child(
        &self,
        field: &str,
        instance: &Instance,
        edit_on_init: Option<bool>,
    ) -> Result<Node, BindError> {
        let control = self.with_array(field, |array| array.control())?;
        let options = BindOptions {
            edit_on_init,
            ..BindOptions::default()
        };
        let link = ParentLink {
            id: self.id(),
            field: field.to_string(),
        };
        bind_node(instance, self.surface(), control, options, Some(link))
    }

    /// Move rendered child controls to match the child order.
    fn reindex(&self, field: &str) -> Result<(), BindError> {
        let children = self.children(field)?;
        for (index, child) in children.iter().enumerate() {
            self.surface().place(child.root(), index);
        }
        Ok(())
    }

    /// Take the edit token for children that started editing while this
    /// node was being constructed.
    pub(super) fn adopt_editing_children(&self) {
        for field in self.array_fields() {
            let editing = self
                .children(&field)
                .unwrap_or_default()
                .into_iter()
                .find(Node::is_editing);
            let Some(child) = editing else {
                continue;
            };
            if self
                .with_array_mut(&field, |array| array.lock(child.id()))
                .is_ok_and(|locked| locked.is_ok())
            {
                if let Err(err) = self.enable_siblings(&field, Some(child.id()), false) {
                    log::warn!("{}.{}: could not disable siblings: {}", self.instance().type_name(), field, err);
                }
            }
        }
    }

    /// Rebuild array children after the instance's arrays changed behind
    /// the node's back: keep nodes for surviving elements, bind new ones,
    /// destroy dropped ones and restore the order.
    ///
    /// New elements are checked before any node is touched. An array that
    /// lists the same instance twice is refused.
    pub(super) fn sync_arrays(&self) -> Result<(), BindError> {
        let mut plans = Vec::new();
        for field in self.array_fields() {
            let elements = self.inner.instance.list(&field).ok_or_else(|| BindError::NotAnArray {
                field: field.clone(),
            })?;
            for (index, item) in elements.iter().enumerate() {
                if elements[..index].iter().any(|e| e.ptr_eq(item)) {
                    log::error!("{}.{} lists an instance twice", self.instance().type_name(), field);
                    return Err(BindError::AlreadyAttached {
                        type_name: item.type_name(),
                    });
                }
            }
            self.with_array(&field, |array| -> Result<(), BindError> {
                for item in elements.iter().filter(|item| array.position_of(item).is_none()) {
                    array.check_element(item)?;
                    if item.is_claimed() {
                        return Err(BindError::AlreadyAttached {
                            type_name: item.type_name(),
                        });
                    }
                }
                Ok(())
            })??;
            plans.push((field, elements));
        }

        for (field, elements) in plans {
            let previous = self.with_array_mut(&field, |array| array.replace_children(Vec::new()))?;

            let mut next = Vec::with_capacity(elements.len());
            for item in &elements {
                let kept = previous.iter().find(|child| child.instance().ptr_eq(item));
                let child = match kept {
                    Some(child) => child.clone(),
                    None => match self.bind_child(&field, item, None) {
                        Ok(child) => child,
                        Err(err) => {
                            for fresh in next.iter().filter(|n: &&Node| !previous.iter().any(|p| p.id() == n.id())) {
                                fresh.discard();
                            }
                            self.with_array_mut(&field, |array| array.replace_children(previous))?;
                            return Err(err);
                        }
                    },
                };
                next.push(child);
            }

            let unchanged = next.len() == previous.len()
                && next.iter().zip(&previous).all(|(a, b)| a.id() == b.id());
            for dropped in previous.iter().filter(|p| !next.iter().any(|n| n.id() == p.id())) {
                dropped.destroy();
            }
            self.with_array_mut(&field, |array| array.replace_children(next))?;
            self.reindex(&field)?;

            if !unchanged {
                self.fire(CallbackEvent::ReIndex { field });
            }
        }
        Ok(())
    }
}
