//! Edit lifecycle.
//!
//! ```text
//!            start_edit
//!   Clean ──────────────▶ Editing
//!     ▲                     │
//!     └──── cancel ─────────┤
//!     └──── submit (valid) ─┘
//! ```
//!
//! While an element of an array is editing, its parent's accessor holds the
//! edit token: siblings have their lifecycle controls disabled and the
//! array refuses structural changes until the edit ends.

use super::Node;
use crate::accessor::Accessor;
use crate::callback::CallbackEvent;
use crate::config::Validator;
use crate::error::BindError;
use crate::types::{EditState, Value};

impl Node {
    /// Clean → Editing.
    ///
    /// Snapshots every committed value as the pending value. With
    /// `force_dirty`, every field reports dirty until the edit ends.
    pub fn start_edit(&self, force_dirty: bool) -> Result<(), BindError> {
        self.ensure_alive()?;
        self.ensure_state("start edit", EditState::Clean)?;
        self.lock_siblings()?;

        {
            let mut state = self.inner.state.borrow_mut();
            for accessor in state.accessors.iter_mut() {
                accessor.edit_start(&self.inner.instance, force_dirty);
            }
            state.edit_state = EditState::Editing;
        }

        self.refresh_controls();
        self.update_ui();
        log::debug!("{} {:?}: editing", self.instance().type_name(), self.id());
        self.fire(CallbackEvent::EditStart);
        Ok(())
    }

    /// Editing → Clean, discarding pending values.
    pub fn cancel(&self) -> Result<(), BindError> {
        self.ensure_alive()?;
        self.ensure_state("cancel", EditState::Editing)?;

        {
            let mut state = self.inner.state.borrow_mut();
            for accessor in state.accessors.iter_mut() {
                accessor.edit_cancel();
            }
            state.edit_state = EditState::Clean;
        }

        self.unlock_siblings();
        self.refresh_controls();
        self.update_ui();
        log::debug!("{} {:?}: edit cancelled", self.instance().type_name(), self.id());
        self.fire(CallbackEvent::EditCancel);
        Ok(())
    }

    /// Editing → Clean, committing pending values.
    ///
    /// All validators run first. If any fails nothing is committed, the node
    /// stays in Editing and `Ok(false)` is returned. A value refused by the
    /// instance rolls back the fields already written and is an error.
    ///
    /// On success fires `onEditSubmit`, then `onChange` once per field that
    /// was dirty.
    pub fn submit(&self) -> Result<bool, BindError> {
        self.ensure_alive()?;
        self.ensure_state("submit", EditState::Editing)?;
        let instance = &self.inner.instance;

        let checks: Vec<(String, Validator, Value)> = {
            let state = self.inner.state.borrow();
            state
                .accessors
                .iter()
                .filter_map(Accessor::as_scalar)
                .filter_map(|scalar| {
                    let (validator, value) = scalar.validation(instance)?;
                    Some((scalar.field().to_string(), validator, value))
                })
                .collect()
        };
        for (field, validator, value) in &checks {
            if !validator(value) {
                log::debug!("{}: `{}` failed validation", instance.type_name(), field);
                return Ok(false);
            }
        }

        let dirty = self.dirty_fields();

        {
            let mut state = self.inner.state.borrow_mut();
            let mut written: Vec<(String, Value)> = Vec::new();
            for scalar in state.accessors.iter().filter_map(Accessor::as_scalar) {
                let Some(pending) = scalar.pending() else {
                    continue;
                };
                let previous = scalar.get(instance);
                if *pending == previous {
                    continue;
                }
                if !instance.write(scalar.field(), pending.clone()) {
                    for (field, value) in written.into_iter().rev() {
                        instance.write(&field, value);
                    }
                    log::error!("{}: rejected value for `{}`", instance.type_name(), scalar.field());
                    return Err(BindError::Rejected {
                        type_name: instance.type_name(),
                        field: scalar.field().to_string(),
                    });
                }
                written.push((scalar.field().to_string(), previous));
            }

            for accessor in state.accessors.iter_mut() {
                match accessor {
                    Accessor::Scalar(scalar) => {
                        scalar.edit_submit();
                    }
                    Accessor::Array(array) => array.edit_cancel(),
                }
            }
            state.edit_state = EditState::Clean;
        }

        self.unlock_siblings();
        self.refresh_controls();
        self.update_ui();
        log::debug!("{} {:?}: submitted {:?}", instance.type_name(), self.id(), dirty);

        self.fire(CallbackEvent::EditSubmit);
        for field in dirty {
            self.fire(CallbackEvent::Change { field });
        }
        Ok(true)
    }

    /// Remove this node's instance from the parent's array.
    pub fn remove_self(&self) -> Result<(), BindError> {
        self.ensure_alive()?;
        let link = self.parent_link().ok_or(BindError::NoParent)?;
        self.ensure_state("remove", EditState::Clean)?;
        let parent = self.parent().ok_or(BindError::Destroyed)?;
        parent.remove_child(&link.field, self.instance())
    }

    /// Fire `onReset`, then re-sync array children with the instance and
    /// refresh every control. Clean nodes only.
    pub fn reset(&self) -> Result<(), BindError> {
        self.ensure_alive()?;
        self.ensure_state("reset", EditState::Clean)?;
        for field in self.array_fields() {
            self.with_array(&field, |array| array.ensure_unlocked())??;
        }

        self.fire(CallbackEvent::Reset);
        self.sync_arrays()?;
        self.update_ui();
        log::debug!("{} {:?}: reset", self.instance().type_name(), self.id());
        Ok(())
    }

    // =========================================================================
    // Sibling Coordination
    // =========================================================================

    /// Take the parent's edit token and disable the siblings.
    ///
    /// Skipped while the parent is still being constructed; it adopts
    /// editing children once registered.
    fn lock_siblings(&self) -> Result<(), BindError> {
        let (Some(link), Some(parent)) = (self.parent_link(), self.parent()) else {
            return Ok(());
        };
        parent.with_array_mut(&link.field, |array| array.lock(self.id()))??;
        parent.enable_siblings(&link.field, Some(self.id()), false)
    }

    fn unlock_siblings(&self) {
        let (Some(link), Some(parent)) = (self.parent_link(), self.parent()) else {
            return;
        };
        let released = parent
            .with_array_mut(&link.field, |array| array.unlock(self.id()))
            .unwrap_or(false);
        if !released {
            return;
        }
        if let Err(err) = parent.enable_siblings(&link.field, Some(self.id()), true) {
            log::warn!(
                "{}.{}: could not re-enable siblings: {}",
                parent.instance().type_name(),
                link.field,
                err
            );
        }
    }

    fn ensure_state(&self, op: &'static str, expected: EditState) -> Result<(), BindError> {
        let state = self.edit_state();
        if state != expected {
            return Err(BindError::InvalidTransition { op, state });
        }
        Ok(())
    }
}
