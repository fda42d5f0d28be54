//! Change Tracker - Saved/changed timestamps for a bound tree.
//!
//! Watches a root node for committed changes anywhere below it and answers
//! "are there unsaved changes" and "what should the status line say".
//!
//! ```text
//! Not saved                  nothing saved yet
//! Saved 1/2/24,3:04p         saved, nothing changed since
//! * Last saved 1/2/24,3:04p  changed after the last save
//! ```

use std::cell::Cell;
use std::rc::Rc;

use chrono::{DateTime, Local};

use crate::node::Node;

struct TrackerState {
    changed: Cell<Option<DateTime<Local>>>,
    saved: Cell<Option<DateTime<Local>>>,
    listening: Cell<bool>,
}

/// Shared change/save bookkeeping. Clones share state.
#[derive(Clone)]
pub struct ChangeTracker {
    state: Rc<TrackerState>,
}

impl Default for ChangeTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ChangeTracker {
    pub fn new() -> Self {
        Self {
            state: Rc::new(TrackerState {
                changed: Cell::new(None),
                saved: Cell::new(None),
                listening: Cell::new(true),
            }),
        }
    }

    /// Tracker for data last saved at `saved`.
    pub fn with_saved(saved: DateTime<Local>) -> Self {
        let tracker = Self::new();
        tracker.state.saved.set(Some(saved));
        tracker
    }

    /// Mark changed whenever `node` or any descendant commits a change.
    pub fn watch(&self, node: &Node) {
        let tracker = self.clone();
        node.subscribe(move |_, _| tracker.mark_changed());
    }

    pub fn mark_changed(&self) {
        self.mark_changed_at(Local::now());
    }

    /// Ignored while a save is in progress.
    pub fn mark_changed_at(&self, at: DateTime<Local>) {
        if self.state.listening.get() {
            self.state.changed.set(Some(at));
        }
    }

    pub fn mark_saved_at(&self, at: DateTime<Local>) {
        self.state.saved.set(Some(at));
        self.state.changed.set(Some(at));
    }

    /// Stamp both times with now and run `save` with change tracking
    /// suspended, so updates made while serializing do not count.
    pub fn save_with<R>(&self, save: impl FnOnce() -> R) -> R {
        self.state.listening.set(false);
        self.mark_saved_at(Local::now());
        let result = save();
        self.state.listening.set(true);
        log::debug!("saved at {:?}", self.state.saved.get());
        result
    }

    pub fn changed_at(&self) -> Option<DateTime<Local>> {
        self.state.changed.get()
    }

    pub fn saved_at(&self) -> Option<DateTime<Local>> {
        self.state.saved.get()
    }

    pub fn has_saved(&self) -> bool {
        self.state.saved.get().is_some()
    }

    /// Changed and either never saved or changed after the last save.
    pub fn has_changed(&self) -> bool {
        match (self.state.changed.get(), self.state.saved.get()) {
            (Some(changed), Some(saved)) => changed > saved,
            (Some(_), None) => true,
            (None, _) => false,
        }
    }

    pub fn has_unsaved_changes(&self) -> bool {
        self.has_changed()
    }

    pub fn status(&self) -> String {
        let changed = self.has_changed();
        let mut status = String::new();
        if changed {
            status.push_str("* ");
        }
        match self.state.saved.get() {
            Some(saved) => {
                status.push_str(if changed { "Last saved " } else { "Saved " });
                status.push_str(&format_time(saved));
            }
            None => status.push_str("Not saved"),
        }
        status
    }
}

/// Short date and time, e.g. `1/2/24,3:04p`.
fn format_time(at: DateTime<Local>) -> String {
    at.format("%-m/%-d/%y,%-I:%M%p")
        .to_string()
        .replace("AM", "a")
        .replace("PM", "p")
}
