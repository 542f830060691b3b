//! # Detail View State
//!
//! The record currently open in the detail drawer. Observers subscribe to a
//! `watch` channel and only see a new value when the state actually changed.

use serde_json::Value;
use tokio::sync::watch;

use crate::shared::{merge_fields, record_id};

/// What the detail view is showing
#[derive(Debug, Clone, PartialEq)]
pub struct DetailState {
    /// The record as displayed, optimistic edits included
    pub record: Value,
    /// The last version the backend confirmed
    pub confirmed: Value,
    /// True while queued edits to this record are awaiting confirmation
    pub unreconciled: bool,
}

impl DetailState {
    pub fn id(&self) -> Option<i64> {
        record_id(&self.record)
    }
}

#[derive(Debug)]
pub struct DetailView {
    state: watch::Sender<Option<DetailState>>,
}

impl Default for DetailView {
    fn default() -> Self {
        Self::new()
    }
}

impl DetailView {
    pub fn new() -> Self {
        let (state, _) = watch::channel(None);
        Self { state }
    }

    /// Show a record fetched from the backend
    pub fn open(&self, record: Value) {
        self.state.send_replace(Some(DetailState {
            confirmed: record.clone(),
            record,
            unreconciled: false,
        }));
    }

    pub fn close(&self) {
        self.state.send_if_modified(|state| state.take().is_some());
    }

    pub fn current(&self) -> Option<DetailState> {
        self.state.borrow().clone()
    }

    pub fn open_id(&self) -> Option<i64> {
        self.state.borrow().as_ref().and_then(DetailState::id)
    }

    pub fn is_open(&self) -> bool {
        self.state.borrow().is_some()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<DetailState>> {
        self.state.subscribe()
    }

    /// Merge a local edit into the displayed record if it is the open one
    pub(crate) fn apply_optimistic(&self, id: i64, changes: &Value) -> bool {
        self.modify_if_open(id, |state| {
            merge_fields(&mut state.record, changes);
            state.unreconciled = true;
        })
    }

    /// Take the backend's version of the record
    ///
    /// While other edits to the record are still queued the displayed value
    /// keeps them; once none remain it is replaced by `authoritative`.
    pub(crate) fn apply_confirmed(&self, id: i64, authoritative: &Value, settled: bool) -> bool {
        self.modify_if_open(id, |state| {
            merge_fields(&mut state.confirmed, authoritative);
            if settled {
                state.record = state.confirmed.clone();
                state.unreconciled = false;
            }
        })
    }

    /// Drop optimistic edits after a rejected write
    pub(crate) fn roll_back(&self, id: i64, settled: bool) -> bool {
        self.modify_if_open(id, |state| {
            if settled {
                state.record = state.confirmed.clone();
                state.unreconciled = false;
            }
        })
    }

    /// Close the view if it shows `id`
    pub fn close_if_showing(&self, id: i64) -> bool {
        self.state.send_if_modified(|state| {
            if state.as_ref().and_then(DetailState::id) == Some(id) {
                *state = None;
                true
            } else {
                false
            }
        })
    }

    fn modify_if_open(&self, id: i64, apply: impl FnOnce(&mut DetailState)) -> bool {
        self.state.send_if_modified(|state| match state {
            Some(current) if current.id() == Some(id) => {
                let before = current.clone();
                apply(current);
                *current != before
            }
            _ => false,
        })
    }
}
