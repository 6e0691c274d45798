//! Linear undo/redo log.
//!
//! Every committed mutation is an entry of invertible deltas holding
//! absolute before/after state, so replaying in either direction restores
//! bit-identical geometry regardless of how entries were coalesced. The
//! log holds ids and copied payloads only; it applies deltas against the
//! model it is handed, never through retained references.

use crate::config::HistoryConfig;
use crate::error::HistoryError;
use crate::geom::Bounds;
use crate::model::{Connection, DiagramModel, DiagramObject, ObjectId, Port};
use std::time::Instant;

/// Operation kind half of the coalescing key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    Move,
    Resize,
    InsertObject,
    RemoveObject,
    InsertPort,
    InsertConnection,
    RemoveConnection,
}

/// Entities + operation kind; temporally adjacent commits with an equal
/// key merge into one undo step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoalesceKey {
    pub entities: Vec<ObjectId>,
    pub kind: ActionKind,
}

impl CoalesceKey {
    pub fn new(mut entities: Vec<ObjectId>, kind: ActionKind) -> Self {
        entities.sort_unstable();
        entities.dedup();
        Self { entities, kind }
    }
}

/// One invertible mutation. Bounds deltas carry absolute before/after
/// values; structural deltas carry the full removed/inserted payload so
/// the inverse can reconstruct it.
#[derive(Debug, Clone)]
pub enum UndoDelta {
    Bounds {
        id: ObjectId,
        before: Bounds,
        after: Bounds,
    },
    InsertObject {
        object: DiagramObject,
    },
    RemoveObject {
        object: DiagramObject,
    },
    InsertPort {
        object: ObjectId,
        port: Port,
    },
    InsertConnection {
        connection: Connection,
    },
    RemoveConnection {
        connection: Connection,
    },
}

impl UndoDelta {
    fn touched(&self, out: &mut Vec<ObjectId>) {
        match self {
            UndoDelta::Bounds { id, .. } | UndoDelta::InsertPort { object: id, .. } => {
                out.push(*id)
            }
            UndoDelta::InsertObject { object } | UndoDelta::RemoveObject { object } => {
                out.push(object.id)
            }
            UndoDelta::InsertConnection { connection }
            | UndoDelta::RemoveConnection { connection } => {
                out.push(connection.source.object);
                out.push(connection.target.object);
            }
        }
    }

    /// Whether application in either direction can still find its target.
    fn applicable(&self, model: &DiagramModel) -> bool {
        match self {
            UndoDelta::Bounds { id, .. } => model.contains_object(*id),
            UndoDelta::InsertObject { .. } | UndoDelta::RemoveObject { .. } => true,
            UndoDelta::InsertPort { object, .. } => model.contains_object(*object),
            UndoDelta::InsertConnection { connection }
            | UndoDelta::RemoveConnection { connection } => {
                model.contains_object(connection.source.object)
                    && model.contains_object(connection.target.object)
            }
        }
    }

    fn apply(&self, model: &mut DiagramModel, forward: bool) {
        match self {
            UndoDelta::Bounds { id, before, after } => {
                let value = if forward { after } else { before };
                model.set_bounds(*id, *value);
            }
            UndoDelta::InsertObject { object } => {
                if forward {
                    model.restore_object(object.clone());
                } else {
                    model.remove_object(object.id);
                }
            }
            UndoDelta::RemoveObject { object } => {
                if forward {
                    model.remove_object(object.id);
                } else {
                    model.restore_object(object.clone());
                }
            }
            UndoDelta::InsertPort { object, port } => {
                if forward {
                    model.push_port(*object, *port);
                } else {
                    model.pop_port(*object);
                }
            }
            UndoDelta::InsertConnection { connection } => {
                if forward {
                    model.restore_connection(connection.clone());
                } else {
                    model.remove_connection(connection.id);
                }
            }
            UndoDelta::RemoveConnection { connection } => {
                if forward {
                    model.remove_connection(connection.id);
                } else {
                    model.restore_connection(connection.clone());
                }
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct UndoEntry {
    pub label: String,
    pub key: CoalesceKey,
    pub deltas: Vec<UndoDelta>,
    committed_at: Instant,
}

impl UndoEntry {
    pub fn new(label: &str, key: CoalesceKey, deltas: Vec<UndoDelta>) -> Self {
        Self {
            label: label.to_string(),
            key,
            deltas,
            committed_at: Instant::now(),
        }
    }

    fn touched(&self) -> Vec<ObjectId> {
        let mut out = Vec::new();
        for delta in &self.deltas {
            delta.touched(&mut out);
        }
        out.sort_unstable();
        out.dedup();
        out
    }

    fn coalescible(&self) -> bool {
        self.deltas
            .iter()
            .all(|delta| matches!(delta, UndoDelta::Bounds { .. }))
    }
}

/// The log: committed entries plus a cursor separating applied (undoable)
/// from undone (redoable) entries.
#[derive(Debug)]
pub struct UndoLog {
    entries: Vec<UndoEntry>,
    cursor: usize,
    config: HistoryConfig,
    coalesce_barrier: bool,
}

impl UndoLog {
    pub fn new(config: HistoryConfig) -> Self {
        Self {
            entries: Vec::new(),
            cursor: 0,
            config,
            coalesce_barrier: false,
        }
    }

    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    pub fn can_redo(&self) -> bool {
        self.cursor < self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Label of the entry `undo` would revert, for menu display.
    pub fn undo_label(&self) -> Option<&str> {
        self.cursor
            .checked_sub(1)
            .map(|idx| self.entries[idx].label.as_str())
    }

    pub fn redo_label(&self) -> Option<&str> {
        self.entries.get(self.cursor).map(|e| e.label.as_str())
    }

    /// Prevents the next commit from merging into the previous entry,
    /// e.g. at a gesture boundary between two drags of the same object.
    pub fn break_coalescing(&mut self) {
        self.coalesce_barrier = true;
    }

    /// Appends an entry, coalescing into the previous one when the keys
    /// match inside the time window. A coalesced merge keeps the older
    /// before-state and the newer after-state, so one undo reverts the
    /// whole run. Any redo tail is discarded either way.
    pub fn commit(&mut self, entry: UndoEntry) {
        self.entries.truncate(self.cursor);

        let barrier = std::mem::take(&mut self.coalesce_barrier);
        if !barrier
            && let Some(last) = self.entries.last_mut()
            && last.key == entry.key
            && last.coalescible()
            && entry.coalescible()
            && entry
                .committed_at
                .duration_since(last.committed_at)
                .as_millis() as u64
                <= self.config.coalesce_window_ms
        {
            merge_bounds_deltas(last, entry);
            return;
        }

        self.entries.push(entry);
        self.cursor = self.entries.len();

        if self.config.max_depth > 0 {
            while self.entries.len() > self.config.max_depth {
                self.entries.remove(0);
                self.cursor = self.cursor.saturating_sub(1);
            }
        }
    }

    /// Reverts the entry below the cursor, returning the touched entity
    /// ids. An empty vec means there was nothing to undo. If the entry no
    /// longer applies (its target was removed outside the log), it and
    /// everything above it are discarded.
    pub fn undo(&mut self, model: &mut DiagramModel) -> Result<Vec<ObjectId>, HistoryError> {
        if self.cursor == 0 {
            return Ok(Vec::new());
        }
        let idx = self.cursor - 1;
        if !self.entries[idx]
            .deltas
            .iter()
            .all(|delta| delta.applicable(model))
        {
            return Err(self.truncate_from(idx));
        }
        for delta in self.entries[idx].deltas.iter().rev() {
            delta.apply(model, false);
        }
        self.cursor = idx;
        Ok(self.entries[idx].touched())
    }

    /// Re-applies the entry above the cursor; symmetric to `undo`.
    pub fn redo(&mut self, model: &mut DiagramModel) -> Result<Vec<ObjectId>, HistoryError> {
        if self.cursor >= self.entries.len() {
            return Ok(Vec::new());
        }
        let idx = self.cursor;
        if !self.entries[idx]
            .deltas
            .iter()
            .all(|delta| delta.applicable(model))
        {
            return Err(self.truncate_from(idx));
        }
        for delta in self.entries[idx].deltas.iter() {
            delta.apply(model, true);
        }
        self.cursor = idx + 1;
        Ok(self.entries[idx].touched())
    }

    fn truncate_from(&mut self, idx: usize) -> HistoryError {
        let dropped = self.entries.len() - idx;
        self.entries.truncate(idx);
        self.cursor = self.cursor.min(self.entries.len());
        HistoryError::Truncated { dropped }
    }
}

/// Per-id merge of two coalescible entries: ids present in both keep the
/// older `before` and take the newer `after`; ids only in the newer entry
/// are appended.
fn merge_bounds_deltas(last: &mut UndoEntry, entry: UndoEntry) {
    last.committed_at = entry.committed_at;
    for delta in entry.deltas {
        let UndoDelta::Bounds { id, before, after } = delta else {
            continue;
        };
        let existing = last.deltas.iter_mut().find_map(|d| match d {
            UndoDelta::Bounds {
                id: existing_id,
                after,
                ..
            } if *existing_id == id => Some(after),
            _ => None,
        });
        match existing {
            Some(slot) => *slot = after,
            None => last.deltas.push(UndoDelta::Bounds { id, before, after }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::Point;
    use crate::model::{ObjectKind, PortSide};

    fn bounds(x0: f32, y0: f32, x1: f32, y1: f32) -> Bounds {
        Bounds::new(Point::new(x0, y0), Point::new(x1, y1))
    }

    fn move_entry(id: ObjectId, before: Bounds, after: Bounds) -> UndoEntry {
        UndoEntry::new(
            "move",
            CoalesceKey::new(vec![id], ActionKind::Move),
            vec![UndoDelta::Bounds { id, before, after }],
        )
    }

    fn model_with_object() -> (DiagramModel, ObjectId) {
        let mut model = DiagramModel::new();
        let id = model.add_object(ObjectKind::Component, bounds(0.0, 0.0, 10.0, 10.0), "o");
        (model, id)
    }

    #[test]
    fn undo_redo_round_trip_restores_geometry() {
        let (mut model, id) = model_with_object();
        let mut log = UndoLog::new(HistoryConfig {
            coalesce_window_ms: 0,
            max_depth: 0,
        });
        let b0 = bounds(0.0, 0.0, 10.0, 10.0);
        let b1 = bounds(5.0, 5.0, 15.0, 15.0);
        let b2 = bounds(9.0, 1.0, 19.0, 11.0);

        model.set_bounds(id, b1);
        log.commit(move_entry(id, b0, b1));
        log.break_coalescing();
        model.set_bounds(id, b2);
        log.commit(move_entry(id, b1, b2));

        while log.can_undo() {
            log.undo(&mut model).unwrap();
        }
        assert_eq!(model.object(id).unwrap().bounds, b0);
        while log.can_redo() {
            log.redo(&mut model).unwrap();
        }
        assert_eq!(model.object(id).unwrap().bounds, b2);
    }

    #[test]
    fn adjacent_moves_coalesce_into_one_entry() {
        let (mut model, id) = model_with_object();
        let mut log = UndoLog::new(HistoryConfig::default());
        let b0 = bounds(0.0, 0.0, 10.0, 10.0);
        let b1 = bounds(5.0, 5.0, 15.0, 15.0);
        let b2 = bounds(6.0, 5.0, 16.0, 15.0);

        model.set_bounds(id, b1);
        log.commit(move_entry(id, b0, b1));
        model.set_bounds(id, b2);
        log.commit(move_entry(id, b1, b2));

        assert_eq!(log.len(), 1);
        log.undo(&mut model).unwrap();
        assert_eq!(model.object(id).unwrap().bounds, b0);
        log.redo(&mut model).unwrap();
        assert_eq!(model.object(id).unwrap().bounds, b2);
    }

    #[test]
    fn different_entities_do_not_coalesce() {
        let (mut model, a) = model_with_object();
        let b = model.add_object(ObjectKind::Component, bounds(40.0, 0.0, 50.0, 10.0), "b");
        let mut log = UndoLog::new(HistoryConfig::default());
        log.commit(move_entry(a, bounds(0.0, 0.0, 10.0, 10.0), bounds(1.0, 0.0, 11.0, 10.0)));
        log.commit(move_entry(b, bounds(40.0, 0.0, 50.0, 10.0), bounds(41.0, 0.0, 51.0, 10.0)));
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn commit_truncates_redo_tail() {
        let (mut model, id) = model_with_object();
        let mut log = UndoLog::new(HistoryConfig {
            coalesce_window_ms: 0,
            max_depth: 0,
        });
        let b0 = bounds(0.0, 0.0, 10.0, 10.0);
        let b1 = bounds(5.0, 0.0, 15.0, 10.0);
        let b2 = bounds(8.0, 0.0, 18.0, 10.0);

        log.commit(move_entry(id, b0, b1));
        log.undo(&mut model).unwrap();
        assert!(log.can_redo());
        log.commit(move_entry(id, b0, b2));
        assert!(!log.can_redo());
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn depth_cap_evicts_oldest() {
        let (_, id) = model_with_object();
        let mut log = UndoLog::new(HistoryConfig {
            coalesce_window_ms: 0,
            max_depth: 3,
        });
        for i in 0..5 {
            let step = i as f32;
            log.commit(move_entry(
                id,
                bounds(step, 0.0, step + 10.0, 10.0),
                bounds(step + 1.0, 0.0, step + 11.0, 10.0),
            ));
        }
        assert_eq!(log.len(), 3);
        assert!(log.can_undo());
    }

    #[test]
    fn missing_target_truncates_history() {
        let (mut model, id) = model_with_object();
        let mut log = UndoLog::new(HistoryConfig {
            coalesce_window_ms: 0,
            max_depth: 0,
        });
        let b0 = bounds(0.0, 0.0, 10.0, 10.0);
        let b1 = bounds(5.0, 0.0, 15.0, 10.0);
        log.commit(move_entry(id, b0, b1));
        log.commit(move_entry(id, b1, b0));

        // The object disappears outside the log's knowledge.
        model.remove_object(id);
        let err = log.undo(&mut model).unwrap_err();
        assert_eq!(err, HistoryError::Truncated { dropped: 2 });
        assert!(log.is_empty());
        assert!(!log.can_undo());
    }

    #[test]
    fn structural_round_trip_restores_connections() {
        let (mut model, a) = model_with_object();
        let b = model.add_object(ObjectKind::Component, bounds(40.0, 0.0, 50.0, 10.0), "b");
        let pa = model.add_port(a, PortSide::East, None).unwrap();
        let pb = model.add_port(b, PortSide::West, None).unwrap();
        let conn_id = model
            .connect(pa, pb, crate::model::PathStyle::Linear)
            .unwrap();

        let mut log = UndoLog::new(HistoryConfig::default());
        let connection = model.remove_connection(conn_id).unwrap();
        log.commit(UndoEntry::new(
            "disconnect",
            CoalesceKey::new(vec![a, b], ActionKind::RemoveConnection),
            vec![UndoDelta::RemoveConnection { connection }],
        ));

        log.undo(&mut model).unwrap();
        assert!(model.connection(conn_id).is_some());
        log.redo(&mut model).unwrap();
        assert!(model.connection(conn_id).is_none());
    }

    #[test]
    fn undoing_port_insertion_dirties_attached_connection() {
        let (mut model, a) = model_with_object();
        let b = model.add_object(ObjectKind::Component, bounds(40.0, 0.0, 50.0, 10.0), "b");
        let pa = model.add_port(a, PortSide::East, None).unwrap();
        let pb = model.add_port(b, PortSide::West, None).unwrap();
        let port = model.object(b).unwrap().ports[pb.port];

        let mut log = UndoLog::new(HistoryConfig::default());
        log.commit(UndoEntry::new(
            "add port",
            CoalesceKey::new(vec![b], ActionKind::InsertPort),
            vec![UndoDelta::InsertPort { object: b, port }],
        ));
        let conn_id = model
            .connect(pa, pb, crate::model::PathStyle::Linear)
            .unwrap();
        model.connection_mut(conn_id).unwrap().dirty = false;

        // Truncation can leave the connection alive while its port entry
        // is undone; the cached path must be invalidated, not served.
        log.undo(&mut model).unwrap();
        let connection = model.connection(conn_id).unwrap();
        assert!(connection.dirty);
        assert!(model.port_anchor(connection.target).is_none());
    }

    #[test]
    fn restoring_connection_without_endpoint_truncates() {
        let (mut model, a) = model_with_object();
        let b = model.add_object(ObjectKind::Component, bounds(40.0, 0.0, 50.0, 10.0), "b");
        let pa = model.add_port(a, PortSide::East, None).unwrap();
        let pb = model.add_port(b, PortSide::West, None).unwrap();
        let conn_id = model
            .connect(pa, pb, crate::model::PathStyle::Linear)
            .unwrap();

        let mut log = UndoLog::new(HistoryConfig::default());
        let connection = model.remove_connection(conn_id).unwrap();
        log.commit(UndoEntry::new(
            "disconnect",
            CoalesceKey::new(vec![a, b], ActionKind::RemoveConnection),
            vec![UndoDelta::RemoveConnection { connection }],
        ));

        model.remove_object(b);
        assert_eq!(
            log.undo(&mut model),
            Err(HistoryError::Truncated { dropped: 1 })
        );
        assert!(log.is_empty());
    }
}
