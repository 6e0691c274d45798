//! The editing engine: one open document's model, spatial index, router,
//! and undo log behind a single mutation surface.
//!
//! All access is sequential within one control flow; the index and log
//! never hold authoritative geometry, so keeping them consistent is a
//! matter of calling through this façade rather than mutating the model
//! directly. Drag-style interactions are bracketed by
//! `begin_gesture`/`commit_gesture`: previews update the model, index, and
//! paths live, and only the commit appends one (coalescible) log entry.

use crate::config::EngineConfig;
use crate::error::{EngineWarning, HistoryError, RouteError};
use crate::geom::{Bounds, Point};
use crate::history::{ActionKind, CoalesceKey, UndoDelta, UndoEntry, UndoLog};
use crate::index::SpatialIndex;
use crate::log::warn;
use crate::model::{
    Connection, ConnectionId, DiagramModel, ObjectId, ObjectKind, PathStyle, PortRef, PortSide,
};
use crate::router::{self, Endpoint};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Default)]
struct Gesture {
    /// Bounds of every touched entity as they were when the gesture
    /// began; `cancel_gesture` restores exactly these.
    pristine: BTreeMap<ObjectId, Bounds>,
}

pub struct DiagramEngine {
    config: EngineConfig,
    model: DiagramModel,
    index: SpatialIndex,
    log: UndoLog,
    gesture: Option<Gesture>,
    warnings: Vec<EngineWarning>,
}

impl Default for DiagramEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl DiagramEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            index: SpatialIndex::new(&config.index),
            log: UndoLog::new(config.history.clone()),
            config,
            model: DiagramModel::new(),
            gesture: None,
            warnings: Vec::new(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Read-only view of the object graph, for rendering collaborators.
    pub fn model(&self) -> &DiagramModel {
        &self.model
    }

    // ── Construction ────────────────────────────────────────────────

    pub fn add_component(&mut self, bounds: Bounds, label: &str) -> ObjectId {
        self.add_object(ObjectKind::Component, bounds, label)
    }

    pub fn add_compartment(&mut self, bounds: Bounds, label: &str) -> ObjectId {
        self.add_object(ObjectKind::Compartment, bounds, label)
    }

    pub fn add_junction(&mut self, bounds: Bounds, label: &str) -> ObjectId {
        self.add_object(ObjectKind::Junction, bounds, label)
    }

    fn add_object(&mut self, kind: ObjectKind, bounds: Bounds, label: &str) -> ObjectId {
        let id = self.model.add_object(kind, bounds, label);
        self.index.insert(id, bounds);
        let object = self
            .model
            .object(id)
            .expect("object just inserted")
            .clone();
        self.log.commit(UndoEntry::new(
            "add object",
            CoalesceKey::new(vec![id], ActionKind::InsertObject),
            vec![UndoDelta::InsertObject { object }],
        ));
        id
    }

    /// Adds a port with a side-midpoint derived anchor, or an explicit
    /// offset from the object's minimum corner.
    pub fn add_port(
        &mut self,
        object: ObjectId,
        side: PortSide,
        offset: Option<Point>,
    ) -> Option<PortRef> {
        let port_ref = self.model.add_port(object, side, offset)?;
        let port = self.model.object(object)?.ports[port_ref.port];
        self.log.commit(UndoEntry::new(
            "add port",
            CoalesceKey::new(vec![object], ActionKind::InsertPort),
            vec![UndoDelta::InsertPort { object, port }],
        ));
        Some(port_ref)
    }

    /// Connects two ports. Splay offsets are reassigned for the whole
    /// sibling group sharing the endpoint pair, not just the newcomer.
    pub fn connect(
        &mut self,
        source: PortRef,
        target: PortRef,
        style: PathStyle,
    ) -> Option<ConnectionId> {
        let id = self.model.connect(source, target, style)?;
        let pair = self
            .model
            .connection(id)
            .expect("connection just inserted")
            .endpoint_pair();
        self.assign_splay(pair);
        self.reroute_dirty();
        let connection = self
            .model
            .connection(id)
            .expect("connection just inserted")
            .clone();
        self.log.commit(UndoEntry::new(
            "connect",
            CoalesceKey::new(vec![source.object, target.object], ActionKind::InsertConnection),
            vec![UndoDelta::InsertConnection { connection }],
        ));
        Some(id)
    }

    /// Removes a connection; unknown ids are a no-op. Surviving siblings
    /// are re-splayed.
    pub fn disconnect(&mut self, id: ConnectionId) {
        let Some(connection) = self.model.remove_connection(id) else {
            return;
        };
        let pair = connection.endpoint_pair();
        self.assign_splay(pair);
        self.reroute_dirty();
        self.log.commit(UndoEntry::new(
            "disconnect",
            CoalesceKey::new(
                vec![connection.source.object, connection.target.object],
                ActionKind::RemoveConnection,
            ),
            vec![UndoDelta::RemoveConnection { connection }],
        ));
    }

    /// Removes an object. Connections touching it are left in place but
    /// become dangling: their cached paths are dropped and `route`
    /// reports `DanglingEndpoint` until the caller disconnects or
    /// re-homes them. Unknown ids are a no-op.
    pub fn remove_object(&mut self, id: ObjectId) {
        let touching = self.model.connections_touching(id);
        let Some(object) = self.model.remove_object(id) else {
            return;
        };
        self.index.remove(id);
        for conn_id in touching {
            if let Some(connection) = self.model.connection_mut(conn_id) {
                connection.dirty = true;
            }
        }
        self.reroute_dirty();
        self.log.commit(UndoEntry::new(
            "remove object",
            CoalesceKey::new(vec![id], ActionKind::RemoveObject),
            vec![UndoDelta::RemoveObject { object }],
        ));
    }

    // ── Geometry changes ────────────────────────────────────────────

    /// Authoritative bounds change. Updates the index, recomputes
    /// affected connection paths, and commits one coalescible log entry.
    /// Inside a gesture this is a live preview and commits nothing.
    /// Unknown ids are a no-op.
    pub fn on_geometry_changed(&mut self, id: ObjectId, bounds: Bounds) {
        let Some(before) = self.model.set_bounds(id, bounds) else {
            return;
        };
        self.index.update(id, bounds);
        self.reroute_dirty();

        if let Some(gesture) = &mut self.gesture {
            gesture.pristine.entry(id).or_insert(before);
            return;
        }

        let kind = if before.extent().approx_eq(bounds.extent()) {
            ActionKind::Move
        } else {
            ActionKind::Resize
        };
        self.log.commit(UndoEntry::new(
            "move",
            CoalesceKey::new(vec![id], kind),
            vec![UndoDelta::Bounds {
                id,
                before,
                after: bounds,
            }],
        ));
    }

    // ── Gestures ────────────────────────────────────────────────────

    /// Starts a bracketed interaction. A gesture already in progress is
    /// kept; the caller is expected to commit or cancel first.
    pub fn begin_gesture(&mut self) {
        if self.gesture.is_none() {
            // A new gesture is a new undo step even if it re-touches the
            // entities of the previous one.
            self.log.break_coalescing();
            self.gesture = Some(Gesture::default());
        }
    }

    pub fn gesture_active(&self) -> bool {
        self.gesture.is_some()
    }

    /// Non-committing preview of a bounds change during a gesture. The
    /// model, index, and paths update live; no log entry is created.
    pub fn preview_move(&mut self, id: ObjectId, bounds: Bounds) {
        self.on_geometry_changed(id, bounds);
    }

    /// Ends the gesture, committing exactly one log entry covering every
    /// entity the previews touched. A gesture that moved nothing leaves
    /// the log untouched.
    pub fn commit_gesture(&mut self, label: &str) {
        let Some(gesture) = self.gesture.take() else {
            return;
        };
        let mut deltas = Vec::new();
        let mut entities = Vec::new();
        let mut resized = false;
        for (id, before) in gesture.pristine {
            let Some(object) = self.model.object(id) else {
                continue;
            };
            if object.bounds == before {
                continue;
            }
            resized |= !before.extent().approx_eq(object.bounds.extent());
            entities.push(id);
            deltas.push(UndoDelta::Bounds {
                id,
                before,
                after: object.bounds,
            });
        }
        if deltas.is_empty() {
            return;
        }
        let kind = if resized {
            ActionKind::Resize
        } else {
            ActionKind::Move
        };
        self.log
            .commit(UndoEntry::new(label, CoalesceKey::new(entities, kind), deltas));
    }

    /// Discards the gesture, restoring every touched entity's bounds, the
    /// index, and the computed paths to their pre-gesture state. The log
    /// was never touched by previews, so it needs no repair.
    pub fn cancel_gesture(&mut self) {
        let Some(gesture) = self.gesture.take() else {
            return;
        };
        for (id, before) in gesture.pristine {
            if self.model.set_bounds(id, before).is_some() {
                self.index.update(id, before);
            }
        }
        self.reroute_dirty();
    }

    // ── Undo/redo ───────────────────────────────────────────────────

    pub fn can_undo(&self) -> bool {
        self.log.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.log.can_redo()
    }

    pub fn undo_label(&self) -> Option<&str> {
        self.log.undo_label()
    }

    pub fn redo_label(&self) -> Option<&str> {
        self.log.redo_label()
    }

    /// Reverts the most recent undoable entry and returns the touched
    /// entity ids (already re-indexed and re-routed here; callers use the
    /// ids to refresh their own dependent state, e.g. selection handles).
    pub fn undo(&mut self) -> Result<Vec<ObjectId>, HistoryError> {
        let touched = self
            .log
            .undo(&mut self.model)
            .inspect_err(|err| self.note_history_error(*err))?;
        self.sync_after_history(&touched);
        Ok(touched)
    }

    pub fn redo(&mut self) -> Result<Vec<ObjectId>, HistoryError> {
        let touched = self
            .log
            .redo(&mut self.model)
            .inspect_err(|err| self.note_history_error(*err))?;
        self.sync_after_history(&touched);
        Ok(touched)
    }

    fn note_history_error(&mut self, err: HistoryError) {
        let HistoryError::Truncated { dropped } = err;
        warn!("history truncated, {} entries dropped", dropped);
        self.warnings.push(EngineWarning::HistoryTruncated { dropped });
    }

    fn sync_after_history(&mut self, touched: &[ObjectId]) {
        for &id in touched {
            match self.model.object(id) {
                Some(object) => self.index.update(id, object.bounds),
                None => self.index.remove(id),
            }
        }
        let mut pairs: BTreeSet<(ObjectId, ObjectId)> = BTreeSet::new();
        for connection in self.model.connections() {
            if touched.contains(&connection.source.object)
                || touched.contains(&connection.target.object)
            {
                pairs.insert(connection.endpoint_pair());
            }
        }
        for pair in pairs {
            self.assign_splay(pair);
        }
        self.reroute_dirty();
    }

    // ── Queries ─────────────────────────────────────────────────────

    /// Pull-based path query for rendering. Recomputes lazily when the
    /// cached path was invalidated by a geometry change.
    pub fn route(&mut self, id: ConnectionId) -> Result<&[Point], RouteError> {
        let connection = self
            .model
            .connection(id)
            .ok_or(RouteError::UnknownConnection(id))?;
        if connection.dirty {
            self.recompute_connection(id)?;
        }
        Ok(&self
            .model
            .connection(id)
            .expect("checked above")
            .points)
    }

    /// Nearest-first pointer candidates; the caller applies any z-order
    /// tie-break on top of the deterministic distance order.
    pub fn hit_test(&self, point: Point, tolerance: f32) -> Vec<ObjectId> {
        self.index
            .query_point(point, tolerance)
            .into_iter()
            .filter(|id| self.model.contains_object(*id))
            .collect()
    }

    /// Drains non-blocking conditions accumulated since the last call.
    pub fn take_warnings(&mut self) -> Vec<EngineWarning> {
        std::mem::take(&mut self.warnings)
    }

    // ── Internals ───────────────────────────────────────────────────

    /// Reassigns splay offsets for the whole sibling group of an endpoint
    /// pair; ranks follow ascending connection id, so unrelated changes
    /// never reshuffle a group.
    fn assign_splay(&mut self, pair: (ObjectId, ObjectId)) {
        let siblings = self.model.siblings_of_pair(pair);
        let mut clamped_any = false;
        for (rank, id) in siblings.iter().enumerate() {
            let (offset, clamped) = router::splay_offset_for_rank(rank, &self.config.router);
            clamped_any |= clamped;
            if let Some(connection) = self.model.connection_mut(*id)
                && connection.splay_offset != offset
            {
                connection.splay_offset = offset;
                connection.dirty = true;
            }
        }
        if clamped_any {
            warn!(
                "splay overflow between {} and {}: {} siblings",
                pair.0,
                pair.1,
                siblings.len()
            );
            self.warnings.push(EngineWarning::SplayOverflow {
                source: pair.0,
                target: pair.1,
                siblings: siblings.len(),
                max_splay: self.config.router.max_splay,
            });
        }
    }

    fn resolve_endpoints(&self, connection: &Connection) -> Result<(Endpoint, Endpoint), RouteError> {
        let resolve = |port: PortRef| -> Result<Endpoint, RouteError> {
            let (anchor, side) =
                self.model
                    .port_anchor(port)
                    .ok_or(RouteError::DanglingEndpoint {
                        connection: connection.id,
                        missing: port.object,
                    })?;
            Ok(Endpoint {
                object: port.object,
                anchor,
                side,
            })
        };
        Ok((resolve(connection.source)?, resolve(connection.target)?))
    }

    fn recompute_connection(&mut self, id: ConnectionId) -> Result<(), RouteError> {
        let Some(connection) = self.model.connection(id) else {
            return Err(RouteError::UnknownConnection(id));
        };
        let style = connection.style;
        let splay_offset = connection.splay_offset;
        match self.resolve_endpoints(connection) {
            Ok((source, target)) => {
                let points = router::compute_path(
                    source,
                    target,
                    style,
                    splay_offset,
                    &self.index,
                    &self.config.router,
                );
                let connection = self.model.connection_mut(id).expect("checked above");
                connection.points = points;
                connection.dirty = false;
                Ok(())
            }
            Err(err) => {
                // Never keep a stale path around for a dangling endpoint;
                // the caller decides whether to drop or re-home.
                let connection = self.model.connection_mut(id).expect("checked above");
                connection.points.clear();
                Err(err)
            }
        }
    }

    fn reroute_dirty(&mut self) {
        let dirty: Vec<ConnectionId> = self
            .model
            .connections()
            .filter(|connection| connection.dirty)
            .map(|connection| connection.id)
            .collect();
        for id in dirty {
            // Dangling connections stay dirty with an empty path; `route`
            // surfaces the error to whoever asks.
            let _ = self.recompute_connection(id);
        }
    }
}
