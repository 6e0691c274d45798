//! The diagram object graph: components, compartments, junctions, their
//! ports, and the connections between ports.
//!
//! The model is the single owner of all authoritative geometry. The
//! spatial index and the undo log hold only identifiers and copied
//! bounds, never references into this arena.

use crate::geom::{Bounds, LayoutValue, Point};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ObjectId(pub u64);

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "o{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "c{}", self.0)
    }
}

/// The closed set of diagram object kinds. Routing and hit-testing match
/// exhaustively on this; there is no open class hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObjectKind {
    Component,
    Compartment,
    Junction,
}

/// Outward-facing side of a port on its parent's bounding rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PortSide {
    East,
    West,
    North,
    South,
}

impl PortSide {
    /// Unit vector pointing away from the parent object.
    pub fn direction(self) -> Point {
        match self {
            PortSide::East => Point::new(1.0, 0.0),
            PortSide::West => Point::new(-1.0, 0.0),
            PortSide::North => Point::new(0.0, -1.0),
            PortSide::South => Point::new(0.0, 1.0),
        }
    }

    pub fn is_horizontal(self) -> bool {
        matches!(self, PortSide::East | PortSide::West)
    }

    /// Default anchor for this side as an offset from the bounds minimum.
    pub fn midpoint_offset(self, bounds: &Bounds) -> Point {
        let w = bounds.width();
        let h = bounds.height();
        match self {
            PortSide::East => Point::new(w, h / 2.0),
            PortSide::West => Point::new(0.0, h / 2.0),
            PortSide::North => Point::new(w / 2.0, 0.0),
            PortSide::South => Point::new(w / 2.0, h),
        }
    }
}

/// An attachment point on an object. The offset is stored relative to the
/// parent's minimum corner so the anchor follows the object under
/// translation; derived offsets re-center on their side when the parent
/// is resized.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Port {
    pub side: PortSide,
    pub offset: LayoutValue<Point>,
}

impl Port {
    pub fn anchor(&self, bounds: &Bounds) -> Point {
        bounds.min + *self.offset.get()
    }
}

/// Identifies one port on one object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PortRef {
    pub object: ObjectId,
    pub port: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagramObject {
    pub id: ObjectId,
    pub kind: ObjectKind,
    pub label: String,
    pub bounds: Bounds,
    pub ports: Vec<Port>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PathStyle {
    Linear,
    Rectilinear,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Connection {
    pub id: ConnectionId,
    pub source: PortRef,
    pub target: PortRef,
    pub style: PathStyle,
    /// Last path computed by the router.
    pub points: Vec<Point>,
    /// Lateral offset assigned from this connection's sibling rank.
    pub splay_offset: f32,
    /// Set when geometry changed since `points` was computed.
    pub dirty: bool,
}

impl Connection {
    /// Unordered endpoint-object pair; connections sharing it are siblings
    /// for splay assignment.
    pub fn endpoint_pair(&self) -> (ObjectId, ObjectId) {
        let a = self.source.object;
        let b = self.target.object;
        if a <= b { (a, b) } else { (b, a) }
    }

    pub fn touches(&self, id: ObjectId) -> bool {
        self.source.object == id || self.target.object == id
    }
}

/// Arena owning every object and connection, keyed by stable ids that are
/// never reused within one model's lifetime.
#[derive(Debug, Clone, Default)]
pub struct DiagramModel {
    objects: BTreeMap<ObjectId, DiagramObject>,
    connections: BTreeMap<ConnectionId, Connection>,
    next_object: u64,
    next_connection: u64,
}

impl DiagramModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_object(&mut self, kind: ObjectKind, bounds: Bounds, label: &str) -> ObjectId {
        let id = ObjectId(self.next_object);
        self.next_object += 1;
        self.objects.insert(
            id,
            DiagramObject {
                id,
                kind,
                label: label.to_string(),
                bounds,
                ports: Vec::new(),
            },
        );
        id
    }

    /// Re-inserts a previously removed object, e.g. when undoing a delete.
    /// The id counter stays monotonic so restored ids are never re-issued.
    pub fn restore_object(&mut self, object: DiagramObject) {
        self.next_object = self.next_object.max(object.id.0 + 1);
        self.objects.insert(object.id, object);
    }

    pub fn remove_object(&mut self, id: ObjectId) -> Option<DiagramObject> {
        self.objects.remove(&id)
    }

    pub fn object(&self, id: ObjectId) -> Option<&DiagramObject> {
        self.objects.get(&id)
    }

    pub fn contains_object(&self, id: ObjectId) -> bool {
        self.objects.contains_key(&id)
    }

    pub fn objects(&self) -> impl Iterator<Item = &DiagramObject> {
        self.objects.values()
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    /// Replaces an object's bounds, returning the previous value. Derived
    /// port offsets re-center on their side when the extent changes;
    /// explicit offsets are left alone. Unknown ids are a no-op.
    pub fn set_bounds(&mut self, id: ObjectId, bounds: Bounds) -> Option<Bounds> {
        let object = self.objects.get_mut(&id)?;
        let old = object.bounds;
        object.bounds = bounds;
        if !old.extent().approx_eq(bounds.extent()) {
            for port in &mut object.ports {
                port.offset.rederive(port.side.midpoint_offset(&bounds));
            }
        }
        for connection in self.connections.values_mut() {
            if connection.touches(id) {
                connection.dirty = true;
            }
        }
        Some(old)
    }

    /// Adds a port on `id` with a side-midpoint derived anchor, or an
    /// explicit offset when given. Returns `None` for unknown objects.
    pub fn add_port(
        &mut self,
        id: ObjectId,
        side: PortSide,
        offset: Option<Point>,
    ) -> Option<PortRef> {
        let object = self.objects.get_mut(&id)?;
        let offset = match offset {
            Some(value) => LayoutValue::Explicit(value),
            None => LayoutValue::Derived(side.midpoint_offset(&object.bounds)),
        };
        object.ports.push(Port { side, offset });
        Some(PortRef {
            object: id,
            port: object.ports.len() - 1,
        })
    }

    /// Re-appends a recorded port verbatim, e.g. when redoing a port
    /// insertion. Unknown objects are a no-op.
    pub fn push_port(&mut self, id: ObjectId, port: Port) {
        if let Some(object) = self.objects.get_mut(&id) {
            object.ports.push(port);
        }
    }

    /// Removes the most recently added port of an object. Only used when
    /// undoing a port insertion, so positional removal is sufficient.
    /// Connections still referencing the popped index are marked dirty so
    /// their cached paths cannot be served stale.
    pub fn pop_port(&mut self, id: ObjectId) -> Option<Port> {
        let object = self.objects.get_mut(&id)?;
        let port = object.ports.pop()?;
        let remaining = object.ports.len();
        for connection in self.connections.values_mut() {
            let stale = (connection.source.object == id && connection.source.port >= remaining)
                || (connection.target.object == id && connection.target.port >= remaining);
            if stale {
                connection.dirty = true;
            }
        }
        Some(port)
    }

    /// Diagram-space anchor and outward side for a port reference.
    pub fn port_anchor(&self, port: PortRef) -> Option<(Point, PortSide)> {
        let object = self.objects.get(&port.object)?;
        let p = object.ports.get(port.port)?;
        Some((p.anchor(&object.bounds), p.side))
    }

    pub fn connect(
        &mut self,
        source: PortRef,
        target: PortRef,
        style: PathStyle,
    ) -> Option<ConnectionId> {
        self.port_anchor(source)?;
        self.port_anchor(target)?;
        let id = ConnectionId(self.next_connection);
        self.next_connection += 1;
        self.connections.insert(
            id,
            Connection {
                id,
                source,
                target,
                style,
                points: Vec::new(),
                splay_offset: 0.0,
                dirty: true,
            },
        );
        Some(id)
    }

    pub fn restore_connection(&mut self, connection: Connection) {
        self.next_connection = self.next_connection.max(connection.id.0 + 1);
        self.connections.insert(connection.id, connection);
    }

    pub fn remove_connection(&mut self, id: ConnectionId) -> Option<Connection> {
        self.connections.remove(&id)
    }

    pub fn connection(&self, id: ConnectionId) -> Option<&Connection> {
        self.connections.get(&id)
    }

    pub fn connection_mut(&mut self, id: ConnectionId) -> Option<&mut Connection> {
        self.connections.get_mut(&id)
    }

    pub fn connections(&self) -> impl Iterator<Item = &Connection> {
        self.connections.values()
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Connections with either endpoint on `id`, ascending by connection id.
    pub fn connections_touching(&self, id: ObjectId) -> Vec<ConnectionId> {
        self.connections
            .values()
            .filter(|connection| connection.touches(id))
            .map(|connection| connection.id)
            .collect()
    }

    /// Sibling group for an endpoint pair, ascending by connection id;
    /// the position in this list is the connection's splay rank.
    pub fn siblings_of_pair(&self, pair: (ObjectId, ObjectId)) -> Vec<ConnectionId> {
        self.connections
            .values()
            .filter(|connection| connection.endpoint_pair() == pair)
            .map(|connection| connection.id)
            .collect()
    }
}
