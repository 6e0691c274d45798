use crate::model::{ConnectionId, ObjectId};
use thiserror::Error;

/// Routing failures surfaced to the caller. Nothing here is fatal: a
/// dangling endpoint means the connection should be dropped or re-homed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RouteError {
    #[error("connection {connection} references removed object {missing}")]
    DanglingEndpoint {
        connection: ConnectionId,
        missing: ObjectId,
    },
    #[error("unknown connection {0}")]
    UnknownConnection(ConnectionId),
}

/// Undo/redo log failures. A truncation drops the unapplicable entry and
/// everything above it; the surviving prefix stays usable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum HistoryError {
    #[error("history truncated, {dropped} entries dropped")]
    Truncated { dropped: usize },
}

/// Non-blocking conditions accumulated by the engine and drained with
/// [`crate::engine::DiagramEngine::take_warnings`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EngineWarning {
    /// More sibling connections than the configured maximum splay can
    /// separate; offsets past the cap clamp and may overlap visually.
    SplayOverflow {
        source: ObjectId,
        target: ObjectId,
        siblings: usize,
        max_splay: f32,
    },
    /// Undo/redo hit an entry whose target no longer exists and discarded
    /// it along with everything above it.
    HistoryTruncated { dropped: usize },
}
