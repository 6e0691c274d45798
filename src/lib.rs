pub mod config;
pub mod dump;
pub mod engine;
pub mod error;
pub mod geom;
pub mod history;
pub mod index;
pub mod log;
pub mod model;
pub mod router;

pub use config::{EngineConfig, load_config};
pub use dump::SceneDump;
pub use engine::DiagramEngine;
pub use error::{EngineWarning, HistoryError, RouteError};
pub use geom::{Bounds, Point, Transform};
pub use model::{ConnectionId, ObjectId, ObjectKind, PathStyle, PortRef, PortSide};
