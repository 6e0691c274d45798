//! Serializable snapshot of an engine's scene, for debugging sessions and
//! byte-for-byte state comparisons in tests.

use crate::engine::DiagramEngine;
use crate::geom::Point;
use crate::model::{ObjectKind, PathStyle};
use serde::Serialize;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

#[derive(Debug, Serialize)]
pub struct SceneDump {
    pub objects: Vec<ObjectDump>,
    pub connections: Vec<ConnectionDump>,
}

#[derive(Debug, Serialize)]
pub struct ObjectDump {
    pub id: u64,
    pub kind: String,
    pub label: String,
    pub min: [f32; 2],
    pub max: [f32; 2],
    pub ports: Vec<PortDump>,
}

#[derive(Debug, Serialize)]
pub struct PortDump {
    pub side: String,
    pub anchor: [f32; 2],
    pub explicit: bool,
}

#[derive(Debug, Serialize)]
pub struct ConnectionDump {
    pub id: u64,
    pub source: u64,
    pub target: u64,
    pub style: String,
    pub splay_offset: f32,
    pub points: Vec<[f32; 2]>,
}

fn point(p: Point) -> [f32; 2] {
    [p.x, p.y]
}

impl SceneDump {
    /// Captures the whole scene in id order, so two captures of identical
    /// state serialize identically.
    pub fn from_engine(engine: &DiagramEngine) -> Self {
        let model = engine.model();
        let objects = model
            .objects()
            .map(|object| ObjectDump {
                id: object.id.0,
                kind: match object.kind {
                    ObjectKind::Component => "component".to_string(),
                    ObjectKind::Compartment => "compartment".to_string(),
                    ObjectKind::Junction => "junction".to_string(),
                },
                label: object.label.clone(),
                min: point(object.bounds.min),
                max: point(object.bounds.max),
                ports: object
                    .ports
                    .iter()
                    .map(|p| PortDump {
                        side: format!("{:?}", p.side).to_lowercase(),
                        anchor: point(p.anchor(&object.bounds)),
                        explicit: p.offset.is_explicit(),
                    })
                    .collect(),
            })
            .collect();
        let connections = model
            .connections()
            .map(|connection| ConnectionDump {
                id: connection.id.0,
                source: connection.source.object.0,
                target: connection.target.object.0,
                style: match connection.style {
                    PathStyle::Linear => "linear".to_string(),
                    PathStyle::Rectilinear => "rectilinear".to_string(),
                },
                splay_offset: connection.splay_offset,
                points: connection.points.iter().map(|p| point(*p)).collect(),
            })
            .collect();
        Self {
            objects,
            connections,
        }
    }

    pub fn to_json(&self) -> anyhow::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn write_json(&self, path: &Path) -> anyhow::Result<()> {
        let file = File::create(path)?;
        let writer = BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }
}
