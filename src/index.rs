//! Dynamic bounding-box index over diagram objects.
//!
//! A uniform cell grid over a hash map: each entry's bounds are bucketed
//! into every cell they overlap, with a side table holding the
//! authoritative id -> bounds record. Incremental insert/update/remove
//! mutate buckets directly; once enough churn accumulates the grid is
//! repacked from the side table with a cell size re-derived from the
//! entries themselves.

use crate::config::IndexConfig;
use crate::geom::{Bounds, Point};
use crate::log::debug;
use crate::model::ObjectId;
use std::collections::{HashMap, HashSet};

/// Floor for the derived cell edge so tiny anchors cannot explode the grid.
const CELL_SIZE_MIN: f32 = 8.0;
/// Repacked cell edge is this multiple of the median entry extent.
const CELL_MEDIAN_RATIO: f32 = 1.5;

#[derive(Debug, Clone)]
pub struct SpatialIndex {
    cell: f32,
    cells: HashMap<(i32, i32), Vec<ObjectId>>,
    entries: HashMap<ObjectId, Bounds>,
    churn: usize,
    rebuild_threshold: usize,
}

impl SpatialIndex {
    pub fn new(config: &IndexConfig) -> Self {
        Self {
            cell: config.cell_size.max(CELL_SIZE_MIN),
            cells: HashMap::new(),
            entries: HashMap::new(),
            churn: 0,
            rebuild_threshold: config.rebuild_threshold.max(1),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, id: ObjectId) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn bounds_of(&self, id: ObjectId) -> Option<Bounds> {
        self.entries.get(&id).copied()
    }

    pub fn insert(&mut self, id: ObjectId, bounds: Bounds) {
        self.update(id, bounds);
    }

    /// Inserts or moves an entry. Unknown ids are treated as inserts.
    pub fn update(&mut self, id: ObjectId, bounds: Bounds) {
        if let Some(old) = self.entries.insert(id, bounds) {
            self.unbucket(id, &old);
        }
        self.bucket(id, &bounds);
        self.note_churn();
    }

    /// Removes an entry; unknown ids are a no-op, never an error, since
    /// callers remove defensively during partial teardown.
    pub fn remove(&mut self, id: ObjectId) {
        if let Some(old) = self.entries.remove(&id) {
            self.unbucket(id, &old);
            self.note_churn();
        }
    }

    /// All entries whose bounds overlap `query`, deduplicated and sorted
    /// by id. Callers needing a spatial order use `query_point`.
    pub fn query_box(&self, query: &Bounds) -> Vec<ObjectId> {
        let (x0, y0, x1, y1) = self.cell_range(query);
        let mut seen: HashSet<ObjectId> = HashSet::new();
        let mut out = Vec::new();
        for iy in y0..=y1 {
            for ix in x0..=x1 {
                let Some(bucket) = self.cells.get(&(ix, iy)) else {
                    continue;
                };
                for &id in bucket {
                    if seen.insert(id) && self.entries[&id].overlaps(query) {
                        out.push(id);
                    }
                }
            }
        }
        out.sort_unstable();
        out
    }

    /// Entries within `tolerance` of `point`, ascending by distance
    /// (zero inside the bounds), ties broken by id so a caller applying a
    /// z-order tie-break sees a deterministic candidate order.
    pub fn query_point(&self, point: Point, tolerance: f32) -> Vec<ObjectId> {
        let tolerance = tolerance.max(0.0);
        let probe = Bounds::at_point(point).inflate(tolerance);
        let mut hits: Vec<(f32, ObjectId)> = self
            .query_box(&probe)
            .into_iter()
            .filter_map(|id| {
                let distance = self.entries[&id].distance_to(point);
                (distance <= tolerance).then_some((distance, id))
            })
            .collect();
        hits.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
        hits.into_iter().map(|(_, id)| id).collect()
    }

    fn bucket(&mut self, id: ObjectId, bounds: &Bounds) {
        let (x0, y0, x1, y1) = self.cell_range(bounds);
        for iy in y0..=y1 {
            for ix in x0..=x1 {
                self.cells.entry((ix, iy)).or_default().push(id);
            }
        }
    }

    fn unbucket(&mut self, id: ObjectId, bounds: &Bounds) {
        let (x0, y0, x1, y1) = self.cell_range(bounds);
        for iy in y0..=y1 {
            for ix in x0..=x1 {
                if let Some(bucket) = self.cells.get_mut(&(ix, iy)) {
                    bucket.retain(|entry| *entry != id);
                    if bucket.is_empty() {
                        self.cells.remove(&(ix, iy));
                    }
                }
            }
        }
    }

    fn cell_range(&self, bounds: &Bounds) -> (i32, i32, i32, i32) {
        (
            (bounds.min.x / self.cell).floor() as i32,
            (bounds.min.y / self.cell).floor() as i32,
            (bounds.max.x / self.cell).floor() as i32,
            (bounds.max.y / self.cell).floor() as i32,
        )
    }

    fn note_churn(&mut self) {
        self.churn += 1;
        if self.churn >= self.rebuild_threshold {
            self.rebuild();
        }
    }

    /// Repacks every bucket from the side table. The cell edge is
    /// re-derived from the median entry extent so long-lived documents
    /// keep bucket occupancy balanced as objects grow or shrink.
    fn rebuild(&mut self) {
        self.churn = 0;
        if !self.entries.is_empty() {
            let mut extents: Vec<f32> = self
                .entries
                .values()
                .map(|bounds| bounds.width().max(bounds.height()))
                .collect();
            extents.sort_by(f32::total_cmp);
            let median = extents[extents.len() / 2];
            self.cell = (median * CELL_MEDIAN_RATIO).max(CELL_SIZE_MIN);
        }
        debug!(
            "spatial index repack: {} entries, cell {}",
            self.entries.len(),
            self.cell
        );
        self.cells.clear();
        let snapshot: Vec<(ObjectId, Bounds)> =
            self.entries.iter().map(|(id, b)| (*id, *b)).collect();
        for (id, bounds) in snapshot {
            self.bucket(id, &bounds);
        }
    }
}
