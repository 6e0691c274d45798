//! Connection path computation (the "path maker").
//!
//! Two styles: linear (straight anchor-to-anchor with a lateral splay
//! offset spreading sibling connections) and rectilinear (Manhattan
//! polyline leaving the source along its port's outward side and entering
//! the target along its port's outward side, with at most two bends).
//!
//! Rectilinear candidates are enumerated explicitly and scored against the
//! spatial index: fewest bend points landing inside an intervening
//! object's bounds first, then smallest enclosing area, then enumeration
//! order, which makes routing fully deterministic.

use crate::config::RouterConfig;
use crate::geom::{Bounds, EPSILON, Point};
use crate::index::SpatialIndex;
use crate::model::{ObjectId, PathStyle, PortSide};

/// A resolved connection endpoint: the owning object (excluded from
/// obstacle tests), the port anchor in diagram space, and the outward side.
#[derive(Debug, Clone, Copy)]
pub struct Endpoint {
    pub object: ObjectId,
    pub anchor: Point,
    pub side: PortSide,
}

/// Offset for the sibling at `rank` in the sequence
/// `0, +p, -p, +2p, -2p, ...`, clamped to `±max_splay`. The second value
/// reports whether clamping occurred (splay overflow).
pub fn splay_offset_for_rank(rank: usize, config: &RouterConfig) -> (f32, bool) {
    if rank == 0 {
        return (0.0, false);
    }
    let magnitude = rank.div_ceil(2) as f32 * config.splay_padding;
    let sign = if rank % 2 == 1 { 1.0 } else { -1.0 };
    if magnitude > config.max_splay {
        (sign * config.max_splay, true)
    } else {
        (sign * magnitude, false)
    }
}

/// Computes the path for one connection. Endpoints are already resolved
/// against the model; dangling detection happens in the caller.
pub fn compute_path(
    source: Endpoint,
    target: Endpoint,
    style: PathStyle,
    splay_offset: f32,
    index: &SpatialIndex,
    config: &RouterConfig,
) -> Vec<Point> {
    match style {
        PathStyle::Linear => linear_path(source.anchor, target.anchor, splay_offset),
        PathStyle::Rectilinear => rectilinear_path(source, target, index, config),
    }
}

/// Straight segment between the anchors, shifted along the left normal by
/// the splay offset. Coincident anchors degrade to a single point.
fn linear_path(a: Point, b: Point, splay_offset: f32) -> Vec<Point> {
    let d = b - a;
    let len = a.distance(b);
    if len <= EPSILON {
        return vec![a];
    }
    let normal = Point::new(-d.y / len, d.x / len).scale(splay_offset);
    compress_path(&[a + normal, b + normal])
}

fn rectilinear_path(
    source: Endpoint,
    target: Endpoint,
    index: &SpatialIndex,
    config: &RouterConfig,
) -> Vec<Point> {
    let s1 = source.anchor + source.side.direction().scale(config.stub_length);
    let t1 = target.anchor + target.side.direction().scale(config.stub_length);

    let mut candidates: Vec<Vec<Point>> = Vec::new();
    let mut push = |mids: &[Point]| {
        let mut raw = Vec::with_capacity(mids.len() + 4);
        raw.push(source.anchor);
        raw.push(s1);
        raw.extend_from_slice(mids);
        raw.push(t1);
        raw.push(target.anchor);
        candidates.push(compress_path(&raw));
    };

    match (source.side.is_horizontal(), target.side.is_horizontal()) {
        // Perpendicular axes: exactly one minimum-bend corner preserves
        // both the departure and the arrival direction.
        (true, false) => push(&[Point::new(t1.x, s1.y)]),
        (false, true) => push(&[Point::new(s1.x, t1.y)]),
        // Parallel horizontal axes: straight run when the stubs align,
        // otherwise Z routes through a vertical channel. Same-facing
        // ports get a U channel past the outermost stub.
        (true, true) => {
            if (s1.y - t1.y).abs() <= EPSILON {
                push(&[]);
            } else {
                for mx in channel_candidates(s1.x, t1.x, source.side, target.side) {
                    push(&[Point::new(mx, s1.y), Point::new(mx, t1.y)]);
                }
            }
        }
        // Parallel vertical axes, symmetric.
        (false, false) => {
            if (s1.x - t1.x).abs() <= EPSILON {
                push(&[]);
            } else {
                for my in channel_candidates(s1.y, t1.y, source.side, target.side) {
                    push(&[Point::new(s1.x, my), Point::new(t1.x, my)]);
                }
            }
        }
    }

    let exclude = [source.object, target.object];
    let mut best_idx = 0usize;
    let mut best_hits = usize::MAX;
    let mut best_area = f32::MAX;
    for (idx, points) in candidates.iter().enumerate() {
        let (hits, area) = route_metrics(points, &exclude, index, config);
        if hits < best_hits || (hits == best_hits && area < best_area) {
            best_hits = hits;
            best_area = area;
            best_idx = idx;
        }
    }
    candidates.swap_remove(best_idx)
}

/// Main-axis channel positions to try for a parallel-axis route, in
/// preference order: midway, hugging the source stub, hugging the target
/// stub, and for same-facing ports the wrap past the outermost stub.
fn channel_candidates(s: f32, t: f32, source_side: PortSide, target_side: PortSide) -> Vec<f32> {
    let mut out = vec![(s + t) / 2.0, s, t];
    if source_side == target_side {
        let wrap = match source_side {
            PortSide::East | PortSide::South => s.max(t),
            PortSide::West | PortSide::North => s.min(t),
        };
        out.push(wrap);
    }
    out.dedup_by(|a, b| (*a - *b).abs() <= EPSILON);
    out
}

/// Counts interior bend points of a compressed candidate falling inside
/// any intervening object, and returns the candidate's enclosing area.
/// Obstacles come from a box query over the route's region; the endpoint
/// objects themselves never count.
fn route_metrics(
    points: &[Point],
    exclude: &[ObjectId],
    index: &SpatialIndex,
    config: &RouterConfig,
) -> (usize, f32) {
    if points.len() < 2 {
        return (0, 0.0);
    }
    let mut region = Bounds::at_point(points[0]);
    for p in &points[1..] {
        region = region.union(&Bounds::at_point(*p));
    }
    let area = region.area();

    let obstacles: Vec<Bounds> = index
        .query_box(&region.inflate(config.obstacle_margin))
        .into_iter()
        .filter(|id| !exclude.contains(id))
        .filter_map(|id| index.bounds_of(id))
        .map(|bounds| bounds.inflate(config.obstacle_margin))
        .collect();
    if obstacles.is_empty() {
        return (0, area);
    }

    let hits = points[1..points.len() - 1]
        .iter()
        .filter(|bend| obstacles.iter().any(|obstacle| obstacle.contains(**bend)))
        .count();
    (hits, area)
}

/// Drops consecutive duplicates (zero-length segments) and collinear
/// interior points, including retraced spans where the path doubles back
/// along the same axis.
pub fn compress_path(points: &[Point]) -> Vec<Point> {
    let mut out: Vec<Point> = Vec::with_capacity(points.len());
    for &p in points {
        if let Some(last) = out.last()
            && last.approx_eq(p)
        {
            continue;
        }
        while out.len() >= 2 {
            let a = out[out.len() - 2];
            let b = out[out.len() - 1];
            let cross = (b.x - a.x) * (p.y - b.y) - (b.y - a.y) * (p.x - b.x);
            if cross.abs() > EPSILON {
                break;
            }
            out.pop();
            if let Some(last) = out.last()
                && last.approx_eq(p)
            {
                break;
            }
        }
        if let Some(last) = out.last()
            && last.approx_eq(p)
        {
            out.pop();
        }
        out.push(p);
    }
    out
}

/// Number of direction changes along a path; straight runs count zero.
pub fn path_bend_count(points: &[Point]) -> usize {
    if points.len() < 3 {
        return 0;
    }
    let mut bends = 0usize;
    for window in points.windows(3) {
        let d1 = window[1] - window[0];
        let d2 = window[2] - window[1];
        if d1.distance(Point::ZERO) <= EPSILON || d2.distance(Point::ZERO) <= EPSILON {
            continue;
        }
        if (d1.x * d2.y - d1.y * d2.x).abs() > EPSILON {
            bends += 1;
        }
    }
    bends
}
