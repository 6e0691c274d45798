use bondcanvas::geom::Bounds;
use bondcanvas::{DiagramEngine, HistoryError, PathStyle, Point, PortSide, RouteError, SceneDump};

fn bounds(x0: f32, y0: f32, x1: f32, y1: f32) -> Bounds {
    Bounds::new(Point::new(x0, y0), Point::new(x1, y1))
}

fn scene_json(engine: &DiagramEngine) -> String {
    SceneDump::from_engine(engine).to_json().expect("dump failed")
}

/// Two components side by side with east/west ports, as in the routing
/// scenarios: O1 at (0,0)-(10,10), O2 at (40,0)-(50,10).
fn side_by_side(
    engine: &mut DiagramEngine,
    target_side: PortSide,
) -> (
    bondcanvas::ObjectId,
    bondcanvas::ObjectId,
    bondcanvas::ConnectionId,
) {
    let o1 = engine.add_component(bounds(0.0, 0.0, 10.0, 10.0), "O1");
    let o2 = engine.add_component(bounds(40.0, 0.0, 50.0, 10.0), "O2");
    let p1 = engine.add_port(o1, PortSide::East, None).expect("port O1");
    let p2 = engine.add_port(o2, target_side, None).expect("port O2");
    let conn = engine
        .connect(p1, p2, PathStyle::Rectilinear)
        .expect("connect");
    (o1, o2, conn)
}

#[test]
fn scenario_a_straight_horizontal_run() {
    let mut engine = DiagramEngine::default();
    let (_, _, conn) = side_by_side(&mut engine, PortSide::West);
    let path = engine.route(conn).expect("route").to_vec();
    assert_eq!(path, vec![Point::new(10.0, 5.0), Point::new(40.0, 5.0)]);
}

#[test]
fn scenario_b_one_bend_into_south_port() {
    let mut engine = DiagramEngine::default();
    let (_, _, conn) = side_by_side(&mut engine, PortSide::South);
    let path = engine.route(conn).expect("route").to_vec();
    // South port sits at O2's bottom-center (45, 10): one bend, a
    // horizontal first segment from (10,5) and a vertical last segment.
    assert_eq!(
        path,
        vec![
            Point::new(10.0, 5.0),
            Point::new(45.0, 5.0),
            Point::new(45.0, 10.0)
        ]
    );
    let first = path[1] - path[0];
    let last = path[2] - path[1];
    assert_eq!(first.y, 0.0);
    assert_eq!(last.x, 0.0);
}

#[test]
fn scenario_c_coalesced_moves_undo_to_origin() {
    let mut engine = DiagramEngine::default();
    let (o1, _, _) = side_by_side(&mut engine, PortSide::West);
    let entries_before = engine.can_undo();
    assert!(entries_before);

    engine.on_geometry_changed(o1, bounds(5.0, 5.0, 15.0, 15.0));
    engine.on_geometry_changed(o1, bounds(6.0, 5.0, 16.0, 15.0));

    // One coalesced entry: a single undo restores the original bounds.
    engine.undo().expect("undo");
    assert_eq!(
        engine.model().object(o1).expect("O1").bounds,
        bounds(0.0, 0.0, 10.0, 10.0)
    );
    // And the next undoable entry is the connection, not a second move.
    assert_eq!(engine.undo_label(), Some("connect"));
}

#[test]
fn undo_redo_round_trip_reproduces_final_geometry() {
    let mut engine = DiagramEngine::default();
    let (o1, o2, conn) = side_by_side(&mut engine, PortSide::West);
    engine.on_geometry_changed(o1, bounds(0.0, 20.0, 10.0, 30.0));
    engine.on_geometry_changed(o2, bounds(60.0, 20.0, 70.0, 30.0));
    engine.on_geometry_changed(o1, bounds(0.0, 22.0, 12.0, 34.0));
    engine.route(conn).expect("route");

    let final_state = scene_json(&engine);
    while engine.can_undo() {
        engine.undo().expect("undo");
    }
    while engine.can_redo() {
        engine.redo().expect("redo");
    }
    engine.route(conn).expect("route");
    assert_eq!(scene_json(&engine), final_state);
}

#[test]
fn gesture_produces_exactly_one_entry() {
    let mut engine = DiagramEngine::default();
    let (o1, _, _) = side_by_side(&mut engine, PortSide::West);
    let undo_labels_before = engine.undo_label().map(str::to_string);

    engine.begin_gesture();
    for step in 1..=20 {
        let dx = step as f32;
        engine.preview_move(o1, bounds(dx, 0.0, dx + 10.0, 10.0));
    }
    engine.commit_gesture("drag O1");
    assert_eq!(engine.undo_label(), Some("drag O1"));

    engine.undo().expect("undo");
    assert_eq!(
        engine.model().object(o1).expect("O1").bounds,
        bounds(0.0, 0.0, 10.0, 10.0)
    );
    assert_eq!(engine.undo_label().map(str::to_string), undo_labels_before);
}

#[test]
fn cancel_gesture_restores_pre_gesture_state() {
    let mut engine = DiagramEngine::default();
    let (o1, o2, conn) = side_by_side(&mut engine, PortSide::West);
    engine.route(conn).expect("route");
    let before = scene_json(&engine);
    let hit_before = engine.hit_test(Point::new(5.0, 5.0), 1.0);

    engine.begin_gesture();
    engine.preview_move(o1, bounds(100.0, 100.0, 110.0, 110.0));
    engine.preview_move(o2, bounds(200.0, 0.0, 210.0, 10.0));
    engine.preview_move(o1, bounds(120.0, 100.0, 130.0, 110.0));
    assert_ne!(scene_json(&engine), before);

    engine.cancel_gesture();
    engine.route(conn).expect("route");
    assert_eq!(scene_json(&engine), before);
    assert_eq!(engine.hit_test(Point::new(5.0, 5.0), 1.0), hit_before);
    // Previews never touched the log, so undo still points at "connect".
    assert_eq!(engine.undo_label(), Some("connect"));
}

#[test]
fn splay_offsets_symmetric_increasing_and_stable() {
    let mut engine = DiagramEngine::default();
    let o1 = engine.add_component(bounds(0.0, 0.0, 10.0, 10.0), "O1");
    let o2 = engine.add_component(bounds(40.0, 0.0, 50.0, 10.0), "O2");
    let p1 = engine.add_port(o1, PortSide::East, None).unwrap();
    let p2 = engine.add_port(o2, PortSide::West, None).unwrap();
    let ids: Vec<_> = (0..5)
        .map(|_| engine.connect(p1, p2, PathStyle::Linear).unwrap())
        .collect();

    let offsets: Vec<f32> = ids
        .iter()
        .map(|id| engine.model().connection(*id).unwrap().splay_offset)
        .collect();
    assert_eq!(offsets[0], 0.0);
    // Symmetric around zero, strictly increasing magnitude with rank.
    assert_eq!(offsets[1], -offsets[2]);
    assert_eq!(offsets[3], -offsets[4]);
    assert!(offsets[1].abs() < offsets[3].abs());

    // Unrelated connections leave the group's offsets untouched.
    let o3 = engine.add_component(bounds(0.0, 40.0, 10.0, 50.0), "O3");
    let o4 = engine.add_component(bounds(40.0, 40.0, 50.0, 50.0), "O4");
    let p3 = engine.add_port(o3, PortSide::East, None).unwrap();
    let p4 = engine.add_port(o4, PortSide::West, None).unwrap();
    engine.connect(p3, p4, PathStyle::Linear).unwrap();
    let offsets_after: Vec<f32> = ids
        .iter()
        .map(|id| engine.model().connection(*id).unwrap().splay_offset)
        .collect();
    assert_eq!(offsets, offsets_after);

    // Removing one sibling reassigns the whole group, not just one slot.
    engine.disconnect(ids[1]);
    let offsets_regrouped: Vec<f32> = ids
        .iter()
        .filter_map(|id| engine.model().connection(*id))
        .map(|c| c.splay_offset)
        .collect();
    assert_eq!(offsets_regrouped.len(), 4);
    assert_eq!(offsets_regrouped[0], 0.0);
    assert_eq!(offsets_regrouped[1], -offsets_regrouped[2]);
}

#[test]
fn rectilinear_paths_stay_orthogonal_with_at_most_two_bends() {
    let mut engine = DiagramEngine::default();
    let o1 = engine.add_component(bounds(0.0, 0.0, 10.0, 10.0), "O1");
    let o2 = engine.add_component(bounds(60.0, 35.0, 70.0, 45.0), "O2");
    let p1 = engine.add_port(o1, PortSide::East, None).unwrap();
    for side in [PortSide::West, PortSide::North, PortSide::South, PortSide::East] {
        let p2 = engine.add_port(o2, side, None).unwrap();
        let conn = engine.connect(p1, p2, PathStyle::Rectilinear).unwrap();
        let path = engine.route(conn).expect("route").to_vec();
        let mut bends = 0;
        for window in path.windows(2) {
            let d = window[1] - window[0];
            assert!(
                d.x == 0.0 || d.y == 0.0,
                "segment {window:?} is not axis-aligned"
            );
            assert!(
                d.x.abs() > 1e-4 || d.y.abs() > 1e-4,
                "zero-length segment in {path:?}"
            );
        }
        for window in path.windows(3) {
            let d1 = window[1] - window[0];
            let d2 = window[2] - window[1];
            if (d1.x * d2.y - d1.y * d2.x).abs() > 1e-4 {
                bends += 1;
            }
        }
        assert!(bends <= 2, "{bends} bends via {side:?}");
        engine.disconnect(conn);
    }
}

#[test]
fn history_truncates_when_inverse_target_is_gone() {
    let mut engine = DiagramEngine::default();
    let (o1, _, conn) = side_by_side(&mut engine, PortSide::West);
    engine.remove_object(o1);
    assert_eq!(
        engine.route(conn),
        Err(RouteError::DanglingEndpoint {
            connection: conn,
            missing: o1
        })
    );
    // Drop the dangling connection. Its inverse needs O1, which is still
    // removed, so undoing it truncates that entry instead of applying it.
    engine.disconnect(conn);
    assert_eq!(engine.undo(), Err(HistoryError::Truncated { dropped: 1 }));
    assert!(
        engine
            .take_warnings()
            .contains(&bondcanvas::EngineWarning::HistoryTruncated { dropped: 1 })
    );
    // The rest of the history survives: the next undo restores O1.
    engine.undo().expect("restore O1");
    assert!(engine.model().contains_object(o1));
    assert_eq!(engine.route(conn), Err(RouteError::UnknownConnection(conn)));
}

#[test]
fn config_file_overlay_reaches_the_router() {
    let dir = std::env::temp_dir().join("bondcanvas_config_test");
    std::fs::create_dir_all(&dir).expect("tempdir");
    let path = dir.join("config.json");
    std::fs::write(&path, r#"{"router": {"stubLength": 20.0}}"#).expect("write config");
    let config = bondcanvas::load_config(Some(&path)).expect("load");
    assert_eq!(config.router.stub_length, 20.0);
    assert_eq!(config.router.splay_padding, 6.0);

    let mut engine = DiagramEngine::new(config);
    let (_, _, conn) = side_by_side(&mut engine, PortSide::West);
    // Opposed ports on a shared axis still collapse to a straight run
    // regardless of stub length.
    assert_eq!(
        engine.route(conn).expect("route").to_vec(),
        vec![Point::new(10.0, 5.0), Point::new(40.0, 5.0)]
    );
}

#[test]
fn hit_test_is_nearest_first() {
    let mut engine = DiagramEngine::default();
    let big = engine.add_compartment(bounds(0.0, 0.0, 100.0, 100.0), "membrane");
    let small = engine.add_component(bounds(40.0, 40.0, 60.0, 60.0), "pump");
    let hits = engine.hit_test(Point::new(50.0, 50.0), 1.0);
    // Both contain the point (distance zero); ties resolve by id and the
    // caller applies z-order on top.
    assert_eq!(hits, vec![big, small]);

    let hits = engine.hit_test(Point::new(62.0, 50.0), 5.0);
    assert_eq!(hits.first(), Some(&big));
    assert!(hits.contains(&small));
}
