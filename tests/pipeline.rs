use std::path::Path;

use provviz::config::CanvasConfig;
use provviz::flow::{self, FlowLayout};
use provviz::force::{self, ForceSimulation};
use provviz::geometry::{PathDescriptor, ShapeKind, ViewKind};
use provviz::graph::{Graph, GraphDocument, MalformedGraph};
use provviz::interaction::InteractionController;
use provviz::io::{IoError, load_graph};
use provviz::Point;

const EPS: f64 = 1e-6;

fn chain() -> Graph {
    let document: GraphDocument = serde_json::from_str(
        r#"{
            "nodes": [
                {"id": "A", "name": "A", "type": "entity"},
                {"id": "B", "name": "B", "type": "activity"},
                {"id": "C", "name": "C", "type": "entity"}
            ],
            "links": [
                {"source": "A", "target": "B", "weight": 2, "type": "used"},
                {"source": "B", "target": "C", "weight": 2, "type": "wasGeneratedBy"}
            ]
        }"#,
    )
    .unwrap();
    Graph::from_document(&document).unwrap()
}

fn fixture() -> Graph {
    load_graph(Path::new("tests/fixtures/provenance.json")).unwrap()
}

#[test]
fn chain_fills_three_columns() {
    let config = CanvasConfig::with_size(300.0, 200.0);
    let geometry = flow::layout(&chain(), &config);

    assert_eq!(geometry.view, ViewKind::Flow);
    for (id, layer) in [("A", 0), ("B", 1), ("C", 2)] {
        let node = geometry.node(id).unwrap();
        assert_eq!(node.layer, Some(layer));
        assert!((node.extent.height - 200.0).abs() < EPS, "{id} is not full height");
        assert!(node.position.y.abs() < EPS);
    }

    let xs: Vec<f64> = ["A", "B", "C"]
        .iter()
        .map(|id| geometry.node(id).unwrap().position.x)
        .collect();
    assert_eq!(xs[0], 0.0);
    assert!((xs[1] - (300.0 - 15.0) / 2.0).abs() < EPS);
    assert!((xs[2] - (300.0 - 15.0)).abs() < EPS);

    for link in &geometry.links {
        assert!((link.stroke_width - 200.0).abs() < EPS);
    }
}

#[test]
fn dangling_reference_yields_no_geometry() {
    let document: GraphDocument = serde_json::from_str(
        r#"{"nodes": [{"id": "A", "name": "A", "type": "entity"}],
            "links": [{"source": "A", "target": "Z", "type": "used"}]}"#,
    )
    .unwrap();

    let err = Graph::from_document(&document).unwrap_err();
    assert!(matches!(err, MalformedGraph::DanglingReference { link: 0, .. }));
    assert_eq!(
        err.to_string(),
        "link 0 has an unresolved target reference 'Z'"
    );
}

#[test]
fn fixture_flow_layout_respects_link_direction() {
    let graph = fixture();
    let layout = FlowLayout::new(&graph, &CanvasConfig::default());

    assert!(layout.back_edges().is_empty());
    for link in graph.links() {
        assert!(layout.layer(link.source) < layout.layer(link.target));
    }

    let geometry = layout.geometry();
    for node in &geometry.nodes {
        assert!(node.position.y >= -EPS);
        assert!(node.position.y + node.extent.height <= geometry.height + EPS);
    }
}

#[test]
fn fixture_force_layout_settles_with_typed_shapes() {
    let graph = fixture();
    let config = CanvasConfig::default();
    let geometry = force::layout(&graph, &config);

    assert_eq!(geometry.view, ViewKind::Force);
    assert_eq!(geometry.node("3").unwrap().shape, ShapeKind::Polygon);
    assert_eq!(geometry.node("6").unwrap().shape, ShapeKind::Rectangle);
    assert_eq!(geometry.node("0").unwrap().shape, ShapeKind::Ellipse);

    for link in &geometry.links {
        let source = geometry.node(&link.source).unwrap().position;
        let target = geometry.node(&link.target).unwrap().position;
        assert!(matches!(link.path, PathDescriptor::Arc { .. }));
        assert_eq!(link.path.start(), source);
        assert_eq!(link.path.end(), target);
    }
}

#[test]
fn config_file_applies_to_both_views() {
    let config = CanvasConfig::from_path(Path::new("tests/fixtures/canvas.yaml")).unwrap();
    let graph = fixture();

    let sankey = flow::layout(&graph, &config);
    assert_eq!((sankey.width, sankey.height), (640.0, 400.0));

    let mut sim = ForceSimulation::new(&graph, &config);
    sim.run_to_convergence();
    let mut controller = InteractionController::new(&mut sim);
    assert!(controller.on_drag_start("5"));
    let applied = controller
        .on_drag_move("5", Point::new(-100.0, 900.0))
        .unwrap();
    assert_eq!(applied, Point::new(0.0, 400.0));
}

#[test]
fn flow_drag_moves_only_the_dragged_node() {
    let graph = fixture();
    let mut layout = FlowLayout::new(&graph, &CanvasConfig::default());
    let before = layout.geometry();

    let mut controller = InteractionController::new(&mut layout);
    controller.on_drag_start("2");
    let applied = controller
        .on_drag_move("2", Point::new(before.node("2").unwrap().position.x, 0.0))
        .unwrap();
    controller.on_drag_end("2");

    let after = layout.geometry();
    for (old, new) in before.nodes.iter().zip(&after.nodes) {
        if old.id == "2" {
            assert_eq!(new.position, applied);
        } else {
            assert_eq!(old.position, new.position);
        }
        assert_eq!(old.extent, new.extent);
    }
}

#[test]
fn unsupported_graph_extension_is_rejected() {
    let graph = Path::new("tests/fixtures/provenance.json");
    assert!(matches!(
        load_graph(&graph.with_extension("ttl")),
        Err(IoError::UnsupportedFormat(_))
    ));
}
