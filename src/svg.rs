//! SVG rendering adapter
//!
//! Draws a [`LayoutResult`] as a standalone SVG document. All positions come
//! from the emitted geometry; this module only decides markup and classes.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use askama::Template;
use tracing::debug;

use crate::geometry::{LayoutResult, LinkGeometry, NodeGeometry, ShapeKind, ViewKind, num};
use crate::io::{IoResult, Writer};

/// House outline used for agents in the force view
const AGENT_OUTLINE: &str = "M-15,7 L-15,-5 L0,-12 L15,-5 L15,7 L-15,7";

/// Gap between a flow node and its label
const LABEL_GAP: f64 = 6.0;

/// Horizontal offset of force-view labels from the node centre
const FORCE_LABEL_OFFSET: f64 = 16.0;

/// Rendered marker size relative to its 10-unit outline
const MARKER_SCALE: f64 = 0.6;

#[derive(Debug)]
struct ShapeView {
    element: &'static str,
    attrs: String,
}

#[derive(Debug)]
struct NodeView {
    transform: String,
    shape: ShapeView,
    title: String,
    label: String,
    label_x: String,
    label_y: String,
    label_dy: &'static str,
    anchor: &'static str,
}

#[derive(Debug)]
struct LinkView {
    class: String,
    d: String,
    stroke_width: String,
    title: String,
}

#[derive(Debug)]
struct MarkerView {
    class: String,
    transform: String,
}

#[derive(Template)]
#[template(path = "sankey.svg", escape = "html")]
struct SankeyTemplate<'a> {
    width: String,
    height: String,
    links: &'a [LinkView],
    nodes: &'a [NodeView],
}

#[derive(Template)]
#[template(path = "force.svg", escape = "html")]
struct ForceTemplate<'a> {
    width: String,
    height: String,
    links: &'a [LinkView],
    markers: &'a [MarkerView],
    nodes: &'a [NodeView],
}

fn shape_view(node: &NodeGeometry) -> ShapeView {
    let class = node.node_type.as_str();
    let (w, h) = (node.extent.width, node.extent.height);
    match node.shape {
        ShapeKind::Ellipse => ShapeView {
            element: "ellipse",
            attrs: format!(
                r#"class="{class}" rx="{}" ry="{}" cx="0" cy="0""#,
                num(w / 2.0),
                num(h / 2.0)
            ),
        },
        ShapeKind::Polygon => ShapeView {
            element: "path",
            attrs: format!(r#"class="{class}" d="{AGENT_OUTLINE}""#),
        },
        // Flow rectangles hang from their top-left corner, force ones are centred
        ShapeKind::Rectangle if node.layer.is_some() => ShapeView {
            element: "rect",
            attrs: format!(r#"class="{class}" width="{}" height="{}""#, num(w), num(h)),
        },
        ShapeKind::Rectangle => ShapeView {
            element: "rect",
            attrs: format!(
                r#"class="{class}" x="{}" y="{}" width="{}" height="{}""#,
                num(-w / 2.0),
                num(-h / 2.0),
                num(w),
                num(h)
            ),
        },
    }
}

fn node_view(node: &NodeGeometry, view: ViewKind, canvas_width: f64) -> NodeView {
    let transform = format!("translate({},{})", num(node.position.x), num(node.position.y));
    let title = format!("{}\n[{}]", node.name, node.node_type);

    match view {
        ViewKind::Flow => {
            // Labels sit outside the node, facing the centre of the canvas
            let left_half = node.position.x < canvas_width / 2.0;
            let (label_x, anchor) = if left_half {
                (node.extent.width + LABEL_GAP, "start")
            } else {
                (-LABEL_GAP, "end")
            };
            NodeView {
                transform,
                shape: shape_view(node),
                title,
                label: node.name.clone(),
                label_x: num(label_x),
                label_y: num(node.extent.height / 2.0),
                label_dy: ".35em",
                anchor,
            }
        }
        ViewKind::Force => NodeView {
            transform,
            shape: shape_view(node),
            title,
            label: node.name.clone(),
            label_x: num(FORCE_LABEL_OFFSET),
            label_y: "0".to_string(),
            label_dy: ".75em",
            anchor: "start",
        },
    }
}

fn link_view(link: &LinkGeometry, view: ViewKind, names: &HashMap<&str, &str>) -> LinkView {
    let name = |id: &str| names.get(id).copied().unwrap_or(id).to_string();
    let class = match view {
        ViewKind::Flow => format!("link sankey {}", link.type_class),
        ViewKind::Force => format!("link {}", link.type_class),
    };
    LinkView {
        class,
        d: link.path.to_svg(),
        stroke_width: num(link.stroke_width),
        title: format!(
            "{} → {}\n[{}]",
            name(&link.source),
            name(&link.target),
            link.type_class
        ),
    }
}

/// Arrowhead centred on the arc midpoint, pointing along the direction of
/// travel
fn marker_view(link: &LinkGeometry) -> MarkerView {
    let mid = link.path.midpoint();
    MarkerView {
        class: format!("marker {}", link.type_class),
        transform: format!(
            "translate({},{}) rotate({}) scale({}) translate(-5,0)",
            num(mid.x),
            num(mid.y),
            num(link.path.midpoint_angle()),
            num(MARKER_SCALE)
        ),
    }
}

/// Render the layout as an SVG document
pub fn render(layout: &LayoutResult) -> askama::Result<String> {
    let names: HashMap<&str, &str> = layout
        .nodes
        .iter()
        .map(|n| (n.id.as_str(), n.name.as_str()))
        .collect();

    // Wider links first so thin ones stay visible on top
    let mut ordered: Vec<&LinkGeometry> = layout.links.iter().collect();
    ordered.sort_by(|a, b| b.stroke_width.total_cmp(&a.stroke_width));

    let links: Vec<LinkView> = ordered
        .iter()
        .map(|l| link_view(l, layout.view, &names))
        .collect();
    let nodes: Vec<NodeView> = layout
        .nodes
        .iter()
        .map(|n| node_view(n, layout.view, layout.width))
        .collect();
    let (width, height) = (num(layout.width), num(layout.height));

    match layout.view {
        ViewKind::Flow => SankeyTemplate {
            width,
            height,
            links: &links,
            nodes: &nodes,
        }
        .render(),
        ViewKind::Force => {
            let markers: Vec<MarkerView> = ordered.iter().map(|l| marker_view(l)).collect();
            ForceTemplate {
                width,
                height,
                links: &links,
                markers: &markers,
                nodes: &nodes,
            }
            .render()
        }
    }
}

/// Writes layouts as SVG documents
#[derive(Debug, Default)]
pub struct SvgWriter;

impl SvgWriter {
    pub fn new() -> Self {
        Self
    }
}

impl Writer for SvgWriter {
    fn write(&self, layout: &LayoutResult, output: &Path) -> IoResult<()> {
        let document = render(layout)?;
        fs::write(output, document)?;
        debug!(path = %output.display(), view = ?layout.view, "wrote svg");
        Ok(())
    }

    fn format_id(&self) -> &str {
        "svg"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Extent, PathDescriptor, Point};
    use crate::graph::NodeType;
    use insta::assert_snapshot;

    fn node(
        id: &str,
        node_type: NodeType,
        shape: ShapeKind,
        at: Point,
        layer: Option<usize>,
    ) -> NodeGeometry {
        let extent = if layer.is_some() {
            Extent::new(15.0, 40.0)
        } else {
            shape.footprint()
        };
        NodeGeometry {
            id: id.to_string(),
            name: format!("{id} name"),
            node_type,
            position: at,
            extent,
            shape,
            layer,
        }
    }

    fn force_layout() -> LayoutResult {
        let (a, b) = (Point::new(100.0, 100.0), Point::new(160.0, 100.0));
        LayoutResult {
            view: ViewKind::Force,
            width: 300.0,
            height: 200.0,
            nodes: vec![
                node("a", NodeType::Activity, ShapeKind::Rectangle, a, None),
                node("e", NodeType::Entity, ShapeKind::Ellipse, b, None),
                node("ag", NodeType::Agent, ShapeKind::Polygon, Point::new(130.0, 40.0), None),
            ],
            links: vec![LinkGeometry {
                source: "a".to_string(),
                target: "e".to_string(),
                path: PathDescriptor::arc(a, b),
                stroke_width: 1.5,
                type_class: "used".to_string(),
            }],
        }
    }

    fn flow_layout() -> LayoutResult {
        let link = |source: &str, target: &str, width: f64, from: Point, to: Point| LinkGeometry {
            source: source.to_string(),
            target: target.to_string(),
            path: PathDescriptor::band(from, to, 0.5),
            stroke_width: width,
            type_class: "wasGeneratedBy".to_string(),
        };
        LayoutResult {
            view: ViewKind::Flow,
            width: 400.0,
            height: 100.0,
            nodes: vec![
                node("left", NodeType::Entity, ShapeKind::Rectangle, Point::new(0.0, 0.0), Some(0)),
                node(
                    "right",
                    NodeType::Activity,
                    ShapeKind::Rectangle,
                    Point::new(385.0, 30.0),
                    Some(1),
                ),
            ],
            links: vec![
                link("left", "right", 2.0, Point::new(15.0, 1.0), Point::new(385.0, 31.0)),
                link("left", "right", 30.0, Point::new(15.0, 20.0), Point::new(385.0, 50.0)),
            ],
        }
    }

    #[test]
    fn force_shapes_follow_their_footprint() {
        let layout = force_layout();
        let shapes: Vec<String> = layout
            .nodes
            .iter()
            .map(|n| {
                let shape = shape_view(n);
                format!("<{} {}/>", shape.element, shape.attrs)
            })
            .collect();

        assert_snapshot!(shapes.join("\n"), @r#"
        <rect class="activity" x="-14" y="-9" width="28" height="18"/>
        <ellipse class="entity" rx="15" ry="10" cx="0" cy="0"/>
        <path class="agent" d="M-15,7 L-15,-5 L0,-12 L15,-5 L15,7 L-15,7"/>
        "#);
    }

    #[test]
    fn marker_sits_on_arc_midpoint() {
        let layout = force_layout();
        let marker = marker_view(&layout.links[0]);

        // 60px chord with a 60px radius bulges 8.04px above the chord
        assert_snapshot!(
            marker.transform,
            @"translate(130,91.96) rotate(0) scale(0.6) translate(-5,0)"
        );
        assert_eq!(marker.class, "marker used");
    }

    #[test]
    fn force_document_has_arcs_markers_and_tooltips() {
        let svg = render(&force_layout()).unwrap();

        assert!(svg.starts_with("<svg"));
        assert!(svg.contains(r#"class="link used" d="M100,100A60,60 0 0,1 160,100""#));
        assert!(svg.contains(r#"class="marker used""#));
        assert!(svg.contains(r#"transform="translate(160,100)""#));
        assert!(svg.contains("a name → e name\n[used]"));
        assert!(svg.contains("ag name\n[agent]"));
        assert!(svg.trim_end().ends_with("</svg>"));
    }

    #[test]
    fn flow_document_draws_wider_links_first() {
        let svg = render(&flow_layout()).unwrap();

        let wide = svg.find("stroke-width:30").unwrap();
        let thin = svg.find("stroke-width:2").unwrap();
        assert!(wide < thin);
        assert!(svg.contains(r#"class="link sankey wasGeneratedBy""#));
        assert!(!svg.contains(r#"<path class="marker"#));
    }

    #[test]
    fn flow_labels_face_the_canvas_centre() {
        let layout = flow_layout();
        let left = node_view(&layout.nodes[0], ViewKind::Flow, layout.width);
        let right = node_view(&layout.nodes[1], ViewKind::Flow, layout.width);

        assert_eq!((left.label_x.as_str(), left.anchor), ("21", "start"));
        assert_eq!((right.label_x.as_str(), right.anchor), ("-6", "end"));
        assert_eq!(left.label_y, "20");
    }

    #[test]
    fn names_are_escaped() {
        let mut layout = force_layout();
        layout.nodes[1].name = "<cube & co>".to_string();
        let svg = render(&layout).unwrap();

        // askama writes numeric character references
        assert!(svg.contains("&#60;cube &#38; co&#62;"));
        assert!(!svg.contains("<cube"));
    }

    #[test]
    fn writer_creates_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("force.svg");

        SvgWriter::new().write(&force_layout(), &path).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("<ellipse"));
        assert_eq!(SvgWriter::new().format_id(), "svg");
    }
}
