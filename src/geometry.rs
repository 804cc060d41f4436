//! Geometry emitted by the layout engines
//!
//! This is the contract with the rendering adapter: per node a position,
//! extent and shape; per link a path descriptor, stroke width and style
//! class. Nothing here touches a drawing surface.

use serde::{Deserialize, Serialize};

use crate::graph::NodeType;

/// A point in canvas coordinates (y grows downwards)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: Point) -> f64 {
        (other.x - self.x).hypot(other.y - self.y)
    }
}

/// Size of a node's visual footprint
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Extent {
    pub width: f64,
    pub height: f64,
}

impl Extent {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// Which view a layout result belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ViewKind {
    Flow,
    Force,
}

/// Outline drawn for a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ShapeKind {
    Ellipse,
    /// Pentagon-like house outline
    Polygon,
    Rectangle,
}

impl ShapeKind {
    /// Force-view shape of a node type. Flow nodes are always rectangles.
    pub fn for_node_type(node_type: NodeType) -> Self {
        match node_type {
            NodeType::Entity => ShapeKind::Ellipse,
            NodeType::Agent => ShapeKind::Polygon,
            NodeType::Activity | NodeType::ActivityFlow => ShapeKind::Rectangle,
        }
    }

    /// Fixed force-view footprint, centred on the node position
    pub fn footprint(&self) -> Extent {
        match self {
            ShapeKind::Ellipse => Extent::new(30.0, 20.0),
            ShapeKind::Polygon => Extent::new(30.0, 19.0),
            ShapeKind::Rectangle => Extent::new(28.0, 18.0),
        }
    }
}

/// Geometric description of a link path
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum PathDescriptor {
    /// Cubic Bézier between two band midpoints (flow view)
    Band {
        start: Point,
        control1: Point,
        control2: Point,
        end: Point,
    },
    /// Circular arc swept clockwise from source to target (force view)
    Arc { start: Point, end: Point, radius: f64 },
}

impl PathDescriptor {
    /// Horizontal S-curve; control points sit at `curvature` and
    /// `1 - curvature` of the horizontal span, at the end heights.
    pub fn band(start: Point, end: Point, curvature: f64) -> Self {
        let xi = |t: f64| start.x + (end.x - start.x) * t;
        PathDescriptor::Band {
            start,
            control1: Point::new(xi(curvature), start.y),
            control2: Point::new(xi(1.0 - curvature), end.y),
            end,
        }
    }

    /// Arc whose radius equals the chord length
    pub fn arc(start: Point, end: Point) -> Self {
        PathDescriptor::Arc {
            start,
            end,
            radius: start.distance(end),
        }
    }

    pub fn start(&self) -> Point {
        match self {
            PathDescriptor::Band { start, .. } | PathDescriptor::Arc { start, .. } => *start,
        }
    }

    pub fn end(&self) -> Point {
        match self {
            PathDescriptor::Band { end, .. } | PathDescriptor::Arc { end, .. } => *end,
        }
    }

    /// Point halfway along the path, where the direction marker goes
    pub fn midpoint(&self) -> Point {
        match *self {
            PathDescriptor::Band {
                start,
                control1,
                control2,
                end,
            } => Point::new(
                (start.x + 3.0 * control1.x + 3.0 * control2.x + end.x) / 8.0,
                (start.y + 3.0 * control1.y + 3.0 * control2.y + end.y) / 8.0,
            ),
            PathDescriptor::Arc { start, end, radius } => {
                let (dx, dy) = (end.x - start.x, end.y - start.y);
                let chord = dx.hypot(dy);
                let mid = Point::new(start.x + dx / 2.0, start.y + dy / 2.0);
                if chord == 0.0 {
                    return mid;
                }
                // Clockwise sweep on a y-down canvas bulges to the left of the chord
                let sagitta = radius - (radius * radius - chord * chord / 4.0).max(0.0).sqrt();
                Point::new(
                    mid.x + dy / chord * sagitta,
                    mid.y - dx / chord * sagitta,
                )
            }
        }
    }

    /// Direction of travel at the midpoint, in degrees
    pub fn midpoint_angle(&self) -> f64 {
        let (dx, dy) = match *self {
            PathDescriptor::Band {
                start,
                control1,
                control2,
                end,
            } => (
                end.x + control2.x - control1.x - start.x,
                end.y + control2.y - control1.y - start.y,
            ),
            PathDescriptor::Arc { start, end, .. } => (end.x - start.x, end.y - start.y),
        };
        dy.atan2(dx).to_degrees()
    }

    /// SVG path data
    pub fn to_svg(&self) -> String {
        match *self {
            PathDescriptor::Band {
                start,
                control1,
                control2,
                end,
            } => format!(
                "M{},{}C{},{} {},{} {},{}",
                num(start.x),
                num(start.y),
                num(control1.x),
                num(control1.y),
                num(control2.x),
                num(control2.y),
                num(end.x),
                num(end.y),
            ),
            PathDescriptor::Arc { start, end, radius } => format!(
                "M{},{}A{},{} 0 0,1 {},{}",
                num(start.x),
                num(start.y),
                num(radius),
                num(radius),
                num(end.x),
                num(end.y),
            ),
        }
    }
}

/// Format a coordinate with at most two decimals and no trailing zeros
pub fn num(value: f64) -> String {
    let fixed = format!("{:.2}", value);
    let trimmed = fixed.trim_end_matches('0').trim_end_matches('.');
    match trimmed {
        "-0" | "" => "0".to_string(),
        other => other.to_string(),
    }
}

/// Emitted geometry for one node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeGeometry {
    pub id: String,
    pub name: String,
    pub node_type: NodeType,

    /// Top-left corner in the flow view, centre in the force view
    pub position: Point,
    pub extent: Extent,
    pub shape: ShapeKind,

    /// Column index (flow view only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub layer: Option<usize>,
}

/// Emitted geometry for one link
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkGeometry {
    pub source: String,
    pub target: String,
    pub path: PathDescriptor,
    pub stroke_width: f64,

    /// Relation name, used as the style class and marker id
    pub type_class: String,
}

/// Complete geometry of one view
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutResult {
    pub view: ViewKind,
    pub width: f64,
    pub height: f64,
    pub nodes: Vec<NodeGeometry>,
    pub links: Vec<LinkGeometry>,
}

impl LayoutResult {
    pub fn node(&self, id: &str) -> Option<&NodeGeometry> {
        self.nodes.iter().find(|n| n.id == id)
    }
}
