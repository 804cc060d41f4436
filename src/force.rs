//! Force-directed layout engine
//!
//! Implements the velocity-based force model popularised by D3: springs on
//! links, exact pairwise repulsion, optional centering, and velocity decay.
//! The simulation cools with an `alpha` that decays toward `alpha_target`;
//! holding a node raises the target so the layout keeps reacting until the
//! node is released.
//!
//! Links are drawn as circular arcs between node centres so the direction
//! marker at the arc midpoint reads unambiguously even for reciprocal links.

use std::f64::consts::PI;

use tracing::debug;

use crate::config::CanvasConfig;
use crate::geometry::{
    LayoutResult, LinkGeometry, NodeGeometry, PathDescriptor, Point, ShapeKind, ViewKind,
};
use crate::graph::{Graph, LinkType, NodeType};
use crate::interaction::DragTarget;

/// Alpha below which the simulation is considered settled
pub const ALPHA_MIN: f64 = 0.001;

/// Alpha target while a node is held
pub const DRAG_ALPHA_TARGET: f64 = 0.3;

/// Stroke width of force-view links
pub const LINK_STROKE: f64 = 1.5;

/// Squared distance below which repulsion stops growing
const DISTANCE_MIN2: f64 = 1.0;

/// Spacing of the initial phyllotaxis spiral
const INITIAL_RADIUS: f64 = 10.0;

/// A node with position and velocity for simulation
#[derive(Debug, Clone)]
struct SimNode {
    id: String,
    name: String,
    node_type: NodeType,
    x: f64,
    y: f64,
    vx: f64,
    vy: f64,
    /// Position override while the node is dragged
    pinned: Option<Point>,
}

/// An edge for simulation (indices into node array)
#[derive(Debug, Clone)]
struct SimLink {
    source: usize,
    target: usize,
    link_type: LinkType,
    /// Spring constant, weaker for links touching well-connected nodes
    strength: f64,
    /// Share of the correction applied to the target end
    bias: f64,
}

/// Deterministic sub-pixel nudge for coincident nodes
fn jiggle(seed: usize) -> f64 {
    ((seed as f64 * 0.618_033_988_75).fract() - 0.5) * 1e-6
}

/// CPU force simulation over one graph
#[derive(Debug, Clone)]
pub struct ForceSimulation {
    config: CanvasConfig,
    nodes: Vec<SimNode>,
    links: Vec<SimLink>,
    alpha: f64,
    alpha_target: f64,
    alpha_decay: f64,
    ticks: usize,
}

impl ForceSimulation {
    /// Seed nodes on a phyllotaxis spiral around the canvas centre
    pub fn new(graph: &Graph, config: &CanvasConfig) -> Self {
        let (cx, cy) = (config.width / 2.0, config.height / 2.0);
        let initial_angle = PI * (3.0 - 5.0_f64.sqrt());

        let nodes = graph
            .nodes()
            .iter()
            .enumerate()
            .map(|(i, n)| {
                let radius = INITIAL_RADIUS * (0.5 + i as f64).sqrt();
                let angle = i as f64 * initial_angle;
                SimNode {
                    id: n.id.clone(),
                    name: n.name.clone(),
                    node_type: n.node_type,
                    x: cx + radius * angle.cos(),
                    y: cy + radius * angle.sin(),
                    vx: 0.0,
                    vy: 0.0,
                    pinned: None,
                }
            })
            .collect();

        let mut degree = vec![0usize; graph.len()];
        for link in graph.links() {
            degree[link.source] += 1;
            degree[link.target] += 1;
        }
        let links = graph
            .links()
            .iter()
            .map(|l| {
                let (ds, dt) = (degree[l.source] as f64, degree[l.target] as f64);
                SimLink {
                    source: l.source,
                    target: l.target,
                    link_type: l.link_type.clone(),
                    strength: 1.0 / ds.min(dt),
                    bias: ds / (ds + dt),
                }
            })
            .collect();

        Self {
            config: config.clone(),
            nodes,
            links,
            alpha: 1.0,
            alpha_target: 0.0,
            alpha_decay: 1.0 - ALPHA_MIN.powf(1.0 / config.tick_budget as f64),
            ticks: 0,
        }
    }

    /// Check if simulation is still running
    pub fn is_running(&self) -> bool {
        self.alpha >= ALPHA_MIN
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    pub fn alpha_target(&self) -> f64 {
        self.alpha_target
    }

    /// Ticks run so far
    pub fn ticks(&self) -> usize {
        self.ticks
    }

    /// Set the temperature alpha cools (or warms) toward
    pub fn set_alpha_target(&mut self, target: f64) {
        self.alpha_target = target;
    }

    /// Run one simulation tick. Does nothing once settled.
    pub fn tick(&mut self) {
        if !self.is_running() && self.alpha_target < ALPHA_MIN {
            return;
        }
        self.alpha += (self.alpha_target - self.alpha) * self.alpha_decay;

        self.apply_link_force();
        self.apply_many_body_force();
        if self.config.center_force {
            self.apply_center_force();
        }

        let decay = self.config.velocity_decay;
        for node in &mut self.nodes {
            match node.pinned {
                Some(at) => {
                    node.x = at.x;
                    node.y = at.y;
                    node.vx = 0.0;
                    node.vy = 0.0;
                }
                None => {
                    node.vx *= decay;
                    node.vy *= decay;
                    node.x += node.vx;
                    node.y += node.vy;
                }
            }
        }
        self.ticks += 1;
    }

    /// Pull linked nodes toward the rest length, using predicted positions
    fn apply_link_force(&mut self) {
        let distance = self.config.link_distance;
        for (i, link) in self.links.iter().enumerate() {
            let (s, t) = (&self.nodes[link.source], &self.nodes[link.target]);
            let mut dx = t.x + t.vx - s.x - s.vx;
            let mut dy = t.y + t.vy - s.y - s.vy;
            if dx == 0.0 {
                dx = jiggle(i);
            }
            if dy == 0.0 {
                dy = jiggle(i + 1);
            }

            let l = dx.hypot(dy);
            let k = (l - distance) / l * self.alpha * link.strength;
            let (fx, fy) = (dx * k, dy * k);

            let target = &mut self.nodes[link.target];
            target.vx -= fx * link.bias;
            target.vy -= fy * link.bias;
            let source = &mut self.nodes[link.source];
            source.vx += fx * (1.0 - link.bias);
            source.vy += fy * (1.0 - link.bias);
        }
    }

    /// Apply charge between every node pair (negative charge repels)
    fn apply_many_body_force(&mut self) {
        let n = self.nodes.len();
        let strength = self.config.charge_strength;

        for i in 0..n {
            for j in (i + 1)..n {
                let mut dx = self.nodes[j].x - self.nodes[i].x;
                let mut dy = self.nodes[j].y - self.nodes[i].y;
                if dx == 0.0 {
                    dx = jiggle(i * n + j);
                }
                if dy == 0.0 {
                    dy = jiggle(j * n + i);
                }

                let mut l = dx * dx + dy * dy;
                if l < DISTANCE_MIN2 {
                    l = (DISTANCE_MIN2 * l).sqrt();
                }
                let w = strength * self.alpha / l;

                self.nodes[i].vx += dx * w;
                self.nodes[i].vy += dy * w;
                self.nodes[j].vx -= dx * w;
                self.nodes[j].vy -= dy * w;
            }
        }
    }

    /// Translate every node so the centroid sits at the canvas centre
    fn apply_center_force(&mut self) {
        if self.nodes.is_empty() {
            return;
        }
        let n = self.nodes.len() as f64;
        let sx = self.nodes.iter().map(|node| node.x).sum::<f64>() / n;
        let sy = self.nodes.iter().map(|node| node.y).sum::<f64>() / n;
        let (shift_x, shift_y) = (self.config.width / 2.0 - sx, self.config.height / 2.0 - sy);

        for node in &mut self.nodes {
            node.x += shift_x;
            node.y += shift_y;
        }
    }

    /// Run up to `max_ticks` ticks, stopping early once settled. Returns the
    /// number of ticks run.
    pub fn run(&mut self, max_ticks: usize) -> usize {
        let start = self.ticks;
        for _ in 0..max_ticks {
            if !self.is_running() {
                break;
            }
            self.tick();
        }
        self.ticks - start
    }

    /// Run to convergence (or the configured tick budget)
    pub fn run_to_convergence(&mut self) -> usize {
        let ran = self.run(self.config.tick_budget);
        debug!(ticks = ran, alpha = self.alpha, "force layout settled");
        ran
    }

    /// Hold a node at a position; it is excluded from integration until
    /// released
    pub fn pin(&mut self, index: usize, at: Point) {
        if let Some(node) = self.nodes.get_mut(index) {
            node.pinned = Some(at);
            node.x = at.x;
            node.y = at.y;
            node.vx = 0.0;
            node.vy = 0.0;
        }
    }

    /// Release a held node where it is, with zero velocity
    pub fn unpin(&mut self, index: usize) {
        if let Some(node) = self.nodes.get_mut(index) {
            node.pinned = None;
            node.vx = 0.0;
            node.vy = 0.0;
        }
    }

    pub fn is_pinned(&self, index: usize) -> bool {
        self.nodes.get(index).is_some_and(|n| n.pinned.is_some())
    }

    pub fn node_index(&self, id: &str) -> Option<usize> {
        self.nodes.iter().position(|n| n.id == id)
    }

    pub fn position(&self, index: usize) -> Point {
        Point::new(self.nodes[index].x, self.nodes[index].y)
    }

    /// Current node centres, in graph order
    pub fn positions(&self) -> Vec<Point> {
        self.nodes.iter().map(|n| Point::new(n.x, n.y)).collect()
    }

    /// Where a dragged node may go
    fn drag_position(&self, pointer: Point) -> Point {
        if self.config.clamp_force_drag {
            Point::new(
                pointer.x.clamp(0.0, self.config.width),
                pointer.y.clamp(0.0, self.config.height),
            )
        } else {
            pointer
        }
    }

    /// Current geometry; arcs are derived from the current node centres
    pub fn geometry(&self) -> LayoutResult {
        let nodes = self
            .nodes
            .iter()
            .map(|n| {
                let shape = ShapeKind::for_node_type(n.node_type);
                NodeGeometry {
                    id: n.id.clone(),
                    name: n.name.clone(),
                    node_type: n.node_type,
                    position: Point::new(n.x, n.y),
                    extent: shape.footprint(),
                    shape,
                    layer: None,
                }
            })
            .collect();

        let links = self
            .links
            .iter()
            .map(|l| {
                let (s, t) = (&self.nodes[l.source], &self.nodes[l.target]);
                LinkGeometry {
                    source: s.id.clone(),
                    target: t.id.clone(),
                    path: PathDescriptor::arc(Point::new(s.x, s.y), Point::new(t.x, t.y)),
                    stroke_width: LINK_STROKE,
                    type_class: l.link_type.to_string(),
                }
            })
            .collect();

        LayoutResult {
            view: ViewKind::Force,
            width: self.config.width,
            height: self.config.height,
            nodes,
            links,
        }
    }
}

impl DragTarget for ForceSimulation {
    fn node_index(&self, id: &str) -> Option<usize> {
        ForceSimulation::node_index(self, id)
    }

    fn drag_started(&mut self, index: usize) {
        self.set_alpha_target(DRAG_ALPHA_TARGET);
        let at = self.position(index);
        self.pin(index, at);
        debug!(node = %self.nodes[index].id, "force drag started");
    }

    fn drag_moved(&mut self, index: usize, pointer: Point) -> Point {
        let at = self.drag_position(pointer);
        self.pin(index, at);
        at
    }

    fn drag_ended(&mut self, index: usize) {
        self.set_alpha_target(0.0);
        self.unpin(index);
        debug!(node = %self.nodes[index].id, "force drag ended");
    }
}

/// Settled force layout of a graph
pub fn layout(graph: &Graph, config: &CanvasConfig) -> LayoutResult {
    let mut simulation = ForceSimulation::new(graph, config);
    simulation.run_to_convergence();
    simulation.geometry()
}
