//! Flow (Sankey-style) layout engine
//!
//! Nodes are placed in columns by longest-path layering, sized by the flow
//! they carry and relaxed vertically toward their neighbours. Links become
//! bands whose thickness is proportional to their weight.
//!
//! Pipeline:
//! 1. layering (cycles are broken by ignoring back-edges for layering only)
//! 2. horizontal placement, with sinks moved to the rightmost column
//! 3. vertical scale so the fullest column exactly fills the canvas height
//! 4. relaxation passes with collision resolution
//! 5. band offsets of each link at both ends
//!
//! After a node is dragged only step 5 is redone, and only around that node.

use std::collections::VecDeque;

use tracing::{debug, warn};

use crate::config::CanvasConfig;
use crate::geometry::{
    Extent, LayoutResult, LinkGeometry, NodeGeometry, PathDescriptor, Point, ShapeKind, ViewKind,
};
use crate::graph::{Graph, LinkType, NodeType};
use crate::interaction::DragTarget;

/// Factor applied to the relaxation strength on every pass
const ALPHA_DECAY: f64 = 0.99;

/// Largest share of the canvas height that padding may take in one column
const MAX_PADDING_SHARE: f64 = 0.5;

#[derive(Debug, Clone)]
struct FlowNode {
    id: String,
    name: String,
    node_type: NodeType,
    layer: usize,
    /// Larger of total incoming and total outgoing weight
    value: f64,
    x: f64,
    y: f64,
    dx: f64,
    dy: f64,
    /// Outgoing link indices, kept ordered by target position
    outgoing: Vec<usize>,
    /// Incoming link indices, kept ordered by source position
    incoming: Vec<usize>,
}

#[derive(Debug, Clone)]
struct FlowLink {
    source: usize,
    target: usize,
    link_type: LinkType,
    weight: f64,
    /// Band thickness
    dy: f64,
    /// Band offset below the source node's top edge
    sy: f64,
    /// Band offset below the target node's top edge
    ty: f64,
}

fn center(node: &FlowNode) -> f64 {
    node.y + node.dy / 2.0
}

/// Flow layout of one graph, kept alive for incremental updates
#[derive(Debug, Clone)]
pub struct FlowLayout {
    config: CanvasConfig,
    nodes: Vec<FlowNode>,
    links: Vec<FlowLink>,
    /// Node indices per layer, ordered top to bottom
    columns: Vec<Vec<usize>>,
    /// Pixels per unit of weight
    scale: f64,
    /// Gap between stacked nodes, shrunk when the fullest column would not fit
    padding: f64,
    /// Links ignored while layering because they close a cycle
    back_edges: Vec<usize>,
}

impl FlowLayout {
    /// Run the full layout
    pub fn new(graph: &Graph, config: &CanvasConfig) -> Self {
        let nodes = graph
            .nodes()
            .iter()
            .map(|n| FlowNode {
                id: n.id.clone(),
                name: n.name.clone(),
                node_type: n.node_type,
                layer: 0,
                value: 0.0,
                x: 0.0,
                y: 0.0,
                dx: config.node_thickness,
                dy: 0.0,
                outgoing: Vec::new(),
                incoming: Vec::new(),
            })
            .collect();

        let links = graph
            .links()
            .iter()
            .map(|l| FlowLink {
                source: l.source,
                target: l.target,
                link_type: l.link_type.clone(),
                weight: l.weight,
                dy: 0.0,
                sy: 0.0,
                ty: 0.0,
            })
            .collect();

        let mut layout = Self {
            config: config.clone(),
            nodes,
            links,
            columns: Vec::new(),
            scale: 0.0,
            padding: config.node_padding,
            back_edges: Vec::new(),
        };

        layout.compute_node_links();
        layout.compute_node_values();
        layout.compute_layers();
        layout.compute_node_breadths();
        layout.compute_node_depths(config.flow_iterations);
        layout.compute_link_depths();

        debug!(
            nodes = layout.nodes.len(),
            layers = layout.columns.len(),
            scale = layout.scale,
            "flow layout computed"
        );
        layout
    }

    fn compute_node_links(&mut self) {
        for (i, link) in self.links.iter().enumerate() {
            self.nodes[link.source].outgoing.push(i);
            self.nodes[link.target].incoming.push(i);
        }
    }

    fn compute_node_values(&mut self) {
        for node in &mut self.nodes {
            let out: f64 = node.outgoing.iter().map(|&l| self.links[l].weight).sum();
            let inc: f64 = node.incoming.iter().map(|&l| self.links[l].weight).sum();
            let value = out.max(inc);
            // Empty sums are -0.0
            node.value = if value > 0.0 { value } else { 0.0 };
        }
    }

    /// Depth-first search in insertion order; a link into a node that is
    /// still on the stack closes a cycle.
    fn find_back_edges(&self) -> Vec<bool> {
        #[derive(Clone, Copy, PartialEq)]
        enum Visit {
            New,
            Active,
            Done,
        }

        let mut state = vec![Visit::New; self.nodes.len()];
        let mut back = vec![false; self.links.len()];

        for root in 0..self.nodes.len() {
            if state[root] != Visit::New {
                continue;
            }
            state[root] = Visit::Active;
            let mut stack = vec![(root, 0usize)];

            while let Some(&(node, next)) = stack.last() {
                match self.nodes[node].outgoing.get(next) {
                    Some(&link) => {
                        let top = stack.len() - 1;
                        stack[top].1 += 1;
                        let target = self.links[link].target;
                        match state[target] {
                            Visit::Active => back[link] = true,
                            Visit::New => {
                                state[target] = Visit::Active;
                                stack.push((target, 0));
                            }
                            Visit::Done => {}
                        }
                    }
                    None => {
                        state[node] = Visit::Done;
                        stack.pop();
                    }
                }
            }
        }
        back
    }

    /// Longest-path layering over the acyclic part of the link set, then
    /// sinks move to the last layer.
    fn compute_layers(&mut self) {
        let back = self.find_back_edges();
        for (i, is_back) in back.iter().enumerate() {
            if *is_back {
                let link = &self.links[i];
                warn!(
                    source = %self.nodes[link.source].id,
                    target = %self.nodes[link.target].id,
                    relation = %link.link_type,
                    "cycle in flow links; ignoring back-edge for layering"
                );
                self.back_edges.push(i);
            }
        }

        let n = self.nodes.len();
        let mut indegree = vec![0usize; n];
        for (i, link) in self.links.iter().enumerate() {
            if !back[i] {
                indegree[link.target] += 1;
            }
        }

        let mut depth = vec![0usize; n];
        let mut queue: VecDeque<usize> = (0..n).filter(|&i| indegree[i] == 0).collect();
        while let Some(node) = queue.pop_front() {
            for &link in &self.nodes[node].outgoing {
                if back[link] {
                    continue;
                }
                let target = self.links[link].target;
                depth[target] = depth[target].max(depth[node] + 1);
                indegree[target] -= 1;
                if indegree[target] == 0 {
                    queue.push_back(target);
                }
            }
        }

        let last = depth.iter().copied().max().unwrap_or(0);
        for (i, node) in self.nodes.iter_mut().enumerate() {
            let is_sink = node.outgoing.iter().all(|&l| back[l]);
            node.layer = if is_sink { last } else { depth[i] };
        }

        self.columns = vec![Vec::new(); if n == 0 { 0 } else { last + 1 }];
        for (i, node) in self.nodes.iter().enumerate() {
            self.columns[node.layer].push(i);
        }
    }

    fn compute_node_breadths(&mut self) {
        let gaps = self.columns.len().saturating_sub(1);
        let kx = if gaps == 0 {
            0.0
        } else {
            (self.config.width - self.config.node_thickness) / gaps as f64
        };
        for node in &mut self.nodes {
            node.x = node.layer as f64 * kx;
            node.dx = self.config.node_thickness;
        }
    }

    fn compute_node_depths(&mut self, iterations: usize) {
        self.initialize_node_depth();
        self.resolve_collisions();

        let mut alpha = 1.0;
        for _ in 0..iterations {
            alpha *= ALPHA_DECAY;
            self.relax_right_to_left(alpha);
            self.resolve_collisions();
            self.relax_left_to_right(alpha);
            self.resolve_collisions();
        }
    }

    /// The fullest column (weight plus padding) sets the common scale.
    /// Padding never takes more than half the height, so a crowded column
    /// keeps a positive scale.
    fn initialize_node_depth(&mut self) {
        let height = self.config.height;
        let min_extent = self.config.min_stroke;

        let crowded = self.columns.iter().map(Vec::len).max().unwrap_or(0);
        self.padding = if crowded > 1 {
            self.config
                .node_padding
                .min(height * MAX_PADDING_SHARE / (crowded - 1) as f64)
        } else {
            self.config.node_padding
        };
        let padding = self.padding;

        let scale = self
            .columns
            .iter()
            .filter_map(|column| {
                let total: f64 = column.iter().map(|&i| self.nodes[i].value).sum();
                // Nodes without flow still take their minimum extent
                let empty = column.iter().filter(|&&i| self.nodes[i].value <= 0.0).count();
                let free = height
                    - (column.len() - 1) as f64 * padding
                    - empty as f64 * min_extent;
                (total > 0.0).then(|| free / total)
            })
            .fold(f64::INFINITY, f64::min);
        self.scale = if scale.is_finite() { scale.max(0.0) } else { 0.0 };

        for column in &self.columns {
            for (position, &i) in column.iter().enumerate() {
                let node = &mut self.nodes[i];
                node.y = position as f64;
                node.dy = (node.value * self.scale).max(min_extent);
            }
        }
        for link in &mut self.links {
            link.dy = link.weight * self.scale;
        }
    }

    /// Pull nodes toward the weighted centre of their sources
    fn relax_left_to_right(&mut self, alpha: f64) {
        for column in &self.columns {
            for &i in column {
                let incoming = &self.nodes[i].incoming;
                let total: f64 = incoming.iter().map(|&l| self.links[l].weight).sum();
                if total <= 0.0 {
                    continue;
                }
                let weighted: f64 = incoming
                    .iter()
                    .map(|&l| center(&self.nodes[self.links[l].source]) * self.links[l].weight)
                    .sum();
                let shift = (weighted / total - center(&self.nodes[i])) * alpha;
                self.nodes[i].y += shift;
            }
        }
    }

    /// Pull nodes toward the weighted centre of their targets
    fn relax_right_to_left(&mut self, alpha: f64) {
        for column in self.columns.iter().rev() {
            for &i in column {
                let outgoing = &self.nodes[i].outgoing;
                let total: f64 = outgoing.iter().map(|&l| self.links[l].weight).sum();
                if total <= 0.0 {
                    continue;
                }
                let weighted: f64 = outgoing
                    .iter()
                    .map(|&l| center(&self.nodes[self.links[l].target]) * self.links[l].weight)
                    .sum();
                let shift = (weighted / total - center(&self.nodes[i])) * alpha;
                self.nodes[i].y += shift;
            }
        }
    }

    /// Push overlapping nodes down, then back up from the bottom edge
    fn resolve_collisions(&mut self) {
        let padding = self.padding;
        let height = self.config.height;
        let nodes = &mut self.nodes;

        for column in &mut self.columns {
            column.sort_by(|&a, &b| nodes[a].y.total_cmp(&nodes[b].y));

            let mut y0 = 0.0;
            for &i in column.iter() {
                let node = &mut nodes[i];
                let overlap = y0 - node.y;
                if overlap > 0.0 {
                    node.y += overlap;
                }
                y0 = node.y + node.dy + padding;
            }

            let overflow = y0 - padding - height;
            if overflow > 0.0 {
                let Some((&last, rest)) = column.split_last() else {
                    continue;
                };
                nodes[last].y -= overflow;
                let mut y0 = nodes[last].y;
                for &i in rest.iter().rev() {
                    let node = &mut nodes[i];
                    let overlap = node.y + node.dy + padding - y0;
                    if overlap > 0.0 {
                        node.y -= overlap;
                    }
                    y0 = node.y;
                }
            }
        }
    }

    fn compute_link_depths(&mut self) {
        for i in 0..self.nodes.len() {
            self.order_bands(i);
        }
    }

    /// Stack a node's outgoing bands by target height and its incoming
    /// bands by source height
    fn order_bands(&mut self, i: usize) {
        let nodes = &self.nodes;
        let links = &self.links;

        let mut outgoing = nodes[i].outgoing.clone();
        outgoing.sort_by(|&a, &b| nodes[links[a].target].y.total_cmp(&nodes[links[b].target].y));
        let mut incoming = nodes[i].incoming.clone();
        incoming.sort_by(|&a, &b| nodes[links[a].source].y.total_cmp(&nodes[links[b].source].y));

        let mut sy = 0.0;
        for &l in &outgoing {
            self.links[l].sy = sy;
            sy += self.links[l].dy;
        }
        let mut ty = 0.0;
        for &l in &incoming {
            self.links[l].ty = ty;
            ty += self.links[l].dy;
        }

        self.nodes[i].outgoing = outgoing;
        self.nodes[i].incoming = incoming;
    }

    /// Recompute only what a moved node affects: its column order and the
    /// band offsets at the node and at its direct neighbours.
    pub fn relayout_around(&mut self, index: usize) {
        let Some(node) = self.nodes.get(index) else {
            return;
        };
        let layer = node.layer;
        let mut affected = vec![index];
        affected.extend(node.outgoing.iter().map(|&l| self.links[l].target));
        affected.extend(node.incoming.iter().map(|&l| self.links[l].source));
        affected.sort_unstable();
        affected.dedup();

        let nodes = &self.nodes;
        self.columns[layer].sort_by(|&a, &b| nodes[a].y.total_cmp(&nodes[b].y));

        for i in affected {
            self.order_bands(i);
        }
    }

    /// Move a node's top-left corner, keeping its whole extent on the
    /// canvas, then update the links it touches. Returns the applied position.
    pub fn move_node(&mut self, index: usize, to: Point) -> Point {
        let Some(node) = self.nodes.get_mut(index) else {
            return to;
        };
        node.x = (self.config.width - node.dx).min(to.x).max(0.0);
        node.y = (self.config.height - node.dy).min(to.y).max(0.0);
        let applied = Point::new(node.x, node.y);
        self.relayout_around(index);
        applied
    }

    pub fn node_index(&self, id: &str) -> Option<usize> {
        self.nodes.iter().position(|n| n.id == id)
    }

    pub fn layer(&self, index: usize) -> usize {
        self.nodes[index].layer
    }

    pub fn position(&self, index: usize) -> Point {
        Point::new(self.nodes[index].x, self.nodes[index].y)
    }

    pub fn extent(&self, index: usize) -> Extent {
        Extent::new(self.nodes[index].dx, self.nodes[index].dy)
    }

    /// Node indices per layer, top to bottom
    pub fn columns(&self) -> &[Vec<usize>] {
        &self.columns
    }

    /// Pixels per unit of link weight
    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// Gap actually left between stacked nodes
    pub fn padding(&self) -> f64 {
        self.padding
    }

    /// Indices of links that were ignored for layering
    pub fn back_edges(&self) -> &[usize] {
        &self.back_edges
    }

    /// Band offsets `(at source, at target)` of a link
    pub fn band_offsets(&self, link: usize) -> (f64, f64) {
        (self.links[link].sy, self.links[link].ty)
    }

    fn link_path(&self, link: &FlowLink) -> PathDescriptor {
        let source = &self.nodes[link.source];
        let target = &self.nodes[link.target];
        PathDescriptor::band(
            Point::new(source.x + source.dx, source.y + link.sy + link.dy / 2.0),
            Point::new(target.x, target.y + link.ty + link.dy / 2.0),
            self.config.link_curvature,
        )
    }

    /// Current geometry
    pub fn geometry(&self) -> LayoutResult {
        let nodes = self
            .nodes
            .iter()
            .map(|n| NodeGeometry {
                id: n.id.clone(),
                name: n.name.clone(),
                node_type: n.node_type,
                position: Point::new(n.x, n.y),
                extent: Extent::new(n.dx, n.dy),
                shape: ShapeKind::Rectangle,
                layer: Some(n.layer),
            })
            .collect();

        let links = self
            .links
            .iter()
            .map(|l| LinkGeometry {
                source: self.nodes[l.source].id.clone(),
                target: self.nodes[l.target].id.clone(),
                path: self.link_path(l),
                stroke_width: l.dy.max(self.config.min_stroke),
                type_class: l.link_type.to_string(),
            })
            .collect();

        LayoutResult {
            view: ViewKind::Flow,
            width: self.config.width,
            height: self.config.height,
            nodes,
            links,
        }
    }
}

impl DragTarget for FlowLayout {
    fn node_index(&self, id: &str) -> Option<usize> {
        FlowLayout::node_index(self, id)
    }

    fn drag_started(&mut self, index: usize) {
        debug!(node = %self.nodes[index].id, "flow drag started");
    }

    fn drag_moved(&mut self, index: usize, pointer: Point) -> Point {
        self.move_node(index, pointer)
    }

    fn drag_ended(&mut self, index: usize) {
        debug!(node = %self.nodes[index].id, "flow drag ended");
    }
}

/// One-shot flow layout of a graph
pub fn layout(graph: &Graph, config: &CanvasConfig) -> LayoutResult {
    FlowLayout::new(graph, config).geometry()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{GraphDocument, LinkRecord, NodeRecord};

    const EPS: f64 = 1e-6;

    fn graph(nodes: &[(&str, NodeType)], links: &[(&str, &str, f64)]) -> Graph {
        let document = GraphDocument {
            nodes: nodes
                .iter()
                .map(|(id, node_type)| NodeRecord {
                    id: Some(id.to_string()),
                    name: id.to_string(),
                    node_type: *node_type,
                })
                .collect(),
            links: links
                .iter()
                .map(|(s, t, w)| LinkRecord {
                    source: (*s).into(),
                    target: (*t).into(),
                    link_type: LinkType::Used,
                    weight: Some(*w),
                })
                .collect(),
        };
        Graph::from_document(&document).unwrap()
    }

    fn chain() -> Graph {
        graph(
            &[
                ("a", NodeType::Entity),
                ("b", NodeType::Activity),
                ("c", NodeType::Entity),
            ],
            &[("a", "b", 2.0), ("b", "c", 2.0)],
        )
    }

    /// Two sources feed a hub that fans out to three sinks
    fn fan() -> Graph {
        graph(
            &[
                ("s1", NodeType::Entity),
                ("s2", NodeType::Entity),
                ("hub", NodeType::Activity),
                ("t1", NodeType::Entity),
                ("t2", NodeType::Entity),
                ("t3", NodeType::Entity),
            ],
            &[
                ("s1", "hub", 3.0),
                ("s2", "hub", 1.0),
                ("hub", "t1", 1.0),
                ("hub", "t2", 2.0),
                ("hub", "t3", 1.0),
            ],
        )
    }

    fn column_fill(layout: &FlowLayout, column: &[usize], padding: f64) -> f64 {
        let extents: f64 = column.iter().map(|&i| layout.extent(i).height).sum();
        extents + column.len().saturating_sub(1) as f64 * padding
    }

    #[test]
    fn chain_gets_one_layer_per_node() {
        let config = CanvasConfig::default();
        let layout = FlowLayout::new(&chain(), &config);

        assert_eq!(layout.layer(0), 0);
        assert_eq!(layout.layer(1), 1);
        assert_eq!(layout.layer(2), 2);
        assert_eq!(layout.columns().len(), 3);

        for i in 0..3 {
            assert!((layout.extent(i).height - config.height).abs() < EPS);
            assert!(layout.position(i).y.abs() < EPS);
        }
        assert!((layout.position(2).x - (config.width - config.node_thickness)).abs() < EPS);
    }

    #[test]
    fn layers_respect_longest_path() {
        let g = graph(
            &[
                ("a", NodeType::Entity),
                ("b", NodeType::Activity),
                ("c", NodeType::Entity),
                ("d", NodeType::Activity),
            ],
            &[("a", "b", 1.0), ("b", "c", 1.0), ("a", "c", 1.0), ("c", "d", 1.0)],
        );
        let layout = FlowLayout::new(&g, &CanvasConfig::default());

        for link in g.links() {
            assert!(layout.layer(link.target) >= layout.layer(link.source) + 1);
        }
        assert_eq!(layout.layer(2), 2);
        assert_eq!(layout.layer(3), 3);
    }

    #[test]
    fn sinks_move_to_last_layer() {
        let g = graph(
            &[
                ("a", NodeType::Entity),
                ("b", NodeType::Activity),
                ("c", NodeType::Entity),
                ("early", NodeType::Agent),
            ],
            &[("a", "b", 1.0), ("b", "c", 1.0), ("a", "early", 1.0)],
        );
        let layout = FlowLayout::new(&g, &CanvasConfig::default());

        assert_eq!(layout.layer(3), 2);
    }

    #[test]
    fn cycle_is_broken_for_layering_but_still_drawn() {
        let g = graph(
            &[
                ("a", NodeType::Entity),
                ("b", NodeType::Activity),
                ("c", NodeType::Entity),
            ],
            &[("a", "b", 1.0), ("b", "c", 1.0), ("c", "a", 1.0)],
        );
        let layout = FlowLayout::new(&g, &CanvasConfig::default());

        assert_eq!(layout.back_edges(), &[2]);
        assert_eq!(layout.layer(0), 0);
        assert_eq!(layout.layer(1), 1);
        assert_eq!(layout.layer(2), 2);
        assert_eq!(layout.geometry().links.len(), 3);
    }

    #[test]
    fn self_loop_does_not_hang_layering() {
        let g = graph(&[("a", NodeType::Activity)], &[("a", "a", 1.0)]);
        let layout = FlowLayout::new(&g, &CanvasConfig::default());

        assert_eq!(layout.back_edges(), &[0]);
        assert_eq!(layout.layer(0), 0);
    }

    #[test]
    fn fullest_column_fills_canvas_height() {
        let config = CanvasConfig::default();
        let layout = FlowLayout::new(&fan(), &config);

        let sinks = &layout.columns()[2];
        assert_eq!(sinks.len(), 3);
        assert!((column_fill(&layout, sinks, config.node_padding) - config.height).abs() < EPS);

        for column in layout.columns() {
            assert!(column_fill(&layout, column, config.node_padding) <= config.height + EPS);
        }
    }

    #[test]
    fn balanced_columns_all_fill_canvas_height() {
        let g = graph(
            &[
                ("a1", NodeType::Entity),
                ("a2", NodeType::Entity),
                ("b1", NodeType::Activity),
                ("b2", NodeType::Activity),
            ],
            &[("a1", "b1", 2.0), ("a2", "b2", 1.0)],
        );
        let config = CanvasConfig::with_size(400.0, 300.0);
        let layout = FlowLayout::new(&g, &config);

        for column in layout.columns() {
            assert!((column_fill(&layout, column, config.node_padding) - 300.0).abs() < EPS);
        }
    }

    #[test]
    fn nodes_stay_inside_canvas_and_do_not_overlap() {
        let config = CanvasConfig::default();
        let layout = FlowLayout::new(&fan(), &config);

        for column in layout.columns() {
            let mut bottom = f64::NEG_INFINITY;
            for &i in column {
                let top = layout.position(i).y;
                assert!(top >= -EPS);
                assert!(top + layout.extent(i).height <= config.height + EPS);
                assert!(top >= bottom - EPS);
                bottom = top + layout.extent(i).height + config.node_padding;
            }
        }
    }

    #[test]
    fn node_height_is_larger_of_in_and_out_flow() {
        let layout = FlowLayout::new(&fan(), &CanvasConfig::default());
        let hub = layout.node_index("hub").unwrap();

        assert!((layout.extent(hub).height - 4.0 * layout.scale()).abs() < EPS);
    }

    #[test]
    fn bands_stack_in_order_of_neighbour_height() {
        let layout = FlowLayout::new(&fan(), &CanvasConfig::default());
        let geometry = layout.geometry();

        let mut outgoing: Vec<(f64, f64)> = (2..5)
            .map(|l| {
                let target = geometry.node(&geometry.links[l].target).unwrap();
                (target.position.y, layout.band_offsets(l).0)
            })
            .collect();
        outgoing.sort_by(|a, b| a.0.total_cmp(&b.0));

        assert!(outgoing[0].1.abs() < EPS);
        assert!(outgoing.windows(2).all(|w| w[0].1 < w[1].1));
    }

    #[test]
    fn relaxation_is_deterministic() {
        let config = CanvasConfig::default();
        let first = FlowLayout::new(&fan(), &config).geometry();
        let second = FlowLayout::new(&fan(), &config).geometry();

        assert_eq!(first, second);
    }

    #[test]
    fn link_paths_join_node_edges() {
        let config = CanvasConfig::default();
        let layout = FlowLayout::new(&chain(), &config);
        let geometry = layout.geometry();

        let first = &geometry.links[0].path;
        assert!((first.start().x - config.node_thickness).abs() < EPS);
        assert!((first.start().y - config.height / 2.0).abs() < EPS);
        assert!((first.end().x - layout.position(1).x).abs() < EPS);
        assert!((geometry.links[0].stroke_width - config.height).abs() < EPS);
    }

    #[test]
    fn zero_weight_link_keeps_minimum_stroke() {
        let g = graph(
            &[("a", NodeType::Activity), ("b", NodeType::Entity), ("c", NodeType::Entity)],
            &[("a", "b", 1.0), ("a", "c", 0.0)],
        );
        let config = CanvasConfig::default();
        let flow = FlowLayout::new(&g, &config);
        let geometry = flow.geometry();

        assert_eq!(geometry.links[1].stroke_width, config.min_stroke);
        assert_eq!(geometry.nodes[2].extent.height, config.min_stroke);
        let sinks = &flow.columns()[1];
        assert!((column_fill(&flow, sinks, config.node_padding) - config.height).abs() < EPS);
    }

    #[test]
    fn isolated_node_keeps_minimum_extent() {
        let g = graph(
            &[("a", NodeType::Activity), ("b", NodeType::Entity), ("lone", NodeType::Agent)],
            &[("a", "b", 1.0)],
        );
        let config = CanvasConfig::default();
        let layout = FlowLayout::new(&g, &config);
        let lone = layout.node_index("lone").unwrap();

        let height = layout.extent(lone).height;
        assert_eq!(height, config.min_stroke);
        assert!(height.is_sign_positive());

        let top = layout.position(lone).y;
        assert!(top >= -EPS && top + height <= config.height + EPS);
        let json = serde_json::to_string(&layout.geometry()).unwrap();
        assert!(!json.contains("\"height\":-0.0"));
    }

    #[test]
    fn wide_fan_out_shrinks_padding_instead_of_collapsing() {
        let sinks: Vec<String> = (0..70).map(|i| format!("t{i}")).collect();
        let mut nodes = vec![("src", NodeType::Activity)];
        nodes.extend(sinks.iter().map(|id| (id.as_str(), NodeType::Entity)));
        let links: Vec<(&str, &str, f64)> =
            sinks.iter().map(|id| ("src", id.as_str(), 1.0)).collect();

        let config = CanvasConfig::default();
        let layout = FlowLayout::new(&graph(&nodes, &links), &config);

        assert!(layout.scale() > 0.0);
        assert!(layout.padding() < config.node_padding);
        assert!(layout.extent(0).height > 0.0);

        let column = &layout.columns()[1];
        assert_eq!(column.len(), 70);
        assert!((column_fill(&layout, column, layout.padding()) - config.height).abs() < EPS);
        for i in 0..=70 {
            let top = layout.position(i).y;
            assert!(top >= -EPS, "node {i} starts above the canvas at {top}");
            assert!(top + layout.extent(i).height <= config.height + EPS);
        }
    }

    #[test]
    fn all_zero_weights_do_not_produce_nan() {
        let g = graph(
            &[("a", NodeType::Activity), ("b", NodeType::Entity)],
            &[("a", "b", 0.0)],
        );
        let config = CanvasConfig::default();
        let geometry = layout(&g, &config);

        assert!(geometry
            .nodes
            .iter()
            .all(|n| n.position.y.is_finite() && n.extent.height == config.min_stroke));
    }

    #[test]
    fn empty_graph_handles_gracefully() {
        let layout = FlowLayout::new(&Graph::default(), &CanvasConfig::default());
        assert!(layout.columns().is_empty());
        assert!(layout.geometry().nodes.is_empty());
    }

    #[test]
    fn move_node_clamps_to_canvas() {
        let config = CanvasConfig::default();
        let mut layout = FlowLayout::new(&fan(), &config);
        let t1 = layout.node_index("t1").unwrap();
        let extent = layout.extent(t1);

        let applied = layout.move_node(t1, Point::new(5000.0, -300.0));

        assert_eq!(applied, Point::new(config.width - extent.width, 0.0));
        assert_eq!(layout.position(t1), applied);
        assert_eq!(layout.extent(t1), extent);
        assert_eq!(layout.layer(t1), 2);
    }

    #[test]
    fn moving_a_node_reorders_its_neighbours_bands() {
        let config = CanvasConfig::default();
        let mut layout = FlowLayout::new(&fan(), &config);
        // sink n is fed by hub link n - 1
        let band = |layout: &FlowLayout, sink: usize| layout.band_offsets(sink - 1).0;

        let column = layout.columns()[2].clone();
        let (top, bottom) = (column[0], column[2]);
        assert!(band(&layout, top) < band(&layout, bottom));

        let x = layout.position(top).x;
        layout.move_node(top, Point::new(x, config.height));
        layout.move_node(bottom, Point::new(x, 0.0));

        assert!(band(&layout, top) > band(&layout, bottom));
        assert_eq!(layout.columns()[2][0], bottom);
    }
}
