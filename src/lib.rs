//! provviz - layout and interaction core for provenance graph views.
//!
//! A provenance graph (entities, activities, agents and the PROV relations
//! between them) is laid out two ways: a layered flow diagram whose band
//! widths encode link weight, and a force-directed layout that settles
//! under spring and charge forces. Both emit plain geometry that a
//! rendering adapter draws, and both accept user drags through the
//! interaction controller.

pub mod config;
pub mod flow;
pub mod force;
pub mod geometry;
pub mod graph;
pub mod interaction;
pub mod io;
pub mod svg;
pub mod ticker;

pub use config::{CanvasConfig, ConfigError};
pub use flow::FlowLayout;
pub use force::ForceSimulation;
pub use geometry::{LayoutResult, PathDescriptor, Point, ShapeKind, ViewKind};
pub use graph::{Graph, GraphDocument, LinkType, MalformedGraph, NodeType};
pub use interaction::{DragTarget, InteractionController};
pub use io::{IoError, IoResult};
pub use ticker::{SimulationHandle, TickUpdate};
