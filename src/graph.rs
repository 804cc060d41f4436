//! Provenance graph data model
//!
//! A [`GraphDocument`] is the already-parsed input (nodes + links). It is
//! resolved exactly once into a [`Graph`], whose links address nodes by index.
//! Resolution is the only place malformed input is rejected; after that the
//! structure is immutable and the layout engines own all positional state.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

/// Weight assumed for links that do not carry one
pub const DEFAULT_WEIGHT: f64 = 1.0;

/// Node type enumeration (PROV core classes)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NodeType {
    Entity,
    Activity,
    Agent,
    ActivityFlow,
}

impl NodeType {
    /// Name used in documents and as the rendering class
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeType::Entity => "entity",
            NodeType::Activity => "activity",
            NodeType::Agent => "agent",
            NodeType::ActivityFlow => "activityFlow",
        }
    }

    /// Activity flows are activities composed of steps
    fn is_activity(&self) -> bool {
        matches!(self, NodeType::Activity | NodeType::ActivityFlow)
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Relation carried by a link.
///
/// The eight PROV relations drawn by the viewer are named variants; any other
/// relation name is kept verbatim so it still gets a stable style class.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum LinkType {
    Used,
    WasGeneratedBy,
    HadMember,
    HadStep,
    WasAssociatedWith,
    WasAttributedTo,
    WasDerivedFrom,
    WasInformedBy,
    Other(String),
}

impl LinkType {
    /// Relations with a dedicated style and arrow marker
    pub const KNOWN: [LinkType; 8] = [
        LinkType::Used,
        LinkType::WasGeneratedBy,
        LinkType::HadMember,
        LinkType::HadStep,
        LinkType::WasAssociatedWith,
        LinkType::WasAttributedTo,
        LinkType::WasDerivedFrom,
        LinkType::WasInformedBy,
    ];

    pub fn as_str(&self) -> &str {
        match self {
            LinkType::Used => "used",
            LinkType::WasGeneratedBy => "wasGeneratedBy",
            LinkType::HadMember => "hadMember",
            LinkType::HadStep => "hadStep",
            LinkType::WasAssociatedWith => "wasAssociatedWith",
            LinkType::WasAttributedTo => "wasAttributedTo",
            LinkType::WasDerivedFrom => "wasDerivedFrom",
            LinkType::WasInformedBy => "wasInformedBy",
            LinkType::Other(name) => name,
        }
    }

    /// Whether a link of this relation may connect the given endpoint types
    pub fn admits(&self, source: NodeType, target: NodeType) -> bool {
        use NodeType::*;
        match self {
            LinkType::Used => source.is_activity() && target == Entity,
            LinkType::WasGeneratedBy => source == Entity && target.is_activity(),
            LinkType::HadMember | LinkType::WasDerivedFrom => source == Entity && target == Entity,
            LinkType::HadStep => source == ActivityFlow && target.is_activity(),
            LinkType::WasAssociatedWith => source.is_activity() && target == Agent,
            LinkType::WasAttributedTo => source == Entity && target == Agent,
            LinkType::WasInformedBy => source.is_activity() && target.is_activity(),
            LinkType::Other(_) => true,
        }
    }
}

impl From<String> for LinkType {
    fn from(name: String) -> Self {
        LinkType::KNOWN
            .into_iter()
            .find(|known| known.as_str() == name)
            .unwrap_or(LinkType::Other(name))
    }
}

impl From<&str> for LinkType {
    fn from(name: &str) -> Self {
        LinkType::from(name.to_string())
    }
}

impl From<LinkType> for String {
    fn from(link_type: LinkType) -> Self {
        link_type.as_str().to_string()
    }
}

impl fmt::Display for LinkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reference from a link record to a node: position in `nodes` or node id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NodeRef {
    Index(usize),
    Id(String),
}

impl fmt::Display for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeRef::Index(i) => write!(f, "#{i}"),
            NodeRef::Id(id) => write!(f, "'{id}'"),
        }
    }
}

impl From<usize> for NodeRef {
    fn from(index: usize) -> Self {
        NodeRef::Index(index)
    }
}

impl From<&str> for NodeRef {
    fn from(id: &str) -> Self {
        NodeRef::Id(id.to_string())
    }
}

/// A node as it appears in the input document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeRecord {
    /// Stable identifier; index-addressed documents may omit it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Display label
    pub name: String,

    #[serde(rename = "type")]
    pub node_type: NodeType,
}

/// A link as it appears in the input document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkRecord {
    pub source: NodeRef,
    pub target: NodeRef,

    #[serde(rename = "type")]
    pub link_type: LinkType,

    /// Flow magnitude; `value` is accepted as an alias
    #[serde(default, alias = "value", skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
}

/// The parsed input document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphDocument {
    pub nodes: Vec<NodeRecord>,

    #[serde(default)]
    pub links: Vec<LinkRecord>,
}

/// Which end of a link a reference belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkEnd {
    Source,
    Target,
}

impl fmt::Display for LinkEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkEnd::Source => f.write_str("source"),
            LinkEnd::Target => f.write_str("target"),
        }
    }
}

/// Reasons a document is rejected at load time
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MalformedGraph {
    /// Two node records share an id
    #[error("duplicate node id '{0}'")]
    DuplicateId(String),

    /// A link endpoint does not resolve to a node of the same document
    #[error("link {link} has an unresolved {end} reference {reference}")]
    DanglingReference {
        link: usize,
        end: LinkEnd,
        reference: NodeRef,
    },

    #[error("link {link} has negative weight {weight}")]
    NegativeWeight { link: usize, weight: f64 },

    #[error("link {link} has a non-finite weight")]
    NonFiniteWeight { link: usize },
}

/// A resolved node
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: String,
    pub name: String,
    pub node_type: NodeType,
}

/// A resolved link; endpoints are indices into [`Graph::nodes`]
#[derive(Debug, Clone, PartialEq)]
pub struct Link {
    pub source: usize,
    pub target: usize,
    pub link_type: LinkType,
    pub weight: f64,
}

/// Immutable provenance graph for one viewing session
#[derive(Debug, Clone, Default)]
pub struct Graph {
    nodes: Vec<Node>,
    links: Vec<Link>,
    index: HashMap<String, usize>,
}

impl Graph {
    /// Resolve a document, rejecting duplicate ids, dangling references and
    /// invalid weights. Node insertion order is preserved.
    pub fn from_document(document: &GraphDocument) -> Result<Self, MalformedGraph> {
        let mut nodes = Vec::with_capacity(document.nodes.len());
        let mut index = HashMap::with_capacity(document.nodes.len());

        for (i, record) in document.nodes.iter().enumerate() {
            let id = record.id.clone().unwrap_or_else(|| i.to_string());
            if index.insert(id.clone(), i).is_some() {
                return Err(MalformedGraph::DuplicateId(id));
            }
            nodes.push(Node {
                id,
                name: record.name.clone(),
                node_type: record.node_type,
            });
        }

        let resolve = |link: usize, end: LinkEnd, reference: &NodeRef| {
            let resolved = match reference {
                NodeRef::Index(i) => (*i < nodes.len()).then_some(*i),
                NodeRef::Id(id) => index.get(id).copied(),
            };
            resolved.ok_or_else(|| MalformedGraph::DanglingReference {
                link,
                end,
                reference: reference.clone(),
            })
        };

        let mut links = Vec::with_capacity(document.links.len());
        for (i, record) in document.links.iter().enumerate() {
            let source = resolve(i, LinkEnd::Source, &record.source)?;
            let target = resolve(i, LinkEnd::Target, &record.target)?;

            let weight = record.weight.unwrap_or(DEFAULT_WEIGHT);
            if !weight.is_finite() {
                return Err(MalformedGraph::NonFiniteWeight { link: i });
            }
            if weight < 0.0 {
                return Err(MalformedGraph::NegativeWeight { link: i, weight });
            }

            let (source_type, target_type) = (nodes[source].node_type, nodes[target].node_type);
            if !record.link_type.admits(source_type, target_type) {
                warn!(
                    link = i,
                    relation = %record.link_type,
                    "{} link from {} '{}' to {} '{}' does not match its PROV roles",
                    record.link_type,
                    source_type,
                    nodes[source].id,
                    target_type,
                    nodes[target].id,
                );
            }

            links.push(Link {
                source,
                target,
                link_type: record.link_type.clone(),
                weight,
            });
        }

        debug!(nodes = nodes.len(), links = links.len(), "graph resolved");
        Ok(Self {
            nodes,
            links,
            index,
        })
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn links(&self) -> &[Link] {
        &self.links
    }

    /// Look up a node's index by id
    pub fn node_index(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl TryFrom<&GraphDocument> for Graph {
    type Error = MalformedGraph;

    fn try_from(document: &GraphDocument) -> Result<Self, Self::Error> {
        Graph::from_document(document)
    }
}
