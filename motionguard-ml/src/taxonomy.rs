//! Activity Taxonomy Tree
//!
//! ## Structure
//!
//! A taxonomy is a tree of labels. Every internal node gets an id; each of its
//! children is a label that may point at a further node:
//!
//! ```text
//! node 0 ""            ─┬─ CLASSIFIED → node 1
//!                       └─ UNKNOWN    (leaf)
//! node 1 "CLASSIFIED"  ─┬─ STATIONARY (leaf)
//!                       ├─ WALKING    (leaf)
//!                       ├─ ...
//!                       ├─ UNCARRIED  (leaf, absorbing)
//!                       └─ CHARGING   (leaf, absorbing)
//! ```
//!
//! Paths join labels with `/`. The tree is fixed once built; the aggregator
//! keeps its scores in arrays indexed by node id and child position.
//!
//! ## Definition format
//!
//! ```json
//! {
//!   "absorbing": ["UNCARRIED", "CHARGING"],
//!   "children": [
//!     { "label": "CLASSIFIED", "children": [{ "label": "WALKING" }, { "label": "UNCARRIED" }] },
//!     { "label": "UNKNOWN" }
//!   ]
//! }
//! ```
//!
//! Child order is significant: it decides ties. Labels in `absorbing` are
//! matched case-insensitively at every level; without the field the labels
//! `uncarried` and `charging` are absorbing.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{MLError, MLResult, UNKNOWN};

/// Top-level label under which classifier labels live
pub const CLASSIFIED: &str = "CLASSIFIED";

/// Path of the charging override
pub const CHARGING_PATH: &str = "CLASSIFIED/CHARGING";

/// Labels absorbing when a definition does not list its own
pub const DEFAULT_ABSORBING: [&str; 2] = ["uncarried", "charging"];

/// Path separator
pub const SEPARATOR: char = '/';

/// Index of an internal node
pub type NodeId = usize;

/// One label of a node's definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelDefinition {
    /// Path segment, without `/`
    pub label: String,
    /// Sub-labels; empty for a leaf
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<LabelDefinition>,
}

impl LabelDefinition {
    /// Leaf label
    pub fn leaf(label: &str) -> Self {
        Self {
            label: label.to_string(),
            children: Vec::new(),
        }
    }

    /// Label with sub-labels
    pub fn branch(label: &str, children: Vec<LabelDefinition>) -> Self {
        Self {
            label: label.to_string(),
            children,
        }
    }
}

/// Serialized form of a taxonomy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxonomyDefinition {
    /// Absorbing labels; `None` selects [`DEFAULT_ABSORBING`]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub absorbing: Option<Vec<String>>,
    /// Children of the root
    pub children: Vec<LabelDefinition>,
}

impl Default for TaxonomyDefinition {
    fn default() -> Self {
        let classified = [
            "STATIONARY",
            "WALKING",
            "RUNNING",
            "CYCLING",
            "VEHICLE",
            "UNCARRIED",
            "CHARGING",
        ]
        .into_iter()
        .map(LabelDefinition::leaf)
        .collect();

        Self {
            absorbing: None,
            children: vec![
                LabelDefinition::branch(CLASSIFIED, classified),
                LabelDefinition::leaf(UNKNOWN),
            ],
        }
    }
}

/// A child label of a node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Child {
    /// Path segment
    pub label: String,
    /// Node of the child's own children, `None` for a leaf
    pub node: Option<NodeId>,
    /// Score forced to 0 or 1 instead of decayed
    pub absorbing: bool,
}

/// Internal node of the tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaxonomyNode {
    /// Full path of the node, `""` for the root
    pub path: String,
    /// Children in definition order
    pub children: Vec<Child>,
}

/// Immutable label tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Taxonomy {
    nodes: Vec<TaxonomyNode>,
}

impl Default for Taxonomy {
    fn default() -> Self {
        // The built-in definition is well formed
        Self::from_definition(&TaxonomyDefinition::default()).unwrap_or_else(|_| Self {
            nodes: Vec::new(),
        })
    }
}

impl Taxonomy {
    /// Id of the root node
    pub const ROOT: NodeId = 0;

    /// Build and validate a tree
    ///
    /// The root must have an `UNKNOWN` child; labels must be non-empty, free
    /// of `/` and unique among their siblings.
    pub fn from_definition(definition: &TaxonomyDefinition) -> MLResult<Self> {
        let absorbing: Vec<String> = match &definition.absorbing {
            Some(labels) => labels.iter().map(|l| l.to_lowercase()).collect(),
            None => DEFAULT_ABSORBING.iter().map(|l| l.to_string()).collect(),
        };

        if !definition.children.iter().any(|c| c.label == UNKNOWN) {
            return Err(MLError::InvalidTaxonomy {
                reason: format!("root needs an {UNKNOWN} label"),
            });
        }

        let mut taxonomy = Self { nodes: Vec::new() };
        taxonomy.add_node(String::new(), &definition.children, &absorbing)?;
        log::debug!("Taxonomy built with {} nodes", taxonomy.nodes.len());
        Ok(taxonomy)
    }

    /// Decode and build from JSON text
    pub fn from_json_str(json: &str) -> MLResult<Self> {
        let definition: TaxonomyDefinition = serde_json::from_str(json)?;
        Self::from_definition(&definition)
    }

    /// Read and build from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> MLResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    fn add_node(
        &mut self,
        path: String,
        children: &[LabelDefinition],
        absorbing: &[String],
    ) -> MLResult<NodeId> {
        let id = self.nodes.len();
        self.nodes.push(TaxonomyNode {
            path: path.clone(),
            children: Vec::with_capacity(children.len()),
        });

        for (position, child) in children.iter().enumerate() {
            let label = child.label.as_str();
            if label.is_empty() || label.contains(SEPARATOR) {
                return Err(MLError::InvalidTaxonomy {
                    reason: format!("bad label '{label}' under '{path}'"),
                });
            }
            if children[..position].iter().any(|c| c.label == label) {
                return Err(MLError::InvalidTaxonomy {
                    reason: format!("duplicate label '{label}' under '{path}'"),
                });
            }

            let node = if child.children.is_empty() {
                None
            } else {
                Some(self.add_node(join(&path, label), &child.children, absorbing)?)
            };
            self.nodes[id].children.push(Child {
                label: label.to_string(),
                node,
                absorbing: absorbing.iter().any(|a| a.eq_ignore_ascii_case(label)),
            });
        }
        Ok(id)
    }

    /// Node by id
    pub fn node(&self, id: NodeId) -> Option<&TaxonomyNode> {
        self.nodes.get(id)
    }

    /// All nodes, root first
    pub fn nodes(&self) -> &[TaxonomyNode] {
        &self.nodes
    }

    /// Position of `label` among the children of `node`
    pub fn child_index(&self, node: NodeId, label: &str) -> Option<usize> {
        self.node(node)?
            .children
            .iter()
            .position(|c| c.label == label)
    }

    /// Node whose path is exactly `path`
    pub fn find_node(&self, path: &str) -> Option<NodeId> {
        self.nodes.iter().position(|n| n.path == path)
    }

    /// `(node, child index)` for every segment of `path`
    pub fn resolve(&self, path: &str) -> MLResult<Vec<(NodeId, usize)>> {
        let unknown = || MLError::UnknownTaxonomyPath {
            path: path.to_string(),
        };

        let mut steps = Vec::new();
        let mut node = Some(Self::ROOT);
        for segment in path.split(SEPARATOR) {
            let current = node.ok_or_else(unknown)?;
            let index = self.child_index(current, segment).ok_or_else(unknown)?;
            steps.push((current, index));
            node = self.nodes[current].children[index].node;
        }
        Ok(steps)
    }

    /// Whether `path` names a label in the tree
    pub fn contains(&self, path: &str) -> bool {
        self.resolve(path).is_ok()
    }

    /// Full path for a raw classifier label
    ///
    /// Labels that are already paths are kept; others are placed under
    /// `CLASSIFIED`.
    pub fn qualify(&self, label: &str) -> String {
        if self.contains(label) {
            label.to_string()
        } else {
            join(CLASSIFIED, label)
        }
    }
}

fn join(parent: &str, label: &str) -> String {
    if parent.is_empty() {
        label.to_string()
    } else {
        format!("{parent}{SEPARATOR}{label}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_tree_shape() {
        let taxonomy = Taxonomy::default();
        assert_eq!(taxonomy.nodes().len(), 2);
        assert_eq!(taxonomy.find_node("CLASSIFIED"), Some(1));
        assert!(taxonomy.contains("CLASSIFIED/WALKING"));
        assert!(taxonomy.contains(UNKNOWN));
        assert!(!taxonomy.contains("CLASSIFIED/WALKING/STAIRS"));
        assert!(!taxonomy.contains(""));

        let classified = taxonomy.node(1).unwrap();
        let absorbing: Vec<&str> = classified
            .children
            .iter()
            .filter(|c| c.absorbing)
            .map(|c| c.label.as_str())
            .collect();
        assert_eq!(absorbing, vec!["UNCARRIED", "CHARGING"]);
    }

    #[test]
    fn resolve_walks_segments() {
        let taxonomy = Taxonomy::default();
        let walking = taxonomy.child_index(1, "WALKING").unwrap();
        assert_eq!(
            taxonomy.resolve("CLASSIFIED/WALKING").unwrap(),
            vec![(0, 0), (1, walking)]
        );
        assert_eq!(
            taxonomy.resolve("CLASSIFIED/FLYING"),
            Err(MLError::UnknownTaxonomyPath {
                path: "CLASSIFIED/FLYING".into()
            })
        );
    }

    #[test]
    fn qualify_prefixes_bare_labels() {
        let taxonomy = Taxonomy::default();
        assert_eq!(taxonomy.qualify("WALKING"), "CLASSIFIED/WALKING");
        assert_eq!(taxonomy.qualify(UNKNOWN), UNKNOWN);
        assert_eq!(taxonomy.qualify("CLASSIFIED/CYCLING"), "CLASSIFIED/CYCLING");
    }

    #[test]
    fn declared_absorbing_labels() {
        let json = r#"{
            "absorbing": ["parked"],
            "children": [
                { "label": "CLASSIFIED", "children": [
                    { "label": "VEHICLE", "children": [{ "label": "CAR" }, { "label": "PARKED" }] },
                    { "label": "UNCARRIED" }
                ]},
                { "label": "UNKNOWN" }
            ]
        }"#;
        let taxonomy = Taxonomy::from_json_str(json).unwrap();
        let vehicle = taxonomy.find_node("CLASSIFIED/VEHICLE").unwrap();
        let node = taxonomy.node(vehicle).unwrap();
        assert!(node.children[1].absorbing);
        assert!(!taxonomy.node(1).unwrap().children[1].absorbing);
    }

    #[test]
    fn malformed_definitions_rejected() {
        let no_unknown = r#"{ "children": [{ "label": "CLASSIFIED" }] }"#;
        assert!(matches!(
            Taxonomy::from_json_str(no_unknown),
            Err(MLError::InvalidTaxonomy { .. })
        ));

        let duplicate = r#"{ "children": [{ "label": "UNKNOWN" }, { "label": "UNKNOWN" }] }"#;
        assert!(matches!(
            Taxonomy::from_json_str(duplicate),
            Err(MLError::InvalidTaxonomy { .. })
        ));

        let slash = r#"{ "children": [{ "label": "UNKNOWN" }, { "label": "A/B" }] }"#;
        assert!(matches!(
            Taxonomy::from_json_str(slash),
            Err(MLError::InvalidTaxonomy { .. })
        ));
    }
}
