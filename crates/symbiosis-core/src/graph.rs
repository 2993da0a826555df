//! Three-level knowledge graph attached to standard-pipeline replies.
//!
//! The model is asked to build the graph in the same call as the reply, but
//! nothing it returns is trusted: [`KnowledgeGraph::sanitize`] enforces the
//! shape limits, the single-uppercase-token rule, and verbatim presence in
//! the supplied context before anything reaches the presentation layer.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;

use crate::types::Mood;

pub const MAX_ROOTS: usize = 3;
pub const MAX_BRANCHES: usize = 5;
pub const MAX_LEAVES: usize = 5;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeGraph {
    pub roots: Vec<GraphRoot>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphRoot {
    pub label: String,
    pub mood: Mood,
    #[serde(default)]
    pub branches: Vec<GraphBranch>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphBranch {
    pub label: String,
    pub mood: Mood,
    #[serde(default)]
    pub leaves: Vec<GraphLeaf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphLeaf {
    pub text: String,
    pub mood: Mood,
}

/// Uppercased alphabetic words of a context blob.
#[derive(Debug, Clone, Default)]
pub struct Vocabulary {
    words: HashSet<String>,
}

impl Vocabulary {
    pub fn from_context(context: &str) -> Self {
        let words = context
            .split(|c: char| !c.is_alphabetic())
            .filter(|w| !w.is_empty())
            .map(|w| w.to_uppercase())
            .collect();
        Self { words }
    }

    pub fn contains(&self, word: &str) -> bool {
        self.words.contains(&word.to_uppercase())
    }

    /// Normalise a candidate label: one alphabetic token, uppercased, present
    /// verbatim in the context. Anything else is rejected.
    pub fn accept(&self, raw: &str) -> Option<String> {
        let token = raw.trim();
        if token.is_empty() || !token.chars().all(char::is_alphabetic) {
            return None;
        }
        let upper = token.to_uppercase();
        self.words.contains(&upper).then_some(upper)
    }
}

impl KnowledgeGraph {
    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// Leniently read the `roots` array of a model response.
    /// Missing or malformed nodes are skipped, never fatal.
    pub fn from_response(value: &Value) -> Self {
        let roots = value
            .get("roots")
            .and_then(Value::as_array)
            .map(|roots| roots.iter().filter_map(parse_root).collect())
            .unwrap_or_default();
        Self { roots }
    }

    /// Enforce every graph invariant against the context the model was shown.
    pub fn sanitize(self, context: &str) -> Self {
        let vocab = Vocabulary::from_context(context);
        let roots = self
            .roots
            .into_iter()
            .filter_map(|root| {
                let label = vocab.accept(&root.label)?;
                let branches = root
                    .branches
                    .into_iter()
                    .filter_map(|branch| {
                        let label = vocab.accept(&branch.label)?;
                        let leaves = branch
                            .leaves
                            .into_iter()
                            .filter_map(|leaf| {
                                Some(GraphLeaf {
                                    text: vocab.accept(&leaf.text)?,
                                    mood: leaf.mood,
                                })
                            })
                            .take(MAX_LEAVES)
                            .collect();
                        Some(GraphBranch {
                            label,
                            mood: branch.mood,
                            leaves,
                        })
                    })
                    .take(MAX_BRANCHES)
                    .collect();
                Some(GraphRoot {
                    label,
                    mood: root.mood,
                    branches,
                })
            })
            .take(MAX_ROOTS)
            .collect();
        Self { roots }
    }
}

fn node_text<'a>(node: &'a Value, key: &str) -> Option<&'a str> {
    node.get(key).and_then(Value::as_str)
}

fn parse_root(node: &Value) -> Option<GraphRoot> {
    Some(GraphRoot {
        label: node_text(node, "label")?.to_string(),
        mood: Mood::from_value(node.get("mood")),
        branches: node
            .get("branches")
            .and_then(Value::as_array)
            .map(|b| b.iter().filter_map(parse_branch).collect())
            .unwrap_or_default(),
    })
}

fn parse_branch(node: &Value) -> Option<GraphBranch> {
    Some(GraphBranch {
        label: node_text(node, "label")?.to_string(),
        mood: Mood::from_value(node.get("mood")),
        leaves: node
            .get("leaves")
            .and_then(Value::as_array)
            .map(|l| l.iter().filter_map(parse_leaf).collect())
            .unwrap_or_default(),
    })
}

fn parse_leaf(node: &Value) -> Option<GraphLeaf> {
    Some(GraphLeaf {
        text: node_text(node, "text")?.to_string(),
        mood: Mood::from_value(node.get("mood")),
    })
}
