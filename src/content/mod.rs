//! Flat content rows to nested section trees, with word-level diff overlays.
//!
//! Rows arrive from the store (or a JSON export) as a flat list linked by
//! `parent_id`. [`tree::reconstruct`] turns them into a rooted tree,
//! [`overlay::apply_overlay`] derives a copy carrying diff spans, and
//! [`render`] walks the result for display. Nothing here performs I/O.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

mod diff;
mod overlay;
mod render;
mod tree;


pub use diff::Span;
pub use overlay::{DiffOverlay, FieldPatch, OverlayDiff, OverlayEntry, overlay_between};
pub use render::render_reconstruction;
pub use tree::{ContentTree, Reconstruction, build_tree, reconstruct, validate_rows};

const DEFAULT_CONTENT_TYPE: &str = "section";

/// Row identifier. Legislation and U.S. Code tables use integer keys; JSON
/// exports sometimes carry string keys instead.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NodeId {
    Int(i64),
    Text(String),
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(value) => write!(f, "{value}"),
            Self::Text(value) => f.write_str(value),
        }
    }
}

/// A content row as read from storage, before validation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContentRow {
    pub id: Option<NodeId>,
    #[serde(alias = "parentId")]
    pub parent_id: Option<NodeId>,
    #[serde(default, alias = "orderNumber")]
    pub order_number: f64,
    #[serde(alias = "sectionDisplay")]
    pub section_display: Option<String>,
    #[serde(alias = "headingText")]
    pub heading_text: Option<String>,
    #[serde(alias = "bodyText")]
    pub body_text: Option<String>,
    #[serde(alias = "contentType")]
    pub content_type: Option<String>,
}

/// One unit of legislative or code text.
///
/// `children` is only populated by tree reconstruction and the span fields
/// only by overlay application; neither is ever persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContentNode {
    pub id: NodeId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<NodeId>,
    pub order_number: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section_display: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heading_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body_text: Option<String>,
    pub content_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heading_spans: Option<Vec<Span>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body_spans: Option<Vec<Span>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ContentNode>,
}

impl ContentNode {
    /// Validates a raw row; `index` is the row's position in its batch and
    /// only used for error reporting.
    pub fn from_row(index: usize, row: ContentRow) -> Result<Self, ContentError> {
        let id = row.id.ok_or(ContentError::MissingId { index })?;

        Ok(Self {
            id,
            parent_id: row.parent_id,
            order_number: row.order_number,
            section_display: row.section_display,
            heading_text: row.heading_text,
            body_text: row.body_text,
            content_type: row
                .content_type
                .filter(|value| !value.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string()),
            heading_spans: None,
            body_spans: None,
            children: Vec::new(),
        })
    }

    /// Copy of this node's own fields with no children attached.
    pub fn without_children(&self) -> Self {
        Self {
            id: self.id.clone(),
            parent_id: self.parent_id.clone(),
            order_number: self.order_number,
            section_display: self.section_display.clone(),
            heading_text: self.heading_text.clone(),
            body_text: self.body_text.clone(),
            content_type: self.content_type.clone(),
            heading_spans: self.heading_spans.clone(),
            body_spans: self.body_spans.clone(),
            children: Vec::new(),
        }
    }
}

// Dropping a deep chain through the derived glue recurses once per level;
// flatten the descendants first instead.
impl Drop for ContentNode {
    fn drop(&mut self) {
        let mut pending = std::mem::take(&mut self.children);
        while let Some(mut node) = pending.pop() {
            pending.append(&mut node.children);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContentError {
    #[error("content row at index {index} has no id")]
    MissingId { index: usize },
    #[error("content id {id} appears more than once in one batch")]
    DuplicateId { id: NodeId },
}
