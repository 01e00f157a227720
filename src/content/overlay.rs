use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::diff::word_diff;
use super::tree::ContentTree;
use super::{ContentNode, NodeId};

/// Amount subtracted from a patched node's `order_number` so changed content
/// sorts ahead of unchanged siblings sharing the same base order.
pub const ORDER_NUDGE: f64 = 0.01;

/// Replacement values for one node. `Some` marks the field as replaced; an
/// empty string replaces the field with nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldPatch {
    pub heading_text: Option<String>,
    pub body_text: Option<String>,
}

impl FieldPatch {
    pub fn is_empty(&self) -> bool {
        self.heading_text.is_none() && self.body_text.is_none()
    }
}

/// On-disk form of one overlay entry. JSON object keys are always strings,
/// so overlays travel as a list to keep integer ids intact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverlayEntry {
    pub id: NodeId,
    #[serde(default, alias = "headingText", skip_serializing_if = "Option::is_none")]
    pub heading_text: Option<String>,
    #[serde(default, alias = "bodyText", skip_serializing_if = "Option::is_none")]
    pub body_text: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DiffOverlay {
    patches: BTreeMap<NodeId, FieldPatch>,
}

impl DiffOverlay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: NodeId, patch: FieldPatch) {
        self.patches.insert(id, patch);
    }

    pub fn get(&self, id: &NodeId) -> Option<&FieldPatch> {
        self.patches.get(id)
    }

    pub fn len(&self) -> usize {
        self.patches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patches.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&NodeId, &FieldPatch)> {
        self.patches.iter()
    }
}

impl FromIterator<(NodeId, FieldPatch)> for DiffOverlay {
    fn from_iter<I: IntoIterator<Item = (NodeId, FieldPatch)>>(iter: I) -> Self {
        Self {
            patches: iter.into_iter().collect(),
        }
    }
}

impl FromIterator<OverlayEntry> for DiffOverlay {
    fn from_iter<I: IntoIterator<Item = OverlayEntry>>(iter: I) -> Self {
        iter.into_iter()
            .map(|entry| {
                (
                    entry.id,
                    FieldPatch {
                        heading_text: entry.heading_text,
                        body_text: entry.body_text,
                    },
                )
            })
            .collect()
    }
}

struct OverlayFrame<'a> {
    source: &'a ContentNode,
    derived: ContentNode,
    next_child: usize,
}

impl<'a> OverlayFrame<'a> {
    fn new(source: &'a ContentNode, overlay: &DiffOverlay) -> Self {
        Self {
            source,
            derived: patched_copy(source, overlay),
            next_child: 0,
        }
    }

    fn finish(mut self) -> ContentNode {
        self.derived
            .children
            .sort_by(|left, right| left.order_number.total_cmp(&right.order_number));
        self.derived
    }
}

/// Derives a copy of `node` (and its subtree) with the overlay applied.
///
/// Each replaced field takes the patch value and gains spans diffing the old
/// value against it. Patched nodes are nudged forward by [`ORDER_NUDGE`] and
/// every child list is re-sorted, stably, by the resulting order numbers.
/// The walk keeps its own stack, so depth is bounded only by memory.
pub fn apply_overlay(node: &ContentNode, overlay: &DiffOverlay) -> ContentNode {
    let mut root = OverlayFrame::new(node, overlay);
    let mut stack: Vec<OverlayFrame<'_>> = Vec::new();

    loop {
        let frame = match stack.last_mut() {
            Some(frame) => frame,
            None => &mut root,
        };
        let source = frame.source;
        let position = frame.next_child;
        frame.next_child += 1;

        match source.children.get(position) {
            Some(child) => stack.push(OverlayFrame::new(child, overlay)),
            None => {
                let Some(done) = stack.pop() else {
                    break;
                };
                let done = done.finish();
                match stack.last_mut() {
                    Some(parent) => parent.derived.children.push(done),
                    None => root.derived.children.push(done),
                }
            }
        }
    }

    root.finish()
}

fn patched_copy(node: &ContentNode, overlay: &DiffOverlay) -> ContentNode {
    let mut derived = node.without_children();

    if let Some(patch) = overlay.get(&node.id).filter(|patch| !patch.is_empty()) {
        if let Some(replacement) = &patch.heading_text {
            derived.heading_spans = Some(word_diff(
                node.heading_text.as_deref().unwrap_or(""),
                replacement,
            ));
            derived.heading_text = non_empty(replacement);
        }
        if let Some(replacement) = &patch.body_text {
            derived.body_spans = Some(word_diff(
                node.body_text.as_deref().unwrap_or(""),
                replacement,
            ));
            derived.body_text = non_empty(replacement);
        }
        derived.order_number -= ORDER_NUDGE;
    }

    derived
}

impl ContentTree {
    pub fn with_overlay(&self, overlay: &DiffOverlay) -> ContentTree {
        ContentTree {
            root: apply_overlay(&self.root, overlay),
            detached: self
                .detached
                .iter()
                .map(|node| apply_overlay(node, overlay))
                .collect(),
        }
    }
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

/// An overlay computed from two versions of the same flat list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OverlayDiff {
    pub overlay: DiffOverlay,
    /// Ids present only in the revised list; a patch cannot add a node.
    pub unmatched: Vec<NodeId>,
}

/// Compares two flat lists by id and records the heading and body changes.
///
/// A base node missing from `revised` has its non-empty fields patched to the
/// empty string.
pub fn overlay_between(base: &[ContentNode], revised: &[ContentNode]) -> OverlayDiff {
    let revised_by_id: HashMap<&NodeId, &ContentNode> =
        revised.iter().map(|node| (&node.id, node)).collect();
    let base_ids: HashSet<&NodeId> = base.iter().map(|node| &node.id).collect();

    let mut overlay = DiffOverlay::new();
    for node in base {
        let patch = match revised_by_id.get(&node.id) {
            Some(next) => FieldPatch {
                heading_text: changed_field(&node.heading_text, &next.heading_text),
                body_text: changed_field(&node.body_text, &next.body_text),
            },
            None => FieldPatch {
                heading_text: cleared_field(&node.heading_text),
                body_text: cleared_field(&node.body_text),
            },
        };

        if !patch.is_empty() {
            overlay.insert(node.id.clone(), patch);
        }
    }

    let unmatched: Vec<NodeId> = revised
        .iter()
        .filter(|node| !base_ids.contains(&node.id))
        .map(|node| node.id.clone())
        .collect();
    if !unmatched.is_empty() {
        warn!(
            count = unmatched.len(),
            "revised rows without a base counterpart cannot be expressed as patches"
        );
    }

    OverlayDiff { overlay, unmatched }
}

fn changed_field(old: &Option<String>, new: &Option<String>) -> Option<String> {
    let old = old.as_deref().unwrap_or("");
    let new = new.as_deref().unwrap_or("");
    (old != new).then(|| new.to_string())
}

fn cleared_field(old: &Option<String>) -> Option<String> {
    old.as_deref()
        .filter(|value| !value.is_empty())
        .map(|_| String::new())
}
