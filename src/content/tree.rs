use std::collections::{HashMap, HashSet};

use serde::Serialize;
use tracing::{debug, warn};

use super::{ContentError, ContentNode, ContentRow, NodeId};

/// Result of reconstructing one batch of rows.
#[derive(Debug, Clone, PartialEq)]
pub enum Reconstruction {
    /// The batch had no rows. Callers render a "no content" state.
    Empty,
    Tree(ContentTree),
}

/// A rooted content tree plus any subtrees that could not be attached to it.
///
/// `detached` holds orphans (parent id missing from the batch, or pointing
/// at itself), extra parentless roots, and nodes cut off by parent cycles,
/// each carrying its own subtree.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContentTree {
    pub root: ContentNode,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub detached: Vec<ContentNode>,
}

impl ContentTree {
    pub fn node_count(&self) -> usize {
        std::iter::once(&self.root)
            .chain(&self.detached)
            .map(|node| flatten_depth_first(node).len())
            .sum()
    }

    /// Deepest nesting level below any top-level node; a lone root is 0.
    pub fn max_depth(&self) -> usize {
        let mut deepest = 0;
        let mut stack: Vec<(&ContentNode, usize)> = std::iter::once(&self.root)
            .chain(&self.detached)
            .map(|node| (node, 0))
            .collect();

        while let Some((node, depth)) = stack.pop() {
            deepest = deepest.max(depth);
            stack.extend(node.children.iter().map(|child| (child, depth + 1)));
        }

        deepest
    }
}

pub fn validate_rows(rows: Vec<ContentRow>) -> Result<Vec<ContentNode>, ContentError> {
    let mut seen = HashSet::with_capacity(rows.len());
    let mut nodes = Vec::with_capacity(rows.len());

    for (index, row) in rows.into_iter().enumerate() {
        let node = ContentNode::from_row(index, row)?;
        if !seen.insert(node.id.clone()) {
            return Err(ContentError::DuplicateId {
                id: node.id.clone(),
            });
        }
        nodes.push(node);
    }

    Ok(nodes)
}

pub fn reconstruct(rows: Vec<ContentRow>) -> Result<Reconstruction, ContentError> {
    build_tree(validate_rows(rows)?)
}

/// Links validated nodes into a tree. Input order is not assumed to be
/// sorted; siblings are ordered by `order_number`, ties kept in input order.
pub fn build_tree(nodes: Vec<ContentNode>) -> Result<Reconstruction, ContentError> {
    if nodes.is_empty() {
        return Ok(Reconstruction::Empty);
    }

    let mut index_by_id: HashMap<NodeId, usize> = HashMap::with_capacity(nodes.len());
    for (index, node) in nodes.iter().enumerate() {
        if index_by_id.insert(node.id.clone(), index).is_some() {
            return Err(ContentError::DuplicateId {
                id: node.id.clone(),
            });
        }
    }

    let mut child_lists: Vec<Vec<usize>> = vec![Vec::new(); nodes.len()];
    let mut roots = Vec::new();
    let mut detached_starts = Vec::new();

    for (index, node) in nodes.iter().enumerate() {
        let Some(parent_id) = &node.parent_id else {
            roots.push(index);
            continue;
        };

        match index_by_id.get(parent_id) {
            Some(&parent) if parent != index => child_lists[parent].push(index),
            _ => {
                warn!(
                    id = %node.id,
                    parent_id = %parent_id,
                    "content node parent not found in batch; detaching subtree"
                );
                detached_starts.push(index);
            }
        }
    }

    let order_numbers: Vec<f64> = nodes.iter().map(|node| node.order_number).collect();
    let by_order = |left: &usize, right: &usize| {
        order_numbers[*left].total_cmp(&order_numbers[*right])
    };

    for children in &mut child_lists {
        children.sort_by(by_order);
    }
    roots.sort_by(by_order);

    let mut roots = roots.into_iter();
    let primary = roots.next();
    for extra in roots {
        warn!(id = %nodes[extra].id, "batch has more than one root; detaching extra root");
        detached_starts.push(extra);
    }
    detached_starts.sort();
    detached_starts.sort_by(by_order);

    let mut slots: Vec<Option<ContentNode>> = nodes.into_iter().map(Some).collect();

    let root = primary.and_then(|index| assemble(index, &mut slots, &child_lists));
    let mut detached: Vec<ContentNode> = detached_starts
        .into_iter()
        .filter_map(|index| assemble(index, &mut slots, &child_lists))
        .collect();

    // Whatever is still unclaimed sits on a parent cycle.
    for index in 0..slots.len() {
        if let Some(node) = &slots[index] {
            warn!(id = %node.id, "content node is part of a parent cycle; detaching");
        }
        if let Some(subtree) = assemble(index, &mut slots, &child_lists) {
            detached.push(subtree);
        }
    }

    let (root, detached) = match root {
        Some(root) => (root, detached),
        None => {
            let mut remaining = detached.into_iter();
            let Some(first) = remaining.next() else {
                return Ok(Reconstruction::Empty);
            };
            debug!(id = %first.id, "no parentless root in batch; promoting first detached subtree");
            (first, remaining.collect())
        }
    };

    Ok(Reconstruction::Tree(ContentTree { root, detached }))
}

struct AssemblyFrame {
    index: usize,
    node: ContentNode,
    next_child: usize,
}

/// Moves the subtree rooted at `start` out of `slots`. Uses an explicit
/// stack so parent chains of any length assemble without deep recursion.
fn assemble(
    start: usize,
    slots: &mut [Option<ContentNode>],
    child_lists: &[Vec<usize>],
) -> Option<ContentNode> {
    let mut root = AssemblyFrame {
        index: start,
        node: take_slot(slots, start)?,
        next_child: 0,
    };
    let mut stack: Vec<AssemblyFrame> = Vec::new();

    loop {
        let frame = match stack.last_mut() {
            Some(frame) => frame,
            None => &mut root,
        };
        let index = frame.index;
        let position = frame.next_child;
        frame.next_child += 1;

        match child_lists[index].get(position) {
            Some(&child) => {
                if let Some(node) = take_slot(slots, child) {
                    stack.push(AssemblyFrame {
                        index: child,
                        node,
                        next_child: 0,
                    });
                }
            }
            None => {
                let Some(done) = stack.pop() else {
                    break;
                };
                match stack.last_mut() {
                    Some(parent) => parent.node.children.push(done.node),
                    None => root.node.children.push(done.node),
                }
            }
        }
    }

    Some(root.node)
}

fn take_slot(slots: &mut [Option<ContentNode>], index: usize) -> Option<ContentNode> {
    let mut node = slots[index].take()?;
    node.children.clear();
    Some(node)
}

/// Pre-order walk of `root` and everything beneath it.
pub fn flatten_depth_first(root: &ContentNode) -> Vec<&ContentNode> {
    let mut ordered = Vec::new();
    let mut stack = vec![root];

    while let Some(node) = stack.pop() {
        ordered.push(node);
        stack.extend(node.children.iter().rev());
    }

    ordered
}
