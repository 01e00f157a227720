use super::diff::{Span, SpanTag};
use super::tree::{ContentTree, Reconstruction};
use super::ContentNode;

/// Wrapper types whose children render at the wrapper's own depth.
const CONTAINER_TYPES: &[&str] = &["legis-body", "body", "content"];
const QUOTED_BLOCK: &str = "quoted-block";
const SECTION: &str = "section";

pub fn render_reconstruction(reconstruction: &Reconstruction) -> String {
    match reconstruction {
        Reconstruction::Empty => "(no content)\n".to_string(),
        Reconstruction::Tree(tree) => render_text(tree),
    }
}

pub fn render_text(tree: &ContentTree) -> String {
    let mut output = String::new();
    render_node(&tree.root, 0, false, &mut output);

    if !tree.detached.is_empty() {
        output.push_str("-- detached --\n");
        for node in &tree.detached {
            render_node(node, 0, false, &mut output);
        }
    }

    output
}

fn render_node(node: &ContentNode, depth: usize, quoted: bool, output: &mut String) {
    let mut stack = vec![(node, depth, quoted)];

    while let Some((node, depth, quoted)) = stack.pop() {
        let quoted = quoted || node.content_type == QUOTED_BLOCK;
        let line = node_line(node);

        if !line.is_empty() {
            output.push_str(&"  ".repeat(depth));
            if quoted {
                output.push_str("> ");
            }
            output.push_str(&line);
            output.push('\n');
        }

        let child_depth = if CONTAINER_TYPES.contains(&node.content_type.as_str()) {
            depth
        } else {
            depth + 1
        };
        stack.extend(
            node.children
                .iter()
                .rev()
                .map(|child| (child, child_depth, quoted)),
        );
    }
}

fn node_line(node: &ContentNode) -> String {
    let mut parts = Vec::new();

    if let Some(display) = node
        .section_display
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
    {
        parts.push(display.to_string());
    }

    let heading = field_text(node.heading_text.as_deref(), node.heading_spans.as_deref());
    if !heading.is_empty() {
        if node.content_type == SECTION {
            parts.push(heading.to_uppercase());
        } else {
            parts.push(heading);
        }
    }

    let body = field_text(node.body_text.as_deref(), node.body_spans.as_deref());
    if !body.is_empty() {
        parts.push(body);
    }

    condense_whitespace(&parts.join(" "))
}

fn field_text(plain: Option<&str>, spans: Option<&[Span]>) -> String {
    match (spans, plain) {
        (Some(spans), _) => render_spans(spans),
        (None, Some(text)) => text.to_string(),
        (None, None) => String::new(),
    }
}

fn render_spans(spans: &[Span]) -> String {
    let mut rendered = String::new();

    for span in spans.iter().filter(|span| !span.text.is_empty()) {
        match span.tag {
            SpanTag::Unchanged => rendered.push_str(&span.text),
            SpanTag::Added => {
                rendered.push_str("{+");
                rendered.push_str(&span.text);
                rendered.push_str("+}");
            }
            SpanTag::Removed => {
                rendered.push_str("[-");
                rendered.push_str(&span.text);
                rendered.push_str("-]");
            }
        }
    }

    rendered
}

fn condense_whitespace(input: &str) -> String {
    input.split_whitespace().collect::<Vec<&str>>().join(" ")
}
