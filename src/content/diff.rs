use serde::Serialize;
use similar::{ChangeTag, TextDiff};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SpanTag {
    Unchanged,
    Added,
    Removed,
}

/// A run of text sharing one diff tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Span {
    pub tag: SpanTag,
    pub text: String,
}

impl Span {
    pub fn new(tag: SpanTag, text: impl Into<String>) -> Self {
        Self {
            tag,
            text: text.into(),
        }
    }
}

/// Word-level diff of `old` against `new`.
///
/// Words and the whitespace between them are diffed as separate tokens, then
/// neighbouring tokens with the same tag are merged into one span. Identical
/// inputs always produce exactly one unchanged span, even when empty.
pub fn word_diff(old: &str, new: &str) -> Vec<Span> {
    if old == new {
        return vec![Span::new(SpanTag::Unchanged, old)];
    }

    let diff = TextDiff::from_words(old, new);
    let mut spans: Vec<Span> = Vec::new();

    for change in diff.iter_all_changes() {
        let tag = match change.tag() {
            ChangeTag::Equal => SpanTag::Unchanged,
            ChangeTag::Delete => SpanTag::Removed,
            ChangeTag::Insert => SpanTag::Added,
        };

        match spans.last_mut() {
            Some(last) if last.tag == tag => last.text.push_str(change.value()),
            _ => spans.push(Span::new(tag, change.value())),
        }
    }

    spans
}
