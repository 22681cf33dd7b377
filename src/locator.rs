//! Durable element identification.
//!
//! None of the selector strategies is complete on a live page, so each
//! candidate carries a score and the best available form wins: stable data
//! attributes (100), element id (80), minimal unique class selector (60),
//! absolute path (20). Resolution accepts exactly the forms generation
//! emits, so playback can tolerate a miss gracefully instead of guessing.

use crate::dom::{Document, NodeId};

/// Data attributes considered stable enough to identify an element by.
pub const STABLE_DATA_ATTRIBUTES: [&str; 5] =
    ["data-testid", "data-test", "data-id", "data-cy", "data-qa"];

/// Longest element text kept as auxiliary metadata.
const MAX_ELEMENT_TEXT: usize = 100;

/// A selector candidate with its strategy score.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScoredSelector {
    pub selector: String,
    pub score: u8,
}

/// Produces the best-effort durable selector for `node`.
pub fn generate_selector(doc: &Document, node: NodeId) -> ScoredSelector {
    if let Some(selector) = data_attribute_selector(doc, node) {
        return ScoredSelector {
            selector,
            score: 100,
        };
    }
    if let Some(selector) = id_selector(doc, node) {
        return ScoredSelector {
            selector,
            score: 80,
        };
    }
    if let Some(selector) = class_selector(doc, node) {
        return ScoredSelector {
            selector,
            score: 60,
        };
    }
    ScoredSelector {
        selector: absolute_path(doc, node),
        score: 20,
    }
}

/// Resolves a selector back to a live element, if one still matches.
/// A leading `/` marks an absolute path; everything else is matched as a
/// CSS-style selector.
pub fn resolve_selector(doc: &Document, selector: &str) -> Option<NodeId> {
    if let Some(path) = selector.strip_prefix('/') {
        resolve_path(doc, path)
    } else {
        css_matches(doc, selector).into_iter().next()
    }
}

/// Trimmed element text, capped, for explanations and debugging.
pub fn element_text(doc: &Document, node: NodeId) -> Option<String> {
    let text = doc.text_content(node);
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(truncate_chars(trimmed, MAX_ELEMENT_TEXT))
}

/// Lowercase tag name of `node`.
pub fn tag_name(doc: &Document, node: NodeId) -> String {
    doc.tag(node).to_owned()
}

/// Truncates to `max` characters, appending an ellipsis when cut.
pub fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_owned();
    }
    let mut out: String = text.chars().take(max.saturating_sub(1)).collect();
    out.push('…');
    out
}

fn data_attribute_selector(doc: &Document, node: NodeId) -> Option<String> {
    for attr in STABLE_DATA_ATTRIBUTES {
        if let Some(value) = doc.attribute(node, attr) {
            if !value.is_empty() && !value.contains('"') {
                return Some(format!("[{attr}=\"{value}\"]"));
            }
        }
    }
    None
}

fn id_selector(doc: &Document, node: NodeId) -> Option<String> {
    let id = doc.element_id(node)?;
    if is_valid_css_identifier(id) {
        Some(format!("#{id}"))
    } else {
        None
    }
}

/// Minimal unique class-based selector: one class if it uniquely matches,
/// else up to three combined, else tag + classes + `:nth-of-type(n)`.
fn class_selector(doc: &Document, node: NodeId) -> Option<String> {
    let classes: Vec<&String> = doc
        .classes(node)
        .iter()
        .filter(|class| is_valid_css_identifier(class))
        .collect();
    if classes.is_empty() {
        return None;
    }

    for class in &classes {
        let candidate = format!(".{class}");
        if css_matches(doc, &candidate).len() == 1 {
            return Some(candidate);
        }
    }

    let combined: String = classes
        .iter()
        .take(3)
        .map(|class| format!(".{class}"))
        .collect();
    if css_matches(doc, &combined).len() == 1 {
        return Some(combined);
    }

    let position = doc.same_tag_index(node);
    Some(format!(
        "{}{}:nth-of-type({})",
        doc.tag(node),
        combined,
        position
    ))
}

/// Absolute path from the root, recording each ancestor's 1-based index
/// among same-tag siblings. Always resolvable, brittle to tree changes.
fn absolute_path(doc: &Document, node: NodeId) -> String {
    let mut segments = Vec::new();
    let mut current = Some(node);
    while let Some(step) = current {
        segments.push(format!("{}[{}]", doc.tag(step), doc.same_tag_index(step)));
        current = doc.parent_of(step);
    }
    segments.reverse();
    format!("/{}", segments.join("/"))
}

fn resolve_path(doc: &Document, path: &str) -> Option<NodeId> {
    let mut current = doc.root();
    let mut segments = path.split('/');

    // The first segment addresses the root element itself.
    let root_segment = segments.next()?;
    let (tag, index) = parse_path_segment(root_segment)?;
    if doc.tag(current) != tag || index != 1 {
        return None;
    }

    for segment in segments {
        let (tag, index) = parse_path_segment(segment)?;
        let mut seen = 0;
        let mut next = None;
        for child in doc.children_of(current) {
            if doc.contains(*child) && doc.tag(*child) == tag {
                seen += 1;
                if seen == index {
                    next = Some(*child);
                    break;
                }
            }
        }
        current = next?;
    }
    Some(current)
}

fn parse_path_segment(segment: &str) -> Option<(&str, usize)> {
    match segment.split_once('[') {
        Some((tag, rest)) => {
            let index = rest.strip_suffix(']')?.parse().ok()?;
            Some((tag, index))
        }
        None if !segment.is_empty() => Some((segment, 1)),
        None => None,
    }
}

/// Parsed form of the CSS subset the generator emits.
#[derive(Debug, Default, PartialEq)]
struct Compound {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
    attribute: Option<(String, String)>,
    nth_of_type: Option<usize>,
}

fn css_matches(doc: &Document, selector: &str) -> Vec<NodeId> {
    let Some(compound) = parse_compound(selector) else {
        return Vec::new();
    };
    doc.all_elements()
        .into_iter()
        .filter(|node| matches_compound(doc, *node, &compound))
        .collect()
}

fn matches_compound(doc: &Document, node: NodeId, compound: &Compound) -> bool {
    if let Some(tag) = &compound.tag {
        if doc.tag(node) != tag {
            return false;
        }
    }
    if let Some(id) = &compound.id {
        if doc.element_id(node) != Some(id.as_str()) {
            return false;
        }
    }
    for class in &compound.classes {
        if !doc.classes(node).iter().any(|have| have == class) {
            return false;
        }
    }
    if let Some((name, value)) = &compound.attribute {
        if doc.attribute(node, name) != Some(value.as_str()) {
            return false;
        }
    }
    if let Some(position) = compound.nth_of_type {
        if doc.same_tag_index(node) != position {
            return false;
        }
    }
    true
}

fn parse_compound(selector: &str) -> Option<Compound> {
    let mut compound = Compound::default();
    let mut rest = selector.trim();
    if rest.is_empty() {
        return None;
    }

    if let Some(stripped) = rest.strip_suffix(')') {
        if let Some((head, args)) = stripped.rsplit_once(":nth-of-type(") {
            compound.nth_of_type = Some(args.trim().parse().ok()?);
            rest = head;
        }
    }

    if rest.starts_with('[') {
        let inner = rest.strip_prefix('[')?.strip_suffix(']')?;
        let (name, value) = inner.split_once('=')?;
        let value = value.strip_prefix('"')?.strip_suffix('"')?;
        compound.attribute = Some((name.to_owned(), value.to_owned()));
        return Some(compound);
    }

    let mut chars = rest.char_indices().peekable();
    let mut tag_end = rest.len();
    while let Some((offset, ch)) = chars.peek().copied() {
        if ch == '.' || ch == '#' {
            tag_end = offset;
            break;
        }
        chars.next();
    }
    if tag_end > 0 {
        compound.tag = Some(rest[..tag_end].to_ascii_lowercase());
    }

    let mut remainder = &rest[tag_end..];
    while !remainder.is_empty() {
        let marker = remainder.chars().next()?;
        let body = &remainder[marker.len_utf8()..];
        let end = body
            .find(['.', '#'])
            .unwrap_or(body.len());
        let name = &body[..end];
        if name.is_empty() {
            return None;
        }
        match marker {
            '.' => compound.classes.push(name.to_owned()),
            '#' => compound.id = Some(name.to_owned()),
            _ => return None,
        }
        remainder = &body[end..];
    }

    if compound.tag.is_none()
        && compound.id.is_none()
        && compound.classes.is_empty()
        && compound.attribute.is_none()
    {
        return None;
    }
    Some(compound)
}

/// Conservative check that a name is safe to embed in a selector.
fn is_valid_css_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {}
        _ => return false,
    }
    chars.all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_')
}
