use crate::dom::{Document, NodeId, Rect, OVERLAY_ATTR};

/// Padding added around the highlighted element's box.
pub const HIGHLIGHT_PADDING: f64 = 4.0;
/// Gap between the target element and the tooltip.
pub const TOOLTIP_GAP: f64 = 12.0;
/// Default tooltip box used when the host supplies no measurement.
pub const DEFAULT_TOOLTIP_SIZE: (f64, f64) = (260.0, 96.0);

/// Side of the target the tooltip ends up on.
///
/// Right is preferred; left, below and above are tried in that order based
/// on available viewport space.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TooltipPlacement {
    Right,
    Left,
    Below,
    Above,
}

/// Handles to the overlay nodes injected into the page.
#[derive(Clone, Copy, Debug, Default)]
pub struct OverlayHandles {
    pub highlight: Option<NodeId>,
    pub tooltip: Option<NodeId>,
}

impl OverlayHandles {
    pub fn is_empty(&self) -> bool {
        self.highlight.is_none() && self.tooltip.is_none()
    }
}

/// Chooses a tooltip position next to `target` inside `viewport`.
pub fn place_tooltip(target: Rect, size: (f64, f64), viewport: Rect) -> (TooltipPlacement, Rect) {
    let (width, height) = size;

    if target.right() + TOOLTIP_GAP + width <= viewport.right() {
        let rect = Rect::new(target.right() + TOOLTIP_GAP, target.y, width, height);
        return (TooltipPlacement::Right, rect);
    }
    if target.x - TOOLTIP_GAP - width >= viewport.x {
        let rect = Rect::new(target.x - TOOLTIP_GAP - width, target.y, width, height);
        return (TooltipPlacement::Left, rect);
    }
    if target.bottom() + TOOLTIP_GAP + height <= viewport.bottom() {
        let rect = Rect::new(target.x, target.bottom() + TOOLTIP_GAP, width, height);
        return (TooltipPlacement::Below, rect);
    }
    let rect = Rect::new(target.x, target.y - TOOLTIP_GAP - height, width, height);
    (TooltipPlacement::Above, rect)
}

/// Injects (or moves) the highlight and tooltip for `target`, returning the
/// node handles. Existing overlay nodes are reused so observers keep firing
/// against the same subtree.
pub fn render_overlays(
    doc: &mut Document,
    handles: OverlayHandles,
    target: Rect,
    explanation: &str,
) -> OverlayHandles {
    let highlight = match handles.highlight.filter(|node| doc.contains(*node)) {
        Some(node) => node,
        None => {
            let node = doc.create_element("div");
            let root = doc.root();
            doc.append_child(root, node);
            doc.set_attribute(node, OVERLAY_ATTR, "highlight");
            node
        }
    };
    doc.set_rect(highlight, target.inflate(HIGHLIGHT_PADDING));

    let tooltip = match handles.tooltip.filter(|node| doc.contains(*node)) {
        Some(node) => node,
        None => {
            let node = doc.create_element("div");
            let root = doc.root();
            doc.append_child(root, node);
            doc.set_attribute(node, OVERLAY_ATTR, "tooltip");
            node
        }
    };
    let (_, rect) = place_tooltip(target, DEFAULT_TOOLTIP_SIZE, doc.viewport());
    doc.set_rect(tooltip, rect);
    doc.set_text(tooltip, explanation);

    OverlayHandles {
        highlight: Some(highlight),
        tooltip: Some(tooltip),
    }
}

/// Removes every injected overlay node. Safe to call repeatedly.
pub fn remove_overlays(doc: &mut Document) {
    let overlay_nodes: Vec<NodeId> = doc
        .all_elements()
        .into_iter()
        .filter(|node| doc.attribute(*node, OVERLAY_ATTR).is_some())
        .collect();
    for node in overlay_nodes {
        doc.remove(node);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VIEWPORT: Rect = Rect {
        x: 0.0,
        y: 0.0,
        width: 1280.0,
        height: 800.0,
    };

    #[test]
    fn prefers_right_placement() {
        let target = Rect::new(100.0, 100.0, 60.0, 24.0);
        let (placement, rect) = place_tooltip(target, (260.0, 96.0), VIEWPORT);
        assert_eq!(placement, TooltipPlacement::Right);
        assert_eq!(rect.x, target.right() + TOOLTIP_GAP);
    }

    #[test]
    fn falls_back_left_then_below_then_above() {
        let near_right = Rect::new(1200.0, 100.0, 60.0, 24.0);
        let (placement, _) = place_tooltip(near_right, (260.0, 96.0), VIEWPORT);
        assert_eq!(placement, TooltipPlacement::Left);

        let near_both_sides = Rect::new(10.0, 100.0, 1260.0, 24.0);
        let (placement, _) = place_tooltip(near_both_sides, (260.0, 96.0), VIEWPORT);
        assert_eq!(placement, TooltipPlacement::Below);

        let near_everything = Rect::new(10.0, 700.0, 1260.0, 90.0);
        let (placement, _) = place_tooltip(near_everything, (260.0, 96.0), VIEWPORT);
        assert_eq!(placement, TooltipPlacement::Above);
    }

    #[test]
    fn remove_overlays_is_idempotent() {
        let mut doc = Document::new("https://example.com/");
        let handles = render_overlays(
            &mut doc,
            OverlayHandles::default(),
            Rect::new(10.0, 10.0, 50.0, 20.0),
            "Click Save",
        );
        assert!(!handles.is_empty());

        remove_overlays(&mut doc);
        remove_overlays(&mut doc);
        let leftovers = doc
            .all_elements()
            .into_iter()
            .filter(|node| doc.attribute(*node, OVERLAY_ATTR).is_some())
            .count();
        assert_eq!(leftovers, 0);
    }
}
