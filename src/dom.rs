use std::collections::BTreeMap;

/// Attribute marking overlay nodes the extension itself injected.
/// Recording ignores clicks on them and playback teardown removes them.
pub const OVERLAY_ATTR: &str = "data-stepcast-overlay";

/// Handle to an element in a [`Document`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeId(pub usize);

/// Axis-aligned layout box in page coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    /// Grows the box outward by `amount` on every side.
    pub fn inflate(&self, amount: f64) -> Self {
        Self {
            x: self.x - amount,
            y: self.y - amount,
            width: self.width + amount * 2.0,
            height: self.height + amount * 2.0,
        }
    }
}

struct ElementData {
    tag: String,
    id: Option<String>,
    classes: Vec<String>,
    attributes: BTreeMap<String, String>,
    text: String,
    rect: Rect,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    detached: bool,
}

impl ElementData {
    fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_ascii_lowercase(),
            id: None,
            classes: Vec::new(),
            attributes: BTreeMap::new(),
            text: String::new(),
            rect: Rect::default(),
            parent: None,
            children: Vec::new(),
            detached: false,
        }
    }
}

/// Mutable element-tree model of the page a per-tab agent operates on.
///
/// The tree carries what the locator and playback engine need from a live
/// DOM: tags, ids, classes, attributes, subtree text, sibling positions,
/// layout rects, focus, and a monotonically increasing `revision` bumped on
/// every mutation. The revision is the mutation-watch primitive: an observer
/// holding a past revision can tell whether the tree changed under it.
pub struct Document {
    nodes: Vec<ElementData>,
    root: NodeId,
    url: String,
    viewport: Rect,
    scroll: (f64, f64),
    focused: Option<NodeId>,
    revision: u64,
    click_log: Vec<NodeId>,
}

impl Document {
    /// Creates a document with a lone `html` root.
    pub fn new(url: impl Into<String>) -> Self {
        let mut doc = Self {
            nodes: Vec::new(),
            root: NodeId(0),
            url: url.into(),
            viewport: Rect::new(0.0, 0.0, 1280.0, 800.0),
            scroll: (0.0, 0.0),
            focused: None,
            revision: 0,
            click_log: Vec::new(),
        };
        doc.nodes.push(ElementData::new("html"));
        doc
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn viewport(&self) -> Rect {
        self.viewport
    }

    pub fn set_viewport(&mut self, viewport: Rect) {
        self.viewport = viewport;
    }

    /// Current mutation revision; any tree change increments it.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Nodes clicked through [`Document::click`], oldest first.
    pub fn click_log(&self) -> &[NodeId] {
        &self.click_log
    }

    fn bump(&mut self) {
        self.revision += 1;
    }

    /// Creates a detached element; attach it with [`Document::append_child`].
    pub fn create_element(&mut self, tag: &str) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(ElementData::new(tag));
        id
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.nodes[child.0].parent = Some(parent);
        self.nodes[child.0].detached = false;
        self.nodes[parent.0].children.push(child);
        self.bump();
    }

    /// Detaches `node` and its whole subtree from the tree.
    pub fn remove(&mut self, node: NodeId) {
        if let Some(parent) = self.nodes[node.0].parent {
            self.nodes[parent.0].children.retain(|child| *child != node);
        }
        let mut stack = vec![node];
        while let Some(current) = stack.pop() {
            self.nodes[current.0].detached = true;
            stack.extend(self.nodes[current.0].children.clone());
        }
        if self.focused.is_some_and(|focus| !self.contains(focus)) {
            self.focused = None;
        }
        self.bump();
    }

    /// Sets an attribute; `id` and `class` update the dedicated fields.
    pub fn set_attribute(&mut self, node: NodeId, name: &str, value: &str) {
        match name {
            "id" => self.nodes[node.0].id = Some(value.to_owned()),
            "class" => {
                self.nodes[node.0].classes =
                    value.split_whitespace().map(str::to_owned).collect();
            }
            _ => {
                self.nodes[node.0]
                    .attributes
                    .insert(name.to_owned(), value.to_owned());
            }
        }
        self.bump();
    }

    pub fn set_text(&mut self, node: NodeId, text: &str) {
        self.nodes[node.0].text = text.to_owned();
        self.bump();
    }

    pub fn set_rect(&mut self, node: NodeId, rect: Rect) {
        self.nodes[node.0].rect = rect;
        self.bump();
    }

    /// Navigates the page, leaving the tree untouched (single-page apps
    /// mutate the tree separately; full loads build a new document).
    pub fn set_url(&mut self, url: impl Into<String>) {
        self.url = url.into();
        self.bump();
    }

    pub fn focus(&mut self, node: Option<NodeId>) {
        self.focused = node;
    }

    pub fn focused(&self) -> Option<NodeId> {
        self.focused
    }

    /// Records a synthesized click on `node`.
    pub fn click(&mut self, node: NodeId) {
        self.click_log.push(node);
    }

    /// Centers the viewport scroll on `node`.
    pub fn scroll_into_view(&mut self, node: NodeId) {
        let rect = self.rect(node);
        self.scroll = (
            rect.x + rect.width / 2.0 - self.viewport.width / 2.0,
            rect.y + rect.height / 2.0 - self.viewport.height / 2.0,
        );
    }

    pub fn scroll_offset(&self) -> (f64, f64) {
        self.scroll
    }

    /// Whether the node is still attached to the tree.
    pub fn contains(&self, node: NodeId) -> bool {
        node.0 < self.nodes.len() && !self.nodes[node.0].detached
    }

    pub fn tag(&self, node: NodeId) -> &str {
        &self.nodes[node.0].tag
    }

    pub fn element_id(&self, node: NodeId) -> Option<&str> {
        self.nodes[node.0].id.as_deref()
    }

    pub fn classes(&self, node: NodeId) -> &[String] {
        &self.nodes[node.0].classes
    }

    pub fn attribute(&self, node: NodeId, name: &str) -> Option<&str> {
        match name {
            "id" => self.element_id(node),
            _ => self.nodes[node.0].attributes.get(name).map(String::as_str),
        }
    }

    pub fn rect(&self, node: NodeId) -> Rect {
        self.nodes[node.0].rect
    }

    pub fn parent_of(&self, node: NodeId) -> Option<NodeId> {
        self.nodes[node.0].parent
    }

    pub fn children_of(&self, node: NodeId) -> &[NodeId] {
        &self.nodes[node.0].children
    }

    /// Own text plus descendant text, whitespace-normalized.
    pub fn text_content(&self, node: NodeId) -> String {
        let mut parts = Vec::new();
        let mut stack = vec![node];
        while let Some(current) = stack.pop() {
            let data = &self.nodes[current.0];
            if !data.text.trim().is_empty() {
                parts.push(data.text.trim().to_owned());
            }
            for child in data.children.iter().rev() {
                stack.push(*child);
            }
        }
        parts.join(" ")
    }

    /// All attached elements in depth-first document order.
    pub fn all_elements(&self) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![self.root];
        while let Some(current) = stack.pop() {
            if self.nodes[current.0].detached {
                continue;
            }
            out.push(current);
            for child in self.nodes[current.0].children.iter().rev() {
                stack.push(*child);
            }
        }
        out
    }

    /// 1-based position of `node` among siblings that share its tag.
    pub fn same_tag_index(&self, node: NodeId) -> usize {
        let tag = self.tag(node).to_owned();
        match self.parent_of(node) {
            Some(parent) => {
                let mut index = 0;
                for sibling in self.children_of(parent) {
                    if self.tag(*sibling) == tag {
                        index += 1;
                    }
                    if *sibling == node {
                        return index;
                    }
                }
                1
            }
            None => 1,
        }
    }

    /// True when `node` belongs to an injected overlay subtree.
    pub fn is_overlay(&self, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(candidate) = current {
            if self.attribute(candidate, OVERLAY_ATTR).is_some() {
                return true;
            }
            current = self.parent_of(candidate);
        }
        false
    }

    /// True for password inputs, whose clicks must never be captured.
    pub fn is_password_input(&self, node: NodeId) -> bool {
        self.tag(node) == "input"
            && self
                .attribute(node, "type")
                .is_some_and(|kind| kind.eq_ignore_ascii_case("password"))
    }

    /// True when keystrokes on `node` belong to text editing, not playback
    /// control: text-like inputs, textareas, and contenteditable hosts.
    pub fn is_text_entry(&self, node: NodeId) -> bool {
        if self.attribute(node, "contenteditable").is_some() {
            return true;
        }
        match self.tag(node) {
            "textarea" => true,
            "input" => !matches!(
                self.attribute(node, "type").unwrap_or("text"),
                "button" | "checkbox" | "radio" | "submit" | "reset" | "range" | "file"
            ),
            _ => false,
        }
    }
}
