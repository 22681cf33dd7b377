use crate::dom::{Document, NodeId};
use crate::locator::resolve_selector;
use crate::model::{Flow, Step, StepType};
use crate::overlay::{remove_overlays, render_overlays, OverlayHandles};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Destructive verbs that must never be triggered autonomously during
/// guided replay.
pub const DANGEROUS_TERMS: [&str; 9] = [
    "delete", "remove", "destroy", "clear", "reset", "cancel", "close", "logout", "sign out",
];

/// Settle delay after executing a step's action, before advancing. A
/// heuristic for in-flight navigations and DOM updates, not a completion
/// signal.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(500);

/// Keyboard controls recognized while playback is active.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Key {
    ArrowRight,
    ArrowLeft,
    Escape,
}

/// Callbacks surfaced to the hosting UI. All methods default to no-ops.
pub trait PlaybackObserver: Send {
    fn on_step_shown(&self, _index: usize, _step: &Step) {}
    /// The step's target no longer matches anything on the page. Expected
    /// and non-fatal; the UI offers a manual continue.
    fn on_element_not_found(&self, _index: usize, _step: &Step) {}
    fn on_action_performed(&self, _index: usize, _step: &Step) {}
    fn on_action_skipped(&self, _index: usize, _step: &Step, _reason: &str) {}
    fn on_stopped(&self) {}
}

/// Observer that ignores everything.
pub struct NoopObserver;

impl PlaybackObserver for NoopObserver {}

/// Walks a flow's steps against the live page, rendering guidance overlays
/// and executing step actions on advance.
///
/// `stopped -> active` on `start`, back to `stopped` on `stop` or flow
/// exhaustion. At most one active playback per page agent; teardown removes
/// every overlay node and cancels the mutation watch, and is idempotent.
pub struct PlaybackEngine {
    observer: Box<dyn PlaybackObserver>,
    flow: Option<Flow>,
    current: usize,
    overlays: OverlayHandles,
    watch: Option<u64>,
    settle_delay: Duration,
}

impl PlaybackEngine {
    pub fn new(observer: Box<dyn PlaybackObserver>) -> Self {
        Self {
            observer,
            flow: None,
            current: 0,
            overlays: OverlayHandles::default(),
            watch: None,
            settle_delay: DEFAULT_SETTLE_DELAY,
        }
    }

    /// Overrides the post-action settle delay (used by tests and demos).
    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    pub fn is_active(&self) -> bool {
        self.flow.is_some()
    }

    pub fn current_step_index(&self) -> Option<usize> {
        self.flow.as_ref().map(|_| self.current)
    }

    /// Begins playback of `flow` at its first step.
    pub fn start(&mut self, doc: &mut Document, flow: Flow) {
        self.stop(doc);
        if flow.steps.is_empty() {
            debug!("flow has no steps, nothing to play");
            return;
        }
        self.flow = Some(flow);
        self.current = 0;
        self.go_to_step(doc, 0);
    }

    /// Tears playback down: overlays removed, watch cancelled, cursor
    /// cleared. Safe to call any number of times.
    pub fn stop(&mut self, doc: &mut Document) {
        let was_active = self.flow.take().is_some();
        remove_overlays(doc);
        self.overlays = OverlayHandles::default();
        self.watch = None;
        self.current = 0;
        if was_active {
            self.observer.on_stopped();
        }
    }

    /// Shows the step at `index`: highlight, tooltip, scroll into view and
    /// a fresh mutation watch. Out-of-range indices are a no-op.
    pub fn go_to_step(&mut self, doc: &mut Document, index: usize) {
        let Some(step) = self.flow.as_ref().and_then(|flow| flow.steps.get(index)) else {
            return;
        };
        let step = step.clone();
        self.current = index;

        // A rep may have navigated by hand; mismatches are advisory only.
        if let Some((expected, actual)) = path_pair(&step.url, doc.url()) {
            if expected != actual {
                warn!(%expected, %actual, "page path differs from the recorded step");
            }
        }

        match step.selector.as_deref() {
            Some(selector) => match resolve_selector(doc, selector) {
                Some(node) => {
                    doc.scroll_into_view(node);
                    let rect = doc.rect(node);
                    self.overlays = render_overlays(doc, self.overlays, rect, &step.explanation);
                    self.watch = Some(doc.revision());
                    self.observer.on_step_shown(index, &step);
                }
                None => {
                    self.clear_visuals(doc);
                    self.observer.on_element_not_found(index, &step);
                }
            },
            None => {
                // Manual and navigation steps have no target element; the
                // presenter panel carries the explanation.
                self.clear_visuals(doc);
                self.observer.on_step_shown(index, &step);
            }
        }
    }

    /// Executes the current step's action, waits the settle delay, then
    /// advances. Reaching the end of the flow stops playback.
    pub async fn next(&mut self, doc: &mut Document) {
        let Some(flow) = self.flow.as_ref() else {
            return;
        };
        let Some(step) = flow.steps.get(self.current).cloned() else {
            return;
        };

        self.execute_action(doc, self.current, &step);
        tokio::time::sleep(self.settle_delay).await;

        let last = self
            .flow
            .as_ref()
            .map(|flow| flow.steps.len().saturating_sub(1))
            .unwrap_or(0);
        if self.current >= last {
            self.stop(doc);
        } else {
            let target = self.current + 1;
            self.go_to_step(doc, target);
        }
    }

    /// Moves the cursor back one step. Purely observational: no action is
    /// replayed when navigating backward.
    pub fn previous(&mut self, doc: &mut Document) {
        if self.flow.is_none() || self.current == 0 {
            return;
        }
        let target = self.current - 1;
        self.go_to_step(doc, target);
    }

    /// Re-checks the current step after a DOM mutation, re-rendering the
    /// overlays against the element's new position or degrading to
    /// element-lost when it no longer resolves.
    pub fn on_mutation(&mut self, doc: &mut Document) {
        let Some(watched) = self.watch else {
            return;
        };
        if doc.revision() == watched {
            return;
        }
        let Some(step) = self
            .flow
            .as_ref()
            .and_then(|flow| flow.steps.get(self.current))
            .cloned()
        else {
            return;
        };
        let Some(selector) = step.selector.as_deref() else {
            return;
        };

        match resolve_selector(doc, selector) {
            Some(node) => {
                let rect = doc.rect(node);
                self.overlays = render_overlays(doc, self.overlays, rect, &step.explanation);
                self.watch = Some(doc.revision());
            }
            None => {
                self.clear_visuals(doc);
                self.observer.on_element_not_found(self.current, &step);
            }
        }
    }

    /// Keyboard control while active. Ignored when focus is inside a text
    /// input or contenteditable host.
    pub async fn handle_key(&mut self, doc: &mut Document, key: Key) {
        if self.flow.is_none() {
            return;
        }
        if doc
            .focused()
            .is_some_and(|node| doc.contains(node) && doc.is_text_entry(node))
        {
            return;
        }
        match key {
            Key::ArrowRight => self.next(doc).await,
            Key::ArrowLeft => self.previous(doc),
            Key::Escape => self.stop(doc),
        }
    }

    fn execute_action(&mut self, doc: &mut Document, index: usize, step: &Step) {
        match step.step_type {
            StepType::Click => {
                let Some(selector) = step.selector.as_deref() else {
                    return;
                };
                let Some(node) = resolve_selector(doc, selector) else {
                    return;
                };
                if let Some(term) = dangerous_term(doc, node) {
                    debug!(%term, "skipping dangerous action");
                    self.observer
                        .on_action_skipped(index, step, &format!("dangerous action: {term}"));
                    return;
                }
                doc.click(node);
                self.observer.on_action_performed(index, step);
            }
            StepType::Navigation => {
                if doc.url() != step.url {
                    doc.set_url(step.url.clone());
                    self.observer.on_action_performed(index, step);
                }
            }
            // Input replay is reserved; visibility and manual steps carry no
            // action.
            StepType::Input | StepType::Visibility | StepType::Manual => {}
        }
    }

    fn clear_visuals(&mut self, doc: &mut Document) {
        remove_overlays(doc);
        self.overlays = OverlayHandles::default();
        self.watch = None;
    }
}

/// Finds the denylisted verb that makes clicking `node` unsafe, if any.
/// Checks the element's visible text, its aria-label and the text of an
/// enclosing form.
pub fn dangerous_term(doc: &Document, node: NodeId) -> Option<&'static str> {
    let mut haystack = doc.text_content(node).to_lowercase();
    if let Some(label) = doc.attribute(node, "aria-label") {
        haystack.push(' ');
        haystack.push_str(&label.to_lowercase());
    }
    let mut current = doc.parent_of(node);
    while let Some(ancestor) = current {
        if doc.tag(ancestor) == "form" {
            haystack.push(' ');
            haystack.push_str(&doc.text_content(ancestor).to_lowercase());
            break;
        }
        current = doc.parent_of(ancestor);
    }
    DANGEROUS_TERMS
        .into_iter()
        .find(|term| haystack.contains(term))
}

fn path_pair(expected: &str, actual: &str) -> Option<(String, String)> {
    let expected = Url::parse(expected).ok()?;
    let actual = Url::parse(actual).ok()?;
    Some((expected.path().to_owned(), actual.path().to_owned()))
}
