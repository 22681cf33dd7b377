use std::sync::{Arc, Mutex};
use std::time::Duration;

use stepcast::dom::{Document, NodeId, Rect, OVERLAY_ATTR};
use stepcast::model::{Flow, FlowId, Step, StepType};
use stepcast::playback::{Key, PlaybackEngine, PlaybackObserver};

#[derive(Clone, Default)]
struct EventLog {
    events: Arc<Mutex<Vec<String>>>,
}

impl EventLog {
    fn push(&self, event: impl Into<String>) {
        self.events.lock().expect("event log").push(event.into());
    }

    fn snapshot(&self) -> Vec<String> {
        self.events.lock().expect("event log").clone()
    }
}

impl PlaybackObserver for EventLog {
    fn on_step_shown(&self, index: usize, _step: &Step) {
        self.push(format!("shown:{index}"));
    }

    fn on_element_not_found(&self, index: usize, _step: &Step) {
        self.push(format!("lost:{index}"));
    }

    fn on_action_performed(&self, index: usize, _step: &Step) {
        self.push(format!("performed:{index}"));
    }

    fn on_action_skipped(&self, index: usize, _step: &Step, _reason: &str) {
        self.push(format!("skipped:{index}"));
    }

    fn on_stopped(&self) {
        self.push("stopped");
    }
}

fn engine(log: &EventLog) -> PlaybackEngine {
    PlaybackEngine::new(Box::new(log.clone())).with_settle_delay(Duration::ZERO)
}

fn page() -> (Document, NodeId, NodeId) {
    let mut doc = Document::new("https://app.example.com/dashboard");
    let body = doc.create_element("body");
    doc.append_child(doc.root(), body);

    let save = doc.create_element("button");
    doc.append_child(body, save);
    doc.set_attribute(save, "data-testid", "save-btn");
    doc.set_text(save, "Save");
    doc.set_rect(save, Rect::new(40.0, 40.0, 90.0, 28.0));

    let delete = doc.create_element("button");
    doc.append_child(body, delete);
    doc.set_attribute(delete, "data-testid", "delete-btn");
    doc.set_text(delete, "Delete Account");
    doc.set_rect(delete, Rect::new(40.0, 90.0, 120.0, 28.0));

    (doc, save, delete)
}

fn click_step(selector: &str, explanation: &str, order: u32) -> Step {
    let mut step = Step::new(
        StepType::Click,
        "https://app.example.com/dashboard",
        explanation,
    );
    step.selector = Some(selector.to_owned());
    step.order = order;
    step
}

fn flow_of(steps: Vec<Step>) -> Flow {
    Flow::from_steps(FlowId::new(), "guided demo", steps)
}

fn overlay_count(doc: &Document) -> usize {
    doc.all_elements()
        .into_iter()
        .filter(|node| doc.attribute(*node, OVERLAY_ATTR).is_some())
        .count()
}

#[test]
fn start_renders_highlight_and_tooltip() {
    let log = EventLog::default();
    let mut engine = engine(&log);
    let (mut doc, _, _) = page();

    engine.start(
        &mut doc,
        flow_of(vec![click_step("[data-testid=\"save-btn\"]", "Click Save", 0)]),
    );

    assert!(engine.is_active());
    assert_eq!(overlay_count(&doc), 2);
    assert_eq!(log.snapshot(), vec!["shown:0"]);
}

#[test]
fn missing_element_signals_without_overlays_or_panic() {
    let log = EventLog::default();
    let mut engine = engine(&log);
    let (mut doc, _, _) = page();

    engine.start(
        &mut doc,
        flow_of(vec![
            click_step("[data-testid=\"save-btn\"]", "Click Save", 0),
            click_step("#vanished", "Click the missing thing", 1),
        ]),
    );
    engine.go_to_step(&mut doc, 1);

    assert_eq!(overlay_count(&doc), 0, "no highlight or tooltip for a lost element");
    assert!(engine.is_active(), "element loss is not fatal");
    assert_eq!(log.snapshot(), vec!["shown:0", "lost:1"]);
}

#[test]
fn stop_is_idempotent() {
    let log = EventLog::default();
    let mut engine = engine(&log);
    let (mut doc, _, _) = page();

    engine.start(
        &mut doc,
        flow_of(vec![click_step("[data-testid=\"save-btn\"]", "Click Save", 0)]),
    );
    engine.stop(&mut doc);
    engine.stop(&mut doc);

    assert!(!engine.is_active());
    assert_eq!(overlay_count(&doc), 0);
    let stops = log
        .snapshot()
        .iter()
        .filter(|event| *event == "stopped")
        .count();
    assert_eq!(stops, 1, "teardown happens once");
}

#[tokio::test]
async fn next_executes_safe_clicks() {
    let log = EventLog::default();
    let mut engine = engine(&log);
    let (mut doc, save, _) = page();

    engine.start(
        &mut doc,
        flow_of(vec![
            click_step("[data-testid=\"save-btn\"]", "Click Save", 0),
            click_step("#vanished", "Click the missing thing", 1),
        ]),
    );
    engine.next(&mut doc).await;

    assert_eq!(doc.click_log(), &[save]);
    assert!(log.snapshot().contains(&"performed:0".to_owned()));
}

#[tokio::test]
async fn dangerous_clicks_are_skipped_not_performed() {
    let log = EventLog::default();
    let mut engine = engine(&log);
    let (mut doc, _, _) = page();

    engine.start(
        &mut doc,
        flow_of(vec![
            click_step("[data-testid=\"delete-btn\"]", "Click Delete Account", 0),
            click_step("[data-testid=\"save-btn\"]", "Click Save", 1),
        ]),
    );
    engine.next(&mut doc).await;

    assert!(doc.click_log().is_empty(), "the dangerous button is never clicked");
    let events = log.snapshot();
    assert!(events.contains(&"skipped:0".to_owned()));
    assert!(!events.contains(&"performed:0".to_owned()));
}

#[tokio::test]
async fn flow_exhaustion_stops_playback() {
    let log = EventLog::default();
    let mut engine = engine(&log);
    let (mut doc, _, _) = page();

    engine.start(
        &mut doc,
        flow_of(vec![click_step("[data-testid=\"save-btn\"]", "Click Save", 0)]),
    );
    engine.next(&mut doc).await;

    assert!(!engine.is_active());
    assert_eq!(overlay_count(&doc), 0);
    assert!(log.snapshot().contains(&"stopped".to_owned()));
}

#[tokio::test]
async fn previous_replays_no_action() {
    let log = EventLog::default();
    let mut engine = engine(&log);
    let (mut doc, save, _) = page();

    engine.start(
        &mut doc,
        flow_of(vec![
            click_step("[data-testid=\"save-btn\"]", "Click Save", 0),
            click_step("[data-testid=\"delete-btn\"]", "Click Delete Account", 1),
        ]),
    );
    engine.next(&mut doc).await;
    assert_eq!(doc.click_log(), &[save]);

    engine.previous(&mut doc);
    assert_eq!(engine.current_step_index(), Some(0));
    assert_eq!(doc.click_log(), &[save], "going backward is observational");
}

#[tokio::test]
async fn keyboard_controls_respect_text_entry_focus() {
    let log = EventLog::default();
    let mut engine = engine(&log);
    let (mut doc, save, _) = page();

    let field = doc.create_element("input");
    let body = doc.parent_of(save).expect("body");
    doc.append_child(body, field);

    engine.start(
        &mut doc,
        flow_of(vec![
            click_step("[data-testid=\"save-btn\"]", "Click Save", 0),
            click_step("[data-testid=\"delete-btn\"]", "Click Delete Account", 1),
        ]),
    );

    doc.focus(Some(field));
    engine.handle_key(&mut doc, Key::ArrowRight).await;
    assert_eq!(engine.current_step_index(), Some(0), "typing focus wins");

    doc.focus(None);
    engine.handle_key(&mut doc, Key::ArrowRight).await;
    assert_eq!(engine.current_step_index(), Some(1));

    engine.handle_key(&mut doc, Key::ArrowLeft).await;
    assert_eq!(engine.current_step_index(), Some(0));

    engine.handle_key(&mut doc, Key::Escape).await;
    assert!(!engine.is_active());
}

#[test]
fn mutation_rematches_or_degrades() {
    let log = EventLog::default();
    let mut engine = engine(&log);
    let (mut doc, save, _) = page();

    engine.start(
        &mut doc,
        flow_of(vec![click_step("[data-testid=\"save-btn\"]", "Click Save", 0)]),
    );

    // Move the element; the watch re-renders against the new rect.
    doc.set_rect(save, Rect::new(300.0, 300.0, 90.0, 28.0));
    engine.on_mutation(&mut doc);
    assert_eq!(overlay_count(&doc), 2);
    assert!(engine.is_active());

    // Remove it; the watch degrades to element-lost.
    doc.remove(save);
    engine.on_mutation(&mut doc);
    assert_eq!(overlay_count(&doc), 0);
    assert!(log.snapshot().contains(&"lost:0".to_owned()));
    assert!(engine.is_active(), "playback survives element loss");
}

#[test]
fn steps_without_targets_show_without_overlays() {
    let log = EventLog::default();
    let mut engine = engine(&log);
    let (mut doc, _, _) = page();

    let mut manual = Step::new(
        StepType::Manual,
        "https://app.example.com/dashboard",
        "Check the totals by hand",
    );
    manual.order = 0;
    engine.start(&mut doc, flow_of(vec![manual]));

    assert_eq!(overlay_count(&doc), 0);
    assert_eq!(log.snapshot(), vec!["shown:0"]);
}
