use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

use image::DynamicImage;
use stepcast::blob::InMemoryBlobStore;
use stepcast::dom::{Document, NodeId, Rect};
use stepcast::flows::FlowStore;
use stepcast::kv::InMemoryKvStore;
use stepcast::messages::{Request, Response};
use stepcast::model::{Flow, Step, TabId};
use stepcast::playback::{PlaybackEngine, PlaybackObserver};
use stepcast::recorder::Recorder;
use stepcast::router::Router;
use stepcast::screenshot::CaptureBackend;
use stepcast::session::SessionManager;
use stepcast::transport::{LocalTransport, Transport};
use stepcast::Result;

struct DemoCapture;

impl CaptureBackend for DemoCapture {
    fn capture(&self, _tab_id: TabId) -> Result<Vec<u8>> {
        let img = DynamicImage::new_rgb8(128, 96);
        let mut buffer = Cursor::new(Vec::new());
        img.write_to(&mut buffer, image::ImageFormat::Png)
            .expect("encode png");
        Ok(buffer.into_inner())
    }
}

struct PrintingObserver;

impl PlaybackObserver for PrintingObserver {
    fn on_step_shown(&self, index: usize, step: &Step) {
        println!("  step {index}: {}", step.explanation);
    }

    fn on_action_performed(&self, index: usize, _step: &Step) {
        println!("  step {index}: action replayed");
    }

    fn on_element_not_found(&self, index: usize, _step: &Step) {
        println!("  step {index}: element not found, continue manually");
    }

    fn on_stopped(&self) {
        println!("  playback finished");
    }
}

fn settings_page() -> (Document, NodeId) {
    let mut doc = Document::new("https://app.example.com/settings");
    let body = doc.create_element("body");
    doc.append_child(doc.root(), body);
    let button = doc.create_element("button");
    doc.append_child(body, button);
    doc.set_attribute(button, "data-testid", "save-btn");
    doc.set_text(button, "Save");
    doc.set_rect(button, Rect::new(24.0, 24.0, 96.0, 32.0));
    (doc, button)
}

#[tokio::main]
async fn main() -> Result<()> {
    let kv = Arc::new(InMemoryKvStore::new());
    let blobs = Arc::new(InMemoryBlobStore::new());
    let sessions = Arc::new(SessionManager::new(kv.clone()));
    let flows = Arc::new(FlowStore::new(kv, blobs.clone()));
    let router = Arc::new(Router::new(sessions, flows, blobs, Arc::new(DemoCapture)));
    let transport: Arc<dyn Transport> = Arc::new(LocalTransport::new(router));

    println!("== Recording ==");
    transport
        .request(Request::StartRecording {
            tab_id: Some(TabId(1)),
        })
        .await?
        .into_result()?;

    let (doc, save_button) = settings_page();
    let mut recorder = Recorder::new(transport.clone());
    recorder.sync_with_session().await;
    recorder.handle_click(&doc, save_button).await?;
    recorder
        .add_manual_step(doc.url(), "Confirm the toast message appears")
        .await?;

    let Response::Steps { steps, flow_id } = transport
        .request(Request::StopRecording)
        .await?
        .into_result()?
    else {
        return Ok(());
    };
    println!("captured {} steps", steps.len());

    let flow = Flow::from_steps(flow_id.expect("flow id"), "Save settings", steps);
    let Response::Flow { flow: Some(saved) } = transport
        .request(Request::SaveFlow { flow })
        .await?
        .into_result()?
    else {
        return Ok(());
    };
    println!("saved flow {:?} with {} steps", saved.name, saved.step_count());

    println!("== Playback ==");
    let (mut doc, _) = settings_page();
    let mut engine = PlaybackEngine::new(Box::new(PrintingObserver))
        .with_settle_delay(Duration::from_millis(10));
    engine.start(&mut doc, saved);
    while engine.is_active() {
        engine.next(&mut doc).await;
    }
    println!("clicks replayed: {}", doc.click_log().len());
    Ok(())
}
