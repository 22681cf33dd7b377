use std::sync::Arc;

use stepcast::blob::{screenshot_key, BlobStore, InMemoryBlobStore};
use stepcast::flows::FlowStore;
use stepcast::kv::InMemoryKvStore;
use stepcast::model::{Flow, FlowId, FlowMeta, Step, StepType};

fn store() -> (FlowStore, Arc<InMemoryBlobStore>) {
    let blobs = Arc::new(InMemoryBlobStore::new());
    (
        FlowStore::new(Arc::new(InMemoryKvStore::new()), blobs.clone()),
        blobs,
    )
}

fn sample_flow(name: &str) -> Flow {
    let steps = vec![
        Step::new(StepType::Click, "https://app.example.com/a", "Click Save"),
        {
            let mut step = Step::new(
                StepType::Navigation,
                "https://app.example.com/b",
                "Navigate to the report",
            );
            step.order = 1;
            step
        },
    ];
    Flow::from_steps(FlowId::new(), name, steps)
}

#[test]
fn save_and_reload_round_trip() {
    let (store, _) = store();
    let saved = store.save_flow(sample_flow("Onboarding")).expect("save");
    assert!(saved.updated_at.is_some(), "save stamps updated_at");

    let loaded = store
        .get_flow_by_id(&saved.id)
        .expect("load")
        .expect("flow present");
    assert_eq!(loaded.name, "Onboarding");
    assert_eq!(loaded.step_count(), 2);

    let all = store.get_all_flows().expect("list");
    assert_eq!(all.len(), 1);
}

#[test]
fn save_replaces_existing_flow_wholesale() {
    let (store, _) = store();
    let saved = store.save_flow(sample_flow("Original")).expect("save");

    let mut replacement = saved.clone();
    replacement.name = "Renamed".to_owned();
    replacement.steps.truncate(1);
    store.save_flow(replacement).expect("replace");

    let loaded = store
        .get_flow_by_id(&saved.id)
        .expect("load")
        .expect("flow present");
    assert_eq!(loaded.name, "Renamed");
    assert_eq!(loaded.step_count(), 1);
    assert_eq!(store.get_all_flows().expect("list").len(), 1);
}

#[test]
fn validation_rejects_before_persisting() {
    let (store, _) = store();

    let unnamed = Flow::from_steps(FlowId::new(), "   ", Vec::new());
    assert!(store.save_flow(unnamed).is_err());

    let mut bad_url = sample_flow("Bad URL");
    bad_url.steps[0].url = "ftp://example.com/".to_owned();
    assert!(store.save_flow(bad_url).is_err());

    let mut long_description = sample_flow("Long description");
    long_description.meta = FlowMeta {
        description: Some("d".repeat(501)),
        tags: None,
    };
    assert!(store.save_flow(long_description).is_err());

    let mut too_many_tags = sample_flow("Tags");
    too_many_tags.meta = FlowMeta {
        description: None,
        tags: Some((0..11).map(|n| format!("tag-{n}")).collect()),
    };
    assert!(store.save_flow(too_many_tags).is_err());

    assert!(store.get_all_flows().expect("list").is_empty());
}

#[test]
fn delete_cascades_into_the_blob_store() {
    let (store, blobs) = store();
    let mut flow = sample_flow("With blobs");
    flow.steps[0].meta.screenshot_indexed_db = true;
    let saved = store.save_flow(flow).expect("save");

    let key = screenshot_key(&saved.id, &saved.steps[0].id);
    blobs.put(&key, vec![1, 2, 3]).expect("seed blob");

    // An unrelated flow's blob must survive the cascade.
    let other = store.save_flow(sample_flow("Other")).expect("save other");
    let other_key = screenshot_key(&other.id, &other.steps[0].id);
    blobs.put(&other_key, vec![9]).expect("seed other blob");

    assert!(store.delete_flow(&saved.id).expect("delete"));
    assert!(blobs.get(&key).expect("blob readable").is_none());
    assert!(blobs.get(&other_key).expect("blob readable").is_some());

    assert!(!store.delete_flow(&saved.id).expect("second delete is a miss"));
}

#[test]
fn export_embeds_blob_screenshots_and_import_rehomes_them() {
    let (store, blobs) = store();
    let mut flow = sample_flow("Portable");
    flow.steps[0].meta.screenshot_indexed_db = true;
    let saved = store.save_flow(flow).expect("save");
    let original_step = saved.steps[0].id;
    blobs
        .put(&screenshot_key(&saved.id, &original_step), vec![7, 7, 7])
        .expect("seed blob");

    let payload = store.export_flow(&saved.id).expect("export");

    let imported = store.import_flow(payload).expect("import");
    assert_ne!(imported.id, saved.id, "import regenerates the flow id");
    assert_eq!(imported.name, "Portable");
    assert_eq!(imported.step_count(), 2);
    assert!(imported.updated_at.is_some());

    let rehomed = blobs
        .get(&screenshot_key(&imported.id, &original_step))
        .expect("blob readable")
        .expect("screenshot rehomed under the new flow id");
    assert_eq!(rehomed, vec![7, 7, 7]);

    assert_eq!(store.get_all_flows().expect("list").len(), 2);
}

#[test]
fn import_accepts_a_bare_flow_object() {
    let (store, _) = store();
    let payload = serde_json::to_value(sample_flow("Bare")).expect("serialize");
    let imported = store.import_flow(payload).expect("import");
    assert_eq!(imported.name, "Bare");
}

#[test]
fn import_rejects_malformed_payloads() {
    let (store, _) = store();
    assert!(store
        .import_flow(serde_json::json!({"nonsense": true}))
        .is_err());
    assert!(store.get_all_flows().expect("list").is_empty());
}
