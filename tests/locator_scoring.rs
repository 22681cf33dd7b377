use proptest::prelude::*;
use stepcast::dom::{Document, NodeId};
use stepcast::locator::{generate_selector, resolve_selector};

fn page_with_list() -> (Document, Vec<NodeId>) {
    let mut doc = Document::new("https://app.example.com/list");
    let body = doc.create_element("body");
    doc.append_child(doc.root(), body);
    let list = doc.create_element("ul");
    doc.append_child(body, list);

    let mut items = Vec::new();
    for _ in 0..4 {
        let item = doc.create_element("li");
        doc.append_child(list, item);
        doc.set_attribute(item, "class", "row compact");
        items.push(item);
    }
    (doc, items)
}

#[test]
fn data_attribute_beats_id_and_classes() {
    let mut doc = Document::new("https://app.example.com/");
    let body = doc.create_element("body");
    doc.append_child(doc.root(), body);
    let button = doc.create_element("button");
    doc.append_child(body, button);
    doc.set_attribute(button, "id", "primary");
    doc.set_attribute(button, "class", "btn btn-primary");
    doc.set_attribute(button, "data-testid", "submit-form");

    let scored = generate_selector(&doc, button);
    assert_eq!(scored.selector, "[data-testid=\"submit-form\"]");
    assert_eq!(scored.score, 100);
}

#[test]
fn unique_single_class_is_preferred_over_combinations() {
    let mut doc = Document::new("https://app.example.com/");
    let body = doc.create_element("body");
    doc.append_child(doc.root(), body);
    let banner = doc.create_element("div");
    doc.append_child(body, banner);
    doc.set_attribute(banner, "class", "banner themed");
    let other = doc.create_element("div");
    doc.append_child(body, other);
    doc.set_attribute(other, "class", "themed");

    let scored = generate_selector(&doc, banner);
    assert_eq!(scored.selector, ".banner");
    assert_eq!(scored.score, 60);
    assert_eq!(resolve_selector(&doc, &scored.selector), Some(banner));
}

#[test]
fn shared_classes_fall_back_to_positional_selector() {
    let (doc, items) = page_with_list();
    let scored = generate_selector(&doc, items[2]);
    assert_eq!(scored.selector, "li.row.compact:nth-of-type(3)");
    assert_eq!(scored.score, 60);
    assert_eq!(resolve_selector(&doc, &scored.selector), Some(items[2]));
}

#[test]
fn absolute_path_resolves_every_plain_element() {
    let (doc, items) = page_with_list();
    for (index, item) in items.iter().enumerate() {
        let path = format!("/html[1]/body[1]/ul[1]/li[{}]", index + 1);
        assert_eq!(resolve_selector(&doc, &path), Some(*item));
    }
}

#[test]
fn resolution_survives_unrelated_mutations() {
    let (mut doc, items) = page_with_list();
    let scored = generate_selector(&doc, items[0]);

    // Append an unrelated sibling after generation.
    let body = doc.parent_of(doc.parent_of(items[0]).expect("list")).expect("body");
    let aside = doc.create_element("aside");
    doc.append_child(body, aside);

    assert_eq!(resolve_selector(&doc, &scored.selector), Some(items[0]));
}

proptest! {
    #[test]
    fn data_attribute_always_wins(value in "[a-z][a-z0-9-]{0,20}") {
        let mut doc = Document::new("https://app.example.com/");
        let body = doc.create_element("body");
        doc.append_child(doc.root(), body);
        let node = doc.create_element("button");
        doc.append_child(body, node);
        doc.set_attribute(node, "id", "stable-id");
        doc.set_attribute(node, "class", "a b c");
        doc.set_attribute(node, "data-testid", &value);

        let scored = generate_selector(&doc, node);
        prop_assert_eq!(scored.score, 100);
        prop_assert_eq!(scored.selector, format!("[data-testid=\"{value}\"]"));
    }

    #[test]
    fn generation_and_resolution_round_trip(depth in 1usize..6, fanout in 1usize..4) {
        let mut doc = Document::new("https://app.example.com/");
        let mut parent = doc.root();
        let mut last = parent;
        for _ in 0..depth {
            for _ in 0..fanout {
                let child = doc.create_element("div");
                doc.append_child(parent, child);
                last = child;
            }
            parent = last;
        }

        let scored = generate_selector(&doc, last);
        prop_assert_eq!(resolve_selector(&doc, &scored.selector), Some(last));
    }
}
