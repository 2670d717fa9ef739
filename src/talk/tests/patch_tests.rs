//! Tests for patch application semantics.

use crate::talk::domain::{Document, Patch, PatchError, PathQuery, TalkName, TalkNumber};
use rstest::{fixture, rstest};

#[fixture]
fn document() -> Document {
    let name = TalkName::new("acme/widgets#1").expect("valid name");
    Document::new(&name, TalkNumber::new(1))
}

fn query(text: &str) -> PathQuery {
    PathQuery::parse(text).expect("valid query")
}

#[rstest]
fn new_document_has_single_talk_root(document: Document) {
    assert_eq!(document.root().name(), "talk");
    assert_eq!(document.talk_name(), Some("acme/widgets#1"));
    assert_eq!(document.root().attribute("number"), Some("1"));
    assert!(document.root().children().is_empty());
}

#[rstest]
fn add_set_and_attr_build_nested_nodes(document: Document) {
    let patched = Patch::new()
        .add("shell")
        .attr("id", "s1")
        .add("host")
        .set("10.0.0.1")
        .up()
        .add("port")
        .set("22")
        .apply(&document)
        .expect("patch applies");

    let shell = patched.section("shell").expect("shell recorded");
    assert_eq!(shell.attribute("id"), Some("s1"));
    assert_eq!(shell.child_text("host"), Some("10.0.0.1"));
    assert_eq!(shell.child_text("port"), Some("22"));
}

#[rstest]
fn add_if_reuses_existing_child(document: Document) {
    let once = Patch::new()
        .add_if("errors")
        .add("error")
        .set("first")
        .apply(&document)
        .expect("first patch applies");
    let twice = Patch::new()
        .add_if("errors")
        .add("error")
        .set("second")
        .apply(&once)
        .expect("second patch applies");

    let errors: Vec<_> = twice.root().children_named("errors").collect();
    assert_eq!(errors.len(), 1);
    let texts: Vec<_> = errors
        .iter()
        .flat_map(|node| node.children().iter().filter_map(|child| child.text()))
        .collect();
    assert_eq!(texts, vec!["first", "second"]);
}

#[rstest]
fn xpath_moves_cursor_to_all_matches(document: Document) {
    let seeded = Patch::new()
        .add("a")
        .up()
        .add("a")
        .apply(&document)
        .expect("seed applies");
    let patched = Patch::new()
        .xpath(&query("/talk/a"))
        .attr("seen", "yes")
        .apply(&seeded)
        .expect("patch applies");

    assert_eq!(patched.select(&query("/talk/a[@seen='yes']")).len(), 2);
}

#[rstest]
fn strict_mismatch_leaves_document_untouched(document: Document) {
    let result = Patch::new()
        .add("marker")
        .xpath(&query("/talk/missing"))
        .strict(1)
        .apply(&document);

    assert_eq!(
        result,
        Err(PatchError::StrictMismatch {
            index: 2,
            expected: 1,
            found: 0
        })
    );
    assert!(document.section("marker").is_none());
}

#[rstest]
fn up_from_root_is_rejected(document: Document) {
    assert_eq!(
        Patch::new().up().apply(&document),
        Err(PatchError::AboveRoot { index: 0 })
    );
}

#[rstest]
fn remove_drops_nodes_and_returns_to_root(document: Document) {
    let seeded = Patch::new()
        .add("x")
        .up()
        .add("y")
        .apply(&document)
        .expect("seed applies");
    let patched = Patch::new()
        .xpath(&query("/talk/x"))
        .remove()
        .add("z")
        .apply(&seeded)
        .expect("patch applies");

    let names: Vec<_> = patched.root().children().iter().map(|node| node.name()).collect();
    assert_eq!(names, vec!["y", "z"]);
}

#[rstest]
fn removing_root_is_rejected(document: Document) {
    assert_eq!(
        Patch::new().remove().apply(&document),
        Err(PatchError::RemoveRoot { index: 0 })
    );
}

#[rstest]
fn invalid_names_are_rejected(document: Document) {
    let result = Patch::new().add("1bad").apply(&document);

    assert!(matches!(result, Err(PatchError::InvalidName { index: 0, .. })));
}

#[rstest]
fn display_renders_escaped_markup(document: Document) {
    let patched = Patch::new()
        .add("tail")
        .set("a < b & c")
        .apply(&document)
        .expect("patch applies");

    let rendered = patched.to_string();
    assert!(rendered.contains("<tail>a &lt; b &amp; c</tail>"), "{rendered}");
}

#[rstest]
fn documents_survive_json_encoding(document: Document) {
    let patched = Patch::new()
        .add("request")
        .attr("id", "r1")
        .apply(&document)
        .expect("patch applies");

    let encoded = serde_json::to_string(&patched).expect("encodes");
    let decoded: Document = serde_json::from_str(&encoded).expect("decodes");
    assert_eq!(decoded, patched);
}

#[rstest]
fn decoding_rejects_a_foreign_root(document: Document) {
    let mut encoded = serde_json::to_value(&document).expect("encodes");
    encoded
        .as_object_mut()
        .expect("node object")
        .insert("name".to_owned(), serde_json::Value::from("nope"));

    let decoded = serde_json::from_value::<Document>(encoded);

    assert!(decoded.is_err());
}
