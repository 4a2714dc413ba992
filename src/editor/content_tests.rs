use super::content::{char_to_byte_idx, insert_text_at, split_text};
use super::*;
use crate::document::{Document, FragmentKind, NodeId};

fn document_with_line(fragments: &[(&str, FragmentKind)]) -> Document {
    let mut document = Document::new();
    let mut line = document.create_line();
    for (text, kind) in fragments {
        let fragment = document.create_fragment(text, *kind);
        line.fragments.push(fragment);
    }
    document.lines.push(line);
    document
}

fn fragment_id(editor: &DocumentEditor, index: usize) -> NodeId {
    editor.document().lines[0].fragments[index].id
}

fn body_texts(editor: &DocumentEditor) -> Vec<String> {
    editor.document().lines[0]
        .fragments
        .iter()
        .map(|fragment| fragment.text.clone())
        .collect()
}

#[test]
fn char_to_byte_idx_handles_multibyte_text() {
    let text = "héllo";
    assert_eq!(char_to_byte_idx(text, 0), 0);
    assert_eq!(char_to_byte_idx(text, 1), 1);
    assert_eq!(char_to_byte_idx(text, 2), 3);
    assert_eq!(char_to_byte_idx(text, 99), text.len());
    assert_eq!(split_text(text, 2), ("hé".to_string(), "llo".to_string()));
}

#[test]
fn insert_text_primitive_inserts_at_char_offset() {
    let mut document = document_with_line(&[("héllo", FragmentKind::Text)]);
    let id = document.lines[0].fragments[0].id;
    assert!(insert_text_at(&mut document, &Caret::new(id, 2), "y"));
    assert_eq!(document.lines[0].fragments[0].text, "héyllo");
}

#[test]
fn boundary_split_reuses_dedicated_fragment() {
    let mut editor = DocumentEditor::new(document_with_line(&[("hello", FragmentKind::Text)]));
    let path = LinePath::new_root(0);

    assert_eq!(editor.fragment_text(&path, 0, 0), Some(0));
    assert_eq!(editor.fragment_text(&path, 0, 5), Some(0));
    assert_eq!(editor.document().lines[0].fragments.len(), 1);
    assert!(
        editor.document().lines[0]
            .fragments
            .iter()
            .all(|fragment| !fragment.is_empty())
    );
}

#[test]
fn boundary_split_claims_raw_run_in_place() {
    let mut editor = DocumentEditor::new(document_with_line(&[("pasted", FragmentKind::Raw)]));
    let path = LinePath::new_root(0);
    let id = fragment_id(&editor, 0);

    assert_eq!(editor.fragment_text(&path, 0, 0), Some(0));

    let fragment = &editor.document().lines[0].fragments[0];
    assert_eq!(fragment.id, id, "the run is claimed, not replaced");
    assert_eq!(fragment.kind, FragmentKind::Text);
    assert_eq!(editor.document().lines[0].fragments.len(), 1);
}

#[test]
fn interior_split_inherits_source_style() {
    let mut document = document_with_line(&[("hello world", FragmentKind::Text)]);
    document.lines[0].fragments[0].style.set("color", "red");
    let mut editor = DocumentEditor::new(document);
    let path = LinePath::new_root(0);

    assert_eq!(editor.fragment_text(&path, 0, 5), Some(1));

    assert_eq!(body_texts(&editor), vec!["hello", " world"]);
    let tail = &editor.document().lines[0].fragments[1];
    assert_eq!(tail.kind, FragmentKind::Text);
    assert_eq!(tail.style.get("color"), Some("red"));
}

#[test]
fn interior_split_of_raw_run_takes_continuing_style() {
    let mut editor = DocumentEditor::new(document_with_line(&[("hello world", FragmentKind::Raw)]));
    editor.continuing_style.set("font-weight", "bold");
    let path = LinePath::new_root(0);

    assert_eq!(editor.fragment_text(&path, 0, 5), Some(1));

    let fragments = &editor.document().lines[0].fragments;
    assert_eq!(fragments[0].kind, FragmentKind::Raw, "the head stays raw");
    let tail = &fragments[1];
    assert_eq!(tail.kind, FragmentKind::Text);
    assert_eq!(tail.style.get("font-weight"), Some("bold"));
}

#[test]
fn create_fragments_in_same_run_produces_three_parts() {
    let mut editor = DocumentEditor::new(document_with_line(&[("hello world", FragmentKind::Text)]));
    let id = fragment_id(&editor, 0);
    assert!(editor.save_selection(&RawRange::new(
        RawPosition {
            container: RawContainer::Fragment(id),
            offset: 3,
        },
        RawPosition {
            container: RawContainer::Fragment(id),
            offset: 8,
        },
    )));

    let (first, last) = editor
        .create_fragments_in_range()
        .expect("selection split into fragments");
    assert_eq!(first, last, "one fragment covers the whole selection");
    assert_eq!(body_texts(&editor), vec!["hel", "lo wo", "rld"]);

    let selection = editor.selection().expect("selection re-derived");
    assert_eq!(selection.start, Caret::new(first, 0));
    assert_eq!(selection.end, Caret::new(last, 5));
}

#[test]
fn create_fragments_across_runs_sweeps_raw_runs() {
    let mut editor = DocumentEditor::new(document_with_line(&[
        ("abc", FragmentKind::Text),
        ("raw", FragmentKind::Raw),
        ("def", FragmentKind::Text),
    ]));
    let start = fragment_id(&editor, 0);
    let end = fragment_id(&editor, 2);
    assert!(editor.save_selection(&RawRange::new(
        RawPosition {
            container: RawContainer::Fragment(start),
            offset: 1,
        },
        RawPosition {
            container: RawContainer::Fragment(end),
            offset: 2,
        },
    )));

    let (first, last) = editor
        .create_fragments_in_range()
        .expect("selection split into fragments");

    assert_eq!(body_texts(&editor), vec!["a", "bc", "raw", "de", "f"]);
    let fragments = &editor.document().lines[0].fragments;
    assert!(fragments.iter().all(|f| f.kind == FragmentKind::Text));
    assert_eq!(fragments[1].id, first);
    assert_eq!(fragments[3].id, last);

    let selection = editor.selection().expect("selection re-derived");
    assert_eq!(selection.start, Caret::new(first, 0));
    assert_eq!(selection.end, Caret::new(last, 2));
}

#[test]
fn boundary_selection_never_creates_empty_fragments() {
    let mut editor = DocumentEditor::new(document_with_line(&[
        ("hello", FragmentKind::Text),
        ("world", FragmentKind::Text),
    ]));
    let start = fragment_id(&editor, 0);
    let end = fragment_id(&editor, 1);
    assert!(editor.save_selection(&RawRange::new(
        RawPosition {
            container: RawContainer::Fragment(start),
            offset: 0,
        },
        RawPosition {
            container: RawContainer::Fragment(end),
            offset: 5,
        },
    )));

    editor
        .create_fragments_in_range()
        .expect("selection split into fragments");

    let fragments = &editor.document().lines[0].fragments;
    assert_eq!(fragments.len(), 2, "boundary offsets reuse both runs");
    assert!(fragments.iter().all(|fragment| !fragment.is_empty()));
}

#[test]
fn remove_selection_trims_boundary_fragments() {
    let mut editor = DocumentEditor::new(document_with_line(&[("hello world", FragmentKind::Text)]));
    let id = fragment_id(&editor, 0);
    let range = SelectionRange::new(Caret::new(id, 3), Caret::new(id, 8));

    assert!(editor.remove_selection(&range));
    assert_eq!(editor.document().lines[0].text(), "helrld");

    let selection = editor.selection().expect("caret collapsed at cut");
    assert!(selection.is_collapsed());
    assert_eq!(selection.start, Caret::new(id, 3));
}
