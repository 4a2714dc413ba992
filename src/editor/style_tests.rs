use super::styles::extract_amount;
use super::*;
use crate::document::{Document, FragmentKind};

fn document_with_lines(texts: &[&str]) -> Document {
    let mut document = Document::new();
    for text in texts {
        let fragment = document.create_fragment(text, FragmentKind::Text);
        let mut line = document.create_line();
        line.fragments.push(fragment);
        document.lines.push(line);
    }
    document
}

fn line_target(editor: &DocumentEditor, line: usize) -> StyleTarget {
    StyleTarget::Line(editor.document().lines[line].id)
}

fn line_style<'a>(editor: &'a DocumentEditor, line: usize) -> &'a crate::document::StyleSet {
    &editor.document().lines[line].style
}

fn declarations(payload: &str) -> Vec<String> {
    payload.split(';').map(|d| d.trim().to_string()).collect()
}

#[test]
fn set_always_writes_and_unset_always_removes() {
    let mut editor = DocumentEditor::new(document_with_lines(&["Hello"]));
    let target = line_target(&editor, 0);

    assert!(editor.apply_style(&[target], Instruction::Set, &declarations("color: red")));
    assert_eq!(line_style(&editor, 0).get("color"), Some("red"));

    assert!(editor.apply_style(&[target], Instruction::Set, &declarations("color: blue")));
    assert_eq!(line_style(&editor, 0).get("color"), Some("blue"));

    assert!(editor.apply_style(&[target], Instruction::Unset, &declarations("color: blue")));
    assert_eq!(line_style(&editor, 0).get("color"), None);
}

#[test]
fn toggle_twice_returns_to_original_state() {
    let mut editor = DocumentEditor::new(document_with_lines(&["Hello"]));
    let target = line_target(&editor, 0);
    let payload = declarations("font-weight: bold");

    assert!(editor.apply_style(&[target], Instruction::Toggle, &payload));
    assert_eq!(line_style(&editor, 0).get("font-weight"), Some("bold"));
    assert!(editor.apply_style(&[target], Instruction::Toggle, &payload));
    assert_eq!(line_style(&editor, 0).get("font-weight"), None);

    // Starting from a set property, two toggles land on set again.
    assert!(editor.apply_style(&[target], Instruction::Set, &payload));
    assert!(editor.apply_style(&[target], Instruction::Toggle, &payload));
    assert!(editor.apply_style(&[target], Instruction::Toggle, &payload));
    assert_eq!(line_style(&editor, 0).get("font-weight"), Some("bold"));
}

#[test]
fn initialize_only_writes_when_absent() {
    let mut editor = DocumentEditor::new(document_with_lines(&["Hello"]));
    let target = line_target(&editor, 0);

    assert!(editor.apply_style(&[target], Instruction::Initialize, &declarations("color: red")));
    assert!(!editor.apply_style(&[target], Instruction::Initialize, &declarations("color: blue")));
    assert_eq!(line_style(&editor, 0).get("color"), Some("red"));
}

#[test]
fn increment_falls_back_to_computed_value() {
    let options = EditorOptions {
        computed_style: Some(Box::new(|_, property| {
            (property == "margin-left").then(|| "40px".to_string())
        })),
        ..EditorOptions::default()
    };
    let mut editor = DocumentEditor::with_options(document_with_lines(&["Hello"]), options);
    let target = line_target(&editor, 0);

    assert!(editor.apply_style(
        &[target],
        Instruction::Increment,
        &declarations("margin-left: 15px"),
    ));
    assert_eq!(line_style(&editor, 0).get("margin-left"), Some("55px"));
}

#[test]
fn decrement_below_zero_removes_the_property() {
    let mut editor = DocumentEditor::new(document_with_lines(&["Hello"]));
    let target = line_target(&editor, 0);

    assert!(editor.apply_style(&[target], Instruction::Set, &declarations("margin-left: 40px")));
    assert!(editor.apply_style(
        &[target],
        Instruction::Decrement,
        &declarations("margin-left: 60px"),
    ));
    assert_eq!(line_style(&editor, 0).get("margin-left"), None);
}

#[test]
fn missing_magnitude_defaults_to_zero() {
    let mut editor = DocumentEditor::new(document_with_lines(&["Hello"]));
    let target = line_target(&editor, 0);

    assert!(editor.apply_style(&[target], Instruction::Set, &declarations("margin-left: 40px")));
    assert!(editor.apply_style(
        &[target],
        Instruction::Increment,
        &declarations("margin-left: wide"),
    ));
    assert_eq!(line_style(&editor, 0).get("margin-left"), Some("40px"));
}

#[test]
fn extract_amount_parses_leading_magnitudes() {
    assert_eq!(extract_amount("55px"), 55);
    assert_eq!(extract_amount("-10px"), -10);
    assert_eq!(extract_amount("+2.75em"), 2);
    assert_eq!(extract_amount(".5em"), 0);
    assert_eq!(extract_amount("bold"), 0);
    assert_eq!(extract_amount(""), 0);
}

#[test]
fn declarations_apply_in_order() {
    let mut editor = DocumentEditor::new(document_with_lines(&["Hello"]));
    let target = line_target(&editor, 0);

    assert!(editor.apply_style(
        &[target],
        Instruction::Increment,
        &declarations("margin-left: 10px; margin-left: 5px"),
    ));
    assert_eq!(line_style(&editor, 0).get("margin-left"), Some("15px"));
}

#[test]
fn command_clear_strips_all_styling() {
    let mut editor = DocumentEditor::new(document_with_lines(&["Hello"]));
    let target = line_target(&editor, 0);

    assert!(editor.apply_style(&[target], Instruction::Set, &declarations("color: red")));
    assert!(editor.apply_command(&[target], &["clear".to_string()]));
    assert!(line_style(&editor, 0).is_empty());
}

#[test]
fn command_list_keyword_toggles_a_list() {
    let mut editor = DocumentEditor::new(document_with_lines(&["First", "Second"]));
    let target = line_target(&editor, 1);

    assert!(editor.apply_command(&[target], &["list todo".to_string()]));
    let document = editor.document();
    assert_eq!(
        document.lines[1].children[0].list_class().as_deref(),
        Some("todo-list-1")
    );
}

#[test]
fn command_list_outdent_resolves_fragment_targets_to_lines() {
    let mut editor = DocumentEditor::new(document_with_lines(&["First", "Second"]));
    let line = editor.document().lines[1].id;
    assert!(editor.indent_list(line, Some("todo"), true));

    let fragment = editor.document().lines[1].children[0].fragments[0].id;
    assert!(editor.apply_command(&[StyleTarget::Fragment(fragment)], &["list outdent".to_string()]));
    assert_eq!(editor.document().lines.len(), 2);
    assert_eq!(editor.document().lines[1].id, line);
}

#[test]
fn format_scope_line_targets_only_lines() {
    let mut editor = DocumentEditor::new(document_with_lines(&["Hello world"]));
    let id = editor.document().lines[0].fragments[0].id;
    assert!(editor.save_selection(&RawRange::new(
        RawPosition {
            container: RawContainer::Fragment(id),
            offset: 2,
        },
        RawPosition {
            container: RawContainer::Fragment(id),
            offset: 7,
        },
    )));

    assert!(editor.format_selection(
        &[(Instruction::Set, "margin-left: 10px".to_string())],
        FormatScope::Line,
    ));

    assert_eq!(line_style(&editor, 0).get("margin-left"), Some("10px"));
    let fragments = &editor.document().lines[0].fragments;
    assert_eq!(fragments.len(), 1, "line scope never splits fragments");
    assert_eq!(fragments[0].style.get("margin-left"), None);
}

#[test]
fn format_fragments_scope_splits_and_styles_the_selection() {
    let mut editor = DocumentEditor::new(document_with_lines(&["hello world"]));
    let id = editor.document().lines[0].fragments[0].id;
    assert!(editor.save_selection(&RawRange::new(
        RawPosition {
            container: RawContainer::Fragment(id),
            offset: 2,
        },
        RawPosition {
            container: RawContainer::Fragment(id),
            offset: 7,
        },
    )));

    assert!(editor.format_selection(
        &[(Instruction::Set, "font-style: italic".to_string())],
        FormatScope::Fragments,
    ));

    let fragments = &editor.document().lines[0].fragments;
    assert_eq!(fragments.len(), 3);
    assert_eq!(fragments[1].text, "llo w");
    assert_eq!(fragments[1].style.get("font-style"), Some("italic"));
    assert_eq!(fragments[0].style.get("font-style"), None);
    assert_eq!(fragments[2].style.get("font-style"), None);
    assert_eq!(line_style(&editor, 0).get("font-style"), None);

    let selection = editor.selection().expect("selection restored");
    assert_eq!(selection.start.fragment, fragments[1].id);
    assert_eq!(selection.end.offset, 5);
}

#[test]
fn format_auto_scope_adds_lines_when_covering_the_active_line() {
    let mut editor = DocumentEditor::new(document_with_lines(&["hello"]));
    let id = editor.document().lines[0].fragments[0].id;
    assert!(editor.save_selection(&RawRange::new(
        RawPosition {
            container: RawContainer::Fragment(id),
            offset: 0,
        },
        RawPosition {
            container: RawContainer::Fragment(id),
            offset: 5,
        },
    )));

    assert!(editor.format_selection(
        &[(Instruction::Set, "color: red".to_string())],
        FormatScope::Auto,
    ));

    assert_eq!(line_style(&editor, 0).get("color"), Some("red"));
    assert_eq!(
        editor.document().lines[0].fragments[0].style.get("color"),
        Some("red")
    );
}

#[test]
fn format_auto_scope_skips_lines_on_partial_coverage() {
    let mut editor = DocumentEditor::new(document_with_lines(&["hello world"]));
    let id = editor.document().lines[0].fragments[0].id;
    assert!(editor.save_selection(&RawRange::new(
        RawPosition {
            container: RawContainer::Fragment(id),
            offset: 2,
        },
        RawPosition {
            container: RawContainer::Fragment(id),
            offset: 7,
        },
    )));

    assert!(editor.format_selection(
        &[(Instruction::Set, "color: red".to_string())],
        FormatScope::Auto,
    ));

    assert_eq!(line_style(&editor, 0).get("color"), None);
    let styled: Vec<bool> = editor.document().lines[0]
        .fragments
        .iter()
        .map(|fragment| fragment.style.get("color").is_some())
        .collect();
    assert_eq!(styled, vec![false, true, false]);
}

#[test]
fn format_with_collapsed_auto_scope_is_a_noop() {
    let mut editor = DocumentEditor::new(document_with_lines(&["hello"]));
    let id = editor.document().lines[0].fragments[0].id;
    assert!(editor.save_selection(&RawRange::collapsed(RawContainer::Fragment(id), 2)));

    assert!(!editor.format_selection(
        &[(Instruction::Set, "color: red".to_string())],
        FormatScope::Auto,
    ));
    assert_eq!(line_style(&editor, 0).get("color"), None);
}

#[test]
fn callback_instruction_reaches_the_menu_strategy() {
    use std::cell::RefCell;
    use std::rc::Rc;

    let seen: Rc<RefCell<Vec<String>>> = Rc::new(RefCell::new(Vec::new()));
    let sink = seen.clone();
    let options = EditorOptions {
        on_menu_action: Box::new(move |declarations, _| {
            *sink.borrow_mut() = declarations.to_vec();
        }),
        ..EditorOptions::default()
    };
    let mut editor = DocumentEditor::with_options(document_with_lines(&["hello"]), options);
    let id = editor.document().lines[0].fragments[0].id;
    assert!(editor.save_selection(&RawRange::new(
        RawPosition {
            container: RawContainer::Fragment(id),
            offset: 0,
        },
        RawPosition {
            container: RawContainer::Fragment(id),
            offset: 5,
        },
    )));

    assert!(editor.format_selection(
        &[(Instruction::Callback, "insert-note".to_string())],
        FormatScope::Auto,
    ));
    assert_eq!(seen.borrow().as_slice(), &["insert-note".to_string()]);
}

#[test]
fn instruction_keys_resolve() {
    assert_eq!(Instruction::from_key("set"), Some(Instruction::Set));
    assert_eq!(Instruction::from_key("toggle"), Some(Instruction::Toggle));
    assert_eq!(Instruction::from_key("command"), Some(Instruction::Command));
    assert_eq!(Instruction::from_key("bogus"), None);
}
