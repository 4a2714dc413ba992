use log::trace;
use unicode_segmentation::UnicodeSegmentation;

use crate::document::{Document, Fragment, FragmentKind, NodeId, StyleSet};

mod inspect;
mod cursor;
mod content;
mod styles;
mod structure;

pub use styles::{Instruction, StyleTarget};
pub use structure::{Attach, CreateLineOptions};

use inspect::{
    ancestor_lines, fragment_ref, indentation_index, line_ref, lines_in_range, locate_fragment,
    locate_line,
};
use structure::LineObserver;

/// Maximum list depth before indentation indices wrap around.
pub(crate) const MAX_LIST_DEPTH: usize = 3;

/// Margin adjustment applied when indenting multi-line selections.
const INDENT_MARGIN_DECLARATION: &str = "margin-left:55px";

/// Address of a line in the document tree: the index of its root line
/// followed by one child index per nesting level.
///
/// Paths compare in document order (preorder), but they go stale across
/// structural mutation; anything that must survive a reparent is cached as a
/// [`NodeId`] instead and re-resolved afterwards.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct LinePath {
    steps: Vec<usize>,
}

impl LinePath {
    pub(crate) fn new_root(idx: usize) -> Self {
        Self { steps: vec![idx] }
    }

    pub(crate) fn from_steps(steps: Vec<usize>) -> Self {
        Self { steps }
    }

    pub(crate) fn push(&mut self, idx: usize) {
        self.steps.push(idx);
    }

    pub(crate) fn steps(&self) -> &[usize] {
        &self.steps
    }

    pub(crate) fn parent(&self) -> Option<LinePath> {
        if self.steps.len() < 2 {
            return None;
        }
        Some(LinePath::from_steps(
            self.steps[..self.steps.len() - 1].to_vec(),
        ))
    }

    pub(crate) fn child_index(&self) -> usize {
        *self.steps.last().unwrap_or(&0)
    }

    pub(crate) fn is_root(&self) -> bool {
        self.steps.len() == 1
    }

    pub(crate) fn is_prefix_of(&self, other: &LinePath) -> bool {
        other.steps.len() >= self.steps.len() && other.steps[..self.steps.len()] == self.steps[..]
    }

    /// The path of the sibling at the given child index.
    pub(crate) fn sibling(&self, index: usize) -> LinePath {
        let mut steps = self.steps.clone();
        if let Some(last) = steps.last_mut() {
            *last = index;
        }
        LinePath::from_steps(steps)
    }
}

/// A logical position: a fragment plus a character offset into its text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Caret {
    pub fragment: NodeId,
    pub offset: usize,
}

impl Caret {
    pub fn new(fragment: NodeId, offset: usize) -> Self {
        Self { fragment, offset }
    }
}

/// A possibly collapsed span between two logical positions.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SelectionRange {
    pub start: Caret,
    pub end: Caret,
}

impl SelectionRange {
    pub fn new(start: Caret, end: Caret) -> Self {
        Self { start, end }
    }

    pub fn caret(at: Caret) -> Self {
        Self {
            start: at.clone(),
            end: at,
        }
    }

    pub fn is_collapsed(&self) -> bool {
        self.start == self.end
    }
}

/// Container half of a host-native position.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RawContainer {
    /// The whole document surface; positions rooted here (host "select all")
    /// are not addressable and are rejected by the bridge.
    Document,
    Line(NodeId),
    Fragment(NodeId),
}

/// A position as the host surface reports it. For a fragment container the
/// offset counts characters; for a line container it indexes the line body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawPosition {
    pub container: RawContainer,
    pub offset: usize,
}

/// A native range handed across the host boundary.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawRange {
    pub start: RawPosition,
    pub end: RawPosition,
}

impl RawRange {
    pub fn new(start: RawPosition, end: RawPosition) -> Self {
        Self { start, end }
    }

    /// A collapsed range at a single host position.
    pub fn collapsed(container: RawContainer, offset: usize) -> Self {
        let position = RawPosition { container, offset };
        Self {
            start: position.clone(),
            end: position,
        }
    }
}

/// Which nodes a formatting action applies to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FormatScope {
    /// The lines covered by the selection.
    Line,
    /// The fragments covered by the selection, splitting at its boundaries.
    Fragments,
    /// Fragments, plus lines when the selection spans more than one line or
    /// covers every fragment of the active line.
    #[default]
    Auto,
}

pub type SplitterFn = Box<dyn FnMut(&str) -> Vec<String>>;
pub type DecoratorFn = Box<dyn FnMut(&mut Fragment)>;
pub type MenuActionFn = Box<dyn FnMut(&[String], &[StyleTarget])>;
pub type AfterSelectionFn = Box<dyn FnMut(&[NodeId])>;
pub type ReturnKeyFn = Box<dyn FnMut()>;
pub type ComputedStyleFn = Box<dyn Fn(NodeId, &str) -> Option<String>>;

/// Injected strategies and flags, resolved at construction time.
pub struct EditorOptions {
    /// Splits a settled raw text run into the parts that become dedicated
    /// fragments. The default splits at word bounds.
    pub splitter: SplitterFn,
    /// Invoked on every fragment the input normalizer creates.
    pub decorator: DecoratorFn,
    /// Receives callback-instruction payloads from menu actions.
    pub on_menu_action: MenuActionFn,
    /// Receives the fragments under the selection after every saved range.
    pub after_selection: AfterSelectionFn,
    /// Invoked instead of return-key processing when `ignore_return_key`.
    pub on_return_key: ReturnKeyFn,
    /// Host computed-style query, used as the fallback value source for
    /// increment/decrement when a property is locally unset.
    pub computed_style: Option<ComputedStyleFn>,
    pub ignore_return_key: bool,
}

impl Default for EditorOptions {
    fn default() -> Self {
        Self {
            splitter: Box::new(split_at_word),
            decorator: Box::new(|_| {}),
            on_menu_action: Box::new(|_, _| {}),
            after_selection: Box::new(|_| {}),
            on_return_key: Box::new(|| {}),
            computed_style: None,
            ignore_return_key: false,
        }
    }
}

/// The default splitter: word runs and separator runs, in order.
pub fn split_at_word(text: &str) -> Vec<String> {
    text.split_word_bounds().map(str::to_string).collect()
}

/// The document controller: owns the tree, the latest known selection, the
/// continuing style, and the change-record queue, and drives the structural
/// engines in response to classified input events.
pub struct DocumentEditor {
    document: Document,
    range: Option<SelectionRange>,
    continuing_style: StyleSet,
    observer: LineObserver,
    options: EditorOptions,
}

impl DocumentEditor {
    pub fn new(document: Document) -> Self {
        Self::with_options(document, EditorOptions::default())
    }

    pub fn with_options(document: Document, options: EditorOptions) -> Self {
        let mut editor = Self {
            document,
            range: None,
            continuing_style: StyleSet::new(),
            observer: LineObserver::new(),
            options,
        };
        editor.fix_document();
        editor
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    /// The latest known selection, cached for operations that run outside a
    /// direct input event.
    pub fn selection(&self) -> Option<&SelectionRange> {
        self.range.as_ref()
    }

    /// The style carried over to text entered after the current selection.
    pub fn continuing_style(&self) -> &StyleSet {
        &self.continuing_style
    }

    /// Handle a return key press. Collapsed carets create a sibling line
    /// (splitting the current one mid-run); a selection is deleted first.
    pub fn process_return(&mut self, raw: &RawRange) -> bool {
        if self.options.ignore_return_key {
            (self.options.on_return_key)();
            return false;
        }
        let Some(range) = self.resolve_raw_range(raw) else {
            return false;
        };
        if !range.is_collapsed() {
            return self.process_delete(raw);
        }

        let caret = range.start;
        let Some((line_path, fragment_index)) = locate_fragment(&self.document, caret.fragment)
        else {
            return false;
        };
        let Some(line) = line_ref(&self.document, &line_path) else {
            return false;
        };
        let line_id = line.id;
        let line_style = line.style.clone();
        let line_list = line.list.clone();
        let fragment = &line.fragments[fragment_index];
        let last_index = line.fragments.len() - 1;
        let at_end = fragment_index == last_index
            && (caret.offset == fragment.len() || fragment.is_pilot());
        let at_start = fragment_index == 0 && (fragment.is_blank() || caret.offset == 0);

        let new_path = if at_end {
            trace!("return at end of line {line_id:?}");
            self.create_line(
                Some(&line_path),
                CreateLineOptions {
                    attach_as: Attach::NextSibling,
                    with_pilot: true,
                    focus: true,
                },
            )
        } else if at_start {
            trace!("return at start of line {line_id:?}");
            self.create_line(
                Some(&line_path),
                CreateLineOptions {
                    attach_as: Attach::PreviousSibling,
                    with_pilot: true,
                    focus: true,
                },
            )
        } else {
            self.split_line_at(&line_path, fragment_index, caret.offset)
        };

        let Some(new_path) = new_path else {
            return false;
        };
        if let Some(new_line) = inspect::line_mut(&mut self.document, &new_path) {
            new_line.style = line_style;
            new_line.list = line_list;
        }
        self.process_change_records();
        true
    }

    /// Split the line mid-run: the text after the caret moves into a
    /// dedicated fragment on a fresh next-sibling line, followed by every
    /// later fragment and all nested child lines.
    fn split_line_at(
        &mut self,
        line_path: &LinePath,
        fragment_index: usize,
        offset: usize,
    ) -> Option<LinePath> {
        let tail_text = content::split_tail_text(&mut self.document, line_path, fragment_index, offset)?;
        let mut tail = self
            .document
            .create_fragment(&tail_text, FragmentKind::Text);
        tail.style = self.continuing_style.clone();
        let tail_id = tail.id;

        let new_path = self.create_line(Some(line_path), CreateLineOptions::default())?;
        // Paths are untouched by a next-sibling insert before them.
        let (moved_fragments, moved_children) = {
            let line = inspect::line_mut(&mut self.document, line_path)?;
            let fragments = line.fragments.split_off(fragment_index + 1);
            let children = std::mem::take(&mut line.children);
            (fragments, children)
        };
        let new_line = inspect::line_mut(&mut self.document, &new_path)?;
        new_line.fragments.push(tail);
        new_line.fragments.extend(moved_fragments);
        new_line.children = moved_children;
        self.set_caret(tail_id, Some(0));
        Some(new_path)
    }

    /// Handle tab / shift-tab. Multi-line selections adjust the left margin
    /// of their ancestor lines; a caret at the start of a list line indents
    /// or outdents the list, and otherwise a literal tab is inserted.
    pub fn process_indent(&mut self, raw: &RawRange, increase: bool) -> bool {
        let Some(range) = self.resolve_raw_range(raw) else {
            return false;
        };
        let lines = lines_in_range(&self.document, &range);

        if lines.len() > 1 {
            let instruction = if increase {
                Instruction::Increment
            } else {
                Instruction::Decrement
            };
            let targets: Vec<StyleTarget> = ancestor_lines(&lines)
                .iter()
                .filter_map(|path| line_ref(&self.document, path))
                .map(|line| StyleTarget::Line(line.id))
                .collect();
            self.apply_style(
                &targets,
                instruction,
                &[INDENT_MARGIN_DECLARATION.to_string()],
            );
            self.process_change_records();
            return true;
        }

        let Some(first_line) = lines.first().cloned() else {
            return false;
        };
        let caret = range.start.clone();
        let Some((_, fragment_index)) = locate_fragment(&self.document, caret.fragment) else {
            return false;
        };
        let at_line_start = fragment_index == 0
            && fragment_ref(&self.document, &first_line, fragment_index)
                .is_some_and(|fragment| fragment.is_blank() || caret.offset == 0);
        let is_list = line_ref(&self.document, &first_line)
            .is_some_and(|line| line.list.is_list());

        let handled = if increase {
            if at_line_start && is_list && !self.is_list_head(&first_line) {
                self.indent_line_at(&first_line, None, true)
            } else {
                self.insert_tab(&caret)
            }
        } else if at_line_start && is_list {
            self.outdent_line_at(&first_line, false)
        } else {
            false
        };
        self.process_change_records();
        handled
    }

    /// Whether this line starts its list: no previous sibling line, or a
    /// first-level list line directly following a non-indented one.
    fn is_list_head(&self, path: &LinePath) -> bool {
        let idx = path.child_index();
        if idx == 0 {
            return true;
        }
        let previous = path.sibling(idx - 1);
        indentation_index(path) == 1 && indentation_index(&previous) == 0
    }

    fn insert_tab(&mut self, caret: &Caret) -> bool {
        if !content::insert_text_at(&mut self.document, caret, "\t") {
            return false;
        }
        self.set_caret(caret.fragment, Some(caret.offset + 1));
        self.process_input();
        true
    }

    /// Handle a delete key press: remove the selection contents, or the
    /// character before a collapsed caret. Emptied line bodies are repaired
    /// by the change-record cycle.
    pub fn process_delete(&mut self, raw: &RawRange) -> bool {
        let Some(range) = self.resolve_raw_range(raw) else {
            return false;
        };
        let handled = if range.is_collapsed() {
            let caret = range.start;
            if caret.offset == 0 {
                false
            } else {
                let removed = self.remove_char_before(&caret);
                if removed {
                    self.set_caret(caret.fragment, Some(caret.offset - 1));
                }
                removed
            }
        } else {
            self.remove_selection(&range)
        };
        self.process_change_records();
        handled
    }

    /// Insert host-pasted plain text at the end container of the range. A
    /// text run keeps its identity and grows; a line container receives the
    /// text as a new leading raw run.
    pub fn process_pasted_text(&mut self, raw: &RawRange, text: &str) -> bool {
        let handled = match raw.end.container {
            RawContainer::Fragment(id) => {
                let Some((path, index)) = locate_fragment(&self.document, id) else {
                    return false;
                };
                let Some(fragment) = inspect::fragment_mut(&mut self.document, &path, index)
                else {
                    return false;
                };
                fragment.text.push_str(text);
                self.set_caret(id, None);
                true
            }
            RawContainer::Line(id) => {
                let Some(path) = locate_line(&self.document, id) else {
                    return false;
                };
                let run = self.document.create_fragment(text, FragmentKind::Raw);
                let run_id = run.id;
                let Some(line) = inspect::line_mut(&mut self.document, &path) else {
                    return false;
                };
                line.fragments.insert(0, run);
                self.set_caret(run_id, None);
                true
            }
            RawContainer::Document => false,
        };
        if handled {
            self.process_input();
        }
        self.process_change_records();
        handled
    }

    /// Reflect host-typed text into the tree at the range's end position,
    /// then run input normalization on the settled run.
    pub fn insert_text(&mut self, raw: &RawRange, text: &str) -> bool {
        let Some(range) = self.resolve_raw_range(raw) else {
            return false;
        };
        let caret = range.end;
        if !content::insert_text_at(&mut self.document, &caret, text) {
            return false;
        }
        self.set_caret(caret.fragment, Some(caret.offset + text.chars().count()));
        self.process_input();
        self.process_change_records();
        true
    }

    /// Post-input normalization on the latest known caret: strip the pilot
    /// placeholder once real content arrived, then hand the settled raw run
    /// to the splitter and wrap each part in a dedicated fragment carrying
    /// the continuing style.
    pub fn process_input(&mut self) -> bool {
        let Some(range) = self.range.clone() else {
            return false;
        };
        let Some((path, index)) = locate_fragment(&self.document, range.end.fragment) else {
            return false;
        };
        let Some(fragment) = inspect::fragment_mut(&mut self.document, &path, index) else {
            return false;
        };

        if fragment.kind == FragmentKind::Pilot {
            if fragment.len() < 2 {
                return false;
            }
            fragment.text.retain(|ch| ch != crate::document::PILOT_CHAR);
            fragment.kind = FragmentKind::Raw;
            let id = fragment.id;
            self.set_caret(id, None);
        }

        let Some(fragment) = inspect::fragment_ref(&self.document, &path, index) else {
            return false;
        };
        if fragment.kind != FragmentKind::Raw || fragment.is_empty() {
            return false;
        }

        let style = self.continuing_style.clone();
        let parts = (self.options.splitter)(&fragment.text);
        let mut replacements = Vec::new();
        for part in parts.iter().filter(|part| !part.is_empty()) {
            let mut wrapped = self.document.create_fragment(part, FragmentKind::Text);
            wrapped.style = style.clone();
            (self.options.decorator)(&mut wrapped);
            replacements.push(wrapped);
        }
        if replacements.is_empty() {
            return false;
        }
        let last_id = replacements.last().map(|fragment| fragment.id);
        let Some(line) = inspect::line_mut(&mut self.document, &path) else {
            return false;
        };
        line.fragments.splice(index..=index, replacements);
        if let Some(last_id) = last_id {
            self.set_caret(last_id, None);
        }
        self.process_change_records();
        true
    }

    /// Apply formatting actions to the cached selection. Each action is an
    /// instruction plus a semicolon-separated declaration payload; the
    /// cached range is restored afterwards so the selection survives the
    /// structural churn of fragment splitting.
    pub fn format_selection(&mut self, actions: &[(Instruction, String)], scope: FormatScope) -> bool {
        if self.range.is_none() {
            return false;
        }
        let targets = self.nodes_in_selection(scope);
        let mut applied = false;
        for (instruction, payload) in actions {
            let declarations: Vec<String> = payload
                .split(';')
                .map(str::trim)
                .filter(|declaration| !declaration.is_empty())
                .map(str::to_string)
                .collect();
            if self.process_instruction(&targets, *instruction, &declarations) {
                applied = true;
            }
        }
        if let Some(saved) = self.range.clone() {
            self.restore_selection(&saved);
        }
        self.process_change_records();
        applied
    }

    /// Collect the style targets the given scope selects out of the cached
    /// range, splitting fragments at its boundaries where needed.
    fn nodes_in_selection(&mut self, scope: FormatScope) -> Vec<StyleTarget> {
        let Some(range) = self.range.clone() else {
            return Vec::new();
        };
        let line_targets = |editor: &Self, range: &SelectionRange| {
            lines_in_range(&editor.document, range)
                .iter()
                .filter_map(|path| line_ref(&editor.document, path))
                .map(|line| StyleTarget::Line(line.id))
                .collect::<Vec<_>>()
        };

        match scope {
            FormatScope::Line => line_targets(self, &range),
            FormatScope::Fragments => {
                self.create_fragments_in_range();
                let range = self.range.clone().unwrap_or(range);
                inspect::fragments_in_range(&self.document, &range)
                    .into_iter()
                    .map(StyleTarget::Fragment)
                    .collect()
            }
            FormatScope::Auto => {
                if range.is_collapsed() {
                    return Vec::new();
                }
                self.create_fragments_in_range();
                let range = self.range.clone().unwrap_or(range);
                let fragments = inspect::fragments_in_range(&self.document, &range);
                let lines = lines_in_range(&self.document, &range);
                let active_count = self
                    .active_line(&range)
                    .and_then(|path| line_ref(&self.document, &path))
                    .map(|line| {
                        line.fragments
                            .iter()
                            .filter(|fragment| fragment.is_dedicated())
                            .count()
                    })
                    .unwrap_or(0);
                let mut targets: Vec<StyleTarget> =
                    fragments.iter().copied().map(StyleTarget::Fragment).collect();
                if lines.len() > 1 || fragments.len() == active_count {
                    targets.extend(
                        lines
                            .iter()
                            .filter_map(|path| line_ref(&self.document, path))
                            .map(|line| StyleTarget::Line(line.id)),
                    );
                }
                targets
            }
        }
    }

    /// The line holding the start of the given range.
    fn active_line(&self, range: &SelectionRange) -> Option<LinePath> {
        locate_fragment(&self.document, range.start.fragment).map(|(path, _)| path)
    }

    /// Indent the given line one list level, creating an anchor when no
    /// list-initialized previous sibling exists.
    pub fn indent_list(&mut self, line: NodeId, prefix: Option<&str>, override_style: bool) -> bool {
        let Some(path) = locate_line(&self.document, line) else {
            return false;
        };
        let handled = self.indent_line_at(&path, prefix, override_style);
        self.process_change_records();
        handled
    }

    /// Outdent the given line one list level, re-splicing its trailing
    /// siblings below it in order.
    pub fn outdent_list(&mut self, line: NodeId, override_style: bool) -> bool {
        let Some(path) = locate_line(&self.document, line) else {
            return false;
        };
        let handled = self.outdent_line_at(&path, override_style);
        self.process_change_records();
        handled
    }

    /// Toggle list membership: outdent confirmed list lines, indent the
    /// rest under the given prefix.
    pub fn toggle_list(&mut self, line: NodeId, prefix: &str) -> bool {
        let Some(path) = locate_line(&self.document, line) else {
            return false;
        };
        let handled = self.toggle_list_at(&path, prefix);
        self.process_change_records();
        handled
    }
}

#[cfg(test)]
#[path = "editor_tests.rs"]
mod editor_tests;


#[cfg(test)]
#[path = "editor/content_tests.rs"]
mod content_tests;

#[cfg(test)]
#[path = "editor/style_tests.rs"]
mod style_tests;
