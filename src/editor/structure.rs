use log::trace;

use super::inspect::{indentation_index, line_mut, line_ref, list_prefix, locate_line};
use super::{DocumentEditor, LinePath};
use crate::document::{Document, Line, ListRole, NodeId};

// ============================================================================
// Change observation
// ============================================================================

/// One content-change notification scoped to a line body.
#[derive(Clone, Debug)]
pub(crate) struct ChangeRecord {
    pub(crate) line: NodeId,
    pub(crate) removed: usize,
    pub(crate) remaining: usize,
}

/// Collects change records from the mutation primitives. Paused while the
/// lifecycle manager performs its own repair edits; re-entrant records from
/// a repair would otherwise keep the cycle alive forever.
#[derive(Debug, Default)]
pub(crate) struct LineObserver {
    paused: usize,
    pending: Vec<ChangeRecord>,
}

impl LineObserver {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn pause(&mut self) {
        self.paused += 1;
    }

    pub(crate) fn resume(&mut self) {
        self.paused = self.paused.saturating_sub(1);
    }

    pub(crate) fn record_removal(&mut self, line: NodeId, removed: usize, remaining: usize) {
        if self.paused == 0 && removed > 0 {
            self.pending.push(ChangeRecord {
                line,
                removed,
                remaining,
            });
        }
    }

    pub(crate) fn drain(&mut self) -> Vec<ChangeRecord> {
        std::mem::take(&mut self.pending)
    }
}

// ============================================================================
// Line lifecycle
// ============================================================================

/// Where a new line attaches relative to its reference line.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Attach {
    Child,
    #[default]
    NextSibling,
    PreviousSibling,
}

#[derive(Clone, Debug, Default)]
pub struct CreateLineOptions {
    pub attach_as: Attach,
    pub with_pilot: bool,
    pub focus: bool,
}

pub(crate) fn take_line_at(document: &mut Document, path: &LinePath) -> Option<Line> {
    let idx = path.child_index();
    match path.parent() {
        None => {
            if idx < document.lines.len() {
                Some(document.lines.remove(idx))
            } else {
                None
            }
        }
        Some(parent_path) => {
            let parent = line_mut(document, &parent_path)?;
            if idx < parent.children.len() {
                Some(parent.children.remove(idx))
            } else {
                None
            }
        }
    }
}

pub(crate) fn insert_line_at(
    document: &mut Document,
    parent: Option<&LinePath>,
    index: usize,
    line: Line,
) -> Option<LinePath> {
    match parent {
        None => {
            let index = index.min(document.lines.len());
            document.lines.insert(index, line);
            Some(LinePath::new_root(index))
        }
        Some(parent_path) => {
            let parent = line_mut(document, parent_path)?;
            let index = index.min(parent.children.len());
            parent.children.insert(index, line);
            let mut path = parent_path.clone();
            path.push(index);
            Some(path)
        }
    }
}

impl DocumentEditor {
    /// Run a repair edit with the observer disconnected, reconnecting
    /// afterwards. Mandatory protocol around any mutation the change handler
    /// itself performs.
    pub(crate) fn with_observer_paused<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        self.observer.pause();
        let result = f(self);
        self.observer.resume();
        result
    }

    /// Build a new line with an empty body and attach it relative to the
    /// reference line (or as a root line when there is none). With
    /// `with_pilot` the body receives a pilot fragment, optionally focused.
    pub fn create_line(
        &mut self,
        reference: Option<&LinePath>,
        options: CreateLineOptions,
    ) -> Option<LinePath> {
        let line = self.document.create_line();
        let path = match reference {
            None => {
                self.document.lines.push(line);
                LinePath::new_root(self.document.lines.len() - 1)
            }
            Some(ref_path) => match options.attach_as {
                Attach::Child => {
                    let parent = line_mut(&mut self.document, ref_path)?;
                    parent.children.push(line);
                    let mut path = ref_path.clone();
                    path.push(parent.children.len() - 1);
                    path
                }
                Attach::NextSibling => insert_line_at(
                    &mut self.document,
                    ref_path.parent().as_ref(),
                    ref_path.child_index() + 1,
                    line,
                )?,
                Attach::PreviousSibling => insert_line_at(
                    &mut self.document,
                    ref_path.parent().as_ref(),
                    ref_path.child_index(),
                    line,
                )?,
            },
        };
        if options.with_pilot {
            self.renew_line_body(&path, options.focus);
        }
        Some(path)
    }

    /// Clear a line body and inject a fresh pilot fragment so the line stays
    /// focusable. Nested child lines are untouched.
    pub(crate) fn renew_line_body(&mut self, path: &LinePath, focus: bool) {
        self.with_observer_paused(|editor| {
            let pilot = editor.document.create_pilot_fragment();
            let pilot_id = pilot.id;
            let Some(line) = line_mut(&mut editor.document, path) else {
                return;
            };
            line.fragments.clear();
            line.fragments.push(pilot);
            if focus {
                editor.set_caret(pilot_id, Some(0));
            }
        });
    }

    /// Drain and process pending change records: any removal that left a
    /// line body empty re-pilots that body. Runs to quiescence before any
    /// caller reads document state again.
    pub(crate) fn process_change_records(&mut self) {
        loop {
            let records = self.observer.drain();
            if records.is_empty() {
                break;
            }
            for record in records {
                if record.remaining != 0 {
                    continue;
                }
                let Some(path) = locate_line(&self.document, record.line) else {
                    // The line vanished between the mutation and the drain.
                    continue;
                };
                let still_empty = line_ref(&self.document, &path)
                    .is_some_and(|line| line.body_len() == 0);
                if still_empty {
                    trace!("re-piloting emptied line {:?}", record.line);
                    self.renew_line_body(&path, false);
                }
            }
        }
    }

    /// Ensure the document has at least one root line; the only entry point
    /// that observes document-level emptiness.
    pub fn fix_document(&mut self) -> bool {
        if !self.document.is_empty() {
            return false;
        }
        trace!("document has no lines; creating one");
        self.create_line(
            None,
            CreateLineOptions {
                attach_as: Attach::Child,
                with_pilot: true,
                focus: true,
            },
        )
        .is_some()
    }
}

// ============================================================================
// List engine
// ============================================================================

impl DocumentEditor {
    /// Indent one list level. Lines whose list role only needs confirming
    /// are relabeled in place; everything else is reparented under the
    /// previous sibling, creating a fresh anchor when that sibling is not
    /// list-initialized. The target's own child lines are promoted to be its
    /// next siblings so indentation never implicitly nests further.
    pub(crate) fn indent_line_at(
        &mut self,
        path: &LinePath,
        prefix: Option<&str>,
        override_style: bool,
    ) -> bool {
        let Some(line) = line_ref(&self.document, path) else {
            return false;
        };
        let line_id = line.id;
        let prefix = match prefix {
            Some(prefix) => prefix.to_string(),
            None => list_prefix(&self.document, path),
        };
        let saved = self.range.clone();

        let relabel = line.list.is_blank() || (!path.is_root() && line.list.is_root());
        if relabel {
            self.update_list(path, &prefix, indentation_index(path), override_style);
        } else {
            let idx = path.child_index();
            let parent = path.parent();

            let previous = if idx > 0 {
                Some(path.sibling(idx - 1))
            } else {
                None
            };
            let previous_is_list = previous
                .as_ref()
                .and_then(|p| line_ref(&self.document, p))
                .is_some_and(|line| line.list.is_list());

            let (anchor_path, target_path) = if previous_is_list {
                (previous.unwrap_or_else(|| path.clone()), path.clone())
            } else {
                let anchor = self.document.create_line();
                let Some(anchor_path) =
                    insert_line_at(&mut self.document, parent.as_ref(), idx, anchor)
                else {
                    return false;
                };
                self.init_list(&anchor_path, Some(ListRole::Anchor));
                (anchor_path, path.sibling(idx + 1))
            };

            let Some(mut target) = take_line_at(&mut self.document, &target_path) else {
                return false;
            };
            let promoted = std::mem::take(&mut target.children);
            let Some(anchor) = line_mut(&mut self.document, &anchor_path) else {
                return false;
            };
            anchor.children.push(target);
            let new_index = anchor.children.len() - 1;
            for (offset, child) in promoted.into_iter().enumerate() {
                anchor.children.insert(new_index + 1 + offset, child);
            }

            let mut new_path = anchor_path.clone();
            new_path.push(new_index);
            self.update_list(&new_path, &prefix, indentation_index(&new_path), override_style);
        }

        if let Some(saved) = saved {
            self.restore_selection(&saved);
        }
        trace!("indented line {line_id:?} under prefix {prefix:?}");
        true
    }

    /// Outdent one list level: the target moves out to directly follow its
    /// former parent, its own children stay behind wrapped in a fresh
    /// anchor, and its trailing siblings follow it down in order. A former
    /// parent left with neither fragments nor children is removed.
    pub(crate) fn outdent_line_at(&mut self, path: &LinePath, override_style: bool) -> bool {
        let Some(line) = line_ref(&self.document, path) else {
            return false;
        };
        if !line.list.is_list() {
            return false;
        }
        let Some(parent_path) = path.parent() else {
            // Already at the document surface.
            return false;
        };
        let line_id = line.id;
        let saved = self.range.clone();
        let prefix = list_prefix(&self.document, path);

        let idx = path.child_index();
        let Some(mut target) = take_line_at(&mut self.document, path) else {
            return false;
        };

        if !target.children.is_empty() {
            let mut anchor = self.document.create_line();
            anchor.list = ListRole::Anchor;
            anchor.children = std::mem::take(&mut target.children);
            target.children.push(anchor);
        }

        {
            let Some(parent) = line_mut(&mut self.document, &parent_path) else {
                return false;
            };
            let trailing: Vec<Line> = parent.children.drain(idx..).collect();
            target.children.extend(trailing);
        }

        let parent_index = parent_path.child_index();
        let grand = parent_path.parent();
        let Some(new_path) = insert_line_at(
            &mut self.document,
            grand.as_ref(),
            parent_index + 1,
            target,
        ) else {
            return false;
        };

        let indent_index = indentation_index(&parent_path);
        self.update_list(&new_path, &prefix, indent_index, override_style);

        let parent_emptied = line_ref(&self.document, &parent_path)
            .is_some_and(|parent| parent.fragments.is_empty() && parent.children.is_empty());
        if parent_emptied {
            take_line_at(&mut self.document, &parent_path);
            trace!("removed list parent emptied by outdent");
        }

        if let Some(saved) = saved {
            self.restore_selection(&saved);
        }
        trace!("outdented line {line_id:?}");
        true
    }

    /// Toggle list membership: confirmed list lines outdent, everything
    /// else indents under the given prefix.
    pub(crate) fn toggle_list_at(&mut self, path: &LinePath, prefix: &str) -> bool {
        let Some(line) = line_ref(&self.document, path) else {
            return false;
        };
        if line.list.is_list() && !line.list.is_blank() {
            self.outdent_line_at(path, false)
        } else {
            self.indent_line_at(path, Some(prefix), true)
        }
    }

    /// Refresh a line's list tagging for its current position: root lines
    /// become list roots, everything else gets counters and a style class.
    pub(crate) fn update_list(
        &mut self,
        path: &LinePath,
        prefix: &str,
        index: usize,
        override_style: bool,
    ) {
        if self.init_list(path, None) {
            return;
        }
        self.set_list_counter(path, prefix, index);
        self.set_list_style(path, prefix, index, override_style);
    }

    /// Mark a root-positioned line as a list root. Non-root lines receive
    /// the given role, when there is one. Returns whether the root marking
    /// applied.
    fn init_list(&mut self, path: &LinePath, role: Option<ListRole>) -> bool {
        if path.is_root() {
            if let Some(line) = line_mut(&mut self.document, path) {
                line.list = ListRole::Root;
            }
            return true;
        }
        if let Some(role) = role
            && let Some(line) = line_mut(&mut self.document, path)
        {
            line.list = role;
        }
        false
    }

    fn set_list_style(
        &mut self,
        path: &LinePath,
        prefix: &str,
        index: usize,
        override_style: bool,
    ) {
        let Some(line) = line_mut(&mut self.document, path) else {
            return;
        };
        if index == 0 {
            line.list = ListRole::Root;
        } else if !prefix.is_empty()
            && (override_style || (!line.list.is_blank() && !line.list.is_anchor()))
        {
            line.list = ListRole::Item {
                prefix: prefix.to_string(),
                index,
            };
        }
    }

    /// Maintain the CSS counters the host renders list numbering with: the
    /// parent resets this level's counter, the line resets the next level's.
    fn set_list_counter(&mut self, path: &LinePath, prefix: &str, index: usize) {
        if index > 0
            && let Some(parent_path) = path.parent()
            && let Some(parent) = line_mut(&mut self.document, &parent_path)
        {
            parent
                .style
                .set("counter-reset", &format!("{prefix}-counter-{index}"));
        }
        if let Some(line) = line_mut(&mut self.document, path) {
            line.style
                .set("counter-reset", &format!("{prefix}-counter-{}", index + 1));
        }
    }
}
