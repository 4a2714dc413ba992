use log::trace;

use super::inspect::{
    caret_position, fragment_positions, fragment_ref, line_mut, line_ref, locate_fragment,
};
use super::{Caret, DocumentEditor, LinePath, SelectionRange};
use crate::document::{Document, Fragment, FragmentKind, ListRole, NodeId};

pub(crate) fn char_to_byte_idx(text: &str, char_idx: usize) -> usize {
    if char_idx == 0 {
        return 0;
    }
    for (count, (byte_idx, _)) in text.char_indices().enumerate() {
        if count == char_idx {
            return byte_idx;
        }
    }
    text.len()
}

pub(crate) fn split_text(text: &str, offset: usize) -> (String, String) {
    let byte_idx = char_to_byte_idx(text, offset);
    (text[..byte_idx].to_string(), text[byte_idx..].to_string())
}

/// Insert text into the caret's fragment at its character offset. Additions
/// never trigger the self-healing cycle, so no change record is taken.
pub(crate) fn insert_text_at(document: &mut Document, caret: &Caret, text: &str) -> bool {
    let Some((path, index)) = locate_fragment(document, caret.fragment) else {
        return false;
    };
    let Some(line) = line_mut(document, &path) else {
        return false;
    };
    let Some(fragment) = line.fragments.get_mut(index) else {
        return false;
    };
    let char_len = fragment.len();
    let byte_idx = char_to_byte_idx(&fragment.text, caret.offset.min(char_len));
    fragment.text.insert_str(byte_idx, text);
    true
}

/// Truncate the fragment at the given character offset and hand back the
/// text after it. An empty remainder is padded with the pilot placeholder so
/// the receiving line is never created without content.
pub(crate) fn split_tail_text(
    document: &mut Document,
    path: &LinePath,
    index: usize,
    offset: usize,
) -> Option<String> {
    let line = line_mut(document, path)?;
    let fragment = line.fragments.get_mut(index)?;
    let (head, tail) = split_text(&fragment.text, offset.min(fragment.len()));
    fragment.text = head;
    if tail.is_empty() {
        Some(crate::document::PILOT_CHAR.to_string())
    } else {
        Some(tail)
    }
}

impl DocumentEditor {
    /// Remove the character before the caret. The emptied fragment, if any,
    /// is dropped from the body, and the removal is recorded for the
    /// lifecycle manager.
    pub(crate) fn remove_char_before(&mut self, caret: &Caret) -> bool {
        let Some((path, index)) = locate_fragment(&self.document, caret.fragment) else {
            return false;
        };
        let Some(line) = line_mut(&mut self.document, &path) else {
            return false;
        };
        let line_id = line.id;
        let Some(fragment) = line.fragments.get_mut(index) else {
            return false;
        };
        let char_len = fragment.len();
        if caret.offset == 0 || caret.offset > char_len {
            return false;
        }
        let start = char_to_byte_idx(&fragment.text, caret.offset - 1);
        let end = char_to_byte_idx(&fragment.text, caret.offset);
        fragment.text.drain(start..end);
        if fragment.is_empty() {
            line.fragments.remove(index);
        }
        let remaining = line.body_len();
        self.observer.record_removal(line_id, 1, remaining);
        true
    }

    /// Remove everything the selection covers. Fragments fully inside the
    /// span are dropped; boundary fragments are trimmed. Emptied line bodies
    /// are left to the change-record cycle, which re-pilots them.
    pub(crate) fn remove_selection(&mut self, range: &SelectionRange) -> bool {
        let Some(sel_start) = caret_position(&self.document, &range.start) else {
            return false;
        };
        let Some(sel_end) = caret_position(&self.document, &range.end) else {
            return false;
        };
        let (sel_start, sel_end) = (sel_start.min(sel_end), sel_start.max(sel_end));
        if sel_start == sel_end {
            return false;
        }

        let start_line_id = locate_fragment(&self.document, range.start.fragment)
            .and_then(|(path, _)| line_ref(&self.document, &path))
            .map(|line| line.id);

        struct Edit {
            line: LinePath,
            index: usize,
            from: usize,
            to: usize,
        }
        let mut edits = Vec::new();
        for entry in fragment_positions(&self.document) {
            let end = entry.start + entry.len;
            let from = sel_start.max(entry.start);
            let to = sel_end.min(end);
            if from < to {
                edits.push(Edit {
                    line: entry.line,
                    index: entry.index,
                    from: from - entry.start,
                    to: to - entry.start,
                });
            }
        }
        if edits.is_empty() {
            return false;
        }

        // Apply in reverse document order so body indices stay valid.
        let mut touched: Vec<NodeId> = Vec::new();
        for edit in edits.iter().rev() {
            let Some(line) = line_mut(&mut self.document, &edit.line) else {
                continue;
            };
            let line_id = line.id;
            let Some(fragment) = line.fragments.get_mut(edit.index) else {
                continue;
            };
            let removed = edit.to - edit.from;
            if edit.from == 0 && edit.to == fragment.len() {
                line.fragments.remove(edit.index);
            } else {
                let from = char_to_byte_idx(&fragment.text, edit.from);
                let to = char_to_byte_idx(&fragment.text, edit.to);
                fragment.text.drain(from..to);
            }
            let remaining = line.body_len();
            self.observer.record_removal(line_id, removed, remaining);
            if remaining == 0
                && let Some(line) = line_mut(&mut self.document, &edit.line)
                && matches!(line.list, ListRole::Item { .. })
            {
                // The list role is no longer confirmed by any content; a
                // later indent will relabel instead of reparenting.
                line.list = ListRole::Blank;
            }
            if !touched.contains(&line_id) {
                touched.push(line_id);
            }
        }
        trace!("removed selection across {} line(s)", touched.len());

        self.process_change_records();
        if self.caret_is_valid(&range.start) {
            self.range = Some(SelectionRange::caret(range.start.clone()));
        } else if let Some(line_id) = start_line_id {
            self.set_caret(line_id, Some(0));
        }
        true
    }

    /// Split a text run at the given character offset, producing a dedicated
    /// fragment without ever leaving an empty one behind.
    ///
    /// A boundary offset (0 or the run's full length) reuses the run when it
    /// is already a dedicated fragment, and otherwise claims it in place, so
    /// repeated formatting never makes the fragment count drift. An interior
    /// offset truncates the run and inserts the remainder after it; the new
    /// fragment inherits the source's declarations when the source was
    /// dedicated, else the continuing style. Returns the body index of the
    /// fragment that starts at the boundary.
    pub(crate) fn fragment_text(
        &mut self,
        path: &LinePath,
        index: usize,
        offset: usize,
    ) -> Option<usize> {
        let fragment = fragment_ref(&self.document, path, index)?;
        let len = fragment.len();
        let offset = offset.min(len);

        if offset == 0 || offset == len {
            if fragment.is_dedicated() {
                return Some(index);
            }
            let continuing = self.continuing_style.clone();
            let line = line_mut(&mut self.document, path)?;
            let fragment = line.fragments.get_mut(index)?;
            fragment.kind = FragmentKind::Text;
            fragment.style = continuing;
            return Some(index);
        }

        let source_style = if fragment.is_dedicated() {
            fragment.style.clone()
        } else {
            self.continuing_style.clone()
        };
        let id = self.document.ids.next();
        let line = line_mut(&mut self.document, path)?;
        let fragment = line.fragments.get_mut(index)?;
        let (head, tail) = split_text(&fragment.text, offset);
        fragment.text = head;
        line.fragments.insert(
            index + 1,
            Fragment {
                id,
                text: tail,
                style: source_style,
                kind: FragmentKind::Text,
            },
        );
        Some(index + 1)
    }

    /// Split the cached selection's boundaries into dedicated fragments and
    /// wrap every raw run strictly between them, then re-derive the cached
    /// selection to span from offset 0 of the first new fragment to the full
    /// length of the last. Returns the boundary fragment ids.
    pub(crate) fn create_fragments_in_range(&mut self) -> Option<(NodeId, NodeId)> {
        let range = self.range.clone()?;
        if range.is_collapsed() {
            return None;
        }

        let (start_path, start_index) = locate_fragment(&self.document, range.start.fragment)?;
        let start_offset = range.start.offset;
        let same_run = range.end.fragment == range.start.fragment;

        let first_index = self.fragment_text(&start_path, start_index, start_offset)?;
        let first_id = fragment_ref(&self.document, &start_path, first_index)?.id;

        // Splitting the start shifts the end's coordinates when both
        // boundaries fall in the same original run.
        let (last_path, last_index) = if same_run {
            let adjusted = range.end.offset.saturating_sub(start_offset);
            self.fragment_text(&start_path, first_index, adjusted)?;
            (start_path.clone(), first_index)
        } else {
            let (end_path, end_index) = locate_fragment(&self.document, range.end.fragment)?;
            self.fragment_text(&end_path, end_index, range.end.offset)?;
            (end_path, end_index)
        };
        let last_id = fragment_ref(&self.document, &last_path, last_index)?.id;

        // Sweep raw runs strictly between the two boundaries.
        let positions = fragment_positions(&self.document);
        let first_start = positions.iter().find(|p| p.id == first_id)?.start;
        let last_entry = positions.iter().find(|p| p.id == last_id)?;
        let last_end = last_entry.start + last_entry.len;
        let between: Vec<(LinePath, usize)> = positions
            .iter()
            .filter(|p| p.id != first_id && p.id != last_id)
            .filter(|p| p.start >= first_start && p.start + p.len <= last_end)
            .map(|p| (p.line.clone(), p.index))
            .collect();
        for (path, index) in between {
            let is_raw = fragment_ref(&self.document, &path, index)
                .is_some_and(|fragment| fragment.kind == FragmentKind::Raw);
            if is_raw {
                self.fragment_text(&path, index, 0);
            }
        }

        let last_len = fragment_ref(&self.document, &last_path, last_index)?.len();
        self.range = Some(SelectionRange::new(
            Caret::new(first_id, 0),
            Caret::new(last_id, last_len),
        ));
        Some((first_id, last_id))
    }
}
