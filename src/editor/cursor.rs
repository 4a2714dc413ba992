use log::trace;

use super::inspect::{
    caret_position, fragment_ref, fragments_in_range, line_ref, locate_fragment, locate_line,
};
use super::{Caret, DocumentEditor, RawContainer, RawPosition, RawRange, SelectionRange};
use crate::document::NodeId;

impl DocumentEditor {
    /// Capture a host-native range as the latest known selection.
    ///
    /// Ranges rooted at the whole-document container (host "select all") are
    /// not addressable; they are rejected and the previously cached range
    /// stays intact. On success the continuing style is refreshed from the
    /// last fragment under the selection and the `after_selection` strategy
    /// is invoked with the fragments in range.
    pub fn save_selection(&mut self, raw: &RawRange) -> bool {
        let Some(range) = self.resolve_raw_range(raw) else {
            trace!("rejected unaddressable selection");
            return false;
        };
        self.range = Some(range.clone());

        let fragments = fragments_in_range(&self.document, &range);
        if let Some(last) = fragments.last()
            && let Some((path, index)) = locate_fragment(&self.document, *last)
            && let Some(fragment) = fragment_ref(&self.document, &path, index)
        {
            self.continuing_style = fragment.style.clone();
        }
        (self.options.after_selection)(&fragments);
        true
    }

    /// Re-apply a previously captured logical range. A caret whose fragment
    /// vanished or whose offset no longer fits fails the whole restore
    /// silently; the cached range is left untouched. Recoverable, not fatal.
    pub fn restore_selection(&mut self, saved: &SelectionRange) -> bool {
        if !self.caret_is_valid(&saved.start) || !self.caret_is_valid(&saved.end) {
            trace!("skipping restore of stale selection");
            return false;
        }
        self.range = Some(self.ordered(saved.clone()));
        true
    }

    /// Collapse the selection to a single point. A line id resolves to the
    /// line's first fragment; the offset defaults to the end of the text.
    pub fn set_caret(&mut self, node: NodeId, offset: Option<usize>) -> bool {
        let Some(caret) = self.resolve_point(node, offset) else {
            return false;
        };
        self.range = Some(SelectionRange::caret(caret));
        true
    }

    fn resolve_point(&self, node: NodeId, offset: Option<usize>) -> Option<Caret> {
        let (path, index) = match locate_fragment(&self.document, node) {
            Some(found) => found,
            None => {
                let path = locate_line(&self.document, node)?;
                let line = line_ref(&self.document, &path)?;
                if line.fragments.is_empty() {
                    return None;
                }
                (path, 0)
            }
        };
        let fragment = fragment_ref(&self.document, &path, index)?;
        let offset = offset.unwrap_or_else(|| fragment.len()).min(fragment.len());
        Some(Caret::new(fragment.id, offset))
    }

    /// Convert a host range into a logical range, normalized to document
    /// order. Document-rooted positions make the whole range unaddressable.
    pub(crate) fn resolve_raw_range(&self, raw: &RawRange) -> Option<SelectionRange> {
        let start = self.resolve_raw_position(&raw.start)?;
        let end = self.resolve_raw_position(&raw.end)?;
        Some(self.ordered(SelectionRange::new(start, end)))
    }

    fn resolve_raw_position(&self, raw: &RawPosition) -> Option<Caret> {
        match raw.container {
            RawContainer::Document => None,
            RawContainer::Fragment(id) => {
                let (path, index) = locate_fragment(&self.document, id)?;
                let fragment = fragment_ref(&self.document, &path, index)?;
                Some(Caret::new(id, raw.offset.min(fragment.len())))
            }
            RawContainer::Line(id) => {
                // Element containers index their child list, the way native
                // ranges do; resolve to the fragment at that index.
                let path = locate_line(&self.document, id)?;
                let line = line_ref(&self.document, &path)?;
                let index = raw.offset.min(line.fragments.len().saturating_sub(1));
                let fragment = line.fragments.get(index)?;
                Some(Caret::new(fragment.id, 0))
            }
        }
    }

    pub(crate) fn caret_is_valid(&self, caret: &Caret) -> bool {
        let Some((path, index)) = locate_fragment(&self.document, caret.fragment) else {
            return false;
        };
        fragment_ref(&self.document, &path, index)
            .is_some_and(|fragment| caret.offset <= fragment.len())
    }

    fn ordered(&self, range: SelectionRange) -> SelectionRange {
        let start = caret_position(&self.document, &range.start);
        let end = caret_position(&self.document, &range.end);
        match (start, end) {
            (Some(start), Some(end)) if end < start => {
                SelectionRange::new(range.end, range.start)
            }
            _ => range,
        }
    }
}
