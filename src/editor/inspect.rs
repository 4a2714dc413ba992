use super::{Caret, LinePath, SelectionRange};
use crate::document::{DEFAULT_LIST_PREFIX, Document, Fragment, Line, NodeId};

pub(crate) fn line_ref<'a>(document: &'a Document, path: &LinePath) -> Option<&'a Line> {
    let mut iter = path.steps().iter();
    let mut line = document.lines.get(*iter.next()?)?;
    for idx in iter {
        line = line.children.get(*idx)?;
    }
    Some(line)
}

pub(crate) fn line_mut<'a>(document: &'a mut Document, path: &LinePath) -> Option<&'a mut Line> {
    let mut iter = path.steps().iter();
    let mut line = document.lines.get_mut(*iter.next()?)?;
    for idx in iter {
        line = line.children.get_mut(*idx)?;
    }
    Some(line)
}

pub(crate) fn fragment_ref<'a>(
    document: &'a Document,
    path: &LinePath,
    index: usize,
) -> Option<&'a Fragment> {
    line_ref(document, path)?.fragments.get(index)
}

pub(crate) fn fragment_mut<'a>(
    document: &'a mut Document,
    path: &LinePath,
    index: usize,
) -> Option<&'a mut Fragment> {
    line_mut(document, path)?.fragments.get_mut(index)
}

/// All line paths in document order (preorder: a line before its children).
pub(crate) fn walk_lines(document: &Document) -> Vec<LinePath> {
    let mut paths = Vec::new();
    for (idx, line) in document.lines.iter().enumerate() {
        collect_line_paths(line, LinePath::new_root(idx), &mut paths);
    }
    paths
}

fn collect_line_paths(line: &Line, path: LinePath, out: &mut Vec<LinePath>) {
    out.push(path.clone());
    for (idx, child) in line.children.iter().enumerate() {
        let mut child_path = path.clone();
        child_path.push(idx);
        collect_line_paths(child, child_path, out);
    }
}

/// Find the path of the line with the given id.
pub(crate) fn locate_line(document: &Document, id: NodeId) -> Option<LinePath> {
    walk_lines(document)
        .into_iter()
        .find(|path| line_ref(document, path).is_some_and(|line| line.id == id))
}

/// Find the owning line path and body index of the fragment with the given id.
pub(crate) fn locate_fragment(document: &Document, id: NodeId) -> Option<(LinePath, usize)> {
    for path in walk_lines(document) {
        let line = line_ref(document, &path)?;
        if let Some(index) = line.fragments.iter().position(|f| f.id == id) {
            return Some((path, index));
        }
    }
    None
}

/// Number of ancestor lines between this line and the document root.
pub(crate) fn line_depth(path: &LinePath) -> usize {
    path.steps().len().saturating_sub(1)
}

/// Indentation index: depth modulo the maximum list depth, with a zero
/// remainder wrapping to the maximum. Root lines are always index 0.
pub(crate) fn indentation_index(path: &LinePath) -> usize {
    let depth = line_depth(path);
    if depth == 0 {
        0
    } else {
        let rem = depth % super::MAX_LIST_DEPTH;
        if rem == 0 { super::MAX_LIST_DEPTH } else { rem }
    }
}

/// Resolve the list prefix for a line by walking up through its ancestors
/// until one carries a confirmed prefix. Falls back to the reserved root
/// prefix at the document root.
pub(crate) fn list_prefix(document: &Document, path: &LinePath) -> String {
    let mut current = Some(path.clone());
    while let Some(path) = current {
        if let Some(line) = line_ref(document, &path)
            && let Some(prefix) = line.list.prefix()
        {
            return prefix.to_string();
        }
        current = path.parent();
    }
    DEFAULT_LIST_PREFIX.to_string()
}

/// One entry per fragment in document order: its owning line, body index,
/// id, and the global character interval it occupies.
pub(crate) struct FragmentPosition {
    pub(crate) line: LinePath,
    pub(crate) index: usize,
    pub(crate) id: NodeId,
    pub(crate) start: usize,
    pub(crate) len: usize,
}

pub(crate) fn fragment_positions(document: &Document) -> Vec<FragmentPosition> {
    let mut positions = Vec::new();
    let mut offset = 0;
    for path in walk_lines(document) {
        let Some(line) = line_ref(document, &path) else {
            continue;
        };
        for (index, fragment) in line.fragments.iter().enumerate() {
            let len = fragment.len();
            positions.push(FragmentPosition {
                line: path.clone(),
                index,
                id: fragment.id,
                start: offset,
                len,
            });
            offset += len;
        }
    }
    positions
}

/// Global character position of a caret, or None when its fragment is gone.
pub(crate) fn caret_position(document: &Document, caret: &Caret) -> Option<usize> {
    let positions = fragment_positions(document);
    let entry = positions.iter().find(|p| p.id == caret.fragment)?;
    Some(entry.start + caret.offset.min(entry.len))
}

fn selection_span(document: &Document, range: &SelectionRange) -> Option<(usize, usize)> {
    let start = caret_position(document, &range.start)?;
    let end = caret_position(document, &range.end)?;
    Some((start.min(end), start.max(end)))
}

/// The deepest line whose subtree contains both endpoints of the selection,
/// mirroring walking a native range from its common ancestor container.
fn common_ancestor_line(document: &Document, range: &SelectionRange) -> Option<LinePath> {
    let (start_line, _) = locate_fragment(document, range.start.fragment)?;
    let (end_line, _) = locate_fragment(document, range.end.fragment)?;
    let mut shared = Vec::new();
    for (a, b) in start_line.steps().iter().zip(end_line.steps().iter()) {
        if a == b {
            shared.push(*a);
        } else {
            break;
        }
    }
    if shared.is_empty() {
        None
    } else {
        Some(LinePath::from_steps(shared))
    }
}

/// Character interval covered by a line's subtree, or None for a line with
/// no fragments anywhere below it.
fn subtree_span(positions: &[FragmentPosition], path: &LinePath) -> Option<(usize, usize)> {
    let mut span: Option<(usize, usize)> = None;
    for entry in positions {
        if !path.is_prefix_of(&entry.line) {
            continue;
        }
        let end = entry.start + entry.len;
        span = Some(match span {
            Some((lo, hi)) => (lo.min(entry.start), hi.max(end)),
            None => (entry.start, end),
        });
    }
    span
}

/// All lines intersecting the selection, in document order. The walk is
/// rooted at the deepest line containing both endpoints, so ancestors above
/// that root are not reported.
pub(crate) fn lines_in_range(document: &Document, range: &SelectionRange) -> Vec<LinePath> {
    let Some((sel_start, sel_end)) = selection_span(document, range) else {
        return Vec::new();
    };
    let positions = fragment_positions(document);
    let root = common_ancestor_line(document, range);
    walk_lines(document)
        .into_iter()
        .filter(|path| match &root {
            Some(root) => root.is_prefix_of(path),
            None => true,
        })
        .filter(|path| {
            subtree_span(&positions, path).is_some_and(|(lo, hi)| {
                if sel_start == sel_end {
                    lo <= sel_start && sel_start <= hi
                } else {
                    sel_start < hi && sel_end > lo
                }
            })
        })
        .collect()
}

/// All dedicated fragments intersecting the selection, in document order.
/// Raw runs and pilots are not style targets and are skipped.
pub(crate) fn fragments_in_range(document: &Document, range: &SelectionRange) -> Vec<NodeId> {
    let Some((sel_start, sel_end)) = selection_span(document, range) else {
        return Vec::new();
    };
    fragment_positions(document)
        .into_iter()
        .filter(|entry| {
            fragment_ref(document, &entry.line, entry.index)
                .is_some_and(|fragment| fragment.is_dedicated())
        })
        .filter(|entry| {
            let end = entry.start + entry.len;
            if sel_start == sel_end {
                entry.start < sel_start && sel_start < end
            } else {
                sel_start < end && sel_end > entry.start
            }
        })
        .map(|entry| entry.id)
        .collect()
}

/// Reduce a set of lines to the ones without an ancestor in the same set.
pub(crate) fn ancestor_lines(lines: &[LinePath]) -> Vec<LinePath> {
    let mut ancestors: Vec<LinePath> = Vec::new();
    for path in lines {
        let mut current = path.clone();
        loop {
            let Some(parent) = current.parent() else {
                break;
            };
            if lines.contains(&parent) {
                current = parent;
            } else {
                break;
            }
        }
        if !ancestors.contains(&current) {
            ancestors.push(current);
        }
    }
    ancestors
}
