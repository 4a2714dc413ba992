//! The document tree: nested lines of styled inline fragments.
//!
//! A [`Document`] owns a forest of [`Line`]s. Each line carries an ordered
//! body of [`Fragment`]s and, for list structure, nested child lines. The
//! editing engines in [`crate::editor`] mutate this tree; the invariants they
//! maintain (a line always has content, list tags match tree depth) are
//! documented on the types below.

/// Placeholder character held by a pilot fragment. A line whose content has
/// been emptied out receives a single pilot fragment carrying this character
/// so the host surface still has something to focus.
pub const PILOT_CHAR: char = '\u{a0}';

/// Reserved list prefix used when no ancestor line declares one.
pub const DEFAULT_LIST_PREFIX: &str = "tessera";

const LIST_ROOT_CLASS: &str = "tessera-list-root";
const LIST_ANCHOR_CLASS: &str = "tessera-list-anchor";
const LIST_BLANK_CLASS: &str = "tessera-list-blank";

/// Opaque identifier for a line or fragment.
///
/// Ids survive structural mutation (reparenting, splicing), which makes them
/// the stable half of a selection: positions are cached as `(NodeId, offset)`
/// and re-resolved against the live tree when a selection is restored.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl NodeId {
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn as_raw(self) -> u64 {
        self.0
    }
}

#[derive(Clone, Debug, Default)]
pub(crate) struct IdAllocator {
    next: u64,
}

impl IdAllocator {
    pub(crate) fn next(&mut self) -> NodeId {
        let id = NodeId(self.next);
        self.next += 1;
        id
    }
}

/// An ordered set of `property: value` style declarations.
///
/// Order is preserved so that batch application side effects (counter
/// resets in particular) are observable in declaration order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StyleSet {
    declarations: Vec<(String, String)>,
}

impl StyleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a semicolon-separated instruction payload, e.g.
    /// `"margin-left: 40px; color: red"`.
    pub fn parse(payload: &str) -> Self {
        let mut set = Self::new();
        for (property, value) in parse_declarations(payload) {
            set.set(&property, &value);
        }
        set
    }

    pub fn get(&self, property: &str) -> Option<&str> {
        self.declarations
            .iter()
            .find(|(p, _)| p == property)
            .map(|(_, v)| v.as_str())
    }

    pub fn set(&mut self, property: &str, value: &str) {
        if let Some(entry) = self.declarations.iter_mut().find(|(p, _)| p == property) {
            entry.1 = value.to_string();
        } else {
            self.declarations
                .push((property.to_string(), value.to_string()));
        }
    }

    pub fn remove(&mut self, property: &str) -> bool {
        let before = self.declarations.len();
        self.declarations.retain(|(p, _)| p != property);
        self.declarations.len() != before
    }

    pub fn clear(&mut self) {
        self.declarations.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.declarations.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.declarations
            .iter()
            .map(|(p, v)| (p.as_str(), v.as_str()))
    }
}

/// Split a semicolon-separated payload into `(property, value)` pairs.
/// Declarations without a value part are dropped.
pub(crate) fn parse_declarations(payload: &str) -> Vec<(String, String)> {
    payload
        .split(';')
        .filter_map(|declaration| {
            let (property, value) = declaration.split_once(':')?;
            let property = property.trim();
            let value = value.trim();
            if property.is_empty() || value.is_empty() {
                return None;
            }
            Some((property.to_string(), value.to_string()))
        })
        .collect()
}

/// How a fragment relates to the line body it lives in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FragmentKind {
    /// A dedicated, style-bearing text fragment.
    Text,
    /// A raw text run that no dedicated fragment has claimed yet, e.g.
    /// freshly pasted text. The splitter wraps these on demand.
    Raw,
    /// The placeholder keeping an empty line focusable. Holds exactly
    /// [`PILOT_CHAR`].
    Pilot,
}

/// An inline node: a text run plus its style declarations.
#[derive(Clone, Debug)]
pub struct Fragment {
    pub id: NodeId,
    pub text: String,
    pub style: StyleSet,
    pub kind: FragmentKind,
}

impl Fragment {
    pub fn len(&self) -> usize {
        self.text.chars().count()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn is_pilot(&self) -> bool {
        self.kind == FragmentKind::Pilot
    }

    /// Whether this run is already its own dedicated fragment, as opposed
    /// to a raw or pilot run that still needs wrapping.
    pub fn is_dedicated(&self) -> bool {
        self.kind == FragmentKind::Text
    }

    /// Blank runs carry no text, or only the pilot placeholder.
    pub fn is_blank(&self) -> bool {
        self.text.is_empty() || self.text == PILOT_CHAR.to_string()
    }
}

/// List role tag of a line. Set imperatively by the list engine; queries
/// never re-derive it from class strings.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum ListRole {
    /// Not part of any list.
    #[default]
    None,
    /// A top-level line marked as the start of a list.
    Root,
    /// A synthetic line created to host indented children.
    Anchor,
    /// A list-marked line pending confirmation of its role, e.g. mid-outdent.
    Blank,
    /// A confirmed list line with its prefix and indentation index.
    Item { prefix: String, index: usize },
}

impl ListRole {
    pub fn is_list(&self) -> bool {
        !matches!(self, ListRole::None)
    }

    pub fn is_blank(&self) -> bool {
        matches!(self, ListRole::Blank)
    }

    pub fn is_anchor(&self) -> bool {
        matches!(self, ListRole::Anchor)
    }

    pub fn is_root(&self) -> bool {
        matches!(self, ListRole::Root)
    }

    pub fn prefix(&self) -> Option<&str> {
        match self {
            ListRole::Item { prefix, .. } => Some(prefix.as_str()),
            _ => None,
        }
    }
}

/// A block node: one paragraph or list item of the document.
#[derive(Clone, Debug)]
pub struct Line {
    pub id: NodeId,
    pub fragments: Vec<Fragment>,
    pub children: Vec<Line>,
    pub style: StyleSet,
    pub list: ListRole,
}

impl Line {
    /// The observable list class of this line, derived from its role tag.
    pub fn list_class(&self) -> Option<String> {
        match &self.list {
            ListRole::None => None,
            ListRole::Root => Some(LIST_ROOT_CLASS.to_string()),
            ListRole::Anchor => Some(LIST_ANCHOR_CLASS.to_string()),
            ListRole::Blank => Some(LIST_BLANK_CLASS.to_string()),
            ListRole::Item { prefix, index } => Some(format!("{prefix}-list-{index}")),
        }
    }

    /// Concatenated text of the line body, pilot placeholders excluded.
    pub fn text(&self) -> String {
        self.fragments
            .iter()
            .filter(|fragment| !fragment.is_pilot())
            .map(|fragment| fragment.text.as_str())
            .collect()
    }

    /// Character length of the line body, pilot placeholders included.
    /// This is the "text length" the change observer reports.
    pub fn body_len(&self) -> usize {
        self.fragments.iter().map(Fragment::len).sum()
    }

    pub fn is_blank(&self) -> bool {
        self.fragments.iter().all(Fragment::is_blank)
    }

    /// A line must never end up with neither fragments nor child lines;
    /// the lifecycle manager repairs any line for which this returns false.
    pub fn has_content(&self) -> bool {
        !self.fragments.is_empty() || !self.children.is_empty()
    }
}

/// The live, in-memory document. There is no serialization format; the host
/// may snapshot whatever it renders from this tree.
#[derive(Clone, Debug, Default)]
pub struct Document {
    pub lines: Vec<Line>,
    pub(crate) ids: IdAllocator,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an unattached line with an empty body.
    pub fn create_line(&mut self) -> Line {
        Line {
            id: self.ids.next(),
            fragments: Vec::new(),
            children: Vec::new(),
            style: StyleSet::new(),
            list: ListRole::None,
        }
    }

    pub fn create_fragment(&mut self, text: &str, kind: FragmentKind) -> Fragment {
        Fragment {
            id: self.ids.next(),
            text: text.to_string(),
            style: StyleSet::new(),
            kind,
        }
    }

    pub fn create_pilot_fragment(&mut self) -> Fragment {
        self.create_fragment(&PILOT_CHAR.to_string(), FragmentKind::Pilot)
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}
