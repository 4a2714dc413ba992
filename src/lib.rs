//! A headless rich-text editing engine.
//!
//! `tessera` maintains an editable document tree of nested lines holding
//! styled inline fragments (and, for lists, nested child lines), and keeps
//! it consistent while selections and raw text edits mutate it:
//!
//! - line creation, attachment, and self-healing of emptied line bodies,
//! - list indentation and outdentation as tree reparenting,
//! - boundary-aware splitting of text runs into style-bearing fragments,
//! - selection save/restore across structural mutation,
//! - a style-declaration engine (set, unset, toggle, initialize,
//!   increment, decrement, commands).
//!
//! The host platform owns rendering, keyboard classification, menus, and
//! the clipboard; it feeds the [`editor::DocumentEditor`] classified input
//! events carrying its native ranges and reads the tree back out.
//!
//! ```
//! use tessera::document::Document;
//! use tessera::editor::{DocumentEditor, RawContainer, RawRange};
//!
//! let mut editor = DocumentEditor::new(Document::new());
//! // A fresh editor always has one focusable line.
//! assert_eq!(editor.document().lines.len(), 1);
//!
//! let pilot = editor.document().lines[0].fragments[0].id;
//! let range = RawRange::collapsed(RawContainer::Fragment(pilot), 0);
//! editor.process_return(&range);
//! assert_eq!(editor.document().lines.len(), 2);
//! ```

pub mod document;
pub mod editor;

pub use document::{
    DEFAULT_LIST_PREFIX, Document, Fragment, FragmentKind, Line, ListRole, NodeId, PILOT_CHAR,
    StyleSet,
};
pub use editor::{
    Attach, Caret, CreateLineOptions, DocumentEditor, EditorOptions, FormatScope, Instruction,
    LinePath, RawContainer, RawPosition, RawRange, SelectionRange, StyleTarget, split_at_word,
};
