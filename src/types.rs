use std::fmt;
use std::hash::Hasher;

use rustc_hash::FxHasher;

use crate::ast::Node;
use crate::component::ComponentInstance;

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockId(pub u64);

impl fmt::Debug for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlockId({})", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockKind {
    Heading,
    Paragraph,
    List,
    Table,
    CodeBlock,
    Blockquote,
    Component,
    HorizontalRule,
    Image,
}

/// Memo key for renderers: equal content always yields an equal hash.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentHash(pub u64);

impl ContentHash {
    pub fn of(content: &str) -> Self {
        let mut hasher = FxHasher::default();
        hasher.write(content.as_bytes());
        Self(hasher.finish())
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({:016x})", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alignment {
    None,
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BlockMeta {
    None,
    Heading {
        level: u8,
    },
    CodeBlock {
        language: Option<String>,
        info: String,
    },
    List {
        ordered: bool,
        start: Option<u64>,
        /// Raw source of each top-level item, marker included.
        items: Vec<String>,
    },
    Table {
        headers: Vec<String>,
        alignments: Vec<Alignment>,
        rows: Vec<Vec<String>>,
    },
    Component {
        instance: ComponentInstance,
    },
    Image {
        alt: String,
        url: String,
        title: Option<String>,
    },
}

/// A block whose boundary is confirmed. Never modified after creation.
#[derive(Debug, Clone, PartialEq)]
pub struct StableBlock {
    pub id: BlockId,
    pub kind: BlockKind,
    pub content: String,
    pub content_hash: ContentHash,
    pub meta: BlockMeta,
    pub ast: Option<Node>,
    /// Every component directive in the block, inline ones included.
    pub components: Vec<ComponentInstance>,
    /// Byte offset of `content` in the full streamed text.
    pub start_pos: usize,
}

impl StableBlock {
    pub fn end_pos(&self) -> usize {
        self.start_pos + self.content.len()
    }

    pub fn heading_level(&self) -> Option<u8> {
        match self.meta {
            BlockMeta::Heading { level } => Some(level),
            _ => None,
        }
    }

    pub fn code_language(&self) -> Option<&str> {
        match &self.meta {
            BlockMeta::CodeBlock { language, .. } => language.as_deref(),
            _ => None,
        }
    }

    pub fn component(&self) -> Option<&ComponentInstance> {
        match &self.meta {
            BlockMeta::Component { instance } => Some(instance),
            _ => None,
        }
    }
}
