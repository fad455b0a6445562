use serde::Serialize;

/// A run of inline text sharing one set of style flags.
///
/// Flags are cumulative: text nested inside several emphasis markers carries
/// every enclosing flag. Unset flags are omitted from the JSON output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RichText {
    pub text: String,
    #[serde(skip_serializing_if = "is_false")]
    pub bold: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub italic: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub strikethrough: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub code: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl RichText {
    /// An unstyled span.
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            bold: false,
            italic: false,
            strikethrough: false,
            code: false,
            link: None,
        }
    }

    /// True when both spans carry identical styling, text aside.
    pub(crate) fn same_style(&self, other: &RichText) -> bool {
        self.bold == other.bold
            && self.italic == other.italic
            && self.strikethrough == other.strikethrough
            && self.code == other.code
            && self.link == other.link
    }
}

/// One table row. The header row, when present, is the first row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableRow {
    pub cells: Vec<Vec<RichText>>,
}

/// Block-level content units, serialized with a `type` tag.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    Paragraph {
        text: Vec<RichText>,
    },
    Heading {
        level: u8,
        text: Vec<RichText>,
    },
    BulletedListItem {
        text: Vec<RichText>,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        children: Vec<Block>,
    },
    NumberedListItem {
        text: Vec<RichText>,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        children: Vec<Block>,
    },
    ToDo {
        checked: bool,
        text: Vec<RichText>,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        children: Vec<Block>,
    },
    Quote {
        text: Vec<RichText>,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        children: Vec<Block>,
    },
    Code {
        #[serde(skip_serializing_if = "Option::is_none")]
        language: Option<String>,
        text: Vec<RichText>,
    },
    Divider,
    Table {
        table_width: usize,
        has_column_header: bool,
        rows: Vec<TableRow>,
    },
    Image {
        url: String,
    },
    Callout {
        icon: String,
        text: Vec<RichText>,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        children: Vec<Block>,
    },
}

impl Block {
    /// Nested child blocks, empty for block kinds that cannot nest.
    pub fn children(&self) -> &[Block] {
        match self {
            Block::BulletedListItem { children, .. }
            | Block::NumberedListItem { children, .. }
            | Block::ToDo { children, .. }
            | Block::Quote { children, .. }
            | Block::Callout { children, .. } => children,
            _ => &[],
        }
    }

    pub(crate) fn children_mut(&mut self) -> Option<&mut Vec<Block>> {
        match self {
            Block::BulletedListItem { children, .. }
            | Block::NumberedListItem { children, .. }
            | Block::ToDo { children, .. }
            | Block::Quote { children, .. }
            | Block::Callout { children, .. } => Some(children),
            _ => None,
        }
    }

    /// Every rich-text array carried directly by this block (table cells
    /// included, children excluded).
    pub fn rich_text(&self) -> Vec<&Vec<RichText>> {
        match self {
            Block::Paragraph { text }
            | Block::Heading { text, .. }
            | Block::BulletedListItem { text, .. }
            | Block::NumberedListItem { text, .. }
            | Block::ToDo { text, .. }
            | Block::Quote { text, .. }
            | Block::Code { text, .. }
            | Block::Callout { text, .. } => vec![text],
            Block::Table { rows, .. } => rows.iter().flat_map(|row| row.cells.iter()).collect(),
            Block::Divider | Block::Image { .. } => Vec::new(),
        }
    }

    pub(crate) fn rich_text_mut(&mut self) -> Vec<&mut Vec<RichText>> {
        match self {
            Block::Paragraph { text }
            | Block::Heading { text, .. }
            | Block::BulletedListItem { text, .. }
            | Block::NumberedListItem { text, .. }
            | Block::ToDo { text, .. }
            | Block::Quote { text, .. }
            | Block::Code { text, .. }
            | Block::Callout { text, .. } => vec![text],
            Block::Table { rows, .. } => {
                rows.iter_mut().flat_map(|row| row.cells.iter_mut()).collect()
            }
            Block::Divider | Block::Image { .. } => Vec::new(),
        }
    }

    /// Concatenation of all spans carried directly by this block.
    pub fn plain_text(&self) -> String {
        let mut out = String::new();
        for spans in self.rich_text() {
            for span in spans {
                out.push_str(&span.text);
            }
        }
        out
    }

    /// Length of [`Self::plain_text`] in characters.
    pub fn plain_text_len(&self) -> usize {
        self.rich_text()
            .iter()
            .flat_map(|spans| spans.iter())
            .map(|span| span.text.chars().count())
            .sum()
    }
}
