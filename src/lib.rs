mod batch;
mod block;
mod config;
mod error;
mod limits;
mod parser;

pub use batch::{BatchError, BatchParams, ItemError, MarkdownSource, convert_items};
pub use block::{Block, RichText, TableRow};
pub use config::{Config, ConvertOptions};
pub use error::ParseError;
pub use limits::{MAX_BLOCK_CHILDREN, MAX_NESTING_DEPTH, MAX_RICH_TEXT_SPANS, MAX_TEXT_LENGTH};

/// Parse markdown text into a vector of blocks, without applying the
/// destination limits.
pub fn parse(markdown: &str, options: &ConvertOptions) -> Vec<Block> {
    parser::parse(markdown, options)
}

/// Convert markdown to blocks, applying the destination limits when the
/// options ask for truncation.
pub fn markdown_to_blocks(markdown: &str, options: &ConvertOptions) -> Vec<Block> {
    let mut blocks = parse(markdown, options);
    if options.truncate {
        limits::enforce(&mut blocks);
    }
    blocks
}

/// Convert raw bytes to blocks. Fails only when the bytes are not text.
pub fn markdown_to_blocks_bytes(
    bytes: &[u8],
    options: &ConvertOptions,
) -> Result<Vec<Block>, ParseError> {
    let markdown = std::str::from_utf8(bytes)?;
    Ok(markdown_to_blocks(markdown, options))
}

/// Convert markdown to a JSON array of blocks.
pub fn markdown_to_json(
    markdown: &str,
    options: &ConvertOptions,
) -> Result<String, serde_json::Error> {
    serde_json::to_string(&markdown_to_blocks(markdown, options))
}
