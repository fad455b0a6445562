use crate::block::{Block, RichText};

/// Destination limits, from the target structured-content API.
pub const MAX_TEXT_LENGTH: usize = 2000;
pub const MAX_BLOCK_CHILDREN: usize = 100;
pub const MAX_RICH_TEXT_SPANS: usize = 100;
pub const MAX_NESTING_DEPTH: usize = 2;

/// Adjust a block tree in place so every node satisfies the destination
/// limits. Oversized spans split preserving style, excess children drop from
/// the tail, and nodes below the depth cap re-parent to the last allowed
/// ancestor. Sibling order never changes.
pub fn enforce(blocks: &mut Vec<Block>) {
    for block in blocks.iter_mut() {
        enforce_block(block, 0);
    }
}

// Children are finalized before the parent's own child count is evaluated,
// so hoisted grandchildren count against the cap
fn enforce_block(block: &mut Block, depth: usize) {
    for spans in block.rich_text_mut() {
        enforce_spans(spans);
    }
    if let Some(children) = block.children_mut() {
        for child in children.iter_mut() {
            enforce_block(child, depth + 1);
        }
        if depth + 1 == MAX_NESTING_DEPTH {
            hoist_descendants(children);
        }
        children.truncate(MAX_BLOCK_CHILDREN);
    }
}

/// Flatten every level below `children` into `children` itself, each node
/// spliced immediately after its former parent.
fn hoist_descendants(children: &mut Vec<Block>) {
    let nested = std::mem::take(children);
    for mut block in nested {
        let mut tail = block
            .children_mut()
            .map(std::mem::take)
            .unwrap_or_default();
        hoist_descendants(&mut tail);
        children.push(block);
        children.append(&mut tail);
    }
}

fn enforce_spans(spans: &mut Vec<RichText>) {
    let oversized = spans
        .iter()
        .any(|span| span.text.chars().count() > MAX_TEXT_LENGTH);
    if oversized {
        let old = std::mem::take(spans);
        for span in old {
            split_into(spans, span);
        }
    }
    spans.truncate(MAX_RICH_TEXT_SPANS);
}

fn split_into(out: &mut Vec<RichText>, span: RichText) {
    if span.text.chars().count() <= MAX_TEXT_LENGTH {
        out.push(span);
        return;
    }
    let mut rest = span.text.as_str();
    while !rest.is_empty() {
        let end = rest
            .char_indices()
            .nth(MAX_TEXT_LENGTH)
            .map(|(index, _)| index)
            .unwrap_or(rest.len());
        out.push(RichText {
            text: rest[..end].to_string(),
            ..span.clone()
        });
        rest = &rest[end..];
    }
}
