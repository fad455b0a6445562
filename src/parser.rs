use pulldown_cmark::{BlockQuoteKind, Event, HeadingLevel, Options, Parser, Tag, TagEnd};
use url::Url;

use crate::block::{Block, RichText, TableRow};
use crate::config::ConvertOptions;

/// Strip YAML frontmatter from the beginning of markdown content
fn strip_frontmatter(markdown: &str) -> &str {
    if !markdown.starts_with("---") {
        return markdown;
    }
    // Find the closing ---
    if let Some(end) = markdown[3..].find("\n---") {
        // Skip past the closing --- and any trailing newline
        let after_frontmatter = &markdown[3 + end + 4..];
        after_frontmatter.trim_start_matches('\n')
    } else {
        markdown
    }
}

/// The deepest heading variant the destination supports.
const MAX_HEADING_LEVEL: u8 = 3;

/// Parse markdown text into a list of blocks
pub fn parse(markdown: &str, options: &ConvertOptions) -> Vec<Block> {
    let markdown = strip_frontmatter(markdown);
    let mut parse_options = Options::empty();
    parse_options.insert(Options::ENABLE_TABLES);
    parse_options.insert(Options::ENABLE_TASKLISTS);
    parse_options.insert(Options::ENABLE_STRIKETHROUGH);
    parse_options.insert(Options::ENABLE_GFM);
    let parser = Parser::new_ext(markdown, parse_options);
    let mut blocks = Vec::new();
    let mut state = ParseState::default();

    for event in parser {
        process_event(event, &mut state, &mut blocks, options);
    }

    blocks
}

#[derive(Default)]
struct ParseState {
    // Current inline content being built
    spans: Vec<RichText>,
    // Active emphasis nesting counts; a span is flagged while its count > 0
    bold: u32,
    italic: u32,
    strikethrough: u32,
    // Innermost link wins
    links: Vec<String>,

    // Current heading level (if in a heading)
    heading_level: Option<u8>,

    // Code block state
    in_code_block: bool,
    code_language: Option<String>,
    code_content: String,

    // Image reference being collected (alt text arrives as inline events)
    image: Option<ImageBuilder>,

    // Open lists, list items and quotes, innermost last
    containers: Vec<Container>,

    // Table state
    in_table: bool,
    table_width: usize,
    table_rows: Vec<TableRow>,
    current_row: Vec<Vec<RichText>>,
}

struct ImageBuilder {
    url: String,
    alt: String,
}

enum Container {
    List { ordered: bool },
    Item(ItemBuilder),
    Quote(QuoteBuilder),
}

struct ItemBuilder {
    ordered: bool,
    checked: Option<bool>,
    text: Vec<RichText>,
    children: Vec<Block>,
}

struct QuoteBuilder {
    kind: Option<BlockQuoteKind>,
    text: Vec<RichText>,
    children: Vec<Block>,
}

fn process_event(
    event: Event,
    state: &mut ParseState,
    blocks: &mut Vec<Block>,
    options: &ConvertOptions,
) {
    match event {
        // Headings
        Event::Start(Tag::Heading { level, .. }) => {
            flush_inline(state, blocks);
            state.heading_level = Some(heading_level_to_u8(level).min(MAX_HEADING_LEVEL));
        }
        Event::End(TagEnd::Heading(_)) => {
            if let Some(level) = state.heading_level.take() {
                let text = std::mem::take(&mut state.spans);
                push_block(state, blocks, Block::Heading { level, text });
            }
        }

        // Paragraphs
        Event::Start(Tag::Paragraph) => {}
        Event::End(TagEnd::Paragraph) => {
            flush_inline(state, blocks);
        }

        // Text content
        Event::Text(text) => {
            if state.in_code_block {
                state.code_content.push_str(&text);
            } else if let Some(image) = state.image.as_mut() {
                image.alt.push_str(&text);
            } else {
                push_span(state, &text);
            }
        }

        // Inline code
        Event::Code(code) => {
            if let Some(image) = state.image.as_mut() {
                image.alt.push_str(&code);
            } else {
                push_code_span(state, &code);
            }
        }

        // Emphasis
        Event::Start(Tag::Strong) => state.bold += 1,
        Event::End(TagEnd::Strong) => state.bold = state.bold.saturating_sub(1),
        Event::Start(Tag::Emphasis) => state.italic += 1,
        Event::End(TagEnd::Emphasis) => state.italic = state.italic.saturating_sub(1),
        Event::Start(Tag::Strikethrough) => state.strikethrough += 1,
        Event::End(TagEnd::Strikethrough) => {
            state.strikethrough = state.strikethrough.saturating_sub(1);
        }

        // Links
        Event::Start(Tag::Link { dest_url, .. }) => {
            state.links.push(dest_url.into_string());
        }
        Event::End(TagEnd::Link) => {
            state.links.pop();
        }

        // Images become blocks of their own; the surrounding paragraph text
        // is flushed first so document order survives
        Event::Start(Tag::Image { dest_url, .. }) => {
            state.image = Some(ImageBuilder {
                url: dest_url.into_string(),
                alt: String::new(),
            });
        }
        Event::End(TagEnd::Image) => {
            if let Some(image) = state.image.take() {
                finish_image(image, state, blocks, options);
            }
        }

        // Code blocks
        Event::Start(Tag::CodeBlock(kind)) => {
            flush_inline(state, blocks);
            state.in_code_block = true;
            state.code_language = match kind {
                pulldown_cmark::CodeBlockKind::Fenced(lang) => {
                    let lang = lang.into_string();
                    if lang.is_empty() { None } else { Some(lang) }
                }
                pulldown_cmark::CodeBlockKind::Indented => None,
            };
            state.code_content.clear();
        }
        Event::End(TagEnd::CodeBlock) => {
            state.in_code_block = false;
            let mut content = std::mem::take(&mut state.code_content);
            if content.ends_with('\n') {
                content.pop();
            }
            let language = state.code_language.take();
            push_block(
                state,
                blocks,
                Block::Code {
                    language,
                    text: vec![RichText::plain(content)],
                },
            );
        }

        // Lists
        Event::Start(Tag::List(first_item)) => {
            flush_inline(state, blocks);
            state.containers.push(Container::List {
                ordered: first_item.is_some(),
            });
        }
        Event::End(TagEnd::List(_)) => {
            if matches!(state.containers.last(), Some(Container::List { .. })) {
                state.containers.pop();
            }
        }

        Event::Start(Tag::Item) => {
            let ordered = state
                .containers
                .iter()
                .rev()
                .find_map(|container| match container {
                    Container::List { ordered } => Some(*ordered),
                    _ => None,
                })
                .unwrap_or(false);
            state.containers.push(Container::Item(ItemBuilder {
                ordered,
                checked: None,
                text: Vec::new(),
                children: Vec::new(),
            }));
        }
        Event::End(TagEnd::Item) => {
            flush_inline(state, blocks);
            match state.containers.pop() {
                Some(Container::Item(item)) => {
                    let block = match (item.checked, item.ordered) {
                        (Some(checked), _) => Block::ToDo {
                            checked,
                            text: item.text,
                            children: item.children,
                        },
                        (None, true) => Block::NumberedListItem {
                            text: item.text,
                            children: item.children,
                        },
                        (None, false) => Block::BulletedListItem {
                            text: item.text,
                            children: item.children,
                        },
                    };
                    push_block(state, blocks, block);
                }
                Some(other) => state.containers.push(other),
                None => {}
            }
        }

        // Task list checkboxes
        Event::TaskListMarker(checked) => {
            if let Some(Container::Item(item)) = state.containers.last_mut() {
                item.checked = Some(checked);
            }
        }

        // Block quotes; the GFM alert kinds map to callouts
        Event::Start(Tag::BlockQuote(kind)) => {
            flush_inline(state, blocks);
            state.containers.push(Container::Quote(QuoteBuilder {
                kind,
                text: Vec::new(),
                children: Vec::new(),
            }));
        }
        Event::End(TagEnd::BlockQuote(_)) => {
            flush_inline(state, blocks);
            match state.containers.pop() {
                Some(Container::Quote(quote)) => {
                    let block = match quote.kind {
                        Some(kind) => Block::Callout {
                            icon: alert_icon(kind).to_string(),
                            text: quote.text,
                            children: quote.children,
                        },
                        None => Block::Quote {
                            text: quote.text,
                            children: quote.children,
                        },
                    };
                    push_block(state, blocks, block);
                }
                Some(other) => state.containers.push(other),
                None => {}
            }
        }

        // Tables
        Event::Start(Tag::Table(alignments)) => {
            flush_inline(state, blocks);
            state.in_table = true;
            state.table_width = alignments.len();
            state.table_rows.clear();
        }
        Event::End(TagEnd::Table) => {
            state.in_table = false;
            let rows = std::mem::take(&mut state.table_rows);
            push_block(
                state,
                blocks,
                Block::Table {
                    table_width: state.table_width,
                    has_column_header: true,
                    rows,
                },
            );
        }

        Event::Start(Tag::TableHead) | Event::Start(Tag::TableRow) => {
            state.current_row.clear();
        }
        Event::End(TagEnd::TableHead) | Event::End(TagEnd::TableRow) => {
            let cells = std::mem::take(&mut state.current_row);
            state.table_rows.push(TableRow { cells });
        }

        Event::Start(Tag::TableCell) => {
            state.spans.clear();
        }
        Event::End(TagEnd::TableCell) => {
            state.current_row.push(std::mem::take(&mut state.spans));
        }

        // Horizontal rule
        Event::Rule => {
            flush_inline(state, blocks);
            push_block(state, blocks, Block::Divider);
        }

        // Raw HTML is kept as literal text
        Event::Start(Tag::HtmlBlock) => flush_inline(state, blocks),
        Event::End(TagEnd::HtmlBlock) => flush_inline(state, blocks),
        Event::Html(html) => {
            let html = html.trim_end_matches('\n');
            if !html.is_empty() {
                if !state.spans.is_empty() {
                    push_span(state, "\n");
                }
                push_span(state, html);
            }
        }
        Event::InlineHtml(html) => push_span(state, &html),

        // Soft/hard breaks
        Event::SoftBreak => {
            if let Some(image) = state.image.as_mut() {
                image.alt.push(' ');
            } else {
                push_span(state, " ");
            }
        }
        Event::HardBreak => {
            if let Some(image) = state.image.as_mut() {
                image.alt.push(' ');
            } else {
                push_span(state, "\n");
            }
        }

        // Ignore other events
        _ => {}
    }
}

/// Append inline text to the open span list, merging into the previous span
/// when the styling is identical.
fn push_span(state: &mut ParseState, text: &str) {
    if text.is_empty() {
        return;
    }
    let span = RichText {
        text: text.to_string(),
        bold: state.bold > 0,
        italic: state.italic > 0,
        strikethrough: state.strikethrough > 0,
        code: false,
        link: state.links.last().cloned(),
    };
    if let Some(last) = state.spans.last_mut() {
        if !last.code && last.same_style(&span) {
            last.text.push_str(text);
            return;
        }
    }
    state.spans.push(span);
}

// Code spans never merge with their neighbours
fn push_code_span(state: &mut ParseState, text: &str) {
    state.spans.push(RichText {
        text: text.to_string(),
        bold: state.bold > 0,
        italic: state.italic > 0,
        strikethrough: state.strikethrough > 0,
        code: true,
        link: state.links.last().cloned(),
    });
}

/// Close the inline content in progress. The first run of a list item or
/// quote becomes its own text; anything later becomes a child paragraph.
fn flush_inline(state: &mut ParseState, blocks: &mut Vec<Block>) {
    let spans = std::mem::take(&mut state.spans);
    if spans.is_empty() {
        return;
    }
    let slot = state
        .containers
        .iter_mut()
        .rev()
        .find_map(|container| match container {
            Container::Item(item) => Some((&mut item.text, &mut item.children)),
            Container::Quote(quote) => Some((&mut quote.text, &mut quote.children)),
            Container::List { .. } => None,
        });
    match slot {
        Some((text, children)) => {
            if text.is_empty() && children.is_empty() {
                *text = spans;
            } else {
                children.push(Block::Paragraph { text: spans });
            }
        }
        None => blocks.push(Block::Paragraph { text: spans }),
    }
}

/// Attach a finished block to the innermost open item or quote, or to the
/// top level when none is open.
fn push_block(state: &mut ParseState, blocks: &mut Vec<Block>, block: Block) {
    let target = state
        .containers
        .iter_mut()
        .rev()
        .find_map(|container| match container {
            Container::Item(item) => Some(&mut item.children),
            Container::Quote(quote) => Some(&mut quote.children),
            Container::List { .. } => None,
        });
    match target {
        Some(children) => children.push(block),
        None => blocks.push(block),
    }
}

fn finish_image(
    image: ImageBuilder,
    state: &mut ParseState,
    blocks: &mut Vec<Block>,
    options: &ConvertOptions,
) {
    // Inside tables and headings an image cannot become a sibling block;
    // keep its alt text in place
    if state.in_table || state.heading_level.is_some() {
        push_span(state, &image.alt);
        return;
    }
    if options.strict_image_urls && Url::parse(&image.url).is_err() {
        push_span(state, &image.alt);
        return;
    }
    flush_inline(state, blocks);
    push_block(state, blocks, Block::Image { url: image.url });
}

fn alert_icon(kind: BlockQuoteKind) -> &'static str {
    match kind {
        BlockQuoteKind::Note => "ℹ️",
        BlockQuoteKind::Tip => "💡",
        BlockQuoteKind::Important => "☝️",
        BlockQuoteKind::Warning => "⚠️",
        BlockQuoteKind::Caution => "🚨",
    }
}

fn heading_level_to_u8(level: HeadingLevel) -> u8 {
    match level {
        HeadingLevel::H1 => 1,
        HeadingLevel::H2 => 2,
        HeadingLevel::H3 => 3,
        HeadingLevel::H4 => 4,
        HeadingLevel::H5 => 5,
        HeadingLevel::H6 => 6,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse_default(markdown: &str) -> Vec<Block> {
        parse(markdown, &ConvertOptions::default())
    }

    fn plain(text: &str) -> RichText {
        RichText::plain(text)
    }

    #[test]
    fn heading() {
        assert_eq!(
            parse_default("# Hello"),
            vec![Block::Heading {
                level: 1,
                text: vec![plain("Hello")],
            }]
        );
    }

    #[test]
    fn deep_headings_clamp_to_level_three() {
        let blocks = parse_default("#### Deep\n\n###### Deeper");
        assert_eq!(
            blocks,
            vec![
                Block::Heading {
                    level: 3,
                    text: vec![plain("Deep")],
                },
                Block::Heading {
                    level: 3,
                    text: vec![plain("Deeper")],
                },
            ]
        );
    }

    #[test]
    fn bold_and_link_spans() {
        assert_eq!(
            parse_default("**bold** and [link](http://x.com)"),
            vec![Block::Paragraph {
                text: vec![
                    RichText {
                        bold: true,
                        ..plain("bold")
                    },
                    plain(" and "),
                    RichText {
                        link: Some("http://x.com".to_string()),
                        ..plain("link")
                    },
                ],
            }]
        );
    }

    #[test]
    fn nested_emphasis_accumulates_flags() {
        let blocks = parse_default("**bold *both* bold**");
        assert_eq!(
            blocks,
            vec![Block::Paragraph {
                text: vec![
                    RichText {
                        bold: true,
                        ..plain("bold ")
                    },
                    RichText {
                        bold: true,
                        italic: true,
                        ..plain("both")
                    },
                    RichText {
                        bold: true,
                        ..plain(" bold")
                    },
                ],
            }]
        );
    }

    #[test]
    fn strikethrough_and_inline_code() {
        assert_eq!(
            parse_default("~~gone~~ `x = 1`"),
            vec![Block::Paragraph {
                text: vec![
                    RichText {
                        strikethrough: true,
                        ..plain("gone")
                    },
                    plain(" "),
                    RichText {
                        code: true,
                        ..plain("x = 1")
                    },
                ],
            }]
        );
    }

    #[test]
    fn unmatched_emphasis_stays_literal() {
        assert_eq!(
            parse_default("a ** b"),
            vec![Block::Paragraph {
                text: vec![plain("a ** b")],
            }]
        );
    }

    #[test]
    fn adjacent_plain_runs_merge_into_one_span() {
        // Softbreak-joined lines share one style and collapse to one span
        assert_eq!(
            parse_default("line one\nline two"),
            vec![Block::Paragraph {
                text: vec![plain("line one line two")],
            }]
        );
    }

    #[test]
    fn hard_break_becomes_newline() {
        assert_eq!(
            parse_default("one  \ntwo"),
            vec![Block::Paragraph {
                text: vec![plain("one\ntwo")],
            }]
        );
    }

    #[test]
    fn bulleted_and_numbered_lists() {
        assert_eq!(
            parse_default("- one\n- two"),
            vec![
                Block::BulletedListItem {
                    text: vec![plain("one")],
                    children: Vec::new(),
                },
                Block::BulletedListItem {
                    text: vec![plain("two")],
                    children: Vec::new(),
                },
            ]
        );
        assert_eq!(
            parse_default("1. one\n2. two"),
            vec![
                Block::NumberedListItem {
                    text: vec![plain("one")],
                    children: Vec::new(),
                },
                Block::NumberedListItem {
                    text: vec![plain("two")],
                    children: Vec::new(),
                },
            ]
        );
    }

    #[test]
    fn nested_list_items_become_children() {
        assert_eq!(
            parse_default("- parent\n  - child\n  - other"),
            vec![Block::BulletedListItem {
                text: vec![plain("parent")],
                children: vec![
                    Block::BulletedListItem {
                        text: vec![plain("child")],
                        children: Vec::new(),
                    },
                    Block::BulletedListItem {
                        text: vec![plain("other")],
                        children: Vec::new(),
                    },
                ],
            }]
        );
    }

    #[test]
    fn task_items_become_to_dos() {
        assert_eq!(
            parse_default("- [x] done\n- [ ] pending"),
            vec![
                Block::ToDo {
                    checked: true,
                    text: vec![plain("done")],
                    children: Vec::new(),
                },
                Block::ToDo {
                    checked: false,
                    text: vec![plain("pending")],
                    children: Vec::new(),
                },
            ]
        );
    }

    #[test]
    fn loose_item_keeps_second_paragraph_as_child() {
        assert_eq!(
            parse_default("- first\n\n  second\n"),
            vec![Block::BulletedListItem {
                text: vec![plain("first")],
                children: vec![Block::Paragraph {
                    text: vec![plain("second")],
                }],
            }]
        );
    }

    #[test]
    fn quote_with_trailing_paragraph_children() {
        assert_eq!(
            parse_default("> first\n>\n> second"),
            vec![Block::Quote {
                text: vec![plain("first")],
                children: vec![Block::Paragraph {
                    text: vec![plain("second")],
                }],
            }]
        );
    }

    #[test]
    fn code_block_inside_quote_becomes_child() {
        assert_eq!(
            parse_default("> note\n>\n> ```\n> let y;\n> ```"),
            vec![Block::Quote {
                text: vec![plain("note")],
                children: vec![Block::Code {
                    language: None,
                    text: vec![plain("let y;")],
                }],
            }]
        );
    }

    #[test]
    fn gfm_alert_becomes_callout() {
        assert_eq!(
            parse_default("> [!WARNING]\n> Mind the gap"),
            vec![Block::Callout {
                icon: "⚠️".to_string(),
                text: vec![plain("Mind the gap")],
                children: Vec::new(),
            }]
        );
    }

    #[test]
    fn fenced_code_block_with_language() {
        assert_eq!(
            parse_default("```rust\nlet x = 1;\n```"),
            vec![Block::Code {
                language: Some("rust".to_string()),
                text: vec![plain("let x = 1;")],
            }]
        );
    }

    #[test]
    fn unterminated_fence_closes_at_end_of_input() {
        assert_eq!(
            parse_default("```rust\nlet x = 1;"),
            vec![Block::Code {
                language: Some("rust".to_string()),
                text: vec![plain("let x = 1;")],
            }]
        );
    }

    #[test]
    fn horizontal_rule_is_divider() {
        assert_eq!(parse_default("---\n"), vec![Block::Divider]);
    }

    #[test]
    fn table_rows_with_header_first() {
        assert_eq!(
            parse_default("| A | B |\n|---|---|\n| 1 | 2 |"),
            vec![Block::Table {
                table_width: 2,
                has_column_header: true,
                rows: vec![
                    TableRow {
                        cells: vec![vec![plain("A")], vec![plain("B")]],
                    },
                    TableRow {
                        cells: vec![vec![plain("1")], vec![plain("2")]],
                    },
                ],
            }]
        );
    }

    #[test]
    fn image_with_valid_url() {
        assert_eq!(
            parse_default("![logo](http://example.com/logo.png)"),
            vec![Block::Image {
                url: "http://example.com/logo.png".to_string(),
            }]
        );
    }

    #[test]
    fn strict_mode_turns_invalid_image_into_text() {
        let options = ConvertOptions {
            strict_image_urls: true,
            ..ConvertOptions::default()
        };
        assert_eq!(
            parse("![alt](not-a-url)", &options),
            vec![Block::Paragraph {
                text: vec![plain("alt")],
            }]
        );
    }

    #[test]
    fn loose_mode_passes_invalid_url_through() {
        assert_eq!(
            parse_default("![alt](not-a-url)"),
            vec![Block::Image {
                url: "not-a-url".to_string(),
            }]
        );
    }

    #[test]
    fn inline_image_splits_the_paragraph_in_order() {
        assert_eq!(
            parse_default("before ![pic](http://x.com/a.png) after"),
            vec![
                Block::Paragraph {
                    text: vec![plain("before ")],
                },
                Block::Image {
                    url: "http://x.com/a.png".to_string(),
                },
                Block::Paragraph {
                    text: vec![plain(" after")],
                },
            ]
        );
    }

    #[test]
    fn image_inside_list_item_becomes_child() {
        assert_eq!(
            parse_default("- see ![pic](http://x.com/a.png)"),
            vec![Block::BulletedListItem {
                text: vec![plain("see ")],
                children: vec![Block::Image {
                    url: "http://x.com/a.png".to_string(),
                }],
            }]
        );
    }

    #[test]
    fn heading_inside_list_degrades_to_child() {
        assert_eq!(
            parse_default("- item\n  # Inside"),
            vec![Block::BulletedListItem {
                text: vec![plain("item")],
                children: vec![Block::Heading {
                    level: 1,
                    text: vec![plain("Inside")],
                }],
            }]
        );
    }

    #[test]
    fn frontmatter_is_stripped() {
        assert_eq!(
            parse_default("---\ntitle: Doc\n---\n\nBody text"),
            vec![Block::Paragraph {
                text: vec![plain("Body text")],
            }]
        );
    }

    #[test]
    fn link_spans_keep_emphasis_flags() {
        assert_eq!(
            parse_default("[**bold link**](http://x.com)"),
            vec![Block::Paragraph {
                text: vec![RichText {
                    bold: true,
                    link: Some("http://x.com".to_string()),
                    ..plain("bold link")
                }],
            }]
        );
    }

    #[test]
    fn top_level_order_is_source_order() {
        let blocks = parse_default("# Title\n\npara\n\n- item\n\n---\n\n> quote");
        let kinds: Vec<&str> = blocks
            .iter()
            .map(|block| match block {
                Block::Heading { .. } => "heading",
                Block::Paragraph { .. } => "paragraph",
                Block::BulletedListItem { .. } => "bulleted_list_item",
                Block::Divider => "divider",
                Block::Quote { .. } => "quote",
                _ => "other",
            })
            .collect();
        assert_eq!(
            kinds,
            vec!["heading", "paragraph", "bulleted_list_item", "divider", "quote"]
        );
    }
}
