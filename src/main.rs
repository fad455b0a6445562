use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::exit;

use clap::Parser;

use md2notion::{BatchParams, Config, ConvertOptions, MarkdownSource, convert_items};

#[derive(Parser)]
#[command(name = "md2notion")]
#[command(about = "Convert Markdown to Notion-style blocks")]
struct Cli {
    /// Input Markdown file (reads stdin if omitted or "-")
    input: Option<PathBuf>,

    /// Output file (defaults to stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// TOML config file
    #[arg(long, default_value = "md2notion.toml")]
    config: PathBuf,

    /// Render images with invalid URLs as plain text
    #[arg(long)]
    strict_image_urls: bool,

    /// Keep oversized structures instead of truncating to the destination limits
    #[arg(long)]
    no_truncate: bool,

    /// Pretty-print the JSON output
    #[arg(long)]
    pretty: bool,

    /// Treat input as JSON Lines, one item object per line
    #[arg(long)]
    jsonl: bool,

    /// Item field holding the markdown (JSONL mode)
    #[arg(long, default_value = "markdown")]
    field: String,

    /// Item field the blocks are stored under (JSONL mode)
    #[arg(long, default_value = "notion_blocks")]
    output_field: String,

    /// Record failures on their item instead of stopping (JSONL mode)
    #[arg(long)]
    continue_on_error: bool,
}

fn main() {
    let cli = Cli::parse();

    let mut options = Config::load(&cli.config).options();
    if cli.strict_image_urls {
        options.strict_image_urls = true;
    }
    if cli.no_truncate {
        options.truncate = false;
    }

    let input = match read_input(cli.input.as_deref()) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("Error reading input: {}", e);
            exit(1);
        }
    };

    let rendered = if cli.jsonl {
        convert_jsonl(&input, &cli, options)
    } else {
        convert_document(&input, &cli, options)
    };

    match cli.output {
        Some(path) => {
            if let Err(e) = fs::write(&path, rendered) {
                eprintln!("Error writing {}: {}", path.display(), e);
                exit(1);
            }
            println!("Created {}", path.display());
        }
        None => println!("{}", rendered),
    }
}

fn read_input(path: Option<&Path>) -> std::io::Result<Vec<u8>> {
    match path {
        Some(path) if path != Path::new("-") => fs::read(path),
        _ => {
            let mut bytes = Vec::new();
            std::io::stdin().read_to_end(&mut bytes)?;
            Ok(bytes)
        }
    }
}

fn convert_document(input: &[u8], cli: &Cli, options: ConvertOptions) -> String {
    let blocks = match md2notion::markdown_to_blocks_bytes(input, &options) {
        Ok(blocks) => blocks,
        Err(e) => {
            eprintln!("Error: {}", e);
            exit(1);
        }
    };

    let rendered = if cli.pretty {
        serde_json::to_string_pretty(&blocks)
    } else {
        serde_json::to_string(&blocks)
    };
    match rendered {
        Ok(json) => json,
        Err(e) => {
            eprintln!("Error serializing blocks: {}", e);
            exit(1);
        }
    }
}

fn convert_jsonl(input: &[u8], cli: &Cli, options: ConvertOptions) -> String {
    let text = match std::str::from_utf8(input) {
        Ok(text) => text,
        Err(e) => {
            eprintln!("Error: input is not valid UTF-8 text: {}", e);
            exit(1);
        }
    };

    let mut items = Vec::new();
    for (number, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str(line) {
            Ok(item) => items.push(item),
            Err(e) => {
                eprintln!("Error parsing line {}: {}", number + 1, e);
                exit(1);
            }
        }
    }

    let params = BatchParams {
        source: MarkdownSource::Field(cli.field.clone()),
        output_field: cli.output_field.clone(),
        continue_on_error: cli.continue_on_error,
        options,
    };

    let converted = match convert_items(&items, &params) {
        Ok(converted) => converted,
        Err(e) => {
            eprintln!("Error: {}", e);
            exit(1);
        }
    };

    let mut lines = Vec::with_capacity(converted.len());
    for item in &converted {
        match serde_json::to_string(item) {
            Ok(json) => lines.push(json),
            Err(e) => {
                eprintln!("Error serializing item: {}", e);
                exit(1);
            }
        }
    }
    lines.join("\n")
}
