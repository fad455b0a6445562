use serde_json::{Map, Value};
use thiserror::Error;

use crate::config::ConvertOptions;
use crate::error::ParseError;
use crate::markdown_to_blocks_bytes;

/// Where each item's markdown comes from.
#[derive(Debug, Clone)]
pub enum MarkdownSource {
    /// Read the named field of the item object.
    Field(String),
    /// Use the same literal content for every item.
    Direct(String),
}

/// Settings for one batch run.
#[derive(Debug, Clone)]
pub struct BatchParams {
    pub source: MarkdownSource,
    /// Field the converted blocks are stored under.
    pub output_field: String,
    /// Record failures on their item instead of stopping the batch.
    pub continue_on_error: bool,
    pub options: ConvertOptions,
}

impl Default for BatchParams {
    fn default() -> Self {
        Self {
            source: MarkdownSource::Field("markdown".to_string()),
            output_field: "notion_blocks".to_string(),
            continue_on_error: false,
            options: ConvertOptions::default(),
        }
    }
}

/// Why a single item failed. Other items are unaffected.
#[derive(Debug, Error)]
pub enum ItemError {
    #[error("field '{0}' not found or empty in input data")]
    MissingField(String),
    #[error("markdown content must be a non-empty string")]
    EmptyInput,
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error("cannot serialize blocks: {0}")]
    Json(#[from] serde_json::Error),
}

/// A failure that stopped a batch, carrying the offending item's index.
#[derive(Debug, Error)]
#[error("item {index}: {source}")]
pub struct BatchError {
    pub index: usize,
    #[source]
    pub source: ItemError,
}

/// Convert a batch of independent items.
///
/// Each output item is its input object with the converted blocks attached
/// under the output field. With `continue_on_error`, a failed item instead
/// carries an `error` field with the failure message and the rest of the
/// batch proceeds; otherwise the first failure stops the run.
pub fn convert_items(items: &[Value], params: &BatchParams) -> Result<Vec<Value>, BatchError> {
    let mut converted = Vec::with_capacity(items.len());

    for (index, item) in items.iter().enumerate() {
        match convert_item(item, params) {
            Ok(output) => converted.push(output),
            Err(error) if params.continue_on_error => {
                let mut object = item_object(item);
                object.insert("error".to_string(), Value::String(error.to_string()));
                converted.push(Value::Object(object));
            }
            Err(source) => return Err(BatchError { index, source }),
        }
    }

    Ok(converted)
}

fn convert_item(item: &Value, params: &BatchParams) -> Result<Value, ItemError> {
    let markdown = match &params.source {
        MarkdownSource::Field(name) => item
            .get(name)
            .and_then(Value::as_str)
            .filter(|content| !content.is_empty())
            .ok_or_else(|| ItemError::MissingField(name.clone()))?,
        MarkdownSource::Direct(content) => content.as_str(),
    };
    if markdown.trim().is_empty() {
        return Err(ItemError::EmptyInput);
    }

    let blocks = markdown_to_blocks_bytes(markdown.as_bytes(), &params.options)?;

    let mut object = item_object(item);
    object.insert(params.output_field.clone(), serde_json::to_value(&blocks)?);
    Ok(Value::Object(object))
}

// Non-object items degrade to an empty object rather than failing the batch
fn item_object(item: &Value) -> Map<String, Value> {
    item.as_object().cloned().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn field_source_attaches_blocks_and_keeps_other_fields() {
        let items = vec![json!({ "id": 7, "markdown": "# Hi" })];
        let output = convert_items(&items, &BatchParams::default()).unwrap();

        assert_eq!(output[0]["id"], json!(7));
        assert_eq!(
            output[0]["notion_blocks"],
            json!([{ "type": "heading", "level": 1, "text": [{ "text": "Hi" }] }])
        );
    }

    #[test]
    fn missing_field_stops_the_batch_by_default() {
        let items = vec![json!({ "body": "# Hi" })];
        let error = convert_items(&items, &BatchParams::default()).unwrap_err();
        assert_eq!(error.index, 0);
        assert!(matches!(error.source, ItemError::MissingField(_)));
    }

    #[test]
    fn continue_on_error_isolates_the_failed_item() {
        let items = vec![
            json!({ "markdown": "first" }),
            json!({ "other": true }),
            json!({ "markdown": "third" }),
        ];
        let params = BatchParams {
            continue_on_error: true,
            ..BatchParams::default()
        };
        let output = convert_items(&items, &params).unwrap();

        assert_eq!(output.len(), 3);
        assert!(output[0].get("notion_blocks").is_some());
        assert_eq!(
            output[1]["error"],
            json!("field 'markdown' not found or empty in input data")
        );
        assert!(output[1].get("notion_blocks").is_none());
        assert!(output[2].get("notion_blocks").is_some());
    }

    #[test]
    fn direct_source_ignores_item_fields() {
        let items = vec![json!({}), json!({})];
        let params = BatchParams {
            source: MarkdownSource::Direct("same text".to_string()),
            ..BatchParams::default()
        };
        let output = convert_items(&items, &params).unwrap();
        for item in &output {
            assert_eq!(
                item["notion_blocks"],
                json!([{ "type": "paragraph", "text": [{ "text": "same text" }] }])
            );
        }
    }

    #[test]
    fn blank_direct_content_is_rejected() {
        let items = vec![json!({})];
        let params = BatchParams {
            source: MarkdownSource::Direct("   ".to_string()),
            ..BatchParams::default()
        };
        let error = convert_items(&items, &params).unwrap_err();
        assert!(matches!(error.source, ItemError::EmptyInput));
    }

    #[test]
    fn output_field_name_is_configurable() {
        let items = vec![json!({ "markdown": "text" })];
        let params = BatchParams {
            output_field: "blocks".to_string(),
            ..BatchParams::default()
        };
        let output = convert_items(&items, &params).unwrap();
        assert!(output[0].get("blocks").is_some());
    }
}
