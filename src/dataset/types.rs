use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::error::RowError;
use super::reader::RawRow;

/// Input field names, configurable from the CLI.
#[derive(Debug, Clone)]
pub struct FieldNames {
    pub prompt: String,
    pub completion: String,
    pub id: String,
}

impl Default for FieldNames {
    fn default() -> Self {
        Self { prompt: "prompt".into(), completion: "completion".into(), id: "idx".into() }
    }
}

/// A (prompt, completion) input row, resolved once at ingestion.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceRow {
    pub row_index: usize,
    pub external_id: Option<i64>,
    pub prompt_text: String,
    pub completion_text: String,
    /// Text fields that were absent and defaulted to ""
    pub missing: Vec<String>,
}

impl SourceRow {
    pub fn from_raw(raw: &RawRow, fields: &FieldNames) -> Result<Self, RowError> {
        let obj = as_object(raw)?;
        let mut missing = Vec::new();

        let prompt_text = match opt_str(obj, &fields.prompt, raw.line)? {
            Some(s) => s,
            None => { missing.push(fields.prompt.clone()); String::new() }
        };
        let completion_text = match opt_str(obj, &fields.completion, raw.line)? {
            Some(s) => s,
            None => { missing.push(fields.completion.clone()); String::new() }
        };
        let external_id = opt_i64(obj, &fields.id, raw.line)?;

        Ok(Self { row_index: raw.row_index, external_id, prompt_text, completion_text, missing })
    }

    /// Identifier written on every record of this row.
    pub fn source_id(&self) -> i64 {
        self.external_id.unwrap_or(self.row_index as i64)
    }
}

/// One (context, next-chunk) pair for draft-model training.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainingRecord {
    #[serde(rename = "idx")]
    pub source_id: i64,
    #[serde(rename = "chunk_idx")]
    pub chunk_index: usize,
    #[serde(rename = "prompt")]
    pub context_text: String,
    #[serde(rename = "completion")]
    pub target_text: String,
}

/// A chat-dataset row reduced to its user prompt and source tag.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRow {
    pub row_index: usize,
    pub prompt: String,
    pub source: Option<String>,
}

impl ChatRow {
    pub fn from_raw(raw: &RawRow, source_key: &str) -> Result<Self, RowError> {
        let obj = as_object(raw)?;
        let source = obj.get(source_key).and_then(Value::as_str).map(str::to_string);
        let prompt = extract_prompt(obj.get("messages"));
        Ok(Self { row_index: raw.row_index, prompt, source })
    }
}

// First user message wins, then the first message, then "".
fn extract_prompt(messages: Option<&Value>) -> String {
    let Some(messages) = messages.and_then(Value::as_array) else { return String::new() };
    let content = |m: &Value| -> String {
        m.get("content").and_then(Value::as_str).unwrap_or_default().to_string()
    };
    for msg in messages {
        if msg.is_object() && msg.get("role").and_then(Value::as_str) == Some("user") {
            return content(msg);
        }
    }
    match messages.first() {
        Some(first) if first.is_object() => content(first),
        _ => String::new(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptRow {
    pub prompt: String,
}

impl PromptRow {
    /// Prompt lookup for the query command; the prompt field is required there.
    pub fn from_raw(raw: &RawRow, prompt_key: &str) -> Result<Self, RowError> {
        let obj = as_object(raw)?;
        let prompt = opt_str(obj, prompt_key, raw.line)?
            .ok_or_else(|| RowError::MissingField { line: raw.line, field: prompt_key.to_string() })?;
        Ok(Self { prompt })
    }
}

/// Target-model answer for one prompt; the input format of the segment command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRow {
    pub idx: i64,
    pub prompt: String,
    pub completion: String,
}

fn as_object(raw: &RawRow) -> Result<&Map<String, Value>, RowError> {
    raw.value.as_object().ok_or(RowError::NotAnObject { line: raw.line })
}

fn opt_str(obj: &Map<String, Value>, key: &str, line: usize) -> Result<Option<String>, RowError> {
    match obj.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(RowError::FieldType { line, field: key.to_string(), expected: "a string" }),
    }
}

fn opt_i64(obj: &Map<String, Value>, key: &str, line: usize) -> Result<Option<i64>, RowError> {
    match obj.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v
            .as_i64()
            .map(Some)
            .ok_or_else(|| RowError::FieldType { line, field: key.to_string(), expected: "an integer" }),
    }
}
