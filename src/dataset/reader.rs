use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::{Context, Result};
use serde_json::Value;

use super::error::RowError;

/// One non-blank input line, parsed.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRow {
    /// 0-based position among non-blank lines
    pub row_index: usize,
    /// 1-based physical line number
    pub line: usize,
    pub value: Value,
}

/// Streams JSON values from newline-delimited input, skipping blank lines.
pub struct JsonlReader<R> {
    lines: std::io::Lines<R>,
    line: usize,
    row_index: usize,
}

impl JsonlReader<BufReader<File>> {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("open input {}", path.display()))?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: BufRead> JsonlReader<R> {
    pub fn new(reader: R) -> Self {
        Self { lines: reader.lines(), line: 0, row_index: 0 }
    }
}

impl<R: BufRead> Iterator for JsonlReader<R> {
    type Item = Result<RawRow, RowError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let raw = self.lines.next()?;
            self.line += 1;
            let line = self.line;
            let raw = match raw {
                Ok(s) => s,
                Err(source) => return Some(Err(RowError::Io { line, source })),
            };
            let trimmed = raw.trim();
            if trimmed.is_empty() { continue; }

            let value = match serde_json::from_str::<Value>(trimmed) {
                Ok(v) => v,
                Err(source) => return Some(Err(RowError::Json { line, source })),
            };
            let row_index = self.row_index;
            self.row_index += 1;
            return Some(Ok(RawRow { row_index, line, value }));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn blank_lines_do_not_consume_row_index() {
        let input = "{\"a\":1}\n\n   \n{\"a\":2}\n";
        let rows: Vec<RawRow> = JsonlReader::new(Cursor::new(input)).map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].row_index, 1);
        assert_eq!(rows[1].line, 4);
        assert_eq!(rows[1].value["a"], 2);
    }

    #[test]
    fn invalid_json_reports_line_number() {
        let input = "{\"a\":1}\nnot json\n";
        let mut reader = JsonlReader::new(Cursor::new(input));
        assert!(reader.next().unwrap().is_ok());
        let err = reader.next().unwrap().unwrap_err();
        assert!(matches!(err, RowError::Json { line: 2, .. }));
    }

    #[test]
    fn handles_missing_trailing_newline() {
        let rows: Vec<_> = JsonlReader::new(Cursor::new("{\"a\":1}")).collect();
        assert_eq!(rows.len(), 1);
    }
}
