/// Input malformation found while reading a JSONL row.
#[derive(Debug)]
pub enum RowError {
    Io { line: usize, source: std::io::Error },
    Json { line: usize, source: serde_json::Error },
    NotAnObject { line: usize },
    MissingField { line: usize, field: String },
    FieldType { line: usize, field: String, expected: &'static str },
}

impl std::fmt::Display for RowError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RowError::Io { line, source } => write!(f, "line {line}: read error: {source}"),
            RowError::Json { line, source } => write!(f, "line {line}: invalid json: {source}"),
            RowError::NotAnObject { line } => write!(f, "line {line}: expected a json object"),
            RowError::MissingField { line, field } => write!(f, "line {line}: missing field `{field}`"),
            RowError::FieldType { line, field, expected } => {
                write!(f, "line {line}: field `{field}` must be {expected}")
            }
        }
    }
}

impl std::error::Error for RowError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RowError::Io { source, .. } => Some(source),
            RowError::Json { source, .. } => Some(source),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_type_display_names_field_and_line() {
        let err = RowError::FieldType { line: 7, field: "idx".into(), expected: "an integer" };
        assert_eq!(format!("{err}"), "line 7: field `idx` must be an integer");
    }
}
