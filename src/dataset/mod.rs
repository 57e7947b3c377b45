pub mod error;
pub mod reader;
pub mod types;
pub mod writer;

pub use reader::JsonlReader;
pub use types::{ChatRow, CompletionRow, FieldNames, PromptRow, SourceRow, TrainingRecord};
pub use writer::JsonlWriter;
