pub mod prompts;
pub mod query;
pub mod segment;
