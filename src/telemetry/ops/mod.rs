pub mod segment;
pub mod prompts;
pub mod query;
