pub mod config;
pub mod ctx;
pub mod emit;
pub mod ops;

use ctx::LogCtx;

pub fn segment() -> LogCtx<ops::segment::Segment> { LogCtx { json: config::logs_are_json(), _marker: std::marker::PhantomData } }
pub fn prompts() -> LogCtx<ops::prompts::Prompts> { LogCtx { json: config::logs_are_json(), _marker: std::marker::PhantomData } }
pub fn query() -> LogCtx<ops::query::Query> { LogCtx { json: config::logs_are_json(), _marker: std::marker::PhantomData } }
