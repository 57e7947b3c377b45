use tracing::Span;
use tracing::info_span;

use crate::telemetry::ctx::{OpMarker, PhaseSpan};

#[derive(Copy, Clone, Debug)]
pub struct Query;

#[derive(Copy, Clone, Debug)]
pub enum Phase { DiscoverModel, Complete, Write }

impl PhaseSpan for Phase {
    fn name(&self) -> &'static str { match self {
        Phase::DiscoverModel => "discover_model",
        Phase::Complete => "complete",
        Phase::Write => "write",
    }}
    fn span(&self) -> Span { match self {
        Phase::DiscoverModel => info_span!("discover_model"),
        Phase::Complete => info_span!("complete"),
        Phase::Write => info_span!("write"),
    }}
}

impl OpMarker for Query {
    const NAME: &'static str = "query";
    type Phase = Phase;
    fn root_span() -> Span { info_span!("query") }
}
