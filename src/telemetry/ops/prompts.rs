use tracing::Span;
use tracing::info_span;

use crate::telemetry::ctx::{OpMarker, PhaseSpan};

#[derive(Copy, Clone, Debug)]
pub struct Prompts;

#[derive(Copy, Clone, Debug)]
pub enum Phase { Read, Sample, Write }

impl PhaseSpan for Phase {
    fn name(&self) -> &'static str { match self {
        Phase::Read => "read",
        Phase::Sample => "sample",
        Phase::Write => "write",
    }}
    fn span(&self) -> Span { match self {
        Phase::Read => info_span!("read"),
        Phase::Sample => info_span!("sample"),
        Phase::Write => info_span!("write"),
    }}
}

impl OpMarker for Prompts {
    const NAME: &'static str = "prompts";
    type Phase = Phase;
    fn root_span() -> Span { info_span!("prompts") }
}
