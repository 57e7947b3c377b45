use tracing::Span;
use tracing::info_span;

use crate::telemetry::ctx::{OpMarker, PhaseSpan};

#[derive(Copy, Clone, Debug)]
pub struct Segment;

#[derive(Copy, Clone, Debug)]
pub enum Phase { LoadModel, Render, Tokenize, Write }

impl PhaseSpan for Phase {
    fn name(&self) -> &'static str { match self {
        Phase::LoadModel => "load_model",
        Phase::Render => "render",
        Phase::Tokenize => "tokenize",
        Phase::Write => "write",
    }}
    fn span(&self) -> Span { match self {
        Phase::LoadModel => info_span!("load_model"),
        Phase::Render => info_span!("render"),
        Phase::Tokenize => info_span!("tokenize"),
        Phase::Write => info_span!("write"),
    }}
}

impl OpMarker for Segment {
    const NAME: &'static str = "segment";
    type Phase = Phase;
    fn root_span() -> Span { info_span!("segment") }
}
