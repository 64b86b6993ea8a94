use tracing::Span;
use tracing::info_span;

use crate::telemetry::ctx::{OpMarker, PhaseSpan};

#[derive(Copy, Clone, Debug)]
pub struct Browse;

#[derive(Copy, Clone, Debug)]
pub enum Phase { Initial, More, Search, Render }

impl PhaseSpan for Phase {
    fn name(&self) -> &'static str { match self {
        Phase::Initial => "initial",
        Phase::More => "more",
        Phase::Search => "search",
        Phase::Render => "render",
    }}
    fn span(&self) -> Span { match self {
        Phase::Initial => info_span!("initial"),
        Phase::More => info_span!("more"),
        Phase::Search => info_span!("search"),
        Phase::Render => info_span!("render"),
    }}
}

impl OpMarker for Browse {
    const NAME: &'static str = "browse";
    type Phase = Phase;
    fn root_span() -> Span { info_span!("browse") }
}
