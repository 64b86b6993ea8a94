use tracing::Span;
use tracing::info_span;

use crate::telemetry::ctx::{OpMarker, PhaseSpan};

#[derive(Copy, Clone, Debug)]
pub struct Watch;

#[derive(Copy, Clone, Debug)]
pub enum Phase { Poll }

impl PhaseSpan for Phase {
    fn name(&self) -> &'static str { match self { Phase::Poll => "poll" } }
    fn span(&self) -> Span { match self { Phase::Poll => info_span!("poll") } }
}

impl OpMarker for Watch {
    const NAME: &'static str = "watch";
    type Phase = Phase;
    fn root_span() -> Span { info_span!("watch") }
}
