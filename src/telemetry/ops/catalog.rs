use tracing::Span;
use tracing::info_span;

use crate::telemetry::ctx::{OpMarker, PhaseSpan};

#[derive(Copy, Clone, Debug)]
pub struct Catalog;

#[derive(Copy, Clone, Debug)]
pub enum Phase { Categories, Top, Featured, Search }

impl PhaseSpan for Phase {
    fn name(&self) -> &'static str { match self {
        Phase::Categories => "categories",
        Phase::Top => "top",
        Phase::Featured => "featured",
        Phase::Search => "search",
    }}
    fn span(&self) -> Span { match self {
        Phase::Categories => info_span!("categories"),
        Phase::Top => info_span!("top"),
        Phase::Featured => info_span!("featured"),
        Phase::Search => info_span!("search"),
    }}
}

impl OpMarker for Catalog {
    const NAME: &'static str = "catalog";
    type Phase = Phase;
    fn root_span() -> Span { info_span!("catalog") }
}
