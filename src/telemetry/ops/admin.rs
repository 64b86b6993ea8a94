use tracing::Span;
use tracing::info_span;

use crate::telemetry::ctx::{OpMarker, PhaseSpan};

#[derive(Copy, Clone, Debug)]
pub struct Admin;

#[derive(Copy, Clone, Debug)]
pub enum Phase { Plan, Login, Logout, AuthCheck, Applications, Review, Business }

impl PhaseSpan for Phase {
    fn name(&self) -> &'static str { match self {
        Phase::Plan => "plan",
        Phase::Login => "login",
        Phase::Logout => "logout",
        Phase::AuthCheck => "auth_check",
        Phase::Applications => "applications",
        Phase::Review => "review",
        Phase::Business => "business",
    }}
    fn span(&self) -> Span { match self {
        Phase::Plan => info_span!("plan"),
        Phase::Login => info_span!("login"),
        Phase::Logout => info_span!("logout"),
        Phase::AuthCheck => info_span!("auth_check"),
        Phase::Applications => info_span!("applications"),
        Phase::Review => info_span!("review"),
        Phase::Business => info_span!("business"),
    }}
}

impl OpMarker for Admin {
    const NAME: &'static str = "admin";
    type Phase = Phase;
    fn root_span() -> Span { info_span!("admin") }
}
