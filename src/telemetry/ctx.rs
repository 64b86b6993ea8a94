use anyhow::Result;
use serde::Serialize;
use std::marker::PhantomData;
use tracing::{info, debug, warn, Span};

use crate::feed::FeedStatus;
use crate::output::{self, types::{Envelope, Meta}};

pub trait PhaseSpan {
    fn name(&self) -> &'static str;
    fn span(&self) -> Span;
}

pub trait OpMarker {
    const NAME: &'static str;
    type Phase: PhaseSpan;
    fn root_span() -> Span;
}

pub struct LogCtx<O: OpMarker> {
    pub(crate) json: bool,
    pub(crate) _marker: PhantomData<O>,
}

impl<O: OpMarker> LogCtx<O> {
    fn op_name(&self) -> &'static str { O::NAME }

    pub fn root_span(&self) -> Span { O::root_span() }

    pub fn root_span_kv<'a, T>(&self, fields: T) -> Span
    where
        T: IntoIterator<Item = (&'a str, String)>,
    {
        let span = self.root_span();
        let details = kv_to_string(fields);
        if details.is_empty() {
            debug!(op = %self.op_name(), "start");
        } else {
            debug!(op = %self.op_name(), details = %details, "start");
        }
        span
    }

    pub fn span(&self, ph: &O::Phase) -> Span { ph.span() }

    pub fn span_kv<'a, T>(&self, ph: &O::Phase, fields: T) -> Span
    where
        T: IntoIterator<Item = (&'a str, String)>,
    {
        let span = self.span(ph);
        let details = kv_to_string(fields);
        if !details.is_empty() {
            debug!(op = %self.op_name(), phase = ph.name(), details = %details, "span_start");
        }
        span
    }

    pub fn info(&self, msg: impl AsRef<str>) { if self.json { info!(op = %self.op_name(), "{}", msg.as_ref()); } else { info!("{}", msg.as_ref()); } }
    pub fn debug(&self, msg: impl AsRef<str>) { if self.json { debug!(op = %self.op_name(), "{}", msg.as_ref()); } else { debug!("{}", msg.as_ref()); } }
    pub fn warn(&self, msg: impl AsRef<str>) { if self.json { warn!(op = %self.op_name(), "{}", msg.as_ref()); } else { warn!("{}", msg.as_ref()); } }

    pub fn plan<T: Serialize>(&self, plan: &T) -> Result<()> {
        let env = Envelope::plan(self.op_name(), plan, None)?;
        output::emit(&env)
    }

    pub fn result<T: Serialize>(&self, result: &T) -> Result<()> {
        let env = Envelope::result(self.op_name(), result, None)?;
        output::emit(&env)
    }

    pub fn result_with<T: Serialize>(&self, result: &T, meta: Meta) -> Result<()> {
        let env = Envelope::result(self.op_name(), result, Some(meta))?;
        output::emit(&env)
    }
}

// Browse-specific helpers
impl LogCtx<crate::telemetry::ops::browse::Browse> {
    pub fn page(&self, len: usize, total: Option<u64>, status: FeedStatus) {
        let total = total.map(|t| t.to_string()).unwrap_or_else(|| "?".to_string());
        if self.json { info!(op = %self.op_name(), len, total = %total, status = ?status, "page"); }
        else { info!("📄 {} of {} loaded ({:?})", len, total, status); }
    }

    /// User-facing failure notice; the feed keeps whatever it already has.
    pub fn failure(&self, message: &str, retryable: bool) {
        if self.json { warn!(op = %self.op_name(), retryable, "{}", message); }
        else if retryable { warn!("⚠️ {} — type `r` to retry", message); }
        else { warn!("⚠️ {}", message); }
    }
}

fn kv_to_string<'a, T>(kv: T) -> String
where
    T: IntoIterator<Item = (&'a str, String)>,
{
    let mut parts: Vec<String> = Vec::new();
    for (k, v) in kv { parts.push(format!("{}={}", k, v)); }
    parts.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kv_pairs_join_with_spaces() {
        let s = kv_to_string([("category", "Retail".to_string()), ("q", "mar".to_string())]);
        assert_eq!(s, "category=Retail q=mar");
        assert_eq!(kv_to_string(Vec::<(&str, String)>::new()), "");
    }
}
