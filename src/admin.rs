use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};
use clap::{Args, Subcommand};
use serde::Serialize;
use tokio::sync::mpsc;

use crate::api::types::{AuthStatus, BusinessDraft, RecordStatus, ReviewDecision};
use crate::api::{ApiClient, ApiError, Session};
use crate::output::types::Meta;
use crate::telemetry::ctx::LogCtx;
use crate::telemetry::ops::admin::{Admin, Phase as AdminPhase};
use crate::telemetry::ops::watch::Phase as WatchPhase;
use crate::telemetry::{self};
use crate::watch::{self, CountChange};

/// `biz admin ...`
#[derive(Args)]
pub struct AdminCmd {
    #[command(subcommand)]
    pub cmd: AdminSub,
}

#[derive(Subcommand)]
pub enum AdminSub {
    /// Log in and persist the session cookie
    Login {
        #[arg(long, short)]
        username: String,
        /// Falls back to BIZ_ADMIN_PASSWORD
        #[arg(long)]
        password: Option<String>,
    },
    /// End the session and forget the stored cookie
    Logout,
    /// Show who the stored session belongs to
    Status,
    /// Number of listings added recently
    NewCount,
    /// Poll the new-listing count and report changes until Ctrl-C
    Watch {
        /// Seconds between polls
        #[arg(long, default_value_t = watch::DEFAULT_POLL_INTERVAL.as_secs())]
        interval: u64,
    },
    /// Listing applications
    Apps {
        #[command(subcommand)]
        cmd: AppsSub,
    },
    /// Directory entries
    Business {
        #[command(subcommand)]
        cmd: BusinessSub,
    },
}

#[derive(Subcommand)]
pub enum AppsSub {
    Ls {
        /// pending | approved | rejected
        #[arg(long)]
        status: Option<String>,
    },
    Approve {
        id: String,
        #[arg(long, default_value_t = false)]
        apply: bool,
    },
    Reject {
        id: String,
        #[arg(long, default_value_t = false)]
        apply: bool,
    },
}

#[derive(Subcommand)]
pub enum BusinessSub {
    Add {
        #[command(flatten)]
        fields: DraftArgs,
        #[arg(long, default_value_t = false)]
        apply: bool,
    },
    Update {
        id: String,
        #[command(flatten)]
        fields: DraftArgs,
        /// Replace the listing image (sent as multipart)
        #[arg(long)]
        image: Option<PathBuf>,
        #[arg(long, default_value_t = false)]
        apply: bool,
    },
    Delete {
        id: String,
        #[arg(long, default_value_t = false)]
        apply: bool,
    },
    /// Mark or unmark a listing as featured
    Feature {
        id: String,
        #[arg(long, default_value_t = false)]
        off: bool,
        #[arg(long, default_value_t = false)]
        apply: bool,
    },
}

#[derive(Args, Debug, Default)]
pub struct DraftArgs {
    #[arg(long)] pub name: Option<String>,
    #[arg(long)] pub category: Option<String>,
    #[arg(long)] pub location: Option<String>,
    #[arg(long)] pub contact: Option<String>,
    #[arg(long)] pub tel: Option<String>,
    #[arg(long)] pub email: Option<String>,
    #[arg(long)] pub website: Option<String>,
    #[arg(long)] pub description: Option<String>,
    /// pending | approved | rejected
    #[arg(long)] pub status: Option<String>,
}

impl DraftArgs {
    fn into_draft(self) -> Result<BusinessDraft> {
        let status = self.status.as_deref().map(parse_status).transpose()?;
        Ok(BusinessDraft {
            business_name: self.name,
            category: self.category,
            location: self.location,
            contact_name: self.contact,
            tel: self.tel,
            email: self.email,
            website: self.website,
            description: self.description,
            status,
        })
    }
}

fn parse_status(s: &str) -> Result<RecordStatus> {
    s.parse().map_err(|e: String| anyhow!(e))
}

/// What a mutating command is about to do; printed in plan mode.
#[derive(Serialize, Debug, Default)]
struct MutationPlan {
    action: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    target: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    draft: Option<BusinessDraft>,
    #[serde(skip_serializing_if = "Option::is_none")]
    image: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    featured: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    decision: Option<ReviewDecision>,
}

impl MutationPlan {
    fn describe(&self) -> String {
        let mut s = self.action.to_string();
        if let Some(t) = &self.target { s.push_str(&format!(" #{t}")); }
        if let Some(d) = &self.draft {
            let fields: Vec<&str> = d.form_fields().into_iter().map(|(k, _)| k).collect();
            if !fields.is_empty() { s.push_str(&format!(" fields=[{}]", fields.join(","))); }
        }
        if let Some(img) = &self.image { s.push_str(&format!(" image={}", img.display())); }
        if let Some(f) = self.featured { s.push_str(&format!(" featured={f}")); }
        if let Some(d) = self.decision { s.push_str(&format!(" decision={d:?}")); }
        s
    }
}

/// Logs the plan; returns whether to go ahead.
fn announce(log: &LogCtx<Admin>, plan: &MutationPlan, apply: bool) -> Result<bool> {
    let _p = log.span(&AdminPhase::Plan).entered();
    log.info(format!("📝 {}", plan.describe()));
    if apply { return Ok(true); }
    log.info("   Use --apply to execute.");
    if telemetry::config::json_mode() { log.plan(plan)?; }
    Ok(false)
}

fn with_login_hint(e: ApiError) -> anyhow::Error {
    if e.is_unauthorized() { anyhow!("{e}; run `biz admin login` first") } else { e.into() }
}

#[derive(Serialize)]
struct Done<'a> {
    action: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<String>,
}

pub async fn run(api: &ApiClient, args: AdminCmd) -> Result<()> {
    let log = telemetry::admin();
    let _g = log.root_span().entered();
    let json = telemetry::config::json_mode();
    let session_file = api.config().session_file.clone();

    match args.cmd {
        AdminSub::Login { username, password } => {
            let _s = log.span_kv(&AdminPhase::Login, [("username", username.clone())]).entered();
            let password = match password {
                Some(p) => p,
                None => std::env::var("BIZ_ADMIN_PASSWORD")
                    .map_err(|_| anyhow!("Please provide --password or set BIZ_ADMIN_PASSWORD"))?,
            };
            let resp = api.login(&username, &password).await?;
            if !api.session().save(&session_file, api.base())? {
                log.warn("server did not set a session cookie; later admin calls will be anonymous");
            }
            match resp.message.as_deref().filter(|m| !m.is_empty()) {
                Some(msg) => log.info(format!("✅ {msg} ({})", resp.user.username)),
                None => log.info(format!("✅ Logged in as {}", resp.user.username)),
            }
            if json { log.result(&resp.user)?; }
        }
        AdminSub::Logout => {
            let _s = log.span(&AdminPhase::Logout).entered();
            match api.logout().await {
                Ok(()) => {}
                Err(e) if e.is_unauthorized() => log.debug("session already expired"),
                Err(e) => log.warn(format!("logout request failed: {e}")),
            }
            Session::clear(&session_file)?;
            log.info("👋 Logged out");
            if json { log.result(&Done { action: "logout", id: None })?; }
        }
        AdminSub::Status => {
            let _s = log.span(&AdminPhase::AuthCheck).entered();
            if !api.session().is_active(api.base()) {
                log.debug(format!("no stored session in {}", session_file.display()));
            }
            match api.auth_check().await? {
                AuthStatus::Authenticated(user) => {
                    log.info(format!("🔑 Authenticated as {} (id {})", user.username, user.id));
                    if json { log.result(&user)?; }
                }
                AuthStatus::Anonymous => {
                    log.info("🔒 Not logged in");
                    if json { log.result(&serde_json::Value::Null)?; }
                }
            }
        }
        AdminSub::NewCount => {
            let count = api.new_count().await.map_err(with_login_hint)?;
            log.info(format!("🆕 {count} new listings"));
            if json { log.result(&crate::api::types::NewCount { count })?; }
        }
        AdminSub::Watch { interval } => watch_new_count(api, Duration::from_secs(interval.max(1))).await?,
        AdminSub::Apps { cmd } => apps(api, &log, cmd).await?,
        AdminSub::Business { cmd } => business(api, &log, cmd).await?,
    }
    Ok(())
}

async fn watch_new_count(api: &ApiClient, every: Duration) -> Result<()> {
    let log = telemetry::watch();
    let _g = log.root_span_kv([("interval_secs", every.as_secs().to_string())]).entered();
    let (tx, mut rx) = mpsc::channel::<CountChange>(8);
    let poller = watch::poll(api, every, tx);
    tokio::pin!(poller);

    loop {
        tokio::select! {
            res = &mut poller => { res.map_err(with_login_hint)?; break; }
            Some(change) = rx.recv() => {
                let _s = log.span(&WatchPhase::Poll).entered();
                match change {
                    CountChange::Initial { count } => log.info(format!("🆕 {count} new listings")),
                    CountChange::Increased { from, to } => log.info(format!("🔔 new listings: {from} → {to}")),
                    CountChange::Decreased { from, to } => log.info(format!("new listings: {from} → {to}")),
                }
                if telemetry::config::json_mode() { log.result(&change)?; }
            }
            _ = tokio::signal::ctrl_c() => { log.info("stopped"); break; }
        }
    }
    Ok(())
}

async fn apps(api: &ApiClient, log: &LogCtx<Admin>, cmd: AppsSub) -> Result<()> {
    let started = Instant::now();
    let json = telemetry::config::json_mode();
    let (id, decision, apply) = match cmd {
        AppsSub::Ls { status } => {
            let status = status.as_deref().map(parse_status).transpose()?;
            let _s = log.span_kv(&AdminPhase::Applications, [("status", format!("{status:?}"))]).entered();
            let apps = api.applications(status).await.map_err(with_login_hint)?;
            for a in &apps {
                let when = a.submitted_at.map(|t| t.format("%Y-%m-%d").to_string()).unwrap_or_default();
                log.info(format!("[{}] {} — {} · {} ({}) {}", a.id, a.business_name, a.category, a.location, a.status.as_str(), when));
            }
            log.info(format!("📋 {} applications", apps.len()));
            if json { log.result(&apps)?; }
            return Ok(());
        }
        AppsSub::Approve { id, apply } => (id, ReviewDecision::Approved, apply),
        AppsSub::Reject { id, apply } => (id, ReviewDecision::Rejected, apply),
    };

    let plan = MutationPlan { action: "review_application", target: Some(id.clone()), decision: Some(decision), ..Default::default() };
    if !announce(log, &plan, apply)? { return Ok(()); }
    let _s = log.span_kv(&AdminPhase::Review, [("id", id.clone())]).entered();
    api.review_application(&id, decision).await.map_err(with_login_hint)?;
    log.info(format!("✅ Application {id} {decision:?}"));
    if json { log.result_with(&plan, Meta::for_api(api.base()).timed(started))?; }
    Ok(())
}

async fn business(api: &ApiClient, log: &LogCtx<Admin>, cmd: BusinessSub) -> Result<()> {
    let started = Instant::now();
    let json = telemetry::config::json_mode();
    match cmd {
        BusinessSub::Add { fields, apply } => {
            let draft = fields.into_draft()?;
            if draft.business_name.as_deref().map_or(true, |n| n.trim().is_empty()) {
                return Err(anyhow!("--name is required"));
            }
            let plan = MutationPlan { action: "create_business", draft: Some(draft), ..Default::default() };
            if !announce(log, &plan, apply)? { return Ok(()); }
            let _s = log.span(&AdminPhase::Business).entered();
            let draft = plan.draft.clone().unwrap_or_default();
            let id = api.create_business(&draft).await.map_err(with_login_hint)?;
            log.info(format!("✅ Created {}", id.as_deref().unwrap_or("business")));
            if json { log.result_with(&Done { action: "create_business", id }, Meta::for_api(api.base()).timed(started))?; }
        }
        BusinessSub::Update { id, fields, image, apply } => {
            let draft = fields.into_draft()?;
            if draft.is_empty() && image.is_none() {
                return Err(anyhow!("nothing to update; pass at least one field or --image"));
            }
            let plan = MutationPlan { action: "update_business", target: Some(id.clone()), draft: Some(draft), image, ..Default::default() };
            if !announce(log, &plan, apply)? { return Ok(()); }
            let _s = log.span_kv(&AdminPhase::Business, [("id", id.clone())]).entered();
            let draft = plan.draft.clone().unwrap_or_default();
            api.update_business(&id, &draft, plan.image.as_deref()).await.map_err(with_login_hint)?;
            log.info(format!("✅ Updated {id}"));
            if json { log.result_with(&Done { action: "update_business", id: Some(id) }, Meta::for_api(api.base()).timed(started))?; }
        }
        BusinessSub::Delete { id, apply } => {
            let plan = MutationPlan { action: "delete_business", target: Some(id.clone()), ..Default::default() };
            if !announce(log, &plan, apply)? { return Ok(()); }
            let _s = log.span_kv(&AdminPhase::Business, [("id", id.clone())]).entered();
            api.delete_business(&id).await.map_err(with_login_hint)?;
            log.info(format!("🗑️  Deleted {id}"));
            if json { log.result_with(&Done { action: "delete_business", id: Some(id) }, Meta::for_api(api.base()).timed(started))?; }
        }
        BusinessSub::Feature { id, off, apply } => {
            let plan = MutationPlan { action: "set_featured", target: Some(id.clone()), featured: Some(!off), ..Default::default() };
            if !announce(log, &plan, apply)? { return Ok(()); }
            let _s = log.span_kv(&AdminPhase::Business, [("id", id.clone())]).entered();
            api.set_featured(&id, !off).await.map_err(with_login_hint)?;
            log.info(format!("⭐ {id} featured={}", !off));
            if json { log.result_with(&plan, Meta::for_api(api.base()).timed(started))?; }
        }
    }
    Ok(())
}
