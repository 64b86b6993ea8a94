use anyhow::Result;
use clap::{Args, Subcommand};

use crate::api::ApiClient;
use crate::telemetry::{self};
use crate::telemetry::ops::catalog::Phase as CatalogPhase;

/// `biz catalog ...`
#[derive(Args)]
pub struct CatalogCmd {
    #[command(subcommand)]
    pub cmd: CatalogSub,
}

#[derive(Subcommand)]
pub enum CatalogSub {
    /// List all categories
    Categories,
    /// Categories with the most approved businesses
    Top {
        #[arg(long, default_value_t = 8)]
        limit: u32,
    },
    /// Featured businesses
    Featured {
        #[arg(long, default_value_t = 6)]
        limit: u32,
    },
    /// One page of full-text search results
    Search {
        q: String,
        #[arg(long, default_value_t = 12)]
        limit: u32,
        #[arg(long, default_value_t = 0)]
        offset: u32,
    },
}

pub async fn run(api: &ApiClient, args: CatalogCmd) -> Result<()> {
    let log = telemetry::catalog();
    let _g = log.root_span().entered();
    let json = telemetry::config::json_mode();

    match args.cmd {
        CatalogSub::Categories => {
            let cats = { let _s = log.span(&CatalogPhase::Categories).entered(); api.categories().await? };
            for c in &cats { log.info(format!("[{}] {}", c.id, c.name)); }
            log.info(format!("🏷️  {} categories", cats.len()));
            if json { log.result(&cats)?; }
        }
        CatalogSub::Top { limit } => {
            let top = { let _s = log.span(&CatalogPhase::Top).entered(); api.top_categories(limit).await? };
            for (i, t) in top.iter().enumerate() { log.info(format!("{:>2}. {} ({})", i + 1, t.category, t.business_count)); }
            if json { log.result(&top)?; }
        }
        CatalogSub::Featured { limit } => {
            let items = { let _s = log.span(&CatalogPhase::Featured).entered(); api.featured(limit).await? };
            for b in &items { log.info(format!("★ {} — {} · {}", b.name, b.category, b.location)); }
            if items.is_empty() { log.info("No featured businesses"); }
            if json { log.result(&items)?; }
        }
        CatalogSub::Search { q, limit, offset } => {
            let _s = log.span_kv(&CatalogPhase::Search, [
                ("q", q.clone()),
                ("limit", limit.to_string()),
                ("offset", offset.to_string()),
            ]).entered();
            let page = api.search(&q, limit, offset).await?;
            for (i, b) in page.items.iter().enumerate() {
                log.info(format!("[{}] {} — {} · {}", offset as usize + i + 1, b.name, b.category, b.location));
            }
            log.info(format!("🔎 {} of {} matches", page.items.len(), page.total));
            if json { log.result(&page)?; }
        }
    }
    Ok(())
}
