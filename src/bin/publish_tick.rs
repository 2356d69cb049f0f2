//! One autopublish cycle, for cron/systemd timers: fetch, select, send, commit.
//!
//! Without `state_path` (or `PUBLISH_STATE_PATH`) every run starts with an empty ledger and
//! quota, so duplicates and the daily limit are only enforced within a single run.

use anyhow::Result;
use clap::Parser;

use emek_relay::config::PublishConfig;
use emek_relay::engine::SelectOptions;
use emek_relay::logging::init_tracing;
use emek_relay::service::{PublishOutcome, PublishService};

#[derive(Debug, Parser)]
#[command(name = "publish-tick", about = "Run one publication cycle")]
struct Args {
    /// Ignore night hours, daily quota and minimum interval.
    #[arg(long)]
    force: bool,
    /// Prefer breaking items over input order.
    #[arg(long)]
    prefer_breaking: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    init_tracing();
    let args = Args::parse();

    let cfg = PublishConfig::load_default()?;
    if cfg.state_path.is_none() {
        tracing::warn!("no state_path configured; dedup and quota reset on every run");
    }
    let service = PublishService::from_config(&cfg).await?;

    let opts = SelectOptions {
        force: args.force,
        prefer_breaking: args.prefer_breaking,
    };
    match service.autopublish(opts).await? {
        PublishOutcome::Published(p) => {
            println!(
                "published: {} ({}/{})",
                p.post.title, p.daily.count, p.daily.limit
            );
        }
        PublishOutcome::Nothing(n) => println!("nothing to publish: {}", n.as_str()),
        PublishOutcome::Denied(d) => println!("skipped: {d}"),
        PublishOutcome::Refused(r) => println!("refused: {}", r.as_str()),
    }
    Ok(())
}
