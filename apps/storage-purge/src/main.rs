//! Storage purge
//!
//! Deletes every stored object that does not belong to the preserved
//! account. Runs as a dry run unless `--execute` is given.
//!
//! - `compliance`: kept objects come from the keeper's `compliance_documents`
//!   rows; the run aborts if that list cannot be built
//! - `tenders_documents`: kept objects come from the keeper's tenders, or
//!   only foreign UUID folders are removed when no file table is found
//! - `templates`: never touched

use std::sync::Arc;

use anyhow::{anyhow, Context};
use clap::Parser;
use platform::{RestDatabase, RestObjectStorage};
use tracing::{info, Level};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod error;
mod paths;
mod purge;

use paths::Keeper;
use purge::{PurgePlan, Purger};

const EXAMPLES_SHOWN: usize = 10;

#[derive(Parser, Debug)]
#[command(name = "storage-purge")]
#[command(about = "Remove stored files that do not belong to the preserved account")]
struct Args {
    /// Actually delete; without this flag only the plan is printed
    #[arg(long)]
    execute: bool,

    /// User id whose files are preserved
    #[arg(long, env = "KEEPER_USER_ID")]
    keeper_id: String,

    /// Shown in the summary only
    #[arg(long, env = "KEEPER_EMAIL")]
    keeper_email: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn env_value(names: &[&str]) -> Option<String> {
    names
        .iter()
        .filter_map(|name| std::env::var(name).ok())
        .find(|v| !v.trim().is_empty())
}

fn print_plan(plan: &PurgePlan) {
    for bucket in &plan.buckets {
        let protected = bucket
            .protected
            .map(|n| format!("{} protected by database", n))
            .unwrap_or_else(|| "UUID-folder rule".to_string());
        println!(
            "[{}] scanned {}, {}, {} to delete",
            bucket.bucket,
            bucket.scanned,
            protected,
            bucket.to_delete.len()
        );
        for path in bucket.to_delete.iter().take(EXAMPLES_SHOWN) {
            println!("    - {}", path);
        }
        if bucket.to_delete.len() > EXAMPLES_SHOWN {
            println!("    ... and {} more", bucket.to_delete.len() - EXAMPLES_SHOWN);
        }
    }
    println!("Total objects to delete: {}", plan.total());
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let log_level = if args.verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let url = env_value(&["SUPABASE_URL", "VITE_SUPABASE_URL"])
        .ok_or_else(|| anyhow!("SUPABASE_URL is not set"))?;
    let key = env_value(&["SUPABASE_SERVICE_ROLE_KEY"])
        .ok_or_else(|| anyhow!("SUPABASE_SERVICE_ROLE_KEY is not set"))?;

    let db = RestDatabase::new(&url, &key).context("database client")?;
    let storage = RestObjectStorage::new(&url, &key).context("storage client")?;

    let keeper = Keeper::new(args.keeper_id.trim());
    info!(
        keeper = %keeper.id,
        email = args.keeper_email.as_deref().unwrap_or("-"),
        mode = if args.execute { "execute" } else { "dry-run" },
        "starting purge"
    );

    let purger = Purger::new(Arc::new(db), Arc::new(storage), keeper);
    let plan = purger.plan().await?;
    print_plan(&plan);

    if !args.execute {
        println!("Dry run: nothing deleted. Re-run with --execute to delete.");
        return Ok(());
    }
    if plan.total() == 0 {
        println!("Nothing to delete.");
        return Ok(());
    }

    let deleted = purger.execute(&plan).await;
    println!("Deleted {} of {} objects", deleted, plan.total());
    Ok(())
}
