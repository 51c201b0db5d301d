//! One-shot search from the terminal: runs a session against the configured
//! providers and prints the merged items and stats.

use anyhow::{bail, Context, Result};
use clap::Parser;
use serde::Serialize;

use thread_scout::correlate::DecoratedItem;
use thread_scout::{
    bookmark_store, AppConfig, ProviderRegistry, ProviderTag, QueryOptions, RankPolicy,
    SearchGroup, SessionHandle, SessionState, SourceFilter, Stats, TimeRange,
};

#[derive(Parser)]
#[command(name = "scout")]
#[command(about = "Search discussion threads across providers and merge the results")]
struct Cli {
    /// Search group, e.g. reddit, quora, stackoverflow, hackernews, github, ai-visibility
    group: SearchGroup,

    /// Keyword or phrase
    #[arg(required = true, num_args = 1..)]
    query: Vec<String>,

    #[arg(long)]
    limit: Option<usize>,

    /// all, 1month, 3months, 6months, 1year
    #[arg(long, default_value = "all")]
    time: TimeRange,

    /// relevance or score
    #[arg(long, default_value = "relevance")]
    sort: RankPolicy,

    /// Local filter: all, multi, or a provider name
    #[arg(long, default_value = "all")]
    source: SourceFilter,

    /// Skip a provider (repeatable)
    #[arg(long = "disable", value_name = "PROVIDER")]
    disabled: Vec<ProviderTag>,

    #[arg(long)]
    min_score: Option<i64>,

    #[arg(long)]
    min_comments: Option<u64>,

    /// Print JSON instead of text
    #[arg(long)]
    json: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct JsonOut<'a> {
    items: &'a [DecoratedItem],
    stats: &'a Stats,
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    thread_scout::logging::init_from_env();
    let cli = Cli::parse();

    let cfg = AppConfig::load_default()?;
    let registry = ProviderRegistry::from_config(&cfg)?;
    let session = SessionHandle::new(registry);
    let bookmarks = bookmark_store(&cfg).await?;
    session.load_bookmarks(&bookmarks.list().await.context("listing bookmarks")?);

    let mut opts = QueryOptions::new(cli.group, cli.query.join(" "))
        .with_time(cli.time)
        .with_rank(cli.sort);
    if let Some(limit) = cli.limit {
        opts = opts.with_limit(limit);
    }
    for tag in cli.disabled {
        opts = opts.disable(tag);
    }
    opts.min_score = cli.min_score;
    opts.min_comments = cli.min_comments;

    match session.run_query(opts).await? {
        SessionState::Failed { message, .. } => bail!(message),
        SessionState::Empty { .. } => {
            if !cli.json {
                println!("no results");
                return Ok(());
            }
        }
        _ => {}
    }

    let items = session.apply_local_filter(cli.source);
    let stats = session.stats();

    if cli.json {
        let out = serde_json::to_string_pretty(&JsonOut {
            items: &items,
            stats: &stats,
        })?;
        println!("{out}");
        return Ok(());
    }

    for it in &items {
        let sources: Vec<&str> = it.item.sources.iter().map(|t| t.as_str()).collect();
        let mark = if it.is_bookmarked { "*" } else { " " };
        println!("{mark} [{}] {}", sources.join(","), it.item.title);
        println!("    {}", it.item.url);
    }
    println!();
    println!(
        "{} items ({} shown), {} multi-source",
        stats.total,
        items.len(),
        stats.multi_source
    );
    for (tag, n) in &stats.per_source {
        println!("  {tag:<14} {n}");
    }
    if !stats.failed_sources.is_empty() {
        let failed: Vec<&str> = stats.failed_sources.iter().map(|t| t.as_str()).collect();
        println!("  failed: {}", failed.join(", "));
    }
    Ok(())
}
