// Copyright 2026 indexflow contributors
// SPDX-License-Identifier: MIT

//! indexflow — stream an index as JSON lines.

use anyhow::{Context, Result};
use clap::Parser;
use futures::TryStreamExt;
use indexflow::{CachePolicy, Config};
use std::io::Write;

#[derive(Parser, Debug)]
#[command(
    name = "indexflow",
    about = "Stream records from a paginated JSON index, optionally following links",
    version
)]
struct Cli {
    /// Index URL, e.g. https://example.com/query-index.json
    url: String,

    /// Records requested per page.
    #[arg(long)]
    chunk_size: Option<usize>,

    /// Sheet to read from a multi-sheet index.
    #[arg(long)]
    sheet: Option<String>,

    /// Records to skip before output starts.
    #[arg(long, default_value_t = 0)]
    skip: usize,

    /// Maximum records to output.
    #[arg(long)]
    limit: Option<usize>,

    /// Field holding a link to follow.
    #[arg(long)]
    follow: Option<String>,

    /// Field to store the followed document in (defaults to --follow).
    #[arg(long, requires = "follow")]
    into: Option<String>,

    /// Extra host (or host:port) to allow following. Repeatable.
    #[arg(long = "allow", value_name = "HOST")]
    allow: Vec<String>,

    /// Allow following links to any host.
    #[arg(long)]
    allow_any: bool,

    /// Concurrent document fetches while following.
    #[arg(long)]
    concurrency: Option<usize>,

    /// Ask caches to revalidate every request.
    #[arg(long)]
    no_cache: bool,

    /// Print only the number of records.
    #[arg(long)]
    count: bool,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "warn")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(
                format!("indexflow={}", cli.log_level)
                    .parse()
                    .context("invalid --log-level")?,
            ),
        )
        .init();

    let mut config = Config::from_env();
    if let Some(n) = cli.chunk_size {
        config = config.with_chunk_size(n);
    }
    if let Some(sheet) = &cli.sheet {
        config = config.with_sheet(sheet);
    }
    if let Some(n) = cli.concurrency {
        config = config.with_concurrency(n);
    }
    if cli.no_cache {
        config = config.with_cache_policy(CachePolicy::NoCache);
    }
    for host in &cli.allow {
        config = config.with_allowed_host(host);
    }

    let mut pipeline = indexflow::index_with_config(&cli.url, config)?;
    if cli.allow_any {
        pipeline = pipeline.allow_any_host();
    }
    if cli.skip > 0 {
        pipeline = pipeline.skip(cli.skip);
    }
    if let Some(n) = cli.limit {
        pipeline = pipeline.limit(n);
    }
    if let Some(source) = &cli.follow {
        let target = cli.into.clone().unwrap_or_else(|| source.clone());
        pipeline = pipeline.follow_into(source.clone(), target);
    }

    let cancel = pipeline.config().cancel_token().clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });

    if cli.count {
        println!("{}", pipeline.count().await?);
        return Ok(());
    }

    let mut stream = pipeline.stream();
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    while let Some(record) = stream.try_next().await? {
        serde_json::to_writer(&mut out, &record)?;
        out.write_all(b"\n")?;
    }
    out.flush()?;
    Ok(())
}
