use anyhow::{Context, Result};
use clap::ArgMatches;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use sitescore_core::audit::{AuditProgress, AuditRequest, AuditStatus, AuditTask};
use sitescore_core::estimate::{PlatformHint, SiteEstimator};
use sitescore_core::report::{sitemap_xml, text_summary, write_audit_bundle};
use sitescore_scanner::{CrawlOptions, Crawler, Fetcher, RetryPolicy};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

mod commands;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cmd = commands::command_argument_builder();
    let chosen_command = cmd.get_matches();
    let quiet = chosen_command.get_flag("quiet");

    let result = match chosen_command.subcommand() {
        Some(("audit", primary_command)) => handle_audit(primary_command, quiet).await,
        Some(("crawl", primary_command)) => handle_crawl(primary_command, quiet).await,
        Some(("estimate", primary_command)) => handle_estimate(primary_command).await,
        _ => unreachable!("clap should ensure we don't get here"),
    };

    if let Err(e) = result {
        eprintln!("{} {}", "error:".bright_red().bold(), e);
        std::process::exit(1);
    }
}

fn crawl_options_from_args(args: &ArgMatches) -> CrawlOptions {
    let defaults = CrawlOptions::default();
    CrawlOptions {
        max_pages: *args.get_one::<usize>("max-pages").unwrap_or(&defaults.max_pages),
        max_depth: args.get_one::<usize>("max-depth").copied(),
        timeout: args
            .get_one::<u64>("timeout")
            .map(|ms| Duration::from_millis(*ms))
            .unwrap_or(defaults.timeout),
        retry_count: args
            .get_one::<u32>("retries")
            .copied()
            .unwrap_or(defaults.retry_count),
        retry_delay: args
            .get_one::<u64>("retry-delay")
            .map(|ms| Duration::from_millis(*ms))
            .unwrap_or(defaults.retry_delay),
        respect_robots: args.get_flag("respect-robots"),
        follow_external_links: args.get_flag("external"),
    }
}

fn progress_spinner(quiet: bool) -> Option<Arc<ProgressBar>> {
    if quiet {
        return None;
    }
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")
            .unwrap(),
    );
    pb.set_message("Starting crawl...");
    Some(Arc::new(pb))
}

async fn handle_audit(args: &ArgMatches, quiet: bool) -> Result<()> {
    let url = args.get_one::<Url>("url").expect("url is required");
    let options = crawl_options_from_args(args);

    let spinner = progress_spinner(quiet);
    let mut task = AuditTask::new(AuditRequest {
        seed_url: url.to_string(),
        options,
    });
    if let Some(ref pb) = spinner {
        let pb = pb.clone();
        task = task.with_progress_callback(Arc::new(move |progress: AuditProgress| {
            pb.set_message(format!(
                "Crawling... {}/{} pages ({}%) {}",
                progress.pages_scanned,
                progress.total_estimate,
                progress.percent,
                progress.current_url
            ));
            pb.tick();
        }));
    }

    let outcome = task.run().await?;
    if let Some(ref pb) = spinner {
        pb.finish_with_message(format!(
            "Crawl complete: {} pages, {} failed",
            outcome.crawl.pages.len(),
            outcome.crawl.failed_urls.len()
        ));
    }

    if args.get_flag("json") {
        println!("{}", serde_json::to_string_pretty(&outcome.analysis)?);
    } else {
        print_scores(&outcome);
        println!("{}", text_summary(&outcome));
    }

    if let Some(path) = args.get_one::<PathBuf>("sitemap") {
        fs::write(path, sitemap_xml(&outcome.crawl.pages))
            .with_context(|| format!("failed to write sitemap to {}", path.display()))?;
        println!("Sitemap written to {}", path.display());
    }
    if let Some(dir) = args.get_one::<PathBuf>("output") {
        write_audit_bundle(dir, &outcome)
            .with_context(|| format!("failed to write audit bundle to {}", dir.display()))?;
        println!("Audit bundle written to {}", dir.display());
    }

    if outcome.status == AuditStatus::Failed {
        anyhow::bail!(
            "{}",
            outcome
                .error_message
                .unwrap_or_else(|| "audit failed".to_string())
        );
    }
    Ok(())
}

fn print_scores(outcome: &sitescore_core::audit::AuditOutcome) {
    let overall = outcome.analysis.overall_score;
    let colored_score = match overall {
        80..=100 => overall.to_string().bright_green().bold(),
        50..=79 => overall.to_string().bright_yellow().bold(),
        _ => overall.to_string().bright_red().bold(),
    };
    println!("\nOverall score: {}/100\n", colored_score);
}

async fn handle_crawl(args: &ArgMatches, quiet: bool) -> Result<()> {
    let url = args.get_one::<Url>("url").expect("url is required");
    let defaults = CrawlOptions::default();
    let options = CrawlOptions {
        max_pages: args
            .get_one::<usize>("max-pages")
            .copied()
            .unwrap_or(defaults.max_pages),
        max_depth: args.get_one::<usize>("max-depth").copied(),
        timeout: args
            .get_one::<u64>("timeout")
            .map(|ms| Duration::from_millis(*ms))
            .unwrap_or(defaults.timeout),
        respect_robots: args.get_flag("respect-robots"),
        ..defaults
    };

    let spinner = progress_spinner(quiet);
    let mut crawler = Crawler::new(options)?;
    if let Some(ref pb) = spinner {
        let pb = pb.clone();
        crawler = crawler.with_progress_callback(Arc::new(move |progress| {
            pb.set_message(format!(
                "Crawling... {} pages scanned",
                progress.pages_scanned
            ));
            pb.tick();
        }));
    }

    let outcome = crawler.crawl(url.as_str()).await?;
    if let Some(ref pb) = spinner {
        pb.finish_with_message("Crawl complete");
    }

    let summary = &outcome.summary;
    println!("\n# Crawl of {}", url);
    println!("  Pages crawled: {}", summary.total_pages);
    println!("  Internal links: {}", summary.internal_links);
    println!("  External links: {}", summary.external_links);
    println!("  Broken links: {}", summary.broken_links);
    println!("  Average load time: {} ms", summary.average_load_time_ms);
    for page in &outcome.pages {
        println!(
            "  {} {} (depth {})",
            page.status_code.to_string().bright_green(),
            page.url,
            page.depth
        );
    }
    for url in &outcome.failed_urls {
        println!("  {} {}", "FAIL".bright_red(), url);
    }
    Ok(())
}

async fn handle_estimate(args: &ArgMatches) -> Result<()> {
    let platform = PlatformHint::parse(
        args.get_one::<String>("platform")
            .map(String::as_str)
            .unwrap_or("unknown"),
    );
    let domain = args
        .get_one::<String>("domain")
        .expect("domain is required");

    let sample_urls = match args.get_one::<PathBuf>("sample") {
        Some(path) => load_sample_urls(path)?,
        None => Vec::new(),
    };

    let mut estimator = SiteEstimator::new();
    if args.get_flag("probe") {
        let fetcher = Fetcher::new(Duration::from_secs(10), RetryPolicy::default())?;
        estimator = estimator.with_probe(fetcher);
    }

    let estimate = estimator.estimate(platform, &sample_urls, domain).await;
    println!(
        "Estimated pages for {}: {}",
        domain,
        estimate.to_string().bright_cyan().bold()
    );
    Ok(())
}

/// Load a newline-delimited URL sample, skipping blanks and unparsable
/// lines.
fn load_sample_urls(path: &PathBuf) -> Result<Vec<String>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read sample file {}", path.display()))?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter(|line| Url::parse(line).is_ok())
        .map(str::to_string)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_sample_urls_filters_garbage() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "https://example.com/a").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "not a url").unwrap();
        writeln!(file, "  https://example.com/b  ").unwrap();

        let urls = load_sample_urls(&file.path().to_path_buf()).unwrap();
        assert_eq!(
            urls,
            vec![
                "https://example.com/a".to_string(),
                "https://example.com/b".to_string()
            ]
        );
    }

    #[test]
    fn test_command_tree_parses() {
        commands::command_argument_builder().debug_assert();
    }
}
