use annotation_scanner::cache::{VerdictCache, clear_db};
use annotation_scanner::classpath::discover;
use annotation_scanner::cli::{Cli, Commands, OutputFormat};
use annotation_scanner::config::resolve_db_path;
use annotation_scanner::filter::ClassFilter;
use annotation_scanner::matcher::AnnotationMatcher;
use annotation_scanner::scanner::{ScanConfig, ScanReport, Scanner};
use anyhow::Result;
use clap::Parser;
use log::info;
use std::path::{Path, PathBuf};
use std::sync::Arc;

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .init();

    match cli.command.clone() {
        Commands::Clear => {
            let db_path = resolve_db_path(&cli)?;
            clear_db(&db_path)?;
            info!("removed verdict cache {}", db_path.display());
        }
        Commands::Stats => {
            let cache = VerdictCache::open(resolve_db_path(&cli)?)?;
            println!("{}", serde_json::to_string_pretty(&cache.stats()?)?);
        }
        Commands::Scan {
            paths,
            annotations,
            policy,
            threads,
            format,
            output,
        } => {
            let matcher = if annotations.is_empty() {
                AnnotationMatcher::jaxrs()
            } else {
                AnnotationMatcher::new(&annotations)
            };
            let config = ScanConfig { threads, policy };
            let cache = if cli.no_cache {
                None
            } else {
                Some(VerdictCache::open(resolve_db_path(&cli)?)?)
            };
            let report = scan(&paths, matcher, config, cache.as_ref())?;
            write_report(&report, format, output.as_deref())?;
        }
    }

    Ok(())
}

fn scan(
    paths: &[PathBuf],
    matcher: AnnotationMatcher,
    config: ScanConfig,
    cache: Option<&VerdictCache>,
) -> Result<ScanReport> {
    let scanner = Scanner::new(config, cache);
    let entries = discover(paths)?;

    let (index, errors) = scanner.build_index(&entries);
    let mut filter = ClassFilter::new(matcher, Arc::new(index));
    scanner.scan_classpath(&mut filter, &entries, errors)
}

fn write_report(report: &ScanReport, format: OutputFormat, output: Option<&Path>) -> Result<()> {
    let content = match format {
        OutputFormat::Json => serde_json::to_string_pretty(report)?,
        OutputFormat::Text => {
            let mut out = String::new();
            out.push_str(&format!("scanned: {}\n", report.scanned));
            out.push_str(&format!("cache_hits: {}\n", report.cache_hits));
            out.push_str(&format!("duration_ms: {}\n", report.duration_ms));
            out.push_str(&format!("matches: {}\n", report.matches.len()));
            for m in &report.matches {
                out.push_str(&format!(
                    "- {} ({})\n",
                    m.name,
                    m.origin.as_deref().unwrap_or("?")
                ));
            }
            out.push_str(&format!("errors: {}\n", report.errors.len()));
            for e in &report.errors {
                out.push_str(&format!("- {:?} {}: {}\n", e.kind, e.origin, e.message));
            }
            out
        }
    };

    if let Some(path) = output {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
    } else {
        print!("{content}");
        if !content.ends_with('\n') {
            println!();
        }
    }

    Ok(())
}
