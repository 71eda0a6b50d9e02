//! rstrafficguard 命令行：检查黑名单目录、批量分类

use std::io::{self, BufRead};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use rstrafficguard::{
    Blacklist, ConfigManager, GlobalConfig, RequestHandle, TrafficGuard, Verdict,
};
use tracing_subscriber::EnvFilter;

/// 单个请求等待结论的上限
const VERDICT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Parser)]
#[command(author, version, about = "URL/domain blacklist classifier")]
struct Cli {
    /// JSON 配置文件（默认尝试 /etc/trafficguard/tg.conf）
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// 黑名单根目录，覆盖配置文件
    #[arg(short, long)]
    blacklists: Option<PathBuf>,

    /// 工作线程数，覆盖配置文件
    #[arg(short, long)]
    workers: Option<usize>,

    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// 加载黑名单并列出有效分类
    Check,
    /// 分类 DOMAIN URL；省略时从标准输入逐行读取 "domain url"
    Classify {
        domain: Option<String>,
        url: Option<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;
    init_logging(config.verbose);

    match cli.command {
        Command::Check => check(&config),
        Command::Classify { domain, url } => {
            let inputs = match (domain, url) {
                (Some(domain), Some(url)) => vec![(domain, url)],
                (Some(domain), None) => vec![(domain.clone(), domain)],
                _ => read_inputs(io::stdin().lock())?,
            };
            classify(config, inputs)
        }
    }
}

fn load_config(cli: &Cli) -> Result<GlobalConfig> {
    let default_path = Path::new(ConfigManager::DEFAULT_CONFIG_PATH);
    let mut config = match &cli.config {
        Some(path) => ConfigManager::load_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None if default_path.exists() => ConfigManager::load_file(default_path)
            .with_context(|| format!("failed to load config {}", default_path.display()))?,
        None => ConfigManager::get_default(),
    };

    if let Some(path) = &cli.blacklists {
        config.blacklist_path = path.clone();
    }
    if let Some(workers) = cli.workers {
        config.workers = workers;
    }
    config.verbose |= cli.verbose;
    Ok(config.normalized())
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn load_blacklist(config: &GlobalConfig) -> Result<Arc<Blacklist>> {
    let blacklist = Arc::new(Blacklist::from_config(config));
    blacklist
        .reload()
        .with_context(|| format!("failed to scan {}", config.blacklist_path.display()))?;
    Ok(blacklist)
}

fn check(config: &GlobalConfig) -> Result<()> {
    let blacklist = load_blacklist(config)?;
    let Some(snapshot) = blacklist.snapshot() else {
        bail!("no blacklist activated under {}", config.blacklist_path.display());
    };

    for category in snapshot.categories() {
        println!(
            "{:<24} domains: {:>7} patterns / {:>3} matchers   urls: {:>7} patterns / {:>3} matchers",
            category.name(),
            category.domain_patterns().pattern_count(),
            category.domain_patterns().matcher_count(),
            category.url_patterns().pattern_count(),
            category.url_patterns().matcher_count(),
        );
    }
    Ok(())
}

fn read_inputs(reader: impl BufRead) -> Result<Vec<(String, String)>> {
    let mut inputs = Vec::new();
    for line in reader.lines() {
        let line = line.context("failed to read stdin")?;
        let mut fields = line.split_whitespace();
        match (fields.next(), fields.next()) {
            (Some(domain), Some(url)) => inputs.push((domain.to_string(), url.to_string())),
            (Some(domain), None) => inputs.push((domain.to_string(), domain.to_string())),
            _ => {}
        }
    }
    Ok(inputs)
}

fn classify(config: GlobalConfig, inputs: Vec<(String, String)>) -> Result<()> {
    let blacklist = load_blacklist(&config)?;
    let guard: TrafficGuard<usize> = TrafficGuard::with_blacklist(config, blacklist)?;
    let (results_tx, results_rx) = crossbeam_channel::unbounded();

    let mut verdicts: Vec<Option<Verdict>> = vec![None; inputs.len()];
    let mut accepted = 0;
    for (idx, (domain, url)) in inputs.iter().enumerate() {
        let results_tx = results_tx.clone();
        let handle = RequestHandle::new(idx, move |idx: &mut usize, verdict: &Verdict| {
            let _ = results_tx.send((*idx, verdict.clone()));
        });

        if guard.submit_for_classification(domain.as_str(), url.as_str(), handle.clone()) {
            accepted += 1;
        } else {
            // 放行：宿主不再等待结论
            handle.mark_destroyed();
        }
    }

    for _ in 0..accepted {
        let (idx, verdict) = results_rx
            .recv_timeout(VERDICT_TIMEOUT)
            .context("timed out waiting for classification")?;
        verdicts[idx] = Some(verdict);
    }

    for ((domain, url), verdict) in inputs.iter().zip(verdicts) {
        match verdict {
            Some(verdict) => match verdict.redirect_location(guard.landing(), url) {
                Some(location) => println!("BLOCK {} {} {} -> {}", verdict.category(), domain, url, location),
                None => println!("PASS  {} {}", domain, url),
            },
            None => println!("PASS  {} {} (unclassified)", domain, url),
        }
    }
    Ok(())
}
