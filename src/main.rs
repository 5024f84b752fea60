//! spider-bridge CLI entry point.
//!
//! Loads one spider module, initializes it and runs a single operation.

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{Context, bail};
use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use spider_bridge_adapter::SpiderAdapter;
use spider_bridge_common::ConfigFile;
use spider_bridge_core::Value;

/// Run spider module operations from the command line.
#[derive(Debug, Parser)]
#[command(name = "spider-bridge", version, about)]
struct Cli {
    /// TOML configuration file.
    #[arg(short, long, env = "SPIDER_BRIDGE_CONFIG")]
    config: Option<PathBuf>,

    /// Extension passed to the spider's `init`.
    #[arg(long)]
    ext: Option<String>,

    #[command(flatten)]
    target: Target,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Args)]
#[group(required = true, multiple = false)]
struct Target {
    /// Module path or `file://` URL.
    #[arg(short, long)]
    module: Option<String>,

    /// Key of a spider entry in the configuration file.
    #[arg(short, long)]
    spider: Option<String>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Home page listing.
    Home {
        #[arg(long)]
        filter: bool,
    },
    /// Home page video listing.
    HomeVod,
    /// Category listing.
    Category {
        tid: String,
        #[arg(long, default_value = "1")]
        page: String,
        #[arg(long)]
        filter: bool,
        /// Extra filter values.
        #[arg(long = "extend", value_parser = parse_key_val)]
        extend: Vec<(String, String)>,
    },
    /// Detail for an id.
    Detail {
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Search.
    Search {
        key: String,
        #[arg(long)]
        quick: bool,
    },
    /// Resolve playback.
    Play {
        flag: String,
        id: String,
        #[arg(long = "vip-flag")]
        vip_flags: Vec<String>,
    },
    /// Whether pages need manual checking.
    Sniffer,
    /// Whether a URL is a playable stream.
    IsVideo { url: String },
    /// Run the proxy handler.
    Proxy {
        #[arg(value_parser = parse_key_val)]
        params: Vec<(String, String)>,
    },
    /// Call any exported function with JSON arguments.
    Call {
        function: String,
        args: Vec<String>,
    },
}

fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,spider_bridge=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let file = match &cli.config {
        Some(path) => ConfigFile::from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => ConfigFile::default(),
    };

    let (module, entry_ext) = match (&cli.target.module, &cli.target.spider) {
        (Some(module), _) => (module.clone(), None),
        (None, Some(key)) => {
            let entry = file
                .spider(key)
                .with_context(|| format!("No spider '{key}' in the configuration"))?;
            (entry.api.clone(), entry.ext.clone())
        }
        (None, None) => bail!("Either --module or --spider is required"),
    };
    let ext = cli.ext.clone().or(entry_ext);

    info!(module = %module, "Loading spider");

    let spider = SpiderAdapter::builder(module.as_str())
        .config(file.bridge)
        .build()
        .with_context(|| format!("Failed to load spider {module}"))?;

    spider.init(ext.as_deref()).context("Spider init failed")?;

    let output = run(&spider, cli.command)?;
    println!("{output}");

    spider.destroy();
    Ok(())
}

fn run(spider: &SpiderAdapter, command: Command) -> anyhow::Result<String> {
    let output = match command {
        Command::Home { filter } => spider.home(filter)?,
        Command::HomeVod => spider.home_video()?,
        Command::Category {
            tid,
            page,
            filter,
            extend,
        } => {
            let extend: BTreeMap<_, _> = extend.into_iter().collect();
            spider.category(&tid, &page, filter, Some(&extend))?
        }
        Command::Detail { ids } => spider.detail(&ids)?,
        Command::Search { key, quick } => spider.search(&key, quick)?,
        Command::Play {
            flag,
            id,
            vip_flags,
        } => spider.player(&flag, &id, &vip_flags)?,
        Command::Sniffer => spider.manual_video_check()?.to_string(),
        Command::IsVideo { url } => spider.is_video_format(&url)?.to_string(),
        Command::Proxy { params } => {
            let params: BTreeMap<_, _> = params.into_iter().collect();
            let response = spider.proxy(&params)?;
            format!(
                "content-type: {}\nextra: {}\nbody: {} bytes",
                response.content_type,
                response.extra,
                response.body.len()
            )
        }
        Command::Call { function, args } => {
            let args = args
                .iter()
                .map(|arg| Value::from_json_str(arg).unwrap_or_else(|_| Value::from(arg.as_str())))
                .collect();
            spider.call(&function, args)?.into_text()
        }
    };

    Ok(output)
}

/// Parse a `key=value` pair.
fn parse_key_val(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected key=value, got '{s}'"))
}
