mod config;
mod driver;
mod reflect;
mod writer;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use uuid::Uuid;

use mull_core::{InquiryStatus, now_unix_ms, unix_ms_to_iso8601};
use mull_store::InquiryStore;

use crate::config::Config;
use crate::driver::Tick;
use crate::reflect::Generator;

#[derive(Parser)]
#[command(name = "mull", about = "Staged reflective inquiry engine")]
struct Cli {
    /// Agent namespace holding the inquiry collection
    #[arg(long, global = true, default_value = "main")]
    agent: String,

    /// Config file path (default: <data-dir>/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose debug output
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Record a new inquiry
    Add {
        /// The question to reflect on
        question: String,

        /// Free-form origin tag
        #[arg(long, default_value = "manual")]
        source: String,

        /// Curiosity score supplied by the upstream process
        #[arg(long, default_value_t = 0.0)]
        entropy: f64,

        /// Supporting text handed to every pass
        #[arg(long, default_value = "")]
        context: String,
    },

    /// Run one poll step: serve the due pass, if any
    Tick,

    /// Poll continuously until interrupted
    Run {
        /// Seconds between polls
        #[arg(long, default_value_t = 60)]
        interval_secs: u64,
    },

    /// List inquiries (in-progress by default)
    List {
        /// Include completed inquiries
        #[arg(long)]
        all: bool,
    },

    /// Show collection statistics
    Status,

    /// Externalize completed inquiries to growth vectors and insight files
    Export,

    /// Replace an inquiry's annotation tags
    Tag {
        id: Uuid,
        tags: Vec<String>,
    },
}

fn base_dir() -> PathBuf {
    std::env::var("MULL_DATA_DIR")
        .ok()
        .map(PathBuf::from)
        .unwrap_or_else(mull_store::default_base_dir)
}

fn open_store(cli: &Cli, config: &Config) -> Result<InquiryStore> {
    InquiryStore::open(&base_dir(), &cli.agent, config.passes.clone())
        .context("failed to open inquiry store")
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into())
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = Config::load(cli.config.as_deref(), &base_dir())?;

    match &cli.command {
        Commands::Add {
            question,
            source,
            entropy,
            context,
        } => cmd_add(&cli, &config, question, source, *entropy, context),
        Commands::Tick => cmd_tick(&cli, &config).await,
        Commands::Run { interval_secs } => cmd_run(&cli, &config, *interval_secs).await,
        Commands::List { all } => cmd_list(&cli, &config, *all),
        Commands::Status => cmd_status(&cli, &config),
        Commands::Export => cmd_export(&cli, &config),
        Commands::Tag { id, tags } => cmd_tag(&cli, &config, *id, tags),
    }
}

fn cmd_add(
    cli: &Cli,
    config: &Config,
    question: &str,
    source: &str,
    entropy: f64,
    context: &str,
) -> Result<()> {
    let mut store = open_store(cli, config)?;
    let inquiry = store
        .create(question, source, entropy, context, now_unix_ms())
        .context("failed to create inquiry")?;

    let due = inquiry
        .pass(1)
        .and_then(|p| p.scheduled_at())
        .map(unix_ms_to_iso8601)
        .unwrap_or_else(|| "?".to_string());
    println!("created inquiry {} (pass 1 due {due})", inquiry.id);
    Ok(())
}

async fn cmd_tick(cli: &Cli, config: &Config) -> Result<()> {
    let mut store = open_store(cli, config)?;
    let generator = Generator::new(config.llm.clone())?;

    match driver::tick(&mut store, &generator).await? {
        Tick::Idle => println!("no pass due"),
        Tick::Completed { id, pass } => {
            println!("completed pass {pass} for inquiry {id}");
            let growth_vectors = config.growth_vectors_path(store.agent_dir());
            let insights_dir = config.insights_dir(store.agent_dir());
            let exported =
                writer::export_completed(&mut store, &growth_vectors, &insights_dir, now_unix_ms())?;
            if exported > 0 {
                println!("exported {exported} completed inquiries");
            }
        }
        Tick::GenerationFailed { id, pass } => {
            println!("generation failed for inquiry {id} pass {pass}; pass remains due");
        }
    }
    Ok(())
}

async fn cmd_run(cli: &Cli, config: &Config, interval_secs: u64) -> Result<()> {
    let mut store = open_store(cli, config)?;
    let generator = Generator::new(config.llm.clone())?;
    let growth_vectors = config.growth_vectors_path(store.agent_dir());
    let insights_dir = config.insights_dir(store.agent_dir());

    driver::run(
        &mut store,
        &generator,
        &growth_vectors,
        &insights_dir,
        interval_secs,
    )
    .await
}

fn cmd_list(cli: &Cli, config: &Config, all: bool) -> Result<()> {
    let store = open_store(cli, config)?;
    let now = now_unix_ms();

    let mut shown = 0;
    for inquiry in store.list() {
        if !all && inquiry.status == InquiryStatus::Completed {
            continue;
        }
        shown += 1;

        let state = match inquiry.status {
            InquiryStatus::Completed => "completed".to_string(),
            InquiryStatus::InProgress => match inquiry.due_pass(now) {
                Some(pass) => format!("pass {pass} due"),
                None => {
                    let next = inquiry
                        .passes
                        .iter()
                        .find_map(|p| p.scheduled_at().map(|at| (p.number, at)));
                    match next {
                        Some((pass, at)) => {
                            format!("pass {pass} at {}", unix_ms_to_iso8601(at))
                        }
                        None => "in progress".to_string(),
                    }
                }
            },
        };
        println!("{}  [{state}]  {}", inquiry.id, inquiry.question);
    }

    if shown == 0 {
        println!("(no inquiries)");
    }
    Ok(())
}

fn cmd_status(cli: &Cli, config: &Config) -> Result<()> {
    let store = open_store(cli, config)?;
    let now = now_unix_ms();

    let total = store.list().len();
    let completed = store
        .list()
        .iter()
        .filter(|i| i.status == InquiryStatus::Completed)
        .count();
    let due = store.find_due_pass(now).is_some();

    println!("agent:      {}", store.agent_id());
    println!("inquiries:  {total}");
    println!("active:     {}", total - completed);
    println!("completed:  {completed}");
    println!("unexported: {}", store.list_completed_unexported().len());
    println!("due now:    {}", if due { "yes" } else { "no" });
    Ok(())
}

fn cmd_export(cli: &Cli, config: &Config) -> Result<()> {
    let mut store = open_store(cli, config)?;
    let growth_vectors = config.growth_vectors_path(store.agent_dir());
    let insights_dir = config.insights_dir(store.agent_dir());
    let exported =
        writer::export_completed(&mut store, &growth_vectors, &insights_dir, now_unix_ms())?;
    println!("exported {exported} inquiries");
    Ok(())
}

fn cmd_tag(cli: &Cli, config: &Config, id: Uuid, tags: &[String]) -> Result<()> {
    let mut store = open_store(cli, config)?;
    if store.tag(id, tags.to_vec())? {
        println!("tagged inquiry {id}");
    } else {
        println!("inquiry {id} not found");
    }
    Ok(())
}
