mod cli;
mod terminal;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::{debug, info};

use chargewatch_compute::synth::generate_seeded;
use chargewatch_compute::{
    write_corpus, AnomalyScorer, Contamination, HealthyProfile, Trainer, TrainerConfig,
};
use chargewatch_core::config::load_dotenv;
use chargewatch_core::Config;
use chargewatch_llm::TicketDrafter;
use chargewatch_monitor::{AlertDispatcher, ConsoleDashboard, Monitor, Simulator};

use crate::cli::{CliArgs, Command, GenerateArgs, MonitorArgs, TrainArgs};

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so the dashboard owns stdout.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    // Before parsing, so .env can feed the env-backed flags.
    load_dotenv();
    let args = CliArgs::parse();

    let config = Config::from_env();
    config.log_summary();

    match args.command {
        Command::Generate(a) => generate(&config, a),
        Command::Train(a) => train(&config, a),
        Command::Monitor(a) => monitor(config, a).await,
    }
}

// ── generate ────────────────────────────────────────────────────────

fn generate(config: &Config, args: GenerateArgs) -> Result<()> {
    let path = args.output.unwrap_or_else(|| config.paths.corpus.clone());
    terminal::print_banner("generate", &format!("{} rows -> {}", args.rows, path.display()))?;

    let corpus = generate_seeded(args.rows, &HealthyProfile::default(), args.seed)
        .context("failed to generate corpus")?;
    write_corpus(&path, &corpus)
        .with_context(|| format!("failed to write corpus to {}", path.display()))?;

    terminal::print_generated(corpus.len(), &path.display().to_string())
}

// ── train ───────────────────────────────────────────────────────────

fn train(config: &Config, args: TrainArgs) -> Result<()> {
    let corpus = args.corpus.unwrap_or_else(|| config.paths.corpus.clone());
    let model = args.model.unwrap_or_else(|| config.paths.model.clone());

    let contamination = match args.contamination {
        None => Contamination::Auto,
        Some(c) if c > 0.0 && c <= 0.5 => Contamination::Fraction(c),
        Some(c) => bail!("--contamination must be in (0, 0.5], got {c}"),
    };
    let trainer = Trainer::new(TrainerConfig {
        n_estimators: args.trees,
        contamination,
        seed: args.seed,
        ..TrainerConfig::default()
    });

    terminal::print_banner(
        "train",
        &format!("{} -> {} ({} trees)", corpus.display(), model.display(), args.trees),
    )?;

    let report = trainer
        .run(&corpus, &model)
        .with_context(|| format!("training on {} failed", corpus.display()))?;

    terminal::print_training_report(&report)
}

// ── monitor ─────────────────────────────────────────────────────────

async fn monitor(config: Config, args: MonitorArgs) -> Result<()> {
    let mut settings = config.monitoring().context("invalid monitor configuration")?;
    settings.log_summary();
    debug!(settings = %settings.redacted_summary(), "Monitor settings");

    settings
        .llm
        .require_credential()
        .context("the ticket service needs a credential")?;

    if let Some(ms) = args.interval_ms {
        settings.monitor.interval_ms = ms;
    }
    if args.max_cycles.is_some() {
        settings.monitor.max_cycles = args.max_cycles;
    }
    let model_path = args.model.unwrap_or_else(|| config.paths.model.clone());

    let scorer = AnomalyScorer::load(&model_path)
        .with_context(|| format!("failed to load model from {}", model_path.display()))?;
    let drafter = TicketDrafter::from_config(&settings.llm, &settings.ollama)
        .context("failed to create LLM provider")?;

    info!(
        provider = drafter.provider_name(),
        model = settings.llm.active_model(&settings.ollama),
        trees = scorer.artifact().forest.n_estimators(),
        "Monitor ready"
    );

    let dispatcher = AlertDispatcher::new(drafter, config.station.clone());
    let simulator = Simulator::from_config(&settings.monitor, args.seed);
    let dashboard = ConsoleDashboard::new(std::io::stdout(), !args.no_clear);

    let mut monitor = Monitor::new(
        Box::new(scorer),
        dispatcher,
        simulator,
        dashboard,
        config.station.clone(),
        settings.monitor,
    );
    let summary = monitor.run().await;

    terminal::print_run_summary(&summary)
}
