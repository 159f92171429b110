mod server;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use lp_core::{
    Difficulty, EngineConfig, ModuleId, ProgressionEngine, StaticStats, TopicId, UnlockPolicy,
    format_iso8601,
};
use lp_store::{ProfileStore, Store};
use rmcp::{ServiceExt, transport::stdio};

#[derive(Parser)]
#[command(name = "lp", about = "Learning progression engine CLI and MCP server")]
struct Cli {
    /// Learner profile to use
    #[arg(long, global = true)]
    profile: Option<String>,

    /// Override the startup unlock policy from config.toml
    #[arg(long, global = true)]
    policy: Option<UnlockPolicy>,

    /// Enable verbose debug output
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start MCP server on stdio transport
    Serve,

    /// Record one answer to a question
    Answer {
        topic: String,
        question_id: String,
        #[arg(long, default_value = "easy")]
        difficulty: Difficulty,
        /// The answer was wrong
        #[arg(long)]
        wrong: bool,
        /// Response time in seconds
        #[arg(long)]
        time: f64,
        #[arg(long, default_value_t = 1)]
        attempts: u32,
    },

    /// Report a finished run at one difficulty
    Complete {
        topic: String,
        difficulty: Difficulty,
        /// Accuracy of the run, 0 to 1
        #[arg(long)]
        accuracy: f64,
        /// The run was abandoned before the end
        #[arg(long)]
        incomplete: bool,
    },

    /// Evaluate score/speed unlocks for a topic
    Unlock {
        topic: String,
        #[arg(long)]
        score: u32,
        /// Average response time in seconds
        #[arg(long)]
        avg_time: f64,
    },

    /// Evaluate module unlocks. Without flags, figures come from this profile.
    Modules {
        #[arg(long)]
        accuracy: Option<f64>,
        #[arg(long)]
        level: Option<u32>,
        /// Per-module mastery as module=value, repeatable
        #[arg(long = "mastery", value_parser = parse_mastery)]
        mastery: Vec<(ModuleId, f64)>,
    },

    /// Show progress for one topic, or all topics
    Progress { topic: Option<String> },

    /// Show whether a difficulty is playable
    Access {
        topic: String,
        difficulty: Difficulty,
    },

    /// List questions due for review
    Due { topic: String },

    /// Lock every difficulty and module
    LockAll,

    /// Unlock every difficulty of every known topic and every configured module
    UnlockAll,

    /// Export the profile to a JSON file
    Export {
        /// Output file path
        path: PathBuf,
    },

    /// Replace the profile with a JSON file
    Import {
        /// Input file path
        path: PathBuf,
    },
}

fn parse_mastery(s: &str) -> std::result::Result<(ModuleId, f64), String> {
    let (module, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected module=value, got '{s}'"))?;
    let module = ModuleId::new(module).map_err(|e| e.to_string())?;
    let value = value
        .trim()
        .parse::<f64>()
        .map_err(|e| format!("bad mastery '{value}': {e}"))?;
    Ok((module, value))
}

fn open_profile(cli: &Cli) -> Result<ProfileStore> {
    let base_dir = std::env::var("LP_DATA_DIR").ok().map(PathBuf::from);
    ProfileStore::open(cli.profile.as_deref(), base_dir.as_deref())
        .context("failed to open profile store")
}

fn engine_config(cli: &Cli, profile: &ProfileStore) -> EngineConfig {
    let mut config = profile.load_config();
    if let Some(policy) = cli.policy {
        config.policy = policy;
    }
    config
}

fn open_engine(cli: &Cli) -> Result<ProgressionEngine<Store>> {
    let profile = open_profile(cli)?;
    let config = engine_config(cli, &profile);
    Ok(ProgressionEngine::open(profile.into_store(), config))
}

fn topic_arg(raw: &str) -> Result<TopicId> {
    TopicId::new(raw).with_context(|| format!("invalid topic '{raw}'"))
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

    match &cli.command {
        Commands::Serve => cmd_serve(&cli).await,
        Commands::Answer {
            topic,
            question_id,
            difficulty,
            wrong,
            time,
            attempts,
        } => cmd_answer(&cli, topic, question_id, *difficulty, !*wrong, *time, *attempts),
        Commands::Complete {
            topic,
            difficulty,
            accuracy,
            incomplete,
        } => cmd_complete(&cli, topic, *difficulty, !*incomplete, *accuracy),
        Commands::Unlock {
            topic,
            score,
            avg_time,
        } => cmd_unlock(&cli, topic, *score, *avg_time),
        Commands::Modules {
            accuracy,
            level,
            mastery,
        } => cmd_modules(&cli, *accuracy, *level, mastery),
        Commands::Progress { topic } => cmd_progress(&cli, topic.as_deref()),
        Commands::Access { topic, difficulty } => cmd_access(&cli, topic, *difficulty),
        Commands::Due { topic } => cmd_due(&cli, topic),
        Commands::LockAll => cmd_lock_all(&cli),
        Commands::UnlockAll => cmd_unlock_all(&cli),
        Commands::Export { path } => cmd_export(&cli, path),
        Commands::Import { path } => cmd_import(&cli, path),
    }
}

async fn cmd_serve(cli: &Cli) -> Result<()> {
    let profile = open_profile(cli)?;
    let name = profile.profile().to_string();
    let config = engine_config(cli, &profile);
    tracing::info!("starting MCP server for profile '{name}'");

    let engine = ProgressionEngine::open(profile.into_store(), config);
    let server = server::LpServer::new(engine);
    let service = server
        .serve(stdio())
        .await
        .context("failed to start MCP server")?;
    service.waiting().await?;
    Ok(())
}

fn cmd_answer(
    cli: &Cli,
    topic: &str,
    question_id: &str,
    difficulty: Difficulty,
    correct: bool,
    time: f64,
    attempts: u32,
) -> Result<()> {
    let topic = topic_arg(topic)?;
    let mut engine = open_engine(cli)?;
    let state = engine
        .record_answer(&topic, question_id, difficulty, correct, time, attempts)
        .context("failed to record answer")?;

    println!(
        "{topic}/{}: repetitions={} interval={}d ease={:.2} due={}",
        state.question_id,
        state.repetitions,
        state.interval_days,
        state.ease_factor,
        format_iso8601(state.due_at())
    );
    Ok(())
}

fn cmd_complete(
    cli: &Cli,
    topic: &str,
    difficulty: Difficulty,
    completed: bool,
    accuracy: f64,
) -> Result<()> {
    let topic = topic_arg(topic)?;
    let mut engine = open_engine(cli)?;
    let update = engine
        .update_topic_progress(&topic, difficulty, completed, accuracy)
        .context("failed to update topic progress")?;

    println!(
        "{topic}: mastery {:.3} -> {:.3}, level {} -> {}",
        update.mastery_before, update.mastery_after, update.level_before, update.level_after
    );
    if let Some(done) = update.newly_completed {
        println!("completed {done}");
    }
    Ok(())
}

fn cmd_unlock(cli: &Cli, topic: &str, score: u32, avg_time: f64) -> Result<()> {
    let topic = topic_arg(topic)?;
    let mut engine = open_engine(cli)?;
    let newly = engine
        .evaluate_difficulty_unlocks(&topic, score, avg_time)
        .context("failed to evaluate unlocks")?;

    if newly.is_empty() {
        println!("no new unlocks");
    } else {
        let names: Vec<&str> = newly.iter().map(|d| d.as_str()).collect();
        println!("unlocked: {}", names.join(", "));
    }
    Ok(())
}

fn cmd_modules(
    cli: &Cli,
    accuracy: Option<f64>,
    level: Option<u32>,
    mastery: &[(ModuleId, f64)],
) -> Result<()> {
    let mut engine = open_engine(cli)?;
    let derived = accuracy.is_none() && level.is_none() && mastery.is_empty();
    let result = if derived {
        engine.evaluate_module_unlocks_derived()
    } else {
        let stats = StaticStats {
            accuracy: accuracy.unwrap_or(0.0),
            level: level.unwrap_or(0),
            mastery: mastery.iter().cloned().collect::<BTreeMap<_, _>>(),
        };
        engine.evaluate_module_unlocks(&stats)
    };
    let evaluation = result.context("failed to evaluate module unlocks")?;

    if !evaluation.gate_passed {
        println!("module gate not met");
    }
    for module in engine.modules() {
        let mark = if engine.is_module_unlocked(&module) {
            "unlocked"
        } else {
            "locked"
        };
        let new = if evaluation.newly_unlocked.contains(&module) {
            " (new)"
        } else {
            ""
        };
        println!("{module}: {mark}{new}");
    }
    Ok(())
}

fn print_summary(engine: &mut ProgressionEngine<Store>, topic: &TopicId) {
    let summary = engine.topic_progress(topic);
    let tick = |done: bool| if done { "x" } else { "-" };
    let unlocked: Vec<&str> = engine
        .unlocked_levels(topic)
        .iter()
        .map(|d| d.as_str())
        .collect();
    println!(
        "{topic}: level={} mastery={:.3} easy[{}] medium[{}] hard[{}] unlocked={}",
        summary.current_level,
        summary.mastery_score,
        tick(summary.is_easy_completed),
        tick(summary.is_medium_completed),
        tick(summary.is_hard_completed),
        unlocked.join(",")
    );
}

fn cmd_progress(cli: &Cli, topic: Option<&str>) -> Result<()> {
    let mut engine = open_engine(cli)?;
    match topic {
        Some(raw) => {
            let topic = topic_arg(raw)?;
            print_summary(&mut engine, &topic);
        }
        None => {
            let topics: Vec<TopicId> = engine.topics().map(|p| p.topic.clone()).collect();
            if topics.is_empty() {
                println!("(no topics yet)");
            }
            for topic in &topics {
                print_summary(&mut engine, topic);
            }
            println!("overall: {:.1}%", engine.overall_progress() * 100.0);
        }
    }
    Ok(())
}

fn cmd_access(cli: &Cli, topic: &str, difficulty: Difficulty) -> Result<()> {
    let topic = topic_arg(topic)?;
    let engine = open_engine(cli)?;
    println!("mastery:   {}", engine.can_access_level(&topic, difficulty));
    println!("threshold: {}", engine.is_unlocked(&topic, difficulty));
    println!("playable:  {}", engine.can_play(&topic, difficulty));
    Ok(())
}

fn cmd_due(cli: &Cli, topic: &str) -> Result<()> {
    let topic = topic_arg(topic)?;
    let engine = open_engine(cli)?;
    let due = engine.due_reviews(&topic);
    if due.is_empty() {
        println!("nothing due");
    }
    for review in due {
        println!(
            "{} ({}) due {}",
            review.question_id,
            review.difficulty,
            format_iso8601(review.due_at())
        );
    }
    Ok(())
}

fn cmd_lock_all(cli: &Cli) -> Result<()> {
    let mut engine = open_engine(cli)?;
    engine.lock_all().context("failed to lock all")?;
    println!("locked all difficulties and modules");
    Ok(())
}

fn cmd_unlock_all(cli: &Cli) -> Result<()> {
    let mut engine = open_engine(cli)?;
    engine.unlock_all().context("failed to unlock all")?;
    println!("unlocked all difficulties and modules");
    Ok(())
}

fn cmd_export(cli: &Cli, path: &Path) -> Result<()> {
    let profile = open_profile(cli)?;
    profile
        .store()
        .export_json_file(path)
        .context("failed to export profile")?;
    println!("exported to {}", path.display());
    Ok(())
}

fn cmd_import(cli: &Cli, path: &Path) -> Result<()> {
    let profile = open_profile(cli)?;
    profile
        .store()
        .import_json_file(path)
        .context("failed to import JSON")?;

    let topics = profile
        .store()
        .topic_count()
        .context("failed to read profile after import")?;
    println!("imported from {}. topics={topics}", path.display());
    Ok(())
}
