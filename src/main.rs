//! mtg-rules: command-line front end for the rules engine
//!
//! Validates card-script folders, creates new games from deck files and
//! replays recorded actions against a saved game.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use mtg_rules_engine::game::{Action, GameLogger, GameSnapshot, OutputFormat, RulesEngine, VerbosityLevel};
use mtg_rules_engine::loader::{CardDatabase, DeckLoader, GameInitializer};
use mtg_rules_engine::GameConfig;
use std::path::{Path, PathBuf};

/// Log line format
#[derive(Debug, Clone, Copy, ValueEnum)]
enum FormatArg {
    Text,
    Json,
}

impl From<FormatArg> for OutputFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Text => OutputFormat::Text,
            FormatArg::Json => OutputFormat::Json,
        }
    }
}

#[derive(Parser)]
#[command(name = "mtg-rules")]
#[command(about = "Deterministic Magic rules engine", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load every card script under a directory and report problems
    ValidateScripts {
        /// Directory containing *.json card scripts
        #[arg(value_name = "DIR")]
        dir: PathBuf,
    },

    /// Create a game from two deck files and save it as a snapshot
    NewGame {
        /// Directory containing *.json card scripts
        #[arg(long, value_name = "DIR")]
        cards: PathBuf,

        /// Deck file (.dck) for player 1
        #[arg(long, value_name = "PLAYER1_DECK")]
        deck1: PathBuf,

        /// Deck file (.dck) for player 2
        #[arg(long, value_name = "PLAYER2_DECK")]
        deck2: PathBuf,

        /// Seed for library shuffles
        #[arg(long, default_value_t = 0)]
        seed: u64,

        /// Player 1 name
        #[arg(long, default_value = "Player 1")]
        p1_name: String,

        /// Player 2 name
        #[arg(long, default_value = "Player 2")]
        p2_name: String,

        /// Skip the mulligan pregame
        #[arg(long)]
        no_mulligans: bool,

        /// Snapshot file to write
        #[arg(long, value_name = "FILE")]
        output: PathBuf,
    },

    /// Apply a JSON list of actions to a saved game
    Replay {
        /// Directory containing *.json card scripts
        #[arg(long, value_name = "DIR")]
        cards: PathBuf,

        /// Snapshot to start from
        #[arg(long, value_name = "FILE")]
        state: PathBuf,

        /// JSON array of actions
        #[arg(long, value_name = "FILE")]
        actions: PathBuf,

        /// Where to save the resulting snapshot
        #[arg(long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Verbosity level for game output (0=silent, 1=minimal, 2=normal, 3=verbose)
        #[arg(long, short = 'v', default_value = "normal")]
        verbosity: VerbosityLevel,

        /// Log line format
        #[arg(long, value_enum, default_value = "text")]
        format: FormatArg,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::ValidateScripts { dir } => validate_scripts(&dir).await,
        Commands::NewGame { cards, deck1, deck2, seed, p1_name, p2_name, no_mulligans, output } => {
            let mut config = GameConfig::default().with_seed(seed);
            if no_mulligans {
                config = config.without_mulligans();
            }
            new_game(&cards, [(p1_name.as_str(), &deck1), (p2_name.as_str(), &deck2)], config, &output).await
        }
        Commands::Replay { cards, state, actions, output, verbosity, format } => {
            replay(&cards, &state, &actions, output.as_deref(), verbosity, format.into()).await
        }
    }
}

async fn validate_scripts(dir: &Path) -> Result<()> {
    let report = CardDatabase::new(dir)
        .scan()
        .await
        .with_context(|| format!("scanning {}", dir.display()))?;

    for failure in &report.failures {
        println!("FAIL {}: {}", failure.path.display(), failure.reason);
    }
    println!(
        "{} scripts loaded, {} failed ({:.2?})",
        report.loaded(),
        report.failures.len(),
        report.duration
    );
    if !report.is_clean() {
        bail!("{} card scripts failed validation", report.failures.len());
    }
    Ok(())
}

async fn new_game(cards: &Path, seats: [(&str, &PathBuf); 2], config: GameConfig, output: &Path) -> Result<()> {
    let registry = CardDatabase::new(cards)
        .load()
        .await
        .with_context(|| format!("loading card scripts from {}", cards.display()))?;

    let mut decks = Vec::with_capacity(seats.len());
    for (_, path) in &seats {
        let deck = DeckLoader::load_from_file(path)
            .await
            .with_context(|| format!("loading deck {}", path.display()))?;
        decks.push(deck);
    }
    let table: Vec<_> = seats.iter().map(|(name, _)| *name).zip(decks.iter()).collect();
    let game = GameInitializer::new(&registry).init_game(config, &table)?;

    let engine = RulesEngine::new(&registry);
    let started = engine.start_game(&game);
    if let Some(reason) = started.error {
        bail!("could not start the game: {}", reason);
    }

    GameSnapshot::new(started.state)
        .save_to_file(output)
        .with_context(|| format!("writing {}", output.display()))?;
    println!("New game saved to {}", output.display());
    if let Some(decision) = &started.pending_decision {
        println!("Waiting on decision {} ({}): {}", decision.id, decision.kind.name(), decision.prompt);
    }
    Ok(())
}

async fn replay(
    cards: &Path,
    state: &Path,
    actions: &Path,
    output: Option<&Path>,
    verbosity: VerbosityLevel,
    format: OutputFormat,
) -> Result<()> {
    let registry = CardDatabase::new(cards)
        .load()
        .await
        .with_context(|| format!("loading card scripts from {}", cards.display()))?;
    let snapshot = GameSnapshot::load_from_file(state).with_context(|| format!("loading {}", state.display()))?;
    let json = tokio::fs::read_to_string(actions)
        .await
        .with_context(|| format!("reading {}", actions.display()))?;
    let actions: Vec<Action> = serde_json::from_str(&json).context("parsing action list")?;

    let mut logger = GameLogger::with_verbosity(verbosity);
    logger.set_output_format(format);
    let engine = RulesEngine::with_logger(&registry, logger);

    let (final_state, results) = engine.execute_all(&snapshot.into_state(), &actions);
    let applied = results.iter().filter(|r| r.is_ok()).count();
    println!("Applied {}/{} actions", applied, actions.len());

    if let Some(path) = output {
        GameSnapshot::new(final_state.clone())
            .save_to_file(path)
            .with_context(|| format!("writing {}", path.display()))?;
        println!("Final state saved to {}", path.display());
    }

    if final_state.game_over {
        match final_state.winner.and_then(|id| final_state.player(id).ok()) {
            Some(winner) => println!("Game over: {} wins", winner.name),
            None => println!("Game over: draw"),
        }
    } else if let Some(decision) = &final_state.pending_decision {
        println!("Waiting on decision {} ({}): {}", decision.id, decision.kind.name(), decision.prompt);
    }

    if let Some((index, reason)) = results.iter().enumerate().find_map(|(i, r)| r.error.as_ref().map(|e| (i, e))) {
        bail!("action {} ({}) rejected: {}", index, actions[index].name(), reason);
    }
    Ok(())
}
