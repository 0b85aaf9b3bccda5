use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use hexawars::cli::{LocalPurse, TuiApp};
use hexawars::game::GameConfig;
use hexawars::{MemoryStore, StoreAdapter, TurnEngine};

#[derive(Debug, Parser)]
#[command(name = "hexawars-play")]
#[command(about = "Hex territory conquest against a shared game document")]
struct Args {
    /// Cohort id; all clients on the same cohort share one document
    #[arg(long, default_value = "grade-1")]
    cohort: String,

    /// Your team, 1-6
    #[arg(short, long, default_value_t = 1)]
    team: usize,

    /// Board radius
    #[arg(long, default_value_t = 13)]
    radius: i32,

    /// Number of teams on a fresh board
    #[arg(long, default_value_t = 6)]
    teams: usize,

    /// Die seed, for reproducible rolls
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Starting coin balance (each roll costs 1000)
    #[arg(long, default_value_t = 100_000)]
    coins: u32,
}

fn main() -> std::io::Result<()> {
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let session = Uuid::new_v4();
    let span = tracing::info_span!("session", %session, cohort = %args.cohort);
    let _guard = span.enter();

    if args.team == 0 || args.team > 6 {
        eprintln!("Error: --team must be between 1 and 6");
        std::process::exit(1);
    }

    let config = GameConfig {
        radius: args.radius,
        num_teams: args.teams,
        seed: args.seed,
    };

    // Single-process demo backend; a deployment would plug a networked
    // DocumentStore implementation in here instead.
    let store = Arc::new(MemoryStore::new());
    let adapter = StoreAdapter::new(store, &args.cohort);
    let subscription = adapter.subscribe();

    let engine = match TurnEngine::new(adapter, args.team - 1, &config) {
        Ok(engine) => engine,
        Err(err) => {
            eprintln!("Error: failed to join game: {err}");
            std::process::exit(1);
        }
    };

    let purse = LocalPurse { coins: args.coins };
    let mut app = TuiApp::new(engine, subscription, purse, args.radius);
    app.run()?;
    Ok(())
}
