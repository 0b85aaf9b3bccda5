pub mod engine;
pub mod players;
pub mod rules;

pub use engine::{
    CoinPurse, EngineError, GameConfig, RollOutcome, SelectOutcome, TurnEngine, WRITE_RETRY_LIMIT,
};
pub use players::Participant;
