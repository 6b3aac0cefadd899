pub mod bird;
pub mod config;
pub mod constants;
pub mod error;
pub mod ground;
pub mod mask;
pub mod pipe;
pub mod rng;
pub mod sim;
pub mod sprite;
pub mod tape;
pub mod verify;

pub use config::SimConfig;
pub use error::{ConfigError, GenerationError, InvariantCode, SimError, VerifyError};
pub use sim::{
    DecisionSource, EndReason, GenerationReport, LiveGame, Phase, PopulationManager, TickOutcome,
    World, WorldSnapshot,
};
pub use verify::{verify_tape, verify_tape_with_config, VerificationJournal};
