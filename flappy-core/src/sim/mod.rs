//! Generation-level simulation: a population of birds flying one shared
//! course, with fitness bookkeeping for an external optimizer.

use serde::{Deserialize, Serialize};

use crate::bird::Bird;
use crate::config::SimConfig;
use crate::error::{ConfigError, GenerationError, InvariantCode, SimError};
use crate::ground::Ground;
use crate::pipe::Pipe;
use crate::rng::{generation_seed, SeededRng};
use crate::sprite::{SpriteAtlas, WingFrame};
use crate::tape::{decode_input_byte, encode_input_byte, serialize_tape, TickInput};

mod world;

pub use world::World;

/// Per-agent controller. Receives `(y, |y - gap_top|, |y - gap_bottom|)` for
/// the agent's active pipe and returns an output vector whose first element
/// is the jump signal.
pub trait DecisionSource {
    fn decide(&mut self, inputs: [f64; 3]) -> Vec<f64>;
}

impl<D: DecisionSource + ?Sized> DecisionSource for Box<D> {
    fn decide(&mut self, inputs: [f64; 3]) -> Vec<f64> {
        (**self).decide(inputs)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Running,
    Ended,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    /// Every agent died.
    Extinct,
    ScoreCap,
    TickLimit,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeathCause {
    Obstacle,
    Ground,
    Ceiling,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeathEvent {
    pub agent_id: usize,
    pub cause: DeathCause,
    pub tick: u32,
}

/// What happened during one `tick()`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickOutcome {
    pub tick: u32,
    pub deaths: Vec<DeathEvent>,
    /// 0 or 1: score moves at most once per tick.
    pub pipes_passed: u32,
    pub score: u32,
    pub alive: usize,
    pub phase: Phase,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AgentResult<D> {
    pub id: usize,
    pub brain: D,
    pub fitness: f64,
    pub ticks_survived: u32,
    pub pipes_passed: u32,
    /// `None` when the generation ended on a cap with this agent alive.
    pub death: Option<DeathEvent>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GenerationReport<D> {
    pub generation: u32,
    pub seed: u32,
    pub ticks: u32,
    pub score: u32,
    pub end_reason: Option<EndReason>,
    /// Ordered by agent id, i.e. by the order brains were supplied.
    pub results: Vec<AgentResult<D>>,
}

impl<D> GenerationReport<D> {
    pub fn fitness(&self) -> Vec<f64> {
        self.results.iter().map(|result| result.fitness).collect()
    }

    pub fn best(&self) -> Option<&AgentResult<D>> {
        self.results
            .iter()
            .max_by(|a, b| a.fitness.total_cmp(&b.fitness))
    }

    pub fn into_brains(self) -> Vec<D> {
        self.results.into_iter().map(|result| result.brain).collect()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BirdSnapshot {
    pub id: usize,
    pub x: f64,
    pub y: f64,
    pub velocity: f64,
    pub tilt: f64,
    pub frame: WingFrame,
    pub fitness: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PipeSnapshot {
    pub x: f64,
    pub gap_top: f64,
    pub gap_bottom: f64,
    pub passed: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GroundSnapshot {
    pub x1: f64,
    pub x2: f64,
}

/// Read-only view of a world for renderers and debugging output.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WorldSnapshot {
    pub generation: u32,
    pub tick: u32,
    pub score: u32,
    pub phase: Phase,
    pub end_reason: Option<EndReason>,
    pub rng_state: u32,
    pub birds: Vec<BirdSnapshot>,
    pub pipes: Vec<PipeSnapshot>,
    pub ground: GroundSnapshot,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayResult {
    pub final_score: u32,
    pub final_rng_state: u32,
    pub tick_count: u32,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ReplayCheckpoint {
    pub tick: u32,
    pub rng_state: u32,
    pub score: u32,
    /// `None` once the bird is dead.
    pub bird_y: Option<f64>,
    pub bird_tilt: Option<f64>,
    pub pipes: usize,
}

/// Index of the pipe whose gap an agent at `bird_x` should aim for: the first
/// pipe, or the second once the agent is past the first one's right edge.
fn active_pipe_index(pipes: &[Pipe], bird_x: f64) -> Option<usize> {
    match pipes {
        [] => None,
        [first, _, ..] if bird_x > first.right_edge() => Some(1),
        _ => Some(0),
    }
}

#[inline]
fn decision_inputs(bird: &Bird, pipe: &Pipe) -> [f64; 3] {
    let y = bird.y();
    [
        y,
        (y - pipe.gap_top()).abs(),
        (y - pipe.gap_bottom()).abs(),
    ]
}

/// Missing and non-finite outputs never trigger a jump.
#[inline]
fn wants_jump(outputs: &[f64], threshold: f64) -> bool {
    outputs
        .first()
        .is_some_and(|signal| signal.is_finite() && *signal > threshold)
}

/// Hands out generation numbers and per-generation seeds, and builds the
/// world each generation runs in.
#[derive(Clone, Debug)]
pub struct PopulationManager {
    config: SimConfig,
    base_seed: u32,
    generation: u32,
}

impl PopulationManager {
    pub fn new(config: SimConfig, base_seed: u32) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            base_seed,
            generation: 0,
        })
    }

    /// Manager whose next `start_generation` is `completed + 1`. Used to pick
    /// a run back up after `completed` generations were evaluated elsewhere.
    pub fn resume(
        config: SimConfig,
        base_seed: u32,
        completed: u32,
    ) -> Result<Self, ConfigError> {
        let mut manager = Self::new(config, base_seed)?;
        manager.generation = completed;
        Ok(manager)
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn base_seed(&self) -> u32 {
        self.base_seed
    }

    /// Number of generations started so far.
    pub fn generation(&self) -> u32 {
        self.generation
    }

    pub fn start_generation<D: DecisionSource>(
        &mut self,
        brains: Vec<D>,
    ) -> Result<World<D>, ConfigError> {
        let generation = self.generation + 1;
        let seed = generation_seed(self.base_seed, generation);
        let world = World::new(self.config.clone(), seed, generation, brains)?;
        self.generation = generation;
        Ok(world)
    }

    /// Runs a fresh generation to its end and returns every agent's result.
    pub fn evaluate<D: DecisionSource>(
        &mut self,
        brains: Vec<D>,
    ) -> Result<GenerationReport<D>, GenerationError> {
        let mut world = self.start_generation(brains)?;
        world.run_to_end()?;
        Ok(world.into_report())
    }
}

/// Replays a recorded flap byte instead of consulting a model.
#[derive(Clone, Copy, Debug, Default)]
struct HeldInput {
    flap: bool,
}

impl DecisionSource for HeldInput {
    fn decide(&mut self, _inputs: [f64; 3]) -> Vec<f64> {
        vec![if self.flap { f64::MAX } else { f64::MIN }]
    }
}

/// Single-bird game driven by per-tick player input. Every accepted input is
/// recorded so the run can be written out as a tape.
#[derive(Clone, Debug)]
pub struct LiveGame {
    world: World<HeldInput>,
    seed: u32,
    inputs: Vec<u8>,
}

impl LiveGame {
    pub fn new(config: SimConfig, seed: u32) -> Result<Self, ConfigError> {
        Ok(Self {
            world: World::new(config, seed, 1, vec![HeldInput::default()])?,
            seed,
            inputs: Vec::new(),
        })
    }

    pub fn step(&mut self, flap: bool) -> Result<TickOutcome, SimError> {
        self.step_input(TickInput { flap })
    }

    pub fn step_input(&mut self, input: TickInput) -> Result<TickOutcome, SimError> {
        for brain in self.world.brains_mut() {
            brain.flap = input.flap;
        }
        let outcome = self.world.tick()?;
        self.inputs.push(encode_input_byte(input));
        Ok(outcome)
    }

    #[inline]
    pub fn is_over(&self) -> bool {
        self.world.phase() == Phase::Ended
    }

    pub fn death(&self) -> Option<DeathEvent> {
        self.world.retired().first().and_then(|result| result.death)
    }

    #[inline]
    pub fn inputs(&self) -> &[u8] {
        &self.inputs
    }

    #[inline]
    pub fn snapshot(&self) -> WorldSnapshot {
        self.world.snapshot()
    }

    pub fn result(&self) -> ReplayResult {
        ReplayResult {
            final_score: self.world.score(),
            final_rng_state: self.world.rng_state(),
            tick_count: self.world.tick_count(),
        }
    }

    #[inline]
    pub fn validate(&self) -> Result<(), InvariantCode> {
        self.world.validate_invariants()
    }

    pub fn to_tape(&self) -> Vec<u8> {
        let result = self.result();
        serialize_tape(
            self.seed,
            &self.inputs,
            result.final_score,
            result.final_rng_state,
        )
    }

    fn checkpoint(&self) -> ReplayCheckpoint {
        let bird = self.world.birds().next();
        ReplayCheckpoint {
            tick: self.world.tick_count(),
            rng_state: self.world.rng_state(),
            score: self.world.score(),
            bird_y: bird.map(|(_, bird)| bird.y()),
            bird_tilt: bird.map(|(_, bird)| bird.tilt()),
            pipes: self.world.pipes().len(),
        }
    }
}

/// Re-runs recorded inputs. Inputs left over after the bird died are not
/// simulated, so the returned tick count is short of `inputs.len()`.
pub fn replay(
    config: &SimConfig,
    seed: u32,
    inputs: &[u8],
) -> Result<ReplayResult, GenerationError> {
    let mut game = LiveGame::new(config.clone(), seed)?;
    for byte in inputs {
        if game.is_over() {
            break;
        }
        game.step_input(decode_input_byte(*byte))?;
    }
    Ok(game.result())
}

pub fn replay_with_checkpoints(
    config: &SimConfig,
    seed: u32,
    inputs: &[u8],
    sample_every: u32,
) -> Result<Vec<ReplayCheckpoint>, GenerationError> {
    let mut game = LiveGame::new(config.clone(), seed)?;
    let stride = sample_every.max(1);
    let mut checkpoints = vec![game.checkpoint()];

    for input in inputs {
        if game.is_over() {
            break;
        }
        game.step_input(decode_input_byte(*input))?;
        let tick = game.world.tick_count();
        if tick % stride == 0 || game.is_over() || tick as usize == inputs.len() {
            checkpoints.push(game.checkpoint());
        }
    }

    Ok(checkpoints)
}
