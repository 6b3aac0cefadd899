use crate::pilots::{
    create_pilot, net_fingerprint, pilot_fingerprint, pilot_ids, FeedForwardNet, GenomePilot, Pilot,
};
use crate::util::seed_to_hex;
use anyhow::{anyhow, Context, Result};
use flappy_core::sim::{DeathCause, EndReason};
use flappy_core::tape::{encode_input_byte, serialize_tape, TickInput};
use flappy_core::{
    verify_tape_with_config, DecisionSource, Phase, PopulationManager, SimConfig, World,
};
use serde::Serialize;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

#[derive(Clone, Debug, Serialize)]
pub struct RunMetrics {
    pub pilot_id: String,
    pub pilot_fingerprint: String,
    pub seed: u32,
    pub max_ticks: u32,
    pub tick_count: u32,
    pub seconds: f64,
    pub final_score: u32,
    pub final_rng_state: u32,
    pub fitness: f64,
    pub death: Option<DeathCause>,
    pub survived: bool,
    pub rules_tag: u8,
    pub flap_ticks: u32,
}

#[derive(Clone, Debug)]
pub struct RunArtifact {
    pub metrics: RunMetrics,
    pub inputs: Vec<u8>,
    pub tape: Vec<u8>,
}

/// Wraps a pilot and records, per tick, whether its output triggered a jump.
struct TapeRecorder {
    pilot: Box<dyn Pilot>,
    jump_threshold: f64,
    inputs: Vec<u8>,
}

impl DecisionSource for TapeRecorder {
    fn decide(&mut self, inputs: [f64; 3]) -> Vec<f64> {
        let outputs = self.pilot.decide(inputs);
        let flap = outputs
            .first()
            .is_some_and(|signal| signal.is_finite() && *signal > self.jump_threshold);
        self.inputs.push(encode_input_byte(TickInput { flap }));
        outputs
    }
}

pub fn run_pilot(
    pilot_id: &str,
    config: &SimConfig,
    seed: u32,
    max_ticks: u32,
) -> Result<RunArtifact> {
    let pilot = create_pilot(pilot_id).ok_or_else(|| {
        anyhow!(
            "unknown pilot '{pilot_id}'. available: {}",
            pilot_ids().join(", ")
        )
    })?;
    let fingerprint = pilot_fingerprint(pilot_id).unwrap_or_else(|| "unknown".to_string());
    run_pilot_instance(pilot, fingerprint, config, seed, max_ticks)
}

pub fn run_genome(
    net: FeedForwardNet,
    config: &SimConfig,
    seed: u32,
    max_ticks: u32,
) -> Result<RunArtifact> {
    net.validate()?;
    let fingerprint = net_fingerprint(&net);
    run_pilot_instance(
        Box::new(GenomePilot::from_net(net)),
        fingerprint,
        config,
        seed,
        max_ticks,
    )
}

/// Flies one bird until it dies or `max_ticks` elapse, then checks that the
/// recorded tape verifies under the same rules.
pub fn run_pilot_instance(
    mut pilot: Box<dyn Pilot>,
    pilot_fingerprint: String,
    config: &SimConfig,
    seed: u32,
    max_ticks: u32,
) -> Result<RunArtifact> {
    if max_ticks == 0 {
        return Err(anyhow!("max_ticks must be > 0"));
    }

    pilot.reset(seed);
    let pilot_id = pilot.id();
    let config = SimConfig {
        max_ticks: Some(config.max_ticks.map_or(max_ticks, |cap| cap.min(max_ticks))),
        ..config.clone()
    };

    let recorder = TapeRecorder {
        pilot,
        jump_threshold: config.jump_threshold,
        inputs: Vec::with_capacity(max_ticks as usize),
    };
    let mut world = World::new(config.clone(), seed, 1, vec![recorder])
        .context("failed to build world")?;

    while world.phase() == Phase::Running {
        let outcome = world.tick().with_context(|| {
            format!("simulation failed for pilot={pilot_id} seed={}", seed_to_hex(seed))
        })?;
        if outcome.pipes_passed > 0 {
            debug!(pilot = pilot_id, tick = outcome.tick, score = outcome.score, "pipe passed");
        }
        for death in &outcome.deaths {
            debug!(pilot = pilot_id, tick = death.tick, cause = ?death.cause, "bird died");
        }
    }

    let tick_count = world.tick_count();
    let final_score = world.score();
    let final_rng_state = world.rng_state();
    let result = world
        .into_report()
        .results
        .into_iter()
        .next()
        .ok_or_else(|| anyhow!("run finished without an agent result"))?;
    let inputs = result.brain.inputs;

    let tape = serialize_tape(seed, &inputs, final_score, final_rng_state);
    let journal = verify_tape_with_config(&tape, max_ticks.max(tick_count).max(1), &config)
        .map_err(|err| anyhow!("generated tape failed verification: {err}"))?;

    let survived = result.death.is_none();
    info!(
        pilot = pilot_id,
        seed = %seed_to_hex(seed),
        ticks = tick_count,
        score = final_score,
        survived,
        "run complete"
    );

    Ok(RunArtifact {
        metrics: RunMetrics {
            pilot_id: pilot_id.to_string(),
            pilot_fingerprint,
            seed,
            max_ticks,
            tick_count,
            seconds: config.ticks_to_seconds(tick_count),
            final_score,
            final_rng_state,
            fitness: result.fitness,
            death: result.death.map(|death| death.cause),
            survived,
            rules_tag: journal.rules_tag,
            flap_ticks: inputs.iter().filter(|byte| **byte != 0).count() as u32,
        },
        inputs,
        tape,
    })
}

pub fn write_tape(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed creating directory {}", parent.display()))?;
    }
    fs::write(path, bytes).with_context(|| format!("failed writing {}", path.display()))
}

#[derive(Clone, Debug, Serialize)]
pub struct GenomeFitness {
    /// Position of the genome in the input list.
    pub index: usize,
    pub fitness: f64,
    pub ticks_survived: u32,
    pub pipes_passed: u32,
    pub death: Option<DeathCause>,
}

#[derive(Clone, Debug, Serialize)]
pub struct GenerationFitness {
    pub generation: u32,
    pub base_seed: u32,
    pub seed: u32,
    pub ticks: u32,
    pub score: u32,
    pub end_reason: Option<EndReason>,
    pub genomes: Vec<GenomeFitness>,
}

impl GenerationFitness {
    pub fn best(&self) -> Option<&GenomeFitness> {
        self.genomes
            .iter()
            .max_by(|a, b| a.fitness.total_cmp(&b.fitness))
    }
}

/// Starts the manager's next generation with one agent per network, runs it
/// on a shared course and reports each genome's fitness.
pub fn evaluate_genomes(
    manager: &mut PopulationManager,
    genomes: Vec<FeedForwardNet>,
) -> Result<GenerationFitness> {
    if manager.config().max_ticks.is_none() {
        return Err(anyhow!("genome evaluation requires max_ticks in the config"));
    }
    for (idx, net) in genomes.iter().enumerate() {
        net.validate().with_context(|| format!("genome {idx}"))?;
    }

    let population = genomes.len();
    let next = manager.generation() + 1;
    let mut world = manager
        .start_generation(genomes)
        .with_context(|| format!("failed to start generation {next}"))?;
    let generation = world.generation();
    let seed = world.seed();

    while world.phase() == Phase::Running {
        let outcome = world
            .tick()
            .with_context(|| format!("generation {generation} failed"))?;
        for death in &outcome.deaths {
            debug!(
                generation,
                agent = death.agent_id,
                tick = death.tick,
                cause = ?death.cause,
                alive = outcome.alive,
                "agent died"
            );
        }
    }

    let report = world.into_report();
    let fitness = GenerationFitness {
        generation,
        base_seed: manager.base_seed(),
        seed,
        ticks: report.ticks,
        score: report.score,
        end_reason: report.end_reason,
        genomes: report
            .results
            .iter()
            .map(|result| GenomeFitness {
                index: result.id,
                fitness: result.fitness,
                ticks_survived: result.ticks_survived,
                pipes_passed: result.pipes_passed,
                death: result.death.map(|death| death.cause),
            })
            .collect(),
    };

    info!(
        generation,
        population,
        seed = %seed_to_hex(seed),
        ticks = fitness.ticks,
        score = fitness.score,
        best = fitness.best().map(|best| best.fitness).unwrap_or_default(),
        "generation evaluated"
    );
    Ok(fitness)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pilots::DenseLayer;
    use flappy_core::rng::generation_seed;

    fn constant_net(bias: f64) -> FeedForwardNet {
        FeedForwardNet {
            layers: vec![DenseLayer {
                weights: vec![vec![0.0; 3]],
                biases: vec![bias],
            }],
        }
    }

    #[test]
    fn idle_pilot_falls_to_the_ground() {
        let artifact = run_pilot("idle", &SimConfig::default(), 0xDEAD_BEEF, 600).unwrap();
        let metrics = &artifact.metrics;
        assert_eq!(metrics.tick_count, 23);
        assert_eq!(metrics.death, Some(DeathCause::Ground));
        assert!(!metrics.survived);
        assert_eq!(metrics.flap_ticks, 0);
        assert!((metrics.fitness - 2.3).abs() < 1e-9);
        assert_eq!(artifact.inputs, vec![0u8; 23]);
    }

    #[test]
    fn survivors_stop_at_max_ticks() {
        // Hovers around the spawn height until the first pipe arrives.
        let artifact = run_pilot("flapper", &SimConfig::default(), 3, 40).unwrap();
        assert_eq!(artifact.metrics.tick_count, 40);
        assert!(artifact.metrics.survived);
        assert_eq!(artifact.inputs.len(), 40);
        assert!(artifact.metrics.flap_ticks > 0);
    }

    #[test]
    fn unknown_pilot_lists_the_roster() {
        let err = run_pilot("nobody", &SimConfig::default(), 1, 10).unwrap_err();
        assert!(err.to_string().contains("gap-seeker"));
        assert!(run_pilot("idle", &SimConfig::default(), 1, 0).is_err());
    }

    #[test]
    fn genome_runs_are_fingerprinted_by_weights() {
        let a = run_genome(constant_net(-1.0), &SimConfig::default(), 9, 100).unwrap();
        let b = run_genome(constant_net(-2.0), &SimConfig::default(), 9, 100).unwrap();
        assert_eq!(a.metrics.pilot_id, "genome");
        assert_ne!(a.metrics.pilot_fingerprint, b.metrics.pilot_fingerprint);
        assert_eq!(a.tape, b.tape);
    }

    #[test]
    fn evaluate_reports_fitness_in_genome_order() {
        let config = SimConfig {
            max_ticks: Some(300),
            ..SimConfig::default()
        };
        let mut manager = PopulationManager::resume(config, 0xABCD, 3).unwrap();
        let genomes = vec![constant_net(-1.0), constant_net(1.0), constant_net(-1.0)];
        let fitness = evaluate_genomes(&mut manager, genomes).unwrap();

        assert_eq!(fitness.generation, 4);
        assert_eq!(fitness.base_seed, 0xABCD);
        assert_eq!(fitness.seed, generation_seed(0xABCD, 4));
        assert_eq!(fitness.end_reason, Some(EndReason::Extinct));
        let indices: Vec<usize> = fitness.genomes.iter().map(|g| g.index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
        assert_eq!(fitness.genomes[0].death, Some(DeathCause::Ground));
        assert_eq!(fitness.genomes[1].death, Some(DeathCause::Ceiling));
        assert_eq!(fitness.best().map(|best| best.index), Some(1));
    }

    #[test]
    fn consecutive_evaluations_advance_the_generation() {
        let config = SimConfig {
            max_ticks: Some(50),
            ..SimConfig::default()
        };
        let mut manager = PopulationManager::new(config, 0x7777).unwrap();

        let first = evaluate_genomes(&mut manager, vec![constant_net(-1.0)]).unwrap();
        let second = evaluate_genomes(&mut manager, vec![constant_net(-1.0)]).unwrap();
        assert_eq!((first.generation, second.generation), (1, 2));
        assert_eq!(first.seed, generation_seed(0x7777, 1));
        assert_eq!(second.seed, generation_seed(0x7777, 2));
        assert_eq!(manager.generation(), 2);
    }

    #[test]
    fn evaluate_requires_a_tick_cap_and_genomes() {
        let mut uncapped = PopulationManager::new(SimConfig::default(), 1).unwrap();
        assert!(evaluate_genomes(&mut uncapped, vec![constant_net(0.0)]).is_err());
        assert_eq!(uncapped.generation(), 0);

        let capped = SimConfig {
            max_ticks: Some(10),
            ..SimConfig::default()
        };
        let mut capped = PopulationManager::new(capped, 1).unwrap();
        assert!(evaluate_genomes(&mut capped, Vec::new()).is_err());
        assert_eq!(capped.generation(), 0);
    }
}
