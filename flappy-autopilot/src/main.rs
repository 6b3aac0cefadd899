use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use flappy_autopilot::benchmark::{resolve_pilots, run_benchmark, BenchmarkConfig, Objective};
use flappy_autopilot::pilots::{create_pilot, describe_pilots, pilot_ids, FeedForwardNet};
use flappy_autopilot::runner::{evaluate_genomes, run_genome, run_pilot, write_tape};
use flappy_autopilot::util::{
    load_sim_config, parse_seed, parse_seed_csv, parse_seed_file, seed_sequence, seed_to_hex,
};
use flappy_core::constants::MAX_TICKS_DEFAULT;
use flappy_core::tape::parse_tape;
use flappy_core::{verify_tape_with_config, PopulationManager, SimConfig};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Parser, Debug)]
#[command(name = "flappy-autopilot")]
#[command(about = "Autopilot lab for deterministic Flappy Bird runs, tapes and genome fitness")]
struct Cli {
    /// JSON simulation config; omitted fields keep the reference rules
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List available pilots
    ListPilots,
    /// Fly one pilot (or a genome file) and write a verifiable tape
    Generate {
        #[arg(long, conflicts_with = "genome")]
        pilot: Option<String>,
        /// Genome JSON holding a single network
        #[arg(long)]
        genome: Option<PathBuf>,
        #[arg(long)]
        seed: String,
        /// 18000 ticks = 10 minutes at 30 Hz
        #[arg(long, default_value_t = 18_000)]
        max_ticks: u32,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Verify an existing tape against the current rules
    VerifyTape {
        #[arg(long)]
        input: PathBuf,
        #[arg(long, default_value_t = MAX_TICKS_DEFAULT)]
        max_ticks: u32,
    },
    /// Run pilots over many seeds and rank them
    Benchmark {
        #[arg(long)]
        pilots: Option<String>,
        #[arg(long)]
        seeds: Option<String>,
        #[arg(long)]
        seed_file: Option<PathBuf>,
        #[arg(long)]
        seed_start: Option<String>,
        #[arg(long, default_value_t = 12)]
        seed_count: u32,
        #[arg(long, default_value_t = 18_000)]
        max_ticks: u32,
        #[arg(long, value_enum, default_value_t = CliObjective::Score)]
        objective: CliObjective,
        #[arg(long)]
        out_dir: Option<PathBuf>,
        #[arg(long, default_value_t = 3)]
        save_top: usize,
        #[arg(long)]
        jobs: Option<usize>,
    },
    /// Score one generation of genomes and write their fitness as JSON
    Evaluate {
        /// JSON array of networks, one per agent
        #[arg(long)]
        genomes: PathBuf,
        #[arg(long)]
        seed: String,
        /// Generation to evaluate; its course seed is derived from --seed
        #[arg(long, default_value_t = 1)]
        generation: u32,
        #[arg(long, default_value_t = 18_000)]
        max_ticks: u32,
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum CliObjective {
    Score,
    Survival,
    Fitness,
}

impl From<CliObjective> for Objective {
    fn from(value: CliObjective) -> Self {
        match value {
            CliObjective::Score => Objective::Score,
            CliObjective::Survival => Objective::Survival,
            CliObjective::Fitness => Objective::Fitness,
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::filter::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let Cli { config, command } = Cli::parse();
    let sim = load_sim_config(config.as_deref())?;

    match command {
        Commands::ListPilots => {
            for (id, description) in describe_pilots() {
                println!("{id:18} {description}");
            }
        }
        Commands::Generate {
            pilot,
            genome,
            seed,
            max_ticks,
            output,
        } => {
            let seed = parse_seed(&seed)?;
            let artifact = match (pilot, genome) {
                (_, Some(path)) => run_genome(FeedForwardNet::load(&path)?, &sim, seed, max_ticks)?,
                (Some(pilot), None) => {
                    if create_pilot(&pilot).is_none() {
                        let available = pilot_ids().join(", ");
                        return Err(anyhow!("unknown pilot '{pilot}'. available: {available}"));
                    }
                    run_pilot(&pilot, &sim, seed, max_ticks)?
                }
                (None, None) => return Err(anyhow!("generate needs --pilot or --genome")),
            };

            let metrics = &artifact.metrics;
            let output_path = output.unwrap_or_else(|| {
                PathBuf::from(format!(
                    "tapes/{}-{}-score{}-ticks{}.tape",
                    metrics.pilot_id,
                    seed_to_hex(seed).replace("0x", "seed"),
                    metrics.final_score,
                    metrics.tick_count
                ))
            });
            write_tape(&output_path, &artifact.tape)?;

            println!("pilot={}", metrics.pilot_id);
            println!("pilot_fingerprint={}", metrics.pilot_fingerprint);
            println!("seed={}", seed_to_hex(seed));
            println!("ticks={}", metrics.tick_count);
            println!("seconds={:.1}", metrics.seconds);
            println!("score={}", metrics.final_score);
            println!("fitness={:.1}", metrics.fitness);
            println!(
                "death={}",
                metrics
                    .death
                    .map(|cause| format!("{cause:?}").to_lowercase())
                    .unwrap_or_else(|| "none".to_string())
            );
            println!("rng={:#010x}", metrics.final_rng_state);
            println!("output={}", output_path.display());
        }
        Commands::VerifyTape { input, max_ticks } => {
            let bytes =
                fs::read(&input).with_context(|| format!("failed reading {}", input.display()))?;
            let tape = parse_tape(&bytes, max_ticks)?;
            let journal = verify_tape_with_config(&bytes, max_ticks, &sim)?;
            println!("input={}", input.display());
            println!("seed={}", seed_to_hex(tape.header.seed));
            println!("tick_count={}", journal.tick_count);
            println!("final_score={}", journal.final_score);
            println!("final_rng_state={:#010x}", journal.final_rng_state);
            println!("checksum={:#010x}", journal.tape_checksum);
            println!("rules_tag={}", journal.rules_tag);
        }
        Commands::Benchmark {
            pilots,
            seeds,
            seed_file,
            seed_start,
            seed_count,
            max_ticks,
            objective,
            out_dir,
            save_top,
            jobs,
        } => {
            let pilots = resolve_pilots(pilots.as_deref())?;
            let seeds = resolve_seeds(
                seeds.as_deref(),
                seed_file.as_deref(),
                seed_start.as_deref(),
                seed_count,
            )?;
            let objective: Objective = objective.into();
            let out_dir = out_dir.unwrap_or_else(|| {
                PathBuf::from(format!(
                    "benchmarks/{}-{}",
                    objective.as_str(),
                    timestamp_suffix()
                ))
            });

            let report = run_benchmark(BenchmarkConfig {
                pilots,
                seeds,
                max_ticks,
                sim,
                objective,
                out_dir: out_dir.clone(),
                save_top,
                jobs,
            })?;

            println!("objective={}", objective.as_str());
            println!("runs={}", report.run_count);
            println!(
                "jobs={}",
                report
                    .jobs
                    .map(|value| value.to_string())
                    .unwrap_or_else(|| "auto".to_string())
            );
            println!("out_dir={}", out_dir.display());
            println!("top pilots:");
            for (idx, pilot) in report.pilot_rankings.iter().take(5).enumerate() {
                println!(
                    "  {}. {}  objective={:.2} avg_score={:.1} max_score={} avg_ticks={:.1} avg_fitness={:.1} survival={:.0}%",
                    idx + 1,
                    pilot.pilot_id,
                    pilot.objective_value,
                    pilot.avg_score,
                    pilot.max_score,
                    pilot.avg_ticks,
                    pilot.avg_fitness,
                    pilot.survival_rate * 100.0,
                );
            }

            println!("saved tapes:");
            for tape in report.saved_tapes.iter().take(10) {
                println!(
                    "  [{} #{:02}] {} {} score={} ticks={}",
                    tape.metric, tape.rank, tape.pilot_id, tape.seed_hex, tape.score, tape.ticks,
                );
            }
        }
        Commands::Evaluate {
            genomes,
            seed,
            generation,
            max_ticks,
            output,
        } => {
            let base_seed = parse_seed(&seed)?;
            let nets = FeedForwardNet::load_population(&genomes)?;
            let sim = SimConfig {
                max_ticks: Some(sim.max_ticks.map_or(max_ticks, |cap| cap.min(max_ticks))),
                ..sim
            };
            if generation == 0 {
                return Err(anyhow!("generations are numbered from 1"));
            }
            let mut manager = PopulationManager::resume(sim, base_seed, generation - 1)?;
            let fitness = evaluate_genomes(&mut manager, nets)?;
            let encoded = serde_json::to_vec_pretty(&fitness)?;

            if let Some(path) = output {
                if let Some(parent) = path.parent() {
                    fs::create_dir_all(parent)?;
                }
                fs::write(&path, encoded)
                    .with_context(|| format!("failed writing {}", path.display()))?;
                println!("generation={}", fitness.generation);
                println!("seed={}", seed_to_hex(fitness.seed));
                println!("genomes={}", fitness.genomes.len());
                println!("ticks={}", fitness.ticks);
                println!("score={}", fitness.score);
                if let Some(best) = fitness.best() {
                    println!("best_index={}", best.index);
                    println!("best_fitness={:.1}", best.fitness);
                }
                println!("output={}", path.display());
            } else {
                println!("{}", String::from_utf8_lossy(&encoded));
            }
        }
    }

    Ok(())
}

fn resolve_seeds(
    seeds: Option<&str>,
    seed_file: Option<&Path>,
    seed_start: Option<&str>,
    seed_count: u32,
) -> Result<Vec<u32>> {
    if let Some(path) = seed_file {
        return parse_seed_file(path);
    }

    if let Some(csv) = seeds {
        return parse_seed_csv(csv);
    }

    let start = match seed_start {
        Some(start) => parse_seed(start)?,
        None => 0xF1A9_0001,
    };
    Ok(seed_sequence(start, seed_count))
}

fn timestamp_suffix() -> String {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    format!("{now}")
}
