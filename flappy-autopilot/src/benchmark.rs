use crate::pilots::pilot_ids;
use crate::runner::{run_pilot, RunMetrics};
use crate::util::seed_to_hex;
use anyhow::{anyhow, Context, Result};
use flappy_core::SimConfig;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::info;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Objective {
    Score,
    Survival,
    Fitness,
}

impl Objective {
    pub fn run_value(self, metrics: &RunMetrics) -> f64 {
        match self {
            Self::Score => metrics.final_score as f64 + metrics.tick_count as f64 * 0.001,
            Self::Survival => metrics.tick_count as f64 + metrics.final_score as f64 * 0.5,
            Self::Fitness => metrics.fitness,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Score => "score",
            Self::Survival => "survival",
            Self::Fitness => "fitness",
        }
    }
}

#[derive(Clone, Debug)]
pub struct BenchmarkConfig {
    pub pilots: Vec<String>,
    pub seeds: Vec<u32>,
    pub max_ticks: u32,
    pub sim: SimConfig,
    pub objective: Objective,
    pub out_dir: PathBuf,
    pub save_top: usize,
    pub jobs: Option<usize>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunRecord {
    pub pilot_id: String,
    pub pilot_fingerprint: String,
    pub seed: u32,
    pub seed_hex: String,
    pub tick_count: u32,
    pub final_score: u32,
    pub fitness: f64,
    pub survived: bool,
    pub objective_value: f64,
    pub flap_ticks: u32,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PilotAggregate {
    pub pilot_id: String,
    pub pilot_fingerprint: String,
    pub runs: usize,
    pub avg_score: f64,
    pub max_score: u32,
    pub avg_ticks: f64,
    pub max_ticks: u32,
    pub avg_fitness: f64,
    pub survival_rate: f64,
    pub objective_value: f64,
    pub avg_flap_ticks: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SavedTapeRecord {
    pub rank: usize,
    pub metric: String,
    pub pilot_id: String,
    pub seed: u32,
    pub seed_hex: String,
    pub score: u32,
    pub ticks: u32,
    pub path: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BenchmarkReport {
    pub generated_unix_s: u64,
    pub objective: Objective,
    pub max_ticks: u32,
    pub jobs: Option<usize>,
    pub pilots: Vec<String>,
    pub seeds: Vec<u32>,
    pub run_count: usize,
    pub pilot_rankings: Vec<PilotAggregate>,
    pub runs: Vec<RunRecord>,
    pub saved_tapes: Vec<SavedTapeRecord>,
}

#[derive(Clone, Debug)]
struct InternalRun {
    metrics: RunMetrics,
    objective_value: f64,
    tape: Vec<u8>,
}

/// Comma-separated pilot ids, or the whole roster when `None`.
pub fn resolve_pilots(input: Option<&str>) -> Result<Vec<String>> {
    match input {
        None => Ok(pilot_ids().iter().map(|id| (*id).to_string()).collect()),
        Some(raw) => {
            let pilots: Vec<String> = raw
                .split(',')
                .map(str::trim)
                .filter(|token| !token.is_empty())
                .map(str::to_string)
                .collect();
            if pilots.is_empty() {
                return Err(anyhow!("--pilots resolved to empty list"));
            }
            Ok(pilots)
        }
    }
}

pub fn run_benchmark(config: BenchmarkConfig) -> Result<BenchmarkReport> {
    if config.seeds.is_empty() {
        return Err(anyhow!("benchmark requires at least one seed"));
    }
    if config.pilots.is_empty() {
        return Err(anyhow!("benchmark requires at least one pilot"));
    }
    if config.jobs == Some(0) {
        return Err(anyhow!("benchmark --jobs must be >= 1 when provided"));
    }
    fs::create_dir_all(&config.out_dir)
        .with_context(|| format!("failed creating {}", config.out_dir.display()))?;

    let run_jobs: Vec<(String, u32)> = config
        .pilots
        .iter()
        .flat_map(|pilot| config.seeds.iter().map(move |seed| (pilot.clone(), *seed)))
        .collect();
    info!(
        runs = run_jobs.len(),
        objective = config.objective.as_str(),
        max_ticks = config.max_ticks,
        "benchmark started"
    );

    let run_one = |(pilot_id, seed): &(String, u32)| -> Result<InternalRun> {
        let artifact = run_pilot(pilot_id, &config.sim, *seed, config.max_ticks)
            .with_context(|| format!("benchmark run failed for pilot={pilot_id} seed={seed:#x}"))?;
        let objective_value = config.objective.run_value(&artifact.metrics);
        Ok(InternalRun {
            metrics: artifact.metrics,
            objective_value,
            tape: artifact.tape,
        })
    };

    let run_results: Vec<Result<InternalRun>> = if let Some(jobs) = config.jobs {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(jobs)
            .build()
            .context("failed to build rayon threadpool")?;
        pool.install(|| run_jobs.par_iter().map(run_one).collect())
    } else {
        run_jobs.par_iter().map(run_one).collect()
    };
    let runs = run_results.into_iter().collect::<Result<Vec<_>>>()?;

    let mut rankings = aggregate(&runs);
    rankings.sort_by(|a, b| {
        b.objective_value
            .total_cmp(&a.objective_value)
            .then_with(|| b.avg_score.total_cmp(&a.avg_score))
            .then_with(|| b.avg_ticks.total_cmp(&a.avg_ticks))
            .then_with(|| a.pilot_id.cmp(&b.pilot_id))
    });

    let mut run_records: Vec<RunRecord> = runs
        .iter()
        .map(|run| RunRecord {
            pilot_id: run.metrics.pilot_id.clone(),
            pilot_fingerprint: run.metrics.pilot_fingerprint.clone(),
            seed: run.metrics.seed,
            seed_hex: seed_to_hex(run.metrics.seed),
            tick_count: run.metrics.tick_count,
            final_score: run.metrics.final_score,
            fitness: run.metrics.fitness,
            survived: run.metrics.survived,
            objective_value: run.objective_value,
            flap_ticks: run.metrics.flap_ticks,
        })
        .collect();
    run_records.sort_by(|a, b| {
        b.objective_value
            .total_cmp(&a.objective_value)
            .then_with(|| b.final_score.cmp(&a.final_score))
            .then_with(|| b.tick_count.cmp(&a.tick_count))
    });

    let mut saved_tapes = Vec::new();
    if config.save_top > 0 {
        save_top_tapes(
            &config.out_dir,
            &runs,
            config.objective.as_str(),
            config.save_top,
            |run| run.objective_value,
            &mut saved_tapes,
        )?;
        if config.objective != Objective::Survival {
            save_top_tapes(
                &config.out_dir,
                &runs,
                "survival",
                config.save_top,
                |run| run.metrics.tick_count as f64,
                &mut saved_tapes,
            )?;
        }
    }

    write_runs_csv(&config.out_dir.join("runs.csv"), &run_records)?;
    write_rankings_csv(&config.out_dir.join("rankings.csv"), &rankings)?;

    let report = BenchmarkReport {
        generated_unix_s: SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs(),
        objective: config.objective,
        max_ticks: config.max_ticks,
        jobs: config.jobs,
        pilots: config.pilots,
        seeds: config.seeds,
        run_count: run_records.len(),
        pilot_rankings: rankings,
        runs: run_records,
        saved_tapes,
    };

    let report_path = config.out_dir.join("summary.json");
    fs::write(
        &report_path,
        serde_json::to_vec_pretty(&report).context("failed to serialize summary json")?,
    )
    .with_context(|| format!("failed writing {}", report_path.display()))?;

    info!(
        runs = report.run_count,
        leader = report
            .pilot_rankings
            .first()
            .map(|top| top.pilot_id.as_str())
            .unwrap_or("none"),
        "benchmark finished"
    );
    Ok(report)
}

fn aggregate(runs: &[InternalRun]) -> Vec<PilotAggregate> {
    let mut grouped: HashMap<&str, Vec<&InternalRun>> = HashMap::new();
    for run in runs {
        grouped
            .entry(run.metrics.pilot_id.as_str())
            .or_default()
            .push(run);
    }

    grouped
        .into_iter()
        .map(|(pilot_id, pilot_runs)| {
            let count = pilot_runs.len() as f64;
            let mean = |value: fn(&InternalRun) -> f64| {
                pilot_runs.iter().map(|run| value(run)).sum::<f64>() / count
            };
            PilotAggregate {
                pilot_id: pilot_id.to_string(),
                pilot_fingerprint: pilot_runs
                    .first()
                    .map(|run| run.metrics.pilot_fingerprint.clone())
                    .unwrap_or_else(|| "unknown".to_string()),
                runs: pilot_runs.len(),
                avg_score: mean(|run| run.metrics.final_score as f64),
                max_score: pilot_runs
                    .iter()
                    .map(|run| run.metrics.final_score)
                    .max()
                    .unwrap_or_default(),
                avg_ticks: mean(|run| run.metrics.tick_count as f64),
                max_ticks: pilot_runs
                    .iter()
                    .map(|run| run.metrics.tick_count)
                    .max()
                    .unwrap_or_default(),
                avg_fitness: mean(|run| run.metrics.fitness),
                survival_rate: mean(|run| if run.metrics.survived { 1.0 } else { 0.0 }),
                objective_value: mean(|run| run.objective_value),
                avg_flap_ticks: mean(|run| run.metrics.flap_ticks as f64),
            }
        })
        .collect()
}

fn save_top_tapes<F>(
    out_dir: &Path,
    runs: &[InternalRun],
    metric_name: &str,
    count: usize,
    metric: F,
    saved_tapes: &mut Vec<SavedTapeRecord>,
) -> Result<()>
where
    F: Fn(&InternalRun) -> f64,
{
    let mut order: Vec<&InternalRun> = runs.iter().collect();
    order.sort_by(|a, b| {
        metric(b)
            .total_cmp(&metric(a))
            .then_with(|| b.metrics.final_score.cmp(&a.metrics.final_score))
            .then_with(|| b.metrics.tick_count.cmp(&a.metrics.tick_count))
    });

    let save_dir = out_dir.join(format!("top-{metric_name}"));
    fs::create_dir_all(&save_dir)
        .with_context(|| format!("failed creating {}", save_dir.display()))?;

    for (idx, run) in order.into_iter().take(count).enumerate() {
        let rank = idx + 1;
        let base = format!(
            "rank{rank:02}-{}-seed{:08x}-score{}-ticks{}",
            run.metrics.pilot_id, run.metrics.seed, run.metrics.final_score, run.metrics.tick_count
        );
        let tape_path = save_dir.join(format!("{base}.tape"));
        fs::write(&tape_path, &run.tape)
            .with_context(|| format!("failed writing {}", tape_path.display()))?;

        let meta_path = save_dir.join(format!("{base}.json"));
        fs::write(
            &meta_path,
            serde_json::to_vec_pretty(&run.metrics)
                .context("failed to serialize top tape metadata")?,
        )
        .with_context(|| format!("failed writing {}", meta_path.display()))?;

        saved_tapes.push(SavedTapeRecord {
            rank,
            metric: metric_name.to_string(),
            pilot_id: run.metrics.pilot_id.clone(),
            seed: run.metrics.seed,
            seed_hex: seed_to_hex(run.metrics.seed),
            score: run.metrics.final_score,
            ticks: run.metrics.tick_count,
            path: tape_path.to_string_lossy().into_owned(),
        });
    }

    Ok(())
}

fn write_runs_csv(path: &Path, rows: &[RunRecord]) -> Result<()> {
    let mut csv = String::from(
        "pilot_id,pilot_fingerprint,seed_hex,seed,tick_count,final_score,fitness,survived,objective_value,flap_ticks\n",
    );
    for row in rows {
        csv.push_str(&format!(
            "{},{},{},{},{},{},{:.2},{},{:.4},{}\n",
            row.pilot_id,
            row.pilot_fingerprint,
            row.seed_hex,
            row.seed,
            row.tick_count,
            row.final_score,
            row.fitness,
            row.survived,
            row.objective_value,
            row.flap_ticks
        ));
    }
    fs::write(path, csv).with_context(|| format!("failed writing {}", path.display()))
}

fn write_rankings_csv(path: &Path, rows: &[PilotAggregate]) -> Result<()> {
    let mut csv = String::from(
        "rank,pilot_id,pilot_fingerprint,runs,avg_score,max_score,avg_ticks,max_ticks,avg_fitness,survival_rate,objective_value,avg_flap_ticks\n",
    );
    for (idx, row) in rows.iter().enumerate() {
        csv.push_str(&format!(
            "{},{},{},{},{:.2},{},{:.2},{},{:.2},{:.4},{:.4},{:.2}\n",
            idx + 1,
            row.pilot_id,
            row.pilot_fingerprint,
            row.runs,
            row.avg_score,
            row.max_score,
            row.avg_ticks,
            row.max_ticks,
            row.avg_fitness,
            row.survival_rate,
            row.objective_value,
            row.avg_flap_ticks
        ));
    }
    fs::write(path, csv).with_context(|| format!("failed writing {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_pilots_defaults_to_roster() {
        assert_eq!(resolve_pilots(None).unwrap().len(), pilot_ids().len());
        assert_eq!(
            resolve_pilots(Some("idle, gap-seeker,")).unwrap(),
            vec!["idle".to_string(), "gap-seeker".to_string()]
        );
        assert!(resolve_pilots(Some(" , ")).is_err());
    }

    #[test]
    fn rejects_degenerate_configs() {
        let tmp = tempfile::tempdir().unwrap();
        let base = BenchmarkConfig {
            pilots: vec!["idle".to_string()],
            seeds: vec![1],
            max_ticks: 100,
            sim: SimConfig::default(),
            objective: Objective::Score,
            out_dir: tmp.path().to_path_buf(),
            save_top: 0,
            jobs: None,
        };
        assert!(run_benchmark(BenchmarkConfig {
            seeds: Vec::new(),
            ..base.clone()
        })
        .is_err());
        assert!(run_benchmark(BenchmarkConfig {
            pilots: Vec::new(),
            ..base.clone()
        })
        .is_err());
        assert!(run_benchmark(BenchmarkConfig {
            jobs: Some(0),
            ..base
        })
        .is_err());
    }
}
