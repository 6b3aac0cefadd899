use anyhow::Result;
use flappy_autopilot::benchmark::{run_benchmark, BenchmarkConfig, Objective};
use flappy_autopilot::pilots::pilot_ids;
use flappy_autopilot::runner::{run_pilot, write_tape};
use flappy_core::constants::{MAX_TICKS_DEFAULT, TAPE_FOOTER_SIZE, TAPE_HEADER_SIZE};
use flappy_core::{verify_tape, SimConfig};
use std::fs;

#[test]
fn all_pilots_generate_verifiable_tapes_on_multiple_seeds() -> Result<()> {
    let config = SimConfig::default();
    for seed in [0xDEAD_BEEF, 0xC0FF_EE11, 0x1234_5678] {
        for pilot in pilot_ids() {
            let artifact = run_pilot(pilot, &config, seed, 900)?;
            let metrics = &artifact.metrics;
            assert!(metrics.tick_count > 0, "pilot={pilot} seed={seed:#x}");
            assert_eq!(metrics.pilot_id, pilot);
            assert_eq!(
                artifact.tape.len(),
                TAPE_HEADER_SIZE + metrics.tick_count as usize + TAPE_FOOTER_SIZE,
                "tape length for {pilot} seed={seed:#x}"
            );

            let journal = verify_tape(&artifact.tape, MAX_TICKS_DEFAULT)?;
            assert_eq!(journal.final_score, metrics.final_score);
            assert_eq!(journal.tick_count, metrics.tick_count);
        }
    }
    Ok(())
}

#[test]
fn written_tapes_verify_from_disk() -> Result<()> {
    let tmp = tempfile::tempdir()?;
    let artifact = run_pilot("gap-seeker", &SimConfig::default(), 0x0F1A_9901, 1_200)?;
    let path = tmp.path().join("nested/dir/run.tape");
    write_tape(&path, &artifact.tape)?;

    let bytes = fs::read(&path)?;
    assert_eq!(bytes, artifact.tape);
    assert_eq!(
        verify_tape(&bytes, MAX_TICKS_DEFAULT)?.final_rng_state,
        artifact.metrics.final_rng_state
    );
    Ok(())
}

#[test]
fn benchmark_smoke_outputs_expected_files() -> Result<()> {
    let tmp = tempfile::tempdir()?;
    let report = run_benchmark(BenchmarkConfig {
        pilots: vec!["idle".to_string(), "flapper".to_string()],
        seeds: vec![0xDEAD_BEEF, 0xC0FF_EE11],
        max_ticks: 60,
        sim: SimConfig::default(),
        objective: Objective::Survival,
        out_dir: tmp.path().to_path_buf(),
        save_top: 1,
        jobs: Some(2),
    })?;

    assert_eq!(report.run_count, 4);
    assert_eq!(report.pilot_rankings.len(), 2);
    let leader = &report.pilot_rankings[0];
    assert_eq!(leader.pilot_id, "flapper");
    assert_eq!(leader.survival_rate, 1.0);
    assert_eq!(report.pilot_rankings[1].avg_ticks, 23.0);

    assert_eq!(report.saved_tapes.len(), 1);
    assert!(tmp.path().join("summary.json").exists());
    assert!(tmp.path().join("runs.csv").exists());
    assert!(tmp.path().join("rankings.csv").exists());

    let saved = fs::read(&report.saved_tapes[0].path)?;
    verify_tape(&saved, MAX_TICKS_DEFAULT)?;

    let summary: serde_json::Value = serde_json::from_slice(&fs::read(tmp.path().join("summary.json"))?)?;
    assert_eq!(summary["objective"], "survival");
    assert_eq!(summary["run_count"], 4);
    Ok(())
}
