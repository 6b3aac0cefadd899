use serde::{Deserialize, Serialize};

use crate::config::SimConfig;
use crate::error::{GenerationError, VerifyError};
use crate::sim::{replay, ReplayResult};
use crate::tape::parse_tape;

/// What a successfully verified tape proves.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationJournal {
    pub seed: u32,
    pub tick_count: u32,
    pub final_score: u32,
    pub final_rng_state: u32,
    pub tape_checksum: u32,
    pub rules_tag: u8,
}

/// Verifies a tape recorded under the reference rules.
pub fn verify_tape(bytes: &[u8], max_ticks: u32) -> Result<VerificationJournal, VerifyError> {
    verify_tape_with_config(bytes, max_ticks, &SimConfig::default())
}

pub fn verify_tape_with_config(
    bytes: &[u8],
    max_ticks: u32,
    config: &SimConfig,
) -> Result<VerificationJournal, VerifyError> {
    verify_tape_with_replay(bytes, max_ticks, |seed, inputs| {
        replay(config, seed, inputs)
    })
}

fn verify_tape_with_replay<F>(
    bytes: &[u8],
    max_ticks: u32,
    replay_fn: F,
) -> Result<VerificationJournal, VerifyError>
where
    F: FnOnce(u32, &[u8]) -> Result<ReplayResult, GenerationError>,
{
    let tape = parse_tape(bytes, max_ticks)?;
    let replay_result = replay_fn(tape.header.seed, tape.inputs)?;

    if replay_result.tick_count != tape.header.tick_count {
        return Err(VerifyError::TickCountMismatch {
            claimed: tape.header.tick_count,
            computed: replay_result.tick_count,
        });
    }

    if replay_result.final_score != tape.footer.final_score {
        return Err(VerifyError::ScoreMismatch {
            claimed: tape.footer.final_score,
            computed: replay_result.final_score,
        });
    }

    if replay_result.final_rng_state != tape.footer.final_rng_state {
        return Err(VerifyError::RngMismatch {
            claimed: tape.footer.final_rng_state,
            computed: replay_result.final_rng_state,
        });
    }

    Ok(VerificationJournal {
        seed: tape.header.seed,
        tick_count: tape.header.tick_count,
        final_score: replay_result.final_score,
        final_rng_state: replay_result.final_rng_state,
        tape_checksum: tape.footer.checksum,
        rules_tag: tape.header.rules_tag,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{RULES_TAG, TAPE_HEADER_SIZE, TAPE_MAGIC, TAPE_VERSION};
    use crate::error::{ConfigError, InvariantCode, SimError};
    use crate::tape::serialize_tape;

    fn footer_offset(tick_count: usize) -> usize {
        TAPE_HEADER_SIZE + tick_count
    }

    fn valid_tape(seed: u32, inputs: &[u8]) -> Vec<u8> {
        let result = replay(&SimConfig::default(), seed, inputs).unwrap();
        assert_eq!(result.tick_count as usize, inputs.len(), "bird died early");
        serialize_tape(seed, inputs, result.final_score, result.final_rng_state)
    }

    /// Flaps every `period` ticks, which keeps the bird airborne for a while.
    fn flap_every(period: usize, len: usize) -> Vec<u8> {
        (0..len).map(|i| u8::from(i % period == 0)).collect()
    }

    #[test]
    fn accepts_an_honest_tape() {
        let inputs = flap_every(9, 20);
        let tape = valid_tape(0x1234_5678, &inputs);
        let journal = verify_tape(&tape, 1_000).unwrap();
        assert_eq!(journal.seed, 0x1234_5678);
        assert_eq!(journal.tick_count, 20);
        assert_eq!(journal.final_score, 0);
        assert_eq!(journal.rules_tag, RULES_TAG);
    }

    #[test]
    fn rejects_reserved_input_bits() {
        let tape = serialize_tape(0xAABB_CCDD, &[0x02], 0, 0xAABB_CCDD);
        let err = verify_tape(&tape, 10).unwrap_err();
        assert!(matches!(
            err,
            VerifyError::ReservedInputBitsNonZero {
                tick: 0,
                byte: 0x02
            }
        ));
    }

    #[test]
    fn detects_score_tampering() {
        let inputs = flap_every(9, 30);
        let mut tape = valid_tape(0x1234_5678, &inputs);
        let journal = verify_tape(&tape, 10_000).unwrap();

        let offset = footer_offset(inputs.len());
        let tampered_score = journal.final_score + 1;
        tape[offset..offset + 4].copy_from_slice(&tampered_score.to_le_bytes());

        let err = verify_tape(&tape, 10_000).unwrap_err();
        assert!(matches!(err, VerifyError::ScoreMismatch { .. }));
    }

    #[test]
    fn detects_rng_tampering() {
        let inputs = flap_every(9, 24);
        let mut tape = valid_tape(0x1234_5678, &inputs);
        let offset = footer_offset(inputs.len());
        tape[offset + 4..offset + 8].copy_from_slice(&0xFFFF_FFFFu32.to_le_bytes());

        let err = verify_tape(&tape, 10_000).unwrap_err();
        assert!(matches!(err, VerifyError::RngMismatch { .. }));
    }

    #[test]
    fn inputs_after_death_are_a_tick_count_mismatch() {
        // Without flapping the bird hits the ground on tick 23.
        let inputs = [0u8; 40];
        let result = replay(&SimConfig::default(), 0x0BAD_F00D, &inputs).unwrap();
        assert_eq!(result.tick_count, 23);

        let tape = serialize_tape(
            0x0BAD_F00D,
            &inputs,
            result.final_score,
            result.final_rng_state,
        );
        let err = verify_tape(&tape, 1_000).unwrap_err();
        assert_eq!(
            err,
            VerifyError::TickCountMismatch {
                claimed: 40,
                computed: 23
            }
        );
    }

    #[test]
    fn maps_replay_failure_to_verify_error() {
        let tape = valid_tape(0xDEAD_BEEF, &[0x00u8; 4]);
        let err = verify_tape_with_replay(&tape, 100, |_seed, _inputs| {
            Err(GenerationError::Simulation(SimError::Invariant {
                tick: 3,
                code: InvariantCode::ObstacleOrder,
            }))
        })
        .unwrap_err();

        assert!(matches!(
            err,
            VerifyError::Replay(GenerationError::Simulation(SimError::Invariant {
                tick: 3,
                code: InvariantCode::ObstacleOrder
            }))
        ));
    }

    #[test]
    fn invalid_config_surfaces_as_replay_error() {
        let tape = valid_tape(0xDEAD_BEEF, &[0x00u8; 4]);
        let config = SimConfig {
            scroll_velocity: 0.0,
            ..SimConfig::default()
        };
        let err = verify_tape_with_config(&tape, 100, &config).unwrap_err();
        assert!(matches!(
            err,
            VerifyError::Replay(GenerationError::Config(ConfigError::NonPositive {
                field: "scroll_velocity",
                ..
            }))
        ));
    }

    #[test]
    fn single_byte_tampering_is_rejected() {
        let inputs = flap_every(7, 12);
        let good_tape = valid_tape(0xFEED_BEEF, &inputs);
        assert!(verify_tape(&good_tape, 100).is_ok());

        for idx in 0..good_tape.len() {
            let mut tampered = good_tape.clone();
            tampered[idx] ^= 0x01;
            assert!(
                verify_tape(&tampered, 100).is_err(),
                "tampering byte index {idx} must fail verification"
            );
        }
    }

    #[test]
    fn parse_checks_happen_before_replay() {
        let mut tape = valid_tape(0xDEAD_BEEF, &[0x00u8; 4]);
        tape[0..4].copy_from_slice(&TAPE_MAGIC.wrapping_add(1).to_le_bytes());
        tape[4] = TAPE_VERSION + 1;

        let err = verify_tape_with_replay(&tape, 10, |_seed, _inputs| {
            panic!("replay must not run when parse fails")
        })
        .unwrap_err();

        assert!(matches!(err, VerifyError::InvalidMagic { .. }));
    }
}
