use std::fmt;

/// Internal-consistency checks on a running world. A failure means the
/// simulation itself is broken, not that an agent misbehaved.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InvariantCode {
    ObstacleListEmpty,
    ObstacleOrder,
    BirdTiltRange,
    BirdFallStep,
    EndedWithLivingAgents,
    RunningWithoutAgents,
}

impl fmt::Display for InvariantCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ObstacleListEmpty => write!(f, "OBSTACLE_LIST_EMPTY"),
            Self::ObstacleOrder => write!(f, "OBSTACLE_ORDER"),
            Self::BirdTiltRange => write!(f, "BIRD_TILT_RANGE"),
            Self::BirdFallStep => write!(f, "BIRD_FALL_STEP"),
            Self::EndedWithLivingAgents => write!(f, "ENDED_WITH_LIVING_AGENTS"),
            Self::RunningWithoutAgents => write!(f, "RUNNING_WITHOUT_AGENTS"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SimError {
    /// `tick()` was called after the generation ended.
    GenerationEnded { tick: u32 },
    Invariant { tick: u32, code: InvariantCode },
}

impl fmt::Display for SimError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::GenerationEnded { tick } => {
                write!(f, "generation already ended at tick {tick}")
            }
            Self::Invariant { tick, code } => {
                write!(f, "internal invariant violated at tick {tick}: {code}")
            }
        }
    }
}

impl std::error::Error for SimError {}

#[derive(Clone, Debug, PartialEq)]
pub enum ConfigError {
    NonPositive { field: &'static str, value: f64 },
    EmptyGapRange { min: i32, max: i32 },
    GapBelowGround { gap_bottom: f64, ground_y: f64 },
    TiltBounds { min: f64, max: f64 },
    SpawnNotOffscreen { field: &'static str, x: f64, screen_width: i32 },
    NoAgents,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NonPositive { field, value } => {
                write!(f, "{field} must be > 0 (got {value})")
            }
            Self::EmptyGapRange { min, max } => {
                write!(f, "gap range is empty: [{min}, {max})")
            }
            Self::GapBelowGround {
                gap_bottom,
                ground_y,
            } => write!(
                f,
                "lowest gap bottom {gap_bottom} is at or below the ground line {ground_y}"
            ),
            Self::TiltBounds { min, max } => {
                write!(f, "tilt bounds inverted: min={min}, max={max}")
            }
            Self::SpawnNotOffscreen {
                field,
                x,
                screen_width,
            } => write!(
                f,
                "{field}={x} must be at or beyond the right screen edge ({screen_width})"
            ),
            Self::NoAgents => write!(f, "a generation needs at least one agent"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Failure to build or run a generation.
#[derive(Clone, Debug, PartialEq)]
pub enum GenerationError {
    Config(ConfigError),
    Simulation(SimError),
}

impl fmt::Display for GenerationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(err) => write!(f, "invalid generation setup: {err}"),
            Self::Simulation(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for GenerationError {}

impl From<ConfigError> for GenerationError {
    fn from(err: ConfigError) -> Self {
        Self::Config(err)
    }
}

impl From<SimError> for GenerationError {
    fn from(err: SimError) -> Self {
        Self::Simulation(err)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum VerifyError {
    TapeTooShort { actual: usize, min: usize },
    InvalidMagic { found: u32 },
    UnsupportedVersion { found: u8 },
    UnknownRulesTag { found: u8 },
    HeaderReservedNonZero,
    TickCountOutOfRange { tick_count: u32, max_ticks: u32 },
    TapeLengthMismatch { expected: usize, actual: usize },
    ReservedInputBitsNonZero { tick: u32, byte: u8 },
    CrcMismatch { stored: u32, computed: u32 },
    Replay(GenerationError),
    TickCountMismatch { claimed: u32, computed: u32 },
    ScoreMismatch { claimed: u32, computed: u32 },
    RngMismatch { claimed: u32, computed: u32 },
}

impl fmt::Display for VerifyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TapeTooShort { actual, min } => {
                write!(f, "tape too short: got {actual} bytes, need at least {min}")
            }
            Self::InvalidMagic { found } => write!(f, "invalid tape magic: 0x{found:08x}"),
            Self::UnsupportedVersion { found } => write!(f, "unsupported tape version: {found}"),
            Self::UnknownRulesTag { found } => write!(f, "unknown rules tag: {found}"),
            Self::HeaderReservedNonZero => write!(f, "header reserved bytes are non-zero"),
            Self::TickCountOutOfRange {
                tick_count,
                max_ticks,
            } => write!(
                f,
                "tick count out of range: {tick_count} (allowed 1..={max_ticks})"
            ),
            Self::TapeLengthMismatch { expected, actual } => write!(
                f,
                "tape length mismatch: expected {expected} bytes, got {actual}"
            ),
            Self::ReservedInputBitsNonZero { tick, byte } => write!(
                f,
                "input byte reserved bits set at tick {tick}: 0x{byte:02x}"
            ),
            Self::CrcMismatch { stored, computed } => write!(
                f,
                "crc mismatch: stored=0x{stored:08x}, computed=0x{computed:08x}"
            ),
            Self::Replay(err) => write!(f, "replay failed: {err}"),
            Self::TickCountMismatch { claimed, computed } => {
                write!(f, "tick-count mismatch: claimed={claimed}, computed={computed}")
            }
            Self::ScoreMismatch { claimed, computed } => {
                write!(f, "score mismatch: claimed={claimed}, computed={computed}")
            }
            Self::RngMismatch { claimed, computed } => {
                write!(
                    f,
                    "rng mismatch: claimed=0x{claimed:08x}, computed=0x{computed:08x}"
                )
            }
        }
    }
}

impl std::error::Error for VerifyError {}

impl From<GenerationError> for VerifyError {
    fn from(err: GenerationError) -> Self {
        Self::Replay(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invariant_codes_render_as_stable_identifiers() {
        let err = SimError::Invariant {
            tick: 12,
            code: InvariantCode::ObstacleListEmpty,
        };
        assert_eq!(
            err.to_string(),
            "internal invariant violated at tick 12: OBSTACLE_LIST_EMPTY"
        );
    }

    #[test]
    fn replay_errors_keep_their_source_message() {
        let err = VerifyError::from(GenerationError::from(ConfigError::NoAgents));
        assert_eq!(
            err.to_string(),
            "replay failed: invalid generation setup: a generation needs at least one agent"
        );
    }
}
