use anyhow::{anyhow, Context, Result};
use flappy_core::rng::SeededRng;
use flappy_core::DecisionSource;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// A named decision source the runner can fly through a world. Pilots see the
/// same `(y, |y - gap_top|, |y - gap_bottom|)` inputs as any generation agent.
pub trait Pilot: DecisionSource {
    fn id(&self) -> &'static str;
    fn description(&self) -> &'static str;
    fn reset(&mut self, seed: u32);
}

#[derive(Clone, Debug, Serialize)]
pub struct PilotManifestEntry {
    pub id: String,
    pub family: String,
    pub description: String,
    pub config_hash: String,
    pub config: serde_json::Value,
}

#[inline]
fn signal(flap: bool) -> Vec<f64> {
    vec![if flap { 1.0 } else { 0.0 }]
}

struct IdlePilot;

impl DecisionSource for IdlePilot {
    fn decide(&mut self, _inputs: [f64; 3]) -> Vec<f64> {
        signal(false)
    }
}

impl Pilot for IdlePilot {
    fn id(&self) -> &'static str {
        "idle"
    }

    fn description(&self) -> &'static str {
        "Never flaps. Baseline for the ground-death case."
    }

    fn reset(&mut self, _seed: u32) {}
}

#[derive(Clone, Copy, Debug, Serialize)]
struct FlapperConfig {
    id: &'static str,
    description: &'static str,
    period: u32,
}

struct FlapperPilot {
    cfg: FlapperConfig,
    ticks: u32,
}

impl FlapperPilot {
    fn new(cfg: FlapperConfig) -> Self {
        Self { cfg, ticks: 0 }
    }
}

impl DecisionSource for FlapperPilot {
    fn decide(&mut self, _inputs: [f64; 3]) -> Vec<f64> {
        let flap = self.ticks % self.cfg.period.max(1) == 0;
        self.ticks = self.ticks.wrapping_add(1);
        signal(flap)
    }
}

impl Pilot for FlapperPilot {
    fn id(&self) -> &'static str {
        self.cfg.id
    }

    fn description(&self) -> &'static str {
        self.cfg.description
    }

    fn reset(&mut self, _seed: u32) {
        self.ticks = 0;
    }
}

#[derive(Clone, Copy, Debug, Serialize)]
struct GapSeekerConfig {
    id: &'static str,
    description: &'static str,
    /// Flap once `|y - gap_top| - |y - gap_bottom|` exceeds this, i.e. once
    /// the bird sits lower than `bias / 2` below the gap middle.
    bias: f64,
    /// Never flap while the bird's top is above this height.
    ceiling_guard: f64,
}

struct GapSeekerPilot {
    cfg: GapSeekerConfig,
}

impl DecisionSource for GapSeekerPilot {
    fn decide(&mut self, inputs: [f64; 3]) -> Vec<f64> {
        let [y, to_top, to_bottom] = inputs;
        signal(y > self.cfg.ceiling_guard && to_top - to_bottom > self.cfg.bias)
    }
}

impl Pilot for GapSeekerPilot {
    fn id(&self) -> &'static str {
        self.cfg.id
    }

    fn description(&self) -> &'static str {
        self.cfg.description
    }

    fn reset(&mut self, _seed: u32) {}
}

#[derive(Clone, Copy, Debug, Serialize)]
struct JitterConfig {
    id: &'static str,
    description: &'static str,
    flap_chance: f64,
    salt: u32,
}

struct JitterPilot {
    cfg: JitterConfig,
    rng: SeededRng,
}

impl JitterPilot {
    fn new(cfg: JitterConfig) -> Self {
        Self {
            rng: SeededRng::new(cfg.salt),
            cfg,
        }
    }
}

impl DecisionSource for JitterPilot {
    fn decide(&mut self, _inputs: [f64; 3]) -> Vec<f64> {
        signal(self.rng.next_unit() < self.cfg.flap_chance)
    }
}

impl Pilot for JitterPilot {
    fn id(&self) -> &'static str {
        self.cfg.id
    }

    fn description(&self) -> &'static str {
        self.cfg.description
    }

    fn reset(&mut self, seed: u32) {
        self.rng = SeededRng::new(seed ^ self.cfg.salt);
    }
}

/// Fully connected layer; `weights[out][in]`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DenseLayer {
    pub weights: Vec<Vec<f64>>,
    pub biases: Vec<f64>,
}

/// Feed-forward network with tanh activations on every layer. This is the
/// genome format `evaluate` reads and the fitness output refers back to.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FeedForwardNet {
    pub layers: Vec<DenseLayer>,
}

impl FeedForwardNet {
    pub const INPUTS: usize = 3;

    pub fn validate(&self) -> Result<()> {
        if self.layers.is_empty() {
            return Err(anyhow!("network has no layers"));
        }

        let mut width = Self::INPUTS;
        for (idx, layer) in self.layers.iter().enumerate() {
            if layer.weights.is_empty() {
                return Err(anyhow!("layer {idx} has no outputs"));
            }
            if layer.weights.len() != layer.biases.len() {
                return Err(anyhow!(
                    "layer {idx} has {} weight rows but {} biases",
                    layer.weights.len(),
                    layer.biases.len()
                ));
            }
            if let Some(row) = layer.weights.iter().position(|row| row.len() != width) {
                return Err(anyhow!(
                    "layer {idx} row {row} expects {width} inputs, found {}",
                    layer.weights[row].len()
                ));
            }
            width = layer.weights.len();
        }
        Ok(())
    }

    pub fn forward(&self, inputs: &[f64]) -> Vec<f64> {
        self.layers.iter().fold(inputs.to_vec(), |values, layer| {
            layer
                .weights
                .iter()
                .zip(&layer.biases)
                .map(|(row, bias)| {
                    let sum: f64 = row.iter().zip(&values).map(|(w, v)| w * v).sum();
                    (sum + bias).tanh()
                })
                .collect()
        })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let data =
            fs::read(path).with_context(|| format!("failed reading {}", path.display()))?;
        let net: Self = serde_json::from_slice(&data)
            .with_context(|| format!("invalid genome json in {}", path.display()))?;
        net.validate()
            .with_context(|| format!("invalid genome shape in {}", path.display()))?;
        Ok(net)
    }

    /// Reads a JSON array of networks, one per agent.
    pub fn load_population(path: &Path) -> Result<Vec<Self>> {
        let data =
            fs::read(path).with_context(|| format!("failed reading {}", path.display()))?;
        let nets: Vec<Self> = serde_json::from_slice(&data)
            .with_context(|| format!("invalid genome list json in {}", path.display()))?;
        if nets.is_empty() {
            return Err(anyhow!("{} holds no genomes", path.display()));
        }
        for (idx, net) in nets.iter().enumerate() {
            net.validate()
                .with_context(|| format!("genome {idx} in {}", path.display()))?;
        }
        Ok(nets)
    }
}

impl DecisionSource for FeedForwardNet {
    fn decide(&mut self, inputs: [f64; 3]) -> Vec<f64> {
        self.forward(&inputs)
    }
}

#[derive(Clone, Debug, Serialize)]
struct GenomeConfig {
    id: &'static str,
    description: &'static str,
    net: FeedForwardNet,
}

pub struct GenomePilot {
    id: &'static str,
    description: &'static str,
    net: FeedForwardNet,
}

impl GenomePilot {
    /// Pilot for a network loaded at runtime.
    pub fn from_net(net: FeedForwardNet) -> Self {
        Self {
            id: "genome",
            description: "Feed-forward network loaded from a genome file.",
            net,
        }
    }

    fn from_config(cfg: GenomeConfig) -> Self {
        Self {
            id: cfg.id,
            description: cfg.description,
            net: cfg.net,
        }
    }

    pub fn net(&self) -> &FeedForwardNet {
        &self.net
    }
}

impl DecisionSource for GenomePilot {
    fn decide(&mut self, inputs: [f64; 3]) -> Vec<f64> {
        self.net.forward(&inputs)
    }
}

impl Pilot for GenomePilot {
    fn id(&self) -> &'static str {
        self.id
    }

    fn description(&self) -> &'static str {
        self.description
    }

    fn reset(&mut self, _seed: u32) {}
}

mod roster;

pub(crate) use roster::net_fingerprint;
pub use roster::{
    create_pilot, describe_pilots, pilot_fingerprint, pilot_ids, pilot_manifest_entries,
};
