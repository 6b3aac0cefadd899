use super::*;
use flappy_core::tape::crc32;

fn flapper_configs() -> &'static [FlapperConfig] {
    &[
        FlapperConfig {
            id: "flapper",
            description: "Flaps on a fixed 13-tick beat, roughly holding altitude.",
            period: 13,
        },
        FlapperConfig {
            id: "flapper-fast",
            description: "Flaps every 6 ticks and climbs until it leaves through the ceiling.",
            period: 6,
        },
    ]
}

fn gap_seeker_configs() -> &'static [GapSeekerConfig] {
    &[
        GapSeekerConfig {
            id: "gap-seeker",
            description: "Flaps whenever the bird sits below the middle of the active gap.",
            bias: 0.0,
            ceiling_guard: 40.0,
        },
        GapSeekerConfig {
            id: "gap-seeker-high",
            description: "Gap seeker aiming 30 px above the gap middle.",
            bias: -60.0,
            ceiling_guard: 40.0,
        },
    ]
}

fn jitter_configs() -> &'static [JitterConfig] {
    &[JitterConfig {
        id: "jitter",
        description: "Seeded random flaps with a 9% chance per tick.",
        flap_chance: 0.09,
        salt: 0x6A17_7E11,
    }]
}

fn genome_configs() -> Vec<GenomeConfig> {
    vec![GenomeConfig {
        id: "genome-seeker",
        description: "Single tanh neuron comparing the distances to both gap edges.",
        net: FeedForwardNet {
            layers: vec![DenseLayer {
                weights: vec![vec![0.0, 0.05, -0.05]],
                biases: vec![0.55],
            }],
        },
    }]
}

pub fn pilot_ids() -> Vec<&'static str> {
    describe_pilots().into_iter().map(|(id, _)| id).collect()
}

pub fn describe_pilots() -> Vec<(&'static str, &'static str)> {
    let idle = IdlePilot;
    let mut out = vec![(idle.id(), idle.description())];
    out.extend(flapper_configs().iter().map(|cfg| (cfg.id, cfg.description)));
    out.extend(gap_seeker_configs().iter().map(|cfg| (cfg.id, cfg.description)));
    out.extend(jitter_configs().iter().map(|cfg| (cfg.id, cfg.description)));
    out.extend(genome_configs().iter().map(|cfg| (cfg.id, cfg.description)));
    out
}

pub fn create_pilot(id: &str) -> Option<Box<dyn Pilot>> {
    if id == "idle" {
        return Some(Box::new(IdlePilot));
    }
    if let Some(cfg) = flapper_configs().iter().find(|cfg| cfg.id == id) {
        return Some(Box::new(FlapperPilot::new(*cfg)));
    }
    if let Some(cfg) = gap_seeker_configs().iter().find(|cfg| cfg.id == id) {
        return Some(Box::new(GapSeekerPilot { cfg: *cfg }));
    }
    if let Some(cfg) = jitter_configs().iter().find(|cfg| cfg.id == id) {
        return Some(Box::new(JitterPilot::new(*cfg)));
    }
    genome_configs()
        .into_iter()
        .find(|cfg| cfg.id == id)
        .map(|cfg| Box::new(GenomePilot::from_config(cfg)) as Box<dyn Pilot>)
}

fn hash_json(value: &serde_json::Value) -> String {
    let encoded = value.to_string().into_bytes();
    let digest = crc32(&encoded);
    format!("crc32:{digest:08x}:len:{}", encoded.len())
}

fn manifest_entry<T: Serialize>(
    id: &str,
    family: &str,
    description: &str,
    cfg: &T,
) -> Option<PilotManifestEntry> {
    let config = serde_json::to_value(cfg).ok()?;
    Some(PilotManifestEntry {
        id: id.to_string(),
        family: family.to_string(),
        description: description.to_string(),
        config_hash: hash_json(&config),
        config,
    })
}

pub fn pilot_manifest_entries() -> Vec<PilotManifestEntry> {
    let idle = IdlePilot;
    let mut out: Vec<PilotManifestEntry> = manifest_entry(
        idle.id(),
        "idle",
        idle.description(),
        &serde_json::json!({ "id": idle.id() }),
    )
    .into_iter()
    .collect();

    out.extend(
        flapper_configs()
            .iter()
            .filter_map(|cfg| manifest_entry(cfg.id, "flapper", cfg.description, cfg)),
    );
    out.extend(
        gap_seeker_configs()
            .iter()
            .filter_map(|cfg| manifest_entry(cfg.id, "gap_seeker", cfg.description, cfg)),
    );
    out.extend(
        jitter_configs()
            .iter()
            .filter_map(|cfg| manifest_entry(cfg.id, "jitter", cfg.description, cfg)),
    );
    out.extend(
        genome_configs()
            .iter()
            .filter_map(|cfg| manifest_entry(cfg.id, "genome", cfg.description, cfg)),
    );
    out
}

/// Hash of a pilot's tuning; changes whenever its configuration does.
pub fn pilot_fingerprint(id: &str) -> Option<String> {
    pilot_manifest_entries()
        .into_iter()
        .find(|entry| entry.id == id)
        .map(|entry| entry.config_hash)
}

/// Fingerprint for a network that is not part of the roster.
pub(crate) fn net_fingerprint(net: &FeedForwardNet) -> String {
    serde_json::to_value(net)
        .map(|value| hash_json(&value))
        .unwrap_or_else(|_| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn roster_ids_are_unique_and_constructible() {
        let ids = pilot_ids();
        let unique: HashSet<_> = ids.iter().collect();
        assert_eq!(unique.len(), ids.len());

        for id in ids {
            let pilot = create_pilot(id).unwrap_or_else(|| panic!("missing pilot {id}"));
            assert_eq!(pilot.id(), id);
            assert!(pilot_fingerprint(id).is_some(), "missing fingerprint for {id}");
        }
        assert!(create_pilot("nope").is_none());
    }

    #[test]
    fn roster_covers_every_family() {
        let families: HashSet<String> = pilot_manifest_entries()
            .into_iter()
            .map(|entry| entry.family)
            .collect();
        for family in ["idle", "flapper", "gap_seeker", "jitter", "genome"] {
            assert!(families.contains(family), "missing family {family}");
        }
    }

    #[test]
    fn built_in_genomes_are_well_formed() {
        for cfg in genome_configs() {
            cfg.net.validate().unwrap();
        }
    }

    #[test]
    fn fingerprints_follow_configuration() {
        let a = pilot_fingerprint("gap-seeker").unwrap();
        let b = pilot_fingerprint("gap-seeker-high").unwrap();
        assert_ne!(a, b);
        assert!(a.starts_with("crc32:"));
    }
}
