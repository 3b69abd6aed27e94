//! Seed management for map generation
//!
//! Every pipeline stage consumes its own random stream. The streams are
//! drawn up front from one master generator in a fixed order, so that
//! adding a later stage never perturbs the numbers seen by earlier ones.
//! New stages must be appended to the end of the derivation order.

use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Seeds for all generation stages.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GenerationSeeds {
    /// Master seed (used for display/reference)
    pub master: u64,
    /// Elevation noise
    pub elevation: u64,
    /// Coastline template choice
    pub coastline: u64,
    /// Mountain noise and shaping
    pub mountains: u64,
    /// Cliff template choice
    pub cliffs: u64,
    /// Forest noise and tree packing
    pub forests: u64,
    /// Obstruction of unplayable regions
    pub obstruction: u64,
    /// Road template choice
    pub roads: u64,
    /// Spawns, expansions and neutral structures
    pub entities: u64,
    /// Resource noise and placement
    pub resources: u64,
    /// Pick-any tile variants
    pub decoration: u64,
}

impl GenerationSeeds {
    /// Derive all stage seeds from a master seed.
    pub fn from_master(master: u64) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(master);
        // Field initialisers run in source order, which is the derivation order.
        Self {
            master,
            elevation: rng.next_u64(),
            coastline: rng.next_u64(),
            mountains: rng.next_u64(),
            cliffs: rng.next_u64(),
            forests: rng.next_u64(),
            obstruction: rng.next_u64(),
            roads: rng.next_u64(),
            entities: rng.next_u64(),
            resources: rng.next_u64(),
            decoration: rng.next_u64(),
        }
    }

    /// Create a builder for customizing individual seeds
    pub fn builder(master: u64) -> GenerationSeedsBuilder {
        GenerationSeedsBuilder::new(master)
    }

    /// Fresh random stream for a stage seed.
    pub fn rng(seed: u64) -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(seed)
    }
}

/// Builder for overriding individual stage seeds while deriving the rest.
pub struct GenerationSeedsBuilder {
    seeds: GenerationSeeds,
}

impl GenerationSeedsBuilder {
    pub fn new(master: u64) -> Self {
        Self {
            seeds: GenerationSeeds::from_master(master),
        }
    }

    pub fn elevation(mut self, seed: u64) -> Self {
        self.seeds.elevation = seed;
        self
    }

    pub fn coastline(mut self, seed: u64) -> Self {
        self.seeds.coastline = seed;
        self
    }

    pub fn mountains(mut self, seed: u64) -> Self {
        self.seeds.mountains = seed;
        self
    }

    pub fn cliffs(mut self, seed: u64) -> Self {
        self.seeds.cliffs = seed;
        self
    }

    pub fn forests(mut self, seed: u64) -> Self {
        self.seeds.forests = seed;
        self
    }

    pub fn obstruction(mut self, seed: u64) -> Self {
        self.seeds.obstruction = seed;
        self
    }

    pub fn roads(mut self, seed: u64) -> Self {
        self.seeds.roads = seed;
        self
    }

    pub fn entities(mut self, seed: u64) -> Self {
        self.seeds.entities = seed;
        self
    }

    pub fn resources(mut self, seed: u64) -> Self {
        self.seeds.resources = seed;
        self
    }

    pub fn decoration(mut self, seed: u64) -> Self {
        self.seeds.decoration = seed;
        self
    }

    pub fn build(self) -> GenerationSeeds {
        self.seeds
    }
}

impl std::fmt::Display for GenerationSeeds {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "GenerationSeeds {{ master: {}, elevation: {}, coastline: {}, mountains: {}, cliffs: {}, \
             forests: {}, obstruction: {}, roads: {}, entities: {}, resources: {}, decoration: {} }}",
            self.master,
            self.elevation,
            self.coastline,
            self.mountains,
            self.cliffs,
            self.forests,
            self.obstruction,
            self.roads,
            self.entities,
            self.resources,
            self.decoration,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deterministic_derivation() {
        assert_eq!(GenerationSeeds::from_master(12345), GenerationSeeds::from_master(12345));
    }

    #[test]
    fn test_different_stages_get_different_seeds() {
        let seeds = GenerationSeeds::from_master(12345);
        assert_ne!(seeds.elevation, seeds.mountains);
        assert_ne!(seeds.coastline, seeds.cliffs);
        assert_ne!(seeds.entities, seeds.resources);
    }

    #[test]
    fn test_builder_override_keeps_other_streams() {
        let seeds = GenerationSeeds::builder(12345).forests(99999).build();
        let default_seeds = GenerationSeeds::from_master(12345);
        assert_eq!(seeds.forests, 99999);
        assert_eq!(seeds.elevation, default_seeds.elevation);
        assert_eq!(seeds.resources, default_seeds.resources);
    }

    #[test]
    fn test_builder_covers_every_stage() {
        let seeds = GenerationSeeds::builder(7)
            .coastline(1)
            .cliffs(2)
            .obstruction(3)
            .roads(4)
            .decoration(5)
            .build();
        assert_eq!(
            (seeds.coastline, seeds.cliffs, seeds.obstruction, seeds.roads, seeds.decoration),
            (1, 2, 3, 4, 5)
        );
        assert_eq!(seeds.elevation, GenerationSeeds::from_master(7).elevation);

        let text = seeds.to_string();
        for stage in ["coastline: 1", "cliffs: 2", "obstruction: 3", "roads: 4", "decoration: 5"] {
            assert!(text.contains(stage), "{text}");
        }
    }
}
