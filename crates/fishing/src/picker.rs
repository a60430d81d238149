use std::sync::Arc;

use log::warn;

use crate::{
    catch::round_to_tenths,
    random::{RandomSource, SeededRandom},
    rarity::RarityTier,
    species::{Species, SpeciesId, SpeciesRegistry},
};

/// Maps a unit draw onto the size range of a species.
///
/// Sizes follow `min + (max - min) * u^k` with `k = max(size_bias, 1)`, so
/// `k = 1` is uniform and larger `k` pushes rolls towards the lower bound.
/// The result is rounded to the nearest millimeter.
pub fn size_for_draw(species: &Species, u: f64) -> f64 {
    let min = species.min_size;
    let max = species.effective_max_size();
    let k = species.size_bias.max(1.0);

    round_to_tenths(min + (max - min) * u.powf(k))
}

/// Weighted species selection and size rolls over a fixed catalog.
pub struct CatchPicker {
    registry: Arc<SpeciesRegistry>,
    cumulative: Vec<u64>,
    total_weight: u64,
    mean_weight: f64,
    rng: Arc<dyn RandomSource>,
}

impl CatchPicker {
    pub fn new(registry: Arc<SpeciesRegistry>) -> Self {
        Self::with_random(registry, Arc::new(SeededRandom::new()))
    }

    pub fn with_random(registry: Arc<SpeciesRegistry>, rng: Arc<dyn RandomSource>) -> Self {
        let cumulative: Vec<u64> = registry
            .iter()
            .scan(0u64, |total, species| {
                *total += u64::from(species.weight.max(1));
                Some(*total)
            })
            .collect();

        let total_weight = cumulative.last().copied().unwrap_or(0);
        let mean_weight = if cumulative.is_empty() {
            0.0
        } else {
            total_weight as f64 / cumulative.len() as f64
        };

        Self {
            registry,
            cumulative,
            total_weight,
            mean_weight,
            rng,
        }
    }

    pub fn registry(&self) -> &SpeciesRegistry {
        &self.registry
    }

    pub fn total_weight(&self) -> u64 {
        self.total_weight
    }

    pub fn mean_weight(&self) -> f64 {
        self.mean_weight
    }

    /// Picks a species with probability `weight / total_weight`.
    pub fn pick_id(&self) -> SpeciesId {
        let roll = self.rng.below(self.total_weight);
        // first species whose running total exceeds the roll
        let index = self.cumulative.partition_point(|&total| total <= roll);

        SpeciesId::new(index as u32)
    }

    /// Rolls a size for the species, or `0.0` if the id is unknown.
    pub fn roll_size(&self, id: SpeciesId) -> f64 {
        let Some(species) = self.registry.get(id) else {
            warn!("Tried to roll a size for unknown species {id}");
            return 0.0;
        };

        size_for_draw(species, self.rng.unit())
    }

    /// Rarity tier of the species, [`RarityTier::Common`] for unknown ids.
    pub fn species_tier(&self, id: SpeciesId) -> RarityTier {
        match self.registry.get(id) {
            Some(species) if self.mean_weight > 0.0 => {
                RarityTier::from_ratio(f64::from(species.weight) / self.mean_weight)
            }
            _ => RarityTier::Common,
        }
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_ulps_eq;
    use test_case::test_case;

    use super::*;
    use crate::{
        random::ScriptedRandom,
        size_class::{size_class_for, size_percentile},
        species::SpeciesDescriptor,
    };

    fn descriptor(id: i64, key: &str, weight: i64, sizes: (f64, f64), size_bias: f64) -> SpeciesDescriptor {
        SpeciesDescriptor {
            id,
            key: key.to_string(),
            name: key.to_string(),
            weight,
            min_size: sizes.0,
            max_size: sizes.1,
            size_bias,
            tags: Vec::new(),
            image: None,
        }
    }

    fn pond() -> Arc<SpeciesRegistry> {
        Arc::new(
            SpeciesRegistry::load(vec![
                descriptor(0, "minnow", 100, (2.0, 10.0), 1.0),
                descriptor(1, "whale", 1, (500.0, 2000.0), 3.0),
            ])
            .unwrap(),
        )
    }

    fn scripted(draws: impl Into<Vec<f64>>) -> Arc<dyn RandomSource> {
        Arc::new(ScriptedRandom::new(draws))
    }

    #[test]
    fn precomputes_weights() {
        let picker = CatchPicker::with_random(pond(), scripted([0.0]));

        assert_eq!(picker.total_weight(), 101);
        assert_ulps_eq!(picker.mean_weight(), 50.5);
    }

    #[test]
    fn pick_uses_lower_bound() {
        let registry = Arc::new(
            SpeciesRegistry::load(vec![
                descriptor(0, "a", 2, (1.0, 2.0), 1.0),
                descriptor(1, "b", 3, (1.0, 2.0), 1.0),
            ])
            .unwrap(),
        );
        // cumulative weights are [2, 5]; draws map to rolls 0, 1, 2, 4
        let picker = CatchPicker::with_random(registry, scripted([0.0, 0.2, 0.4, 0.8]));

        assert_eq!(picker.pick_id(), SpeciesId::new(0));
        assert_eq!(picker.pick_id(), SpeciesId::new(0));
        assert_eq!(picker.pick_id(), SpeciesId::new(1));
        assert_eq!(picker.pick_id(), SpeciesId::new(1));
    }

    #[test_case(0.0, 500.0 ; "lowest draw hits the minimum")]
    #[test_case(1.0, 2000.0 ; "highest draw hits the maximum")]
    #[test_case(0.5, 687.5 ; "bias pulls the middle down")]
    fn whale_rolls(u: f64, expected: f64) {
        let picker = CatchPicker::with_random(pond(), scripted([u]));

        assert_ulps_eq!(picker.roll_size(SpeciesId::new(1)), expected, max_ulps = 4);
    }

    #[test]
    fn unknown_species_rolls_zero() {
        let picker = CatchPicker::with_random(pond(), scripted([0.5]));

        assert_eq!(picker.roll_size(SpeciesId::new(9)), 0.0);
        assert_eq!(picker.species_tier(SpeciesId::new(9)), RarityTier::Common);
    }

    #[test]
    fn inverted_range_collapses_to_minimum() {
        let registry = Arc::new(
            SpeciesRegistry::load(vec![descriptor(0, "odd", 1, (8.0, 3.0), 1.0)]).unwrap(),
        );
        let picker = CatchPicker::with_random(registry, scripted([0.9]));

        assert_eq!(picker.roll_size(SpeciesId::new(0)), 8.0);
    }

    #[test]
    fn bias_below_one_rolls_uniformly() {
        let registry = Arc::new(
            SpeciesRegistry::load(vec![descriptor(0, "flat", 1, (0.0, 10.0), 0.2)]).unwrap(),
        );
        let picker = CatchPicker::with_random(registry, scripted([0.5]));

        assert_eq!(picker.roll_size(SpeciesId::new(0)), 5.0);
    }

    #[test]
    fn tiers_follow_mean_weight() {
        let picker = CatchPicker::with_random(pond(), scripted([0.0]));

        // 100 / 50.5 and 1 / 50.5
        assert_eq!(picker.species_tier(SpeciesId::new(0)), RarityTier::Common);
        assert_eq!(picker.species_tier(SpeciesId::new(1)), RarityTier::Mythic);
    }

    #[test]
    fn rolls_stay_in_bounds() {
        let draws: Vec<f64> = (0..=1000).map(|i| f64::from(i) / 1000.0).collect();
        let registry = pond();

        for species in registry.iter() {
            for &u in &draws {
                let size = size_for_draw(species, u);
                assert!(size >= species.min_size && size <= species.max_size);
                assert_ulps_eq!(size, round_to_tenths(size), max_ulps = 4);
            }
        }
    }

    #[test]
    fn rolls_stay_inside_bounds_that_are_not_tenths() {
        let registry =
            SpeciesRegistry::load(vec![descriptor(0, "shiner", 1, (2.04, 9.96), 1.0)]).unwrap();
        let species = registry.get(SpeciesId::new(0)).unwrap();

        for i in 0..=1000 {
            let size = size_for_draw(species, f64::from(i) / 1000.0);
            assert!((2.04..=9.96).contains(&size), "{size}");
        }
        assert_ulps_eq!(size_for_draw(species, 0.0), 2.1, max_ulps = 4);
        assert_ulps_eq!(size_for_draw(species, 1.0), 9.9, max_ulps = 4);
    }

    #[test]
    fn size_class_never_decreases_with_the_draw() {
        let registry = pond();

        for species in registry.iter() {
            let classes: Vec<_> = (0..=1000)
                .map(|i| size_class_for(species, size_for_draw(species, f64::from(i) / 1000.0)))
                .collect();
            assert!(classes.windows(2).all(|pair| pair[0] <= pair[1]));
        }
    }

    #[test]
    fn percentile_recovers_the_draw() {
        let registry = pond();

        for species in registry.iter() {
            let k = species.size_bias.max(1.0);
            for i in 0..=100 {
                let u = f64::from(i) / 100.0;
                let size = species.min_size + (species.max_size - species.min_size) * u.powf(k);
                assert!((size_percentile(species, size) - u).abs() < 1e-9);
            }
        }
    }
}
