//! Labels for how big a catch is compared to others of its species.
//!
//! Classification only looks at the species parameters and the size, so
//! stored catches can be labelled again without knowing how they were rolled.

use std::fmt::Display;

use serde::Serialize;

use crate::species::Species;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum SizeClass {
    Tiny,
    Small,
    Average,
    Big,
    Huge,
    Enormous,
}

impl SizeClass {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Tiny => "tiny",
            Self::Small => "modest",
            Self::Average => "average",
            Self::Big => "big",
            Self::Huge => "huge",
            Self::Enormous => "enormous",
        }
    }
}

impl Display for SizeClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Cumulative probability of rolling at most `size` for this species.
///
/// Inverts the roll transform `min + (max - min) * u^k`. A species whose
/// range is empty or inverted always yields `0`.
pub fn size_percentile(species: &Species, size: f64) -> f64 {
    if species.max_size <= species.min_size {
        return 0.0;
    }

    let x = ((size - species.min_size) / (species.max_size - species.min_size)).clamp(0.0, 1.0);
    let k = if species.size_bias <= 0.0 {
        1.0
    } else {
        species.size_bias
    };

    x.powf(1.0 / k)
}

pub fn class_from_percentile(percentile: f64) -> SizeClass {
    match percentile {
        p if p < 0.08 => SizeClass::Tiny,
        p if p < 0.25 => SizeClass::Small,
        p if p < 0.70 => SizeClass::Average,
        p if p < 0.90 => SizeClass::Big,
        p if p < 0.97 => SizeClass::Huge,
        _ => SizeClass::Enormous,
    }
}

pub fn size_class_for(species: &Species, size: f64) -> SizeClass {
    class_from_percentile(size_percentile(species, size))
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use test_case::test_case;

    use super::*;
    use crate::species::SpeciesId;

    fn species(min_size: f64, max_size: f64, size_bias: f64) -> Species {
        Species {
            id: SpeciesId::new(0),
            key: "test".to_string(),
            name: "Test".to_string(),
            weight: 1,
            min_size,
            max_size,
            size_bias,
            tags: Vec::new(),
            image: None,
        }
    }

    #[test_case(0.0, SizeClass::Tiny ; "zero is tiny")]
    #[test_case(0.079, SizeClass::Tiny ; "just below small")]
    #[test_case(0.08, SizeClass::Small ; "small threshold")]
    #[test_case(0.25, SizeClass::Average ; "average threshold")]
    #[test_case(0.70, SizeClass::Big ; "big threshold")]
    #[test_case(0.90, SizeClass::Huge ; "huge threshold")]
    #[test_case(0.969, SizeClass::Huge ; "just below enormous")]
    #[test_case(0.97, SizeClass::Enormous ; "enormous threshold")]
    #[test_case(1.0, SizeClass::Enormous ; "one is enormous")]
    fn percentile_thresholds(percentile: f64, expected: SizeClass) {
        assert_eq!(class_from_percentile(percentile), expected);
    }

    #[test_case(10.0, 10.0 ; "empty range")]
    #[test_case(10.0, 5.0 ; "inverted range")]
    fn degenerate_range_is_zero(min_size: f64, max_size: f64) {
        assert_eq!(size_percentile(&species(min_size, max_size, 2.0), 10.0), 0.0);
    }

    #[test]
    fn out_of_range_sizes_are_clamped() {
        let species = species(2.0, 10.0, 1.0);

        assert_eq!(size_percentile(&species, -4.0), 0.0);
        assert_eq!(size_percentile(&species, 40.0), 1.0);
    }

    #[test_case(0.0 ; "zero bias")]
    #[test_case(-3.0 ; "negative bias")]
    fn non_positive_bias_is_uniform(size_bias: f64) {
        let species = species(0.0, 10.0, size_bias);

        assert_relative_eq!(size_percentile(&species, 2.5), 0.25);
    }

    #[test]
    fn biased_percentile_inverts_the_roll() {
        let whale = species(500.0, 2000.0, 3.0);
        // u = 0.5 rolls 500 + 1500 * 0.125
        assert_relative_eq!(size_percentile(&whale, 687.5), 0.5, epsilon = 1e-12);
        assert_eq!(size_class_for(&whale, 687.5), SizeClass::Average);
        assert_eq!(size_class_for(&whale, 2000.0), SizeClass::Enormous);
        assert_eq!(size_class_for(&whale, 500.0), SizeClass::Tiny);
    }

    #[test]
    fn small_displays_as_modest() {
        assert_eq!(SizeClass::Small.to_string(), "modest");
        assert_eq!(SizeClass::Enormous.to_string(), "enormous");
    }
}
