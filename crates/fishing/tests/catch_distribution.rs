use std::sync::Arc;

use fishing::{CatchPicker, SeededRandom, SpeciesId, SpeciesRegistry};

const TRIALS: usize = 100_000;

fn registry(raw: &str) -> Arc<SpeciesRegistry> {
    Arc::new(SpeciesRegistry::from_json_str(raw).unwrap())
}

fn counts(picker: &CatchPicker, species: usize) -> Vec<usize> {
    let mut counts = vec![0; species];
    for _ in 0..TRIALS {
        counts[picker.pick_id().index()] += 1;
    }
    counts
}

fn chi_square(counts: &[usize], weights: &[f64]) -> f64 {
    let total: f64 = weights.iter().sum();
    counts
        .iter()
        .zip(weights)
        .map(|(&observed, weight)| {
            let expected = TRIALS as f64 * weight / total;
            (observed as f64 - expected).powi(2) / expected
        })
        .sum()
}

#[test]
fn minnow_dominates_the_whale() {
    let registry = registry(
        r#"[
            {"id": 0, "key": "minnow", "name": "Minnow", "weight": 100,
             "minSize": 2, "maxSize": 10, "sizeBias": 1},
            {"id": 1, "key": "whale", "name": "Whale", "weight": 1,
             "minSize": 500, "maxSize": 2000, "sizeBias": 3}
        ]"#,
    );
    let picker = CatchPicker::with_random(registry, Arc::new(SeededRandom::from_seed(20220828)));

    let counts = counts(&picker, 2);
    let minnow_share = counts[0] as f64 / TRIALS as f64;

    assert!((minnow_share - 100.0 / 101.0).abs() < 0.002, "{minnow_share}");
    // df = 1, p = 0.001
    assert!(chi_square(&counts, &[100.0, 1.0]) < 10.83);
}

#[test]
fn picks_follow_weights() {
    let registry = registry(
        r#"[
            {"id": 3, "key": "boot", "name": "Boot", "weight": 0, "minSize": 20, "maxSize": 30},
            {"id": 0, "key": "perch", "name": "Perch", "weight": 50, "minSize": 10, "maxSize": 40},
            {"id": 1, "key": "carp", "name": "Carp", "weight": 30, "minSize": 30, "maxSize": 90},
            {"id": 2, "key": "pike", "name": "Pike", "weight": 15, "minSize": 40, "maxSize": 130},
            {"id": 4, "key": "sturgeon", "name": "Sturgeon", "weight": 4,
             "minSize": 100, "maxSize": 300, "sizeBias": 2.5}
        ]"#,
    );
    let picker = CatchPicker::with_random(registry, Arc::new(SeededRandom::from_seed(1201)));

    let counts = counts(&picker, 5);

    // the boot's weight of 0 counts as 1
    let weights = [50.0, 30.0, 15.0, 1.0, 4.0];
    assert_eq!(picker.total_weight(), 100);
    // df = 4, p = 0.001
    assert!(chi_square(&counts, &weights) < 18.47, "{counts:?}");
}

#[test]
fn rolled_sizes_favour_small_fish_under_bias() {
    let registry = registry(
        r#"[{"id": 0, "key": "whale", "name": "Whale", "weight": 1,
             "minSize": 500, "maxSize": 2000, "sizeBias": 3}]"#,
    );
    let picker = CatchPicker::with_random(registry, Arc::new(SeededRandom::from_seed(7)));
    let whale = SpeciesId::new(0);

    let sizes: Vec<f64> = (0..10_000).map(|_| picker.roll_size(whale)).collect();
    let below_middle = sizes.iter().filter(|&&size| size < 1250.0).count();

    assert!(sizes.iter().all(|&size| (500.0..=2000.0).contains(&size)));
    // P(u^3 < 0.5) = 0.5^(1/3) ~ 0.79
    assert!(below_middle > 7_500 && below_middle < 8_300, "{below_middle}");
}
