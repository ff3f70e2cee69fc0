//! Engagement resolver benchmarks.
//!
//! Run with: `cargo bench`

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use tactical_core::systems::engagement::{self, BatchRow, MitigationInput};

fn scalar_mitigation_benchmark(c: &mut Criterion) {
    let input = MitigationInput { armor_facet: 12.0, ap: 4.0, cover_mod: 0.75, invuln: 6.0, defense_mod: 0.05 };
    c.bench_function("mitigation_fraction", |b| {
        b.iter(|| {
            let mitigation = engagement::mitigation_fraction(black_box(input));
            black_box(engagement::damage_out(black_box(3.0), mitigation, black_box(1.1), false))
        })
    });
}

fn batch_row_benchmark(c: &mut Criterion) {
    let mut rng = ChaCha8Rng::seed_from_u64(7);
    let row = BatchRow { ballistic_skill: 72.0, strength: 3.0, ap: 2.0, attacks: 20.0, armor_facet: 10.0, invuln: 6.0, cover_mod: 0.5, defense_mod: 0.0, md: 15.0 };
    c.bench_function("resolve_batch_row_20_attacks", |b| {
        b.iter(|| black_box(engagement::resolve_batch_row(&mut rng, black_box(&row), false)))
    });
}

fn batch_row_fleet_benchmark(c: &mut Criterion) {
    let mut rng = ChaCha8Rng::seed_from_u64(11);
    let rows: Vec<BatchRow> = (0..200)
        .map(|i| BatchRow {
            ballistic_skill: 50.0 + (i % 40) as f32,
            strength: 2.0 + (i % 3) as f32,
            ap: (i % 6) as f32,
            attacks: 10.0,
            armor_facet: (i % 20) as f32,
            invuln: 6.0,
            cover_mod: if i % 2 == 0 { 0.75 } else { 0.0 },
            defense_mod: 0.0,
            md: (i % 3) as f32 * 10.0,
        })
        .collect();
    c.bench_function("resolve_batch_row_fleet_200", |b| {
        b.iter(|| {
            let total: f32 = rows.iter().map(|row| engagement::resolve_batch_row(&mut rng, black_box(row), false)).sum();
            black_box(total)
        })
    });
}

criterion_group!(benches, scalar_mitigation_benchmark, batch_row_benchmark, batch_row_fleet_benchmark);
criterion_main!(benches);
