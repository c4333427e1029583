use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::{Rng, SeedableRng};
use wikiwatcher::highlight::highlight_changes;

fn generate_diff_markup(length: u64) -> String {
    // generate inputs from fixed seeds
    let mut rng = rand_xoshiro::Xoshiro256PlusPlus::seed_from_u64(length);
    let mut input = String::new();
    for _ in 0..length {
        input.push(rng.gen_range('a'..='z'));
        if rng.gen_ratio(1, 8) {
            input.push(' ');
        }
    }

    // sprinkle in the markup of a `action=compare` table
    const VALUES: &[&str] = &[
        "<ins>",
        "</ins>",
        "<del>",
        "</del>",
        r#"<ins class="diffchange diffchange-inline">"#,
        r#"<del style="font-weight: bold">"#,
        r#"<td class="diff-addedline">"#,
        "</td>",
        "<tr>",
        "</tr>",
        "<div>",
        "</div>",
    ];
    for _ in 0..(length / 10) {
        let pos = rng.gen_range(0..input.len());
        let value = VALUES[rng.gen_range(0..VALUES.len())];
        input.insert_str(pos, value);
    }

    input
}

fn bench_highlight_changes(c: &mut Criterion) {
    let mut group = c.benchmark_group("highlight_changes");
    for length in [500u64, 1000u64, 5000u64, 10000u64, 50000u64].into_iter() {
        let input = generate_diff_markup(length);
        group.throughput(Throughput::Bytes(input.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(length), &input, |b, i| {
            b.iter(|| highlight_changes(i));
        });
    }
}

criterion_group!(benches, bench_highlight_changes);
criterion_main!(benches);
