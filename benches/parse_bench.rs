use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::collections::HashMap;

use grcfilter::parse;
use grcfilter::query::to_wire;

/// `a0 = 0 AND a1 = 1 OR ...` with `clauses` comparisons
fn make_query(clauses: usize) -> String {
    (0..clauses)
        .map(|i| format!("attr{} = \"value {}\"", i, i))
        .collect::<Vec<_>>()
        .join(if clauses % 2 == 0 { " AND " } else { " OR " })
}

fn bench_parse(c: &mut Criterion) {
    let sizes = [1usize, 10, 100];

    let mut group = c.benchmark_group("parse");
    for &size in &sizes {
        let query = make_query(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &query, |b, query| {
            b.iter(|| {
                black_box(parse(query).unwrap());
            });
        });
    }
    group.finish();
}

fn bench_to_wire(c: &mut Criterion) {
    let sizes = [10usize, 100];

    let mut group = c.benchmark_group("to_wire");
    for &size in &sizes {
        let expr = parse(&make_query(size)).unwrap().unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(size), &expr, |b, expr| {
            b.iter(|| {
                black_box(to_wire(expr));
            });
        });
    }
    group.finish();
}

fn bench_evaluate(c: &mut Criterion) {
    let expr = parse(&make_query(100)).unwrap().unwrap();
    let record: HashMap<String, Vec<String>> = (0..100)
        .map(|i| (format!("attr{}", i), vec![format!("value {}", i + 1)]))
        .collect();

    c.bench_function("evaluate_100_clauses", |b| {
        b.iter(|| {
            black_box(expr.evaluate(&record));
        });
    });
}

criterion_group!(benches, bench_parse, bench_to_wire, bench_evaluate);
criterion_main!(benches);
