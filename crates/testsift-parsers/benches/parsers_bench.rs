// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

use std::hint::black_box;
use std::sync::Arc;

use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use testsift_parsers::{
    CollectingPublisher, EngineOptions, Framework, NoopTelemetry, ParserSet, parse_log,
};

const FIXTURES: [(Framework, &str); 4] = [
    (Framework::Jasmine, include_str!("../tests/fixtures/jasmine.log")),
    (Framework::Jest, include_str!("../tests/fixtures/jest-verbose.log")),
    (Framework::Mocha, include_str!("../tests/fixtures/mocha.log")),
    (Framework::Python, include_str!("../tests/fixtures/python.log")),
];

fn single_framework_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse_log");
    for (framework, log) in FIXTURES {
        let log = log.repeat(50);
        group.throughput(Throughput::Bytes(log.len() as u64));
        group.bench_function(framework.name(), |b| {
            b.iter(|| parse_log(black_box(framework), black_box(&log)))
        });
    }
    group.finish();
}

fn parser_set_benchmark(c: &mut Criterion) {
    let log: String = FIXTURES.iter().map(|(_, log)| *log).collect::<Vec<_>>().join("\n");
    let lines: Vec<&str> = log.lines().collect();

    c.bench_function("parser_set_all_frameworks", |b| {
        b.iter(|| {
            let publisher = Arc::new(CollectingPublisher::new());
            let mut set = ParserSet::new(
                &Framework::ALL,
                publisher.clone(),
                Arc::new(NoopTelemetry),
                EngineOptions::default(),
            )
            .expect("parser set");
            for (n, line) in (1..).zip(&lines) {
                set.consume(black_box(line), n).expect("consume");
            }
            set.finish().expect("finish");
            publisher.len()
        })
    });
}

criterion_group!(benches, single_framework_benchmark, parser_set_benchmark);
criterion_main!(benches);
