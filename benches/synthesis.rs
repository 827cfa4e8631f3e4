mod common;

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use livesource::{LiveSource, synthesize};

fn bench_synthesis(c: &mut Criterion) {
    for (label, source) in common::workloads("synthesis") {
        let program = common::load_program(&label, &source);

        c.bench_function(&format!("synthesize_{label}"), |b| {
            b.iter(|| {
                let out = synthesize(black_box(program.clone()));
                black_box(out);
            })
        });

        c.bench_function(&format!("get_values_cached_{label}"), |b| {
            let mut live = LiveSource::new(source.clone());
            b.iter(|| {
                let out = live.get_values().expect("run");
                black_box(out);
            })
        });

        c.bench_function(&format!("get_values_after_update_{label}"), |b| {
            let mut live = LiveSource::new(source.clone());
            b.iter(|| {
                live.update(black_box(source.as_str()));
                let out = live.get_values().expect("run");
                black_box(out);
            })
        });
    }
}

criterion_group!(benches, bench_synthesis);
criterion_main!(benches);
