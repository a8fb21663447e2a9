use criterion::{black_box, criterion_group, criterion_main, Criterion};
use gantry_core::{Pid, PidCfg};

fn bench_pid(c: &mut Criterion) {
    let mut group = c.benchmark_group("pid");

    group.bench_function("calculate_step", |b| {
        let mut pid = Pid::new(&PidCfg::default()).expect("pid cfg");
        let mut measured = 20.0;
        b.iter(|| {
            let out = pid.calculate(black_box(200.0), black_box(measured));
            // crude plant model so the error trajectory is realistic
            measured += out * 0.01 - 0.05;
            black_box(out)
        });
    });

    group.bench_function("calculate_saturated", |b| {
        let cfg = PidCfg {
            kp: 100.0,
            windup_guard: true,
            ..PidCfg::default()
        };
        let mut pid = Pid::new(&cfg).expect("pid cfg");
        b.iter(|| black_box(pid.calculate(black_box(200.0), black_box(0.0))));
    });

    group.finish();
}

criterion_group!(benches, bench_pid);
criterion_main!(benches);
