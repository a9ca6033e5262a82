use criterion::{BatchSize, Criterion, criterion_group, criterion_main};
use hklrs::{Core, Lattice, Positioners, Positions, Sample, SolverRegistry};
use rand::Rng;

fn th_tth() -> Core {
    let solver = SolverRegistry::default().create("th_tth", "TH TTH Q", None).unwrap();
    let positioners = Positioners::new(&["q"], &["th", "tth"]).unwrap();
    let mut core = Core::new("powder", positioners, solver).unwrap();
    core.auto_assign_axes().unwrap();
    core
}

fn fourc() -> Core {
    let solver = SolverRegistry::default().create("fourc", "E4CV", Some("hkl")).unwrap();
    let positioners = Positioners::new(&["h", "k", "l"], &["omega", "chi", "phi", "tth"]).unwrap();
    let mut core = Core::new("fourc", positioners, solver).unwrap();
    core.auto_assign_axes().unwrap();
    core.set_wavelength(1.54).unwrap();
    core.add_sample(Sample::new(Some("silicon"), Lattice::cubic(5.431)).unwrap(), false)
        .unwrap();
    core
}

fn random_hkl() -> [f64; 3] {
    let mut rng = rand::rng();
    [
        rng.random_range(-2.0..2.0),
        rng.random_range(-2.0..2.0),
        rng.random_range(0.5..2.0),
    ]
}

fn th_tth_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("th_tth");
    let mut core = th_tth();

    group.bench_function("forward", |b| {
        b.iter_batched(
            || rand::rng().random_range(0.1..5.0),
            |q| core.forward([q], None),
            BatchSize::SmallInput,
        )
    });

    let mut core = th_tth();
    group.bench_function("inverse", |b| {
        b.iter_batched(
            || {
                let tth = rand::rng().random_range(1.0..170.0);
                Positions::from_names(&["th", "tth"], &[tth / 2., tth])
            },
            |reals| core.inverse(Some(reals.into()), None),
            BatchSize::SmallInput,
        )
    });
}

fn fourc_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("fourc");
    let mut core = fourc();

    group.bench_function("forward", |b| {
        b.iter_batched(random_hkl, |hkl| core.forward(hkl, None), BatchSize::SmallInput)
    });

    group.bench_function("forward solutions", |b| {
        b.iter_batched(
            random_hkl,
            |hkl| core.forward_solutions(hkl, None),
            BatchSize::SmallInput,
        )
    });

    let reals = core.forward([1., 1., 1.], None).unwrap();
    group.bench_function("inverse", |b| {
        b.iter_batched(
            || reals.clone(),
            |reals| core.inverse(Some(reals.into()), None),
            BatchSize::SmallInput,
        )
    });
}

criterion_group!(benches, th_tth_benchmark, fourc_benchmark);
criterion_main!(benches);
