use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::{rngs::StdRng, Rng, SeedableRng};
use stereovo_3d::{motion::axis_angle_to_rotation_matrix, RigidMotion, StereoCamera};
use stereovo_features::{BruteForceMatcher, Feature, StereoFeatures};
use stereovo_odometry::{
    correspondence::match_quadruples, ransac_rigid_motion, Quadruple, RansacParams,
};

fn camera() -> StereoCamera {
    StereoCamera::new(0.12, 400.0, 400.0, 320.0, 240.0)
}

fn generate_quadruples(n: usize, outlier_ratio: f64) -> Vec<Quadruple> {
    let cam = camera();
    let mut rng = StdRng::seed_from_u64(0);
    let rotation = axis_angle_to_rotation_matrix(&[0.0, 1.0, 0.1], 0.03)
        .unwrap_or(RigidMotion::identity().rotation);
    let motion = RigidMotion::new(rotation, [0.01, 0.0, -0.2]);
    let num_outliers = (n as f64 * outlier_ratio) as usize;

    (0..n)
        .map(|i| {
            let p = [
                rng.random_range(-1.0..1.0),
                rng.random_range(-0.5..0.5),
                rng.random_range(1.5..5.0),
            ];
            let mut q = motion.transform_point(&p);
            if i < num_outliers {
                q[0] += rng.random_range(1.0..3.0);
                q[2] += rng.random_range(1.0..3.0);
            }
            let (prev_left, prev_right) = cam.project(&p);
            let (cur_left, cur_right) = cam.project(&q);
            Quadruple::new(prev_left, prev_right, cur_left, cur_right)
        })
        .collect()
}

fn bench_ransac(c: &mut Criterion) {
    let mut group = c.benchmark_group("ransac_rigid_motion");
    let cam = camera();
    let params = RansacParams::default();

    for &(n, outliers) in &[(50, 0.1), (200, 0.1), (200, 0.4)] {
        let quadruples = generate_quadruples(n, outliers);
        let id = format!("{n}_{}pct", (outliers * 100.0) as usize);
        group.bench_with_input(BenchmarkId::from_parameter(id), &n, |b, _| {
            let mut rng = StdRng::seed_from_u64(42);
            b.iter(|| {
                let _ = std::hint::black_box(ransac_rigid_motion(
                    &cam,
                    &quadruples,
                    &params,
                    &mut rng,
                ));
            });
        });
    }
    group.finish();
}

fn bench_match_quadruples(c: &mut Criterion) {
    let mut group = c.benchmark_group("match_quadruples");
    let matcher = BruteForceMatcher::default();

    for &n in &[100, 500] {
        let mut rng = StdRng::seed_from_u64(1);
        let features = (0..n)
            .map(|_| {
                let descriptor = (0..32).map(|_| rng.random::<f32>()).collect();
                Feature::new([rng.random_range(0.0..640.0), 100.0], descriptor)
            })
            .collect::<Vec<_>>();
        let frame = StereoFeatures::new(features.clone(), features);

        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, _| {
            b.iter(|| std::hint::black_box(match_quadruples(&frame, &frame, &matcher)));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_ransac, bench_match_quadruples);
criterion_main!(benches);
