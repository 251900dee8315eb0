use dose_gamma::{GammaEvaluator, GammaParams, Point3, VoxelGrid};

fn gaussian_dose(centre: Point3, peak: f64) -> impl Fn(&Point3) -> f64 {
    move |p: &Point3| peak * (-(p - centre).norm_squared() / 200.0).exp()
}

fn main() {
    let spacing = Point3::new(2.0, 2.0, 2.5);
    let dims = (31, 31, 25);
    let origin = Point3::new(-30.0, -30.0, -30.0);

    let reference = VoxelGrid::from_fn(origin, spacing, dims, gaussian_dose(Point3::zeros(), 200.0))
        .expect("should have built reference grid");
    let evaluated = VoxelGrid::from_fn(
        origin,
        spacing,
        dims,
        gaussian_dose(Point3::new(1.5, 0.0, -1.0), 196.0),
    )
    .expect("should have built evaluated grid");

    let evaluator =
        GammaEvaluator::new(GammaParams::default()).expect("default criteria should be valid");
    let result = evaluator
        .evaluate(&reference, &evaluated, &mut |percent: u8| {
            println!("{percent:>3}%");
        })
        .expect("should have evaluated gamma");

    match result.pass_rate() {
        Some(rate) => println!(
            "pass rate {:.2}% over {} voxels (gamma {:.3}..{:.3})",
            100.0 * rate,
            result.evaluated_count,
            result.min_gamma(),
            result.max_gamma()
        ),
        None => println!("every voxel is below the dose threshold"),
    }
}
