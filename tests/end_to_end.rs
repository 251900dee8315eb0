//! End-to-end gamma evaluation on sampled grids.

use approx::assert_relative_eq;
use dose_gamma::{
    DoseGrid, EXCLUDED, EdgeMode, GammaEvaluator, GammaParams, NoProgress, OutputGeometry, Point3,
    Reconciler, VoxelGrid,
};

fn cube(fill: f64) -> VoxelGrid {
    VoxelGrid::uniform(Point3::zeros(), Point3::new(1.0, 1.0, 1.0), (3, 3, 3), fill)
        .expect("should have built grid")
}

#[test]
fn identical_grids_pass_everywhere() {
    let reference = cube(100.0);
    let evaluated = cube(100.0);

    let result = GammaEvaluator::new(GammaParams::new(3.0, 3.0, 10.0))
        .unwrap()
        .evaluate(&reference, &evaluated, &mut NoProgress)
        .unwrap();

    assert_eq!(result.gamma.dim(), (3, 3, 3));
    assert!(result.gamma.data().iter().all(|&g| g == 0.0));
    assert_eq!(result.evaluated_count, 27);
    assert_relative_eq!(result.max_gamma(), 0.0);
}

#[test]
fn uniform_three_percent_difference_gives_unit_gamma() {
    let reference = cube(100.0);
    let evaluated = cube(97.0);

    let result = GammaEvaluator::new(GammaParams::new(3.0, 3.0, 10.0))
        .unwrap()
        .evaluate(&reference, &evaluated, &mut NoProgress)
        .unwrap();

    for &g in result.gamma.data() {
        assert_ne!(g, EXCLUDED);
        assert_relative_eq!(g, 1.0, epsilon = 1e-9);
    }
    assert_eq!(result.pass_rate(), Some(1.0));
}

#[test]
fn scaling_is_applied_to_both_grids() {
    // Raw values differ, physical doses agree
    let reference = cube(50.0).with_scaling(2.0);
    let evaluated = cube(1000.0).with_scaling(0.1);

    let result = GammaEvaluator::new(GammaParams::default())
        .unwrap()
        .evaluate(&reference, &evaluated, &mut NoProgress)
        .unwrap();
    assert!(result.gamma.data().iter().all(|&g| g.abs() < 1e-9));
}

#[test]
fn gamma_grid_keeps_reference_geometry() {
    let reference = VoxelGrid::new(
        vec![0.0, 1.0, 2.5, 4.0],
        vec![-1.0, 0.0],
        vec![3.0, 6.0, 9.0],
        vec![80.0; 24],
    )
    .unwrap();
    let evaluated = cube(80.0);

    let result = GammaEvaluator::new(GammaParams::default())
        .unwrap()
        .evaluate(&reference, &evaluated, &mut NoProgress)
        .unwrap();

    assert_eq!(result.gamma.x_coords(), reference.x_coords());
    assert_eq!(result.gamma.z_coords(), reference.z_coords());
    assert_eq!(result.vectors.y.dim(), result.gamma.dim());
    assert!(result.jacobian.is_none());
}

#[test]
fn shifted_field_passes_with_displacement_recorded() {
    let spacing = Point3::new(1.0, 1.0, 1.0);
    let dose = |shift: f64| move |p: &Point3| 50.0 + 5.0 * (p.x - shift);
    let reference = VoxelGrid::from_fn(Point3::zeros(), spacing, (9, 3, 3), dose(0.0)).unwrap();
    let evaluated = VoxelGrid::from_fn(Point3::zeros(), spacing, (9, 3, 3), dose(1.0)).unwrap();

    let result = GammaEvaluator::new(GammaParams::default())
        .unwrap()
        .evaluate(&reference, &evaluated, &mut NoProgress)
        .unwrap();

    // Interior voxels find the 1 mm shift exactly
    let centre = (4, 1, 1);
    let gamma = result.gamma.get(centre.0, centre.1, centre.2).unwrap();
    assert_relative_eq!(gamma, 1.0 / 3.0, epsilon = 1e-9);
    let displacement = result.vectors.get(centre.0, centre.1, centre.2).unwrap();
    assert_relative_eq!(displacement.x, 1.0, epsilon = 1e-12);
    // Only the far x edge, clamped below the reference dose, fails
    assert_eq!(result.evaluated_count, 81);
    assert_eq!(result.passed_count, 72);
}

#[test]
fn union_geometry_covers_offset_grids() {
    let reference = cube(100.0).with_edge_mode(EdgeMode::Zero);
    let evaluated = VoxelGrid::uniform(
        Point3::new(1.0, 1.0, 0.0),
        Point3::new(1.0, 1.0, 1.0),
        (3, 3, 3),
        100.0,
    )
    .unwrap()
    .with_edge_mode(EdgeMode::Zero);

    let spacing = Point3::new(1.0, 1.0, 1.0);
    let params = GammaParams::default().output_geometry(OutputGeometry::Union { spacing });
    let result = GammaEvaluator::new(params)
        .unwrap()
        .evaluate(&reference, &evaluated, &mut NoProgress)
        .unwrap();

    let union = Reconciler::blank_from_union(&reference, &evaluated, &spacing).unwrap();
    assert_eq!(result.gamma.dim(), union.dim());
    assert_eq!(result.gamma.dim(), (3, 4, 4));
    for (range, expected) in result.gamma.ranges().iter().zip([3.0, 3.0, 2.0]) {
        assert_relative_eq!(range.min, 0.0);
        assert_relative_eq!(range.max, expected);
    }
    // The corner covered by neither grid reads zero in both and is excluded
    assert_eq!(result.gamma.get(3, 0, 0), Some(EXCLUDED));
    assert_eq!(result.gamma.get(1, 1, 1), Some(0.0));
}
