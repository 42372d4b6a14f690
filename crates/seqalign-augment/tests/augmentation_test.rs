use burn::tensor::{Tensor, TensorData};
use burn_ndarray::NdArray;
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;
use seqalign_augment::{
    apply_morph_augmentation, augment_intensity, radial_distortion_transform, random_radial_distortion_transform,
    IntensityAugmentationRanges, Interval, RadialCoefficients, RadialDistortionRanges, SimilarityRanges,
};
use seqalign_core::spatial::{Direction, Point, Spacing};
use seqalign_core::Image;

type B = NdArray<f32>;

fn volume(size: [usize; 3], origin: [f64; 3], spacing: [f64; 3], seed: u32) -> Image<B, 3> {
    let [nx, ny, nz] = size;
    let values: Vec<f32> = (0..nx * ny * nz)
        .map(|i| ((i as u32).wrapping_mul(2654435761).wrapping_add(seed) % 1000) as f32 / 10.0)
        .collect();
    let tensor = Tensor::<B, 3>::from_data(TensorData::new(values, [nz, ny, nx]), &Default::default());
    Image::new(tensor, Point::new(origin), Spacing::new(spacing), Direction::identity())
}

#[test]
fn test_morph_preserves_count_order_and_grids() {
    let volumes = vec![
        volume([8, 8, 6], [0.0, 0.0, 0.0], [1.0, 1.0, 2.0], 1),
        volume([10, 6, 4], [3.0, -2.0, 1.0], [0.8, 1.2, 2.5], 2),
        volume([5, 5, 5], [-4.0, 0.0, 7.0], [2.0, 2.0, 2.0], 3),
    ];
    let mut rng = StdRng::seed_from_u64(11);
    let out = apply_morph_augmentation(&volumes, &SimilarityRanges::default(), &mut rng).unwrap();

    assert_eq!(out.len(), volumes.len());
    for (input, output) in volumes.iter().zip(&out) {
        assert_eq!(input.grid(), output.grid());
    }
}

#[test]
fn test_morph_transform_is_shared_across_the_set() {
    let first = volume([8, 8, 8], [0.0, 0.0, 0.0], [1.0, 1.0, 1.0], 7);
    let second = volume([8, 8, 8], [0.0, 0.0, 0.0], [1.0, 1.0, 1.0], 8);

    let mut rng = StdRng::seed_from_u64(23);
    let alone = apply_morph_augmentation(&[second.clone()], &SimilarityRanges::default(), &mut rng).unwrap();
    let mut rng = StdRng::seed_from_u64(23);
    let together = apply_morph_augmentation(&[second.clone(), first], &SimilarityRanges::default(), &mut rng).unwrap();

    // Identical first volumes and seeds draw the same transform, and the
    // second volume consumes nothing from the generator.
    assert_eq!(alone[0].to_vec(), together[0].to_vec());
}

#[test]
fn test_morph_is_reproducible_with_seed() {
    let volumes = vec![volume([6, 6, 6], [0.0; 3], [1.0; 3], 4)];
    let mut a = StdRng::seed_from_u64(99);
    let mut b = StdRng::seed_from_u64(99);
    let first = apply_morph_augmentation(&volumes, &SimilarityRanges::default(), &mut a).unwrap();
    let second = apply_morph_augmentation(&volumes, &SimilarityRanges::default(), &mut b).unwrap();
    assert_eq!(first[0].to_vec(), second[0].to_vec());
}

#[test]
fn test_zero_coefficients_give_zero_field() {
    let image = volume([7, 5, 3], [1.0, 2.0, 3.0], [1.0, 0.5, 2.0], 0);
    let transform = radial_distortion_transform(&image, None, RadialCoefficients::ZERO).unwrap();
    assert_eq!(transform.grid(), &image.grid());
    assert_eq!(transform.max_norm(), 0.0);
}

#[test]
fn test_random_distortion_grows_away_from_center() {
    let image = volume([9, 9, 9], [0.0; 3], [10.0; 3], 0);
    let mut rng = StdRng::seed_from_u64(2);
    let transform =
        random_radial_distortion_transform(&image, None, &RadialDistortionRanges::default(), &mut rng).unwrap();

    // Default center is index 4.5 on every axis; the corner voxel is farthest.
    let x = transform.component(0).into_data().to_vec::<f32>().unwrap();
    let near = x[4 * 81 + 4 * 9 + 5].abs();
    let corner = x[8 * 81 + 8 * 9 + 8].abs();
    assert!(corner > near);
}

#[test]
fn test_intensity_keeps_grids_and_draws_per_volume() {
    let base = volume([12, 12, 4], [0.0; 3], [1.0; 3], 5);
    let volumes = vec![base.clone(), base.clone()];
    let ranges = IntensityAugmentationRanges::default()
        .with_noise_standard_deviation(Interval::new(0.05, 0.05))
        .with_radius([2, 2, 1]);
    let mut rng = StdRng::seed_from_u64(17);
    let out = augment_intensity(&volumes, &ranges, &mut rng).unwrap();

    assert_eq!(out.len(), 2);
    assert_eq!(out[0].grid(), base.grid());
    assert_eq!(out[1].grid(), base.grid());
    assert_ne!(out[0].to_vec(), out[1].to_vec());
}

#[test]
fn test_intensity_rejects_bad_ranges() {
    let volumes = vec![volume([4, 4, 4], [0.0; 3], [1.0; 3], 0)];
    let ranges = IntensityAugmentationRanges::default().with_alpha(Interval::new(1.0, 0.5));
    let mut rng = StdRng::seed_from_u64(0);
    assert!(augment_intensity(&volumes, &ranges, &mut rng).is_err());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn prop_distortion_field_matches_grid(nx in 1usize..6, ny in 1usize..6, nz in 1usize..6, k1 in 0.0f64..1e-3) {
        let image = volume([nx, ny, nz], [0.0; 3], [1.0; 3], 0);
        let transform = radial_distortion_transform(&image, None, RadialCoefficients::new(k1, 0.0, 0.0)).unwrap();
        prop_assert_eq!(transform.field().dims(), [3, nz, ny, nx]);
        prop_assert_eq!(transform.grid(), &image.grid());
    }
}
