use burn::tensor::{Tensor, TensorData};
use burn_ndarray::NdArray;
use proptest::prelude::*;
use seqalign_core::geometry::euler_zyx_matrix;
use seqalign_core::spatial::{Direction, Point, Spacing};
use seqalign_core::{Image, ImageGrid};

type Backend = NdArray<f32>;

proptest! {
    #[test]
    fn test_coordinate_roundtrip(
        ox in -100.0f64..100.0, oy in -100.0f64..100.0, oz in -100.0f64..100.0,
        sx in 0.1f64..5.0, sy in 0.1f64..5.0, sz in 0.1f64..5.0,
        ax in -3.14f64..3.14, ay in -3.14f64..3.14, az in -3.14f64..3.14,
        px in -50.0f64..50.0, py in -50.0f64..50.0, pz in -50.0f64..50.0
    ) {
        let device = Default::default();
        let data = Tensor::<Backend, 3>::zeros([2, 2, 2], &device);
        let direction = Direction(euler_zyx_matrix(ax, ay, az));
        let image = Image::new(data, Point::new([ox, oy, oz]), Spacing::new([sx, sy, sz]), direction);

        let point = Point::new([px, py, pz]);
        let index = image.transform_physical_point_to_continuous_index(&point);
        let recovered = image.transform_continuous_index_to_physical_point(&index);

        for axis in 0..3 {
            prop_assert!((point[axis] - recovered[axis]).abs() < 1e-6, "axis {}: {} vs {}", axis, point[axis], recovered[axis]);
        }
    }

    #[test]
    fn test_tensor_mapping_matches_point_mapping(
        ox in -10.0f64..10.0, oz in -10.0f64..10.0,
        sx in 0.5f64..2.0, sz in 0.5f64..3.0,
        az in -3.14f64..3.14,
        px in -10.0f64..10.0, py in -10.0f64..10.0, pz in -10.0f64..10.0
    ) {
        let device = Default::default();
        let grid = ImageGrid::new(
            [4, 4, 4],
            Point::new([ox, 1.0, oz]),
            Spacing::new([sx, 1.0, sz]),
            Direction(euler_zyx_matrix(0.0, 0.0, az)),
        );
        let expected = grid.transform_physical_point_to_continuous_index(&Point::new([px, py, pz]));

        let points = Tensor::<Backend, 2>::from_data(
            TensorData::new(vec![px as f32, py as f32, pz as f32], [1, 3]),
            &device,
        );
        let indices = grid.world_to_index_tensor(points.clone()).into_data().to_vec::<f32>().unwrap();
        for axis in 0..3 {
            prop_assert!((indices[axis] as f64 - expected[axis]).abs() < 1e-3);
        }

        let back = grid
            .index_to_world_tensor(grid.world_to_index_tensor(points))
            .into_data()
            .to_vec::<f32>()
            .unwrap();
        prop_assert!((back[0] as f64 - px).abs() < 1e-3);
        prop_assert!((back[1] as f64 - py).abs() < 1e-3);
        prop_assert!((back[2] as f64 - pz).abs() < 1e-3);
    }
}

#[test]
fn test_physical_center_of_oblique_grid() {
    let grid = ImageGrid::new(
        [10, 20, 4],
        Point::new([5.0, -2.0, 0.0]),
        Spacing::new([1.0, 0.5, 2.0]),
        Direction(euler_zyx_matrix(0.0, 0.0, std::f64::consts::FRAC_PI_2)),
    );
    // index (5, 10, 2) scaled is (5, 5, 4); a quarter turn about z maps it to (-5, 5, 4)
    let center = grid.physical_center();
    assert!((center[0] - 0.0).abs() < 1e-9);
    assert!((center[1] - 3.0).abs() < 1e-9);
    assert!((center[2] - 4.0).abs() < 1e-9);
}
