use std::collections::HashSet;

use image::{GrayImage, Luma};
use rand::prelude::*;

use super::*;
use crate::geometry::OutlineError;
use crate::test_utils::{cell_at, cell_with_intensity};

const MERGED_DIP: [f64; 12] = [
    50.0, 80.0, 100.0, 80.0, 60.0, 10.0, 60.0, 80.0, 100.0, 80.0, 60.0, 50.0,
];

/// One disk per plane at a fixed position, with the given intensity-sums.
fn column(center: [f64; 2], weights: &[f64]) -> Vec<Plane> {
    weights
        .iter()
        .map(|&w| Plane::new(vec![cell_with_intensity(center, 3, w)]))
        .collect()
}

fn scatter(centers: &[&[[f64; 2]]]) -> Vec<Plane> {
    centers
        .iter()
        .map(|plane| Plane::new(plane.iter().map(|&c| cell_at(c, 3, 10.0)).collect()))
        .collect()
}

fn square_points(x0: i32, y0: i32, side: i32) -> Vec<Pixel> {
    let mut pts = Vec::new();
    for i in 0..side {
        pts.push([x0 + i, y0]);
        pts.push([x0 + side, y0 + i]);
        pts.push([x0 + side - i, y0 + side]);
        pts.push([x0, y0 + side - i]);
    }
    pts
}

#[test]
fn single_plane_label_is_removed() {
    let planes = scatter(&[&[[10.0, 10.0], [60.0, 60.0]], &[[10.0, 10.0]]]);
    let (volume, stats) = Volume::segment(planes, SegmentationConfig::default());

    assert_eq!(stats.n_cells_in, 3);
    assert_eq!(stats.n_short_removed, 1);
    assert_eq!(stats.n_labels, 1);
    assert_eq!(volume.labels(0), Some(vec![0]));
    assert_eq!(volume.labels(1), Some(vec![0]));
    assert_eq!(volume.cells_3d().len(), 1);
}

#[test]
fn merged_column_is_split_at_intensity_dip() {
    let (volume, stats) = Volume::segment(
        column([30.0, 20.0], &MERGED_DIP),
        SegmentationConfig::default(),
    );

    assert_eq!(stats.n_split_points, 1);
    assert!(volume.planes()[5].is_empty());
    assert_eq!(stats.n_labels, 2);

    let cells = volume.cells_3d();
    assert_eq!(cells[0].label, 0);
    assert_eq!(cells[0].position, [2.0, 20.0, 30.0]);
    assert_eq!(cells[1].label, 1);
    assert_eq!(cells[1].position, [8.0, 20.0, 30.0]);
    assert_eq!(volume.labels(4), Some(vec![0]));
    assert_eq!(volume.labels(6), Some(vec![1]));
}

#[test]
fn refresh_reports_split_points_without_cutting() {
    let mut volume = Volume::new(
        column([30.0, 20.0], &MERGED_DIP),
        SegmentationConfig::default(),
    );
    volume.refresh();

    assert_eq!(volume.n_cells(), 12);
    let diag = &volume.diagnostics()[0];
    assert_eq!(diag.label, 0);
    assert_eq!(diag.planes, (0..12).collect::<Vec<_>>());
    assert_eq!(diag.barrier_planes, vec![5]);
    assert_eq!(diag.evidence[5], 10.0 * 100.0);
}

/// Two dips four planes apart: the first pass merges them and cuts at the
/// bump between them, which leaves each dip next to a fresh track end.
const DOUBLE_DIP: [f64; 13] = [
    50.0, 80.0, 100.0, 80.0, 10.0, 40.0, 60.0, 40.0, 10.0, 80.0, 100.0, 80.0, 50.0,
];

#[test]
fn second_pass_splits_what_the_first_pass_exposes() {
    let one_pass = SegmentationConfig {
        barrier_passes: 1,
        ..SegmentationConfig::default()
    };
    let (volume, stats) = Volume::segment(column([30.0, 20.0], &DOUBLE_DIP), one_pass);
    assert_eq!(stats.n_split_points, 1);
    assert!(volume.planes()[6].is_empty());
    assert!(!volume.planes()[4].is_empty());
    assert!(!volume.planes()[8].is_empty());
    assert_eq!(volume.diagnostics()[0].barrier_planes, vec![4]);
    assert_eq!(volume.diagnostics()[1].barrier_planes, vec![8]);

    let (volume, stats) = Volume::segment(
        column([30.0, 20.0], &DOUBLE_DIP),
        SegmentationConfig::default(),
    );
    assert_eq!(stats.n_split_points, 3);
    for z in [4, 6, 8] {
        assert!(volume.planes()[z].is_empty(), "plane {} kept its cell", z);
    }
    // Planes 5 and 7 are left as single-plane stubs.
    assert_eq!(stats.n_short_removed, 2);
    assert_eq!(stats.n_labels, 2);
    let z: Vec<f64> = volume.cells_3d().iter().map(|c| c.position[0]).collect();
    assert_eq!(z, vec![2.0, 10.0]);
}

#[test]
fn labels_are_unique_within_each_plane() {
    let mut rng = StdRng::seed_from_u64(11);
    let planes: Vec<Plane> = (0..8)
        .map(|_| {
            Plane::new(
                (0..6)
                    .map(|_| {
                        let c = [rng.gen_range(0.0..80.0), rng.gen_range(0.0..80.0)];
                        cell_at(c, 2, 5.0)
                    })
                    .collect(),
            )
        })
        .collect();

    let (volume, _) = Volume::segment(planes, SegmentationConfig::default());
    for z in 0..volume.n_planes() {
        let labels = volume.labels(z).unwrap_or_default();
        let unique: HashSet<Label> = labels.iter().copied().collect();
        assert_eq!(unique.len(), labels.len(), "duplicate label on plane {}", z);
    }
}

#[test]
fn representative_has_maximal_weight() {
    let (volume, _) = Volume::segment(
        column([30.0, 20.0], &MERGED_DIP),
        SegmentationConfig::default(),
    );
    for cell in volume.cells_3d() {
        let track = volume
            .label_tracks()
            .into_iter()
            .find(|t| t.label == cell.label)
            .expect("every 3D cell has a label-track");
        for c in track.cells(volume.planes()) {
            assert!(cell.weight >= c.intensity());
        }
    }
}

#[test]
fn failed_deletes_leave_volume_untouched() {
    let (mut volume, _) = Volume::segment(
        column([30.0, 20.0], &MERGED_DIP),
        SegmentationConfig::default(),
    );
    let before = volume.n_cells();

    assert_eq!(
        volume.delete_cell(7, 0),
        Err(EditError::UnknownLabel {
            label: 7,
            z: Some(0)
        })
    );
    assert_eq!(
        volume.delete_cell(0, 40),
        Err(EditError::PlaneOutOfRange {
            z: 40,
            n_planes: 12
        })
    );
    assert_eq!(
        volume.delete_label(9),
        Err(EditError::UnknownLabel { label: 9, z: None })
    );
    assert_eq!(volume.n_cells(), before);
}

#[test]
fn delete_label_drops_every_occurrence() {
    let (mut volume, _) = Volume::segment(
        column([30.0, 20.0], &MERGED_DIP),
        SegmentationConfig::default(),
    );
    assert_eq!(volume.delete_label(1), Ok(6));
    assert_eq!(volume.cells_3d().len(), 1);
    assert_eq!(volume.cells_3d()[0].label, 0);
}

#[test]
fn delete_cell_relabels_the_volume() {
    let planes = scatter(&[
        &[[10.0, 10.0]],
        &[[10.0, 10.0]],
        &[[10.0, 10.0]],
    ]);
    let (mut volume, _) = Volume::segment(planes, SegmentationConfig::default());
    volume.delete_cell(0, 1).expect("label 0 is on plane 1");

    // The gap breaks the chain, so plane 2 starts a new label.
    assert_eq!(volume.labels(2), Some(vec![1]));
    assert_eq!(volume.cells_3d().len(), 2);
}

#[test]
fn combine_folds_larger_label_into_smaller() {
    let (mut volume, _) = Volume::segment(
        column([30.0, 20.0], &MERGED_DIP),
        SegmentationConfig::default(),
    );
    assert_eq!(volume.combine_labels(1, 0), Ok(0));
    assert_eq!(volume.labels(8), Some(vec![0]));
    assert_eq!(volume.cells_3d().len(), 1);
    // Equal weights at z=2 and z=8: the lower plane wins.
    assert_eq!(volume.cells_3d()[0].position[0], 2.0);
}

#[test]
fn combine_rejects_labels_sharing_a_plane() {
    let planes = scatter(&[
        &[[10.0, 10.0], [60.0, 60.0]],
        &[[10.0, 10.0], [60.0, 60.0]],
    ]);
    let (mut volume, _) = Volume::segment(planes, SegmentationConfig::default());
    assert_eq!(
        volume.combine_labels(0, 1),
        Err(EditError::LabelCollision {
            label_a: 0,
            label_b: 1,
            z: 0
        })
    );
    assert_eq!(volume.cells_3d().len(), 2);
}

#[test]
fn inserted_cell_gets_a_fresh_label() {
    let planes = scatter(&[&[[10.0, 10.0]], &[[10.0, 10.0]]]);
    let (mut volume, _) = Volume::segment(planes, SegmentationConfig::default());
    let image = GrayImage::from_pixel(128, 128, Luma([10]));

    let mut points = square_points(56, 56, 8);
    points.shuffle(&mut StdRng::seed_from_u64(3));
    let label = volume
        .insert_cell(&points, 1, &image)
        .expect("square outline is well formed");

    assert_eq!(label, 1);
    let cell = &volume.planes()[1].cells()[1];
    assert_eq!(cell.mask().len(), 81);
    assert!((cell.centroid()[0] - 60.0).abs() < 1e-9);
    assert!(cell.outline().len() >= volume.config().min_outline_length);
}

#[test]
fn inserted_cell_continues_the_label_above_it() {
    let planes = scatter(&[
        &[[10.0, 10.0], [60.0, 60.0]],
        &[[10.0, 10.0], [60.0, 60.0]],
        &[[10.0, 10.0]],
    ]);
    let (mut volume, _) = Volume::segment(planes, SegmentationConfig::default());
    assert_eq!(volume.labels(2), Some(vec![0]));
    let image = GrayImage::from_pixel(128, 128, Luma([10]));

    let label = volume
        .insert_cell(&square_points(56, 56, 8), 2, &image)
        .expect("square outline is well formed");

    assert_eq!(label, 1);
    assert_eq!(volume.labels(2), Some(vec![0, 1]));
    assert_eq!(volume.cells_3d().len(), 2);
}

#[test]
fn insert_with_too_few_points_fails() {
    let planes = scatter(&[&[[10.0, 10.0]], &[[10.0, 10.0]]]);
    let (mut volume, _) = Volume::segment(planes, SegmentationConfig::default());
    let image = GrayImage::new(32, 32);

    let err = volume
        .insert_cell(&[[1, 1], [2, 2]], 0, &image)
        .unwrap_err();
    assert_eq!(
        err,
        EditError::Outline(OutlineError::TooFewPoints { needed: 3, got: 2 })
    );
    assert_eq!(volume.n_cells(), 2);
}
