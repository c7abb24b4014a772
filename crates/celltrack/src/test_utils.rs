//! Shared builders for synthetic cells, planes and volumes in unit tests.

use image::{GrayImage, Luma};

use crate::cell::{CellInstance, Label};
use crate::geometry::{Pixel, PixelMask};

/// Pixels of the digital disk of `radius` around the rounded `center`.
pub(crate) fn disk_pixels(center: [f64; 2], radius: i32) -> Vec<Pixel> {
    let cx = center[0].round() as i32;
    let cy = center[1].round() as i32;
    let mut out = Vec::new();
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            if dx * dx + dy * dy <= radius * radius {
                out.push([cx + dx, cy + dy]);
            }
        }
    }
    out
}

/// Disk pixels that have at least one 4-neighbor outside the disk.
pub(crate) fn disk_outline(center: [f64; 2], radius: i32) -> Vec<Pixel> {
    let mask = PixelMask::from_pixels(disk_pixels(center, radius));
    mask.pixels()
        .iter()
        .copied()
        .filter(|&[x, y]| {
            [[x + 1, y], [x - 1, y], [x, y + 1], [x, y - 1]]
                .iter()
                .any(|&n| !mask.contains(n))
        })
        .collect()
}

/// Disk-shaped cell centred exactly on `center` with a given intensity-sum.
pub(crate) fn cell_with_intensity(center: [f64; 2], radius: i32, intensity: f64) -> CellInstance {
    CellInstance::from_parts(
        disk_outline(center, radius),
        PixelMask::from_pixels(disk_pixels(center, radius)),
        center,
        intensity,
    )
    .expect("disk cells are never degenerate")
}

/// Disk-shaped cell with uniform per-pixel intensity `value`.
pub(crate) fn cell_at(center: [f64; 2], radius: i32, value: f64) -> CellInstance {
    let n = disk_pixels(center, radius).len() as f64;
    cell_with_intensity(center, radius, n * value)
}

pub(crate) fn with_label(mut cell: CellInstance, label: Label) -> CellInstance {
    cell.label = label;
    cell
}

/// Dark image with bright disks `(center, radius, value)` painted on it.
pub(crate) fn disk_image(w: u32, h: u32, disks: &[([f64; 2], i32, u8)]) -> GrayImage {
    let mut img = GrayImage::new(w, h);
    for &(center, radius, value) in disks {
        for [x, y] in disk_pixels(center, radius) {
            if x >= 0 && y >= 0 && (x as u32) < w && (y as u32) < h {
                img.put_pixel(x as u32, y as u32, Luma([value]));
            }
        }
    }
    img
}
