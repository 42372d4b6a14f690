//! Scan descriptors and reference scan selection.
//!
//! Every sequence of a study is loaded once and summarized by its depth (the
//! smallest voxel count over the three axes) and its orientation (the diagonal
//! of the direction matrix). The reference is the deepest axial scan; all
//! other sequences are later registered onto it.

use crate::error::{RegistrationError, Result};
use burn::tensor::backend::Backend;
use seqalign_core::filter::resample_to_spacing;
use seqalign_core::spatial::Spacing;
use seqalign_core::{Image, VolumeReader};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Orientation components a scan must all exceed to count as axial.
pub const AXIAL_ORIENTATION_THRESHOLD: f64 = 0.9;

/// Depth and orientation of a loaded volume.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScanGeometry {
    /// Smallest of the three voxel counts.
    pub depth: usize,
    /// Diagonal of the direction matrix, `(x, y, z)`.
    pub orientation: [f64; 3],
}

impl ScanGeometry {
    pub fn new(depth: usize, orientation: [f64; 3]) -> Self {
        Self { depth, orientation }
    }

    pub fn of<B: Backend>(image: &Image<B, 3>) -> Self {
        Self {
            depth: image.size().into_iter().min().unwrap_or(0),
            orientation: image.direction().diagonal(),
        }
    }

    /// All three orientation components strictly above `threshold`.
    pub fn is_axial(&self, threshold: f64) -> bool {
        self.orientation.iter().all(|&c| c > threshold)
    }
}

/// A loaded scan together with where it came from and its geometry summary.
#[derive(Debug, Clone)]
pub struct ScanDescriptor<B: Backend> {
    path: PathBuf,
    geometry: ScanGeometry,
    volume: Image<B, 3>,
}

impl<B: Backend> ScanDescriptor<B> {
    pub fn new(path: impl Into<PathBuf>, volume: Image<B, 3>) -> Self {
        Self {
            path: path.into(),
            geometry: ScanGeometry::of(&volume),
            volume,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn geometry(&self) -> &ScanGeometry {
        &self.geometry
    }

    pub fn depth(&self) -> usize {
        self.geometry.depth
    }

    pub fn orientation(&self) -> [f64; 3] {
        self.geometry.orientation
    }

    pub fn volume(&self) -> &Image<B, 3> {
        &self.volume
    }

    pub fn into_volume(self) -> Image<B, 3> {
        self.volume
    }

    /// Same path and geometry summary, different voxels.
    pub fn with_volume(self, volume: Image<B, 3>) -> Self {
        Self { volume, ..self }
    }
}

/// Settings of reference selection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReferenceSelection {
    pub axial_threshold: f64,
    /// Spacing the chosen reference is resampled to, `(x, y, z)`.
    pub isotropic_spacing: [f64; 3],
}

impl Default for ReferenceSelection {
    fn default() -> Self {
        Self {
            axial_threshold: AXIAL_ORIENTATION_THRESHOLD,
            isotropic_spacing: [1.0, 1.0, 1.0],
        }
    }
}

impl ReferenceSelection {
    pub fn with_axial_threshold(mut self, threshold: f64) -> Self {
        self.axial_threshold = threshold;
        self
    }

    pub fn with_isotropic_spacing(mut self, spacing: [f64; 3]) -> Self {
        self.isotropic_spacing = spacing;
        self
    }
}

/// Load `path` and summarize it; `None` when the volume cannot be read.
pub fn describe_scan<B, R>(reader: &R, path: &Path, device: &B::Device) -> Option<ScanDescriptor<B>>
where
    B: Backend,
    R: VolumeReader<B> + ?Sized,
{
    match reader.read(path, device) {
        Ok(volume) => {
            let descriptor = ScanDescriptor::new(path, volume);
            tracing::debug!(
                path = %path.display(),
                depth = descriptor.depth(),
                orientation = ?descriptor.orientation(),
                "scan loaded"
            );
            Some(descriptor)
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "skipping unreadable scan");
            None
        }
    }
}

/// Index of the deepest axial scan, or 0 when no scan is axial.
///
/// Scans are visited in order and only a strictly deeper axial scan replaces
/// the current choice, so ties keep the earliest one.
pub fn select_reference_index<'a>(geometries: impl IntoIterator<Item = &'a ScanGeometry>, threshold: f64) -> usize {
    let mut best = 0;
    let mut best_depth = 0;
    for (i, geometry) in geometries.into_iter().enumerate() {
        if geometry.is_axial(threshold) && geometry.depth > best_depth {
            best = i;
            best_depth = geometry.depth;
        }
    }
    best
}

/// Replace the descriptor's volume with a copy resampled to `spacing`, covering
/// the same physical extent from the same origin.
pub fn resample_to_isotropic<B: Backend>(descriptor: ScanDescriptor<B>, spacing: [f64; 3]) -> Result<ScanDescriptor<B>> {
    let resampled = resample_to_spacing(descriptor.volume(), Spacing::new(spacing))?;
    tracing::debug!(
        path = %descriptor.path().display(),
        from = ?descriptor.volume().size(),
        to = ?resampled.size(),
        "resampled reference"
    );
    Ok(descriptor.with_volume(resampled))
}

/// Load every path, pick the reference and resample it to isotropic spacing.
///
/// Unreadable paths are dropped, so indices refer to the returned descriptors
/// rather than to `paths`.
pub fn read_scans_and_find_reference<B, R, P>(
    reader: &R,
    paths: &[P],
    device: &B::Device,
    selection: &ReferenceSelection,
) -> Result<(Vec<ScanDescriptor<B>>, usize)>
where
    B: Backend,
    R: VolumeReader<B> + ?Sized,
    P: AsRef<Path>,
{
    let mut scans: Vec<ScanDescriptor<B>> = paths
        .iter()
        .filter_map(|path| describe_scan(reader, path.as_ref(), device))
        .collect();
    if scans.is_empty() {
        return Err(RegistrationError::EmptyBatch(paths.len()));
    }

    let index = select_reference_index(scans.iter().map(ScanDescriptor::geometry), selection.axial_threshold);
    let reference = scans.remove(index);
    tracing::info!(
        path = %reference.path().display(),
        depth = reference.depth(),
        "selected reference scan {} of {}",
        index + 1,
        scans.len() + 1
    );
    scans.insert(index, resample_to_isotropic(reference, selection.isotropic_spacing)?);

    Ok((scans, index))
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::tensor::Tensor;
    use burn_ndarray::NdArray;
    use seqalign_core::spatial::{Direction, Point};
    use seqalign_core::{CoreError, ImageGrid};

    type B = NdArray<f32>;

    fn volume(size: [usize; 3], spacing: [f64; 3]) -> Image<B, 3> {
        let grid = ImageGrid::new(size, Point::origin(), Spacing::new(spacing), Direction::identity());
        Image::from_grid(Tensor::zeros(grid.shape(), &Default::default()), &grid).unwrap()
    }

    struct FakeReader;

    impl VolumeReader<B> for FakeReader {
        fn read(&self, path: &Path, _device: &<B as Backend>::Device) -> seqalign_core::Result<Image<B, 3>> {
            match path.to_str() {
                Some("thin") => Ok(volume([8, 8, 4], [1.0, 1.0, 2.0])),
                Some("thick") => Ok(volume([8, 8, 6], [1.0, 1.0, 2.0])),
                _ => Err(CoreError::load(path, "no such series")),
            }
        }
    }

    #[test]
    fn test_geometry_of_volume() {
        let geometry = ScanGeometry::of(&volume([10, 12, 5], [1.0; 3]));
        assert_eq!(geometry.depth, 5);
        assert_eq!(geometry.orientation, [1.0, 1.0, 1.0]);
        assert!(geometry.is_axial(AXIAL_ORIENTATION_THRESHOLD));
    }

    #[test]
    fn test_threshold_is_strict() {
        let geometry = ScanGeometry::new(10, [0.9, 0.95, 0.95]);
        assert!(!geometry.is_axial(0.9));
    }

    #[test]
    fn test_ties_keep_first() {
        let scans = [ScanGeometry::new(50, [1.0; 3]), ScanGeometry::new(50, [1.0; 3])];
        assert_eq!(select_reference_index(&scans, 0.9), 0);
    }

    #[test]
    fn test_empty_batch_selects_zero() {
        assert_eq!(select_reference_index(&[], 0.9), 0);
    }

    #[test]
    fn test_isotropic_resample_covers_extent() {
        let descriptor = ScanDescriptor::new("scan", volume([100, 100, 50], [1.0, 1.0, 2.0]));
        let resampled = resample_to_isotropic(descriptor, [1.0; 3]).unwrap();
        let size = resampled.volume().size();
        assert_eq!(size[0], 100);
        assert_eq!(size[1], 100);
        assert!((99..=101).contains(&size[2]));
        assert_eq!(resampled.depth(), 50);
        assert_eq!(resampled.path(), Path::new("scan"));
    }

    #[test]
    fn test_read_skips_unreadable_and_resamples_reference() {
        let paths = ["missing", "thin", "thick"];
        let (scans, index) =
            read_scans_and_find_reference::<B, _, _>(&FakeReader, &paths, &Default::default(), &ReferenceSelection::default()).unwrap();
        assert_eq!(scans.len(), 2);
        assert_eq!(index, 1);
        assert_eq!(scans[index].path(), Path::new("thick"));
        assert_eq!(scans[index].volume().size(), [8, 8, 12]);
        assert_eq!(scans[0].volume().size(), [8, 8, 4]);
    }

    #[test]
    fn test_read_fails_when_nothing_loads() {
        let err = read_scans_and_find_reference::<B, _, _>(&FakeReader, &["a", "b"], &Default::default(), &ReferenceSelection::default())
            .unwrap_err();
        assert!(matches!(err, RegistrationError::EmptyBatch(2)));
    }
}
