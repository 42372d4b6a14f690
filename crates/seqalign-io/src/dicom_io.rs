use crate::metadata::DicomMetadata;
use anyhow::{anyhow, bail, Context, Result};
use burn::tensor::backend::Backend;
use burn::tensor::{Tensor, TensorData};
use dicom::dictionary_std::tags;
use dicom::object::{open_file, FileDicomObject, InMemDicomObject};
use dicom::pixeldata::{ConvertOptions, ModalityLutOption, PixelDecoder, VoiLutOption};
use nalgebra::{Matrix3, Point3 as NaPoint3, Vector3 as NaVector3};
use rayon::prelude::*;
use seqalign_core::spatial::{Direction, Point, Spacing};
use seqalign_core::Image;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

type DicomFile = FileDicomObject<InMemDicomObject>;

/// A DICOM series discovered in a directory.
#[derive(Debug, Clone)]
pub struct DicomSeriesInfo {
    pub series_instance_uid: String,
    pub series_description: String,
    pub modality: String,
    pub patient_id: String,
    pub file_paths: Vec<PathBuf>,
    /// Typed attributes of the first file of the series.
    pub metadata: DicomMetadata,
}

/// Scan a directory for DICOM series, grouping files by SeriesInstanceUID.
///
/// Headers are parsed in parallel. Files that are not DICOM, or have no
/// SeriesInstanceUID, are skipped. Series come back largest first.
pub fn scan_dicom_directory<P: AsRef<Path>>(path: P) -> Result<Vec<DicomSeriesInfo>> {
    let entries: Vec<PathBuf> = fs::read_dir(path.as_ref())
        .context("Failed to read directory")?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file())
        .collect();

    let headers: Vec<(PathBuf, DicomMetadata)> = entries
        .par_iter()
        .filter_map(|file_path| {
            let obj = open_file(file_path).ok()?;
            Some((file_path.clone(), DicomMetadata::from_object(&obj)))
        })
        .collect();

    let mut series_map = HashMap::<String, DicomSeriesInfo>::new();
    for (file_path, metadata) in headers {
        let Some(uid) = metadata.text(crate::MetadataKey::SeriesInstanceUid).map(str::to_string) else {
            continue;
        };
        let entry = series_map.entry(uid.clone()).or_insert_with(|| DicomSeriesInfo {
            series_instance_uid: uid,
            series_description: metadata
                .text(crate::MetadataKey::SeriesDescription)
                .unwrap_or_default()
                .to_string(),
            modality: metadata.text(crate::MetadataKey::Modality).unwrap_or_default().to_string(),
            patient_id: metadata.text(crate::MetadataKey::PatientId).unwrap_or_default().to_string(),
            file_paths: Vec::new(),
            metadata: metadata.clone(),
        });
        entry.file_paths.push(file_path);
    }

    let mut series_list: Vec<DicomSeriesInfo> = series_map.into_values().collect();
    // load_dicom_series re-sorts spatially; this keeps listings deterministic
    for series in &mut series_list {
        series.file_paths.sort();
    }
    series_list.sort_by(|a, b| {
        b.file_paths
            .len()
            .cmp(&a.file_paths.len())
            .then_with(|| a.series_instance_uid.cmp(&b.series_instance_uid))
    });

    Ok(series_list)
}

/// The series with the most files in `path`.
pub fn largest_series<P: AsRef<Path>>(path: P) -> Result<DicomSeriesInfo> {
    scan_dicom_directory(path)?
        .into_iter()
        .next()
        .ok_or_else(|| anyhow!("No DICOM series found"))
}

/// Load a DICOM series into a 3D image.
///
/// Slices are ordered by their projection on the slice normal, rescale
/// slope/intercept is applied, and the slice spacing must be uniform to 1%.
pub fn load_dicom_series<B: Backend>(series: &DicomSeriesInfo, device: &B::Device) -> Result<Image<B, 3>> {
    if series.file_paths.is_empty() {
        bail!("Series {} has no files", series.series_instance_uid);
    }

    let mut slices: Vec<DicomFile> = series
        .file_paths
        .par_iter()
        .map(|p| open_file(p).context("Failed to open DICOM file"))
        .collect::<Result<Vec<_>>>()?;

    let orientation = get_f64_vec(&slices[0], tags::IMAGE_ORIENTATION_PATIENT)
        .context("Missing ImageOrientationPatient in first slice")?;
    if orientation.len() != 6 {
        bail!("Invalid ImageOrientationPatient length: {}", orientation.len());
    }
    let dir_x = NaVector3::new(orientation[0], orientation[1], orientation[2]).normalize();
    let dir_y = NaVector3::new(orientation[3], orientation[4], orientation[5]).normalize();
    let dir_z = dir_x.cross(&dir_y).normalize();

    let normal_distance = |obj: &DicomFile| get_position(obj).map(|p| p.coords.dot(&dir_z)).unwrap_or(0.0);
    slices.sort_by(|a, b| normal_distance(a).total_cmp(&normal_distance(b)));

    let first = &slices[0];
    let rows = get_u32(first, tags::ROWS).context("Missing Rows")? as usize;
    let cols = get_u32(first, tags::COLUMNS).context("Missing Columns")? as usize;
    let pixel_spacing = get_f64_vec(first, tags::PIXEL_SPACING).context("Missing PixelSpacing")?;
    if pixel_spacing.len() < 2 {
        bail!("Invalid PixelSpacing length: {}", pixel_spacing.len());
    }
    let dy = pixel_spacing[0];
    let dx = pixel_spacing[1];
    let origin_pos = get_position(first).context("Missing ImagePositionPatient")?;

    let dz = if slices.len() > 1 {
        slice_spacing(&slices, &dir_x, &dir_y, &dir_z)?
    } else {
        get_f64(first, tags::SLICE_THICKNESS).unwrap_or(1.0)
    };

    let options = ConvertOptions::new()
        .with_modality_lut(ModalityLutOption::None)
        .with_voi_lut(VoiLutOption::Identity);
    let slice_pixels: Vec<Vec<f32>> = slices
        .par_iter()
        .map(|obj| {
            let pixel_data = obj.decode_pixel_data().context("Failed to decode pixel data")?;
            let slope = get_f64(obj, tags::RESCALE_SLOPE).unwrap_or(1.0) as f32;
            let intercept = get_f64(obj, tags::RESCALE_INTERCEPT).unwrap_or(0.0) as f32;

            let data = pixel_data
                .to_vec_with_options::<f32>(&options)
                .map_err(|e| anyhow!("Pixel data conversion error: {}", e))?;
            if data.len() != rows * cols {
                bail!("Slice data size mismatch: expected {}, got {}", rows * cols, data.len());
            }
            Ok(data.into_iter().map(|v| v * slope + intercept).collect())
        })
        .collect::<Result<Vec<_>>>()?;

    let depth = slice_pixels.len();
    let flattened: Vec<f32> = slice_pixels.into_iter().flatten().collect();
    let tensor = Tensor::<B, 3>::from_data(TensorData::new(flattened, [depth, rows, cols]), device);

    Ok(Image::new(
        tensor,
        Point::new([origin_pos.x, origin_pos.y, origin_pos.z]),
        Spacing::new([dx, dy, dz]),
        Direction(Matrix3::from_columns(&[dir_x, dir_y, dir_z])),
    ))
}

/// Mean distance between consecutive sorted slices along the normal.
fn slice_spacing(slices: &[DicomFile], dir_x: &NaVector3<f64>, dir_y: &NaVector3<f64>, dir_z: &NaVector3<f64>) -> Result<f64> {
    let mut sum = 0.0;
    let mut min_spacing = f64::MAX;
    let mut max_spacing = f64::MIN;

    for pair in slices.windows(2) {
        let p1 = get_position(&pair[0]).context("Missing ImagePositionPatient")?;
        let p2 = get_position(&pair[1]).context("Missing ImagePositionPatient")?;
        let spacing = (p2 - p1).dot(dir_z).abs();
        sum += spacing;
        min_spacing = min_spacing.min(spacing);
        max_spacing = max_spacing.max(spacing);

        if let Some(current) = get_f64_vec(&pair[1], tags::IMAGE_ORIENTATION_PATIENT).filter(|o| o.len() == 6) {
            let cx = NaVector3::new(current[0], current[1], current[2]).normalize();
            let cy = NaVector3::new(current[3], current[4], current[5]).normalize();
            if (cx - dir_x).norm() > 1e-3 || (cy - dir_y).norm() > 1e-3 {
                bail!("Inconsistent ImageOrientationPatient in series");
            }
        }
    }

    let average = sum / (slices.len() - 1) as f64;
    if max_spacing - min_spacing > 0.01 * average {
        bail!(
            "Non-uniform slice spacing detected: min={}, max={}, avg={}",
            min_spacing,
            max_spacing,
            average
        );
    }
    if average <= 0.0 {
        bail!("Slices share the same position along the normal");
    }
    Ok(average)
}

/// Load the largest series found in a directory.
pub fn read_dicom_series<B: Backend, P: AsRef<Path>>(path: P, device: &B::Device) -> Result<Image<B, 3>> {
    let series = largest_series(path)?;
    tracing::debug!(
        uid = %series.series_instance_uid,
        files = series.file_paths.len(),
        "loading DICOM series"
    );
    load_dicom_series(&series, device)
}

/// Typed metadata of the series [`read_dicom_series`] would load.
pub fn read_dicom_metadata<P: AsRef<Path>>(path: P) -> Result<DicomMetadata> {
    Ok(largest_series(path)?.metadata)
}

fn get_u32(obj: &DicomFile, tag: dicom::core::Tag) -> Option<u32> {
    obj.element(tag).ok()?.to_int::<u32>().ok()
}

fn get_f64(obj: &DicomFile, tag: dicom::core::Tag) -> Option<f64> {
    obj.element(tag).ok()?.to_float64().ok()
}

fn get_f64_vec(obj: &DicomFile, tag: dicom::core::Tag) -> Option<Vec<f64>> {
    obj.element(tag).ok()?.to_multi_float64().ok()
}

fn get_position(obj: &DicomFile) -> Option<NaPoint3<f64>> {
    let v = get_f64_vec(obj, tags::IMAGE_POSITION_PATIENT)?;
    (v.len() == 3).then(|| NaPoint3::new(v[0], v[1], v[2]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::NdArray;

    type TestBackend = NdArray<f32>;

    #[test]
    fn test_scan_empty_dir() {
        let temp = tempfile::tempdir().unwrap();
        let series = scan_dicom_directory(temp.path()).unwrap();
        assert!(series.is_empty());
    }

    #[test]
    fn test_non_dicom_files_are_skipped() {
        let temp = tempfile::tempdir().unwrap();
        std::fs::write(temp.path().join("notes.txt"), b"not a dicom file").unwrap();
        assert!(scan_dicom_directory(temp.path()).unwrap().is_empty());
        assert!(read_dicom_series::<TestBackend, _>(temp.path(), &Default::default()).is_err());
    }
}
