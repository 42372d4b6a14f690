//! NIfTI-1 volumes (`.nii`, `.nii.gz`).
//!
//! NIfTI stores geometry in RAS+ world coordinates while images here use the
//! DICOM (LPS+) convention, so the x and y rows of the affine are negated on
//! the way in and on the way out.

use anyhow::{bail, Context, Result};
use burn::tensor::backend::Backend;
use burn::tensor::{Tensor, TensorData};
use nalgebra::{Matrix3, Vector3 as NaVector3};
use ndarray::{Array3, ArrayD, Axis, Ix3};
use nifti::writer::WriterOptions;
use nifti::{IntoNdArray, NiftiHeader, NiftiObject, ReaderOptions};
use seqalign_core::spatial::{Direction, Point, Spacing};
use seqalign_core::Image;
use std::path::Path;

const NIFTI_XFORM_SCANNER_ANAT: i16 = 1;
const NIFTI_UNITS_MM: u8 = 2;

/// Flip between RAS+ and LPS+ for the x and y world axes.
const RAS_TO_LPS: [f64; 3] = [-1.0, -1.0, 1.0];

pub fn read_nifti<B: Backend, P: AsRef<Path>>(path: P, device: &B::Device) -> Result<Image<B, 3>> {
    let path = path.as_ref();
    let obj = ReaderOptions::new().read_file(path).context("Failed to read NIfTI file")?;
    let (origin, spacing, direction) = header_geometry(obj.header());

    let volume = obj
        .into_volume()
        .into_ndarray::<f32>()
        .context("Failed to convert volume to ndarray")?;
    let volume = into_volume3(volume)?;

    // logical [x, y, z] -> [z, y, x], iterated with x fastest
    let (nx, ny, nz) = volume.dim();
    let values: Vec<f32> = volume.permuted_axes([2, 1, 0]).iter().copied().collect();
    let tensor = Tensor::<B, 3>::from_data(TensorData::new(values, [nz, ny, nx]), device);

    Ok(Image::new(tensor, origin, spacing, direction))
}

/// Write an image as NIfTI-1; a `.gz` extension compresses the file.
///
/// The geometry is stored as a scanner-anatomical sform.
pub fn write_nifti<B: Backend, P: AsRef<Path>>(path: P, image: &Image<B, 3>) -> Result<()> {
    let [nz, ny, nx] = image.shape();
    let values = image
        .data()
        .clone()
        .into_data()
        .convert::<f32>()
        .to_vec::<f32>()
        .map_err(|e| anyhow::anyhow!("Failed to get tensor data: {:?}", e))?;

    // [z, y, x] in memory, presented to the writer as logical [x, y, z]
    let array = Array3::from_shape_vec((nz, ny, nx), values)
        .context("Failed to create ndarray")?
        .reversed_axes();

    let header = geometry_header(image);
    WriterOptions::new(path.as_ref())
        .reference_header(&header)
        .write_nifti(&array)
        .context("Failed to write NIfTI file")?;

    Ok(())
}

/// Origin, spacing and direction (LPS+) from a header: sform, then qform, then pixdim.
pub fn header_geometry(header: &NiftiHeader) -> (Point<3>, Spacing<3>, Direction<3>) {
    let affine = if header.sform_code > 0 {
        [header.srow_x, header.srow_y, header.srow_z].map(|row| row.map(f64::from))
    } else if header.qform_code > 0 {
        qform_affine(header)
    } else {
        let p = header.pixdim.map(f64::from);
        [
            [p[1], 0.0, 0.0, 0.0],
            [0.0, p[2], 0.0, 0.0],
            [0.0, 0.0, p[3], 0.0],
        ]
    };

    let mut origin = Point::origin();
    let mut columns = [NaVector3::zeros(); 3];
    for row in 0..3 {
        origin[row] = RAS_TO_LPS[row] * affine[row][3];
        for (col, column) in columns.iter_mut().enumerate() {
            column[row] = RAS_TO_LPS[row] * affine[row][col];
        }
    }

    let mut spacing = Spacing::uniform(1.0);
    let fallback = [NaVector3::x(), NaVector3::y(), NaVector3::z()];
    for (axis, column) in columns.iter_mut().enumerate() {
        let norm = column.norm();
        if norm > 1e-9 {
            spacing[axis] = norm;
            *column /= norm;
        } else {
            *column = fallback[axis];
        }
    }

    (origin, spacing, Direction(Matrix3::from_columns(&columns)))
}

fn qform_affine(header: &NiftiHeader) -> [[f64; 4]; 3] {
    let b = header.quatern_b as f64;
    let c = header.quatern_c as f64;
    let d = header.quatern_d as f64;
    let a = (1.0 - (b * b + c * c + d * d).min(1.0)).sqrt();
    let qfac = if header.pixdim[0] < 0.0 { -1.0 } else { 1.0 };

    let dx = header.pixdim[1] as f64;
    let dy = header.pixdim[2] as f64;
    let dz = header.pixdim[3] as f64 * qfac;

    [
        [
            (a * a + b * b - c * c - d * d) * dx,
            (2.0 * b * c - 2.0 * a * d) * dy,
            (2.0 * b * d + 2.0 * a * c) * dz,
            header.quatern_x as f64,
        ],
        [
            (2.0 * b * c + 2.0 * a * d) * dx,
            (a * a + c * c - b * b - d * d) * dy,
            (2.0 * c * d - 2.0 * a * b) * dz,
            header.quatern_y as f64,
        ],
        [
            (2.0 * b * d - 2.0 * a * c) * dx,
            (2.0 * c * d + 2.0 * a * b) * dy,
            (a * a + d * d - c * c - b * b) * dz,
            header.quatern_z as f64,
        ],
    ]
}

fn geometry_header<B: Backend>(image: &Image<B, 3>) -> NiftiHeader {
    let origin = image.origin();
    let spacing = image.spacing();
    let direction = image.direction();

    let mut rows = [[0f32; 4]; 3];
    for (row, out) in rows.iter_mut().enumerate() {
        for col in 0..3 {
            out[col] = (RAS_TO_LPS[row] * direction[(row, col)] * spacing[col]) as f32;
        }
        out[3] = (RAS_TO_LPS[row] * origin[row]) as f32;
    }

    let mut header = NiftiHeader::default();
    header.pixdim = [1.0, spacing[0] as f32, spacing[1] as f32, spacing[2] as f32, 1.0, 1.0, 1.0, 1.0];
    header.sform_code = NIFTI_XFORM_SCANNER_ANAT;
    header.qform_code = 0;
    header.srow_x = rows[0];
    header.srow_y = rows[1];
    header.srow_z = rows[2];
    header.xyzt_units = NIFTI_UNITS_MM;
    header
}

/// Reduce a decoded volume to exactly three axes, dropping trailing singleton axes.
fn into_volume3(mut volume: ArrayD<f32>) -> Result<ndarray::Array3<f32>> {
    while volume.ndim() > 3 {
        let last = volume.ndim() - 1;
        if volume.shape()[last] != 1 {
            bail!("Expected a 3D NIfTI volume, found shape {:?}", volume.shape());
        }
        volume = volume.index_axis_move(Axis(last), 0);
    }
    while volume.ndim() < 3 {
        let next = volume.ndim();
        volume = volume.insert_axis(Axis(next));
    }
    volume
        .into_dimensionality::<Ix3>()
        .context("Failed to view NIfTI volume as 3D")
}
