//! Path-kind dispatch between the DICOM and NIfTI readers.

use crate::dicom_io::{read_dicom_metadata, read_dicom_series};
use crate::metadata::DicomMetadata;
use crate::nifti_io::{read_nifti, write_nifti};
use burn::tensor::backend::Backend;
use seqalign_core::{CoreError, Image, VolumeReader, VolumeWriter};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VolumeFormat {
    DicomDirectory,
    Nifti,
}

impl VolumeFormat {
    /// Directories are DICOM series; `.nii` and `.nii.gz` files are NIfTI.
    pub fn detect(path: &Path) -> Option<Self> {
        if path.is_dir() {
            return Some(VolumeFormat::DicomDirectory);
        }
        let name = path.file_name()?.to_str()?.to_ascii_lowercase();
        (name.ends_with(".nii") || name.ends_with(".nii.gz")).then_some(VolumeFormat::Nifti)
    }
}

/// Reads DICOM directories and NIfTI files; writes NIfTI.
#[derive(Debug, Clone, Copy, Default)]
pub struct VolumeLoader;

impl VolumeLoader {
    pub fn new() -> Self {
        Self
    }

    /// DICOM attributes of the volume at `path`; `None` for formats that carry none.
    pub fn read_metadata(&self, path: &Path) -> Option<DicomMetadata> {
        match VolumeFormat::detect(path)? {
            VolumeFormat::DicomDirectory => match read_dicom_metadata(path) {
                Ok(metadata) => Some(metadata),
                Err(e) => {
                    tracing::debug!(path = %path.display(), error = %e, "no DICOM metadata");
                    None
                }
            },
            VolumeFormat::Nifti => None,
        }
    }
}

impl<B: Backend> VolumeReader<B> for VolumeLoader {
    fn read(&self, path: &Path, device: &B::Device) -> seqalign_core::Result<Image<B, 3>> {
        let result = match VolumeFormat::detect(path) {
            Some(VolumeFormat::DicomDirectory) => read_dicom_series(path, device),
            Some(VolumeFormat::Nifti) => read_nifti(path, device),
            None => Err(anyhow::anyhow!("unrecognised volume format")),
        };
        result.map_err(|e| CoreError::load(path, format!("{:#}", e)))
    }
}

impl<B: Backend> VolumeWriter<B> for VolumeLoader {
    fn write(&self, image: &Image<B, 3>, path: &Path) -> seqalign_core::Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| CoreError::write(path, e))?;
        }
        write_nifti(path, image).map_err(|e| CoreError::write(path, format!("{:#}", e)))
    }
}
