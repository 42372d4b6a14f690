//! Volume I/O: NIfTI files, DICOM series and typed DICOM metadata.

pub mod dicom_io;
pub mod loader;
pub mod metadata;
pub mod nifti_io;

pub use dicom_io::{load_dicom_series, read_dicom_metadata, read_dicom_series, scan_dicom_directory, DicomSeriesInfo};
pub use loader::{VolumeFormat, VolumeLoader};
pub use metadata::{DicomMetadata, MetadataKey, MetadataValue};
pub use nifti_io::{read_nifti, write_nifti};
