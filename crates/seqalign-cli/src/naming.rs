//! Output file names.

use seqalign_io::{DicomMetadata, MetadataKey};
use std::path::Path;

pub const FIXED_PREFIX: &str = "F";
pub const MOVING_PREFIX: &str = "M";
pub const AUGMENTED_PREFIX: &str = "A";

/// Final path component without a `.nii` / `.nii.gz` extension.
pub fn scan_name(path: &Path) -> String {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "scan".to_string());
    let lower = name.to_ascii_lowercase();
    for ext in [".nii.gz", ".nii"] {
        if lower.ends_with(ext) && name.len() > ext.len() {
            return name[..name.len() - ext.len()].to_string();
        }
    }
    name
}

/// `F_<name>.nii.gz` for the reference, `M_<name>.nii.gz` otherwise.
pub fn conversion_name(path: &Path, is_reference: bool) -> String {
    let prefix = if is_reference { FIXED_PREFIX } else { MOVING_PREFIX };
    format!("{prefix}_{}.nii.gz", scan_name(path))
}

/// `{PatientName}_SEQ{moving}->SEQ{fixed}.nii` when both series carry the
/// tags, else the conversion name of the moving scan.
pub fn registration_name(moving_path: &Path, moving: Option<&DicomMetadata>, fixed: Option<&DicomMetadata>) -> String {
    let tagged = moving.zip(fixed).and_then(|(moving, fixed)| {
        let patient = moving.text(MetadataKey::PatientName)?;
        let moving_series = moving.integer(MetadataKey::SeriesNumber)?;
        let fixed_series = fixed.integer(MetadataKey::SeriesNumber)?;
        Some(format!("{patient}_SEQ{moving_series}->SEQ{fixed_series}.nii"))
    });
    tagged.unwrap_or_else(|| conversion_name(moving_path, false))
}

pub fn augmentation_name(path: &Path) -> String {
    format!("{AUGMENTED_PREFIX}_{}.nii.gz", scan_name(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use seqalign_io::MetadataValue;

    fn metadata(patient: Option<&str>, series: i64) -> DicomMetadata {
        let mut metadata = DicomMetadata::new();
        if let Some(patient) = patient {
            metadata.insert(MetadataKey::PatientName, MetadataValue::Text(patient.to_string()));
        }
        metadata.insert(MetadataKey::SeriesNumber, MetadataValue::Integer(series));
        metadata
    }

    #[test]
    fn test_scan_name_strips_nifti_extension() {
        assert_eq!(scan_name(Path::new("/data/p1/11")), "11");
        assert_eq!(scan_name(Path::new("/data/p1/t2.nii.gz")), "t2");
        assert_eq!(scan_name(Path::new("flair.NII")), "flair");
    }

    #[test]
    fn test_conversion_names() {
        assert_eq!(conversion_name(Path::new("p1/8"), true), "F_8.nii.gz");
        assert_eq!(conversion_name(Path::new("p1/11"), false), "M_11.nii.gz");
    }

    #[test]
    fn test_registration_name_from_tags() {
        let moving = metadata(Some("OPBG0001"), 11);
        let fixed = metadata(Some("OPBG0001"), 8);
        assert_eq!(
            registration_name(Path::new("p1/11"), Some(&moving), Some(&fixed)),
            "OPBG0001_SEQ11->SEQ8.nii"
        );
    }

    #[test]
    fn test_registration_name_falls_back() {
        let fixed = metadata(Some("OPBG0001"), 8);
        assert_eq!(registration_name(Path::new("p1/t1.nii"), None, Some(&fixed)), "M_t1.nii.gz");
        let unnamed = metadata(None, 11);
        assert_eq!(registration_name(Path::new("p1/11"), Some(&unnamed), Some(&fixed)), "M_11.nii.gz");
    }
}
