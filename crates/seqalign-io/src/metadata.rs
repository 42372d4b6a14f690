//! Typed access to the DICOM attributes the pipeline consumes.
//!
//! Attributes are looked up through a closed set of [`MetadataKey`]s and come
//! back as [`MetadataValue`]s. A missing or unparsable attribute is simply
//! absent from the map, so every fallback a caller applies is explicit.

use dicom::core::Tag;
use dicom::dictionary_std::tags;
use dicom::object::InMemDicomObject;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum MetadataKey {
    PatientName,
    PatientId,
    SeriesNumber,
    SeriesInstanceUid,
    SeriesDescription,
    Modality,
    AcquisitionDate,
    AcquisitionTime,
    PatientWeight,
    Units,
    DecayCorrection,
    CorrectedImage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ValueKind {
    Text,
    Integer,
    Decimal,
    List,
}

impl MetadataKey {
    pub const ALL: [MetadataKey; 12] = [
        MetadataKey::PatientName,
        MetadataKey::PatientId,
        MetadataKey::SeriesNumber,
        MetadataKey::SeriesInstanceUid,
        MetadataKey::SeriesDescription,
        MetadataKey::Modality,
        MetadataKey::AcquisitionDate,
        MetadataKey::AcquisitionTime,
        MetadataKey::PatientWeight,
        MetadataKey::Units,
        MetadataKey::DecayCorrection,
        MetadataKey::CorrectedImage,
    ];

    pub fn tag(self) -> Tag {
        match self {
            MetadataKey::PatientName => tags::PATIENT_NAME,
            MetadataKey::PatientId => tags::PATIENT_ID,
            MetadataKey::SeriesNumber => tags::SERIES_NUMBER,
            MetadataKey::SeriesInstanceUid => tags::SERIES_INSTANCE_UID,
            MetadataKey::SeriesDescription => tags::SERIES_DESCRIPTION,
            MetadataKey::Modality => tags::MODALITY,
            MetadataKey::AcquisitionDate => tags::ACQUISITION_DATE,
            MetadataKey::AcquisitionTime => tags::ACQUISITION_TIME,
            MetadataKey::PatientWeight => tags::PATIENT_WEIGHT,
            MetadataKey::Units => tags::UNITS,
            MetadataKey::DecayCorrection => tags::DECAY_CORRECTION,
            MetadataKey::CorrectedImage => tags::CORRECTED_IMAGE,
        }
    }

    fn kind(self) -> ValueKind {
        match self {
            MetadataKey::SeriesNumber => ValueKind::Integer,
            MetadataKey::PatientWeight => ValueKind::Decimal,
            MetadataKey::CorrectedImage => ValueKind::List,
            _ => ValueKind::Text,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MetadataValue {
    Text(String),
    Integer(i64),
    Decimal(f64),
    List(Vec<String>),
}

impl MetadataValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            MetadataValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            MetadataValue::Integer(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_decimal(&self) -> Option<f64> {
        match self {
            MetadataValue::Decimal(v) => Some(*v),
            MetadataValue::Integer(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            MetadataValue::List(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetadataValue::Text(s) => write!(f, "{}", s),
            MetadataValue::Integer(v) => write!(f, "{}", v),
            MetadataValue::Decimal(v) => write!(f, "{}", v),
            MetadataValue::List(v) => write!(f, "{}", v.join("\\")),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DicomMetadata {
    values: BTreeMap<MetadataKey, MetadataValue>,
}

impl DicomMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Extract every known key that is present and parses as its expected type.
    pub fn from_object(obj: &InMemDicomObject) -> Self {
        let mut metadata = Self::new();
        for key in MetadataKey::ALL {
            if let Some(value) = read_value(obj, key) {
                metadata.insert(key, value);
            }
        }
        metadata
    }

    pub fn get(&self, key: MetadataKey) -> Option<&MetadataValue> {
        self.values.get(&key)
    }

    pub fn insert(&mut self, key: MetadataKey, value: MetadataValue) -> Option<MetadataValue> {
        self.values.insert(key, value)
    }

    pub fn text(&self, key: MetadataKey) -> Option<&str> {
        self.get(key).and_then(MetadataValue::as_text)
    }

    pub fn integer(&self, key: MetadataKey) -> Option<i64> {
        self.get(key).and_then(MetadataValue::as_integer)
    }

    pub fn decimal(&self, key: MetadataKey) -> Option<f64> {
        self.get(key).and_then(MetadataValue::as_decimal)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&MetadataKey, &MetadataValue)> {
        self.values.iter()
    }
}

fn read_value(obj: &InMemDicomObject, key: MetadataKey) -> Option<MetadataValue> {
    let element = obj.element(key.tag()).ok()?;
    match key.kind() {
        ValueKind::Text => {
            let text = element.to_str().ok()?;
            let text = text.trim();
            (!text.is_empty()).then(|| MetadataValue::Text(text.to_string()))
        }
        ValueKind::Integer => element.to_int::<i64>().ok().map(MetadataValue::Integer),
        ValueKind::Decimal => element.to_float64().ok().map(MetadataValue::Decimal),
        ValueKind::List => {
            let items: Vec<String> = element
                .to_multi_str()
                .ok()?
                .iter()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
            (!items.is_empty()).then_some(MetadataValue::List(items))
        }
    }
}
