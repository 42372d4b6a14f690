//! Subcommand implementations.

use crate::cli::ScanInput;
use crate::naming::{augmentation_name, conversion_name, registration_name};
use anyhow::{bail, Context, Result};
use burn::backend::Autodiff;
use burn_ndarray::NdArray;
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use seqalign_augment::{apply_morph_augmentation, augment_intensity, IntensityAugmentationRanges, SimilarityRanges};
use seqalign_core::{Image, VolumeReader, VolumeWriter};
use seqalign_io::VolumeLoader;
use seqalign_registration::{
    read_scans_and_find_reference, DivergenceMonitor, ImageRegistrationMethod, ReferenceSelection, RegisterOnto,
    RegistrationConfig, RegistrationContext, ScanDescriptor,
};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Backend for every command; registration needs gradients.
pub type Backend = Autodiff<NdArray<f32>>;

pub fn make_rng(seed: Option<u64>) -> StdRng {
    seed.map_or_else(StdRng::from_entropy, StdRng::seed_from_u64)
}

/// Sequence entries of a patient directory, hidden entries skipped, sorted by name.
pub fn sequence_paths(patient_dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(patient_dir)
        .with_context(|| format!("Failed to list patient directory {}", patient_dir.display()))?;
    let mut paths = Vec::new();
    for entry in entries {
        let entry = entry?;
        if entry.file_name().to_string_lossy().starts_with('.') {
            continue;
        }
        paths.push(entry.path());
    }
    paths.sort();
    Ok(paths)
}

fn load_scans(input: &ScanInput) -> Result<(Vec<ScanDescriptor<Backend>>, usize)> {
    let paths = sequence_paths(&input.patient_dir)?;
    info!("Found {} sequences in {}", paths.len(), input.patient_dir.display());
    let selection = ReferenceSelection::default()
        .with_axial_threshold(input.axial_threshold)
        .with_isotropic_spacing([input.spacing; 3]);
    let device = Default::default();
    read_scans_and_find_reference::<Backend, _, _>(&VolumeLoader::new(), &paths, &device, &selection)
        .with_context(|| format!("No readable sequence in {}", input.patient_dir.display()))
}

fn write_volume(image: &Image<Backend, 3>, path: &Path) -> Result<()> {
    VolumeLoader::new().write(image, path)?;
    info!("Wrote {}", path.display());
    Ok(())
}

pub fn select_reference(input: &ScanInput) -> Result<()> {
    let (scans, index) = load_scans(input)?;
    println!("{}\t{}", index, scans[index].path().display());
    Ok(())
}

pub fn convert(input: &ScanInput, output: &Path) -> Result<()> {
    let (scans, index) = load_scans(input)?;
    for (i, scan) in scans.iter().enumerate() {
        let target = output.join(conversion_name(scan.path(), i == index));
        write_volume(scan.volume(), &target)?;
    }
    Ok(())
}

pub fn load_config(path: Option<&Path>) -> Result<RegistrationConfig> {
    let Some(path) = path else {
        return Ok(RegistrationConfig::default());
    };
    let text = std::fs::read_to_string(path).with_context(|| format!("Failed to read config {}", path.display()))?;
    let config: RegistrationConfig =
        serde_json::from_str(&text).with_context(|| format!("Invalid registration config {}", path.display()))?;
    config.validate()?;
    Ok(config)
}

/// Register every non-reference sequence onto the reference.
///
/// A failed pair is logged and skipped; the command fails at the end if any
/// pair failed.
pub fn register(input: &ScanInput, output: &Path, config: RegistrationConfig, rng: &mut dyn RngCore) -> Result<()> {
    let (scans, index) = load_scans(input)?;
    let loader = VolumeLoader::new();
    let fixed = &scans[index];
    let fixed_metadata = loader.read_metadata(fixed.path());
    write_volume(fixed.volume(), &output.join(conversion_name(fixed.path(), true)))?;

    let method = ImageRegistrationMethod::<Backend>::new(config);
    let mut failures = 0;
    for (i, scan) in scans.iter().enumerate() {
        if i == index {
            continue;
        }
        let monitor = DivergenceMonitor::default();
        let ctx = RegistrationContext::new(&mut *rng).with_callback(&monitor);
        match scan.register_onto(fixed.volume(), &method, ctx) {
            Ok(result) => {
                if monitor.is_diverging() {
                    warn!(path = %scan.path().display(), "metric diverged during registration");
                }
                let name = registration_name(scan.path(), loader.read_metadata(scan.path()).as_ref(), fixed_metadata.as_ref());
                write_volume(&result.resampled, &output.join(name))?;
            }
            Err(e) => {
                warn!(path = %scan.path().display(), error = %e, "registration failed");
                failures += 1;
            }
        }
    }
    if failures > 0 {
        bail!("{} of {} registrations failed", failures, scans.len() - 1);
    }
    Ok(())
}

/// Morph (and optionally intensity) augmentation of a co-registered set.
/// Unreadable volumes are dropped from the set.
pub fn augment(volumes: &[PathBuf], output: &Path, intensity: bool, rng: &mut dyn RngCore) -> Result<()> {
    let loader = VolumeLoader::new();
    let device = Default::default();
    let mut paths = Vec::new();
    let mut images = Vec::new();
    for path in volumes {
        match VolumeReader::<Backend>::read(&loader, path, &device) {
            Ok(image) => {
                paths.push(path);
                images.push(image);
            }
            Err(e) => warn!(path = %path.display(), error = %e, "skipping unreadable volume"),
        }
    }
    if images.is_empty() {
        bail!("None of the {} volumes could be read", volumes.len());
    }

    let mut augmented = apply_morph_augmentation(&images, &SimilarityRanges::default(), rng)?;
    if intensity {
        augmented = augment_intensity(&augmented, &IntensityAugmentationRanges::default(), rng)?;
    }
    for (path, image) in paths.iter().zip(&augmented) {
        write_volume(image, &output.join(augmentation_name(path)))?;
    }
    Ok(())
}
