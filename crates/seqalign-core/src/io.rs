//! Seams between the pipeline and concrete image formats.

use crate::error::Result;
use crate::image::Image;
use burn::tensor::backend::Backend;
use std::path::Path;

/// Loads a 3D volume from a path into `f32` voxels on `device`.
///
/// Failures are reported as [`CoreError::Load`](crate::error::CoreError::Load)
/// so batch callers can skip the volume and carry on.
pub trait VolumeReader<B: Backend> {
    fn read(&self, path: &Path, device: &B::Device) -> Result<Image<B, 3>>;
}

/// Persists a 3D volume; failures are [`CoreError::Write`](crate::error::CoreError::Write).
pub trait VolumeWriter<B: Backend> {
    fn write(&self, image: &Image<B, 3>, path: &Path) -> Result<()>;
}

impl<B: Backend, R: VolumeReader<B> + ?Sized> VolumeReader<B> for &R {
    fn read(&self, path: &Path, device: &B::Device) -> Result<Image<B, 3>> {
        (**self).read(path, device)
    }
}

impl<B: Backend, W: VolumeWriter<B> + ?Sized> VolumeWriter<B> for &W {
    fn write(&self, image: &Image<B, 3>, path: &Path) -> Result<()> {
        (**self).write(image, path)
    }
}
