//! Registration as a capability of a scan.

use crate::error::Result;
use crate::method::{ImageRegistrationMethod, RegistrationContext, RegistrationResult};
use crate::reference::ScanDescriptor;
use burn::tensor::backend::AutodiffBackend;
use seqalign_core::Image;

/// Something that can be aligned onto a fixed volume.
pub trait RegisterOnto<B: AutodiffBackend> {
    fn register_onto(
        &self,
        fixed: &Image<B, 3>,
        method: &ImageRegistrationMethod<B>,
        ctx: RegistrationContext<'_>,
    ) -> Result<RegistrationResult<B>>;
}

impl<B: AutodiffBackend> RegisterOnto<B> for ScanDescriptor<B> {
    fn register_onto(
        &self,
        fixed: &Image<B, 3>,
        method: &ImageRegistrationMethod<B>,
        ctx: RegistrationContext<'_>,
    ) -> Result<RegistrationResult<B>> {
        tracing::info!(path = %self.path().display(), "registering scan");
        method.register(self.volume(), fixed, ctx)
    }
}
