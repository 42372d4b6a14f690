//! Reference scan selection and rigid mutual-information registration.
//!
//! A study's sequences are described with [`ScanDescriptor`], the deepest
//! axial one becomes the reference, and every other sequence is aligned onto
//! it with [`ImageRegistrationMethod`].

pub mod capability;
pub mod error;
pub mod initializer;
pub mod method;
pub mod metric;
pub mod multires;
pub mod optimizer;
pub mod progress;
pub mod reference;
pub mod validation;

pub use capability::RegisterOnto;
pub use error::{RegistrationError, Result};
pub use initializer::CenteredTransformInitializer;
pub use method::{ImageRegistrationMethod, RegistrationConfig, RegistrationContext, RegistrationResult};
pub use metric::{MattesMutualInformation, Metric, SamplingStrategy};
pub use multires::{MultiResolutionRegistration, RegistrationSchedule};
pub use optimizer::{
    GradientDescentOptimizer, LearningRateEstimation, LevelReport, ScalesMode, StepRelaxation, StopCondition,
};
pub use progress::{ConsoleProgressCallback, DivergenceMonitor, HistoryCallback, ProgressCallback, ProgressInfo, ProgressTracker};
pub use reference::{
    describe_scan, read_scans_and_find_reference, resample_to_isotropic, select_reference_index, ReferenceSelection,
    ScanDescriptor, ScanGeometry, AXIAL_ORIENTATION_THRESHOLD,
};
pub use validation::ConvergenceChecker;
