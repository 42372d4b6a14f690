//! Optimization of transform parameters.
//!
//! Registration drives a [`GradientDescentOptimizer`] level by level. Gradients
//! come from the autodiff backend; [`PhysicalShiftScalesEstimator`] balances
//! rotation against translation parameters, and [`StepRelaxation`] shrinks
//! the step whenever the descent overshoots.

pub mod gradient_descent;
pub mod relaxation;
pub mod scales;

pub use gradient_descent::{GradientDescentOptimizer, LearningRateEstimation, LevelContext, LevelReport, StopCondition};
pub use relaxation::StepRelaxation;
pub use scales::{PhysicalShiftScalesEstimator, ScalesMode};
