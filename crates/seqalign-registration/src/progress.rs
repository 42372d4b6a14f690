//! Progress tracking and diagnostics callbacks for registration runs.
//!
//! Registration never stops on its own when the metric misbehaves; callers
//! attach a [`ProgressCallback`] to watch every iteration and decide for
//! themselves. [`DivergenceMonitor`] is the ready-made detector.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Progress information for one optimizer iteration.
#[derive(Debug, Clone)]
pub struct ProgressInfo {
    /// Pyramid level, 0 being the coarsest.
    pub level: usize,
    /// Current iteration number within the level.
    pub iteration: usize,
    /// Iteration budget of the level.
    pub total_iterations: Option<usize>,
    /// Metric value at the current parameters.
    pub metric_value: f64,
    /// Time elapsed since the run started.
    pub elapsed: Duration,
    /// Estimated remaining time of the level.
    pub estimated_remaining: Option<Duration>,
    /// Learning rate in effect.
    pub learning_rate: f64,
    /// Transform parameters the metric was evaluated at.
    pub parameters: Vec<f64>,
}

impl ProgressInfo {
    pub fn new(
        level: usize,
        iteration: usize,
        total_iterations: Option<usize>,
        metric_value: f64,
        elapsed: Duration,
        learning_rate: f64,
    ) -> Self {
        Self {
            level,
            iteration,
            total_iterations,
            metric_value,
            elapsed,
            estimated_remaining: None,
            learning_rate,
            parameters: Vec::new(),
        }
    }

    pub fn with_parameters(mut self, parameters: Vec<f64>) -> Self {
        self.parameters = parameters;
        self
    }

    /// Calculate progress percentage.
    pub fn progress_percent(&self) -> Option<f64> {
        self.total_iterations
            .filter(|&total| total > 0)
            .map(|total| (self.iteration as f64 / total as f64) * 100.0)
    }

    /// Calculate estimated remaining time.
    pub fn calculate_remaining(&mut self) {
        if let Some(total) = self.total_iterations {
            if self.iteration > 0 {
                let avg_time_per_iter = self.elapsed.as_secs_f64() / self.iteration as f64;
                let remaining_iters = total.saturating_sub(self.iteration);
                self.estimated_remaining = Some(Duration::from_secs_f64(avg_time_per_iter * remaining_iters as f64));
            }
        }
    }
}

/// Progress callback trait for monitoring registration progress.
pub trait ProgressCallback: Send + Sync {
    /// Called at each iteration with progress information.
    fn on_progress(&self, info: &ProgressInfo);

    /// Called when registration starts.
    fn on_start(&self) {}

    /// Called when registration completes successfully.
    fn on_complete(&self, _info: &ProgressInfo) {}

    /// Called when registration fails.
    fn on_error(&self, _error: &str) {}
}

/// Console progress callback that logs to tracing.
#[derive(Debug, Clone)]
pub struct ConsoleProgressCallback {
    /// Log interval (iterations).
    pub log_interval: usize,
}

impl Default for ConsoleProgressCallback {
    fn default() -> Self {
        Self { log_interval: 10 }
    }
}

impl ConsoleProgressCallback {
    pub fn new(log_interval: usize) -> Self {
        Self {
            log_interval: log_interval.max(1),
        }
    }
}

impl ProgressCallback for ConsoleProgressCallback {
    fn on_progress(&self, info: &ProgressInfo) {
        if info.iteration % self.log_interval == 0 || info.total_iterations == Some(info.iteration + 1) {
            let remaining = info
                .estimated_remaining
                .map(|d| format!("{:.2}s", d.as_secs_f64()))
                .unwrap_or_else(|| "N/A".to_string());

            tracing::info!(
                "Level {} iter {}/{} ({:.1}%) | Metric: {:.6} | LR: {:.2e} | Elapsed: {:.2}s | ETA: {}",
                info.level,
                info.iteration,
                info.total_iterations.map(|n| n.to_string()).unwrap_or_else(|| "?".to_string()),
                info.progress_percent().unwrap_or(0.0),
                info.metric_value,
                info.learning_rate,
                info.elapsed.as_secs_f64(),
                remaining
            );
        }
    }

    fn on_start(&self) {
        tracing::info!("Registration started");
    }

    fn on_complete(&self, info: &ProgressInfo) {
        tracing::info!(
            "Registration completed in {:.2}s with final metric: {:.6}",
            info.elapsed.as_secs_f64(),
            info.metric_value
        );
    }

    fn on_error(&self, error: &str) {
        tracing::error!("Registration failed: {}", error);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// History callback that records all progress information.
#[derive(Debug, Clone, Default)]
pub struct HistoryCallback {
    history: Arc<Mutex<Vec<ProgressInfo>>>,
}

impl HistoryCallback {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the recorded history.
    pub fn get_history(&self) -> Vec<ProgressInfo> {
        lock(&self.history).clone()
    }

    /// Metric values of one pyramid level, in iteration order.
    pub fn metric_values(&self, level: usize) -> Vec<f64> {
        lock(&self.history)
            .iter()
            .filter(|info| info.level == level)
            .map(|info| info.metric_value)
            .collect()
    }

    /// Clear the history.
    pub fn clear(&self) {
        lock(&self.history).clear();
    }
}

impl ProgressCallback for HistoryCallback {
    fn on_progress(&self, info: &ProgressInfo) {
        lock(&self.history).push(info.clone());
    }
}

#[derive(Debug, Default)]
struct DivergenceState {
    level: Option<usize>,
    best: Option<f64>,
    rising: usize,
    non_finite: bool,
    failed: bool,
}

/// Flags a run whose metric turns non-finite or keeps rising.
///
/// The metric is minimized, so `patience` consecutive iterations above the
/// best value of the level (by more than `tolerance`) count as divergence.
/// The counter restarts at every pyramid level.
#[derive(Debug, Clone)]
pub struct DivergenceMonitor {
    pub patience: usize,
    pub tolerance: f64,
    state: Arc<Mutex<DivergenceState>>,
}

impl Default for DivergenceMonitor {
    fn default() -> Self {
        Self::new(20, 1e-4)
    }
}

impl DivergenceMonitor {
    pub fn new(patience: usize, tolerance: f64) -> Self {
        Self {
            patience: patience.max(1),
            tolerance,
            state: Arc::new(Mutex::new(DivergenceState::default())),
        }
    }

    pub fn is_diverging(&self) -> bool {
        let state = lock(&self.state);
        state.non_finite || state.failed || state.rising >= self.patience
    }

    /// True once a non-finite metric value was observed.
    pub fn saw_non_finite(&self) -> bool {
        lock(&self.state).non_finite
    }

    pub fn reset(&self) {
        *lock(&self.state) = DivergenceState::default();
    }
}

impl ProgressCallback for DivergenceMonitor {
    fn on_progress(&self, info: &ProgressInfo) {
        let mut state = lock(&self.state);
        if state.level != Some(info.level) {
            state.level = Some(info.level);
            state.best = None;
            state.rising = 0;
        }

        if !info.metric_value.is_finite() {
            if !state.non_finite {
                tracing::warn!(level = info.level, iteration = info.iteration, "metric value is not finite");
            }
            state.non_finite = true;
            return;
        }

        match state.best {
            Some(best) if info.metric_value > best + self.tolerance => {
                state.rising += 1;
                if state.rising == self.patience {
                    tracing::warn!(
                        level = info.level,
                        iteration = info.iteration,
                        best,
                        current = info.metric_value,
                        "metric has not improved for {} iterations",
                        self.patience
                    );
                }
            }
            Some(best) if info.metric_value >= best => {}
            _ => {
                state.best = Some(info.metric_value);
                state.rising = 0;
            }
        }
    }

    fn on_error(&self, _error: &str) {
        lock(&self.state).failed = true;
    }
}

/// Fans iteration reports out to an optional callback and keeps the run clock.
pub struct ProgressTracker<'a> {
    callback: Option<&'a dyn ProgressCallback>,
    start_time: Instant,
}

impl<'a> ProgressTracker<'a> {
    pub fn new(callback: Option<&'a dyn ProgressCallback>) -> Self {
        Self {
            callback,
            start_time: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    pub fn start(&mut self) {
        self.start_time = Instant::now();
        if let Some(callback) = self.callback {
            callback.on_start();
        }
    }

    pub fn update(&self, mut info: ProgressInfo) {
        info.elapsed = self.elapsed();
        info.calculate_remaining();
        tracing::debug!(
            level = info.level,
            iteration = info.iteration,
            metric = info.metric_value,
            learning_rate = info.learning_rate,
            "registration iteration"
        );
        if let Some(callback) = self.callback {
            callback.on_progress(&info);
        }
    }

    pub fn complete(&self, level: usize, final_value: f64, learning_rate: f64) {
        if let Some(callback) = self.callback {
            let info = ProgressInfo::new(level, 0, None, final_value, self.elapsed(), learning_rate);
            callback.on_complete(&info);
        }
    }

    pub fn error(&self, error: &str) {
        if let Some(callback) = self.callback {
            callback.on_error(error);
        }
    }
}
