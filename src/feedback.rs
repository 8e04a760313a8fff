use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Cooperative cancellation and progress handle shared with a running request.
///
/// Long loops poll [`Feedback::is_canceled`] at row granularity; cancelling
/// never interrupts a row half way.
#[derive(Debug, Default)]
pub struct Feedback {
    canceled: AtomicBool,
    // f64 bits of the completed fraction
    progress: AtomicU64,
}

impl Feedback {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.canceled.store(true, Ordering::SeqCst);
    }

    pub fn is_canceled(&self) -> bool {
        self.canceled.load(Ordering::SeqCst)
    }

    /// Record the completed fraction, clamped to `[0, 1]`.
    pub fn set_progress(&self, fraction: f64) {
        let fraction = if fraction.is_nan() {
            0.0
        } else {
            fraction.clamp(0.0, 1.0)
        };
        self.progress.store(fraction.to_bits(), Ordering::Relaxed);
    }

    pub fn progress(&self) -> f64 {
        f64::from_bits(self.progress.load(Ordering::Relaxed))
    }
}
