use std::time::Duration;

use log::debug;

pub const DEFAULT_HAPTIC_PULSE: Duration = Duration::from_millis(100);

/// Device vibration after an accepted scan. Calls are fire-and-forget:
/// implementations must not block and have no way to report failure.
pub trait HapticFeedback: Send + Sync {
    fn pulse(&self, duration: Duration);
}

/// For devices without a vibration motor.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoHaptics;

impl HapticFeedback for NoHaptics {
    fn pulse(&self, _duration: Duration) {}
}

/// Terminal stand-in: logs the pulse instead of vibrating.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogHaptics;

impl HapticFeedback for LogHaptics {
    fn pulse(&self, duration: Duration) {
        debug!("haptic pulse {}ms", duration.as_millis());
    }
}

impl<F> HapticFeedback for F
where
    F: Fn(Duration) + Send + Sync,
{
    fn pulse(&self, duration: Duration) {
        self(duration)
    }
}
