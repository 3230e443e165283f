use std::fmt;
use std::time::{Duration, Instant};

/// Single wall-clock measurement of one labelled operation.
#[derive(Debug, Clone)]
pub struct Timing {
    pub label: String,
    pub elapsed: Duration,
}

impl fmt::Display for Timing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {:.3}ms", self.label, self.elapsed.as_secs_f64() * 1000.0)
    }
}

/// Run `op` once and measure it. The result is returned untouched, errors
/// included, so the caller decides what a failure means.
pub fn timed<T>(label: impl Into<String>, op: impl FnOnce() -> T) -> (T, Timing) {
    let start = Instant::now();
    let out = op();
    let elapsed = start.elapsed();
    (out, Timing { label: label.into(), elapsed })
}
