//! Progress reporting and cooperative cancellation.

/// Observer of a long running conversion.
///
/// `is_cancelled` is polled between phases and per material while scanning
/// UVs; once it returns true the conversion stops with
/// [`Error::Cancelled`](crate::error::Error::Cancelled).
pub trait Progress {
    /// `fraction` is in `0.0..=1.0`
    fn report(&mut self, message: &str, fraction: f32);

    fn is_cancelled(&self) -> bool {
        false
    }
}

/// Ignores reports, never cancels.
#[derive(Debug, Default, Copy, Clone)]
pub struct NoProgress;

impl Progress for NoProgress {
    fn report(&mut self, _message: &str, _fraction: f32) {}
}

/// Forwards reports to the `log` facade at debug level.
#[derive(Debug, Default, Copy, Clone)]
pub struct LogProgress;

impl Progress for LogProgress {
    fn report(&mut self, message: &str, fraction: f32) {
        log::debug!("[{:3.0}%] {}", fraction * 100.0, message);
    }
}
