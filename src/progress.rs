//! Progress observation.
//!
//! Sorting phases report coarse progress to an injected observer. Observers are purely informational: they never
//! influence what is sorted or in which order.

use std::cell::Cell;

/// Progress observer interface.
pub trait Progress {
    /// Called with the completed fraction of the current phase (`0.0..=1.0`) and the phase label.
    fn update(&self, fraction: f64, label: &str);
}

impl<F> Progress for F
where
    F: Fn(f64, &str),
{
    fn update(&self, fraction: f64, label: &str) {
        self(fraction, label)
    }
}

/// Observer that ignores all updates.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl Progress for NoProgress {
    fn update(&self, _fraction: f64, _label: &str) {}
}

/// Observer logging progress each time it crosses a multiple of `step` percent.
pub struct LogProgress {
    step: u32,
    last: Cell<Option<(u32, String)>>,
}

impl LogProgress {
    /// Creates an observer logging every `step` percent (at least every 1%).
    pub fn new(step: u32) -> Self {
        LogProgress {
            step: step.clamp(1, 100),
            last: Cell::new(None),
        }
    }
}

impl Default for LogProgress {
    fn default() -> Self {
        LogProgress::new(10)
    }
}

impl Progress for LogProgress {
    fn update(&self, fraction: f64, label: &str) {
        let percent = (fraction.clamp(0.0, 1.0) * 100.0) as u32;
        let bucket = percent / self.step * self.step;

        let last = self.last.take();
        let crossed = match &last {
            Some((last_bucket, last_label)) => last_label != label || *last_bucket != bucket,
            None => true,
        };

        if crossed {
            log::info!("{}: {}%", label, bucket);
            self.last.set(Some((bucket, label.to_string())));
        } else {
            self.last.set(last);
        }
    }
}

#[cfg(test)]
mod test {
    use std::cell::RefCell;

    use super::{LogProgress, NoProgress, Progress};

    #[test]
    fn test_closure_observer() {
        let seen = RefCell::new(Vec::new());
        let observer = |fraction: f64, label: &str| seen.borrow_mut().push((fraction, label.to_string()));

        observer.update(0.5, "chunking");
        observer.update(1.0, "chunking");

        assert_eq!(
            seen.into_inner(),
            vec![(0.5, "chunking".to_string()), (1.0, "chunking".to_string())]
        );
    }

    #[test]
    fn test_log_progress_tracks_buckets() {
        let observer = LogProgress::new(25);

        observer.update(0.1, "merging");
        observer.update(0.2, "merging");
        let last = observer.last.take();
        assert_eq!(last, Some((0, "merging".to_string())));
        observer.last.set(last);

        observer.update(0.6, "merging");
        assert_eq!(observer.last.take(), Some((50, "merging".to_string())));

        NoProgress.update(0.3, "ignored");
    }
}
