use std::sync::{Arc, Mutex};

use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};

struct RegistryInner {
    active: usize,
    display: Option<MultiProgress>,
}

/// Multiplexes concurrent downloads onto one live display. The display is
/// created on the 0 -> 1 transition of the active count and torn down at 0,
/// both under the same lock as the count update.
#[derive(Clone)]
pub struct ProgressRegistry {
    inner: Arc<Mutex<RegistryInner>>,
}

impl ProgressRegistry {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(RegistryInner {
                active: 0,
                display: None,
            })),
        }
    }

    pub fn acquire(&self, description: &str, total: Option<u64>) -> ProgressHandle {
        let mut inner = match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if inner.active == 0 {
            inner.display = Some(MultiProgress::with_draw_target(
                ProgressDrawTarget::stderr(),
            ));
        }
        inner.active += 1;

        let bar = ProgressBar::new(total.unwrap_or(0));
        bar.set_style(bar_style());
        bar.set_prefix(description.to_string());
        let bar = match inner.display.as_ref() {
            Some(display) => display.add(bar),
            None => bar,
        };
        ProgressHandle {
            bar,
            registry: Arc::clone(&self.inner),
        }
    }

    pub fn active_count(&self) -> usize {
        match self.inner.lock() {
            Ok(guard) => guard.active,
            Err(poisoned) => poisoned.into_inner().active,
        }
    }
}

impl Default for ProgressRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn bar_style() -> ProgressStyle {
    ProgressStyle::with_template("{prefix:.blue} {wide_bar} {bytes}/{total_bytes} ({bytes_per_sec})")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("##-")
}

/// Progress slot for one download; dropping it unregisters.
pub struct ProgressHandle {
    bar: ProgressBar,
    registry: Arc<Mutex<RegistryInner>>,
}

impl ProgressHandle {
    pub fn advance(&self, bytes: u64) {
        self.bar.inc(bytes);
    }

    /// Raise the expected total as it becomes known segment by segment.
    pub fn grow_total(&self, bytes: u64) {
        let current = self.bar.length().unwrap_or(0);
        self.bar.set_length(current + bytes);
    }
}

impl Drop for ProgressHandle {
    fn drop(&mut self) {
        self.bar.finish_and_clear();
        let mut inner = match self.registry.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(display) = inner.display.as_ref() {
            display.remove(&self.bar);
        }
        inner.active -= 1;
        if inner.active == 0 {
            inner.display = None;
        }
    }
}
