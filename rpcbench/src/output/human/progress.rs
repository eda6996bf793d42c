use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};

/// One bar per run; the bar advances one step per finished attack.
pub(crate) struct HumanProgress {
    inner: Mutex<Inner>,
}

impl HumanProgress {
    pub(crate) fn new() -> Self {
        let multi = MultiProgress::new();
        multi.set_draw_target(ProgressDrawTarget::stderr_with_hz(5));

        Self {
            inner: Mutex::new(Inner {
                multi,
                bars: HashMap::new(),
            }),
        }
    }

    pub(crate) fn attack_started(&self, run: &str, attacks: usize, message: String) {
        let mut inner = self
            .inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let pb = inner.get_or_create_bar(run, attacks as u64);
        pb.set_message(message);
    }

    pub(crate) fn attack_finished(&self, run: &str, attack: usize, attacks: usize) {
        let mut inner = self
            .inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let pb = inner.get_or_create_bar(run, attacks as u64);
        pb.set_position((attack as u64).min(attacks as u64));
    }

    pub(crate) fn run_finished(&self, run: &str, message: String) {
        let inner = self
            .inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if let Some(pb) = inner.bars.get(run) {
            pb.finish_with_message(message);
        }
    }

    pub(crate) fn finish(&self) {
        let mut inner = self
            .inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        for (_, pb) in inner.bars.drain() {
            pb.finish_and_clear();
        }

        let _ = inner.multi.clear();
    }

    #[cfg(test)]
    pub(crate) fn active_bars(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .bars
            .len()
    }
}

struct Inner {
    multi: MultiProgress,
    bars: HashMap<String, ProgressBar>,
}

impl Inner {
    fn get_or_create_bar(&mut self, run: &str, attacks: u64) -> &ProgressBar {
        self.bars.entry(run.to_string()).or_insert_with(|| {
            let pb = self.multi.add(ProgressBar::new(attacks));
            pb.set_style(bar_style());
            pb.set_prefix(run.to_string());
            pb.enable_steady_tick(Duration::from_millis(200));
            pb
        })
    }
}

fn bar_style() -> ProgressStyle {
    ProgressStyle::with_template(
        "{prefix} [ {bar:20.cyan/blue} ] {pos}/{len} attacks {elapsed:>4} {msg}",
    )
    .unwrap_or_else(|_| ProgressStyle::default_bar())
    .progress_chars("█░")
}
