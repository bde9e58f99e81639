use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::time::{Duration, Instant};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UiMode {
    Auto,
    Plain,
    Pretty,
}

impl UiMode {
    pub fn parse(flag: Option<&str>) -> Self {
        match flag {
            Some("plain") => UiMode::Plain,
            Some("pretty") => UiMode::Pretty,
            _ => UiMode::Auto,
        }
    }
}

/// Terminal feedback for batch scans. Progress goes to stderr so stdout stays
/// clean for JSON output.
#[derive(Clone, Debug)]
pub struct Ui {
    mode: UiMode,
    is_tty: bool,
}

impl Ui {
    pub fn new(mode: UiMode, is_tty: bool) -> Self {
        Self { mode, is_tty }
    }

    fn pretty(&self) -> bool {
        self.is_tty && self.mode != UiMode::Plain
    }

    /// Starts a batch of `total` images.
    pub fn batch(&self, total: usize) -> BatchGuard {
        if self.pretty() {
            let bar = ProgressBar::new(total as u64);
            bar.set_draw_target(ProgressDrawTarget::stderr());
            bar.enable_steady_tick(Duration::from_millis(120));
            let style = ProgressStyle::with_template("{spinner} [{bar:30}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar());
            bar.set_style(style);
            BatchGuard::new(total, Some(bar))
        } else {
            eprintln!("==> scanning {} image(s)", total);
            BatchGuard::new(total, None)
        }
    }
}

pub struct BatchGuard {
    total: usize,
    start: Instant,
    bar: Option<ProgressBar>,
}

impl BatchGuard {
    fn new(total: usize, bar: Option<ProgressBar>) -> Self {
        Self {
            total,
            start: Instant::now(),
            bar,
        }
    }

    /// Records one finished image.
    pub fn image_done(&self, name: &str, method: &str, count: usize) {
        match &self.bar {
            Some(bar) => {
                bar.set_message(format!("{name}: {count} via {method}"));
                bar.inc(1);
            }
            None => eprintln!("  {name}: {count} detection(s) via {method}"),
        }
    }
}

impl Drop for BatchGuard {
    fn drop(&mut self) {
        let message = format!(
            "✔ {} image(s) ({})",
            self.total,
            format_duration(self.start.elapsed())
        );
        if let Some(bar) = &self.bar {
            bar.finish_with_message(message);
        } else {
            eprintln!("{message}");
        }
    }
}

fn format_duration(duration: Duration) -> String {
    if duration.as_secs() >= 1 {
        format!("{:.2}s", duration.as_secs_f64())
    } else {
        format!("{}ms", duration.as_millis())
    }
}
