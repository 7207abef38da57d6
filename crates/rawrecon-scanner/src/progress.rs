//! Transient send-phase progress bar: an `indicatif` bar in place of
//! hand-rolled carriage returns for a `Packet sent: i/n` line.
//!
//! The bar only covers the send loop; the 3-second quiescence window and
//! dissection that follow are reported by the final summary line instead,
//! since there's nothing left to count down against once the last probe
//! is on the wire.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

/// Wraps an `indicatif` bar that tracks probes sent out of a known total.
/// Hidden entirely when `total` is zero so an empty port list never draws
/// a bar with nothing to fill.
pub struct SendProgress {
    bar: ProgressBar,
}

impl SendProgress {
    pub fn new(total: u64) -> Self {
        let bar = if total == 0 {
            ProgressBar::hidden()
        } else {
            let pb = ProgressBar::new(total);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("{prefix} [{bar:30.cyan/blue}] {pos}/{len}")
                    .expect("valid template")
                    .progress_chars("=>-"),
            );
            pb.set_draw_target(ProgressDrawTarget::stderr());
            pb.set_prefix("Packet sent:");
            pb
        };
        Self { bar }
    }

    pub fn inc(&self) {
        self.bar.inc(1);
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_total_bar_is_hidden() {
        let progress = SendProgress::new(0);
        assert!(progress.bar.is_hidden());
    }

    #[test]
    fn nonzero_total_bar_reports_length() {
        let progress = SendProgress::new(5);
        assert_eq!(progress.bar.length(), Some(5));
    }
}
