// SPDX-License-Identifier: GPL-3.0-only

use std::time::{Duration, Instant};

const THROUGHPUT_ALPHA: f64 = 0.2;

pub fn ewma_update(previous: Option<f64>, sample: f64, alpha: f64) -> f64 {
    let alpha = alpha.clamp(0.0, 1.0);
    match previous {
        Some(prev) => alpha * sample + (1.0 - alpha) * prev,
        None => sample,
    }
}

pub fn format_duration(duration: Option<Duration>) -> String {
    let Some(duration) = duration else {
        return "--:--:--".to_string();
    };

    let total_secs = duration.as_secs();
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;

    format!("{hours:02}:{minutes:02}:{seconds:02}")
}

pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 6] = ["B", "KiB", "MiB", "GiB", "TiB", "PiB"];
    let mut unit_index = 0;
    let mut value = bytes as f64;

    while value >= 1024.0 && unit_index < UNITS.len() - 1 {
        value /= 1024.0;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{} {}", bytes, UNITS[unit_index])
    } else {
        format!("{value:.1} {}", UNITS[unit_index])
    }
}

/// Smoothed objects-per-second rate, sampled once per page.
#[derive(Debug)]
pub struct ThroughputMeter {
    started_at: Instant,
    last_sample_at: Instant,
    rate: Option<f64>,
}

impl ThroughputMeter {
    pub fn start() -> Self {
        let now = Instant::now();
        Self {
            started_at: now,
            last_sample_at: now,
            rate: None,
        }
    }

    pub fn record(&mut self, objects: u64) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_sample_at);
        self.last_sample_at = now;

        if elapsed.is_zero() {
            return;
        }

        let sample = objects as f64 / elapsed.as_secs_f64();
        self.rate = Some(ewma_update(self.rate, sample, THROUGHPUT_ALPHA));
    }

    pub fn objects_per_sec(&self) -> f64 {
        self.rate.unwrap_or(0.0)
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{ewma_update, format_bytes, format_duration};

    #[test]
    fn ewma_seeds_with_first_sample() {
        assert_eq!(ewma_update(None, 100.0, 0.2), 100.0);
        assert_eq!(ewma_update(Some(100.0), 200.0, 0.2), 120.0);
    }

    #[test]
    fn formats_durations_and_bytes() {
        assert_eq!(format_duration(None), "--:--:--");
        assert_eq!(format_duration(Some(Duration::from_secs(3_725))), "01:02:05");
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(1536), "1.5 KiB");
    }
}
