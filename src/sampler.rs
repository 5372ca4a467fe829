use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use chrono::Utc;
use log::warn;

use crate::config::{FullScale, RunConfig};
use crate::driver::{Driver, SampleFrame};
use crate::session::Session;

/// Per-tick loop state, threaded through the run instead of ambient
/// mutable variables. `remaining == None` means run until interrupted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopState {
    remaining: Option<u64>,
    samples: u64,
}

impl LoopState {
    pub fn new(run_for_secs: u64) -> LoopState {
        LoopState {
            remaining: (run_for_secs > 0).then_some(run_for_secs),
            samples: 0,
        }
    }

    /// Records one completed sample and burns one interval off the
    /// remaining run time. Returns false once the run time is exhausted.
    pub fn advance(&mut self, interval_secs: u64) -> bool {
        self.samples += 1;
        match &mut self.remaining {
            None => true,
            Some(remaining) => {
                *remaining = remaining.saturating_sub(interval_secs);
                *remaining > 0
            }
        }
    }

    pub fn samples(&self) -> u64 {
        self.samples
    }
}

/// Converts the raw channel counts of one frame to output values:
/// calibrated 2-decimal voltages when ranges are configured, raw counts
/// otherwise.
pub fn convert(frame: &SampleFrame, scales: Option<&[FullScale; 4]>) -> [String; 4] {
    std::array::from_fn(|i| match scales {
        Some(scales) => format!("{:.2}", frame.ch[i] as f64 * scales[i].volts_per_count()),
        None => frame.ch[i].to_string(),
    })
}

pub fn interactive_line(timestamp: &str, values: &[String; 4]) -> String {
    format!(
        "{} Ch1: {}, Ch2: {}, Ch3: {}, Ch4: {}",
        timestamp, values[0], values[1], values[2], values[3]
    )
}

pub fn csv_line(timestamp: &str, values: &[String; 4]) -> String {
    format!(
        "{},{},{},{},{}",
        timestamp, values[0], values[1], values[2], values[3]
    )
}

fn timestamp() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

/// The log file is opened, appended to and closed on every sample so that
/// external tools can read or rotate it between ticks.
fn append_record(path: &Path, line: &str) -> std::io::Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{}", line)
}

fn emit(config: &RunConfig, values: &[String; 4]) -> std::io::Result<()> {
    let timestamp = timestamp();
    if config.interactive {
        println!("{}", interactive_line(&timestamp, values));
    } else if config.debug {
        println!("{}", csv_line(&timestamp, values));
    } else {
        append_record(&config.log_path(), &csv_line(&timestamp, values))?;
    }
    Ok(())
}

/// Sleeps one interval in one-second increments so an interrupt takes
/// effect promptly even mid-interval. Returns false once stopped.
fn sleep_interval(interval_secs: u64, stop: &AtomicBool) -> bool {
    for _ in 0..interval_secs {
        if stop.load(Ordering::Relaxed) {
            return false;
        }
        thread::sleep(Duration::from_secs(1));
    }
    !stop.load(Ordering::Relaxed)
}

#[derive(Debug)]
pub struct Summary {
    pub samples: u64,
    pub interval_secs: u64,
    pub elapsed_secs: u64,
}

impl Summary {
    pub fn report(&self) -> String {
        format!(
            "Took {} samples at {}s intervals over {}",
            self.samples,
            self.interval_secs,
            dhms(self.elapsed_secs)
        )
    }
}

/// Formats a duration in whole seconds as days/hours/minutes/seconds.
pub fn dhms(total_secs: u64) -> String {
    let days = total_secs / 86_400;
    let hours = total_secs % 86_400 / 3_600;
    let mins = total_secs % 3_600 / 60;
    let secs = total_secs % 60;
    format!("{} Days, {} Hours, {} Min, {} Secs", days, hours, mins, secs)
}

/// Runs the sampling loop until the configured run time is exhausted or
/// the stop flag is set, then releases the device. Both triggers share
/// this one shutdown path.
pub fn run<D: Driver>(
    session: &mut Session<D>,
    config: &RunConfig,
    stop: &AtomicBool,
) -> Summary {
    let started = Instant::now();
    let mut state = LoopState::new(config.run_for_secs);
    let mut frame = SampleFrame::default();

    loop {
        if stop.load(Ordering::Relaxed) {
            break;
        }
        session.poll(&mut frame);
        let values = convert(&frame, config.scales.as_ref());
        if let Err(err) = emit(config, &values) {
            warn!("failed to write record: {}", err);
        }
        if !state.advance(config.interval_secs) {
            break;
        }
        if !sleep_interval(config.interval_secs, stop) {
            break;
        }
    }

    session.release();

    Summary {
        samples: state.samples(),
        interval_secs: config.interval_secs,
        elapsed_secs: started.elapsed().as_secs(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::mock::MockDriver;
    use std::path::PathBuf;

    fn config() -> RunConfig {
        RunConfig {
            interactive: true,
            interval_secs: 1,
            run_for_secs: 1,
            log_dir: std::env::temp_dir(),
            log_file: format!("k8047-test-{}.csv", std::process::id()),
            scales: None,
            debug: false,
        }
    }

    #[test]
    fn dhms_splits_days_hours_minutes_seconds() {
        assert_eq!(dhms(90061), "1 Days, 1 Hours, 1 Min, 1 Secs");
        assert_eq!(dhms(0), "0 Days, 0 Hours, 0 Min, 0 Secs");
    }

    #[test]
    fn convert_scales_and_rounds_to_two_decimals() {
        let mut frame = SampleFrame::default();
        frame.fill_from(&[0, 0, 128, 0, 255, 51, 0, 0]);
        let scales = [FullScale::V30, FullScale::V3, FullScale::V6, FullScale::V15];
        let values = convert(&frame, Some(&scales));
        assert_eq!(values, ["15.06", "0.00", "6.00", "3.00"]);
    }

    #[test]
    fn convert_passes_raw_counts_through() {
        let mut frame = SampleFrame::default();
        frame.fill_from(&[0, 0, 0, 17, 255, 3, 0, 0]);
        assert_eq!(convert(&frame, None), ["0", "17", "255", "3"]);
    }

    #[test]
    fn line_formats() {
        let values = ["1".to_string(), "2".to_string(), "3".to_string(), "4".to_string()];
        assert_eq!(
            interactive_line("2026-01-02T03:04:05Z", &values),
            "2026-01-02T03:04:05Z Ch1: 1, Ch2: 2, Ch3: 3, Ch4: 4"
        );
        assert_eq!(
            csv_line("2026-01-02T03:04:05Z", &values),
            "2026-01-02T03:04:05Z,1,2,3,4"
        );
    }

    #[test]
    fn run_for_zero_never_exhausts() {
        let mut state = LoopState::new(0);
        for _ in 0..1000 {
            assert!(state.advance(60));
        }
        assert_eq!(state.samples(), 1000);
    }

    #[test]
    fn ten_seconds_at_three_second_intervals_is_four_samples() {
        let mut state = LoopState::new(10);
        let mut samples = 0;
        loop {
            samples += 1;
            if !state.advance(3) {
                break;
            }
        }
        assert_eq!(samples, 4);
        assert_eq!(state.samples(), 4);
    }

    #[test]
    fn finite_run_samples_then_releases_once() {
        let driver = MockDriver::default();
        let calls = driver.calls.clone();
        let mut session = Session::acquire(driver).unwrap();

        let stop = AtomicBool::new(false);
        let summary = run(&mut session, &config(), &stop);

        assert_eq!(summary.samples, 1);
        assert_eq!(calls.borrow().reads, 1);
        assert_eq!(calls.borrow().stops, 1);

        drop(session);
        assert_eq!(calls.borrow().stops, 1);
    }

    #[test]
    fn preset_stop_flag_takes_no_samples() {
        let driver = MockDriver::default();
        let calls = driver.calls.clone();
        let mut session = Session::acquire(driver).unwrap();

        let stop = AtomicBool::new(true);
        let summary = run(&mut session, &config(), &stop);

        assert_eq!(summary.samples, 0);
        assert_eq!(calls.borrow().reads, 0);
        assert_eq!(calls.borrow().stops, 1);
    }

    #[test]
    fn csv_mode_appends_one_record_per_sample() {
        let driver = MockDriver {
            frame: [0, 0, 1, 2, 3, 4, 0, 0],
            ..MockDriver::default()
        };
        let mut session = Session::acquire(driver).unwrap();

        let mut config = config();
        config.interactive = false;
        config.log_file = format!("k8047-test-csv-{}.csv", std::process::id());
        let path = config.log_path();
        let _ = std::fs::remove_file(&path);

        let stop = AtomicBool::new(false);
        run(&mut session, &config, &stop);

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 1);
        let fields: Vec<&str> = lines[0].split(',').collect();
        assert_eq!(fields.len(), 5);
        assert_eq!(fields[1..], ["1", "2", "3", "4"]);
        assert_eq!(fields[0].len(), "2026-01-02T03:04:05Z".len());
        assert!(fields[0].ends_with('Z'));

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn csv_debug_mode_never_opens_the_log_file() {
        let driver = MockDriver::default();
        let mut session = Session::acquire(driver).unwrap();

        let mut config = config();
        config.interactive = false;
        config.debug = true;
        config.log_file = format!("k8047-test-debug-{}.csv", std::process::id());
        let path = config.log_path();
        let _ = std::fs::remove_file(&path);

        let stop = AtomicBool::new(false);
        run(&mut session, &config, &stop);

        assert!(!path.exists());
    }

    #[test]
    fn log_path_joins_dir_and_file() {
        let mut config = config();
        config.log_dir = PathBuf::from("/var/log");
        config.log_file = "daq.csv".to_string();
        assert_eq!(config.log_path(), PathBuf::from("/var/log/daq.csv"));
    }
}
