use clap::{Arg, ArgAction, ArgMatches, Command, value_parser};
use std::path::PathBuf;
use std::str::FromStr;

/// Full-scale input range of one channel, in volts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FullScale {
    V3,
    V6,
    V15,
    V30,
}

impl FullScale {
    pub const ALL: [FullScale; 4] = [FullScale::V3, FullScale::V6, FullScale::V15, FullScale::V30];

    pub fn volts(self) -> u32 {
        match self {
            FullScale::V3 => 3,
            FullScale::V6 => 6,
            FullScale::V15 => 15,
            FullScale::V30 => 30,
        }
    }

    /// Gain code programmed into the device for this range.
    pub fn gain_code(self) -> u8 {
        match self {
            FullScale::V3 => 10,
            FullScale::V6 => 5,
            FullScale::V15 => 2,
            FullScale::V30 => 1,
        }
    }

    /// Volts represented by one raw count.
    pub fn volts_per_count(self) -> f64 {
        self.volts() as f64 / 255.0
    }
}

impl FromStr for FullScale {
    type Err = String;

    fn from_str(s: &str) -> Result<FullScale, String> {
        match s.trim() {
            "3" => Ok(FullScale::V3),
            "6" => Ok(FullScale::V6),
            "15" => Ok(FullScale::V15),
            "30" => Ok(FullScale::V30),
            other => Err(format!(
                "invalid full-scale range {:?} (expected 3, 6, 15 or 30)",
                other
            )),
        }
    }
}

fn parse_scales(s: &str) -> Result<[FullScale; 4], String> {
    let tokens: Vec<&str> = s.split(',').collect();
    if tokens.len() != 4 {
        return Err(format!(
            "expected 4 comma-separated ranges, got {}",
            tokens.len()
        ));
    }
    let mut scales = [FullScale::V3; 4];
    for (i, token) in tokens.iter().enumerate() {
        scales[i] = token.parse()?;
    }
    Ok(scales)
}

/// Immutable run configuration, built once from the command line.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub interactive: bool,
    pub interval_secs: u64,
    pub run_for_secs: u64,
    pub log_dir: PathBuf,
    pub log_file: String,
    pub scales: Option<[FullScale; 4]>,
    pub debug: bool,
}

impl RunConfig {
    pub fn command() -> Command {
        Command::new("k8047-logger")
            .about("Log samples from a K8047 four-channel USB recorder")
            .arg(
                Arg::new("no-interactive")
                    .long("no-interactive")
                    .action(ArgAction::SetTrue)
                    .help("Write CSV records instead of interactive console output"),
            )
            .arg(
                Arg::new("interval")
                    .short('i')
                    .long("interval")
                    .value_parser(value_parser!(u64).range(1..))
                    .default_value("1")
                    .help("Sample interval in seconds"),
            )
            .arg(
                Arg::new("run-for")
                    .short('r')
                    .long("run-for")
                    .value_parser(value_parser!(u64))
                    .default_value("0")
                    .help("Run duration in seconds (0 = until interrupted)"),
            )
            .arg(
                Arg::new("log-file")
                    .short('f')
                    .long("log-file")
                    .value_parser(value_parser!(String))
                    .default_value("k8047.csv")
                    .help("Log file name"),
            )
            .arg(
                Arg::new("log-dir")
                    .short('d')
                    .long("log-dir")
                    .value_parser(value_parser!(PathBuf))
                    .default_value(".")
                    .help("Log directory"),
            )
            .arg(
                Arg::new("scale")
                    .short('s')
                    .long("scale")
                    .value_parser(parse_scales)
                    .help("Comma-separated full-scale ranges for channels 1-4, each one of 3, 6, 15, 30 volts"),
            )
            .arg(
                Arg::new("debug")
                    .long("debug")
                    .action(ArgAction::SetTrue)
                    .help("Print diagnostics and keep running without a connected device"),
            )
    }

    pub fn from_args() -> RunConfig {
        RunConfig::from_matches(&RunConfig::command().get_matches())
    }

    fn from_matches(matches: &ArgMatches) -> RunConfig {
        RunConfig {
            interactive: !matches.get_flag("no-interactive"),
            interval_secs: *matches.get_one::<u64>("interval").unwrap(),
            run_for_secs: *matches.get_one::<u64>("run-for").unwrap(),
            log_dir: matches.get_one::<PathBuf>("log-dir").unwrap().clone(),
            log_file: matches.get_one::<String>("log-file").unwrap().clone(),
            scales: matches.get_one::<[FullScale; 4]>("scale").copied(),
            debug: matches.get_flag("debug"),
        }
    }

    pub fn log_path(&self) -> PathBuf {
        self.log_dir.join(&self.log_file)
    }

    /// Prints the resolved configuration; with debug also the gain tables.
    pub fn echo(&self) {
        println!(
            "mode: {}",
            if self.interactive { "interactive" } else { "csv" }
        );
        println!("sample interval: {}s", self.interval_secs);
        if self.run_for_secs == 0 {
            println!("run for: until interrupted");
        } else {
            println!("run for: {}s", self.run_for_secs);
        }
        if !self.interactive {
            println!("log file: {}", self.log_path().display());
        }
        match &self.scales {
            Some(scales) => println!(
                "full-scale ranges: {}",
                scales
                    .iter()
                    .map(|scale| format!("{}V", scale.volts()))
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
            None => println!("full-scale ranges: none (raw counts)"),
        }
        if self.debug {
            println!("range  gain  volts/count");
            for scale in FullScale::ALL {
                println!(
                    "{:>4}V  {:>4}  {:.6}",
                    scale.volts(),
                    scale.gain_code(),
                    scale.volts_per_count()
                );
            }
        }
    }
}
