//! Command line handling shared by the probe programs
//!
//! Each program accepts a handful of flags on top of the common ones:
//!
//! ```text
//! -h, --help            Print usage
//! -V, --version         Print version
//! --config <PATH>       Load this config file instead of the default lookup
//! --device <PATH>       Override the DRM card node
//! --print-config        Print the effective config as TOML and exit
//! ```

use anyhow::{anyhow, Context, Result};
use log::debug;
use std::path::Path;
use std::process::ExitCode;
use std::str::FromStr;
use std::time::Duration;

use crate::config::Config;

/// Parsed argument list
#[derive(Debug, Clone)]
pub struct Args {
    args: Vec<String>,
}

impl Args {
    /// Collect process arguments (program name dropped)
    pub fn from_env() -> Self {
        Self::from_vec(std::env::args().skip(1).collect())
    }

    pub fn from_vec(args: Vec<String>) -> Self {
        Self { args }
    }

    /// True if any of the given spellings is present
    pub fn flag(&self, names: &[&str]) -> bool {
        self.args.iter().any(|a| names.contains(&a.as_str()))
    }

    /// Value of `--name=value` or `--name value`
    pub fn value(&self, name: &str) -> Option<&str> {
        let prefix = format!("{}=", name);
        let mut iter = self.args.iter();
        while let Some(arg) = iter.next() {
            if let Some(v) = arg.strip_prefix(&prefix) {
                return Some(v);
            }
            if arg == name {
                return iter.next().map(String::as_str);
            }
        }
        None
    }

    /// Parse the value of an option
    pub fn parsed<T>(&self, name: &str) -> Result<Option<T>>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.value(name) {
            Some(v) => v
                .parse()
                .map(Some)
                .map_err(|e| anyhow!("Invalid value for {}: {} ({})", name, v, e)),
            None => Ok(None),
        }
    }

    /// Bare positional word (e.g. `gbm-bo-test gpu_alloc`)
    pub fn positional(&self, word: &str) -> bool {
        self.args.iter().any(|a| a == word)
    }

    pub fn help(&self) -> bool {
        self.flag(&["--help", "-h"])
    }

    pub fn version(&self) -> bool {
        self.flag(&["--version", "-V"])
    }

    /// Load config honoring `--config` and apply common overrides
    pub fn load_config(&self) -> Result<Config> {
        let mut cfg = match self.value("--config") {
            Some(path) => Config::load_from_file(Path::new(path))
                .with_context(|| format!("Cannot use --config {}", path))?,
            None => Config::load(),
        };
        if let Some(device) = self.value("--device") {
            cfg.devices.card = device.to_string();
        }
        if let Some(dir) = self.value("--shader-dir") {
            cfg.shaders.dir = dir.to_string();
        }
        Ok(cfg)
    }
}

/// What `main` should do after looking at the common flags
pub enum Startup {
    /// Help / version / config printed, exit successfully
    Exit,
    /// Run the probe
    Run(Config),
}

/// Handle the flags every probe shares.
///
/// `usage` is the program specific help text (printed after the program name line).
pub fn startup(program: &str, summary: &str, usage: &str, args: &Args) -> Result<Startup> {
    if args.help() {
        print_help(program, summary, usage);
        return Ok(Startup::Exit);
    }
    if args.version() {
        println!("{} (glprobe {})", program, env!("CARGO_PKG_VERSION"));
        return Ok(Startup::Exit);
    }

    let cfg = args.load_config()?;
    if args.flag(&["--print-config"]) {
        print!("{}", cfg.to_toml()?);
        return Ok(Startup::Exit);
    }

    Ok(Startup::Run(cfg))
}

fn print_help(program: &str, summary: &str, usage: &str) {
    println!(
        r#"{program} {version} - {summary}

USAGE:
    {program} [OPTIONS]

OPTIONS:
    -h, --help              Print this help message
    -V, --version           Print version information
    --config <PATH>         Config file (default: ~/.config/glprobe/config.toml)
    --device <PATH>         DRM card node (default: /dev/dri/card0)
    --shader-dir <DIR>      Directory holding the GLSL sources
    --print-config          Print the effective configuration and exit
{usage}
ENVIRONMENT:
    RUST_LOG                Log filter (default: info)
    GLPROBE_CONFIG          Config file path
"#,
        program = program,
        version = env!("CARGO_PKG_VERSION"),
        summary = summary,
        usage = usage,
    );
}

/// Initialize logging the same way in every probe
pub fn init_logging() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
}

/// Exit with a specific status after printing `message` to stdout
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct Abort {
    pub message: String,
    pub code: i32,
}

impl Abort {
    pub fn new(message: impl Into<String>, code: i32) -> Self {
        Self {
            message: message.into(),
            code,
        }
    }
}

/// Map a probe's result to its process exit status.
///
/// `Abort` keeps its own code (as the low byte, so -1 exits with 255);
/// any other error exits with 1.
pub fn exit_status(result: Result<()>) -> ExitCode {
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if let Some(abort) = e.downcast_ref::<Abort>() {
                println!("{}", abort.message);
                ExitCode::from(abort.code as u8)
            } else {
                eprintln!("Error: {:#}", e);
                ExitCode::FAILURE
            }
        }
    }
}

/// Block until a line (or EOF) arrives on stdin
pub fn wait_for_enter() -> Result<()> {
    let mut line = String::new();
    std::io::stdin()
        .read_line(&mut line)
        .context("Failed to read from stdin")?;
    Ok(())
}

/// Keep the current output up for `duration`
pub fn hold(duration: Duration) {
    debug!("Holding for {:?}", duration);
    std::thread::sleep(duration);
}

/// Triangle count for the colour scatter: `--limit`, then `LIMIT`, then the config
pub fn scatter_limit(args: &Args, cfg: &Config) -> Result<u32> {
    if let Some(limit) = args.parsed::<u32>("--limit")? {
        return Ok(limit);
    }
    match std::env::var("LIMIT") {
        Ok(v) => v
            .trim()
            .parse()
            .map_err(|e| anyhow!("Invalid LIMIT value {:?}: {}", v, e)),
        Err(_) => cfg
            .scatter
            .limit
            .ok_or_else(|| anyhow!("LIMIT is not set (use --limit, LIMIT or scatter.limit)")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Args {
        Args::from_vec(list.iter().map(|s| s.to_string()).collect())
    }

    #[test]
    fn test_flag_spellings() {
        let a = args(&["-h"]);
        assert!(a.help());
        assert!(!a.version());
        assert!(args(&["--version"]).version());
    }

    #[test]
    fn test_value_forms() {
        let a = args(&["--limit=12", "--png", "frame.png"]);
        assert_eq!(a.value("--limit"), Some("12"));
        assert_eq!(a.value("--png"), Some("frame.png"));
        assert_eq!(a.value("--device"), None);
    }

    #[test]
    fn test_value_missing_argument() {
        assert_eq!(args(&["--png"]).value("--png"), None);
    }

    #[test]
    fn test_parsed() {
        let a = args(&["--limit", "7", "--rotate=bad"]);
        assert_eq!(a.parsed::<u32>("--limit").unwrap(), Some(7));
        assert!(a.parsed::<f32>("--rotate").is_err());
        assert_eq!(a.parsed::<u32>("--scale").unwrap(), None);
    }

    #[test]
    fn test_positional() {
        let a = args(&["gpu_alloc"]);
        assert!(a.positional("gpu_alloc"));
        assert!(!args(&["--gpu_alloc"]).positional("gpu_alloc"));
    }

    #[test]
    fn test_limit_from_flag_wins() {
        let cfg = Config {
            scatter: crate::config::ScatterConfig { limit: Some(3) },
            ..Config::default()
        };
        assert_eq!(scatter_limit(&args(&["--limit", "9"]), &cfg).unwrap(), 9);
        assert!(scatter_limit(&args(&["--limit", "x"]), &cfg).is_err());
    }

    // LIMIT is process-wide, so every environment case lives in this one test
    #[test]
    fn test_limit_env_then_config() {
        let configured = Config {
            scatter: crate::config::ScatterConfig { limit: Some(3) },
            ..Config::default()
        };
        let unset = Config::default();

        std::env::set_var("LIMIT", " 40 ");
        assert_eq!(scatter_limit(&args(&[]), &configured).unwrap(), 40);
        assert_eq!(scatter_limit(&args(&["--limit=5"]), &configured).unwrap(), 5);

        std::env::set_var("LIMIT", "many");
        assert!(scatter_limit(&args(&[]), &configured).is_err());

        std::env::remove_var("LIMIT");
        assert_eq!(scatter_limit(&args(&[]), &configured).unwrap(), 3);
        let err = scatter_limit(&args(&[]), &unset).unwrap_err();
        assert!(err.to_string().contains("LIMIT is not set"));
    }

    #[test]
    fn test_abort_keeps_code() {
        let err: anyhow::Error = Abort::new("something bad happened", -1).into();
        let abort = err.downcast_ref::<Abort>().unwrap();
        assert_eq!(abort.code as u8, 255);
        assert_eq!(err.to_string(), "something bad happened");
    }
}
