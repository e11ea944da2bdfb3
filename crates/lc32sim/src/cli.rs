//! Command-line argument parsing.
//!
//! Hand-rolled in the shape `emu_nes::main::parse_args` uses (a plain loop
//! over `std::env::args`, no external argument-parsing crate) since the
//! original implementation's own CLI (`original_source/src/main.cpp`) is a
//! similarly small, fixed set of flags.

use std::path::PathBuf;
use std::process;

pub struct CliArgs {
    pub file: Option<PathBuf>,
    pub config_file: PathBuf,
    pub software_rendering: bool,
    pub log_level: Option<String>,
    pub headless: bool,
}

const USAGE: &str = "Usage: lc32sim [OPTIONS] <file>\n\
\n\
Options:\n\
  -c, --config-file <path>   Path to the JSON config file [default: ./lc32sim.json]\n\
  -s, --software-rendering   Force software rendering (overrides display.accelerated_rendering)\n\
  -l, --log-level <level>    Log level: debug, info, warn, error, fatal [default: use config]\n\
  -H, --headless             Run with no window, to completion or HALT\n\
      --version              Print version and exit\n\
      --help                 Print this help and exit";

/// Parse `argv`. Prints a usage error and exits with status 1 on malformed
/// input (`spec.md` §6: "Exit codes: 0 success, 1 argument/parse error").
#[must_use]
pub fn parse_args() -> CliArgs {
    let args: Vec<String> = std::env::args().collect();
    let mut cli = CliArgs {
        file: None,
        config_file: PathBuf::from("./lc32sim.json"),
        software_rendering: false,
        log_level: None,
        headless: false,
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "-c" | "--config-file" => {
                i += 1;
                match args.get(i) {
                    Some(path) => cli.config_file = PathBuf::from(path),
                    None => fail("--config-file requires a path argument"),
                }
            }
            "-s" | "--software-rendering" => cli.software_rendering = true,
            "-l" | "--log-level" => {
                i += 1;
                match args.get(i) {
                    Some(level) => cli.log_level = Some(level.clone()),
                    None => fail("--log-level requires a value"),
                }
            }
            "-H" | "--headless" => cli.headless = true,
            "--version" => {
                println!("lc32sim {}", env!("CARGO_PKG_VERSION"));
                process::exit(0);
            }
            "--help" => {
                println!("{USAGE}");
                process::exit(0);
            }
            other if other.starts_with('-') => fail(&format!("unknown option: {other}")),
            other => {
                if cli.file.is_some() {
                    fail(&format!("unexpected positional argument: {other}"));
                }
                cli.file = Some(PathBuf::from(other));
            }
        }
        i += 1;
    }

    if cli.file.is_none() {
        fail("missing required argument: <file>");
    }

    cli
}

fn fail(message: &str) -> ! {
    eprintln!("error: {message}");
    eprintln!("{USAGE}");
    process::exit(1);
}
