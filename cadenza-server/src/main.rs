mod catalog;
mod network;

use std::fs::File;
use std::path::PathBuf;

fn init_logging(verbose: bool) {
    use simplelog::*;

    let log_path = dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("cadenza")
        .join("cadenza.log");

    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let log_file = File::create(&log_path)
        .or_else(|_| File::create(std::env::temp_dir().join("cadenza.log")));

    let mut loggers: Vec<Box<dyn SharedLogger>> = Vec::new();
    match log_file {
        Ok(file) => loggers.push(WriteLogger::new(LevelFilter::Info, Config::default(), file)),
        Err(e) => eprintln!("Cannot create log file {}: {}", log_path.display(), e),
    }
    if verbose {
        loggers.push(TermLogger::new(
            LevelFilter::Debug,
            Config::default(),
            TerminalMode::Stderr,
            ColorChoice::Auto,
        ));
    }

    if CombinedLogger::init(loggers).is_err() {
        eprintln!("Logger already initialized");
    }

    log::info!("cadenza starting (verbose: {})", verbose);
}

/// Command line options. Anything not given falls back to the config file.
#[derive(Debug, Default, PartialEq)]
struct Args {
    verbose: bool,
    port: Option<u32>,
    no_discovery: bool,
    catalog: Option<PathBuf>,
    /// Listen for announcements for this many seconds instead of serving.
    discover: Option<u64>,
}

const DEFAULT_DISCOVER_SECS: u64 = 5;

fn parse_args(args: &[String]) -> Result<Args, String> {
    let mut parsed = Args::default();
    let mut iter = args.iter().skip(1).peekable();

    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--verbose" | "-v" => parsed.verbose = true,
            "--no-discovery" => parsed.no_discovery = true,
            "--port" => {
                let value = iter.next().ok_or("--port needs a value")?;
                let port = value
                    .parse()
                    .map_err(|_| format!("Invalid port '{}'", value))?;
                parsed.port = Some(port);
            }
            "--catalog" => {
                let value = iter.next().ok_or("--catalog needs a file")?;
                parsed.catalog = Some(PathBuf::from(value));
            }
            "--discover" => {
                let secs = match iter.peek().and_then(|s| s.parse().ok()) {
                    Some(secs) => {
                        iter.next();
                        secs
                    }
                    None => DEFAULT_DISCOVER_SECS,
                };
                parsed.discover = Some(secs);
            }
            other => return Err(format!("Unknown argument '{}'", other)),
        }
    }

    Ok(parsed)
}

fn usage() -> &'static str {
    "usage: cadenza [--port N] [--no-discovery] [--catalog FILE] [--discover [SECS]] [-v]"
}

fn main() -> std::io::Result<()> {
    let argv: Vec<String> = std::env::args().collect();
    let args = match parse_args(&argv) {
        Ok(args) => args,
        Err(e) => {
            eprintln!("{}\n{}", e, usage());
            std::process::exit(2);
        }
    };
    init_logging(args.verbose);

    if let Some(secs) = args.discover {
        let config = cadenza_core::Config::load();
        let port = args.port.unwrap_or_else(|| config.remote_port());
        return network::run_discovery(port, secs);
    }

    network::run_server(&args)
}
