//! Server and discovery modes.

use std::io::{self, BufRead};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::{select, Receiver};

use cadenza_core::{Config, Library, MemoryLibrary};
use cadenza_net::{DiscoveryProbe, RemoteControlServer, ServerConfig};

use crate::catalog::{demo_catalog, load_catalog};
use crate::Args;

// =============================================================================
// Server Mode
// =============================================================================

pub fn run_server(args: &Args) -> io::Result<()> {
    log::info!("Starting Cadenza remote control server");

    let config = Config::load();
    let port = args.port.unwrap_or_else(|| config.remote_port());
    let server_config = ServerConfig::new(port)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?
        .with_discovery_interval(config.discovery_interval());

    let songs = match &args.catalog {
        Some(path) => load_catalog(path).map_err(|e| {
            log::error!("Failed to load catalog {}: {}", path.display(), e);
            e
        })?,
        None => {
            log::info!("No catalog given, serving the demo songs");
            demo_catalog()
        }
    };
    let library = Arc::new(MemoryLibrary::new(songs, config.library_settings()));
    if library.settings().admin_password.is_none() {
        log::info!("No admin password configured; remote clients stay guests");
    }

    let server = RemoteControlServer::new(server_config, library.clone());
    if !server.start_client_discovery() {
        eprintln!("Port {} is already in use", server.port());
        return Err(io::Error::new(
            io::ErrorKind::AddrInUse,
            format!("port {} is occupied", server.port()),
        ));
    }

    if config.discovery_enabled() && !args.no_discovery {
        if let Err(e) = server.spawn_discovery() {
            log::warn!("Discovery broadcast unavailable: {}", e);
        }
    }

    println!(
        "Listening on port {} ({} songs). Commands: status, playlist, quit",
        server.port(),
        library.songs().len()
    );

    let result = run_console(&server, library.as_ref(), stdin_lines());
    server.shutdown();
    result
}

/// Forward stdin lines to a channel. The channel disconnects at EOF.
fn stdin_lines() -> Receiver<String> {
    let (tx, rx) = crossbeam_channel::unbounded();
    let spawned = thread::Builder::new()
        .name("cadenza-stdin".into())
        .spawn(move || {
            for line in io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                if tx.send(line).is_err() {
                    break;
                }
            }
        });
    if let Err(e) = spawned {
        log::error!("Failed to spawn stdin reader: {}", e);
    }
    rx
}

fn run_console(
    server: &RemoteControlServer,
    library: &dyn Library,
    commands: Receiver<String>,
) -> io::Result<()> {
    let clients = server.subscribe_connected_clients();
    let throttled = server.subscribe_throttle_warnings();

    loop {
        select! {
            recv(clients) -> count => {
                if let Ok(count) = count {
                    println!("{} remote client(s) connected", count);
                }
            }
            recv(throttled) -> remaining => {
                if let Ok(remaining) = remaining {
                    println!("Guest add throttled, {}s left", remaining.as_secs());
                }
            }
            recv(commands) -> line => {
                let Ok(line) = line else {
                    log::info!("stdin closed, shutting down");
                    return Ok(());
                };
                match line.trim() {
                    "" => {}
                    "quit" | "exit" => return Ok(()),
                    "status" => println!(
                        "port {}, {} client(s), throttle {}s",
                        server.port(),
                        server.connected_clients(),
                        library.remaining_throttle().as_secs()
                    ),
                    "playlist" => {
                        for entry in library.playlist() {
                            println!("{:>3}. {} - {}", entry.index, entry.song.artist, entry.song.title);
                        }
                    }
                    other => println!("Unknown command '{}'", other),
                }
            }
        }
    }
}

// =============================================================================
// Discovery Mode
// =============================================================================

pub fn run_discovery(port: u32, secs: u64) -> io::Result<()> {
    let port = ServerConfig::new(port)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?
        .port();
    let probe = DiscoveryProbe::on_port(port)?;

    println!("Listening for Cadenza servers on udp port {} for {}s...", port, secs);
    match probe.next_announcement(Duration::from_secs(secs))? {
        Some(addr) => println!("Found server at {}:{}", addr.ip(), port),
        None => println!("No server found"),
    }
    Ok(())
}
