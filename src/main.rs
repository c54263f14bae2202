use std::sync::mpsc as std_mpsc;

use log::{error, info};
use tokio::sync::mpsc as tokio_mpsc;

use wspr_tx::session::{self, StatusEvent};
use wspr_tx::transport::serial;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    println!("WSPR Transmitter Configuration");
    println!("==============================");

    // Port from the first argument, else the first one on the machine.
    let port_name = match std::env::args().nth(1) {
        Some(name) => name,
        None => match serial::available_ports() {
            Ok(ports) => ports[0].clone(),
            Err(e) => {
                eprintln!("Failed to find a serial port: {e}");
                std::process::exit(1);
            }
        },
    };

    let transport = match serial::open_port(&port_name) {
        Ok(t) => t,
        Err(e) => {
            eprintln!("Failed to open {port_name}: {e}");
            eprintln!();
            eprintln!("Troubleshooting:");
            eprintln!("  1. Connect the transmitter via USB");
            eprintln!("  2. Check that no other program holds the port");
            eprintln!("  3. Pass the port explicitly: wspr-tx /dev/ttyUSB0");
            std::process::exit(1);
        }
    };
    println!("Connected on {port_name}.");

    let rt = tokio::runtime::Runtime::new().expect("failed to create tokio runtime");
    rt.block_on(async {
        // Host → session: std::sync::mpsc (the session thread is blocking).
        let (_cmd_tx, cmd_rx) = std_mpsc::channel();
        // Session → host: tokio unbounded (async-compatible, never blocks).
        let (event_tx, mut event_rx) = tokio_mpsc::unbounded_channel();

        tokio::task::spawn_blocking(move || {
            session::session_loop(Box::new(transport), cmd_rx, event_tx);
        });

        while let Some(event) = event_rx.recv().await {
            match event {
                StatusEvent::Error(msg) => error!("{msg}"),
                StatusEvent::Disconnected => break,
                other => info!("{other:?}"),
            }
        }
    });
}
