use std::io::{self, BufRead};
use std::sync::Arc;
use std::{env, process, thread};

use rustyrelay::config::Config;
use rustyrelay::log::{LogSink, Logger};
use rustyrelay::relay::RelayServer;

fn main() -> std::io::Result<()> {
    // --- Parse CLI args ----------------------------------------------------
    //
    // Supported:
    //   cargo run --bin relay_server
    //      -> binds to the configured address (default 0.0.0.0:5000)
    //
    //   cargo run --bin relay_server -- 0.0.0.0:6000
    //      -> binds to 0.0.0.0:6000
    //
    //   cargo run --bin relay_server -- 127.0.0.1 7000
    //      -> binds to 127.0.0.1:7000

    let args: Vec<String> = env::args().collect();

    let addr_arg = match args.len() {
        // no extra args -> config value or built-in default
        1 => None,

        // one extra arg: full addr "IP:PORT"
        2 => Some(args[1].clone()),

        // two extra args: IP + PORT
        3 => Some(format!("{}:{}", args[1], args[2])),

        // anything else -> usage error
        _ => {
            eprintln!("Usage:");
            eprintln!("  {}                # listen on the configured address", args[0]);
            eprintln!("  {} [ADDR]         # e.g. 0.0.0.0:6000", args[0]);
            eprintln!("  {} [IP] [PORT]    # e.g. 127.0.0.1 6000", args[0]);
            eprintln!();
            eprintln!("When using cargo:");
            eprintln!("  cargo run --bin relay_server");
            eprintln!("  cargo run --bin relay_server -- 0.0.0.0:6000");
            eprintln!("  cargo run --bin relay_server -- 127.0.0.1 6000");
            process::exit(1);
        }
    };

    // --- Load config, start process logger ---------------------------------
    let config = match Config::load_default() {
        Ok(c) => Arc::new(c),
        Err(e) => {
            eprintln!("[relay_server] {e}");
            process::exit(1);
        }
    };

    let addr = addr_arg.unwrap_or_else(|| {
        config
            .get_non_empty_or_default("server", "bind_addr", "0.0.0.0:5000")
            .to_string()
    });
    let files_dir = config
        .get_non_empty_or_default("server", "files_dir", "download")
        .to_string();

    let logger = Logger::start_server(1024, config.clone());
    let log_sink: Arc<dyn LogSink> = Arc::new(logger.handle());

    eprintln!("[relay_server] starting on {}", addr);
    eprintln!("[relay_server] serving files from {}", files_dir);
    eprintln!("[relay_server] log file: {}", logger.file_path().display());

    // --- Start relay -------------------------------------------------------
    let (runner, shutdown) = RelayServer::new(addr, files_dir, log_sink).start()?;

    // CONSOLE THREAD: 'quit'/'exit' (or closing stdin) stops the relay.
    {
        let shutdown = shutdown.clone();
        thread::spawn(move || {
            let stdin = io::stdin();
            for line in stdin.lock().lines() {
                match line {
                    Ok(cmd) if matches!(cmd.trim(), "quit" | "exit") => break,
                    Ok(_) => eprintln!("[relay_server] type 'quit' to stop"),
                    Err(_) => break,
                }
            }
            shutdown.shutdown();
        });
    }

    // --- Serve (blocks until shutdown) -------------------------------------
    runner.run()
}
