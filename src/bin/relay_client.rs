use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;
use std::{env, process, thread};

use rustyrelay::config::Config;
use rustyrelay::log::{LogSink, Logger};
use rustyrelay::relay_client::{ClaimResult, ClientEvent, PendingClient};

/// Prints `prompt`, then reads one line from stdin. `None` means EOF.
fn read_line_trimmed(prompt: &str) -> io::Result<Option<String>> {
    print!("{prompt}");
    io::stdout().flush()?;
    let mut buf = String::new();
    if io::stdin().read_line(&mut buf)? == 0 {
        return Ok(None);
    }
    Ok(Some(buf.trim().to_string()))
}

fn main() -> std::io::Result<()> {
    // --- Parse CLI args ----------------------------------------------------
    //
    // Supported:
    //   cargo run --bin relay_client
    //      -> connects to 127.0.0.1:5000
    //
    //   cargo run --bin relay_client -- 192.168.0.10:6000
    //      -> connects to 192.168.0.10:6000
    //
    //   cargo run --bin relay_client -- 192.168.0.10 6000
    //      -> connects to 192.168.0.10:6000

    let args: Vec<String> = env::args().collect();

    let addr = match args.len() {
        1 => "127.0.0.1:5000".to_owned(),
        2 => args[1].clone(),
        3 => format!("{}:{}", args[1], args[2]),
        _ => {
            eprintln!("Usage:");
            eprintln!("  {}                # connect to 127.0.0.1:5000", args[0]);
            eprintln!("  {} [ADDR]         # e.g. 192.168.0.10:6000", args[0]);
            eprintln!("  {} [IP] [PORT]    # e.g. 192.168.0.10 6000", args[0]);
            eprintln!();
            eprintln!("When using cargo:");
            eprintln!("  cargo run --bin relay_client");
            eprintln!("  cargo run --bin relay_client -- 192.168.0.10:6000");
            eprintln!("  cargo run --bin relay_client -- 192.168.0.10 6000");
            process::exit(1);
        }
    };

    // --- Load config, start process logger ---------------------------------
    let config = match Config::load_default() {
        Ok(c) => Arc::new(c),
        Err(e) => {
            eprintln!("[relay_client] {e}");
            process::exit(1);
        }
    };

    let save_dir = config
        .get_non_empty_or_default("client", "save_dir", ".")
        .to_string();

    let logger = Logger::start_client(1024, config.clone());
    let log_sink: Arc<dyn LogSink> = Arc::new(logger.handle());

    // --- Connect and claim a username --------------------------------------
    let mut pending = match PendingClient::connect(&addr, &save_dir, log_sink.clone()) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Could not connect to server ({e})");
            process::exit(1);
        }
    };

    let mut prompt = "Enter a username: ";
    loop {
        let Some(username) = read_line_trimmed(prompt)? else {
            eprintln!("[relay_client] no username given");
            process::exit(1);
        };
        if username.is_empty() {
            continue;
        }

        match pending.claim_username(&username) {
            Ok(ClaimResult::Accepted { welcome }) => {
                println!("{welcome}");
                break;
            }
            Ok(ClaimResult::Taken { current_users }) => {
                println!("This username is already taken");
                println!(
                    "Current users connected to the server: {}",
                    current_users.join(", ")
                );
                prompt = "Enter a new username: ";
            }
            Err(e) => {
                eprintln!("[relay_client] {e}");
                process::exit(1);
            }
        }
    }

    let (mut client, events) = match pending.start() {
        Ok(pair) => pair,
        Err(e) => {
            eprintln!("[relay_client] {e}");
            process::exit(1);
        }
    };
    let download_dir = Path::new(&save_dir).join(client.username());

    // PRINTER THREAD: renders server events until the connection drops.
    thread::spawn(move || {
        for event in events {
            match event {
                ClientEvent::Message { sender, text } => match sender {
                    Some(name) => println!("{name}: {text}"),
                    None => println!("{text}"),
                },
                ClientEvent::Announcement(text) => println!("{text}"),
                ClientEvent::FileList(files) => {
                    println!("Available files:");
                    for file in files {
                        println!("{file}");
                    }
                }
                ClientEvent::Downloaded { path, .. } => {
                    println!("File saved to: {}", path.display());
                }
                ClientEvent::Disconnected => {
                    println!("Disconnected from the server");
                    process::exit(0);
                }
            }
        }
    });

    // --- Command loop -------------------------------------------------------
    //
    //   /disconnect           leave the chat
    //   /msg <user> <text>    direct message
    //   /list_files           list downloadable files
    //   /download <name>      fetch a file
    //   anything else         broadcast to everyone

    loop {
        let Some(line) = read_line_trimmed("")? else {
            client.disconnect();
            println!("Disconnected from the server");
            return Ok(());
        };
        if line.is_empty() {
            continue;
        }

        let sent = if line == "/disconnect" {
            client.disconnect();
            println!("Disconnected from the server");
            return Ok(());
        } else if let Some(rest) = line.strip_prefix("/msg ") {
            match rest.split_once(' ') {
                Some((user, text)) if !text.trim().is_empty() => {
                    if user == client.username() {
                        println!("Select someone other than yourself to directly message");
                        continue;
                    }
                    client.send_direct(user, text.trim())
                }
                _ => {
                    println!("Usage: /msg <user> <message>");
                    continue;
                }
            }
        } else if line == "/list_files" {
            client.request_file_list()
        } else if let Some(name) = line.strip_prefix("/download ") {
            let name = name.trim();
            if name.is_empty() {
                println!("Usage: /download <filename>");
                continue;
            }
            println!("File will be saved to: {}", download_dir.join(name).display());
            client.request_download(name)
        } else {
            client.send_broadcast(&line)
        };

        if let Err(e) = sent {
            eprintln!("[relay_client] send failed: {e}");
            println!("Disconnected from the server");
            return Ok(());
        }
    }
}
