//!
//! clinic-gate CLI binary
//! ----------------------
//! Sign in against the clinic API, inspect the stored session and ask the route
//! guard what a navigation would do. `--repl` keeps one session open and follows
//! token changes made by other processes sharing the same storage file.

use std::env;
use std::io::{self, Write};

use anyhow::{Context, Result};

use clinic_gate::cli::{parse_command, Cli, Command, USAGE};
use clinic_gate::config::{has_flag, GateConfig};

fn main() -> Result<()> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .try_init();

    let mut args: Vec<String> = env::args().collect();
    let _program = args.remove(0);

    if has_flag(&args, "--help") || has_flag(&args, "-h") {
        println!("{}", USAGE);
        return Ok(());
    }

    let config = GateConfig::from_env().apply_args(&args).map_err(anyhow::Error::new)?;
    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;
    let cli = Cli::open(config.clone()).map_err(anyhow::Error::new)?;

    if has_flag(&args, "--repl") {
        return run_repl(rt, cli, &config);
    }

    let cmd = parse_command(&args).map_err(anyhow::Error::new)?;
    match rt.block_on(cli.run(cmd)) {
        Ok(out) => {
            println!("{}", out);
            Ok(())
        }
        Err(e) => {
            eprintln!("error: {}", e.message());
            std::process::exit(if e.is_access_denial() { 2 } else { 1 });
        }
    }
}

fn run_repl(rt: tokio::runtime::Runtime, cli: Cli, config: &GateConfig) -> Result<()> {
    let watcher = {
        let _guard = rt.enter();
        cli.store().spawn_storage_watcher(config.storage_poll_interval())
    };
    let notifier = {
        let mut rx = cli.store().subscribe();
        rt.spawn(async move {
            rx.borrow_and_update();
            while rx.changed().await.is_ok() {
                let s = rx.borrow_and_update().clone();
                match s.principal {
                    Some(p) => eprintln!("\n[session] now {} ({})", p.display_name(), p.role),
                    None => eprintln!("\n[session] signed out"),
                }
            }
        })
    };

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut input = String::new();
    println!("clinic-gate interpreter. Type 'help' for commands, 'quit' to leave.");
    loop {
        input.clear();
        print!("> ");
        let _ = stdout.flush();
        match stdin.read_line(&mut input) {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }
        let line = input.trim();
        if line.is_empty() { continue; }
        if line.eq_ignore_ascii_case("quit") || line.eq_ignore_ascii_case("exit") { break; }
        let words: Vec<String> = line.split_whitespace().map(str::to_string).collect();
        let cmd = match parse_command(&words) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("{}", e.message());
                continue;
            }
        };
        if cmd == Command::Help {
            println!("{}", USAGE);
            continue;
        }
        match rt.block_on(cli.run(cmd)) {
            Ok(out) => println!("{}", out),
            Err(e) => eprintln!("error: {}", e.message()),
        }
    }
    watcher.abort();
    notifier.abort();
    Ok(())
}
