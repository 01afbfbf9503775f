//! Operator Console (§4.J): an interactive REPL over the Command Service.
//! One line in, one reply line out — `status | go | nogo | abort | throttle
//! <N> | quit | exit`.

use clap::{App, Arg};
use colored::*;
use sls_core::{client_send, OperatorCommand};
use std::io::{self, BufRead, Write};

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: &str = "7878";

#[tokio::main]
async fn main() {
    let matches = App::new("sls-console")
        .version("0.1.0")
        .author("Launch Systems Engineering Team")
        .about("Operator console for the launch vehicle Command Service")
        .arg(
            Arg::with_name("host")
                .long("host")
                .value_name("HOST")
                .help("Command Service host")
                .takes_value(true)
                .default_value(DEFAULT_HOST),
        )
        .arg(
            Arg::with_name("port")
                .long("port")
                .value_name("PORT")
                .help("Command Service port")
                .takes_value(true)
                .default_value(DEFAULT_PORT),
        )
        .get_matches();

    let host = matches.value_of("host").unwrap().to_string();
    let port: u16 = matches
        .value_of("port")
        .unwrap()
        .parse()
        .expect("port must be a number");

    println!(
        "{}",
        format!("sls-console connected to {host}:{port}").bright_blue()
    );
    println!("{}", "commands: status | go | nogo | abort | throttle <N> | quit | exit".dimmed());

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut had_failure = false;
    loop {
        print!("> ");
        let _ = stdout.flush();

        let mut line = String::new();
        if stdin.lock().read_line(&mut line).unwrap_or(0) == 0 {
            break;
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "quit" || line == "exit" {
            break;
        }

        let command = match parse_command(line) {
            Ok(c) => c,
            Err(msg) => {
                println!("{}", msg.yellow());
                continue;
            }
        };

        match client_send(&host, port, command).await {
            Ok(reply) => {
                println!(
                    "{}",
                    format!(
                        "ok={} go={} throttle={}",
                        reply.ok as u8, reply.mission_go as u8, reply.throttle
                    )
                    .bright_green()
                );
            }
            Err(_) => {
                // §7: the console surfaces transport failures and continues
                // accepting commands; §6 still requires a non-zero exit code
                // if any failure occurred by the time the session ends.
                eprintln!("{}", "Failed to contact FCC".bright_red());
                had_failure = true;
            }
        }
    }
    if had_failure {
        std::process::exit(1);
    }
}

fn parse_command(line: &str) -> Result<OperatorCommand, String> {
    let mut parts = line.split_whitespace();
    let head = parts.next().unwrap_or("");
    match head {
        "status" => Ok(OperatorCommand::Status),
        "go" => Ok(OperatorCommand::Go),
        "nogo" => Ok(OperatorCommand::NoGo),
        "abort" => Ok(OperatorCommand::Abort),
        "throttle" => {
            let value = parts
                .next()
                .ok_or_else(|| "usage: throttle <N>".to_string())?;
            // §4.J: out-of-range N is accepted here, not rejected — the
            // service clamps to 0..=100. Parse as i32 (the wire value type)
            // so a negative N still reaches the service instead of failing
            // to parse as a u8 locally.
            let value: i32 = value
                .parse()
                .map_err(|_| "throttle value must be an integer".to_string())?;
            Ok(OperatorCommand::Throttle(value.clamp(0, 255) as u8))
        }
        other => Err(format!("unrecognized command: {other}")),
    }
}
