//! Standalone client binary for talking to a framekv server
//!
//! Provides a small interactive shell for set/get against a running server

use clap::Parser;
use framekv::Client;
use std::io::{self, Write};

#[derive(Debug, Parser)]
#[command(name = "framekv-client", version, about = "framekv interactive client")]
struct Args {
    /// Server address to connect to
    #[arg(default_value = "127.0.0.1:8080")]
    addr: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    println!("Connecting to framekv server at {}...", args.addr);
    let mut client = Client::connect(&args.addr).await?;
    println!("Connected! Type 'help' for available commands or 'quit' to exit.");

    loop {
        print!("> ");
        io::stdout().flush()?;

        let mut input = String::new();
        io::stdin().read_line(&mut input)?;
        let input = input.trim();

        if input.is_empty() {
            continue;
        }

        match input {
            "quit" | "exit" => {
                println!("Goodbye!");
                break;
            }
            "help" => {
                print_help();
            }
            _ => {
                if let Err(e) = handle_command(&mut client, input).await {
                    println!("Error: {}", e);
                }
            }
        }
    }

    client.close().await?;
    Ok(())
}

async fn handle_command(client: &mut Client, input: &str) -> Result<(), Box<dyn std::error::Error>> {
    let parts: Vec<&str> = input.split_whitespace().collect();

    match parts.first() {
        Some(&"set") => {
            if parts.len() != 3 {
                println!("Usage: set <key> <value>");
                return Ok(());
            }

            client.set(parts[1], parts[2]).await?;
            println!("OK");
        }
        Some(&"get") => {
            if parts.len() != 2 {
                println!("Usage: get <key>");
                return Ok(());
            }

            match client.get(parts[1]).await? {
                Some(value) => println!("{}", value),
                None => println!("(nil)"),
            }
        }
        _ => {
            println!(
                "Unknown command: {}. Type 'help' for available commands.",
                parts[0]
            );
        }
    }

    Ok(())
}

fn print_help() {
    println!("Available commands:");
    println!("  set <key> <value>  - Set a key-value pair");
    println!("  get <key>          - Get value by key");
    println!("  help               - Show this help message");
    println!("  quit               - Exit the client");
}
