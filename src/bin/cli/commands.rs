use std::io::{self, Write};
use stomp_socket::{AckMode, Headers, StompClient};

/// Result of executing a command
pub enum CommandResult {
    /// Command executed successfully
    Ok,
    /// Command requests exit
    Quit,
    /// Informational output for the user
    Info(String),
    /// Error executing command
    Error(String),
}

/// Parse and execute a command
pub async fn execute_command(line: &str, client: &StompClient) -> CommandResult {
    let parts: Vec<&str> = line.trim().splitn(3, ' ').collect();
    if parts.is_empty() || parts[0].is_empty() {
        return CommandResult::Ok;
    }

    match parts[0] {
        "quit" | "exit" | "q" => CommandResult::Quit,

        "send" => {
            if parts.len() < 3 {
                return CommandResult::Error("Usage: send <destination> <message>".to_string());
            }
            into_result(client.send(parts[1], parts[2]).await, "Send error")
        }

        "sub" | "subscribe" => {
            if parts.len() < 2 {
                return CommandResult::Error("Usage: sub <destination>".to_string());
            }
            match subscribe_printing(client, parts[1]).await {
                Ok(()) => CommandResult::Info(format!("Subscribed to: {}", parts[1])),
                Err(e) => CommandResult::Error(e),
            }
        }

        "unsub" | "unsubscribe" => {
            if parts.len() < 2 {
                return CommandResult::Error("Usage: unsub <destination>".to_string());
            }
            into_result(client.unsubscribe(parts[1]).await, "Unsubscribe error")
        }

        "begin" | "commit" | "abort" => {
            if parts.len() < 2 {
                return CommandResult::Error(format!("Usage: {} <transaction-id>", parts[0]));
            }
            let result = match parts[0] {
                "begin" => client.begin(parts[1]).await,
                "commit" => client.commit(parts[1]).await,
                _ => client.abort(parts[1]).await,
            };
            into_result(result, "Transaction error")
        }

        "status" => CommandResult::Info(format!("{:?}", client.status())),

        "help" | "?" => {
            print_help();
            CommandResult::Ok
        }

        _ => CommandResult::Error(format!(
            "Unknown command: {}. Type 'help' for commands.",
            parts[0]
        )),
    }
}

fn into_result(result: Result<(), stomp_socket::StompError>, context: &str) -> CommandResult {
    match result {
        Ok(()) => CommandResult::Ok,
        Err(e) => CommandResult::Error(format!("{}: {}", context, e)),
    }
}

/// Subscribe with a handler that prints each message to stdout.
pub async fn subscribe_printing(client: &StompClient, destination: &str) -> Result<(), String> {
    let dest = destination.to_string();
    client
        .subscribe(destination, AckMode::Auto, move |body: &str, headers: &Headers| {
            print_message(&dest, body, headers);
        })
        .await
        .map_err(|e| format!("Failed to subscribe to '{}': {}", destination, e))
}

fn print_message(destination: &str, body: &str, headers: &Headers) {
    let now = chrono::Local::now().format("%H:%M:%S%.3f");
    println!("\n[{}] [{}] MESSAGE received:", now, destination);
    for (k, v) in headers {
        println!("  {}: {}", k, v);
    }
    if !body.is_empty() {
        println!("  Body: {}", body);
    }
    print!("> ");
    let _ = io::stdout().flush();
}

/// Print help text
pub fn print_help() {
    println!("Commands:");
    println!("  send <destination> <message>  - Send a message");
    println!("  sub <destination>             - Subscribe to a destination");
    println!("  unsub <destination>           - Drop a subscription");
    println!("  begin|commit|abort <tx>       - Transaction control");
    println!("  status                        - Show session status");
    println!("  quit                          - Disconnect and exit");
}
