use std::io::{self, BufRead, Write};
use std::time::Duration;
use stomp_socket::{
    ClientConfig, ConnectOptions, StompClient, StompEvent, TcpTransport, WebSocketTransport,
};
use tokio::sync::mpsc;

use super::args::Cli;
use super::commands::{CommandResult, execute_command, print_help, subscribe_printing};
use super::exit_codes;

/// Run the interactive line-mode client
pub async fn run(cli: &Cli) -> Result<(), (String, u8)> {
    let (cx, cy) = cli
        .heartbeat()
        .map_err(|e| (e, exit_codes::USAGE_ERROR))?;

    let mut options = ConnectOptions::new()
        .login(&cli.login)
        .passcode(&cli.passcode)
        .heartbeat(cx, cy);
    if let Some(host) = &cli.host {
        options = options.host(host);
    }
    let mut config = ClientConfig::new(&cli.url).connect_options(options);
    config = if cli.reconnect == 0 {
        config.no_reconnect()
    } else {
        config.reconnect_interval(Duration::from_secs(cli.reconnect))
    };

    let (client, mut events) = if cli.url.starts_with("tcp://") {
        StompClient::new(TcpTransport::new(), config)
    } else {
        StompClient::new(WebSocketTransport::new(), config)
    };

    println!("Connecting to {}...", cli.url);
    client
        .connect()
        .await
        .map_err(|e| (e.to_string(), exit_codes::NETWORK_ERROR))?;

    // Wait for the first session so startup subscriptions land on it.
    let reconnecting = cli.reconnect != 0;
    loop {
        match events.next().await {
            Some(StompEvent::Connected { session_id }) => {
                println!("Connected (session {}).", session_id.as_deref().unwrap_or("-"));
                break;
            }
            Some(StompEvent::Error { message, .. }) if !reconnecting => {
                return Err((
                    format!("Connection failed: {}", message),
                    exit_codes::NETWORK_ERROR,
                ));
            }
            Some(StompEvent::Error { message, .. }) => eprintln!("{}; retrying", message),
            Some(_) => {}
            None => {
                return Err(("client stopped".to_string(), exit_codes::NETWORK_ERROR));
            }
        }
    }

    for dest in &cli.subscribe {
        subscribe_printing(&client, dest)
            .await
            .map_err(|e| (e, exit_codes::USAGE_ERROR))?;
        println!("Subscribed to: {}", dest);
    }

    tokio::spawn(async move {
        while let Some(event) = events.next().await {
            report_event(&event);
        }
    });

    // Channel to receive user commands from stdin reader
    let (cmd_tx, mut cmd_rx) = mpsc::channel::<String>(16);

    // Spawn blocking stdin reader
    std::thread::spawn(move || {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            match line {
                Ok(l) => {
                    if cmd_tx.blocking_send(l).is_err() {
                        break;
                    }
                }
                Err(_) => break,
            }
        }
    });

    println!();
    print_help();
    println!();

    loop {
        print!("> ");
        let _ = io::stdout().flush();

        let Some(line) = cmd_rx.recv().await else {
            break;
        };

        match execute_command(&line, &client).await {
            CommandResult::Ok => {}
            CommandResult::Quit => break,
            CommandResult::Info(msg) => println!("{}", msg),
            CommandResult::Error(msg) => eprintln!("{}", msg),
        }
    }

    println!("Disconnecting...");
    let _ = client.disconnect().await;
    Ok(())
}

fn report_event(event: &StompEvent) {
    let now = chrono::Local::now().format("%H:%M:%S%.3f");
    match event {
        StompEvent::Error { message, detail } => {
            eprintln!("\n[{}] [ERROR] {}", now, message);
            if let Some(detail) = detail {
                eprintln!("  {}", detail);
            }
        }
        StompEvent::Receipt(id) => println!("\n[{}] receipt {}", now, id),
        StompEvent::Disconnected => println!("\n[{}] disconnected", now),
        StompEvent::Reconnecting { attempt } => {
            println!("\n[{}] reconnecting (attempt {})", now, attempt)
        }
        StompEvent::Connected { .. } => println!("\n[{}] connected", now),
        StompEvent::DecodeError { destination, error } => {
            eprintln!("\n[{}] [{}] undecodable message: {}", now, destination, error)
        }
        StompEvent::SocketOpened | StompEvent::Ping => return,
    }
    print!("> ");
    let _ = io::stdout().flush();
}
