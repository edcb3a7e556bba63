use serde::{Deserialize, Serialize};
use std::time::Duration;
use stomp_socket::{AckMode, ClientConfig, ConnectOptions, StompClient, StompEvent, WebSocketTransport};

#[derive(Debug, Serialize, Deserialize)]
struct Greeting {
    from: String,
    text: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Expects a broker with STOMP over WebSocket on localhost:15674
    // (e.g. RabbitMQ with the web_stomp plugin).
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new("stomp_socket=debug"))
        .init();

    let config = ClientConfig::new("ws://127.0.0.1:15674/ws")
        .connect_options(ConnectOptions::new().login("guest").passcode("guest").heartbeat(10_000, 10_000));
    let (client, mut events) = StompClient::new(WebSocketTransport::new(), config);
    client.connect().await?;

    while let Some(event) = events.next().await {
        if let StompEvent::Connected { .. } = event {
            break;
        }
        println!("event: {:?}", event);
    }

    client
        .subscribe_json("/topic/greetings", AckMode::Auto, |greeting: Greeting, _headers| {
            println!("{} says {}", greeting.from, greeting.text);
        })
        .await?;

    client
        .send_json(
            "/topic/greetings",
            &Greeting {
                from: "quickstart".into(),
                text: "hello".into(),
            },
        )
        .await?;

    // Let the message come back, then close.
    match tokio::time::timeout(Duration::from_secs(2), events.next()).await {
        Ok(Some(event)) => println!("event: {:?}", event),
        Ok(None) => println!("client stopped"),
        Err(_) => {}
    }
    client.disconnect().await?;

    Ok(())
}
