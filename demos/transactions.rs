use stomp_socket::{ClientConfig, ConnectOptions, Headers, StompClient, StompEvent, TcpTransport};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Expects a STOMP broker on localhost:61613 (e.g. RabbitMQ with the stomp plugin).
    let config = ClientConfig::new("tcp://127.0.0.1:61613")
        .connect_options(ConnectOptions::new().login("guest").passcode("guest"))
        .no_reconnect();
    let (client, mut events) = StompClient::new(TcpTransport::new(), config);
    client.connect().await?;

    loop {
        match events.next().await {
            Some(StompEvent::Connected { .. }) => break,
            Some(StompEvent::Error { message, .. }) => return Err(message.into()),
            Some(_) => {}
            None => return Err("client stopped".into()),
        }
    }

    let in_tx = |tx: &str| -> Headers { [("transaction", tx)].into_iter().collect() };

    // Both messages are delivered on commit.
    client.begin("tx-example-1").await?;
    client
        .send_with_headers("/queue/test", "message 1 in transaction", in_tx("tx-example-1"), None)
        .await?;
    client
        .send_with_headers("/queue/test", "message 2 in transaction", in_tx("tx-example-1"), None)
        .await?;
    client.commit("tx-example-1").await?;
    println!("Transaction tx-example-1 committed");

    // Nothing is delivered on abort.
    client.begin("tx-example-2").await?;
    client
        .send_with_headers(
            "/queue/test",
            "this message will be aborted",
            in_tx("tx-example-2"),
            Some("aborted-send"),
        )
        .await?;
    client.abort("tx-example-2").await?;
    println!("Transaction tx-example-2 aborted");

    while let Some(event) = events.next().await {
        if let StompEvent::Receipt(id) = event {
            println!("broker acknowledged {}", id);
            break;
        }
    }

    client.disconnect().await?;
    Ok(())
}
