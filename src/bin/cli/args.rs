use clap::Parser;

#[derive(Parser)]
#[command(name = "stomp")]
#[command(version)]
#[command(about = "Interactive STOMP client")]
pub struct Cli {
    /// Broker URL: ws://, wss:// or tcp://host:port
    #[arg(short, long, default_value = "ws://127.0.0.1:15674/ws")]
    pub url: String,

    /// Login username
    #[arg(short, long, default_value = "guest")]
    pub login: String,

    /// Passcode
    #[arg(short, long, default_value = "guest")]
    pub passcode: String,

    /// Virtual host sent in the `host` header
    #[arg(long)]
    pub host: Option<String>,

    /// Heartbeat settings (client-send,client-receive in ms)
    #[arg(long, default_value = "10000,10000")]
    pub heartbeat: String,

    /// Destinations to subscribe to (can be specified multiple times)
    #[arg(short, long)]
    pub subscribe: Vec<String>,

    /// Seconds between reconnect attempts; 0 disables reconnecting
    #[arg(long, default_value_t = 1)]
    pub reconnect: u64,

    /// Default log filter when RUST_LOG is unset
    #[arg(long, default_value = "warn")]
    pub log: String,
}

impl Cli {
    /// Parse `--heartbeat` as `cx,cy`.
    pub fn heartbeat(&self) -> Result<(u64, u64), String> {
        let (cx, cy) = self
            .heartbeat
            .split_once(',')
            .ok_or_else(|| format!("invalid heartbeat '{}': expected cx,cy", self.heartbeat))?;
        let parse = |s: &str| {
            s.trim()
                .parse::<u64>()
                .map_err(|e| format!("invalid heartbeat '{}': {}", self.heartbeat, e))
        };
        Ok((parse(cx)?, parse(cy)?))
    }
}
