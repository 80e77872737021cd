/// Demo that streams transactions touching the given addresses until the
/// session auto-closes. Reads the api key from HELIUS_API_KEY and addresses
/// from the command line; an address prefixed with `req:` is required.
use solana_tx_subscribe::{
    registry::AddressRegistry,
    rpc::{build, NotificationView, SubscriptionOptions},
    session::{SessionConfig, SessionController, SessionEvent},
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let api_key = std::env::var("HELIUS_API_KEY")?;

    let mut registry = AddressRegistry::new();
    for argument in std::env::args().skip(1) {
        match argument.strip_prefix("req:") {
            Some(address) => registry.add(address, true)?,
            None => registry.add(&argument, false)?,
        };
    }
    if registry.is_empty() {
        eprintln!("usage: stream_transactions [req:]<address>...");
        return Ok(());
    }

    let (required, included) = registry.partition();
    let request = build(&required, &included, &SubscriptionOptions::default());

    let (handle, mut events) = SessionController::spawn(SessionConfig::atlas(&api_key)?);
    handle.start(request)?;

    while let Some(event) = events.recv().await {
        match event {
            SessionEvent::Connected => println!("WebSocket is open"),
            SessionEvent::Notification(value) => {
                let view = NotificationView(&value);
                match view.signature() {
                    Some(signature) => println!(
                        "{} sig={} cu={:?} fee={:?} SOL",
                        view.method().unwrap_or("notification"),
                        signature,
                        view.compute_units_consumed(),
                        view.fee_sol(),
                    ),
                    // The subscription ack has no params; print it raw.
                    None => println!("ack: {}", value),
                }
            }
            SessionEvent::Closed(reason) => {
                println!("WebSocket is closed ({:?})", reason);
                break;
            }
        }
    }

    println!("received {} frames", handle.with_notifications(|sink| sink.len()));
    Ok(())
}
