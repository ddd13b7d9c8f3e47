//! Snapshot demo - query the current state of matching entities.
//!
//! ```text
//! cargo run --example snapshot -- <host> <port> <uri-pattern> [attribute-pattern...]
//! ```

use grail_client::ClientWorldConnection;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 4 {
        eprintln!(
            "usage: {} <host> <port> <uri-pattern> [attribute-pattern...]",
            args[0]
        );
        std::process::exit(1);
    }
    let host = &args[1];
    let port: u16 = args[2].parse()?;
    let uri_pattern = &args[3];
    let attribute_patterns: Vec<&str> = if args.len() > 4 {
        args[4..].iter().map(String::as_str).collect()
    } else {
        vec![".*"]
    };

    let wm = ClientWorldConnection::connect(host, port).await?;

    let response = wm.snapshot_request(uri_pattern, &attribute_patterns, 0, 0)?;
    let slot = response.get().await?;

    if slot.is_empty() {
        println!("no entities matched {uri_pattern}");
    }
    for (uri, attributes) in &slot {
        println!("{uri}:");
        for attribute in attributes {
            println!("    {attribute}");
        }
    }
    Ok(())
}
