//! Stream demo - follow live updates for matching entities until the
//! stream completes or ctrl-c.
//!
//! ```text
//! cargo run --example stream_watch -- <host> <port> <uri-pattern> [interval-ms]
//! ```

use grail_client::ClientWorldConnection;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 4 {
        eprintln!("usage: {} <host> <port> <uri-pattern> [interval-ms]", args[0]);
        std::process::exit(1);
    }
    let host = &args[1];
    let port: u16 = args[2].parse()?;
    let uri_pattern = &args[3];
    let interval: u64 = args.get(4).map(|s| s.parse()).transpose()?.unwrap_or(1000);

    let wm = ClientWorldConnection::connect(host, port).await?;
    let stream = wm.stream_request(uri_pattern, &[".*"], interval)?;

    let watcher = async {
        while !stream.is_complete() {
            let slot = stream.next().await?;
            for (uri, attributes) in &slot {
                println!("{uri}:");
                for attribute in attributes {
                    println!("    {attribute}");
                }
            }
        }
        Ok::<_, grail_client::GrailError>(())
    };

    tokio::select! {
        result = watcher => result?,
        _ = tokio::signal::ctrl_c() => {
            stream.cancel();
            println!("cancelled");
        }
    }
    Ok(())
}
