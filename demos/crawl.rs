use std::{str::FromStr, time::Duration};

use mainline_crawl::{Config, Crawler, Id};

use clap::Parser;

use tracing::Level;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// info_hash to crawl peers for
    infohash: String,
    /// UDP port to listen on, defaults to UDP_PORT or 6881
    #[arg(short, long)]
    port: Option<u16>,
    /// Seconds to keep crawling
    #[arg(short, long, default_value_t = 60)]
    ttl: u64,
}

fn main() {
    tracing_subscriber::fmt()
        // Switch to DEBUG to see every new peer and node as it is found
        .with_max_level(Level::INFO)
        .init();

    let cli = Cli::parse();

    let info_hash = Id::from_str(cli.infohash.as_str()).expect("Expected info_hash");

    let crawler = Crawler::new(Config {
        port: cli.port,
        ttl: Duration::from_secs(cli.ttl),
        ..Default::default()
    })
    .expect("Failed to bind UDP socket");

    println!("Crawling {} for {} seconds ...", info_hash, cli.ttl);

    match crawler.crawl(info_hash) {
        Ok(report) => {
            println!("\n=== PEERS ({}) ===", report.peers().len());
            for peer in report.peers() {
                println!("{}", peer);
            }

            println!("\n=== NODES ({}) ===", report.nodes().len());
            for node in report.nodes() {
                println!("{}", node);
            }
        }
        Err(error) => eprintln!("Crawl failed: {}", error),
    }
}
