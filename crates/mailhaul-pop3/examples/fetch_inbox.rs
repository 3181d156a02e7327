#![allow(clippy::expect_used, clippy::uninlined_format_args)]
//! Example: Fetch a maildrop over POP3
//!
//! Connects to a POP3 server, authenticates, and prints the maildrop
//! listing plus the headers of the newest message.
//!
//! ## Prerequisites
//!
//! Most providers require an app password for POP3 access (for Gmail,
//! enable two-step verification and generate one under "App passwords";
//! POP must also be enabled in the Gmail settings).
//!
//! ## Running
//!
//! ```bash
//! cargo run --package mailhaul-pop3 --example fetch_inbox
//! ```
//!
//! Set `RUST_LOG=mailhaul_pop3=trace` to see protocol diagnostics.

use std::io::{self, Write};

use mailhaul_pop3::{Config, Pop3Client, Security};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn prompt(label: &str) -> Result<String, io::Error> {
    print!("{}: ", label);
    io::stdout().flush()?;
    let mut value = String::new();
    io::stdin().read_line(&mut value)?;
    Ok(value.trim().to_string())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mailhaul_pop3=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    println!("mailhaul - POP3 fetch test");
    println!("==========================\n");

    let host = prompt("POP3 server (e.g. pop.gmail.com)")?;
    let user = prompt("Email address")?;
    let password = prompt("App password")?;

    println!("\nConnecting to {}...", host);
    let config = Config::builder(&host).security(Security::Auto).build();
    let mut client = Pop3Client::connect(config).await?;
    println!("✓ Connected (secure: {})", client.is_secure());

    println!("Authenticating as {}...", user);
    client.authenticate(&user, &password).await?;
    println!("✓ Authenticated\n");

    let count = client.message_count().await?;
    println!(
        "{} messages, {} octets total",
        count,
        client.maildrop_size()
    );

    let sizes = client.message_sizes().await?;
    for (index, size) in sizes.iter().enumerate() {
        println!("  message {}: {} bytes", index + 1, size);
    }

    if count > 0 {
        let newest = count as usize - 1;
        println!("\nHeaders of message {}:", count);
        let headers = client.get_message_headers(newest).await?;
        print!("{}", String::from_utf8_lossy(&headers));
    }

    println!("\nDisconnecting...");
    client.disconnect(true).await?;
    println!("✓ Disconnected");

    Ok(())
}
