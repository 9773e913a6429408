//! Receiving side

use std::path::Path;

use anyhow::{Context, Result};
use secret_receiver::{Delivered, Receiver, ReceiverConfig, deliver};

pub async fn run(url: &str, output: Option<&Path>) -> Result<()> {
    let receiver = Receiver::new(ReceiverConfig::default())?;
    eprintln!("Fetching secret...");
    let secret = receiver.receive(url).await?;

    let received_dir = receiver.config().received_dir.as_deref();
    match deliver(&secret, output, received_dir)
        .await
        .context("Failed to save secret")?
    {
        Delivered::Saved(path) => eprintln!("Saved to {}", path.display()),
        Delivered::Inline(text) => {
            eprintln!("Secret received:\n");
            println!("{}", text);
        }
    }
    Ok(())
}
