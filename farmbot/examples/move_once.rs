//! Single move example: one relative Z move and back

use farmbot::{Config, Farmbot, Offset, TokenClient};

#[tokio::main]
async fn main() -> farmbot::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let config = Config::from_env()?;

    let token = TokenClient::new(&config.server)?
        .create_token(&config.credentials)
        .await?;
    println!("✓ Got token");

    let mut bot = Farmbot::new(token)
        .with_mqtt_port(config.mqtt_port)
        .with_timeout(config.rpc_timeout);

    bot.connect().await?;
    println!("✓ Connected to {}", bot.bot_id().unwrap_or_default());

    bot.move_relative(Offset::z(1.0)).await?;
    println!("✓ Moved up");

    bot.move_relative(Offset::z(-1.0)).await?;
    println!("✓ Moved down");

    bot.disconnect().await?;
    println!("✓ Disconnected");

    Ok(())
}
