use std::sync::Arc;

use session_refresh::{Config, LogoutHook, SessionClient};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Optional: enable basic logging for the demo
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    // Load configuration from a JSON file placed next to the binary
    let cfg = Config::from_file("config.json")?;
    let on_logout: LogoutHook = Arc::new(|| eprintln!("session expired, please sign in again"));
    let client = SessionClient::from_config(&cfg, on_logout)?;

    if cfg.refresh_token.is_none() {
        let user = std::env::var("SESSION_USERNAME")?;
        let password = std::env::var("SESSION_PASSWORD")?;
        client.login(&user, &password).await?;
    }

    let documents = client.get("/documents").await?;
    println!("{}", documents.text());
    Ok(())
}
