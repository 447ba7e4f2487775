use microplan::startup;
use tracing::info;

#[tokio::main]
async fn main() -> miette::Result<()> {
    // Initialize logging
    startup::init_logging()?;

    info!("Starting microplan");

    // Load configuration
    let config = startup::load_config().await?;

    // Parse the requested command
    let command = startup::parse_args(std::env::args().skip(1))?;

    // Run it
    startup::run(config, command).await
}
