/// TrustMesh binding service entry point
use trustmesh_binding::{
    config::{LogFormat, LoggingConfig, ServiceConfig},
    server, AppContext, ServiceResult,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> ServiceResult<()> {
    // Load configuration
    let config = ServiceConfig::from_env()?;

    // Initialize logging
    init_tracing(&config.logging);

    print_banner();

    // Create application context
    let ctx = AppContext::new(config).await?;

    // Start server
    server::serve(ctx).await?;

    Ok(())
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_new(&logging.filter)
        .unwrap_or_else(|_| "trustmesh_binding=info,tower_http=info".into());

    let (json, pretty) = match logging.format {
        LogFormat::Json => (Some(tracing_subscriber::fmt::layer().json()), None),
        LogFormat::Pretty => (None, Some(tracing_subscriber::fmt::layer())),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(json)
        .with(pretty)
        .init();
}

fn print_banner() {
    println!(
        r#"
  _____              _   __  __           _
 |_   _| __ _   _ ___| |_|  \/  | ___  ___| |__
   | || '__| | | / __| __| |\/| |/ _ \/ __| '_ \
   | || |  | |_| \__ \ |_| |  | |  __/\__ \ | | |
   |_||_|   \__,_|___/\__|_|  |_|\___||___/_| |_|

        Identity binding service v{}
        "#,
        env!("CARGO_PKG_VERSION")
    );
}
