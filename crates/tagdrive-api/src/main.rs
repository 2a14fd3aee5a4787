use tagdrive_api::setup;
use tagdrive_core::Config;

// Use mimalloc as the global allocator for better performance and lower fragmentation,
// especially when running on musl-based systems inside containers.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize the application (stores, routes)
    let (state, router) = setup::initialize_app(config.clone()).await?;

    let auth_sweeper = state.stores.start_background_jobs().await;

    // Start the server
    let served = setup::server::start_server(&config, router).await;

    state.stores.shutdown(Some(auth_sweeper)).await;
    tagdrive_infra::shutdown_telemetry().await;

    served
}
