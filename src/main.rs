use hemmer_provider_dataarts::{init_logging, serve, DataArtsProvider};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "starting DataArts provider");
    serve(DataArtsProvider::new()).await
}
