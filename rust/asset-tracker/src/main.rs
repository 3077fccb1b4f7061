use asset_tracker::telemetry;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    telemetry::init_tracing();
    asset_tracker::run().await
}
