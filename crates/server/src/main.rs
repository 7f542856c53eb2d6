#[tokio::main]
async fn main() -> anyhow::Result<()> {
    pulse_server::run().await
}
