use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    edugen_cli::run_cli().await
}
