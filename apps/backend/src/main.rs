#[tokio::main]
async fn main() -> anyhow::Result<()> {
    studyhelper_backend::run().await
}
