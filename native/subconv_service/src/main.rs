use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    subconv_service::logger::init_logger();
    subconv_service::run().await
}
