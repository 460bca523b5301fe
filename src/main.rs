use tracing::error;

#[tokio::main]
async fn main() {
    if let Err(err) = notion_sync_cli::run().await {
        error!("{err:#}");
        eprintln!("{}", notion_sync_cli::format_error(&format!("{err:#}")));
        std::process::exit(1);
    }
}
