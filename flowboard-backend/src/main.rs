#[tokio::main]
async fn main() {
    if let Err(e) = flowboard_backend::run().await {
        log::error!(target: "flowboard.server", "Backend failed: {}", e);
        eprintln!("flowboard-backend: {}", e);
        std::process::exit(1);
    }
}
