#[tokio::main]
async fn main() {
    if let Err(err) = attention_tracker_lib::run().await {
        log::error!("attention-tracker failed: {err:#}");
        std::process::exit(1);
    }
}
