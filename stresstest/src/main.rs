use std::time::Duration;

use crate::client::PhotoClient;
use crate::stresstest::perform_stresstest;
use crate::workload::Workload;

mod client;
mod stresstest;
mod workload;

#[tokio::main]
async fn main() {
    // start the service first: cargo run -p fotka
    let remote = PhotoClient {
        base_url: "http://localhost:3000".into(),
        client: reqwest::Client::new(),
    };
    let workload = Workload::builder("photos")
        .concurrency(32)
        .size_distribution(16 * 1024, 1024 * 1024) // p50 = 16K, p99 = 1M
        .action_weights(49, 2, 49)
        .build();

    perform_stresstest(remote, vec![workload], Duration::from_secs(10))
        .await
        .unwrap();
}
