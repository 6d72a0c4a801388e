//! Basic GCRA rate limiting demo.

use std::time::Duration;
use throttle_core::{AlgorithmKind, MemoryStore, Quota, Store, Throttle};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let throttle = Throttle::builder(Store::Memory(MemoryStore::new()))
        .algorithm(AlgorithmKind::Gcra)
        .quota(Quota::per_second(10).with_burst(5))
        .key("user:123")
        .build();

    println!("=== Basic GCRA Rate Limiting Demo ===\n");
    println!("Quota: 10 requests/second, burst: 5\n");

    for i in 1..=15 {
        let decision = throttle.limit(None, None, None).await?;

        if decision.is_allowed() {
            println!("Request {i}: allowed (remaining: {})", decision.remaining);
        } else {
            println!("Request {i}: denied (retry after: {:?})", decision.retry_after);
        }
    }

    println!("\n--- Waiting 1 second for recovery ---\n");
    tokio::time::sleep(Duration::from_secs(1)).await;

    let decision = throttle.limit(None, None, None).await?;
    println!(
        "After recovery: {} (remaining: {})",
        if decision.is_allowed() { "allowed" } else { "denied" },
        decision.remaining
    );

    Ok(())
}
