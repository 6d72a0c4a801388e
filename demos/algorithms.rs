//! Algorithm comparison demo.

use throttle_core::{AlgorithmKind, MemoryStore, Quota, Store, Throttle};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let quota = Quota::per_second(5).with_burst(3);

    println!("=== Algorithm Comparison Demo ===\n");
    println!("Quota: 5 requests/second, burst: 3\n");

    for (name, kind) in [
        ("GCRA", AlgorithmKind::Gcra),
        ("Token Bucket", AlgorithmKind::TokenBucket),
        ("Leaking Bucket", AlgorithmKind::LeakingBucket),
        ("Sliding Window", AlgorithmKind::SlidingWindow),
        ("Fixed Window", AlgorithmKind::FixedWindow),
    ] {
        test_algorithm(name, kind, &quota).await?;
    }

    println!("\n=== Algorithm Characteristics ===\n");
    println!("| Algorithm      | Memory | Burst Handling | Best For                |");
    println!("|----------------|--------|----------------|-------------------------|");
    println!("| GCRA           | Low    | Controlled     | Precise rate control    |");
    println!("| Token Bucket   | Low    | Excellent      | Bursty traffic          |");
    println!("| Leaking Bucket | Low    | None           | Smooth output           |");
    println!("| Sliding Window | Low    | Good            | General purpose         |");
    println!("| Fixed Window   | Low    | Poor           | Simple use cases        |");

    Ok(())
}

async fn test_algorithm(name: &str, kind: AlgorithmKind, quota: &Quota) -> Result<(), Box<dyn std::error::Error>> {
    let throttle = Throttle::builder(Store::Memory(MemoryStore::new()))
        .algorithm(kind)
        .quota(*quota)
        .key(format!("test:{}", name.to_lowercase().replace(' ', "_")))
        .build();

    print!("{name:15} | ");

    let mut results = Vec::new();
    for _ in 0..8 {
        let decision = throttle.limit(None, None, None).await?;
        results.push(if decision.is_allowed() { "admit" } else { "deny " });
    }

    println!("{}", results.join(" "));
    Ok(())
}
