//! Health Monitoring
//!
//! Demonstrates polling `HealthRegistry::check_all()` on a cadence, the way
//! an operator would wire it into a readiness probe.
//!
//! Run with: cargo run --example health_monitoring

use tandem_cache::{CacheConfig, CacheSystemBuilder, HealthStatus};
use std::time::Duration;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    println!("=== Tandem Cache: Health Monitoring ===\n");

    let config = CacheConfig::default().with_namespace("demo_health");
    let cache = CacheSystemBuilder::new(config).build().await?;

    println!("Starting health monitoring (5 checks)...\n");

    for i in 1..=5 {
        println!("Health Check #{i}");
        let reports = cache.health.check_all().await;

        let all_healthy = reports.iter().all(|r| r.status == HealthStatus::Healthy);
        if all_healthy {
            println!("   Overall: HEALTHY");
        } else {
            println!("   Overall: DEGRADED");
        }

        for report in &reports {
            println!("   - {} [{:?}] latency={:?} {}", report.probe_name, report.status, report.latency, report.details);
        }
        println!();

        if i < 5 {
            tokio::time::sleep(Duration::from_secs(1)).await;
        }
    }

    println!("=== Notes ===");
    println!("- A Degraded remote probe means L2 is unreachable; reads fall back to L1-only behavior.");
    println!("- An Unhealthy local probe is the more serious signal: the in-process tier itself is broken.");

    Ok(())
}
