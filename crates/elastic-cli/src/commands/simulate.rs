use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use elastic_core::headless::{GestureScript, Simulation};
use elastic_core::ElasticConfig;

pub async fn run(config: &ElasticConfig, path: &Path, realtime: bool, json: bool) -> Result<()> {
    let script = GestureScript::load(path)
        .with_context(|| format!("Failed to load gesture script {}", path.display()))?;
    info!("Replaying {} steps from {}", script.steps.len(), path.display());

    let mut simulation = Simulation::new(&script, &config.bounce, &config.simulation);

    if json {
        let report = simulation.run();
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let mut ticker = realtime.then(|| tokio::time::interval(simulation.frame_interval()));
    let mut peak: f64 = 1.0;
    let mut frames = 0usize;

    while let Some(frame) = simulation.step() {
        if let Some(ticker) = ticker.as_mut() {
            ticker.tick().await;
        }
        peak = peak.max(frame.rendered_scale);
        frames += 1;
        println!("{}", frame);
    }

    let status = simulation.fleet().status();
    println!();
    println!("Frames:     {}", frames);
    println!("Peak scale: {:.4}", peak);
    println!("Status:     {}", status);

    if status.is_degraded() {
        for failure in status.failures() {
            println!("  - {}", failure);
        }
    }

    Ok(())
}
