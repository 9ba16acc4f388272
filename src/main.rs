use std::env;

use anyhow::Context;
use log::{error, info};

use fedsa::{SimConfig, SimulationBuilder};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let path = env::args()
        .nth(1)
        .context("usage: fedsa <config.json>")?;

    let config =
        SimConfig::from_path(&path).with_context(|| format!("cannot load config from '{path}'"))?;

    let mut simulation = SimulationBuilder::new()
        .build(config)
        .context("cannot build the simulation")?;

    let log = match simulation.run().await {
        Ok(log) => log,
        Err(e) => {
            error!("simulation aborted after {} rounds: {e}", simulation.reports().len());
            return Err(e).context("simulation failed");
        }
    };

    if let Some(last) = log.last() {
        info!(clock = last.clock, accuracy = last.accuracy; "simulation finished");
    }

    Ok(())
}
