use anyhow::Context;
use burn::tensor::backend::Backend;
use clap::Parser;
use log::info;

use rltools_runner::cli::RunnerArgs;
use rltools_runner::rl_env::point_rendezvous::PointRendezvous;
use rltools_runner::runner::RunnerAssembler;
use rltools_runner::DefaultBackend;

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut args = RunnerArgs::parse();
    if args.log.is_none() {
        let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
        args.log = Some(format!("data/experiment_{}", stamp));
    }
    if let Some(seed) = args.seed {
        DefaultBackend::seed(seed);
        info!("tensor backend seeded with {}", seed);
    }
    if args.n_agents == 0 {
        anyhow::bail!("--n-agents must be at least 1");
    }
    if !(args.obs_noise >= 0.0) {
        anyhow::bail!("--obs-noise must be a non-negative number");
    }
    let env = PointRendezvous::new(args.n_agents, args.discrete).with_obs_noise(args.obs_noise);

    let config = args.into_config().context("invalid runner options")?;
    let mut runner = RunnerAssembler::<PointRendezvous, DefaultBackend>::new(env, config)
        .context("failed to assemble the runner")?;
    let summary = runner.run().context("training failed")?;
    info!(
        "finished {} iterations, {} timesteps, last mean return {:.4}",
        summary.iterations, summary.total_timesteps, summary.last_mean_return
    );
    Ok(())
}
