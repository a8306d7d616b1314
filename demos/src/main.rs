//! P-DQN Lane-Change Demos
//!
//! ```bash
//! # Train on the three-lane toy road (default 200 episodes)
//! cargo run --release -- lane-change
//!
//! # Custom episode count
//! cargo run --release -- lane-change 50
//!
//! # GPU backend
//! cargo run --release --features wgpu -- lane-change
//! ```
//!
//! Logging follows `RUST_LOG` (default `info`).

mod toy_road;

use std::path::PathBuf;

use burn::backend::Autodiff;

use pdqn::nn::{LaneActorNet, LaneCriticNet, LaneNetConfig};
use pdqn::{
    create_optimizers, ActionParamLayout, CSVLogger, CheckpointerConfig, ConsoleLogger,
    MultiLogger, PDQNAgent, PDQNConfig, Result, Trainer, TrainerConfig,
};

use toy_road::ToyRoad;

#[cfg(not(feature = "wgpu"))]
type B = Autodiff<burn::backend::NdArray>;
#[cfg(feature = "wgpu")]
type B = Autodiff<burn::backend::Wgpu>;

const DEFAULT_EPISODES: usize = 200;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() > 1 {
        match args[1].as_str() {
            "lane-change" => {
                let episodes = match args.get(2).map(|s| s.parse::<usize>()) {
                    None => DEFAULT_EPISODES,
                    Some(Ok(n)) => n,
                    Some(Err(_)) => {
                        println!("Invalid episode count: {}", args[2]);
                        print_usage();
                        return;
                    }
                };
                if let Err(e) = run_lane_change(episodes) {
                    log::error!("training failed: {}", e);
                    std::process::exit(1);
                }
            }
            _ => {
                println!("Unknown demo: {}", args[1]);
                println!();
                print_usage();
            }
        }
    } else {
        print_usage();
    }
}

fn run_lane_change(episodes: usize) -> Result<()> {
    let device = Default::default();

    let net = LaneNetConfig::default().with_hidden_dim(128);
    let layout = ActionParamLayout::lane_change();
    let config = PDQNConfig::lane_change()
        .with_buffer_capacity(50_000)
        .with_min_buffer_size(1_000);

    let actor = LaneActorNet::<B>::new(&net, layout.param_dim(), &device);
    let critic = LaneCriticNet::<B>::new(&net, layout.param_dim(), layout.num_actions(), &device);
    let (actor_opt, critic_opt) = create_optimizers::<B, _, _>(&config);
    let mut agent = PDQNAgent::new(actor, critic, actor_opt, critic_opt, layout, config, device)?;

    let mut env = ToyRoad::new(net.space, 42);

    let out_dir = PathBuf::from("runs/lane_change");
    let trainer_config = TrainerConfig::new(episodes)
        .with_max_steps_per_episode(300)
        .with_pretrain_checkpoint_step(Some(1_000))
        .with_checkpoint(
            CheckpointerConfig::new(out_dir.join("checkpoints"))
                .with_save_interval(20)
                .with_keep_last_n(3),
        );
    if let Some(dir) = trainer_config.checkpoint_dir() {
        log::info!("checkpoints in {}", dir.display());
    }
    let mut trainer = Trainer::new(trainer_config)?;

    let mut logger = MultiLogger::new().add(ConsoleLogger::new(10));
    let csv = std::fs::create_dir_all(&out_dir).and_then(|_| CSVLogger::new(out_dir.join("metrics.csv")));
    match csv {
        Ok(csv) => logger = logger.add(csv),
        Err(e) => log::warn!("csv metrics disabled: {}", e),
    }

    let summary = trainer.run(&mut agent, &mut env, &mut logger)?;

    println!();
    println!("=== Summary ===");
    println!(
        "Episodes: {}, Env steps: {}, Learn steps: {}, Stored: {}",
        summary.episodes, summary.env_steps, summary.learn_steps, summary.stored
    );
    println!("Mean reward (last 20): {:.3}", summary.recent_mean_reward(20));
    Ok(())
}

fn print_usage() {
    println!("P-DQN Lane-Change Demos");
    println!();
    println!("Usage: pdqn-demos <demo> [episodes]");
    println!();
    println!("Demos:");
    println!("  lane-change    Train on a three-lane toy road");
}
