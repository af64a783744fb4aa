use highway_sim::{Action, Config, Simulation};
use rand::{Rng, SeedableRng};
use std::time::Instant;

fn main() {
    env_logger::init();

    let mut sim = Simulation::new(Config::default());
    let mut rng = rand::rngs::StdRng::seed_from_u64(0);

    println!("Simulating...");
    for episode in 0..10u64 {
        sim.reset(episode, false);
        let start = Instant::now();
        let mut steps = 0usize;
        let mut total_reward = 0.0;
        loop {
            let step = sim.step(rng.gen_range(0..Action::COUNT));
            steps += 1;
            total_reward += step.reward;
            if step.done {
                break;
            }
        }
        let elapsed = start.elapsed();
        println!(
            "episode {episode}: {steps} steps in {elapsed:?} ({:.0} steps/s), reward {total_reward:.1}, {} lane changes, avg speed {:.1} m/s",
            steps as f64 / elapsed.as_secs_f64(),
            sim.manager().ego_lane_changes(),
            sim.manager().avg_speed(),
        );
    }
}
