use crate::config::Config;
use crate::manager::LaneManager;
use crate::risk;
use crate::util::Interval;
use std::time::Instant;

/// Consecutive collision ticks required before the episode ends. A short
/// debounce window rather than instant termination.
const COLLISION_DEBOUNCE: u32 = 3;

/// The reward weight applied outside the rewardable speed band.
const BASELINE_SPEED_WEIGHT: f64 = 0.1;

/// The reward weight inside the rewardable speed band.
const BAND_SPEED_WEIGHT: f64 = 0.8;

/// The reward weight inside the band while also clear of the leftmost lane.
const BAND_OFF_LEFT_WEIGHT: f64 = 1.0;

/// The outcome of evaluating one tick.
#[derive(Clone, Copy, Debug)]
pub(crate) struct RewardOutcome {
    pub reward: f64,
    pub done: bool,
    pub collision: bool,
    pub near_collision_risk: f64,
    pub time_to_collision: f64,
}

/// Combines ego speed, lane preference and collision risk into a bounded
/// scalar reward and the episode-termination signal.
pub(crate) struct RewardModel {
    config: Config,
    /// Ticks evaluated since the last reset.
    ticks: u64,
    /// Episode start, for the wall-clock timeout variant.
    started_at: Instant,
    /// Consecutive ticks with a registered collision.
    collision_streak: u32,
}

impl RewardModel {
    pub fn new(config: &Config) -> Self {
        Self {
            config: *config,
            ticks: 0,
            started_at: Instant::now(),
            collision_streak: 0,
        }
    }

    /// Starts a fresh episode.
    pub fn reset(&mut self) {
        self.ticks = 0;
        self.started_at = Instant::now();
        self.collision_streak = 0;
    }

    /// Evaluates the reward and termination signal for the current tick.
    pub fn evaluate(&mut self, manager: &LaneManager) -> RewardOutcome {
        self.ticks += 1;

        let collision = risk::check_collision(manager, &self.config);
        let near_collision_risk = risk::near_collision_risk(manager, &self.config);
        let time_to_collision = risk::time_to_collision(manager);
        let reward = self.reward(manager, collision, near_collision_risk);

        self.collision_streak = if collision {
            self.collision_streak + 1
        } else {
            0
        };
        let done = self.collision_streak >= COLLISION_DEBOUNCE || self.is_done(manager);

        RewardOutcome {
            reward,
            done,
            collision,
            near_collision_risk,
            time_to_collision,
        }
    }

    fn reward(&self, manager: &LaneManager, collision: bool, near_collision_risk: f64) -> f64 {
        let config = &self.config;
        let ego = manager.ego();
        let rewardable = Interval::new(config.min_rewardable_vel, config.max_rewardable_vel);

        let mut speed_weight = BASELINE_SPEED_WEIGHT;
        if rewardable.contains(ego.speed()) {
            speed_weight = BAND_SPEED_WEIGHT;
            if ego.lane() != 0 && !config.aggressive_driver {
                speed_weight = BAND_OFF_LEFT_WEIGHT;
            }
        }

        // The hazard penalty scales with the continuous risk, so the reward
        // degrades smoothly as the gap closes rather than only on contact.
        let hazard_weight = 10.0 * near_collision_risk;
        let hazard = if collision { 1.0 } else { near_collision_risk };

        let speed_range = config.max_vel - config.min_vel;
        if config.aggressive_driver {
            let centre = Interval::new(config.min_vel, config.max_vel).midpoint();
            let reward = speed_weight * (ego.speed() - centre) / speed_range - hazard_weight * hazard;
            reward.clamp(-1.0, 1.5)
        } else {
            let reward =
                speed_weight * (ego.speed() - config.min_vel) / speed_range - hazard_weight * hazard;
            reward.clamp(-1.0, 1.0)
        }
    }

    /// Seconds elapsed this episode, on the configured clock.
    fn elapsed(&self) -> f64 {
        if self.config.wall_clock_timeout {
            self.started_at.elapsed().as_secs_f64()
        } else {
            self.ticks as f64 * self.config.time_step
        }
    }

    fn is_done(&self, manager: &LaneManager) -> bool {
        let ego = manager.ego();
        ego.x() > self.config.effective_sim_length
            || ego.speed() < self.config.min_vel
            || self.elapsed() > self.config.effective_sim_time
    }
}
