mod delivery;
mod keys;

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

pub use delivery::{DeliveryChain, DeliveryStrategy};
pub use keys::{ActionMap, DirectionKeys, KeyDirection, VirtualKey};

/// Tuning for the continuous (steering, throttle) path.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ContinuousConfig {
    /// Weight of the previous value in the exponential smoothing.
    pub alpha: f32,
    pub steer_limit: f32,
    pub throttle_limit: f32,
    pub steer_threshold: f32,
    pub throttle_threshold: f32,
    pub keys: DirectionKeys,
}

impl Default for ContinuousConfig {
    fn default() -> Self {
        Self {
            alpha: 0.8,
            steer_limit: 0.5,
            throttle_limit: 1.0,
            steer_threshold: 0.15,
            throttle_threshold: 0.15,
            keys: DirectionKeys::default(),
        }
    }
}

/// Turns actions into key events and tracks which keys are held.
///
/// The held set must be empty at episode start and after every `reset`.
pub struct InputInjector {
    chain: DeliveryChain,
    continuous: ContinuousConfig,
    held: BTreeSet<VirtualKey>,
    prev_steering: f32,
    prev_throttle: f32,
}

impl InputInjector {
    pub fn new(chain: DeliveryChain, continuous: ContinuousConfig) -> Self {
        Self {
            chain,
            continuous,
            held: BTreeSet::new(),
            prev_steering: 0.0,
            prev_throttle: 0.0,
        }
    }

    pub fn held_keys(&self) -> &BTreeSet<VirtualKey> {
        &self.held
    }

    /// Last smoothed (steering, throttle).
    pub fn smoothed(&self) -> (f32, f32) {
        (self.prev_steering, self.prev_throttle)
    }

    /// Release everything, then press the key bound to `index`.
    pub fn apply_discrete(&mut self, map: &ActionMap, index: usize) {
        self.release_all();
        if let Some(key) = map.key_for(index) {
            self.press(key);
        }
    }

    /// Apply a (steering, throttle) vector. Returns the smoothed values that
    /// were mapped to keys.
    pub fn apply_continuous(&mut self, action: [f32; 2]) -> (f32, f32) {
        let cfg = self.continuous;
        let raw_steering = finite_or_zero(action[0]).clamp(-cfg.steer_limit, cfg.steer_limit);
        let raw_throttle =
            finite_or_zero(action[1]).clamp(-cfg.throttle_limit, cfg.throttle_limit);

        let steering = cfg.alpha * self.prev_steering + (1.0 - cfg.alpha) * raw_steering;
        let braking_now = raw_throttle < 0.0 && self.prev_throttle >= 0.0;
        let throttle = if braking_now {
            raw_throttle
        } else {
            cfg.alpha * self.prev_throttle + (1.0 - cfg.alpha) * raw_throttle
        };
        self.prev_steering = steering;
        self.prev_throttle = throttle;

        let mut wanted = BTreeSet::new();
        if steering < -cfg.steer_threshold {
            wanted.insert(cfg.keys.steer_left);
        } else if steering > cfg.steer_threshold {
            wanted.insert(cfg.keys.steer_right);
        }
        if throttle > cfg.throttle_threshold {
            wanted.insert(cfg.keys.accelerate);
        } else if throttle < -cfg.throttle_threshold {
            wanted.insert(cfg.keys.brake);
        }

        let stale: Vec<VirtualKey> = self.held.difference(&wanted).copied().collect();
        for key in stale {
            self.release(key);
        }
        let fresh: Vec<VirtualKey> = wanted.difference(&self.held).copied().collect();
        for key in fresh {
            self.press(key);
        }

        (steering, throttle)
    }

    pub fn release_all(&mut self) {
        let held: Vec<VirtualKey> = self.held.iter().copied().collect();
        for key in held {
            self.release(key);
        }
    }

    /// Release every held key and forget the smoothing memory.
    pub fn reset(&mut self) {
        self.release_all();
        self.held.clear();
        self.prev_steering = 0.0;
        self.prev_throttle = 0.0;
    }

    fn press(&mut self, key: VirtualKey) {
        if self.chain.send(key, KeyDirection::Press) {
            self.held.insert(key);
        }
    }

    fn release(&mut self, key: VirtualKey) {
        // Forget the key even if the release was not delivered, so no phantom
        // held state outlives the step.
        self.held.remove(&key);
        self.chain.send(key, KeyDirection::Release);
    }
}

impl Drop for InputInjector {
    fn drop(&mut self) {
        self.release_all();
    }
}

fn finite_or_zero(value: f32) -> f32 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}
