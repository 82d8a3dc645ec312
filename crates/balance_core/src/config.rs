//! Balancer configuration.
//!
//! Every formula, resolver and sampler entry point takes a
//! [`BalancerConfig`] explicitly. [`BalancerConfig::default`] is only used
//! when a caller chooses it.

use serde::{Deserialize, Serialize};

use crate::error::{BalanceError, Result};

/// When lifesteal heals the dealer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum LifestealMode {
    /// Proportional to the full outgoing hit, even past the target's remaining HP.
    #[default]
    OnHit,
    /// Proportional to the HP actually removed from the target.
    OnDamage,
}

/// How the deterministic resolver bounds a fight when no turn limit is given.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum TurnLimitPolicy {
    /// `ceil(estimated_ttk * factor)`, clamped into `min..=max`.
    /// An infinite estimate maps to `max`.
    Scaled {
        /// Multiplier applied to the estimated time-to-kill.
        factor: f64,
        /// Lower bound on the limit.
        min: u32,
        /// Upper bound on the limit.
        max: u32,
    },
    /// Always the same limit.
    Fixed(u32),
}

impl Default for TurnLimitPolicy {
    fn default() -> Self {
        TurnLimitPolicy::Scaled {
            factor: 10.0,
            min: 10,
            max: 1000,
        }
    }
}

impl TurnLimitPolicy {
    /// Turn limit for a fight whose faster side needs `estimated_ttk` turns.
    #[must_use]
    pub fn limit_for(&self, estimated_ttk: f64) -> u32 {
        match *self {
            TurnLimitPolicy::Fixed(n) => n,
            TurnLimitPolicy::Scaled { factor, min, max } => {
                if !estimated_ttk.is_finite() {
                    return max;
                }
                let scaled = (estimated_ttk * factor).ceil();
                if scaled >= max as f64 {
                    max
                } else {
                    (scaled.max(0.0) as u32).clamp(min, max)
                }
            }
        }
    }
}

/// Constants governing formulas and simulation sizes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BalancerConfig {
    /// Armor scaling constant `k` in `armor / (armor + k * damage)`.
    pub armor_constant: f64,
    /// Trials per matrix cell in fast mode.
    pub fast_simulations: u32,
    /// Trials per matrix cell in full mode.
    pub full_simulations: u32,
    /// Fractional stat perturbation used by the sensitivity analyzer.
    pub sensitivity_delta: f64,
    /// Largest fraction a single adjustment may change a stat by.
    pub max_adjustment: f64,
    /// When lifesteal heals.
    pub lifesteal_mode: LifestealMode,
    /// Deterministic resolver turn limit policy.
    pub turn_limit: TurnLimitPolicy,
    /// Hard turn cap for a single stochastic trial.
    pub engine_turn_limit: u32,
    /// Length of the early-impact vector.
    pub early_impact_turns: usize,
    /// Maximum length of the per-turn damage series.
    pub damage_series_turns: usize,
}

impl Default for BalancerConfig {
    fn default() -> Self {
        Self {
            armor_constant: 10.0,
            fast_simulations: 200,
            full_simulations: 2000,
            sensitivity_delta: 0.10,
            max_adjustment: 0.05,
            lifesteal_mode: LifestealMode::OnHit,
            turn_limit: TurnLimitPolicy::default(),
            engine_turn_limit: 500,
            early_impact_turns: 3,
            damage_series_turns: 30,
        }
    }
}

impl BalancerConfig {
    /// Trials per cell for the requested fidelity.
    #[must_use]
    pub fn simulations(&self, fast: bool) -> u32 {
        if fast {
            self.fast_simulations
        } else {
            self.full_simulations
        }
    }

    /// Builder method to set the lifesteal mode.
    #[must_use]
    pub fn with_lifesteal_mode(mut self, mode: LifestealMode) -> Self {
        self.lifesteal_mode = mode;
        self
    }

    /// Builder method to set the turn limit policy.
    #[must_use]
    pub fn with_turn_limit(mut self, policy: TurnLimitPolicy) -> Self {
        self.turn_limit = policy;
        self
    }

    /// Parse a configuration from RON.
    pub fn from_ron_str(source: &str, origin: &str) -> Result<Self> {
        ron::from_str(source).map_err(|e| BalanceError::DataParseError {
            path: origin.to_string(),
            message: e.to_string(),
        })
    }
}
