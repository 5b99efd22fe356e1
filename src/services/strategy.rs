//! Betting strategy
//!
//! Draws a stake uniformly from the configured range and picks a side.
//! By default the side is coupled to the stake's parity (even
//! stakes bet high, odd stakes bet low); `SidePolicy::Independent` draws the
//! side separately instead.

use alloy::primitives::U256;
use anyhow::{anyhow, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::str::FromStr;
use tokio::sync::Mutex;

use crate::config::BettingConfig;
use crate::types::{BetParameters, BetSide};

/// How the bet side is chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SidePolicy {
    /// Side follows the stake's parity (single draw)
    Parity,
    /// Side is an independent fair coin flip
    Independent,
}

impl FromStr for SidePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "parity" => Ok(SidePolicy::Parity),
            "independent" => Ok(SidePolicy::Independent),
            other => Err(format!("Unknown side policy '{}' (expected parity|independent)", other)),
        }
    }
}

/// Side and whole-token stake of one bet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BetChoice {
    pub side: BetSide,
    pub stake: u64,
}

/// Side implied by a stake under the parity policy
pub fn side_for_stake(stake: u64) -> BetSide {
    if stake % 2 == 0 {
        BetSide::High
    } else {
        BetSide::Low
    }
}

pub struct BettingStrategy {
    stake_min: u64,
    stake_max: u64,
    scale: U256,
    side_policy: SidePolicy,
    rng: Mutex<StdRng>,
}

impl BettingStrategy {
    /// Fails if the largest stake cannot be expressed in token units
    pub fn new(config: &BettingConfig) -> Result<Self> {
        let stake_min = config.stake_min.min(config.stake_max);
        let stake_max = config.stake_max.max(config.stake_min);
        config.token_amount(stake_max).ok_or_else(|| {
            anyhow!(
                "stake {} with {} decimals overflows uint256",
                stake_max,
                config.token_decimals
            )
        })?;

        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Ok(Self {
            stake_min,
            stake_max,
            scale: U256::from(10u64).pow(U256::from(config.token_decimals)),
            side_policy: config.side_policy,
            rng: Mutex::new(rng),
        })
    }

    /// Draw the next bet
    pub async fn choose_bet(&self) -> BetChoice {
        let mut rng = self.rng.lock().await;
        let stake = rng.gen_range(self.stake_min..=self.stake_max);
        let side = match self.side_policy {
            SidePolicy::Parity => side_for_stake(stake),
            SidePolicy::Independent => {
                if rng.gen_bool(0.5) {
                    BetSide::High
                } else {
                    BetSide::Low
                }
            }
        };
        BetChoice { side, stake }
    }

    /// Attach the freshly read epoch and scale the stake to token units.
    /// Stakes drawn by this strategy never overflow; `new` checked the largest.
    pub fn bet_parameters(&self, epoch: U256, choice: BetChoice) -> BetParameters {
        BetParameters {
            epoch,
            side: choice.side,
            stake: choice.stake,
            amount: U256::from(choice.stake) * self.scale,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(min: u64, max: u64, policy: SidePolicy) -> BettingConfig {
        BettingConfig {
            stake_min: min,
            stake_max: max,
            token_decimals: 18,
            side_policy: policy,
            seed: Some(7),
        }
    }

    #[tokio::test]
    async fn test_stake_stays_in_range() {
        let strategy = BettingStrategy::new(&config(5_000, 100_000, SidePolicy::Parity)).unwrap();
        for _ in 0..500 {
            let choice = strategy.choose_bet().await;
            assert!((5_000..=100_000).contains(&choice.stake));
        }
    }

    #[tokio::test]
    async fn test_parity_decides_side() {
        let strategy = BettingStrategy::new(&config(5_000, 100_000, SidePolicy::Parity)).unwrap();
        for _ in 0..500 {
            let choice = strategy.choose_bet().await;
            let expected = if choice.stake % 2 == 0 { BetSide::High } else { BetSide::Low };
            assert_eq!(choice.side, expected);
        }
    }

    #[tokio::test]
    async fn test_independent_policy_breaks_coupling() {
        let strategy = BettingStrategy::new(&config(5_000, 100_000, SidePolicy::Independent)).unwrap();
        let mut decoupled = false;
        for _ in 0..200 {
            let choice = strategy.choose_bet().await;
            if choice.side != side_for_stake(choice.stake) {
                decoupled = true;
                break;
            }
        }
        assert!(decoupled);
    }

    #[tokio::test]
    async fn test_single_value_range() {
        let strategy = BettingStrategy::new(&config(5_001, 5_001, SidePolicy::Parity)).unwrap();
        let choice = strategy.choose_bet().await;
        assert_eq!(choice, BetChoice { side: BetSide::Low, stake: 5_001 });
    }

    #[tokio::test]
    async fn test_same_seed_same_draws() {
        let a = BettingStrategy::new(&config(1, 1_000_000, SidePolicy::Parity)).unwrap();
        let b = BettingStrategy::new(&config(1, 1_000_000, SidePolicy::Parity)).unwrap();
        for _ in 0..20 {
            assert_eq!(a.choose_bet().await, b.choose_bet().await);
        }
    }

    #[test]
    fn test_overflowing_stake_range_is_rejected() {
        let mut huge = config(1, 18_000_000_000_000_000_000, SidePolicy::Parity);
        huge.token_decimals = 60;
        assert!(BettingStrategy::new(&huge).is_err());

        huge.token_decimals = 18;
        assert!(BettingStrategy::new(&huge).is_ok());
    }

    #[test]
    fn test_side_for_stake() {
        assert_eq!(side_for_stake(5_000), BetSide::High);
        assert_eq!(side_for_stake(5_001), BetSide::Low);
        assert_eq!(side_for_stake(100_000), BetSide::High);
    }

    #[test]
    fn test_amount_is_scaled_to_decimals() {
        let strategy = BettingStrategy::new(&config(5_000, 100_000, SidePolicy::Parity)).unwrap();
        let params = strategy.bet_parameters(
            U256::from(7),
            BetChoice { side: BetSide::Low, stake: 5_001 },
        );

        assert_eq!(params.epoch, U256::from(7));
        assert_eq!(params.amount, U256::from(5_001u64) * U256::from(10u64).pow(U256::from(18)));
        assert_eq!(params.amount.to_string(), "5001000000000000000000");
    }
}
