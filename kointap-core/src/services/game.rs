//! Game service - round construction and payout settlement
//!
//! The round state machine itself lives in the domain; this service turns
//! an ended round into ledger money exactly once.

use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::adapters::duckdb::DuckDbStore;
use crate::domain::result::{Error, Result};
use crate::domain::{Account, TapRound};

/// Game service for tap rounds
pub struct GameService {
    store: Arc<DuckDbStore>,
    round_duration: Duration,
    tap_reward: Decimal,
}

impl GameService {
    pub fn new(store: Arc<DuckDbStore>, round_duration: Duration, tap_reward: Decimal) -> Self {
        Self {
            store,
            round_duration,
            tap_reward,
        }
    }

    /// Fresh idle round with the configured duration and per-tap reward
    pub fn new_round(&self) -> TapRound {
        TapRound::new(self.round_duration, self.tap_reward)
    }

    /// Credit an ended round's score and reset the round.
    ///
    /// The credit lands before the round is acknowledged: if the credit
    /// fails the round stays ended, so settling again cannot double-pay
    /// and a score is never silently dropped.
    pub fn settle(&self, account_id: &Uuid, round: &mut TapRound) -> Result<RoundSettlement> {
        let score = round
            .payout()
            .ok_or_else(|| Error::validation("round has not ended"))?;

        if score.is_zero() {
            round.acknowledge().map_err(Error::validation)?;
            return Ok(RoundSettlement {
                earned: Decimal::ZERO,
                account: None,
            });
        }

        let account = self
            .store
            .credit(account_id, score, Some("Tap round payout"))?;
        round.acknowledge().map_err(Error::validation)?;

        Ok(RoundSettlement {
            earned: score,
            account: Some(account),
        })
    }
}

/// Outcome of settling an ended round
#[derive(Debug, Serialize)]
pub struct RoundSettlement {
    pub earned: Decimal,
    /// Account after the payout credit; None when the round earned nothing
    pub account: Option<Account>,
}
