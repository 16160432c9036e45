//! Tap round state machine
//!
//! A round is ephemeral client-side state: it never touches storage until
//! the final score is credited through the ledger. The countdown is driven
//! by the caller feeding elapsed time into [`TapRound::tick`], which keeps
//! the machine deterministic and testable.

use rust_decimal::Decimal;
use serde::Serialize;
use std::time::Duration;

/// Phase of a tap round
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundPhase {
    Idle,
    Playing,
    Ended,
}

/// A score boost armed for the current round
///
/// At most one is active at a time; arming a new one replaces the old one
/// rather than stacking. Each boosted tap consumes one charge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Multiplier {
    /// Whole-number factor applied to the per-tap reward
    pub factor: u32,
    /// Boosted taps remaining
    pub charges: u32,
}

/// The tap-to-earn round
#[derive(Debug, Clone, Serialize)]
pub struct TapRound {
    pub phase: RoundPhase,
    /// KTC accumulated this round
    pub score: Decimal,
    /// Countdown remaining while playing
    #[serde(skip)]
    pub remaining: Duration,
    /// Configured round length
    #[serde(skip)]
    duration: Duration,
    /// KTC earned per unboosted tap
    tap_reward: Decimal,
    pub multiplier: Option<Multiplier>,
}

impl TapRound {
    pub fn new(duration: Duration, tap_reward: Decimal) -> Self {
        Self {
            phase: RoundPhase::Idle,
            score: Decimal::ZERO,
            remaining: duration,
            duration,
            tap_reward,
            multiplier: None,
        }
    }

    /// Begin the countdown. Only valid from Idle; an Ended round must be
    /// settled and acknowledged first.
    pub fn start(&mut self) -> Result<(), &'static str> {
        if self.phase != RoundPhase::Idle {
            return Err("round already in progress");
        }
        self.phase = RoundPhase::Playing;
        self.score = Decimal::ZERO;
        self.remaining = self.duration;
        Ok(())
    }

    /// Arm a boost for this round, replacing any existing one
    pub fn arm_multiplier(&mut self, multiplier: Multiplier) {
        self.multiplier = Some(multiplier);
    }

    /// Register one tap. Returns the KTC earned by this tap; taps outside
    /// the Playing phase earn nothing and change nothing.
    pub fn tap(&mut self) -> Decimal {
        if self.phase != RoundPhase::Playing {
            return Decimal::ZERO;
        }
        let earned = match self.multiplier.as_mut() {
            Some(boost) if boost.charges > 0 => {
                boost.charges -= 1;
                let earned = self.tap_reward * Decimal::from(boost.factor);
                if boost.charges == 0 {
                    self.multiplier = None;
                }
                earned
            }
            _ => self.tap_reward,
        };
        self.score += earned;
        earned
    }

    /// Advance the countdown by `elapsed`. Transitions Playing to Ended
    /// when the timer reaches zero; a no-op in any other phase.
    pub fn tick(&mut self, elapsed: Duration) -> RoundPhase {
        if self.phase == RoundPhase::Playing {
            self.remaining = self.remaining.saturating_sub(elapsed);
            if self.remaining.is_zero() {
                self.phase = RoundPhase::Ended;
            }
        }
        self.phase
    }

    /// Final score, readable only once the round has Ended
    pub fn payout(&self) -> Option<Decimal> {
        match self.phase {
            RoundPhase::Ended => Some(self.score),
            _ => None,
        }
    }

    /// Return to Idle after the payout has been credited. Rejected unless
    /// the round has Ended, so a failed credit can leave the round parked
    /// for a retry.
    pub fn acknowledge(&mut self) -> Result<(), &'static str> {
        if self.phase != RoundPhase::Ended {
            return Err("no ended round to acknowledge");
        }
        self.phase = RoundPhase::Idle;
        self.score = Decimal::ZERO;
        self.remaining = self.duration;
        self.multiplier = None;
        Ok(())
    }
}
