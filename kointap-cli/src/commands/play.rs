//! Play command - run a tap round and settle the payout

use std::io::{self, BufRead};
use std::time::Instant;

use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use kointap_core::services::RoundSettlement;
use kointap_core::{EntryPoint, LogEvent, OperationResult, RoundPhase, TapRound};

use super::{get_context, get_logger_for, log_event};
use crate::output;

pub fn run(boost: Option<&str>, taps: Option<u32>, json: bool) -> Result<()> {
    let logger = get_logger_for(EntryPoint::Game);
    let ctx = get_context()?;

    let account = match ctx.auth_service.require_account() {
        Ok(account) => account,
        Err(e) => {
            if json {
                output::exit_operation_error(e)
            } else {
                return Err(e.into());
            }
        }
    };

    let mut round = ctx.game_service.new_round();

    if let Some(item_id) = boost {
        match ctx.shop_service.use_item(&account.id, item_id) {
            Ok(multiplier) => {
                round.arm_multiplier(multiplier);
                if !json {
                    output::info(&format!(
                        "Boost armed: x{} for {} taps",
                        multiplier.factor, multiplier.charges
                    ));
                }
            }
            Err(e) => {
                if json {
                    output::exit_operation_error(e)
                } else {
                    return Err(e.into());
                }
            }
        }
    }

    match taps {
        Some(n) => simulate(&mut round, n)?,
        None => interact(&mut round)?,
    }

    match ctx.game_service.settle(&account.id, &mut round) {
        Ok(settlement) => {
            log_event(
                &logger,
                LogEvent::new("round_settled")
                    .with_operation("play")
                    .with_command("play"),
            );
            report(&settlement, json)
        }
        Err(e) => {
            log_event(
                &logger,
                LogEvent::new("round_settle_failed")
                    .with_operation("play")
                    .with_command("play")
                    .with_error(e.class()),
            );
            if json {
                output::exit_operation_error(e)
            } else {
                Err(e.into())
            }
        }
    }
}

/// Scripted round: tap `n` times, then run the clock out. Used by tests
/// and shell pipelines that cannot sit through the countdown.
fn simulate(round: &mut TapRound, n: u32) -> Result<()> {
    round.start().map_err(anyhow::Error::msg)?;
    for _ in 0..n {
        round.tap();
    }
    let remaining = round.remaining;
    round.tick(remaining);
    Ok(())
}

/// Line-based round: every Enter is a tap, 'q' stops early by running the
/// clock out. The countdown burns in wall time whether or not a tap lands.
fn interact(round: &mut TapRound) -> Result<()> {
    round.start().map_err(anyhow::Error::msg)?;
    let total_secs = round.remaining.as_secs();

    let bar = ProgressBar::new(total_secs);
    bar.set_style(
        ProgressStyle::with_template("  [{bar:30.cyan/blue}] {pos}/{len}s  {msg}")?
            .progress_chars("=> "),
    );
    bar.set_message("press Enter to tap, 'q' to stop");

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    let mut last = Instant::now();

    loop {
        let line = lines.next();
        let now = Instant::now();
        let phase = round.tick(now.duration_since(last));
        last = now;

        if phase == RoundPhase::Ended {
            break;
        }

        // 'q' or EOF ends the round by running the clock out
        let quit = match line {
            Some(line) => line?.trim() == "q",
            None => true,
        };
        if quit {
            let remaining = round.remaining;
            round.tick(remaining);
            break;
        }

        round.tap();
        bar.set_position(total_secs - round.remaining.as_secs());
        bar.set_message(format!("score {}", output::format_ktc(&round.score)));
    }

    bar.finish_and_clear();
    Ok(())
}

fn report(settlement: &RoundSettlement, json: bool) -> Result<()> {
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&OperationResult::ok(settlement))?
        );
        return Ok(());
    }

    if settlement.earned.is_zero() {
        output::info("Round over, no taps landed. Nothing credited.");
        return Ok(());
    }

    output::success(&format!(
        "Round over! Earned {}",
        output::format_ktc(&settlement.earned)
    ));
    if let Some(account) = &settlement.account {
        println!("  New balance: {}", output::format_ktc(&account.balance));
    }
    Ok(())
}
