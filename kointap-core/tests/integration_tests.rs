//! Integration tests for kointap-core services
//!
//! These tests verify the money-movement invariants against a real DuckDB
//! file: transfers are atomic, bonuses apply exactly once, purchases debit
//! and grant together, and the doctor catches seeded damage.
//!
//! Run with: cargo test --test integration_tests -- --nocapture

use std::sync::Arc;

use rust_decimal::Decimal;
use tempfile::TempDir;
use uuid::Uuid;

use kointap_core::adapters::duckdb::DuckDbStore;
use kointap_core::domain::Account;
use kointap_core::services::BackupService;
use kointap_core::{EntryKind, Error, KointapContext, RoundPhase};

// ============================================================================
// Test Helpers
// ============================================================================

/// Create a full context rooted in a temp directory
fn create_test_context(temp_dir: &TempDir) -> KointapContext {
    KointapContext::new(temp_dir.path()).expect("Failed to create context")
}

/// Create a bare store with schema initialized
fn create_test_store(temp_dir: &TempDir) -> Arc<DuckDbStore> {
    let db_path = temp_dir.path().join("test.duckdb");
    let store = DuckDbStore::new(&db_path).expect("Failed to open store");
    store.ensure_schema().expect("Failed to initialize schema");
    Arc::new(store)
}

/// Sign up a fresh account through the auth service
fn signup(ctx: &KointapContext, email: &str) -> Account {
    ctx.auth_service
        .signup(email, "password123", None, None)
        .expect("Signup failed")
        .account
}

/// Fund an account through the ledger (deposit entry plus balance credit)
fn fund(ctx: &KointapContext, account_id: &Uuid, amount: i64) {
    ctx.ledger_service
        .deposit(account_id, Decimal::from(amount), Some("Test funding"))
        .expect("Funding deposit failed");
}

// ============================================================================
// Transfer Atomicity Tests
// ============================================================================

/// Test that a transfer moves the balance and writes two paired entries
#[test]
fn test_transfer_moves_funds_and_pairs_entries() {
    let temp_dir = TempDir::new().unwrap();
    let ctx = create_test_context(&temp_dir);

    let alice = signup(&ctx, "alice@example.com");
    let bob = signup(&ctx, "bob@example.com");
    fund(&ctx, &alice.id, 1000);

    let alice = ctx.ledger_service.balance(&alice.id).unwrap();
    let receipt = ctx
        .ledger_service
        .transfer(&alice, &bob.referral_code, Decimal::from(300), Some("rent"))
        .unwrap();

    assert_eq!(receipt.amount, Decimal::from(300));
    assert_eq!(receipt.sender_balance, Decimal::from(700));
    assert_eq!(receipt.recipient_code, bob.referral_code);

    let alice_after = ctx.ledger_service.balance(&alice.id).unwrap();
    let bob_after = ctx.ledger_service.balance(&bob.id).unwrap();
    assert_eq!(alice_after.balance, Decimal::from(700));
    assert_eq!(bob_after.balance, Decimal::from(300));

    // Both legs exist, share the transfer id, and agree on the amount
    let legs = ctx
        .store
        .get_entries_by_transfer(&receipt.transfer_id)
        .unwrap();
    assert_eq!(legs.len(), 2, "A transfer must write exactly two entries");
    assert!(legs.iter().all(|e| e.amount == Decimal::from(300)));
    assert!(legs.iter().all(|e| e.description.as_deref() == Some("rent")));

    let out_leg = legs.iter().find(|e| e.kind == EntryKind::TransferOut);
    let in_leg = legs.iter().find(|e| e.kind == EntryKind::TransferIn);
    let out_leg = out_leg.expect("Missing transfer_out leg");
    let in_leg = in_leg.expect("Missing transfer_in leg");

    assert_eq!(out_leg.account_id, alice.id);
    assert_eq!(in_leg.account_id, bob.id);
    assert_eq!(out_leg.counterparty_account_id, Some(bob.id));
    assert_eq!(in_leg.counterparty_account_id, Some(alice.id));
}

/// Test that an insufficient-funds transfer applies nothing
#[test]
fn test_insufficient_funds_leaves_no_trace() {
    let temp_dir = TempDir::new().unwrap();
    let ctx = create_test_context(&temp_dir);

    let alice = signup(&ctx, "alice@example.com");
    let bob = signup(&ctx, "bob@example.com");
    fund(&ctx, &alice.id, 100);

    let entries_before = ctx.store.count_entries().unwrap();
    let alice = ctx.ledger_service.balance(&alice.id).unwrap();

    let result = ctx
        .ledger_service
        .transfer(&alice, &bob.referral_code, Decimal::from(300), None);

    match result {
        Err(Error::InsufficientFunds { balance, requested }) => {
            assert_eq!(balance, Decimal::from(100));
            assert_eq!(requested, Decimal::from(300));
        }
        other => panic!("Expected InsufficientFunds, got {:?}", other.map(|_| ())),
    }

    // Nothing moved, nothing was written
    let alice_after = ctx.ledger_service.balance(&alice.id).unwrap();
    let bob_after = ctx.ledger_service.balance(&bob.id).unwrap();
    assert_eq!(alice_after.balance, Decimal::from(100));
    assert_eq!(bob_after.balance, Decimal::ZERO);
    assert_eq!(ctx.store.count_entries().unwrap(), entries_before);
}

/// Test that transfers to your own handles are rejected
#[test]
fn test_self_transfer_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let ctx = create_test_context(&temp_dir);

    let alice = signup(&ctx, "alice@example.com");
    fund(&ctx, &alice.id, 100);
    let alice = ctx.ledger_service.balance(&alice.id).unwrap();

    for handle in [alice.referral_code.clone(), alice.wallet_address.clone()] {
        let result = ctx
            .ledger_service
            .transfer(&alice, &handle, Decimal::from(10), None);
        assert!(
            matches!(result, Err(Error::SelfTransfer)),
            "Transfer to own handle '{}' should be rejected",
            handle
        );
    }

    let after = ctx.ledger_service.balance(&alice.id).unwrap();
    assert_eq!(after.balance, Decimal::from(100));
}

/// Test that a well-formed but unknown handle fails cleanly
#[test]
fn test_unknown_recipient_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let ctx = create_test_context(&temp_dir);

    let alice = signup(&ctx, "alice@example.com");
    fund(&ctx, &alice.id, 100);
    let alice = ctx.ledger_service.balance(&alice.id).unwrap();

    let result = ctx
        .ledger_service
        .transfer(&alice, "KTC-ZZZZZZ", Decimal::from(10), None);
    assert!(matches!(result, Err(Error::RecipientNotFound(_))));

    let after = ctx.ledger_service.balance(&alice.id).unwrap();
    assert_eq!(after.balance, Decimal::from(100));
}

/// Test that a handle matching two accounts fails without moving money.
///
/// The schema's unique constraints keep codes and addresses collision-free
/// within their own columns, so the cross-column clash has to be seeded
/// behind the ledger's back, the same way the doctor tests inject damage.
#[test]
fn test_ambiguous_recipient_rejected_without_mutation() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("kointap.duckdb");

    let (alice_id, bob_code) = {
        let ctx = create_test_context(&temp_dir);
        let alice = signup(&ctx, "alice@example.com");
        let bob = signup(&ctx, "bob@example.com");
        signup(&ctx, "carol@example.com");
        fund(&ctx, &alice.id, 100);
        (alice.id, bob.referral_code.clone())
    };

    // Make carol's wallet address collide with bob's referral code
    {
        let conn = duckdb::Connection::open(&db_path).unwrap();
        conn.execute(
            "UPDATE accounts SET wallet_address = ? WHERE display_name = 'carol'",
            duckdb::params![bob_code],
        )
        .unwrap();
    }

    let ctx = create_test_context(&temp_dir);
    let alice = ctx.ledger_service.balance(&alice_id).unwrap();
    let entries_before = ctx.store.count_entries().unwrap();

    let result = ctx
        .ledger_service
        .transfer(&alice, &bob_code, Decimal::from(10), None);
    assert!(matches!(result, Err(Error::AmbiguousRecipient(_))));

    // Nothing moved, nothing was written
    let after = ctx.ledger_service.balance(&alice_id).unwrap();
    assert_eq!(after.balance, Decimal::from(100));
    assert_eq!(ctx.store.count_entries().unwrap(), entries_before);

    // The lookup surface reports both matches
    assert_eq!(ctx.ledger_service.lookup(&bob_code).unwrap().len(), 2);
}

/// Test amount validation: zero, negative, and oversized scale
#[test]
fn test_transfer_rejects_bad_amounts() {
    let temp_dir = TempDir::new().unwrap();
    let ctx = create_test_context(&temp_dir);

    let alice = signup(&ctx, "alice@example.com");
    let bob = signup(&ctx, "bob@example.com");
    fund(&ctx, &alice.id, 100);
    let alice = ctx.ledger_service.balance(&alice.id).unwrap();

    let bad_amounts = [
        Decimal::ZERO,
        Decimal::from(-5),
        Decimal::new(1, 7), // 0.0000001, finer than the ledger scale
    ];
    for amount in bad_amounts {
        let result = ctx
            .ledger_service
            .transfer(&alice, &bob.referral_code, amount, None);
        assert!(
            matches!(result, Err(Error::Validation(_))),
            "Amount {} should be rejected",
            amount
        );
    }
}

/// Test that a fractional amount within scale transfers exactly
#[test]
fn test_fractional_transfer_is_exact() {
    let temp_dir = TempDir::new().unwrap();
    let ctx = create_test_context(&temp_dir);

    let alice = signup(&ctx, "alice@example.com");
    let bob = signup(&ctx, "bob@example.com");
    fund(&ctx, &alice.id, 1);

    let alice = ctx.ledger_service.balance(&alice.id).unwrap();
    let amount = Decimal::new(123456, 6); // 0.123456
    ctx.ledger_service
        .transfer(&alice, &bob.referral_code, amount, None)
        .unwrap();

    let alice_after = ctx.ledger_service.balance(&alice.id).unwrap();
    let bob_after = ctx.ledger_service.balance(&bob.id).unwrap();
    assert_eq!(alice_after.balance, Decimal::new(876544, 6));
    assert_eq!(bob_after.balance, amount);
}

// ============================================================================
// Signup and Referral Tests
// ============================================================================

/// Test that signup mints unique handles and starts at zero
#[test]
fn test_signup_creates_account_with_handles() {
    let temp_dir = TempDir::new().unwrap();
    let ctx = create_test_context(&temp_dir);

    let receipt = ctx
        .auth_service
        .signup("carol@example.com", "password123", Some("Carol"), None)
        .unwrap();

    let account = &receipt.account;
    assert_eq!(account.display_name, "Carol");
    assert!(Account::is_valid_referral_code(&account.referral_code));
    assert!(Account::is_valid_wallet_address(&account.wallet_address));
    assert_eq!(account.balance, Decimal::ZERO);
    assert_eq!(receipt.welcome_bonus, Decimal::ZERO);
    assert!(receipt.referrer_code.is_none());

    let entries = ctx.ledger_service.history(&account.id, None).unwrap();
    assert!(entries.is_empty(), "No bonus without a referral");
}

/// Test that the display name falls back to the normalized email local part
#[test]
fn test_signup_default_display_name() {
    let temp_dir = TempDir::new().unwrap();
    let ctx = create_test_context(&temp_dir);

    let account = signup(&ctx, "Tapper.One@Example.com");
    assert_eq!(account.display_name, "tapper.one");
}

/// Test that a second signup with the same email is rejected
#[test]
fn test_duplicate_email_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let ctx = create_test_context(&temp_dir);

    signup(&ctx, "dup@example.com");
    let result = ctx
        .auth_service
        .signup("DUP@example.com", "password456", None, None);
    assert!(
        matches!(result, Err(Error::Auth(_))),
        "Same email (case-folded) must not create a second identity"
    );
    assert_eq!(ctx.store.count_identities().unwrap(), 1);
    assert_eq!(ctx.store.count_accounts().unwrap(), 1);
}

/// Test that a resolved referral credits both parties exactly once
#[test]
fn test_referral_bonuses_credited_once() {
    let temp_dir = TempDir::new().unwrap();
    let ctx = create_test_context(&temp_dir);

    let referrer = signup(&ctx, "referrer@example.com");
    let receipt = ctx
        .auth_service
        .signup(
            "invited@example.com",
            "password123",
            None,
            Some(&referrer.referral_code),
        )
        .unwrap();

    // Default bonuses: 100 KTC welcome, 250 KTC for the referrer
    assert_eq!(receipt.welcome_bonus, Decimal::from(100));
    assert_eq!(receipt.referrer_code.as_deref(), Some(referrer.referral_code.as_str()));
    assert_eq!(receipt.account.balance, Decimal::from(100));

    let referrer_after = ctx.ledger_service.balance(&referrer.id).unwrap();
    assert_eq!(referrer_after.balance, Decimal::from(250));

    // Exactly one deposit entry each
    let invited_entries = ctx.ledger_service.history(&receipt.account.id, None).unwrap();
    assert_eq!(invited_entries.len(), 1);
    assert_eq!(invited_entries[0].kind, EntryKind::Deposit);
    assert_eq!(invited_entries[0].description.as_deref(), Some("Welcome bonus"));

    let referrer_entries = ctx.ledger_service.history(&referrer.id, None).unwrap();
    assert_eq!(referrer_entries.len(), 1);
    assert_eq!(referrer_entries[0].description.as_deref(), Some("Referral bonus"));

    // The supply grew by exactly the two bonuses
    assert_eq!(ctx.store.total_supply().unwrap(), Decimal::from(350));
}

/// Test that a well-formed code matching nobody still signs up, bonus-free
#[test]
fn test_unknown_referral_code_signs_up_without_bonus() {
    let temp_dir = TempDir::new().unwrap();
    let ctx = create_test_context(&temp_dir);

    let receipt = ctx
        .auth_service
        .signup("solo@example.com", "password123", None, Some("KTC-ZZZZZZ"))
        .unwrap();

    assert_eq!(receipt.welcome_bonus, Decimal::ZERO);
    assert!(receipt.referrer_code.is_none());
    assert_eq!(receipt.account.balance, Decimal::ZERO);
}

/// Test that a malformed referral code rejects the signup before any write
#[test]
fn test_malformed_referral_code_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let ctx = create_test_context(&temp_dir);

    let result = ctx
        .auth_service
        .signup("bad@example.com", "password123", None, Some("KTC-0O1IL0"));
    assert!(matches!(result, Err(Error::Validation(_))));

    // The identity was never created either
    assert_eq!(ctx.store.count_identities().unwrap(), 0);
    assert_eq!(ctx.store.count_accounts().unwrap(), 0);
}

// ============================================================================
// Auth and Session Tests
// ============================================================================

/// Test that wrong password and unknown email fail identically
#[test]
fn test_login_failures_are_indistinguishable() {
    let temp_dir = TempDir::new().unwrap();
    let ctx = create_test_context(&temp_dir);

    signup(&ctx, "real@example.com");

    let wrong_password = ctx.auth_service.login("real@example.com", "not-the-password");
    let unknown_email = ctx.auth_service.login("ghost@example.com", "password123");

    let msg_a = wrong_password.err().expect("wrong password must fail").to_string();
    let msg_b = unknown_email.err().expect("unknown email must fail").to_string();
    assert_eq!(
        msg_a, msg_b,
        "Login failures must not reveal whether the email exists"
    );
}

/// Test the login/logout session lifecycle
#[test]
fn test_login_logout_session_flow() {
    let temp_dir = TempDir::new().unwrap();
    let ctx = create_test_context(&temp_dir);

    let account = signup(&ctx, "session@example.com");
    assert!(ctx.auth_service.current_account().unwrap().is_none());

    let logged_in = ctx
        .auth_service
        .login("session@example.com", "password123")
        .unwrap();
    assert_eq!(logged_in.id, account.id);
    assert!(temp_dir.path().join("session.json").exists());

    let current = ctx.auth_service.current_account().unwrap();
    assert_eq!(current.map(|a| a.id), Some(account.id));

    assert!(ctx.auth_service.logout().unwrap());
    assert!(ctx.auth_service.current_account().unwrap().is_none());
    assert!(!ctx.auth_service.logout().unwrap(), "Second logout is a no-op");
}

/// Test that a corrupt session file counts as logged out
#[test]
fn test_corrupt_session_treated_as_logged_out() {
    let temp_dir = TempDir::new().unwrap();
    let ctx = create_test_context(&temp_dir);

    signup(&ctx, "session@example.com");
    ctx.auth_service
        .login("session@example.com", "password123")
        .unwrap();

    std::fs::write(temp_dir.path().join("session.json"), "{not json").unwrap();
    assert!(ctx.auth_service.current_session().unwrap().is_none());
    assert!(ctx.auth_service.current_account().unwrap().is_none());
    assert!(matches!(
        ctx.auth_service.require_account(),
        Err(Error::Auth(_))
    ));
}

// ============================================================================
// Game Settlement Tests
// ============================================================================

/// Test that an ended round credits its score exactly once
#[test]
fn test_round_settles_exactly_once() {
    let temp_dir = TempDir::new().unwrap();
    let ctx = create_test_context(&temp_dir);

    let player = signup(&ctx, "player@example.com");

    let mut round = ctx.game_service.new_round();
    round.start().unwrap();
    for _ in 0..7 {
        round.tap();
    }
    let remaining = round.remaining;
    assert_eq!(round.tick(remaining), RoundPhase::Ended);

    let settlement = ctx.game_service.settle(&player.id, &mut round).unwrap();
    assert_eq!(settlement.earned, Decimal::from(7));
    let account = settlement.account.expect("Non-zero payout returns the account");
    assert_eq!(account.balance, Decimal::from(7));

    // The round has been acknowledged; settling again is an error and
    // must not pay again
    assert!(ctx.game_service.settle(&player.id, &mut round).is_err());
    let after = ctx.ledger_service.balance(&player.id).unwrap();
    assert_eq!(after.balance, Decimal::from(7));

    let entries = ctx.ledger_service.history(&player.id, None).unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].description.as_deref(), Some("Tap round payout"));
}

/// Test that a zero-score round settles without touching the ledger
#[test]
fn test_zero_score_round_settles_without_credit() {
    let temp_dir = TempDir::new().unwrap();
    let ctx = create_test_context(&temp_dir);

    let player = signup(&ctx, "idle@example.com");

    let mut round = ctx.game_service.new_round();
    round.start().unwrap();
    let remaining = round.remaining;
    round.tick(remaining);

    let settlement = ctx.game_service.settle(&player.id, &mut round).unwrap();
    assert_eq!(settlement.earned, Decimal::ZERO);
    assert!(settlement.account.is_none());
    assert!(ctx.ledger_service.history(&player.id, None).unwrap().is_empty());
    assert_eq!(round.phase, RoundPhase::Idle, "Round is ready to start again");
}

/// Test that a running round cannot be settled
#[test]
fn test_running_round_cannot_settle() {
    let temp_dir = TempDir::new().unwrap();
    let ctx = create_test_context(&temp_dir);

    let player = signup(&ctx, "eager@example.com");

    let mut round = ctx.game_service.new_round();
    round.start().unwrap();
    round.tap();

    let result = ctx.game_service.settle(&player.id, &mut round);
    assert!(matches!(result, Err(Error::Validation(_))));
    assert_eq!(round.phase, RoundPhase::Playing, "Round keeps running");
}

// ============================================================================
// Shop Tests
// ============================================================================

/// Test that a purchase debits the price and grants the item together
#[test]
fn test_purchase_debits_and_grants_atomically() {
    let temp_dir = TempDir::new().unwrap();
    let ctx = create_test_context(&temp_dir);

    let buyer = signup(&ctx, "buyer@example.com");
    fund(&ctx, &buyer.id, 500);

    let receipt = ctx.shop_service.buy(&buyer.id, "double-tap").unwrap();
    assert_eq!(receipt.balance, Decimal::from(350));

    let owned = ctx.shop_service.owned(&buyer.id).unwrap();
    assert_eq!(owned.len(), 1);
    assert_eq!(owned[0].0.id, "double-tap");
    assert_eq!(owned[0].1.quantity, 1);

    // Second purchase stacks quantity instead of adding a row
    ctx.shop_service.buy(&buyer.id, "double-tap").unwrap();
    let owned = ctx.shop_service.owned(&buyer.id).unwrap();
    assert_eq!(owned.len(), 1);
    assert_eq!(owned[0].1.quantity, 2);

    let entries = ctx.ledger_service.history(&buyer.id, None).unwrap();
    let purchases: Vec<_> = entries
        .iter()
        .filter(|e| e.kind == EntryKind::Purchase)
        .collect();
    assert_eq!(purchases.len(), 2);
    assert!(purchases.iter().all(|e| e.amount == Decimal::from(150)));
}

/// Test that an unaffordable purchase grants nothing
#[test]
fn test_unaffordable_purchase_grants_nothing() {
    let temp_dir = TempDir::new().unwrap();
    let ctx = create_test_context(&temp_dir);

    let buyer = signup(&ctx, "broke@example.com");
    fund(&ctx, &buyer.id, 100);

    let result = ctx.shop_service.buy(&buyer.id, "double-tap");
    assert!(matches!(result, Err(Error::InsufficientFunds { .. })));

    assert!(ctx.shop_service.owned(&buyer.id).unwrap().is_empty());
    let after = ctx.ledger_service.balance(&buyer.id).unwrap();
    assert_eq!(after.balance, Decimal::from(100));
}

/// Test that using an item consumes one unit and arms its multiplier
#[test]
fn test_use_item_consumes_quantity() {
    let temp_dir = TempDir::new().unwrap();
    let ctx = create_test_context(&temp_dir);

    let buyer = signup(&ctx, "booster@example.com");
    fund(&ctx, &buyer.id, 200);
    ctx.shop_service.buy(&buyer.id, "double-tap").unwrap();

    let multiplier = ctx.shop_service.use_item(&buyer.id, "double-tap").unwrap();
    assert_eq!(multiplier.factor, 2);
    assert_eq!(multiplier.charges, 50);

    // Only one was owned
    let result = ctx.shop_service.use_item(&buyer.id, "double-tap");
    assert!(matches!(result, Err(Error::Validation(_))));
}

/// Test that unknown item ids fail in both buy and use paths
#[test]
fn test_unknown_item_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let ctx = create_test_context(&temp_dir);

    let buyer = signup(&ctx, "curious@example.com");
    fund(&ctx, &buyer.id, 1000);

    assert!(matches!(
        ctx.shop_service.buy(&buyer.id, "mega-boost"),
        Err(Error::NotFound(_))
    ));
    assert!(matches!(
        ctx.shop_service.use_item(&buyer.id, "mega-boost"),
        Err(Error::NotFound(_))
    ));
}

// ============================================================================
// Doctor Tests
// ============================================================================

/// Test that a ledger built through the services passes every check
#[test]
fn test_doctor_passes_on_healthy_ledger() {
    let temp_dir = TempDir::new().unwrap();
    let ctx = create_test_context(&temp_dir);

    let alice = signup(&ctx, "alice@example.com");
    let bob = signup(&ctx, "bob@example.com");
    fund(&ctx, &alice.id, 1000);

    let alice = ctx.ledger_service.balance(&alice.id).unwrap();
    ctx.ledger_service
        .transfer(&alice, &bob.referral_code, Decimal::from(250), None)
        .unwrap();
    ctx.shop_service.buy(&bob.id, "double-tap").unwrap();
    ctx.ledger_service
        .withdraw(&alice.id, Decimal::from(50), None)
        .unwrap();

    let result = ctx.doctor_service.run_checks().unwrap();
    assert_eq!(
        result.summary.errors, 0,
        "Healthy ledger reported errors: {:?}",
        result.checks
    );
    assert_eq!(result.summary.warnings, 0);
    assert_eq!(result.summary.passed, result.checks.len() as i64);
}

/// Test that the doctor catches a balance that disagrees with its entries
#[test]
fn test_doctor_flags_balance_mismatch() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("kointap.duckdb");

    {
        let ctx = create_test_context(&temp_dir);
        let alice = signup(&ctx, "alice@example.com");
        fund(&ctx, &alice.id, 100);
    }

    // Bump a balance behind the ledger's back
    {
        let conn = duckdb::Connection::open(&db_path).unwrap();
        conn.execute("UPDATE accounts SET balance = balance + 42", [])
            .unwrap();
    }

    let ctx = create_test_context(&temp_dir);
    let result = ctx.doctor_service.run_checks().unwrap();

    let check = &result.checks["balance_mismatches"];
    assert_eq!(check.status, "error");
    assert!(result.summary.errors >= 1);
    let details = check.details.as_ref().expect("Mismatch details present");
    assert_eq!(details.len(), 1);
}

/// Test that the doctor catches a transfer missing one leg
#[test]
fn test_doctor_flags_unpaired_transfer() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("kointap.duckdb");

    {
        let ctx = create_test_context(&temp_dir);
        let alice = signup(&ctx, "alice@example.com");
        let bob = signup(&ctx, "bob@example.com");
        fund(&ctx, &alice.id, 500);
        let alice = ctx.ledger_service.balance(&alice.id).unwrap();
        ctx.ledger_service
            .transfer(&alice, &bob.referral_code, Decimal::from(200), None)
            .unwrap();
    }

    {
        let conn = duckdb::Connection::open(&db_path).unwrap();
        conn.execute("DELETE FROM entries WHERE kind = 'transfer_in'", [])
            .unwrap();
    }

    let ctx = create_test_context(&temp_dir);
    let result = ctx.doctor_service.run_checks().unwrap();
    assert_eq!(result.checks["unpaired_transfers"].status, "error");
}

// ============================================================================
// Query Guard Tests
// ============================================================================

/// Test executing a custom read-only query
#[test]
fn test_execute_custom_query() {
    let temp_dir = TempDir::new().unwrap();
    let ctx = create_test_context(&temp_dir);

    signup(&ctx, "alice@example.com");
    signup(&ctx, "bob@example.com");

    let result = ctx
        .query_service
        .execute("SELECT COUNT(*) AS n FROM accounts")
        .unwrap();
    assert_eq!(result.columns, vec!["n"]);
    assert_eq!(result.row_count, 1);
    assert_eq!(result.rows[0][0], serde_json::json!(2));
}

/// Test that the query guard rejects writes and multi-statement input
#[test]
fn test_query_guard_rejects_writes() {
    let temp_dir = TempDir::new().unwrap();
    let ctx = create_test_context(&temp_dir);

    for sql in [
        "DELETE FROM entries",
        "UPDATE accounts SET balance = 0",
        "DROP TABLE accounts",
        "SELECT 1; SELECT 2",
    ] {
        assert!(
            ctx.query_service.execute(sql).is_err(),
            "Query should be rejected: {}",
            sql
        );
    }
}

// ============================================================================
// Backup Tests
// ============================================================================

/// Test that backup create/list round-trips metadata
#[test]
fn test_backup_create_and_list() {
    let temp_dir = TempDir::new().unwrap();
    {
        let ctx = create_test_context(&temp_dir);
        let alice = signup(&ctx, "alice@example.com");
        fund(&ctx, &alice.id, 100);
    }

    let backup_service = BackupService::new(
        temp_dir.path().to_path_buf(),
        "kointap.duckdb".to_string(),
    );

    let backup = backup_service.create(None).unwrap();
    assert!(backup.name.starts_with("kointap-"), "Backup name format");
    assert!(backup.name.ends_with(".zip"), "Backup should be a zip file");
    assert!(backup.size_bytes > 0, "Backup should have content");

    let backups = backup_service.list().unwrap();
    assert_eq!(backups.len(), 1);
    assert_eq!(backups[0].name, backup.name);
}

/// Test the retention policy keeps only the newest backups
#[test]
fn test_backup_retention_policy() {
    let temp_dir = TempDir::new().unwrap();
    {
        let ctx = create_test_context(&temp_dir);
        signup(&ctx, "alice@example.com");
    }

    let backup_service = BackupService::new(
        temp_dir.path().to_path_buf(),
        "kointap.duckdb".to_string(),
    );

    for _ in 0..4 {
        backup_service.create(Some(2)).unwrap();
    }

    let backups = backup_service.list().unwrap();
    assert_eq!(backups.len(), 2, "Retention should keep only 2 backups");
}

/// Test that restore rolls the ledger back to the backed-up state
#[test]
fn test_backup_restore_rolls_back_state() {
    let temp_dir = TempDir::new().unwrap();

    let account_id = {
        let ctx = create_test_context(&temp_dir);
        let alice = signup(&ctx, "alice@example.com");
        fund(&ctx, &alice.id, 100);
        alice.id
    };

    let backup_service = BackupService::new(
        temp_dir.path().to_path_buf(),
        "kointap.duckdb".to_string(),
    );
    let backup = backup_service.create(None).unwrap();

    // Mutate after the backup
    {
        let ctx = create_test_context(&temp_dir);
        fund(&ctx, &account_id, 900);
        let balance = ctx.ledger_service.balance(&account_id).unwrap().balance;
        assert_eq!(balance, Decimal::from(1000));
    }

    backup_service.restore(&backup.name).unwrap();

    let ctx = create_test_context(&temp_dir);
    let balance = ctx.ledger_service.balance(&account_id).unwrap().balance;
    assert_eq!(balance, Decimal::from(100), "Restore undoes later deposits");

    // Restore keeps a pre-restore safety copy alongside the original
    let backups = backup_service.list().unwrap();
    assert!(backups.len() >= 2);
    assert!(backups.iter().any(|b| b.name.contains("pre-restore")));
}

/// Test clearing all backups
#[test]
fn test_backup_clear() {
    let temp_dir = TempDir::new().unwrap();
    {
        let ctx = create_test_context(&temp_dir);
        signup(&ctx, "alice@example.com");
    }

    let backup_service = BackupService::new(
        temp_dir.path().to_path_buf(),
        "kointap.duckdb".to_string(),
    );
    backup_service.create(None).unwrap();
    backup_service.create(None).unwrap();

    let result = backup_service.clear().unwrap();
    assert_eq!(result.deleted, 2);
    assert!(backup_service.list().unwrap().is_empty());
}

// ============================================================================
// Migration Tests
// ============================================================================

/// Test that migrations apply once and are idempotent after that
#[test]
fn test_migrations_idempotent() {
    let temp_dir = TempDir::new().unwrap();
    let store = create_test_store(&temp_dir);

    // create_test_store already ran them once
    let rerun = store.run_migrations().unwrap();
    assert!(rerun.applied.is_empty(), "Nothing new to apply");
    assert!(rerun.already_applied > 0);

    // Schema is intact and usable
    assert!(store.table_exists("accounts").unwrap());
    assert!(store.table_exists("entries").unwrap());
    assert!(store.table_exists("identities").unwrap());
    assert!(store.table_exists("account_items").unwrap());
}

/// Test that a reopened database keeps its data and skips migrations
#[test]
fn test_reopen_preserves_data() {
    let temp_dir = TempDir::new().unwrap();

    let (account_id, code) = {
        let ctx = create_test_context(&temp_dir);
        let alice = signup(&ctx, "alice@example.com");
        fund(&ctx, &alice.id, 777);
        (alice.id, alice.referral_code)
    };

    let ctx = create_test_context(&temp_dir);
    let account = ctx.ledger_service.balance(&account_id).unwrap();
    assert_eq!(account.balance, Decimal::from(777));
    assert_eq!(account.referral_code, code);
}
