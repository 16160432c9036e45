//! Services layer - business logic
//!
//! Ledger-facing services (auth, ledger, game, shop) return the typed
//! error taxonomy so callers can branch on failure kinds. Maintenance
//! services (status, doctor, backup, query, compact, demo, logging) are
//! operator tooling and use anyhow.

pub mod auth;
pub mod backup;
pub mod compact;
pub mod demo;
pub mod doctor;
pub mod game;
pub mod ledger;
pub mod logging;
pub mod migration;
pub mod query;
pub mod shop;
pub mod status;

pub use auth::{AuthService, Session, SignupReceipt};
pub use backup::{BackupMetadata, BackupService, ClearResult};
pub use compact::{CompactResult, CompactService};
pub use demo::{DemoService, DEMO_PASSWORD};
pub use doctor::{CheckResult, DoctorResult, DoctorService, DoctorSummary};
pub use game::{GameService, RoundSettlement};
pub use ledger::{LedgerService, TransferReceipt};
pub use logging::{EntryPoint, LogEntry, LogEvent, LoggingService};
pub use migration::{MigrationResult, MigrationService};
pub use query::QueryService;
pub use shop::{PurchaseReceipt, ShopService};
pub use status::{AccountSummary, DateRange, StatusService, StatusSummary};
