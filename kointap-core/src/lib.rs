//! Kointap Core - ledger and game logic for the KTC tap-to-earn wallet
//!
//! This crate implements the core domain logic following hexagonal architecture:
//!
//! - **domain**: Core business entities (Account, Transaction, TapRound, etc.)
//! - **ports**: Trait definitions for external dependencies (IdentityProvider)
//! - **services**: Business logic orchestration
//! - **adapters**: Concrete implementations (DuckDB store, local identity)

pub mod domain;
pub mod ports;
pub mod services;
pub mod adapters;
pub mod config;
pub mod migrations;
pub mod log_migrations;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;

use adapters::duckdb::DuckDbStore;
use adapters::local_identity::LocalIdentityProvider;
use config::Config;
use ports::IdentityProvider;
use services::*;

// Re-export commonly used types at crate root
pub use adapters::duckdb::{QueryResult, SignupOutcome, TransferOutcome};
pub use domain::result::{Error, OperationResult};
pub use domain::{
    Account, EntryKind, Identity, Multiplier, OwnedItem, RoundPhase, StoreItem, TapRound,
    Transaction,
};
pub use services::{EntryPoint, LogEvent, LoggingService};

/// Main context for Kointap operations
///
/// This is the primary entry point for all business logic. It holds
/// the store, configuration, and all services.
pub struct KointapContext {
    pub config: Config,
    pub store: Arc<DuckDbStore>,
    pub auth_service: AuthService,
    pub ledger_service: LedgerService,
    pub game_service: GameService,
    pub shop_service: ShopService,
    pub status_service: StatusService,
    pub query_service: QueryService,
    pub backup_service: BackupService,
    pub compact_service: CompactService,
    pub doctor_service: DoctorService,
}

impl KointapContext {
    /// Create a new Kointap context
    pub fn new(data_dir: &Path) -> Result<Self> {
        let config = Config::load(data_dir)?;

        // Demo mode runs against its own sandbox database
        let db_filename = if config.demo_mode {
            "demo.duckdb"
        } else {
            "kointap.duckdb"
        };

        let db_path = data_dir.join(db_filename);
        let store = Arc::new(DuckDbStore::new(&db_path)?);

        // Initialize schema
        store.ensure_schema()?;

        let identity: Arc<dyn IdentityProvider> =
            Arc::new(LocalIdentityProvider::new(Arc::clone(&store)));

        // Create services
        let auth_service = AuthService::new(
            Arc::clone(&store),
            Arc::clone(&identity),
            data_dir,
            config.welcome_bonus,
            config.referral_bonus,
        );
        let ledger_service = LedgerService::new(Arc::clone(&store));
        let game_service = GameService::new(
            Arc::clone(&store),
            Duration::from_secs(config.round_seconds),
            config.tap_reward,
        );
        let shop_service = ShopService::new(Arc::clone(&store));
        let status_service = StatusService::new(Arc::clone(&store));
        let query_service = QueryService::new(Arc::clone(&store));
        let backup_service = BackupService::new(data_dir.to_path_buf(), db_filename.to_string());
        let compact_service = CompactService::new(Arc::clone(&store));
        let doctor_service = DoctorService::new(Arc::clone(&store));

        Ok(Self {
            config,
            store,
            auth_service,
            ledger_service,
            game_service,
            shop_service,
            status_service,
            query_service,
            backup_service,
            compact_service,
            doctor_service,
        })
    }
}
