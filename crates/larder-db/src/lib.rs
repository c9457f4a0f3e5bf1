//! # larder-db: Database Layer for Larder
//!
//! This crate provides database access for the Larder inventory ledger.
//! It uses SQLite for local storage with sqlx for async operations.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Larder Data Flow                                 │
//! │                                                                         │
//! │  Collaborator call (record_sale, confirm_bill, adjust, ...)            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     larder-db (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │ Repositories  │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │ & engines     │    │  (embedded)  │  │   │
//! │  │   │               │    │               │    │              │  │   │
//! │  │   │ SqlitePool    │◄───│ SaleEngine    │    │ 001_init.sql │  │   │
//! │  │   │ Connection    │    │ Replenishment │    │ ...          │  │   │
//! │  │   │ Management    │    │ Adjustment    │    │              │  │   │
//! │  │   └───────────────┘    └───────┬───────┘    └──────────────┘  │   │
//! │  │                                │                               │   │
//! │  │                        ┌───────▼───────┐                       │   │
//! │  │                        │  ledger.rs    │  EVERY quantity       │   │
//! │  │                        │apply_movement │  mutation goes        │   │
//! │  │                        └───────────────┘  through here         │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite database (WAL mode)                                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database and combined engine error types
//! - [`ledger`] - The single write path for product quantities
//! - [`repository`] - Repositories and mutation engines
//!
//! ## Usage
//!
//! ```rust,ignore
//! use larder_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("path/to/larder.db")).await?;
//!
//! let sale = db
//!     .sales()
//!     .record_sale(&dish_id, 3, sale_date, None)
//!     .await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod ledger;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult, LedgerError, LedgerResult};
pub use ledger::{apply_movement, NewMovement};
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::adjustment::AdjustmentEngine;
pub use repository::bill::{BillLineInput, ReplenishmentEngine};
pub use repository::lot::{BatchFailure, BatchOutcome, LotRepository, LotView, NewLot};
pub use repository::movement::{BalanceMismatch, MovementRepository};
pub use repository::product::{NewProduct, ProductRepository};
pub use repository::recipe::RecipeGraph;
pub use repository::sale::SaleEngine;
