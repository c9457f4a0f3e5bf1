//! # Repository Module
//!
//! Repositories and mutation engines for the Larder inventory ledger.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repositories vs. Engines                             │
//! │                                                                         │
//! │  Repositories read and write a single aggregate:                       │
//! │       db.products().get_by_id(&id)                                     │
//! │       db.movements().for_product(&id)                                  │
//! │       db.lots().create(new_lot)                                        │
//! │                                                                         │
//! │  Engines run multi-table transactions and are the only callers of      │
//! │  ledger::apply_movement:                                               │
//! │       db.sales().record_sale(...)   ─┐                                 │
//! │       db.bills().confirm_bill(...)   ├──► ledger::apply_movement       │
//! │       db.adjustments().adjust(...)  ─┘         (CAS write path)        │
//! │                                                                         │
//! │  Benefits:                                                              │
//! │  • SQL is isolated in one place per aggregate                          │
//! │  • Every quantity mutation funnels through one audited primitive       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories & Engines
//!
//! - [`product::ProductRepository`] - Product CRUD, upsert-by-name, bulk import
//! - [`movement::MovementRepository`] - Read side of the ledger
//! - [`recipe::RecipeGraph`] - Dishes, compositions, feasibility and cost
//! - [`sale::SaleEngine`] - Sale recording, update and reversal
//! - [`bill::ReplenishmentEngine`] - Supplier bills and confirmation
//! - [`adjustment::AdjustmentEngine`] - Manual count corrections
//! - [`lot::LotRepository`] - Expiration (best-before) lots

pub mod adjustment;
pub mod bill;
pub mod lot;
pub mod movement;
pub mod product;
pub mod recipe;
pub mod sale;
