//! # Repository Module
//!
//! Database repository implementations for Kasir.
//!
//! ## Reads vs Unit-of-Work Writes
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Two Ways Into a Repository                           │
//! │                                                                         │
//! │  Reads                                                                  │
//! │       db.catalog().get_item(&id)            ← runs on the pool          │
//! │                                                                         │
//! │  Writes                                                                 │
//! │       let mut tx = db.begin().await?;                                   │
//! │       db.stock().deduct(&mut tx, kind, &id, qty)   ← caller's tx        │
//! │       db.outbox().enqueue(&mut tx, ...)                                 │
//! │       tx.commit().await?;                                               │
//! │                                                                         │
//! │  A method that takes `conn` never commits; the caller decides.          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`CatalogRepository`](catalog::CatalogRepository) - Outlets, items, variants, modifiers, recipes, ingredients
//! - [`TransactionRepository`](transaction::TransactionRepository) - Transaction headers, lines, payments
//! - [`StockRepository`](stock::StockRepository) - Conditional stock writes and the movement ledger
//! - [`OutboxRepository`](outbox::OutboxRepository) - Queued background effects
//! - [`ActivityRepository`](activity::ActivityRepository) - Audit log

pub mod activity;
pub mod catalog;
pub mod outbox;
pub mod stock;
pub mod transaction;
