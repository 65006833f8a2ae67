//! PgClassic: a classic-style high-level PostgreSQL access layer.
//!
//! The crate wraps any driver implementing the [`Connection`] contract with
//! classic high-level helpers:
//!
//! * [`Database`] — primary-key CRUD (`get` / `insert` / `update`), cached
//!   table introspection (`pkey` / `attnames`) and closure-scoped
//!   transactions,
//! * [`SqlQuoter`] / [`ClassicQuoter`] — type-aware literal quoting used to
//!   splice values into generated SQL,
//! * [`NotificationHandler`] — an asynchronous LISTEN/NOTIFY bridge emitting
//!   typed [`NotifyEvent`]s (or driving a legacy shared-map callback),
//! * [`TransactionScope`] — explicit BEGIN/COMMIT/ROLLBACK scoping.
//!
//! ```rust,ignore
//! let mut db = Database::new(connection);
//! let mut row = HashMap::from([("name".into(), Value::from("Ada"))]);
//! db.insert("public.users", &mut row).await?;
//! let found = db.get("public.users", Value::Int(1), None).await?;
//! ```

pub use pgclassic_core::*;
