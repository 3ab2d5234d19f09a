/// Account snapshots and the decisions made against them.
/// A snapshot never changes in place, every mutation installs a new one.
pub mod account;

/// Boundary validation: amounts, account numbers and the account opening form.
pub mod command;

/// Immutable ledger records and transaction id generation.
pub mod record;

/// Storage contracts for accounts and the ledger, plus the in memory and
/// journaled implementations.
pub mod store;

/// Atomic, per-account serialized money movements and closures.
pub mod coordinator;

/// Customer facing orchestration on top of the coordinator.
pub mod lifecycle;

/// Engine settings, loadable from JSON.
pub mod config;

/// Headless CSV driver used by the binary and the integration tests.
pub mod bin_utils;
