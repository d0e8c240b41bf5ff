//! Nested transactions: the level state machine and block macros.
//!
//! Engines only know one real transaction per session. Nesting is emulated with
//! savepoints: level 1 is the real transaction, every deeper level `L` lives in a
//! savepoint named `sp{L}` that is created on entry and released (or rolled back
//! to) on exit.
//!
//! | level | begin | commit | rollback |
//! |---|---|---|---|
//! | 0 | `BEGIN` | no-op | no-op |
//! | 1 | `SAVEPOINT sp2` | `COMMIT` | `ROLLBACK` |
//! | L > 1 | `SAVEPOINT sp{L+1}` | `RELEASE SAVEPOINT sp{L}` | `ROLLBACK TO SAVEPOINT sp{L}` |
//!
//! # Example
//!
//! ```ignore
//! use quarry::{Connection, DbResult};
//!
//! # async fn demo(conn: &mut Connection) -> DbResult<()> {
//! quarry::transaction!(conn, {
//!     conn.table("accounts").where_eq("id", 1).decrement(conn, "balance", 100).await?;
//!     conn.table("accounts").where_eq("id", 2).increment(conn, "balance", 100).await?;
//!     Ok(())
//! })?;
//! # Ok(()) }
//! ```

/// Statement the connection must issue for a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionStep {
    Begin,
    Commit,
    Rollback,
    Savepoint(String),
    Release(String),
    RollbackTo(String),
}

/// Nesting depth of the open transaction (0 = none).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransactionState {
    level: u32,
}

/// Name of the savepoint that backs nesting level `level`.
pub fn savepoint_name(level: u32) -> String {
    format!("sp{level}")
}

impl TransactionState {
    pub fn level(&self) -> u32 {
        self.level
    }

    pub fn in_transaction(&self) -> bool {
        self.level > 0
    }

    /// Step that opens the next level.
    pub fn begin_step(&self) -> TransactionStep {
        match self.level {
            0 => TransactionStep::Begin,
            n => TransactionStep::Savepoint(savepoint_name(n + 1)),
        }
    }

    /// Step that commits the current level; `None` when nothing is open.
    pub fn commit_step(&self) -> Option<TransactionStep> {
        match self.level {
            0 => None,
            1 => Some(TransactionStep::Commit),
            n => Some(TransactionStep::Release(savepoint_name(n))),
        }
    }

    /// Step that rolls back the current level; `None` when nothing is open.
    pub fn rollback_step(&self) -> Option<TransactionStep> {
        match self.level {
            0 => None,
            1 => Some(TransactionStep::Rollback),
            n => Some(TransactionStep::RollbackTo(savepoint_name(n))),
        }
    }

    /// Record that a begin step succeeded.
    pub(crate) fn entered(&mut self) {
        self.level += 1;
    }

    /// Record that a commit or rollback step succeeded.
    pub(crate) fn left(&mut self) {
        self.level = self.level.saturating_sub(1);
    }

    pub(crate) fn reset(&mut self) {
        self.level = 0;
    }
}

/// Runs the given block inside a (possibly nested) transaction on a
/// [`Connection`](crate::Connection).
///
/// - Begins via `begin_transaction()`; nested use creates a savepoint.
/// - Commits on `Ok(_)`.
/// - Rolls back on `Err(_)` and returns the block's error.
///
/// The block must evaluate to `quarry::DbResult<T>`. The macro evaluates to
/// `DbResult<T>`; a failed begin or commit becomes [`DbError::Transaction`](crate::DbError::Transaction).
#[macro_export]
macro_rules! transaction {
    ($conn:expr, $body:block) => {{
        if !($conn).begin_transaction().await {
            Err($crate::DbError::Transaction(::std::format!(
                "begin failed: {}",
                ($conn).last_error().unwrap_or("unknown error")
            )))
        } else {
            let __quarry_tx_body_result = async { $body }.await;
            match __quarry_tx_body_result {
                Ok(value) => {
                    if ($conn).commit().await {
                        Ok(value)
                    } else {
                        Err($crate::DbError::Transaction(::std::format!(
                            "commit failed: {}",
                            ($conn).last_error().unwrap_or("unknown error")
                        )))
                    }
                }
                Err(error) => {
                    if ($conn).rollback().await {
                        Err(error)
                    } else {
                        Err($crate::DbError::Transaction(::std::format!(
                            "{error} (rollback failed: {})",
                            ($conn).last_error().unwrap_or("unknown error")
                        )))
                    }
                }
            }
        }
    }};
}

/// Runs the given block inside an explicitly named savepoint of the open
/// transaction.
///
/// - Releases the savepoint on `Ok(_)`.
/// - Rolls back to it on `Err(_)`; the outer transaction stays usable.
///
/// Fails with [`DbError::Transaction`](crate::DbError::Transaction) when no
/// transaction is open or when the release or rollback statement fails.
#[macro_export]
macro_rules! savepoint {
    ($conn:expr, $name:expr, $body:block) => {{
        let __quarry_sp_name: &str = $name;
        if !($conn).savepoint(__quarry_sp_name).await {
            Err($crate::DbError::Transaction(::std::format!(
                "savepoint {} failed: {}",
                __quarry_sp_name,
                ($conn).last_error().unwrap_or("no open transaction")
            )))
        } else {
            let __quarry_sp_body_result = async { $body }.await;
            match __quarry_sp_body_result {
                Ok(value) => {
                    if ($conn).release_savepoint(__quarry_sp_name).await {
                        Ok(value)
                    } else {
                        Err($crate::DbError::Transaction(::std::format!(
                            "release of savepoint {} failed: {}",
                            __quarry_sp_name,
                            ($conn).last_error().unwrap_or("no open transaction")
                        )))
                    }
                }
                Err(error) => {
                    if ($conn).rollback_to_savepoint(__quarry_sp_name).await {
                        Err(error)
                    } else {
                        Err($crate::DbError::Transaction(::std::format!(
                            "{error} (rollback to savepoint {} failed: {})",
                            __quarry_sp_name,
                            ($conn).last_error().unwrap_or("no open transaction")
                        )))
                    }
                }
            }
        }
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn begin_commit_at_each_level() {
        let mut state = TransactionState::default();
        assert_eq!(state.commit_step(), None);
        assert_eq!(state.rollback_step(), None);

        assert_eq!(state.begin_step(), TransactionStep::Begin);
        state.entered();
        assert_eq!(state.begin_step(), TransactionStep::Savepoint("sp2".into()));
        state.entered();
        assert_eq!(state.commit_step(), Some(TransactionStep::Release("sp2".into())));
        state.left();
        assert_eq!(state.commit_step(), Some(TransactionStep::Commit));
        state.left();
        assert!(!state.in_transaction());
    }

    #[test]
    fn savepoint_names_are_symmetric() {
        let mut state = TransactionState::default();
        for _ in 0..3 {
            state.entered();
        }
        assert_eq!(state.rollback_step(), Some(TransactionStep::RollbackTo("sp3".into())));
        state.left();
        assert_eq!(state.begin_step(), TransactionStep::Savepoint("sp3".into()));
        assert_eq!(state.rollback_step(), Some(TransactionStep::RollbackTo("sp2".into())));
    }

    #[test]
    fn left_never_underflows() {
        let mut state = TransactionState::default();
        state.left();
        assert_eq!(state.level(), 0);
    }
}
