use crate::{Connection, Result};

/// An explicit transaction over a borrowed connection.
///
/// `begin` issues BEGIN; `commit` / `rollback` consume the scope. Statements
/// inside the scope go through [`connection`](TransactionScope::connection).
/// Dropping the scope without finishing it cannot roll back (Drop cannot
/// await) and is reported as a warning; prefer
/// [`Database::transaction`](crate::Database::transaction) for closure
/// scoped commit-or-rollback semantics.
pub struct TransactionScope<'c, C: Connection> {
    connection: &'c mut C,
    open: bool,
}

impl<'c, C: Connection> TransactionScope<'c, C> {
    pub async fn begin(connection: &'c mut C) -> Result<TransactionScope<'c, C>> {
        connection.execute("BEGIN").await?;
        Ok(Self {
            connection,
            open: true,
        })
    }

    pub fn connection(&mut self) -> &mut C {
        self.connection
    }

    pub async fn commit(mut self) -> Result<()> {
        self.open = false;
        self.connection.execute("COMMIT").await.map(|_| ())
    }

    pub async fn rollback(mut self) -> Result<()> {
        self.open = false;
        self.connection.execute("ROLLBACK").await.map(|_| ())
    }
}

impl<'c, C: Connection> Drop for TransactionScope<'c, C> {
    fn drop(&mut self) {
        if self.open {
            log::warn!("transaction scope dropped without commit or rollback");
        }
    }
}
