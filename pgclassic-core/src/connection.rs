use crate::{ClassicQuoter, Result, RowLabeled, RowsAffected, SqlQuoter, TableRef};
use futures::Stream;
use std::{future::Future, time::Duration};

/// A notification delivered on a LISTEN channel.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    /// The channel the notification arrived on.
    pub channel: String,
    /// Backend process id of the sending connection.
    pub pid: i32,
    /// Attached payload, possibly empty.
    pub payload: String,
}

/// The collaborator contract this layer builds on.
///
/// A driver supplies synchronous-looking async query execution, the
/// LISTEN/NOTIFY primitives and catalog introspection; everything else in
/// the crate is generic over it. The provided methods compose the required
/// ones, so a driver only implements the six required entries.
pub trait Connection: Send {
    /// Backend process id of this connection, as reported by the server.
    fn backend_pid(&self) -> i32;

    /// Run a statement, returning the modify effect. Engine failures surface
    /// as [`DbError::Database`](crate::DbError::Database) with the SQLSTATE
    /// attached, connection drops as
    /// [`DbError::Connection`](crate::DbError::Connection).
    fn execute(&mut self, sql: &str) -> impl Future<Output = Result<RowsAffected>> + Send;

    /// Run a query and stream the resulting rows.
    fn fetch(&mut self, sql: &str) -> impl Stream<Item = Result<RowLabeled>> + Send;

    /// Block until a notification arrives on any channel this connection
    /// listens on, or until `timeout` elapses.
    ///
    /// `Ok(None)` signals timeout expiry, which is a normal outcome and
    /// never an error; `Err` is reserved for connection faults.
    fn wait_for_notification(
        &mut self,
        timeout: Option<Duration>,
    ) -> impl Future<Output = Result<Option<Notification>>> + Send;

    /// Primary key column(s) of a relation, empty when it has none.
    fn primary_key(&mut self, table: &TableRef)
    -> impl Future<Output = Result<Vec<String>>> + Send;

    /// Attribute names with their declared catalog type names, in attribute
    /// order.
    fn column_types(
        &mut self,
        table: &TableRef,
    ) -> impl Future<Output = Result<Vec<(String, String)>>> + Send;

    /// Subscribe this connection to a notification channel.
    fn listen(&mut self, channel: &str) -> impl Future<Output = Result<()>> + Send {
        let mut sql = String::with_capacity(channel.len() + 10);
        sql.push_str("LISTEN ");
        ClassicQuoter.write_identifier_quoted(&mut sql, channel);
        async move { self.execute(&sql).await.map(|_| ()) }
    }

    /// Drop this connection's subscription to a notification channel.
    fn unlisten(&mut self, channel: &str) -> impl Future<Output = Result<()>> + Send {
        let mut sql = String::with_capacity(channel.len() + 12);
        sql.push_str("UNLISTEN ");
        ClassicQuoter.write_identifier_quoted(&mut sql, channel);
        async move { self.execute(&sql).await.map(|_| ()) }
    }

    /// Send an application level notification with a payload.
    fn send_notification(
        &mut self,
        channel: &str,
        payload: &str,
    ) -> impl Future<Output = Result<()>> + Send {
        let mut sql = String::with_capacity(channel.len() + payload.len() + 12);
        sql.push_str("NOTIFY ");
        ClassicQuoter.write_identifier_quoted(&mut sql, channel);
        sql.push_str(", ");
        ClassicQuoter.write_value_string(&mut sql, payload);
        async move { self.execute(&sql).await.map(|_| ()) }
    }
}
