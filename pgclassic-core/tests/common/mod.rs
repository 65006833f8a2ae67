use futures::{Stream, stream};
use pgclassic_core::{
    Connection, DbError, Notification, Result, RowLabeled, RowNames, RowsAffected, TableRef,
    Value,
};
use std::{
    collections::{HashMap, VecDeque},
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicI32, Ordering},
    },
    time::Duration,
};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

pub fn init_logs() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// An in-process stand-in for a PostgreSQL server: hands out connections,
/// routes NOTIFY traffic between them and serves catalog lookups from
/// registered table definitions.
pub struct MockServer {
    inner: Arc<Mutex<ServerInner>>,
    next_pid: AtomicI32,
}

#[derive(Default)]
struct ServerInner {
    subscriptions: HashMap<String, Vec<i32>>,
    inboxes: HashMap<i32, UnboundedSender<Notification>>,
    tables: HashMap<String, TableSchema>,
}

#[derive(Clone, Default)]
struct TableSchema {
    pkey: Vec<String>,
    columns: Vec<(String, String)>,
}

impl MockServer {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(ServerInner::default())),
            next_pid: AtomicI32::new(4000),
        }
    }

    pub fn connect(&self) -> MockConnection {
        let pid = self.next_pid.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner.lock().unwrap().inboxes.insert(pid, tx);
        MockConnection {
            pid,
            server: self.inner.clone(),
            inbox: rx,
            log: Arc::new(Mutex::new(Vec::new())),
            script: Arc::new(Mutex::new(VecDeque::new())),
            drop_on_wait: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Register a relation for catalog lookups. `name` is schema qualified
    /// (`schema.table`); an empty `pkey` models a relation without one.
    pub fn create_table(&self, name: &str, pkey: &[&str], columns: &[(&str, &str)]) {
        self.inner.lock().unwrap().tables.insert(
            name.to_owned(),
            TableSchema {
                pkey: pkey.iter().map(|c| (*c).to_owned()).collect(),
                columns: columns
                    .iter()
                    .map(|(c, t)| ((*c).to_owned(), (*t).to_owned()))
                    .collect(),
            },
        );
    }
}

enum Scripted {
    Rows(Vec<RowLabeled>),
    Fail { sqlstate: String, message: String },
}

pub struct MockConnection {
    pid: i32,
    server: Arc<Mutex<ServerInner>>,
    inbox: UnboundedReceiver<Notification>,
    log: Arc<Mutex<Vec<String>>>,
    script: Arc<Mutex<VecDeque<Scripted>>>,
    drop_on_wait: Arc<AtomicBool>,
}

impl MockConnection {
    /// Every statement executed so far, in order.
    pub fn log(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    /// Shared handle on the statement log, usable after the connection moved
    /// into a handler.
    pub fn log_handle(&self) -> Arc<Mutex<Vec<String>>> {
        self.log.clone()
    }

    /// Queue the row set the next fetching statement returns.
    pub fn script_rows(&self, rows: Vec<RowLabeled>) {
        self.script.lock().unwrap().push_back(Scripted::Rows(rows));
    }

    /// Queue an engine error for the next statement.
    pub fn script_fail(&self, sqlstate: &str, message: &str) {
        self.script.lock().unwrap().push_back(Scripted::Fail {
            sqlstate: sqlstate.to_owned(),
            message: message.to_owned(),
        });
    }

    /// Make the next notification wait fail like a dropped connection.
    pub fn drop_on_next_wait(&self) {
        self.drop_on_wait.store(true, Ordering::Relaxed);
    }

    /// Impersonate another backend process, for exercising same-connection
    /// preconditions.
    pub fn set_pid(&mut self, pid: i32) {
        self.pid = pid;
    }
}

impl Connection for MockConnection {
    fn backend_pid(&self) -> i32 {
        self.pid
    }

    async fn execute(&mut self, sql: &str) -> Result<RowsAffected> {
        self.log.lock().unwrap().push(sql.to_owned());
        if let Some(channel) = sql.strip_prefix("LISTEN ") {
            let channel = unquote_identifier(channel);
            self.server
                .lock()
                .unwrap()
                .subscriptions
                .entry(channel)
                .or_default()
                .push(self.pid);
        } else if let Some(channel) = sql.strip_prefix("UNLISTEN ") {
            let channel = unquote_identifier(channel);
            if let Some(pids) = self.server.lock().unwrap().subscriptions.get_mut(&channel) {
                pids.retain(|pid| *pid != self.pid);
            }
        } else if let Some(rest) = sql.strip_prefix("NOTIFY ") {
            let (channel, payload) = parse_notify(rest);
            let server = self.server.lock().unwrap();
            for pid in server.subscriptions.get(&channel).into_iter().flatten() {
                if let Some(inbox) = server.inboxes.get(pid) {
                    let _ = inbox.send(Notification {
                        channel: channel.clone(),
                        pid: self.pid,
                        payload: payload.clone(),
                    });
                }
            }
        } else {
            let mut script = self.script.lock().unwrap();
            if matches!(script.front(), Some(Scripted::Fail { .. }))
                && let Some(Scripted::Fail { sqlstate, message }) = script.pop_front()
            {
                return Err(DbError::database(sqlstate, message).into());
            }
        }
        Ok(RowsAffected::default())
    }

    fn fetch(&mut self, sql: &str) -> impl Stream<Item = Result<RowLabeled>> + Send {
        self.log.lock().unwrap().push(sql.to_owned());
        let items: Vec<Result<RowLabeled>> = match self.script.lock().unwrap().pop_front() {
            Some(Scripted::Rows(rows)) => rows.into_iter().map(Ok).collect(),
            Some(Scripted::Fail { sqlstate, message }) => {
                vec![Err(DbError::database(sqlstate, message).into())]
            }
            None => Vec::new(),
        };
        stream::iter(items)
    }

    async fn wait_for_notification(
        &mut self,
        timeout: Option<Duration>,
    ) -> Result<Option<Notification>> {
        if self.drop_on_wait.swap(false, Ordering::Relaxed) {
            return Err(DbError::Connection("server closed the connection".into()).into());
        }
        let received = match timeout {
            Some(timeout) => match tokio::time::timeout(timeout, self.inbox.recv()).await {
                Ok(received) => received,
                Err(_elapsed) => return Ok(None),
            },
            None => self.inbox.recv().await,
        };
        match received {
            Some(notification) => Ok(Some(notification)),
            None => Err(DbError::Connection("server closed the connection".into()).into()),
        }
    }

    async fn primary_key(&mut self, table: &TableRef) -> Result<Vec<String>> {
        Ok(self.lookup_table(table)?.pkey)
    }

    async fn column_types(&mut self, table: &TableRef) -> Result<Vec<(String, String)>> {
        Ok(self.lookup_table(table)?.columns)
    }
}

impl MockConnection {
    fn lookup_table(&self, table: &TableRef) -> Result<TableSchema> {
        self.server
            .lock()
            .unwrap()
            .tables
            .get(&table.full_name())
            .cloned()
            .ok_or_else(|| {
                DbError::database(
                    "42P01",
                    format!("relation `{}` does not exist", table.full_name()),
                )
                .into()
            })
    }
}

fn unquote_identifier(text: &str) -> String {
    text.trim()
        .trim_matches('"')
        .replace(r#""""#, r#"""#)
}

fn parse_notify(rest: &str) -> (String, String) {
    let (channel, payload) = rest.split_once(", ").unwrap_or((rest, "''"));
    let payload = payload
        .trim()
        .trim_matches('\'')
        .replace("''", "'")
        .replace(r"\\", r"\");
    (unquote_identifier(channel), payload)
}

/// Build a labeled row out of column/value pairs.
pub fn row(columns: &[(&str, Value)]) -> RowLabeled {
    let labels: RowNames = columns.iter().map(|(name, _)| (*name).to_owned()).collect();
    let values = columns.iter().map(|(_, value)| value.clone()).collect();
    RowLabeled::new(labels, values)
}
