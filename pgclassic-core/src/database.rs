use crate::{
    ClassicQuoter, Connection, DbError, Result, RowLabeled, RowsAffected, SqlQuoter, TableRef,
    TypeFamily, Value, separated_by, stream::StreamExt, truncate_long,
};
use futures::Stream;
use std::{collections::HashMap, pin::pin, sync::Arc};

/// Attribute names of a relation with their classified type families, in
/// attribute order.
pub type AttNames = Arc<[(String, TypeFamily)]>;

/// High-level convenience wrapper over a [`Connection`].
///
/// Implements the classic get/insert/update helpers keyed by primary key,
/// with cached catalog introspection and type-aware literal quoting. All
/// generated SQL embeds values through the [`ClassicQuoter`], so callers
/// hand over [`Value`]s and relation/column names, never SQL fragments.
pub struct Database<C: Connection> {
    connection: C,
    quoter: ClassicQuoter,
    pkeys: HashMap<String, Arc<[String]>>,
    attnames: HashMap<String, AttNames>,
}

impl<C: Connection> Database<C> {
    pub fn new(connection: C) -> Self {
        Self {
            connection,
            quoter: ClassicQuoter,
            pkeys: HashMap::new(),
            attnames: HashMap::new(),
        }
    }

    pub fn connection(&mut self) -> &mut C {
        &mut self.connection
    }

    pub fn into_connection(self) -> C {
        self.connection
    }

    /// Run a raw statement on the underlying connection.
    pub async fn execute(&mut self, sql: &str) -> Result<RowsAffected> {
        self.connection.execute(sql).await
    }

    /// Run a raw query on the underlying connection, streaming rows.
    pub fn fetch(&mut self, sql: &str) -> impl Stream<Item = Result<RowLabeled>> + Send {
        self.connection.fetch(sql)
    }

    /// Primary key column(s) of `relation`, cached per schema-qualified
    /// name. A relation without a primary key (e.g. a view) is a usage
    /// error; address it through `get` with an explicit key column instead.
    pub async fn pkey(&mut self, relation: &str) -> Result<Arc<[String]>> {
        let table = TableRef::parse(relation)?;
        let cache_key = table.full_name();
        if let Some(columns) = self.pkeys.get(&cache_key) {
            return Ok(columns.clone());
        }
        let columns = self.connection.primary_key(&table).await?;
        if columns.is_empty() {
            return Err(
                DbError::usage(format!("relation `{}` has no primary key", cache_key)).into(),
            );
        }
        let columns: Arc<[String]> = columns.into();
        self.pkeys.insert(cache_key, columns.clone());
        Ok(columns)
    }

    /// Attribute names of `relation` with their classified type families,
    /// cached per schema-qualified name. Unrecognized catalog types classify
    /// as text (see [`TypeFamily::from_catalog`]).
    pub async fn attnames(&mut self, relation: &str) -> Result<AttNames> {
        let table = TableRef::parse(relation)?;
        let cache_key = table.full_name();
        if let Some(attributes) = self.attnames.get(&cache_key) {
            return Ok(attributes.clone());
        }
        let attributes: AttNames = self
            .connection
            .column_types(&table)
            .await?
            .into_iter()
            .map(|(name, type_name)| (name, TypeFamily::from_catalog(&type_name)))
            .collect();
        self.attnames.insert(cache_key, attributes.clone());
        Ok(attributes)
    }

    /// Fetch the single row of `relation` whose key column equals `key`.
    ///
    /// The key column is `keyname` when given (required for relations
    /// without a primary key), otherwise the relation's single primary key
    /// column. A missing row surfaces as a database error with SQLSTATE
    /// `02000`.
    pub async fn get(
        &mut self,
        relation: &str,
        key: Value,
        keyname: Option<&str>,
    ) -> Result<RowLabeled> {
        let table = TableRef::parse(relation)?;
        let key_column = match keyname {
            Some(name) => name.to_owned(),
            None => {
                let pkey = self.pkey(relation).await?;
                let [single] = pkey.as_ref() else {
                    return Err(DbError::usage(format!(
                        "relation `{}` has a composite primary key, pass the key column explicitly",
                        table.full_name()
                    ))
                    .into());
                };
                single.clone()
            }
        };
        let attributes = self.attnames(relation).await?;
        let family = column_family(&attributes, &key_column)
            .ok_or_else(|| {
                DbError::usage(format!(
                    "relation `{}` has no column `{}`",
                    table.full_name(),
                    key_column
                ))
            })?;
        let mut sql = String::with_capacity(128);
        sql.push_str("SELECT * FROM ");
        table.write_quoted(&self.quoter, &mut sql);
        sql.push_str(" WHERE ");
        self.quoter.write_identifier_quoted(&mut sql, &key_column);
        sql.push_str(" = ");
        self.quoter.write_literal(&mut sql, &key, family)?;
        self.fetch_one(&sql).await?.ok_or_else(|| {
            DbError::database(
                "02000",
                format!("no row in `{}` with {} = {:?}", table.full_name(), key_column, key),
            )
            .into()
        })
    }

    /// Insert `row` into `relation` and fold the stored row (server-side
    /// defaults included) back into the map.
    ///
    /// Only keys matching a known attribute participate; columns are written
    /// in attribute order so the generated SQL is deterministic.
    pub async fn insert(
        &mut self,
        relation: &str,
        row: &mut HashMap<String, Value>,
    ) -> Result<()> {
        let table = TableRef::parse(relation)?;
        let attributes = self.attnames(relation).await?;
        let columns: Vec<&(String, TypeFamily)> = attributes
            .iter()
            .filter(|(name, _)| row.contains_key(name))
            .collect();
        if columns.is_empty() {
            return Err(DbError::usage(format!(
                "no known column of `{}` present in the row to insert",
                table.full_name()
            ))
            .into());
        }
        let mut sql = String::with_capacity(256);
        sql.push_str("INSERT INTO ");
        table.write_quoted(&self.quoter, &mut sql);
        sql.push_str(" (");
        separated_by(
            &mut sql,
            &columns,
            |out, (name, _)| self.quoter.write_identifier_quoted(out, name),
            ", ",
        );
        sql.push_str(") VALUES (");
        let mut quoted = Ok(());
        separated_by(
            &mut sql,
            &columns,
            |out, (name, family)| {
                if quoted.is_ok() {
                    quoted = self.quoter.write_literal(out, &row[name], *family);
                }
            },
            ", ",
        );
        quoted?;
        sql.push_str(") RETURNING *");
        if let Some(stored) = self.fetch_one(&sql).await? {
            fold_row(row, &stored);
        }
        Ok(())
    }

    /// Update the row of `relation` identified by the primary key columns in
    /// `row`, setting every other known column present, and fold the stored
    /// row back into the map.
    pub async fn update(
        &mut self,
        relation: &str,
        row: &mut HashMap<String, Value>,
    ) -> Result<()> {
        let table = TableRef::parse(relation)?;
        let pkey = self.pkey(relation).await?;
        if let Some(missing) = pkey.iter().find(|column| !row.contains_key(*column)) {
            return Err(DbError::usage(format!(
                "cannot update `{}` without key column `{}`",
                table.full_name(),
                missing
            ))
            .into());
        }
        let attributes = self.attnames(relation).await?;
        let updated: Vec<&(String, TypeFamily)> = attributes
            .iter()
            .filter(|(name, _)| row.contains_key(name) && !pkey.contains(name))
            .collect();
        if updated.is_empty() {
            return Err(DbError::usage(format!(
                "no non-key column of `{}` present in the row to update",
                table.full_name()
            ))
            .into());
        }
        let mut sql = String::with_capacity(256);
        sql.push_str("UPDATE ");
        table.write_quoted(&self.quoter, &mut sql);
        sql.push_str(" SET ");
        let mut quoted = Ok(());
        separated_by(
            &mut sql,
            &updated,
            |out, (name, family)| {
                self.quoter.write_identifier_quoted(out, name);
                out.push_str(" = ");
                if quoted.is_ok() {
                    quoted = self.quoter.write_literal(out, &row[name], *family);
                }
            },
            ", ",
        );
        quoted?;
        sql.push_str(" WHERE ");
        let mut quoted = Ok(());
        separated_by(
            &mut sql,
            pkey.iter(),
            |out, name| {
                self.quoter.write_identifier_quoted(out, name);
                out.push_str(" = ");
                let family = column_family(&attributes, name).unwrap_or(TypeFamily::Text);
                if quoted.is_ok() {
                    quoted = self.quoter.write_literal(out, &row[name], family);
                }
            },
            " AND ",
        );
        quoted?;
        sql.push_str(" RETURNING *");
        if let Some(stored) = self.fetch_one(&sql).await? {
            fold_row(row, &stored);
        }
        Ok(())
    }

    /// Run `work` inside a transaction: BEGIN before, COMMIT on `Ok`,
    /// ROLLBACK and re-raise on `Err`.
    pub async fn transaction<T, F>(&mut self, work: F) -> Result<T>
    where
        F: AsyncFnOnce(&mut Self) -> Result<T>,
    {
        self.connection.execute("BEGIN").await?;
        match work(self).await {
            Ok(value) => {
                self.connection.execute("COMMIT").await?;
                Ok(value)
            }
            Err(error) => {
                self.connection.execute("ROLLBACK").await?;
                Err(error)
            }
        }
    }

    async fn fetch_one(&mut self, sql: &str) -> Result<Option<RowLabeled>> {
        log::debug!("{}", truncate_long!(sql));
        let mut stream = pin!(self.connection.fetch(sql));
        stream.next().await.transpose()
    }
}

fn column_family(attributes: &[(String, TypeFamily)], column: &str) -> Option<TypeFamily> {
    attributes
        .iter()
        .find(|(name, _)| name == column)
        .map(|(_, family)| *family)
}

fn fold_row(row: &mut HashMap<String, Value>, stored: &RowLabeled) {
    for (label, value) in stored.labels.iter().zip(stored.values.iter()) {
        row.insert(label.clone(), value.clone());
    }
}
