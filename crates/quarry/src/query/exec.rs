//! Terminal methods: compile the builder and run it on a [`Connection`].

use std::collections::VecDeque;

use futures_core::Stream;
use futures_util::stream;

use super::bindings::BindingKind;
use super::builder::Builder;
use super::grammar::{insert_bindings, insert_columns};
use crate::connection::Connection;
use crate::error::{DbError, DbResult};
use crate::result::{FromRow, ResultSet, Row};
use crate::value::{Expression, Record, Value};

/// Rows fetched per round trip by [`Builder::cursor`].
pub const DEFAULT_CURSOR_BATCH: u64 = 1000;

/// One page of results from [`Builder::paginate`].
#[derive(Debug, Clone)]
pub struct Page {
    pub items: Vec<Row>,
    pub total: u64,
    pub per_page: u64,
    pub current_page: u64,
}

impl Page {
    /// Last page number; 1 for an empty result.
    pub fn last_page(&self) -> u64 {
        if self.per_page == 0 {
            return 1;
        }
        self.total.div_ceil(self.per_page).max(1)
    }

    pub fn has_more_pages(&self) -> bool {
        self.current_page < self.last_page()
    }
}

impl Builder {
    /// Fail on recorded misuse or a builder/connection dialect mismatch.
    fn check(&self, conn: &Connection) -> DbResult<()> {
        if let Some(message) = &self.build_error {
            return Err(DbError::validation(message.clone()));
        }
        if self.dialect != conn.dialect() {
            return Err(DbError::validation(format!(
                "builder for {} cannot run on a {} connection",
                self.dialect.name(),
                conn.dialect().name()
            )));
        }
        Ok(())
    }

    /// Writes need a plain table name.
    fn check_write(&self, conn: &Connection) -> DbResult<()> {
        self.check(conn)?;
        if self.table_name().is_none() {
            return Err(DbError::validation("write statements need a table (call `from`)"));
        }
        Ok(())
    }

    // ── reads ───────────────────────────────────────────────────────────────

    pub async fn get(&self, conn: &mut Connection) -> DbResult<ResultSet> {
        self.check(conn)?;
        conn.select(&self.to_sql(), &self.get_bindings()).await
    }

    /// All rows mapped through [`FromRow`].
    pub async fn get_as<T: FromRow>(&self, conn: &mut Connection) -> DbResult<Vec<T>> {
        self.get(conn).await?.map()
    }

    pub async fn first(&self, conn: &mut Connection) -> DbResult<Option<Row>> {
        let rows = self.clone().limit(1).get(conn).await?;
        Ok(rows.into_rows().into_iter().next())
    }

    /// Like [`first`](Self::first), but a missing row is [`DbError::NotFound`].
    pub async fn first_or_fail(&self, conn: &mut Connection) -> DbResult<Row> {
        self.first(conn).await?.ok_or_else(|| {
            DbError::not_found(format!(
                "no row in `{}` matched the query",
                self.table_name().unwrap_or("<subquery>")
            ))
        })
    }

    /// Row whose `id` equals `id`.
    pub async fn find(&self, conn: &mut Connection, id: impl Into<Value>) -> DbResult<Option<Row>> {
        self.clone().where_eq("id", id).first(conn).await
    }

    /// One column of the first row.
    pub async fn value(&self, conn: &mut Connection, column: &str) -> DbResult<Option<Value>> {
        let row = self.clone().select(&[column]).first(conn).await?;
        Ok(row.and_then(|r| r.get_index(0).cloned()))
    }

    /// One column of every row.
    pub async fn pluck(&self, conn: &mut Connection, column: &str) -> DbResult<Vec<Value>> {
        let rows = self.clone().select(&[column]).get(conn).await?;
        Ok(rows
            .into_rows()
            .into_iter()
            .filter_map(|r| r.into_values().into_iter().next())
            .collect())
    }

    pub async fn exists(&self, conn: &mut Connection) -> DbResult<bool> {
        self.check(conn)?;
        let sql = self.grammar().compile_exists(self);
        let value = conn.scalar(&sql, &self.get_bindings()).await?;
        Ok(value.and_then(|v| v.as_bool()).unwrap_or(false))
    }

    pub async fn doesnt_exist(&self, conn: &mut Connection) -> DbResult<bool> {
        Ok(!self.exists(conn).await?)
    }

    // ── aggregates ──────────────────────────────────────────────────────────

    pub async fn count(&self, conn: &mut Connection) -> DbResult<u64> {
        let value = self.aggregate(conn, "count", &["*"]).await?;
        Ok(value.and_then(|v| v.as_i64()).map_or(0, |n| n.max(0) as u64))
    }

    pub async fn min(&self, conn: &mut Connection, column: &str) -> DbResult<Option<Value>> {
        self.aggregate(conn, "min", &[column]).await
    }

    pub async fn max(&self, conn: &mut Connection, column: &str) -> DbResult<Option<Value>> {
        self.aggregate(conn, "max", &[column]).await
    }

    /// Sum of `column`; 0 over an empty set.
    pub async fn sum(&self, conn: &mut Connection, column: &str) -> DbResult<f64> {
        let value = self.aggregate(conn, "sum", &[column]).await?;
        Ok(value.and_then(|v| v.as_f64()).unwrap_or(0.0))
    }

    pub async fn avg(&self, conn: &mut Connection, column: &str) -> DbResult<Option<f64>> {
        let value = self.aggregate(conn, "avg", &[column]).await?;
        Ok(value.and_then(|v| v.as_f64()))
    }

    /// Run `function(columns)` over the query; `None` when the result is NULL.
    ///
    /// Orders, limits and offsets do not apply to the aggregate.
    pub async fn aggregate(
        &self,
        conn: &mut Connection,
        function: &str,
        columns: &[&str],
    ) -> DbResult<Option<Value>> {
        let mut query = self.clone();
        query.clear_paging();
        if query.unions.is_empty() && query.havings.is_empty() {
            query.columns.clear();
            query.bindings.clear(BindingKind::Select);
        }
        let query = query.set_aggregate(function, columns);
        query.check(conn)?;
        let value = conn.scalar(&query.to_sql(), &query.get_bindings()).await?;
        Ok(value.filter(|v| !v.is_null()))
    }

    // ── pagination / iteration ──────────────────────────────────────────────

    /// Rows of `page` (1-based) plus the total row count.
    pub async fn paginate(&self, conn: &mut Connection, per_page: u64, page: u64) -> DbResult<Page> {
        if per_page == 0 {
            return Err(DbError::validation("per_page must be positive"));
        }
        let page = page.max(1);
        let total = self.count_for_pagination().count(conn).await?;
        let items = if total == 0 {
            Vec::new()
        } else {
            self.clone()
                .for_page(page, per_page)
                .get(conn)
                .await?
                .into_rows()
        };
        Ok(Page {
            items,
            total,
            per_page,
            current_page: page,
        })
    }

    /// Count query for [`paginate`](Self::paginate): no orders, limit or offset.
    ///
    /// Grouped, distinct and compound queries are counted through a sub-select
    /// so every result row counts once.
    pub(crate) fn count_for_pagination(&self) -> Builder {
        let mut query = self.clone();
        query.clear_paging();

        let wrap = !query.groups.is_empty()
            || !query.havings.is_empty()
            || !query.unions.is_empty()
            || query.distinct;
        if wrap {
            return self.new_query().from_sub(query, "aggregate_table");
        }
        query.columns.clear();
        query.bindings.clear(BindingKind::Select);
        query
    }

    /// Drop orders, limits and offsets (plain and union-level) with their bindings.
    fn clear_paging(&mut self) {
        self.orders.clear();
        self.union_orders.clear();
        self.limit = None;
        self.offset = None;
        self.union_limit = None;
        self.union_offset = None;
        self.bindings.clear(BindingKind::Order);
        self.bindings.clear(BindingKind::UnionOrder);
    }

    /// Feed `size`-row pages to `f` until a short page or `f` returns false.
    ///
    /// Returns false when `f` stopped the iteration. Needs an `order_by` so
    /// pages do not overlap.
    pub async fn chunk<F>(&self, conn: &mut Connection, size: u64, mut f: F) -> DbResult<bool>
    where
        F: FnMut(Vec<Row>, u64) -> bool,
    {
        self.check_paging(size)?;
        let mut page = 1;
        loop {
            let rows = self.clone().for_page(page, size).get(conn).await?.into_rows();
            let count = rows.len() as u64;
            if count == 0 {
                break;
            }
            if !f(rows, page) {
                return Ok(false);
            }
            if count < size {
                break;
            }
            page += 1;
        }
        Ok(true)
    }

    fn check_paging(&self, size: u64) -> DbResult<()> {
        if size == 0 {
            return Err(DbError::validation("page size must be positive"));
        }
        if self.orders.is_empty() && self.union_orders.is_empty() {
            return Err(DbError::validation("paged iteration needs an order_by clause"));
        }
        Ok(())
    }

    /// Lazy row stream paging in [`DEFAULT_CURSOR_BATCH`]-row batches.
    pub fn cursor(self, conn: &mut Connection) -> impl Stream<Item = DbResult<Row>> + '_ {
        self.cursor_with_batch(conn, DEFAULT_CURSOR_BATCH)
    }

    /// Lazy row stream; ends at the first empty page or after the first error.
    pub fn cursor_with_batch(
        self,
        conn: &mut Connection,
        batch: u64,
    ) -> impl Stream<Item = DbResult<Row>> + '_ {
        let pending = self.check_paging(batch).and_then(|_| self.check(conn)).err();
        let state = CursorState {
            conn,
            query: self,
            batch,
            page: 1,
            buffer: VecDeque::new(),
            pending,
            done: false,
        };
        stream::unfold(state, |mut state| async move {
            loop {
                if let Some(err) = state.pending.take() {
                    state.done = true;
                    return Some((Err(err), state));
                }
                if let Some(row) = state.buffer.pop_front() {
                    return Some((Ok(row), state));
                }
                if state.done {
                    return None;
                }
                let page = state.query.clone().for_page(state.page, state.batch);
                match page.get(state.conn).await {
                    Ok(rows) if rows.is_empty() => return None,
                    Ok(rows) => {
                        state.page += 1;
                        state.buffer.extend(rows.into_rows());
                    }
                    Err(err) => state.pending = Some(err),
                }
            }
        })
    }

    // ── writes ──────────────────────────────────────────────────────────────

    /// Insert one or more rows. An empty slice is a successful no-op.
    pub async fn insert(&self, conn: &mut Connection, records: &[Record]) -> DbResult<bool> {
        if records.is_empty() {
            return Ok(true);
        }
        self.check_write(conn)?;
        let sql = self.grammar().compile_insert(self, records);
        conn.insert(&sql, &insert_bindings(records)).await
    }

    /// Insert one row and return its generated key.
    ///
    /// `sequence` names the key column for `returning` on PostgreSQL (default
    /// `id`) and the sequence for `last_insert_id` elsewhere.
    pub async fn insert_get_id(
        &self,
        conn: &mut Connection,
        record: &Record,
        sequence: Option<&str>,
    ) -> DbResult<i64> {
        self.check_write(conn)?;
        let grammar = self.grammar();
        let sql = grammar.compile_insert_get_id(self, record, sequence.unwrap_or("id"));
        let bindings = insert_bindings(std::slice::from_ref(record));
        let id = if grammar.insert_get_id_returns_row() {
            conn.scalar(&sql, &bindings).await?.and_then(|v| v.as_i64())
        } else {
            conn.insert(&sql, &bindings).await?;
            conn.last_insert_id(sequence).await?
        };
        id.ok_or_else(|| DbError::Other(format!("insert into `{}` produced no id", self.table_name().unwrap_or_default())))
    }

    /// Insert rows, skipping those that violate a unique key. Returns rows inserted.
    pub async fn insert_or_ignore(&self, conn: &mut Connection, records: &[Record]) -> DbResult<u64> {
        if records.is_empty() {
            return Ok(0);
        }
        self.check_write(conn)?;
        let sql = self.grammar().compile_insert_or_ignore(self, records);
        conn.affecting_statement(&sql, &insert_bindings(records)).await
    }

    /// Insert rows or update the listed columns when `unique_by` already exists.
    ///
    /// `update` defaults to every inserted column outside `unique_by`.
    pub async fn upsert(
        &self,
        conn: &mut Connection,
        records: &[Record],
        unique_by: &[&str],
        update: Option<&[&str]>,
    ) -> DbResult<u64> {
        if records.is_empty() {
            return Ok(0);
        }
        self.check_write(conn)?;
        let unique_by: Vec<String> = unique_by.iter().map(|c| c.to_string()).collect();
        let update: Vec<String> = match update {
            Some(columns) => columns.iter().map(|c| c.to_string()).collect(),
            None => insert_columns(records)
                .into_iter()
                .filter(|c| !unique_by.contains(c))
                .collect(),
        };
        let sql = self.grammar().compile_upsert(self, records, &unique_by, &update);
        conn.affecting_statement(&sql, &insert_bindings(records)).await
    }

    /// Update matching rows. Returns rows affected.
    pub async fn update(&self, conn: &mut Connection, values: &Record) -> DbResult<u64> {
        self.check_write(conn)?;
        if values.is_empty() {
            return Err(DbError::validation("update needs at least one column"));
        }
        let grammar = self.grammar();
        grammar.validate_write(self).map_err(DbError::validation)?;
        let sql = grammar.compile_update(self, values);
        let bindings = grammar.prepare_bindings_for_update(self, values);
        conn.update(&sql, &bindings).await
    }

    /// `column = column + amount` on matching rows.
    pub async fn increment(&self, conn: &mut Connection, column: &str, amount: impl Into<Value>) -> DbResult<u64> {
        self.increment_with(conn, column, amount, Record::new()).await
    }

    /// [`increment`](Self::increment) that also sets `extra` columns.
    pub async fn increment_with(
        &self,
        conn: &mut Connection,
        column: &str,
        amount: impl Into<Value>,
        extra: Record,
    ) -> DbResult<u64> {
        self.adjust(conn, column, "+", amount.into(), extra).await
    }

    pub async fn decrement(&self, conn: &mut Connection, column: &str, amount: impl Into<Value>) -> DbResult<u64> {
        self.decrement_with(conn, column, amount, Record::new()).await
    }

    pub async fn decrement_with(
        &self,
        conn: &mut Connection,
        column: &str,
        amount: impl Into<Value>,
        extra: Record,
    ) -> DbResult<u64> {
        self.adjust(conn, column, "-", amount.into(), extra).await
    }

    async fn adjust(
        &self,
        conn: &mut Connection,
        column: &str,
        sign: &str,
        amount: Value,
        extra: Record,
    ) -> DbResult<u64> {
        if amount.as_f64().is_none() {
            return Err(DbError::validation(format!(
                "non-numeric value passed to {}",
                if sign == "+" { "increment" } else { "decrement" }
            )));
        }
        let wrapped = self.grammar().wrap(column);
        let mut values = Record::new().set(
            column,
            Expression::with_bindings(format!("{wrapped} {sign} ?"), vec![amount]),
        );
        for (c, v) in extra.iter() {
            values.insert(c, v.clone());
        }
        self.update(conn, &values).await
    }

    /// Delete matching rows. Returns rows affected.
    pub async fn delete(&self, conn: &mut Connection) -> DbResult<u64> {
        self.check_write(conn)?;
        let grammar = self.grammar();
        grammar.validate_write(self).map_err(DbError::validation)?;
        let sql = grammar.compile_delete(self);
        conn.delete(&sql, &grammar.prepare_bindings_for_delete(self)).await
    }

    /// Remove every row and reset the table's identity counter.
    pub async fn truncate(&self, conn: &mut Connection) -> DbResult<()> {
        self.check_write(conn)?;
        let grammar = self.grammar();
        for (sql, bindings) in grammar.compile_truncate(self) {
            conn.statement(&sql, &bindings).await?;
        }
        if let Some((check, reset, bindings)) = grammar.compile_truncate_sequence_reset(self) {
            let present = conn.scalar(&check, &[]).await?;
            if present.and_then(|v| v.as_bool()).unwrap_or(false) {
                conn.statement(&reset, &bindings).await?;
            }
        }
        Ok(())
    }
}

struct CursorState<'c> {
    conn: &'c mut Connection,
    query: Builder,
    batch: u64,
    page: u64,
    buffer: VecDeque<Row>,
    pending: Option<DbError>,
    done: bool,
}
