//! Dynamic list queries: filters, search, whitelisted sorting and paging.

use anyhow::Context;
use helpdesk_common::{Page, PageRequest};
use rusqlite::types::Value;
use rusqlite::{Row, params_from_iter};
use serde::Deserialize;

use super::DeskDb;
use crate::errors::{DeskError, DeskResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    fn as_sql(&self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// A resolved `ORDER BY` clause. Only ever built from a whitelist.
#[derive(Debug, Clone, Copy)]
pub struct Sort {
    column: &'static str,
    order: SortOrder,
}

impl Sort {
    /// Map the API-facing `sort_by` name onto its SQL column.
    ///
    /// `allowed` pairs API names with SQL expressions; its first entry is
    /// the default column.
    pub fn resolve(
        requested: Option<&str>,
        order: Option<SortOrder>,
        allowed: &[(&'static str, &'static str)],
    ) -> DeskResult<Self> {
        let column = match requested {
            None => allowed[0].1,
            Some(name) => allowed
                .iter()
                .find(|(api, _)| *api == name)
                .map(|(_, sql)| *sql)
                .ok_or_else(|| {
                    let names: Vec<&str> = allowed.iter().map(|(api, _)| *api).collect();
                    DeskError::invalid_field(
                        "sort_by",
                        format!("The sort_by field must be one of: {}", names.join(", ")),
                    )
                })?,
        };
        Ok(Self {
            column,
            order: order.unwrap_or_default(),
        })
    }

    fn as_sql(&self) -> String {
        format!("{} {}", self.column, self.order.as_sql())
    }
}

/// Accumulates `WHERE` clauses and their positional parameters.
#[derive(Debug, Default)]
pub struct ListFilter {
    clauses: Vec<String>,
    values: Vec<Value>,
}

impl ListFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq_int(&mut self, column: &str, value: Option<i64>) -> &mut Self {
        if let Some(v) = value {
            self.clauses.push(format!("{} = ?", column));
            self.values.push(Value::Integer(v));
        }
        self
    }

    pub fn eq_bool(&mut self, column: &str, value: Option<bool>) -> &mut Self {
        self.eq_int(column, value.map(i64::from))
    }

    pub fn eq_text(&mut self, column: &str, value: Option<&str>) -> &mut Self {
        if let Some(v) = value {
            self.clauses.push(format!("{} = ?", column));
            self.values.push(Value::Text(v.to_string()));
        }
        self
    }

    /// Case-insensitive substring match on any of `columns`.
    pub fn search(&mut self, columns: &[&str], term: Option<&str>) -> &mut Self {
        let term = match term.map(str::trim) {
            Some(t) if !t.is_empty() => t,
            _ => return self,
        };
        let pattern = format!("%{}%", escape_like(term));
        let ors: Vec<String> = columns
            .iter()
            .map(|c| format!("{} LIKE ? ESCAPE '\\'", c))
            .collect();
        self.clauses.push(format!("({})", ors.join(" OR ")));
        for _ in columns {
            self.values.push(Value::Text(pattern.clone()));
        }
        self
    }

    /// A raw clause with a single `?` placeholder, e.g. an `EXISTS` subquery.
    pub fn clause_int(&mut self, clause: &str, value: Option<i64>) -> &mut Self {
        if let Some(v) = value {
            self.clauses.push(clause.to_string());
            self.values.push(Value::Integer(v));
        }
        self
    }

    fn where_sql(&self) -> String {
        if self.clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.clauses.join(" AND "))
        }
    }
}

/// The `search` + `is_archived` pair accepted by every archivable listing.
#[derive(Debug, Clone, Default)]
pub struct ArchiveFilter {
    pub search: Option<String>,
    pub is_archived: bool,
}

impl ArchiveFilter {
    pub(crate) fn to_list_filter(&self, search_columns: &[&str]) -> ListFilter {
        let mut filter = ListFilter::new();
        filter
            .search(search_columns, self.search.as_deref())
            .eq_bool("is_archived", Some(self.is_archived));
        filter
    }
}

/// Escape `%`, `_` and the escape character itself for `LIKE ... ESCAPE '\'`.
fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

impl DeskDb {
    /// Run a paginated `SELECT {columns} FROM {from}` with the given filter.
    pub(crate) fn fetch_page<T, F>(
        &self,
        from: &str,
        columns: &str,
        filter: &ListFilter,
        sort: Sort,
        request: PageRequest,
        map_row: F,
    ) -> DeskResult<Page<T>>
    where
        F: FnMut(&Row<'_>) -> rusqlite::Result<T>,
    {
        let where_sql = filter.where_sql();

        let total: i64 = self
            .conn
            .query_row(
                &format!("SELECT COUNT(*) FROM {}{}", from, where_sql),
                params_from_iter(filter.values.iter()),
                |row| row.get(0),
            )
            .context("Failed to count rows")?;

        let sql = format!(
            "SELECT {} FROM {}{} ORDER BY {} LIMIT ? OFFSET ?",
            columns,
            from,
            where_sql,
            sort.as_sql()
        );
        let mut values = filter.values.clone();
        values.push(Value::Integer(request.per_page));
        values.push(Value::Integer(request.offset()));

        let mut stmt = self.conn.prepare(&sql).context("Failed to prepare list query")?;
        let rows = stmt
            .query_map(params_from_iter(values.iter()), map_row)
            .context("Failed to run list query")?;
        let mut items = Vec::new();
        for row in rows {
            items.push(row.context("Failed to read row")?);
        }
        Ok(Page::new(items, request, total))
    }
}
