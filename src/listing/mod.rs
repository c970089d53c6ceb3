/// Listing engine
///
/// Composes filtered, sorted, paginated SELECTs over a declared table
/// expression. Sort columns come from a per-resource whitelist so user input
/// never reaches the SQL text; filter values are always bound.

pub mod stats;

pub use stats::{channel_stats, ChannelStats};

use crate::{config::ListingConfig, error::AppResult};
use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqliteRow, FromRow, QueryBuilder, Sqlite, SqlitePool};

/// Raw listing parameters as they arrive on the query string
///
/// Everything is kept as text so malformed numbers fall back to defaults
/// instead of rejecting the request.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    pub page: Option<String>,
    pub limit: Option<String>,
    pub page_size: Option<String>,
    pub sort_by: Option<String>,
    pub sort_type: Option<String>,
    pub query: Option<String>,
    pub user_id: Option<String>,
}

impl ListQuery {
    pub fn pagination(&self, config: &ListingConfig) -> Pagination {
        Pagination::parse(
            self.page.as_deref(),
            self.limit.as_deref().or(self.page_size.as_deref()),
            config,
        )
    }

    /// Trimmed, non-empty search text
    pub fn search_text(&self) -> Option<&str> {
        self.query.as_deref().map(str::trim).filter(|q| !q.is_empty())
    }
}

/// 1-indexed page window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: u32,
    pub page_size: u32,
}

fn positive(raw: Option<&str>) -> Option<u32> {
    raw.and_then(|s| s.trim().parse::<u32>().ok()).filter(|n| *n > 0)
}

impl Pagination {
    /// Parse page and page size, falling back to page 1 and the configured
    /// default size on anything non-numeric or non-positive
    pub fn parse(page: Option<&str>, page_size: Option<&str>, config: &ListingConfig) -> Self {
        let page = positive(page).unwrap_or(1);
        let page_size = positive(page_size)
            .unwrap_or(config.default_page_size)
            .min(config.max_page_size.max(1));

        Self { page, page_size }
    }

    pub fn offset(&self) -> i64 {
        (i64::from(self.page) - 1) * i64::from(self.page_size)
    }

    pub fn limit(&self) -> i64 {
        i64::from(self.page_size)
    }

    /// ceil(total / page_size)
    pub fn total_pages(&self, total_count: i64) -> i64 {
        let size = i64::from(self.page_size);
        (total_count + size - 1) / size
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: 10,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    fn as_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

/// Resolved sort: a whitelisted column and a direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sort {
    pub column: &'static str,
    pub direction: SortDirection,
}

impl Sort {
    /// Map client `sortBy`/`sortType` onto `fields` (client name, column)
    ///
    /// An unknown field yields `default`. Direction defaults to descending.
    pub fn resolve(
        sort_by: Option<&str>,
        sort_type: Option<&str>,
        fields: &[(&str, &'static str)],
        default: Sort,
    ) -> Self {
        let Some(column) = sort_by.and_then(|name| {
            fields
                .iter()
                .find(|(field, _)| field.eq_ignore_ascii_case(name.trim()))
                .map(|(_, column)| *column)
        }) else {
            return default;
        };

        let direction = match sort_type.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
            Some("asc") => SortDirection::Asc,
            _ => SortDirection::Desc,
        };

        Sort { column, direction }
    }

    pub fn desc(column: &'static str) -> Self {
        Sort {
            column,
            direction: SortDirection::Desc,
        }
    }
}

/// A predicate over the listing's table expression
#[derive(Debug, Clone)]
pub enum Filter {
    /// Exact match on a column
    Equals { column: &'static str, value: String },
    /// Case-insensitive substring match against any of the columns
    Contains {
        columns: &'static [&'static str],
        needle: String,
    },
    /// Boolean column must be true unless `bypass_column` equals the value
    IsTrue {
        column: &'static str,
        bypass: Option<(&'static str, String)>,
    },
}

/// Escape LIKE wildcards so the needle matches literally
fn like_pattern(needle: &str) -> String {
    let mut escaped = String::with_capacity(needle.len() + 2);
    escaped.push('%');
    for ch in needle.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped.push('%');
    escaped
}

/// Declarative description of one list endpoint
#[derive(Debug, Clone)]
pub struct ListingSpec {
    /// Column list, may reference joined tables
    pub select: &'static str,
    /// Table expression including joins
    pub from: &'static str,
    /// Unique column appended to ORDER BY for a stable order
    pub tiebreak: &'static str,
    pub filters: Vec<Filter>,
    pub sort: Sort,
}

impl ListingSpec {
    fn push_where<'a>(&'a self, builder: &mut QueryBuilder<'a, Sqlite>) {
        for (i, filter) in self.filters.iter().enumerate() {
            builder.push(if i == 0 { " WHERE " } else { " AND " });
            match filter {
                Filter::Equals { column, value } => {
                    builder.push(*column).push(" = ").push_bind(value.as_str());
                }
                Filter::Contains { columns, needle } => {
                    let pattern = like_pattern(needle);
                    builder.push("(");
                    for (j, column) in columns.iter().enumerate() {
                        if j > 0 {
                            builder.push(" OR ");
                        }
                        builder
                            .push(*column)
                            .push(" LIKE ")
                            .push_bind(pattern.clone())
                            .push(" ESCAPE '\\'");
                    }
                    builder.push(")");
                }
                Filter::IsTrue { column, bypass } => {
                    builder.push("(").push(*column).push(" = 1");
                    if let Some((bypass_column, value)) = bypass {
                        builder
                            .push(" OR ")
                            .push(*bypass_column)
                            .push(" = ")
                            .push_bind(value.as_str());
                    }
                    builder.push(")");
                }
            }
        }
    }
}

/// One page of results plus the arithmetic clients need to walk the rest
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub page_size: u32,
    pub total_count: i64,
    pub total_pages: i64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, pagination: Pagination, total_count: i64) -> Self {
        Self {
            items,
            page: pagination.page,
            page_size: pagination.page_size,
            total_count,
            total_pages: pagination.total_pages(total_count),
        }
    }
}

/// Run a listing: one COUNT over the filtered set, one windowed SELECT
pub async fn list<T>(db: &SqlitePool, spec: &ListingSpec, pagination: Pagination) -> AppResult<Page<T>>
where
    T: for<'r> FromRow<'r, SqliteRow> + Send + Unpin,
{
    let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM ");
    count.push(spec.from);
    spec.push_where(&mut count);
    let total_count: i64 = count.build_query_scalar().fetch_one(db).await?;

    let mut select = QueryBuilder::<Sqlite>::new("SELECT ");
    select.push(spec.select).push(" FROM ").push(spec.from);
    spec.push_where(&mut select);
    select
        .push(" ORDER BY ")
        .push(spec.sort.column)
        .push(" ")
        .push(spec.sort.direction.as_sql())
        .push(", ")
        .push(spec.tiebreak)
        .push(" ")
        .push(spec.sort.direction.as_sql())
        .push(" LIMIT ")
        .push_bind(pagination.limit())
        .push(" OFFSET ")
        .push_bind(pagination.offset());

    let items = select.build_query_as::<T>().fetch_all(db).await?;

    Ok(Page::new(items, pagination, total_count))
}
