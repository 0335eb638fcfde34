//! Query text, parameters and sort keys.

use serde::Serialize;
use serde_json::Value;

/// The query every listing runs.
pub const SELECT_ALL: &str = "SELECT * FROM root r";

/// A bound query parameter, e.g. `@city`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryParameter {
    /// Parameter name including the leading `@`.
    pub name: String,
    /// Bound value.
    pub value: Value,
}

/// One sort key of an ordered query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    path: Vec<String>,
    descending: bool,
}

impl OrderBy {
    /// Creates a sort key over a dot-separated property path relative to
    /// the item, e.g. `address.city`.
    #[must_use]
    pub fn new(path: &str, descending: bool) -> Self {
        Self {
            path: path
                .split('.')
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
            descending,
        }
    }

    /// Returns the property path segments.
    #[must_use]
    pub fn path(&self) -> &[String] {
        &self.path
    }

    /// Returns `true` for a descending key.
    #[must_use]
    pub const fn is_descending(&self) -> bool {
        self.descending
    }

    /// Reads this key from an item. `None` means the property is undefined.
    #[must_use]
    pub fn extract<'a>(&self, item: &'a Value) -> Option<&'a Value> {
        self.path
            .iter()
            .try_fold(item, |current, segment| current.get(segment))
    }

    /// Parses one `ORDER BY` term such as `c.address.city DESC`.
    fn parse_term(term: &str) -> Option<Self> {
        let mut tokens = term.split_whitespace();
        let expression = tokens.next()?;
        let descending = match tokens.next() {
            None => false,
            Some(direction) if direction.eq_ignore_ascii_case("ASC") => false,
            Some(direction) if direction.eq_ignore_ascii_case("DESC") => true,
            Some(_) => return None,
        };
        let normalized = expression.replace("[\"", ".").replace("\"]", "");
        let identifier = |s: &str| s.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '$');
        if !normalized.split('.').all(identifier) {
            return None;
        }
        let mut segments = normalized.split('.').filter(|s| !s.is_empty());
        // The first segment is the FROM alias.
        segments.next()?;
        let path: Vec<String> = segments.map(str::to_string).collect();
        if path.is_empty() {
            return None;
        }
        Some(Self { path, descending })
    }
}

/// A SQL query with optional parameters.
///
/// Ordered queries are recognized from their trailing `ORDER BY` clause;
/// the rest of the text is passed to the service untouched.
///
/// # Example
///
/// ```rust
/// use cosmosdb::query::Query;
/// use serde_json::json;
///
/// let query = Query::new("SELECT * FROM c WHERE c.city = @city ORDER BY c.ts DESC")
///     .with_parameter("@city", json!("Oslo"));
///
/// let keys = query.order_by_keys();
/// assert_eq!(keys.len(), 1);
/// assert_eq!(keys[0].path(), ["ts"]);
/// assert!(keys[0].is_descending());
///
/// assert_eq!(
///     query.to_body(),
///     json!({
///         "query": "SELECT * FROM c WHERE c.city = @city ORDER BY c.ts DESC",
///         "parameters": [{"name": "@city", "value": "Oslo"}]
///     })
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Query {
    query: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    parameters: Vec<QueryParameter>,
    #[serde(skip)]
    order_by: Option<Vec<OrderBy>>,
}

impl Query {
    /// Creates a query from SQL text.
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            query: text.into(),
            parameters: Vec::new(),
            order_by: None,
        }
    }

    /// The implicit query of a listing.
    #[must_use]
    pub fn select_all() -> Self {
        Self::new(SELECT_ALL)
    }

    /// Binds a parameter.
    #[must_use]
    pub fn with_parameter(mut self, name: impl Into<String>, value: Value) -> Self {
        self.parameters.push(QueryParameter {
            name: name.into(),
            value,
        });
        self
    }

    /// Declares a sort key explicitly, overriding detection from the text.
    ///
    /// `path` is relative to the item, e.g. `ts` or `address.city`.
    #[must_use]
    pub fn order_by(mut self, path: &str, descending: bool) -> Self {
        self.order_by
            .get_or_insert_with(Vec::new)
            .push(OrderBy::new(path, descending));
        self
    }

    /// Returns the SQL text.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.query
    }

    /// Returns the bound parameters.
    #[must_use]
    pub fn parameters(&self) -> &[QueryParameter] {
        &self.parameters
    }

    /// Returns the sort keys, explicit or detected. Empty for unordered
    /// queries.
    #[must_use]
    pub fn order_by_keys(&self) -> Vec<OrderBy> {
        self.order_by
            .clone()
            .unwrap_or_else(|| detect_order_by(&self.query))
    }

    /// Returns the JSON body the service expects.
    #[must_use]
    pub fn to_body(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

impl From<&str> for Query {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

impl From<String> for Query {
    fn from(text: String) -> Self {
        Self::new(text)
    }
}

/// Reads the sort keys of the last `ORDER BY` clause of `text`.
///
/// Only the trailing clause is inspected; a trailing `OFFSET`/`LIMIT` is
/// ignored. Terms that are not plain property paths yield no keys.
fn detect_order_by(text: &str) -> Vec<OrderBy> {
    let tokens: Vec<&str> = text.split_whitespace().collect();
    let Some(start) = tokens.windows(2).rposition(|pair| {
        pair[0].eq_ignore_ascii_case("ORDER") && pair[1].eq_ignore_ascii_case("BY")
    }) else {
        return Vec::new();
    };
    let clause: Vec<&str> = tokens[start + 2..]
        .iter()
        .take_while(|token| {
            !token.eq_ignore_ascii_case("OFFSET") && !token.eq_ignore_ascii_case("LIMIT")
        })
        .copied()
        .collect();
    clause
        .join(" ")
        .split(',')
        .map(OrderBy::parse_term)
        .collect::<Option<Vec<_>>>()
        .unwrap_or_default()
}
