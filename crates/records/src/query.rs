//! Builder for PostgREST query strings.
//!
//! PostgREST encodes every clause as a query parameter: projections as
//! `select=`, filters as `column=op.value`, ordering as `order=column.dir`.
//! The builder keeps them in insertion order so requests are reproducible.

use serde_json::Value;

use crate::backend::Filter;

/// Builder for PostgREST query parameters.
///
/// # Example
/// ```ignore
/// let mut qb = QueryBuilder::new();
/// qb.select("*").eq("user_id", &json!(3)).order_by("id", true);
/// let params = qb.build();
/// ```
#[derive(Debug, Default, Clone)]
pub struct QueryBuilder {
    params: Vec<(String, String)>,
}

impl QueryBuilder {
    pub fn new() -> Self {
        Self { params: Vec::new() }
    }

    /// Sets the projection (`select=*`).
    pub fn select(&mut self, columns: &str) -> &mut Self {
        self.params.push(("select".into(), columns.into()));
        self
    }

    /// Adds an equality filter (`field=eq.value`).
    pub fn eq(&mut self, field: &str, value: &Value) -> &mut Self {
        self.params
            .push((field.into(), format!("eq.{}", filter_literal(value))));
        self
    }

    /// Adds an inequality filter (`field=neq.value`).
    pub fn neq(&mut self, field: &str, value: &Value) -> &mut Self {
        self.params
            .push((field.into(), format!("neq.{}", filter_literal(value))));
        self
    }

    /// Adds the filter if present.
    pub fn filter(&mut self, filter: Option<&Filter>) -> &mut Self {
        if let Some(f) = filter {
            self.eq(&f.field, &f.value);
        }
        self
    }

    pub fn order_by(&mut self, field: &str, ascending: bool) -> &mut Self {
        let dir = if ascending { "asc" } else { "desc" };
        self.params.push(("order".into(), format!("{field}.{dir}")));
        self
    }

    /// Returns the number of parameters added.
    pub fn param_count(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Parameters in insertion order, ready for `RequestBuilder::query`.
    pub fn build(&self) -> Vec<(String, String)> {
        self.params.clone()
    }

    /// Unencoded `a=b&c=d` form, used in logs.
    pub fn to_query_string(&self) -> String {
        self.params
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("&")
    }
}

/// Strings go in bare; numbers, booleans and null use their JSON spelling.
fn filter_literal(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
