//! Typed row queries against `/rest/v1/<table>`.

use super::{SupabaseError, SupabaseService};
use crate::models::Table;
use reqwest::{Method, RequestBuilder, Response};
use serde::Deserialize;
use serde::Serialize;
use std::marker::PhantomData;

#[derive(Debug, Default, Deserialize)]
struct PostgrestErrorBody {
    code: Option<String>,
    message: Option<String>,
    details: Option<String>,
}

/// A filterable query on the table mapped by `T`
pub struct QueryBuilder<T: Table> {
    service: SupabaseService,
    filters: Vec<(String, String)>,
    order: Vec<String>,
    limit: Option<usize>,
    _row: PhantomData<fn() -> T>,
}

impl<T: Table> QueryBuilder<T> {
    pub(super) fn new(service: SupabaseService) -> Self {
        QueryBuilder {
            service,
            filters: Vec::new(),
            order: Vec::new(),
            limit: None,
            _row: PhantomData,
        }
    }

    /// `column = value`
    pub fn eq(mut self, column: &str, value: impl ToString) -> Self {
        self.filters
            .push((column.to_string(), format!("eq.{}", value.to_string())));
        self
    }

    /// `column <> value`
    pub fn neq(mut self, column: &str, value: impl ToString) -> Self {
        self.filters
            .push((column.to_string(), format!("neq.{}", value.to_string())));
        self
    }

    /// `column IN (values)`
    pub fn is_in<I, V>(mut self, column: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: ToString,
    {
        let joined = values
            .into_iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join(",");
        self.filters
            .push((column.to_string(), format!("in.({joined})")));
        self
    }

    pub fn order(mut self, column: &str, ascending: bool) -> Self {
        let direction = if ascending { "asc" } else { "desc" };
        self.order.push(format!("{column}.{direction}"));
        self
    }

    pub fn limit(mut self, count: usize) -> Self {
        self.limit = Some(count);
        self
    }

    pub async fn get(self) -> Result<Vec<T>, SupabaseError> {
        let mut request = self.request(Method::GET)?.query(&[("select", "*")]);
        if !self.order.is_empty() {
            request = request.query(&[("order", self.order.join(","))]);
        }
        if let Some(limit) = self.limit {
            request = request.query(&[("limit", limit.to_string())]);
        }
        decode(request.send().await?).await
    }

    /// First matching row, if any
    pub async fn first(self) -> Result<Option<T>, SupabaseError> {
        Ok(self.limit(1).get().await?.into_iter().next())
    }

    /// Inserts `row` and returns the stored representation
    pub async fn insert(self, row: &T) -> Result<T, SupabaseError> {
        let request = self
            .request(Method::POST)?
            .header("Prefer", "return=representation")
            .json(row);
        let rows: Vec<T> = decode(request.send().await?).await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| SupabaseError::Decode(format!("insert into {} returned no row", T::NAME)))
    }

    /// Patches every row matching the filters with `patch`
    pub async fn update<P: Serialize + ?Sized>(self, patch: &P) -> Result<Vec<T>, SupabaseError> {
        self.require_filters("update")?;
        let request = self
            .request(Method::PATCH)?
            .header("Prefer", "return=representation")
            .json(patch);
        decode(request.send().await?).await
    }

    /// Writes every column of `row`, addressed by its primary key
    pub async fn update_row(self, row: &T) -> Result<T, SupabaseError> {
        let mut query = self;
        for (column, value) in row.primary_key() {
            query = query.eq(column, value);
        }
        query.update(row).await?.into_iter().next().ok_or_else(|| {
            SupabaseError::Postgrest {
                table: T::NAME,
                status: 404,
                code: None,
                message: "row to update was not found".to_string(),
            }
        })
    }

    pub async fn delete(self) -> Result<(), SupabaseError> {
        self.require_filters("delete")?;
        let response = self.request(Method::DELETE)?.send().await?;
        ensure_success::<T>(response).await.map(|_| ())
    }

    pub async fn delete_row(self, row: &T) -> Result<(), SupabaseError> {
        let mut query = self;
        for (column, value) in row.primary_key() {
            query = query.eq(column, value);
        }
        query.delete().await
    }

    fn require_filters(&self, operation: &'static str) -> Result<(), SupabaseError> {
        if self.filters.is_empty() {
            return Err(SupabaseError::Unfiltered {
                table: T::NAME,
                operation,
            });
        }
        Ok(())
    }

    fn request(&self, method: Method) -> Result<RequestBuilder, SupabaseError> {
        let url = self.service.endpoint(&format!("rest/v1/{}", T::NAME))?;
        Ok(self
            .service
            .http()
            .request(method, url)
            .bearer_auth(self.service.bearer())
            .query(&self.filters))
    }
}

async fn decode<T: Table>(response: Response) -> Result<Vec<T>, SupabaseError> {
    let response = ensure_success::<T>(response).await?;
    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes)
        .map_err(|e| SupabaseError::Decode(format!("{} rows: {e}", T::NAME)))
}

async fn ensure_success<T: Table>(response: Response) -> Result<Response, SupabaseError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body: PostgrestErrorBody = response.json().await.unwrap_or_default();
    let message = match (body.message, body.details) {
        (Some(message), Some(details)) => format!("{message} ({details})"),
        (Some(message), None) => message,
        (None, Some(details)) => details,
        (None, None) => status.to_string(),
    };
    Err(SupabaseError::Postgrest {
        table: T::NAME,
        status: status.as_u16(),
        code: body.code,
        message,
    })
}
