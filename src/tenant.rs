use axum::http::{header::HOST, HeaderMap, Uri};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::db::DbPool;
use crate::entities::{self, store, StoreModel};
use crate::errors::ServiceError;

/// Header carrying an explicit store hint, sent by storefront clients.
pub const STORE_NAME_HEADER: &str = "x-store-name";

/// Maps an inbound request to the store (tenant) it addresses.
///
/// Resolution order: explicit `X-Store-Name` header, then `store_name`
/// query parameter, then the Host header (custom domain lookup, falling
/// back to the subdomain label), then the first path segment. The result
/// feeds the customer-cookie namespace, so every storefront request goes
/// through here before any identity check.
#[derive(Clone)]
pub struct TenantResolver {
    db: Arc<DbPool>,
}

impl TenantResolver {
    pub fn new(db: Arc<DbPool>) -> Self {
        Self { db }
    }

    /// Resolves the store a request addresses, or `None` for
    /// platform-level requests that carry no tenant hint.
    #[instrument(skip(self, headers, uri))]
    pub async fn try_resolve(
        &self,
        headers: &HeaderMap,
        uri: &Uri,
    ) -> Result<Option<StoreModel>, ServiceError> {
        if let Some(name) = headers
            .get(STORE_NAME_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(store_name_from_header)
        {
            debug!(store_name = %name, "Resolved tenant from header");
            return self.find_by_name(&name).await.map(Some);
        }

        if let Some(name) = uri.query().and_then(store_name_from_query) {
            debug!(store_name = %name, "Resolved tenant from query");
            return self.find_by_name(&name).await.map(Some);
        }

        if let Some(host) = headers.get(HOST).and_then(|v| v.to_str().ok()) {
            let host = host.split(':').next().unwrap_or(host);
            if let Some(store) = self.find_by_custom_domain(host).await? {
                debug!(store_name = %store.name, "Resolved tenant from custom domain");
                return Ok(Some(store));
            }
            if let Some(name) = store_name_from_host(host) {
                debug!(store_name = %name, "Resolved tenant from subdomain");
                return self.find_by_name(&name).await.map(Some);
            }
        }

        if let Some(name) = store_name_from_path(uri.path()) {
            debug!(store_name = %name, "Resolved tenant from path");
            return self.find_by_name(&name).await.map(Some);
        }

        Ok(None)
    }

    /// Resolves the store a request addresses, failing when no tenant
    /// hint is present. Used on all customer-facing routes.
    pub async fn resolve(&self, headers: &HeaderMap, uri: &Uri) -> Result<StoreModel, ServiceError> {
        self.try_resolve(headers, uri)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Store not found".to_string()))
    }

    async fn find_by_name(&self, name: &str) -> Result<StoreModel, ServiceError> {
        entities::Store::find()
            .filter(store::Column::Name.eq(name))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Store '{}' not found", name)))
    }

    async fn find_by_custom_domain(&self, host: &str) -> Result<Option<StoreModel>, ServiceError> {
        Ok(entities::Store::find()
            .filter(store::Column::CustomDomain.eq(host))
            .one(&*self.db)
            .await?)
    }
}

/// Extracts a store name from the `X-Store-Name` header value, which may
/// be a full URL, a path, or a bare name, possibly with a TLD suffix.
pub fn store_name_from_header(value: &str) -> Option<String> {
    let mut value = value.trim();

    // Full URLs keep only the path part.
    if let Some((_, rest)) = value.split_once("://") {
        value = match rest.find('/') {
            Some(idx) => &rest[idx..],
            None => "",
        };
    }

    let first = value.trim_matches('/').split('/').next()?;
    normalize_segment(first)
}

/// Extracts a `store_name` hint from a raw query string.
pub fn store_name_from_query(query: &str) -> Option<String> {
    query.split('&').find_map(|pair| {
        let (key, value) = pair.split_once('=')?;
        if key == "store_name" && !value.is_empty() {
            Some(value.to_string())
        } else {
            None
        }
    })
}

/// Treats the first host label as the store name for subdomain-style
/// access. Loopback and single-label hosts carry no tenant.
pub fn store_name_from_host(host: &str) -> Option<String> {
    if !host.contains('.')
        || host.starts_with("localhost")
        || host.starts_with("127.0.0.1")
        || host.starts_with("0.0.0.0")
    {
        return None;
    }
    let label = host.split('.').next()?;
    if label.is_empty() || label == "www" {
        return None;
    }
    Some(label.to_string())
}

/// Falls back to the first path segment as the store name.
pub fn store_name_from_path(path: &str) -> Option<String> {
    let first = path.trim_matches('/').split('/').next()?;
    if first == "api" {
        return None;
    }
    normalize_segment(first)
}

/// Strips a trailing TLD-style suffix (`LUXURY.com` -> `LUXURY`).
fn normalize_segment(segment: &str) -> Option<String> {
    let name = segment.split('.').next()?;
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}
