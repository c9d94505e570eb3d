//! Product catalog client.
//!
//! Read-only pass-through over the catalog endpoints with an in-memory
//! `moka` cache (5-minute TTL). Search queries bypass the cache; browse
//! pages, product detail, and the featured list are cached by key.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use copperleaf_core::{Money, Pagination, Product, ProductId};

use crate::error::ApiError;
use crate::http::RequestPipeline;

const CACHE_CAPACITY: u64 = 1000;
const CACHE_TTL: Duration = Duration::from_secs(300);

// =============================================================================
// Query types
// =============================================================================

/// Sort orders accepted by the product listing endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductSort {
    PriceAsc,
    PriceDesc,
    Rating,
    #[default]
    Newest,
    Oldest,
    NameAsc,
    NameDesc,
}

impl ProductSort {
    const fn as_str(self) -> &'static str {
        match self {
            Self::PriceAsc => "price_asc",
            Self::PriceDesc => "price_desc",
            Self::Rating => "rating",
            Self::Newest => "newest",
            Self::Oldest => "oldest",
            Self::NameAsc => "name_asc",
            Self::NameDesc => "name_desc",
        }
    }
}

/// Listing filters; unset fields are omitted from the query string.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductFilters {
    pub search: Option<String>,
    pub category: Option<String>,
    pub brand: Option<String>,
    pub min_price: Option<Money>,
    pub max_price: Option<Money>,
    pub min_rating: Option<u8>,
    pub in_stock: Option<bool>,
    pub sort: ProductSort,
    pub page: u32,
    pub limit: u32,
}

impl Default for ProductFilters {
    fn default() -> Self {
        Self {
            search: None,
            category: None,
            brand: None,
            min_price: None,
            max_price: None,
            min_rating: None,
            in_stock: None,
            sort: ProductSort::Newest,
            page: 1,
            limit: 12,
        }
    }
}

impl ProductFilters {
    /// Filters for a single search term with default paging.
    #[must_use]
    pub fn search(term: impl Into<String>) -> Self {
        Self {
            search: Some(term.into()),
            ..Self::default()
        }
    }

    /// Filters scoped to one category with default paging.
    #[must_use]
    pub fn category(name: impl Into<String>) -> Self {
        Self {
            category: Some(name.into()),
            ..Self::default()
        }
    }

    fn query_string(&self) -> String {
        let mut query = url::form_urlencoded::Serializer::new(String::new());
        if let Some(search) = &self.search {
            query.append_pair("search", search);
        }
        if let Some(category) = &self.category {
            query.append_pair("category", category);
        }
        if let Some(brand) = &self.brand {
            query.append_pair("brand", brand);
        }
        if let Some(min) = self.min_price {
            query.append_pair("minPrice", &min.to_string());
        }
        if let Some(max) = self.max_price {
            query.append_pair("maxPrice", &max.to_string());
        }
        if let Some(rating) = self.min_rating {
            query.append_pair("minRating", &rating.to_string());
        }
        if let Some(in_stock) = self.in_stock {
            query.append_pair("inStock", if in_stock { "true" } else { "false" });
        }
        query.append_pair("sort", self.sort.as_str());
        query.append_pair("page", &self.page.to_string());
        query.append_pair("limit", &self.limit.to_string());
        query.finish()
    }
}

// =============================================================================
// Response types
// =============================================================================

/// Facet values the service derives from the active listing.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq, Default)]
pub struct FacetSet {
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub brands: Vec<String>,
}

/// One page of the product listing.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ProductPage {
    pub products: Vec<Product>,
    pub pagination: Pagination,
    #[serde(default)]
    pub filters: FacetSet,
}

/// A product with its related recommendations.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProductDetail {
    pub product: Product,
    #[serde(default)]
    pub related_products: Vec<Product>,
}

#[derive(Debug, Deserialize)]
struct CategoryEntry {
    #[serde(rename = "_id")]
    name: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ReviewBody<'a> {
    rating: u8,
    comment: &'a str,
}

// =============================================================================
// Client
// =============================================================================

#[derive(Debug, Clone)]
enum CacheValue {
    Page(Box<ProductPage>),
    Detail(Box<ProductDetail>),
    Featured(Vec<Product>),
}

/// Catalog client.
///
/// Cheap to clone; clones share the cache.
#[derive(Clone)]
pub struct CatalogClient {
    inner: Arc<CatalogInner>,
}

struct CatalogInner {
    pipeline: RequestPipeline,
    cache: Cache<String, CacheValue>,
}

impl CatalogClient {
    /// Create a catalog client over the shared pipeline.
    #[must_use]
    pub fn new(pipeline: RequestPipeline) -> Self {
        let cache = Cache::builder()
            .max_capacity(CACHE_CAPACITY)
            .time_to_live(CACHE_TTL)
            .build();
        Self {
            inner: Arc::new(CatalogInner { pipeline, cache }),
        }
    }

    /// Fetch one listing page. Search results are never cached.
    ///
    /// # Errors
    ///
    /// Returns the classified request error.
    #[instrument(skip(self))]
    pub async fn list_products(&self, filters: &ProductFilters) -> Result<ProductPage, ApiError> {
        let cacheable = filters.search.is_none();
        let cache_key = format!("products:{filters:?}");

        if cacheable
            && let Some(CacheValue::Page(page)) = self.inner.cache.get(&cache_key).await
        {
            debug!("cache hit for product listing");
            return Ok(*page);
        }

        let path = format!("/products?{}", filters.query_string());
        let page = self.inner.pipeline.get::<ProductPage>(&path).await?;

        if cacheable {
            self.inner
                .cache
                .insert(cache_key, CacheValue::Page(Box::new(page.clone())))
                .await;
        }
        Ok(page)
    }

    /// Fetch a product and its related recommendations.
    ///
    /// # Errors
    ///
    /// Returns the classified request error; an unknown ID maps to
    /// [`ApiError::NotFound`].
    #[instrument(skip(self), fields(product = %id))]
    pub async fn get_product(&self, id: &ProductId) -> Result<ProductDetail, ApiError> {
        let cache_key = format!("product:{id}");

        if let Some(CacheValue::Detail(detail)) = self.inner.cache.get(&cache_key).await {
            debug!("cache hit for product detail");
            return Ok(*detail);
        }

        let detail = self
            .inner
            .pipeline
            .get::<ProductDetail>(&format!("/products/{id}"))
            .await?;
        self.inner
            .cache
            .insert(cache_key, CacheValue::Detail(Box::new(detail.clone())))
            .await;
        Ok(detail)
    }

    /// Fetch the featured product list.
    ///
    /// # Errors
    ///
    /// Returns the classified request error.
    #[instrument(skip(self))]
    pub async fn featured_products(&self) -> Result<Vec<Product>, ApiError> {
        let cache_key = "products:featured".to_string();

        if let Some(CacheValue::Featured(products)) = self.inner.cache.get(&cache_key).await {
            debug!("cache hit for featured products");
            return Ok(products);
        }

        let products = self
            .inner
            .pipeline
            .get::<Vec<Product>>("/products/featured")
            .await?;
        self.inner
            .cache
            .insert(cache_key, CacheValue::Featured(products.clone()))
            .await;
        Ok(products)
    }

    /// Fetch the known category names.
    ///
    /// # Errors
    ///
    /// Returns the classified request error.
    #[instrument(skip(self))]
    pub async fn categories(&self) -> Result<Vec<String>, ApiError> {
        let entries = self
            .inner
            .pipeline
            .get::<Vec<CategoryEntry>>("/products/categories/list")
            .await?;
        Ok(entries.into_iter().map(|entry| entry.name).collect())
    }

    /// Submit a review for a product, then drop its cached detail so the
    /// next fetch shows the new review.
    ///
    /// # Errors
    ///
    /// Returns the classified request error; a 400 carries the service's
    /// validation message.
    #[instrument(skip(self, comment), fields(product = %id))]
    pub async fn add_review(
        &self,
        id: &ProductId,
        rating: u8,
        comment: &str,
    ) -> Result<(), ApiError> {
        let body = ReviewBody { rating, comment };
        self.inner
            .pipeline
            .post::<serde_json::Value, _>(&format!("/products/{id}/reviews"), &body)
            .await?;
        self.inner.cache.invalidate(&format!("product:{id}")).await;
        Ok(())
    }
}

impl std::fmt::Debug for CatalogClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatalogClient").finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_query_string_omits_unset_filters() {
        let query = ProductFilters::default().query_string();
        assert_eq!(query, "sort=newest&page=1&limit=12");
    }

    #[test]
    fn test_query_string_encodes_search_terms() {
        let query = ProductFilters::search("coffee mug").query_string();
        assert!(query.starts_with("search=coffee+mug&"));
        assert!(query.ends_with("sort=newest&page=1&limit=12"));
    }

    #[test]
    fn test_query_string_carries_price_bounds() {
        let filters = ProductFilters {
            min_price: Some(Money::from_cents(1000)),
            max_price: Some(Money::from_cents(2550)),
            ..ProductFilters::default()
        };
        let query = filters.query_string();
        assert!(query.contains("minPrice=10.00"));
        assert!(query.contains("maxPrice=25.50"));
    }

    #[test]
    fn test_product_page_tolerates_missing_facets() {
        let json = serde_json::json!({
            "products": [],
            "pagination": {
                "current": 1,
                "pages": 0,
                "total": 0,
                "hasNext": false,
                "hasPrev": false
            }
        });
        let page: ProductPage = serde_json::from_value(json).unwrap();
        assert!(page.filters.categories.is_empty());
    }
}
