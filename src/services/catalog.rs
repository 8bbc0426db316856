use crate::{
    db::DbPool,
    entities::{product, Product, ProductModel, ProductVariant, ProductVariantModel},
    errors::ServiceError,
};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QueryOrder};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

/// A product with its selectable variants.
#[derive(Debug, Serialize)]
pub struct ProductWithVariants {
    pub product: ProductModel,
    pub variants: Vec<ProductVariantModel>,
}

/// Read-only catalog browsing. Catalog administration is out of scope; this
/// service only ever reads.
#[derive(Clone)]
pub struct CatalogService {
    db: Arc<DbPool>,
}

impl CatalogService {
    pub fn new(db: Arc<DbPool>) -> Self {
        Self { db }
    }

    /// Lists products, optionally filtered by a case-insensitive name search.
    pub async fn list(
        &self,
        search: Option<&str>,
    ) -> Result<Vec<ProductWithVariants>, ServiceError> {
        let mut query = Product::find().order_by_asc(product::Column::Name);
        if let Some(term) = search.map(str::trim).filter(|t| !t.is_empty()) {
            query = query.filter(product::Column::Name.contains(term));
        }

        let rows = query
            .find_with_related(ProductVariant)
            .all(&*self.db)
            .await?;

        Ok(rows
            .into_iter()
            .map(|(product, variants)| ProductWithVariants { product, variants })
            .collect())
    }

    /// Loads a single product with its variants.
    pub async fn get(&self, product_id: Uuid) -> Result<ProductWithVariants, ServiceError> {
        let mut rows = Product::find_by_id(product_id)
            .find_with_related(ProductVariant)
            .all(&*self.db)
            .await?;

        match rows.pop() {
            Some((product, variants)) => Ok(ProductWithVariants { product, variants }),
            None => Err(ServiceError::NotFound(format!(
                "Product {} not found",
                product_id
            ))),
        }
    }
}
