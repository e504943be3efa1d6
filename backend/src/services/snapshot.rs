//! Reads the inventory snapshot an allocation run plans from

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use sqlx::{FromRow, PgPool};

use shared::{
    CentralSalesRecord, CentralStockRecord, InventorySnapshot, Product, StoreCode,
    StoreSalesRecord, StoreStockRecord,
};

use crate::error::AppResult;

#[derive(Clone)]
pub struct SnapshotService {
    db: PgPool,
}

#[derive(Debug, FromRow)]
struct ProductRow {
    code: String,
    name: String,
}

#[derive(Debug, FromRow)]
struct TargetRow {
    product_code: String,
    store_code: String,
    target_quantity: i32,
}

#[derive(Debug, FromRow)]
struct StoreSalesRow {
    product_code: String,
    store_code: String,
    average_sales: Decimal,
}

#[derive(Debug, FromRow)]
struct CentralSalesRow {
    product_code: String,
    average_sales: Decimal,
}

#[derive(Debug, FromRow)]
struct StoreStockRow {
    product_code: String,
    store_code: String,
    quantity: i32,
}

#[derive(Debug, FromRow)]
struct CentralStockRow {
    product_code: String,
    quantity: i32,
    position: Option<String>,
}

impl SnapshotService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Load every input of an allocation run inside one repeatable-read
    /// transaction so all record sets describe the same moment
    pub async fn load(&self) -> AppResult<InventorySnapshot> {
        let mut tx = self.db.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ READ ONLY")
            .execute(&mut *tx)
            .await?;

        let products = sqlx::query_as::<_, ProductRow>("SELECT code, name FROM products ORDER BY code")
            .fetch_all(&mut *tx)
            .await?;

        let targets = sqlx::query_as::<_, TargetRow>(
            "SELECT product_code, store_code, target_quantity FROM product_target_stock",
        )
        .fetch_all(&mut *tx)
        .await?;

        let store_sales = sqlx::query_as::<_, StoreSalesRow>(
            "SELECT product_code, store_code, average_sales FROM store_sales_velocity",
        )
        .fetch_all(&mut *tx)
        .await?;

        let central_sales = sqlx::query_as::<_, CentralSalesRow>(
            "SELECT product_code, average_sales FROM central_sales_velocity",
        )
        .fetch_all(&mut *tx)
        .await?;

        let store_stock = sqlx::query_as::<_, StoreStockRow>(
            "SELECT product_code, store_code, quantity FROM store_stock",
        )
        .fetch_all(&mut *tx)
        .await?;

        let central_stock = sqlx::query_as::<_, CentralStockRow>(
            "SELECT product_code, quantity, position FROM central_stock",
        )
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;

        let mut targets_by_product: BTreeMap<String, Vec<(String, i32)>> = BTreeMap::new();
        for row in targets {
            targets_by_product
                .entry(row.product_code)
                .or_default()
                .push((row.store_code, row.target_quantity));
        }

        let products: Vec<Product> = products
            .into_iter()
            .map(|row| {
                let targets = targets_by_product.remove(&row.code).unwrap_or_default();
                targets
                    .into_iter()
                    .fold(Product::new(row.code, row.name), |product, (store, target)| {
                        product.with_target(store, target)
                    })
            })
            .collect();

        tracing::debug!(
            products = products.len(),
            store_sales = store_sales.len(),
            store_stock = store_stock.len(),
            central_stock = central_stock.len(),
            "Inventory snapshot loaded"
        );

        Ok(InventorySnapshot::from_records(
            products,
            store_sales
                .into_iter()
                .map(|r| StoreSalesRecord {
                    code: r.product_code,
                    store: StoreCode::from(r.store_code),
                    average_sales: r.average_sales,
                })
                .collect(),
            central_sales
                .into_iter()
                .map(|r| CentralSalesRecord {
                    code: r.product_code,
                    average_sales: r.average_sales,
                })
                .collect(),
            store_stock
                .into_iter()
                .map(|r| StoreStockRecord {
                    code: r.product_code,
                    store: StoreCode::from(r.store_code),
                    quantity: r.quantity,
                })
                .collect(),
            central_stock
                .into_iter()
                .map(|r| CentralStockRecord {
                    code: r.product_code,
                    quantity: r.quantity,
                    position: r.position,
                })
                .collect(),
        ))
    }
}
