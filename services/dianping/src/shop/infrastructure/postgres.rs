//! PostgreSQL 商铺仓储

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hmdp_adapter_postgres::map_sqlx_error;
use hmdp_common::{ShopId, ShopTypeId};
use hmdp_errors::AppResult;
use sqlx::PgPool;

use crate::shop::domain::{Shop, ShopRepository, ShopType, ShopTypeRepository};

pub struct PostgresShopRepository {
    pool: PgPool,
}

impl PostgresShopRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct ShopRow {
    id: i64,
    name: String,
    type_id: i64,
    images: String,
    area: Option<String>,
    address: String,
    x: f64,
    y: f64,
    avg_price: Option<i64>,
    sold: i32,
    comments: i32,
    score: i32,
    open_hours: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ShopRow> for Shop {
    fn from(row: ShopRow) -> Self {
        Self {
            id: ShopId::new(row.id),
            name: row.name,
            type_id: ShopTypeId::new(row.type_id),
            images: row.images,
            area: row.area,
            address: row.address,
            x: row.x,
            y: row.y,
            avg_price: row.avg_price,
            sold: row.sold,
            comments: row.comments,
            score: row.score,
            open_hours: row.open_hours,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[async_trait]
impl ShopRepository for PostgresShopRepository {
    async fn find_by_id(&self, id: ShopId) -> AppResult<Option<Shop>> {
        let row = sqlx::query_as::<_, ShopRow>(
            r#"
            SELECT id, name, type_id, images, area, address, x, y, avg_price,
                   sold, comments, score, open_hours, created_at, updated_at
            FROM tb_shop
            WHERE id = $1
            "#,
        )
        .bind(id.value())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(Shop::from))
    }

    async fn update(&self, shop: &Shop) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE tb_shop
            SET name = $2, type_id = $3, images = $4, area = $5, address = $6,
                x = $7, y = $8, avg_price = $9, sold = $10, comments = $11,
                score = $12, open_hours = $13, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(shop.id.value())
        .bind(&shop.name)
        .bind(shop.type_id.value())
        .bind(&shop.images)
        .bind(&shop.area)
        .bind(&shop.address)
        .bind(shop.x)
        .bind(shop.y)
        .bind(shop.avg_price)
        .bind(shop.sold)
        .bind(shop.comments)
        .bind(shop.score)
        .bind(&shop.open_hours)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(result.rows_affected() > 0)
    }
}

pub struct PostgresShopTypeRepository {
    pool: PgPool,
}

impl PostgresShopTypeRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ShopTypeRepository for PostgresShopTypeRepository {
    async fn list_sorted(&self) -> AppResult<Vec<ShopType>> {
        let rows: Vec<(i64, String, String, i32)> =
            sqlx::query_as("SELECT id, name, icon, sort FROM tb_shop_type ORDER BY sort ASC")
                .fetch_all(&self.pool)
                .await
                .map_err(map_sqlx_error)?;

        Ok(rows
            .into_iter()
            .map(|(id, name, icon, sort)| ShopType {
                id: ShopTypeId::new(id),
                name,
                icon,
                sort,
            })
            .collect())
    }
}
