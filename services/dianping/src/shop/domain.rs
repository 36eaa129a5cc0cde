//! 商铺领域模型与仓储接口

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hmdp_common::{ShopId, ShopTypeId};
use hmdp_errors::AppResult;
use serde::{Deserialize, Serialize};

/// 商铺
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Shop {
    pub id: ShopId,
    pub name: String,
    pub type_id: ShopTypeId,
    /// 图片，多个以逗号分隔
    pub images: String,
    pub area: Option<String>,
    pub address: String,
    /// 经度
    pub x: f64,
    /// 纬度
    pub y: f64,
    /// 人均价格（分）
    pub avg_price: Option<i64>,
    pub sold: i32,
    pub comments: i32,
    /// 评分 1~5 分，乘 10 保存
    pub score: i32,
    /// 营业时间，例如 10:00-22:00
    pub open_hours: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 商铺类型
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShopType {
    pub id: ShopTypeId,
    pub name: String,
    pub icon: String,
    pub sort: i32,
}

#[async_trait]
pub trait ShopRepository: Send + Sync {
    async fn find_by_id(&self, id: ShopId) -> AppResult<Option<Shop>>;

    /// 更新商铺，返回是否存在该行
    async fn update(&self, shop: &Shop) -> AppResult<bool>;
}

#[async_trait]
pub trait ShopTypeRepository: Send + Sync {
    /// 按 sort 升序返回全部类型
    async fn list_sorted(&self) -> AppResult<Vec<ShopType>>;
}
