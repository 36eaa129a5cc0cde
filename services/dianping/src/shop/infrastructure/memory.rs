//! 进程内商铺仓储（本地运行与测试）

use async_trait::async_trait;
use hmdp_common::ShopId;
use hmdp_errors::AppResult;
use parking_lot::RwLock;
use std::collections::HashMap;

use crate::shop::domain::{Shop, ShopRepository, ShopType, ShopTypeRepository};

#[derive(Default)]
pub struct InMemoryShopRepository {
    shops: RwLock<HashMap<ShopId, Shop>>,
}

impl InMemoryShopRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, shop: Shop) {
        self.shops.write().insert(shop.id, shop);
    }

    pub fn remove(&self, id: ShopId) {
        self.shops.write().remove(&id);
    }
}

#[async_trait]
impl ShopRepository for InMemoryShopRepository {
    async fn find_by_id(&self, id: ShopId) -> AppResult<Option<Shop>> {
        Ok(self.shops.read().get(&id).cloned())
    }

    async fn update(&self, shop: &Shop) -> AppResult<bool> {
        let mut shops = self.shops.write();
        match shops.get_mut(&shop.id) {
            Some(existing) => {
                *existing = shop.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[derive(Default)]
pub struct InMemoryShopTypeRepository {
    types: RwLock<Vec<ShopType>>,
}

impl InMemoryShopTypeRepository {
    pub fn new(types: Vec<ShopType>) -> Self {
        Self {
            types: RwLock::new(types),
        }
    }
}

#[async_trait]
impl ShopTypeRepository for InMemoryShopTypeRepository {
    async fn list_sorted(&self) -> AppResult<Vec<ShopType>> {
        let mut types = self.types.read().clone();
        types.sort_by_key(|t| t.sort);
        Ok(types)
    }
}
