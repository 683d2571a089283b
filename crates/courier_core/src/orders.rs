//! Order repository and the sources that feed it.

use std::path::PathBuf;

use anyhow::{Context, Result};
use async_trait::async_trait;
use shared::{
    domain::{Order, OrderId, OrderManifest, Warehouse},
    error::DeliveryError,
};
use tracing::{info, warn};

#[async_trait]
pub trait OrderSource: Send + Sync {
    async fn load(&self) -> Result<OrderManifest>;
}

/// Serves a manifest held in memory.
pub struct StaticOrderSource {
    manifest: OrderManifest,
}

impl StaticOrderSource {
    pub fn new(manifest: OrderManifest) -> Self {
        Self { manifest }
    }
}

#[async_trait]
impl OrderSource for StaticOrderSource {
    async fn load(&self) -> Result<OrderManifest> {
        Ok(self.manifest.clone())
    }
}

/// Reads an [`OrderManifest`] from a JSON document on disk.
pub struct JsonFileOrderSource {
    path: PathBuf,
}

impl JsonFileOrderSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl OrderSource for JsonFileOrderSource {
    async fn load(&self) -> Result<OrderManifest> {
        let raw = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("failed to read order manifest '{}'", self.path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("invalid order manifest '{}'", self.path.display()))
    }
}

#[derive(Debug, Default)]
pub struct OrderRepository {
    orders: Vec<Order>,
    warehouses: Vec<Warehouse>,
    selected: Option<OrderId>,
}

impl OrderRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the repository contents. Duplicate ids keep the last record
    /// in the position of the first. Any previous selection is dropped.
    pub fn load_orders(&mut self, orders: impl IntoIterator<Item = Order>) -> &[Order] {
        self.orders.clear();
        self.selected = None;
        for order in orders {
            if let Some(existing) = self.orders.iter_mut().find(|o| o.id == order.id) {
                warn!(order_id = %order.id, "duplicate order id in source; keeping last record");
                *existing = order;
            } else {
                self.orders.push(order);
            }
        }
        info!(count = self.orders.len(), "loaded orders");
        &self.orders
    }

    pub fn load_manifest(&mut self, manifest: OrderManifest) -> &[Order] {
        self.warehouses = manifest.warehouses;
        self.load_orders(manifest.orders)
    }

    pub fn select(&mut self, order_id: &OrderId) -> Result<Order, DeliveryError> {
        let order = self
            .get(order_id)
            .cloned()
            .ok_or_else(|| DeliveryError::OrderNotFound(order_id.clone()))?;
        self.selected = Some(order.id.clone());
        Ok(order)
    }

    pub fn current(&self) -> Option<&Order> {
        self.selected.as_ref().and_then(|id| self.get(id))
    }

    pub fn clear_selection(&mut self) {
        self.selected = None;
    }

    /// Drops an order, typically once it has been delivered.
    pub fn remove(&mut self, order_id: &OrderId) -> Option<Order> {
        let index = self.orders.iter().position(|o| &o.id == order_id)?;
        if self.selected.as_ref() == Some(order_id) {
            self.selected = None;
        }
        Some(self.orders.remove(index))
    }

    pub fn get(&self, order_id: &OrderId) -> Option<&Order> {
        self.orders.iter().find(|o| &o.id == order_id)
    }

    pub fn orders(&self) -> &[Order] {
        &self.orders
    }

    pub fn warehouses(&self) -> &[Warehouse] {
        &self.warehouses
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }
}

#[cfg(test)]
#[path = "tests/orders_tests.rs"]
mod tests;
