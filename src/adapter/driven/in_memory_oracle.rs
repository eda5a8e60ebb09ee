use crate::domain::model::{GearId, GearSnapshot, RentalWindow};
use crate::domain::port::{Availability, InventoryOracle, OracleError};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// ギアごとの在庫レコード
#[derive(Debug, Clone)]
struct StockRecord {
    snapshot: GearSnapshot,
    available: bool,
    quantity: u32,
    next_available_date: Option<NaiveDate>,
}

/// インメモリ在庫オラクル実装
/// 開発・テスト用。在庫テーブルと障害注入を備える
#[derive(Clone)]
pub struct InMemoryInventoryOracle {
    records: Arc<Mutex<HashMap<GearId, StockRecord>>>,
    /// 設定されている間、すべての照会がこのエラーで失敗する
    failure: Arc<Mutex<Option<OracleError>>>,
}

impl InMemoryInventoryOracle {
    pub fn new() -> Self {
        Self {
            records: Arc::new(Mutex::new(HashMap::new())),
            failure: Arc::new(Mutex::new(None)),
        }
    }

    /// ギアを在庫テーブルに登録する
    ///
    /// # Arguments
    /// * `gear_id` - ギアID
    /// * `snapshot` - カタログスナップショット
    /// * `quantity` - 利用可能な数量
    pub async fn register(&self, gear_id: GearId, snapshot: GearSnapshot, quantity: u32) {
        let available = snapshot.in_stock && quantity > 0;
        self.records.lock().await.insert(
            gear_id,
            StockRecord {
                snapshot,
                available,
                quantity,
                next_available_date: None,
            },
        );
    }

    /// 在庫数を変更する（登録済みのギアのみ）
    pub async fn set_quantity(&self, gear_id: GearId, quantity: u32) {
        if let Some(record) = self.records.lock().await.get_mut(&gear_id) {
            record.quantity = quantity;
            record.available = record.snapshot.in_stock && quantity > 0;
        }
    }

    /// カタログスナップショットを差し替える（価格改定などの再現用）
    pub async fn set_snapshot(&self, gear_id: GearId, snapshot: GearSnapshot) {
        if let Some(record) = self.records.lock().await.get_mut(&gear_id) {
            record.available = snapshot.in_stock && record.quantity > 0;
            record.snapshot = snapshot;
        }
    }

    /// 次回利用可能日を設定する（レンタル期間衝突の再現用）
    pub async fn set_next_available_date(&self, gear_id: GearId, date: Option<NaiveDate>) {
        if let Some(record) = self.records.lock().await.get_mut(&gear_id) {
            record.next_available_date = date;
        }
    }

    /// 障害を注入する（解除するまですべての照会が失敗する)
    pub async fn inject_failure(&self, error: Option<OracleError>) {
        *self.failure.lock().await = error;
    }
}

impl Default for InMemoryInventoryOracle {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl InventoryOracle for InMemoryInventoryOracle {
    async fn check_availability(
        &self,
        gear_id: GearId,
        _window: Option<&RentalWindow>,
    ) -> Result<Availability, OracleError> {
        if let Some(error) = self.failure.lock().await.clone() {
            return Err(error);
        }
        let records = self.records.lock().await;
        let record = records
            .get(&gear_id)
            .ok_or_else(|| OracleError::ItemNotFound(gear_id.to_string()))?;
        Ok(Availability {
            available: record.available,
            quantity: record.quantity,
            next_available_date: record.next_available_date,
        })
    }

    async fn fetch_item(&self, gear_id: GearId) -> Result<GearSnapshot, OracleError> {
        if let Some(error) = self.failure.lock().await.clone() {
            return Err(error);
        }
        let records = self.records.lock().await;
        records
            .get(&gear_id)
            .map(|record| record.snapshot.clone())
            .ok_or_else(|| OracleError::ItemNotFound(gear_id.to_string()))
    }
}
