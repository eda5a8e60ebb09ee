use crate::domain::model::{LineItem, LineItemId, RentalWindow};
use crate::domain::port::{CartMutationServer, ServerError};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;

/// インメモリのサーバー側カート実装
/// 開発・テスト用。サーバーが正とするカート状態を保持し、
/// 追加時にはサーバー発行のIDを付与した確定済み明細を返す
#[derive(Clone)]
pub struct InMemoryCartServer {
    line_items: Arc<Mutex<Vec<LineItem>>>,
    /// 設定されている間、すべての変更要求がこのエラーで失敗する
    failure: Arc<Mutex<Option<ServerError>>>,
}

impl InMemoryCartServer {
    pub fn new() -> Self {
        Self {
            line_items: Arc::new(Mutex::new(Vec::new())),
            failure: Arc::new(Mutex::new(None)),
        }
    }

    /// 障害を注入する（解除するまですべての変更要求が失敗する）
    pub async fn inject_failure(&self, error: Option<ServerError>) {
        *self.failure.lock().await = error;
    }

    /// サーバーが保持する明細リストを取得（テスト検証用）
    pub async fn server_line_items(&self) -> Vec<LineItem> {
        self.line_items.lock().await.clone()
    }

    async fn check_failure(&self) -> Result<(), ServerError> {
        match self.failure.lock().await.clone() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

impl Default for InMemoryCartServer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CartMutationServer for InMemoryCartServer {
    async fn add_item(&self, item: &LineItem) -> Result<Vec<LineItem>, ServerError> {
        self.check_failure().await?;
        // クライアントの一時IDは受け取らず、サーバー発行のIDを振り直す
        let confirmed = LineItem::new(
            LineItemId::new(),
            item.gear_id(),
            item.snapshot().clone(),
            item.quantity(),
            item.mode(),
            item.rental_window().cloned(),
            item.unit_price(),
        )
        .map_err(|e| ServerError::Rejected(e.to_string()))?;

        let mut line_items = self.line_items.lock().await;
        line_items.push(confirmed);
        Ok(line_items.clone())
    }

    async fn update_item(
        &self,
        id: LineItemId,
        quantity: u32,
        window: Option<RentalWindow>,
    ) -> Result<Vec<LineItem>, ServerError> {
        self.check_failure().await?;
        let mut line_items = self.line_items.lock().await;
        let item = line_items
            .iter_mut()
            .find(|item| item.id() == id)
            .ok_or_else(|| ServerError::Rejected(format!("明細が見つかりません: {}", id)))?;
        item.set_quantity(quantity)
            .map_err(|e| ServerError::Rejected(e.to_string()))?;
        if let Some(window) = window {
            item.set_rental_window(window)
                .map_err(|e| ServerError::Rejected(e.to_string()))?;
        }
        Ok(line_items.clone())
    }

    async fn remove_item(&self, id: LineItemId) -> Result<Vec<LineItem>, ServerError> {
        self.check_failure().await?;
        let mut line_items = self.line_items.lock().await;
        let position = line_items
            .iter()
            .position(|item| item.id() == id)
            .ok_or_else(|| ServerError::Rejected(format!("明細が見つかりません: {}", id)))?;
        line_items.remove(position);
        Ok(line_items.clone())
    }

    async fn clear(&self) -> Result<Vec<LineItem>, ServerError> {
        self.check_failure().await?;
        let mut line_items = self.line_items.lock().await;
        line_items.clear();
        Ok(line_items.clone())
    }
}
