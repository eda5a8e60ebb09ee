use crate::domain::model::CartSnapshot;
use crate::domain::port::{PersistenceError, SnapshotStore};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;

/// ファイルベースのスナップショットストア実装
/// スナップショットをJSONファイルとして保存する
pub struct FileSnapshotStore {
    path: PathBuf,
}

impl FileSnapshotStore {
    /// 保存先のパスを指定してストアを作成
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl SnapshotStore for FileSnapshotStore {
    async fn save(&self, snapshot: &CartSnapshot) -> Result<(), PersistenceError> {
        let json = serde_json::to_string_pretty(snapshot)
            .map_err(|e| PersistenceError::SaveFailed(e.to_string()))?;
        tokio::fs::write(&self.path, json)
            .await
            .map_err(|e| PersistenceError::SaveFailed(e.to_string()))
    }

    async fn load(&self) -> Result<Option<CartSnapshot>, PersistenceError> {
        let json = match tokio::fs::read_to_string(&self.path).await {
            Ok(json) => json,
            // ファイルがまだないのは正常（初回起動）
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(PersistenceError::LoadFailed(e.to_string())),
        };
        let snapshot = serde_json::from_str(&json)
            .map_err(|e| PersistenceError::LoadFailed(e.to_string()))?;
        Ok(Some(snapshot))
    }
}

/// インメモリのスナップショットストア実装
/// 開発・テスト用。障害注入を備える
#[derive(Clone)]
pub struct InMemorySnapshotStore {
    snapshot: Arc<Mutex<Option<CartSnapshot>>>,
    fail_saves: Arc<Mutex<bool>>,
}

impl InMemorySnapshotStore {
    pub fn new() -> Self {
        Self {
            snapshot: Arc::new(Mutex::new(None)),
            fail_saves: Arc::new(Mutex::new(false)),
        }
    }

    /// 保存を失敗させる（永続化ベストエフォートの検証用）
    pub async fn set_fail_saves(&self, fail: bool) {
        *self.fail_saves.lock().await = fail;
    }

    /// 保存されているスナップショットを取得（テスト検証用）
    pub async fn stored(&self) -> Option<CartSnapshot> {
        self.snapshot.lock().await.clone()
    }

    /// スナップショットを直接設定する（読み込みテスト用）
    pub async fn seed(&self, snapshot: CartSnapshot) {
        *self.snapshot.lock().await = Some(snapshot);
    }
}

impl Default for InMemorySnapshotStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SnapshotStore for InMemorySnapshotStore {
    async fn save(&self, snapshot: &CartSnapshot) -> Result<(), PersistenceError> {
        if *self.fail_saves.lock().await {
            return Err(PersistenceError::SaveFailed(
                "storage quota exceeded".to_string(),
            ));
        }
        *self.snapshot.lock().await = Some(snapshot.clone());
        Ok(())
    }

    async fn load(&self) -> Result<Option<CartSnapshot>, PersistenceError> {
        Ok(self.snapshot.lock().await.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{
        Cart, GearId, GearSnapshot, LineItem, LineItemId, Money, PricingPolicy, PurchaseMode,
    };

    fn sample_snapshot() -> CartSnapshot {
        let gear = GearSnapshot::new(
            "チェア".to_string(),
            Money::usd(3_000),
            Money::usd(600),
            true,
        );
        let item = LineItem::new(
            LineItemId::new(),
            GearId::new(),
            gear,
            2,
            PurchaseMode::Purchase,
            None,
            Money::usd(3_000),
        )
        .unwrap();
        let mut cart = Cart::new(PricingPolicy::default());
        cart.push_line(item);
        cart.snapshot()
    }

    #[tokio::test]
    async fn test_file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSnapshotStore::new(dir.path().join("cart.json"));
        let snapshot = sample_snapshot();

        store.save(&snapshot).await.unwrap();
        let loaded = store.load().await.unwrap();
        assert_eq!(loaded, Some(snapshot));
    }

    #[tokio::test]
    async fn test_file_store_missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSnapshotStore::new(dir.path().join("missing.json"));
        assert_eq!(store.load().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_file_store_corrupt_file_is_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cart.json");
        tokio::fs::write(&path, "not json").await.unwrap();

        let store = FileSnapshotStore::new(path);
        let result = store.load().await;
        assert!(matches!(result, Err(PersistenceError::LoadFailed(_))));
    }

    #[tokio::test]
    async fn test_in_memory_store_failure_injection() {
        let store = InMemorySnapshotStore::new();
        store.set_fail_saves(true).await;

        let result = store.save(&sample_snapshot()).await;
        assert!(matches!(result, Err(PersistenceError::SaveFailed(_))));
        assert!(store.stored().await.is_none());
    }
}
