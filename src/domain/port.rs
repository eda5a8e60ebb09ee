// 出力ポート
// ドメイン層が外部に依存する機能をトレイトとして定義
// アダプター層でこれらのトレイトを実装する

use crate::domain::model::{CartSnapshot, GearId, GearSnapshot, LineItem, LineItemId, RentalWindow};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::HashMap;
use uuid::Uuid;

/// ログレベル
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

/// ロガートレイト
/// ログ出力を抽象化するポート
pub trait Logger: Send + Sync {
    /// デバッグレベルのログを出力
    fn debug(
        &self,
        component: &str,
        message: &str,
        correlation_id: Option<Uuid>,
        context: Option<HashMap<String, String>>,
    );

    /// 情報レベルのログを出力
    fn info(
        &self,
        component: &str,
        message: &str,
        correlation_id: Option<Uuid>,
        context: Option<HashMap<String, String>>,
    );

    /// 警告レベルのログを出力
    fn warn(
        &self,
        component: &str,
        message: &str,
        correlation_id: Option<Uuid>,
        context: Option<HashMap<String, String>>,
    );

    /// エラーレベルのログを出力
    fn error(
        &self,
        component: &str,
        message: &str,
        correlation_id: Option<Uuid>,
        context: Option<HashMap<String, String>>,
    );
}

/// 在庫オラクルのエラー型
/// 4xx系（クライアント起因）と一時障害（ネットワーク/5xx系）を区別する
/// 「失敗時は有効とみなす」ポリシーとロールバック分類はこの区別に依存する
#[derive(Debug, Clone, thiserror::Error)]
pub enum OracleError {
    /// ギアがカタログに存在しない（4xx系）
    #[error("item not found: {0}")]
    ItemNotFound(String),
    /// 在庫サービスに到達できない（一時障害）
    #[error("inventory service unavailable: {0}")]
    Unavailable(String),
}

impl OracleError {
    /// 一時障害（リトライで回復しうる失敗）かどうか
    pub fn is_transient(&self) -> bool {
        matches!(self, OracleError::Unavailable(_))
    }
}

/// 在庫照会の結果
#[derive(Debug, Clone, PartialEq)]
pub struct Availability {
    /// 利用可能かどうか
    pub available: bool,
    /// 利用可能な数量
    pub quantity: u32,
    /// 次に利用可能になる日（レンタルで期間が埋まっている場合）
    pub next_available_date: Option<NaiveDate>,
}

/// 在庫オラクルトレイト
/// リモートの在庫・カタログ情報源への薄い非同期インターフェース
/// 冪等であり、安全にリトライできることを前提とする
#[async_trait]
pub trait InventoryOracle: Send + Sync {
    /// ギアの在庫状況を照会する
    ///
    /// # Arguments
    /// * `gear_id` - 照会するギアID
    /// * `window` - レンタル希望期間（レンタルの場合のみ）
    ///
    /// # Returns
    /// * `Ok(Availability)` - 照会成功
    /// * `Err(OracleError)` - 照会失敗
    async fn check_availability(
        &self,
        gear_id: GearId,
        window: Option<&RentalWindow>,
    ) -> Result<Availability, OracleError>;

    /// ギアの最新カタログスナップショットを取得する
    ///
    /// # Arguments
    /// * `gear_id` - 取得するギアID
    ///
    /// # Returns
    /// * `Ok(GearSnapshot)` - 取得成功
    /// * `Err(OracleError)` - 取得失敗
    async fn fetch_item(&self, gear_id: GearId) -> Result<GearSnapshot, OracleError>;
}

/// サーバー側カート変更APIのエラー型
#[derive(Debug, Clone, thiserror::Error)]
pub enum ServerError {
    /// サーバーが要求を拒否した（4xx系: バリデーション失敗など）
    #[error("request rejected: {0}")]
    Rejected(String),
    /// サーバーに到達できない、またはタイムアウト（一時障害）
    #[error("server unavailable: {0}")]
    Unavailable(String),
}

impl ServerError {
    /// 一時障害（リトライで回復しうる失敗）かどうか
    pub fn is_transient(&self) -> bool {
        matches!(self, ServerError::Unavailable(_))
    }
}

/// サーバー側カート変更APIトレイト
/// 各操作は成功時に変更後の明細だけでなくサーバーが正とする
/// カート全体の明細リストを返す（クライアントはそれを丸ごと受け入れる）
#[async_trait]
pub trait CartMutationServer: Send + Sync {
    /// 明細を追加する
    /// サーバー発行のIDを持つ確定済み明細を含む全明細を返す
    async fn add_item(&self, item: &LineItem) -> Result<Vec<LineItem>, ServerError>;

    /// 明細の数量・レンタル期間を変更する
    async fn update_item(
        &self,
        id: LineItemId,
        quantity: u32,
        window: Option<RentalWindow>,
    ) -> Result<Vec<LineItem>, ServerError>;

    /// 明細を削除する
    async fn remove_item(&self, id: LineItemId) -> Result<Vec<LineItem>, ServerError>;

    /// カートを空にする
    async fn clear(&self) -> Result<Vec<LineItem>, ServerError>;
}

/// 永続化エラー型
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    /// スナップショットの保存に失敗
    #[error("snapshot save failed: {0}")]
    SaveFailed(String),
    /// スナップショットの読み込みに失敗
    #[error("snapshot load failed: {0}")]
    LoadFailed(String),
}

/// スナップショットストアトレイト
/// カート集約の永続化スナップショットを保存・読み込みする
/// 渡されるのは読み取り専用の値コピーであり、生きた可変参照は渡されない
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// スナップショットを保存する
    ///
    /// # Arguments
    /// * `snapshot` - 保存するスナップショット
    ///
    /// # Returns
    /// * `Ok(())` - 保存成功
    /// * `Err(PersistenceError)` - 保存失敗
    async fn save(&self, snapshot: &CartSnapshot) -> Result<(), PersistenceError>;

    /// スナップショットを読み込む
    ///
    /// # Returns
    /// * `Ok(Some(CartSnapshot))` - スナップショットが存在した
    /// * `Ok(None)` - まだ保存されていない
    /// * `Err(PersistenceError)` - 読み込み失敗
    async fn load(&self) -> Result<Option<CartSnapshot>, PersistenceError>;
}
