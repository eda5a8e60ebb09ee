// ドメインサービス
// 在庫オラクルと突き合わせて衝突を検出する

use crate::domain::model::{Conflict, LineItem, LineItemId, PurchaseMode};
use crate::domain::port::{InventoryOracle, Logger};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// 衝突検出の結果
#[derive(Debug)]
pub struct DetectionResult {
    /// 検出された衝突のリスト
    pub conflicts: Vec<Conflict>,
    /// 衝突のなかった明細IDの集合
    pub valid_item_ids: HashSet<LineItemId>,
}

/// 衝突検出器
/// 明細リストを在庫オラクルと照合し、衝突を分類して返す
/// カート自体は一切変更しない（結果を返すだけ）
pub struct ConflictDetector<O: InventoryOracle> {
    oracle: Arc<O>,
    logger: Arc<dyn Logger>,
}

impl<O: InventoryOracle> ConflictDetector<O> {
    /// 新しい衝突検出器を作成
    ///
    /// # Arguments
    /// * `oracle` - 在庫オラクル
    /// * `logger` - ロガー
    pub fn new(oracle: Arc<O>, logger: Arc<dyn Logger>) -> Self {
        Self { oracle, logger }
    }

    /// 全明細を在庫オラクルと照合する
    ///
    /// 分類ルール（明細ごと、上から順に判定）:
    /// - 利用不可 → `OutOfStock`（推奨: 削除）
    /// - オラクルの数量 < 要求数量 → `InsufficientQuantity`（推奨: 数量削減）
    /// - レンタルで次回利用可能日が希望開始日より後 → `DatesUnavailable`（推奨: 期間変更）
    /// - それ以外 → 有効
    ///
    /// オラクル呼び出しが失敗した明細は「有効とみなす」
    /// （在庫サービス停止がカート利用を妨げないための可用性優先ポリシー）
    /// ただし黙殺はせず、必ず警告ログに残す
    pub async fn detect(&self, line_items: &[LineItem]) -> DetectionResult {
        let mut conflicts = Vec::new();
        let mut valid_item_ids = HashSet::new();

        for item in line_items {
            let availability = match self
                .oracle
                .check_availability(item.gear_id(), item.rental_window())
                .await
            {
                Ok(availability) => availability,
                Err(e) => {
                    // 失敗時は有効とみなす（警告として観測可能にする）
                    let mut context = HashMap::new();
                    context.insert("line_item_id".to_string(), item.id().to_string());
                    context.insert("gear_id".to_string(), item.gear_id().to_string());
                    context.insert("error".to_string(), e.to_string());
                    self.logger.warn(
                        "ConflictDetector",
                        "在庫照会に失敗したため明細を有効とみなします",
                        None,
                        Some(context),
                    );
                    valid_item_ids.insert(item.id());
                    continue;
                }
            };

            let title = &item.snapshot().title;

            if !availability.available {
                conflicts.push(Conflict::out_of_stock(item.id(), item.quantity(), title));
                continue;
            }

            if availability.quantity < item.quantity() {
                conflicts.push(Conflict::insufficient_quantity(
                    item.id(),
                    item.quantity(),
                    availability.quantity,
                    title,
                ));
                continue;
            }

            if item.mode() == PurchaseMode::Rent {
                if let (Some(window), Some(next_available)) =
                    (item.rental_window(), availability.next_available_date)
                {
                    if next_available > window.start_date() {
                        conflicts.push(Conflict::dates_unavailable(
                            item.id(),
                            item.quantity(),
                            availability.quantity,
                            next_available,
                            title,
                        ));
                        continue;
                    }
                }
            }

            valid_item_ids.insert(item.id());
        }

        DetectionResult {
            conflicts,
            valid_item_ids,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{
        ConflictKind, GearId, GearSnapshot, LineItemId, Money, RentalWindow, SuggestedAction,
    };
    use crate::domain::port::{Availability, OracleError};
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use std::collections::HashMap;
    use tokio::sync::Mutex;
    use uuid::Uuid;

    // テスト用のモックオラクル
    struct MockOracle {
        responses: Mutex<HashMap<GearId, Result<Availability, OracleError>>>,
    }

    impl MockOracle {
        fn new() -> Self {
            Self {
                responses: Mutex::new(HashMap::new()),
            }
        }

        async fn set_response(&self, gear_id: GearId, response: Result<Availability, OracleError>) {
            self.responses.lock().await.insert(gear_id, response);
        }
    }

    #[async_trait]
    impl InventoryOracle for MockOracle {
        async fn check_availability(
            &self,
            gear_id: GearId,
            _window: Option<&RentalWindow>,
        ) -> Result<Availability, OracleError> {
            self.responses
                .lock()
                .await
                .get(&gear_id)
                .cloned()
                .unwrap_or(Err(OracleError::ItemNotFound(gear_id.to_string())))
        }

        async fn fetch_item(&self, gear_id: GearId) -> Result<GearSnapshot, OracleError> {
            Err(OracleError::ItemNotFound(gear_id.to_string()))
        }
    }

    struct NullLogger;

    impl Logger for NullLogger {
        fn debug(&self, _: &str, _: &str, _: Option<Uuid>, _: Option<HashMap<String, String>>) {}
        fn info(&self, _: &str, _: &str, _: Option<Uuid>, _: Option<HashMap<String, String>>) {}
        fn warn(&self, _: &str, _: &str, _: Option<Uuid>, _: Option<HashMap<String, String>>) {}
        fn error(&self, _: &str, _: &str, _: Option<Uuid>, _: Option<HashMap<String, String>>) {}
    }

    fn purchase_item(gear_id: GearId, quantity: u32) -> LineItem {
        let snapshot = GearSnapshot::new(
            "テント".to_string(),
            Money::usd(15_000),
            Money::usd(2_500),
            true,
        );
        LineItem::new(
            LineItemId::new(),
            gear_id,
            snapshot,
            quantity,
            PurchaseMode::Purchase,
            None,
            Money::usd(15_000),
        )
        .unwrap()
    }

    fn rent_item(gear_id: GearId, quantity: u32, start: NaiveDate, end: NaiveDate) -> LineItem {
        let snapshot = GearSnapshot::new(
            "カヤック".to_string(),
            Money::usd(60_000),
            Money::usd(5_000),
            true,
        );
        LineItem::new(
            LineItemId::new(),
            gear_id,
            snapshot,
            quantity,
            PurchaseMode::Rent,
            Some(RentalWindow::new(start, end).unwrap()),
            Money::usd(5_000),
        )
        .unwrap()
    }

    fn detector(oracle: Arc<MockOracle>) -> ConflictDetector<MockOracle> {
        ConflictDetector::new(oracle, Arc::new(NullLogger))
    }

    #[tokio::test]
    async fn test_unavailable_item_is_out_of_stock() {
        let oracle = Arc::new(MockOracle::new());
        let gear_id = GearId::new();
        oracle
            .set_response(
                gear_id,
                Ok(Availability {
                    available: false,
                    quantity: 0,
                    next_available_date: None,
                }),
            )
            .await;

        let item = purchase_item(gear_id, 2);
        let result = detector(oracle).detect(&[item.clone()]).await;

        assert_eq!(result.conflicts.len(), 1);
        assert_eq!(result.conflicts[0].kind, ConflictKind::OutOfStock);
        assert_eq!(result.conflicts[0].available_quantity, 0);
        assert_eq!(result.conflicts[0].suggested_action, SuggestedAction::Remove);
        assert!(!result.valid_item_ids.contains(&item.id()));
    }

    #[tokio::test]
    async fn test_short_stock_is_insufficient_quantity() {
        let oracle = Arc::new(MockOracle::new());
        let gear_id = GearId::new();
        oracle
            .set_response(
                gear_id,
                Ok(Availability {
                    available: true,
                    quantity: 2,
                    next_available_date: None,
                }),
            )
            .await;

        let item = purchase_item(gear_id, 5);
        let result = detector(oracle).detect(&[item]).await;

        assert_eq!(result.conflicts.len(), 1);
        assert_eq!(result.conflicts[0].kind, ConflictKind::InsufficientQuantity);
        assert_eq!(result.conflicts[0].requested_quantity, 5);
        assert_eq!(result.conflicts[0].available_quantity, 2);
        assert_eq!(
            result.conflicts[0].suggested_action,
            SuggestedAction::ReduceQuantity
        );
    }

    #[tokio::test]
    async fn test_later_next_available_date_is_dates_unavailable() {
        let oracle = Arc::new(MockOracle::new());
        let gear_id = GearId::new();
        let start = NaiveDate::from_ymd_opt(2024, 1, 20).unwrap();
        let end = NaiveDate::from_ymd_opt(2024, 1, 22).unwrap();
        oracle
            .set_response(
                gear_id,
                Ok(Availability {
                    available: true,
                    quantity: 3,
                    next_available_date: NaiveDate::from_ymd_opt(2024, 2, 1),
                }),
            )
            .await;

        let item = rent_item(gear_id, 1, start, end);
        let result = detector(oracle).detect(&[item]).await;

        assert_eq!(result.conflicts.len(), 1);
        assert_eq!(result.conflicts[0].kind, ConflictKind::DatesUnavailable);
        assert_eq!(
            result.conflicts[0].suggested_action,
            SuggestedAction::ChangeDates
        );
    }

    #[tokio::test]
    async fn test_earlier_next_available_date_is_valid() {
        let oracle = Arc::new(MockOracle::new());
        let gear_id = GearId::new();
        let start = NaiveDate::from_ymd_opt(2024, 1, 20).unwrap();
        let end = NaiveDate::from_ymd_opt(2024, 1, 22).unwrap();
        // 希望開始日以前に空くなら衝突ではない
        oracle
            .set_response(
                gear_id,
                Ok(Availability {
                    available: true,
                    quantity: 3,
                    next_available_date: NaiveDate::from_ymd_opt(2024, 1, 15),
                }),
            )
            .await;

        let item = rent_item(gear_id, 1, start, end);
        let id = item.id();
        let result = detector(oracle).detect(&[item]).await;

        assert!(result.conflicts.is_empty());
        assert!(result.valid_item_ids.contains(&id));
    }

    #[tokio::test]
    async fn test_oracle_failure_assumes_valid() {
        let oracle = Arc::new(MockOracle::new());
        let gear_id = GearId::new();
        oracle
            .set_response(
                gear_id,
                Err(OracleError::Unavailable("connection refused".to_string())),
            )
            .await;

        let item = purchase_item(gear_id, 1);
        let id = item.id();
        let result = detector(oracle).detect(&[item]).await;

        // 在庫サービスに到達できなくてもカート利用は妨げない
        assert!(result.conflicts.is_empty());
        assert!(result.valid_item_ids.contains(&id));
    }

    #[tokio::test]
    async fn test_mixed_items_classified_independently() {
        let oracle = Arc::new(MockOracle::new());
        let ok_gear = GearId::new();
        let empty_gear = GearId::new();
        oracle
            .set_response(
                ok_gear,
                Ok(Availability {
                    available: true,
                    quantity: 10,
                    next_available_date: None,
                }),
            )
            .await;
        oracle
            .set_response(
                empty_gear,
                Ok(Availability {
                    available: false,
                    quantity: 0,
                    next_available_date: None,
                }),
            )
            .await;

        let ok_item = purchase_item(ok_gear, 1);
        let ok_id = ok_item.id();
        let bad_item = purchase_item(empty_gear, 1);
        let result = detector(oracle).detect(&[ok_item, bad_item.clone()]).await;

        assert_eq!(result.conflicts.len(), 1);
        assert_eq!(result.conflicts[0].line_item_id, bad_item.id());
        assert!(result.valid_item_ids.contains(&ok_id));
    }
}
