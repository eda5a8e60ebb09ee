use crate::application::error::CartError;
use crate::domain::model::{
    Cart, CartSnapshot, CartTotals, Conflict, GearId, GearSnapshot, LineItem, LineItemId,
    PricingPolicy, PurchaseMode, RentalWindow, ResolutionAction, SnapshotChange,
};
use crate::domain::port::{CartMutationServer, InventoryOracle, Logger, SnapshotStore};
use crate::domain::service::ConflictDetector;
use chrono::{DateTime, Duration, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

/// カートサービスの内部状態
/// ロックは中断点（await）をまたいで保持しない
struct CartState {
    cart: Cart,
    /// 更新処理が進行中の明細ID
    updating: HashSet<LineItemId>,
    /// 削除処理が進行中の明細ID
    removing: HashSet<LineItemId>,
    /// 明細ごとの最終変更エポック
    mutation_epochs: HashMap<LineItemId, u64>,
    /// 変更のたびに単調増加するエポックカウンター
    epoch_counter: u64,
    is_loading: bool,
    is_adding_item: bool,
    is_validating_inventory: bool,
    /// 直近の失敗メッセージ（新しい操作の開始時にクリアされる）
    last_error: Option<String>,
}

impl CartState {
    fn new(policy: PricingPolicy) -> Self {
        Self {
            cart: Cart::new(policy),
            updating: HashSet::new(),
            removing: HashSet::new(),
            mutation_epochs: HashMap::new(),
            epoch_counter: 0,
            is_loading: false,
            is_adding_item: false,
            is_validating_inventory: false,
            last_error: None,
        }
    }

    /// 明細への変更（確定またはロールバック）を記録
    fn bump_epoch(&mut self, id: LineItemId) {
        self.epoch_counter += 1;
        self.mutation_epochs.insert(id, self.epoch_counter);
    }

    /// 明細の最終変更エポックを取得
    fn epoch_of(&self, id: LineItemId) -> u64 {
        self.mutation_epochs.get(&id).copied().unwrap_or(0)
    }

    /// 同じ明細への操作が進行中かどうか
    fn in_flight(&self, id: LineItemId) -> bool {
        self.updating.contains(&id) || self.removing.contains(&id)
    }

    fn record_error(&mut self, err: &CartError) {
        self.last_error = Some(err.to_string());
    }
}

/// カートアプリケーションサービス
/// カート集約への唯一の入口として、楽観的更新プロトコルを編成する
///
/// プロトコル: 楽観的適用 → サーバー呼び出し → 確定 / ロールバック
/// 失敗した操作の後、明細と集計値は必ず操作前の状態と等しい
pub struct CartService<O, S, P>
where
    O: InventoryOracle,
    S: CartMutationServer,
    P: SnapshotStore,
{
    state: Mutex<CartState>,
    oracle: Arc<O>,
    detector: ConflictDetector<O>,
    server: S,
    store: P,
    logger: Arc<dyn Logger>,
}

impl<O, S, P> CartService<O, S, P>
where
    O: InventoryOracle,
    S: CartMutationServer,
    P: SnapshotStore,
{
    /// 新しいカートサービスを作成
    ///
    /// # Arguments
    /// * `policy` - 価格計算ポリシー
    /// * `oracle` - 在庫オラクル
    /// * `server` - サーバー側カート変更API
    /// * `store` - スナップショットストア
    /// * `logger` - ロガー
    pub fn new(
        policy: PricingPolicy,
        oracle: Arc<O>,
        server: S,
        store: P,
        logger: Arc<dyn Logger>,
    ) -> Self {
        let detector = ConflictDetector::new(oracle.clone(), logger.clone());
        Self {
            state: Mutex::new(CartState::new(policy)),
            oracle,
            detector,
            server,
            store,
            logger,
        }
    }

    /// 鮮度判定の既定閾値（5分）
    pub fn default_staleness_threshold() -> Duration {
        Duration::minutes(5)
    }

    /// 永続化スナップショットからカートを復元する
    /// スナップショットがない・読めない場合は空のカートのまま開始する
    /// （永続化はベストエフォートであり、読み込み失敗は致命的ではない）
    pub async fn load(&self) {
        {
            let mut state = self.state.lock().await;
            state.is_loading = true;
        }
        let loaded = self.store.load().await;
        let mut state = self.state.lock().await;
        state.is_loading = false;
        match loaded {
            Ok(Some(snapshot)) => {
                let policy = state.cart.policy().clone();
                state.cart = Cart::from_snapshot(snapshot, policy);
            }
            Ok(None) => {}
            Err(e) => {
                let mut context = HashMap::new();
                context.insert("error".to_string(), e.to_string());
                self.logger.warn(
                    "CartService",
                    "スナップショットの読み込みに失敗したため空のカートで開始します",
                    None,
                    Some(context),
                );
            }
        }
    }

    /// 明細を追加する
    ///
    /// 同じギア・同じモードの明細が既にある場合は数量マージになり、
    /// 合算数量を在庫オラクルで再検証してから更新に委譲する
    /// 新規の場合は一時IDで楽観的に挿入し、サーバー確定後に
    /// サーバーが正とするカート状態を丸ごと受け入れる
    ///
    /// # Returns
    /// * `Ok(LineItemId)` - 確定した明細のID
    /// * `Err(CartError)` - 追加失敗（楽観的に挿入した明細は取り除かれる）
    pub async fn add_item(
        &self,
        gear_id: GearId,
        quantity: u32,
        mode: PurchaseMode,
        window: Option<RentalWindow>,
    ) -> Result<LineItemId, CartError> {
        let correlation_id = Uuid::new_v4();
        self.begin().await;

        if quantity == 0 {
            return self
                .fail(CartError::Validation("数量は1以上である必要があります".to_string()))
                .await;
        }

        // 同じギア・同じモードが既にあれば数量マージ
        let merge_target = {
            let state = self.state.lock().await;
            state
                .cart
                .find_by_gear_and_mode(gear_id, mode)
                .map(|item| (item.id(), item.quantity(), item.rental_window().cloned()))
        };
        if let Some((existing_id, existing_quantity, existing_window)) = merge_target {
            let new_quantity = existing_quantity + quantity;
            let availability = match self
                .oracle
                .check_availability(gear_id, existing_window.as_ref())
                .await
            {
                Ok(availability) => availability,
                Err(e) => return self.fail(e.into()).await,
            };
            let available = if availability.available {
                availability.quantity
            } else {
                0
            };
            if available < new_quantity {
                // 既存の明細には手を付けない
                return self
                    .fail(CartError::InsufficientInventory {
                        requested: new_quantity,
                        available,
                    })
                    .await;
            }
            self.update_item(existing_id, Some(new_quantity), None).await?;
            return Ok(existing_id);
        }

        // 新規明細: カタログ取得と在庫の事前チェック（楽観的変更はまだ適用しない）
        let snapshot = match self.oracle.fetch_item(gear_id).await {
            Ok(snapshot) => snapshot,
            Err(e) => return self.fail(e.into()).await,
        };
        let availability = match self.oracle.check_availability(gear_id, window.as_ref()).await {
            Ok(availability) => availability,
            Err(e) => return self.fail(e.into()).await,
        };
        let available = if availability.available {
            availability.quantity
        } else {
            0
        };
        if available < quantity {
            return self
                .fail(CartError::InsufficientInventory {
                    requested: quantity,
                    available,
                })
                .await;
        }

        let unit_price = match mode {
            PurchaseMode::Purchase => snapshot.price,
            PurchaseMode::Rent => snapshot.rent_price,
        };
        let item = match LineItem::new(
            LineItemId::new(),
            gear_id,
            snapshot,
            quantity,
            mode,
            window,
            unit_price,
        ) {
            Ok(item) => item,
            Err(e) => return self.fail(e.into()).await,
        };
        let temp_id = item.id();

        // 楽観的挿入
        {
            let mut state = self.state.lock().await;
            state.cart.push_line(item.clone());
            state.is_adding_item = true;
            state.updating.insert(temp_id);
        }

        let outcome = self.server.add_item(&item).await;

        let (result, to_save) = {
            let mut state = self.state.lock().await;
            state.is_adding_item = false;
            state.updating.remove(&temp_id);
            state.bump_epoch(temp_id);
            match outcome {
                Ok(canonical) => {
                    // 一時IDの明細はサーバー発行IDの確定版に置き換わる
                    state.cart.replace_lines(canonical);
                    let confirmed_id = state
                        .cart
                        .find_by_gear_and_mode(gear_id, mode)
                        .map(|i| i.id())
                        .unwrap_or(temp_id);
                    state.bump_epoch(confirmed_id);
                    (Ok(confirmed_id), state.cart.snapshot())
                }
                Err(e) => {
                    // 楽観的に挿入した明細だけを取り除く
                    // 追加中に確定した他の明細への変更はそのまま残す
                    state.cart.remove_line(temp_id);
                    let err = CartError::from(e);
                    state.record_error(&err);
                    (Err(err), state.cart.snapshot())
                }
            }
        };
        self.persist(to_save, correlation_id).await;
        result
    }

    /// 明細の数量・レンタル期間を変更する
    ///
    /// 数量0は削除を意味するため、削除に委譲する（数量0の明細は保存されない）
    /// 成功時はサーバーが返すカート状態を丸ごと受け入れる
    /// 失敗時は変更前スナップショットを値のまま復元する
    pub async fn update_item(
        &self,
        id: LineItemId,
        quantity: Option<u32>,
        window: Option<RentalWindow>,
    ) -> Result<(), CartError> {
        if quantity == Some(0) {
            return self.remove_item(id).await;
        }
        let correlation_id = Uuid::new_v4();
        self.begin().await;

        // 楽観的適用（スクラッチコピーに適用してから書き戻し、部分適用を防ぐ）
        let (pre_item, pre_totals, updated) = {
            let mut state = self.state.lock().await;
            if state.in_flight(id) {
                let err =
                    CartError::Validation(format!("明細 {} への操作が進行中です", id));
                state.record_error(&err);
                return Err(err);
            }
            let current = match state.cart.find(id) {
                Some(item) => item.clone(),
                None => {
                    let err = CartError::NotFound(format!("明細が見つかりません: {}", id));
                    state.record_error(&err);
                    return Err(err);
                }
            };
            let pre_totals = *state.cart.totals();
            let mut updated = current.clone();
            if let Some(q) = quantity {
                if let Err(e) = updated.set_quantity(q) {
                    let err = CartError::from(e);
                    state.record_error(&err);
                    return Err(err);
                }
            }
            if let Some(w) = window {
                if let Err(e) = updated.set_rental_window(w) {
                    let err = CartError::from(e);
                    state.record_error(&err);
                    return Err(err);
                }
            }
            state.cart.replace_line(updated.clone());
            state.updating.insert(id);
            (current, pre_totals, updated)
        };

        let outcome = self
            .server
            .update_item(id, updated.quantity(), updated.rental_window().cloned())
            .await;

        let (result, to_save) = {
            let mut state = self.state.lock().await;
            state.updating.remove(&id);
            state.bump_epoch(id);
            match outcome {
                Ok(canonical) => {
                    state.cart.replace_lines(canonical);
                    (Ok(()), state.cart.snapshot())
                }
                Err(e) => {
                    state.cart.restore_line(pre_item, pre_totals);
                    let err = CartError::from(e);
                    state.record_error(&err);
                    (Err(err), state.cart.snapshot())
                }
            }
        };
        self.persist(to_save, correlation_id).await;
        result
    }

    /// 明細を削除する
    ///
    /// 楽観的に取り除いてからサーバーに削除を依頼する
    /// 失敗時は削除前の明細リスト全体を値のまま復元する
    pub async fn remove_item(&self, id: LineItemId) -> Result<(), CartError> {
        let correlation_id = Uuid::new_v4();
        self.begin().await;

        let (pre_lines, pre_totals) = {
            let mut state = self.state.lock().await;
            if state.in_flight(id) {
                let err =
                    CartError::Validation(format!("明細 {} への操作が進行中です", id));
                state.record_error(&err);
                return Err(err);
            }
            if state.cart.find(id).is_none() {
                let err = CartError::NotFound(format!("明細が見つかりません: {}", id));
                state.record_error(&err);
                return Err(err);
            }
            let pre_lines = state.cart.line_items().to_vec();
            let pre_totals = *state.cart.totals();
            state.cart.remove_line(id);
            state.removing.insert(id);
            (pre_lines, pre_totals)
        };

        let outcome = self.server.remove_item(id).await;

        let (result, to_save) = {
            let mut state = self.state.lock().await;
            state.removing.remove(&id);
            state.bump_epoch(id);
            match outcome {
                Ok(canonical) => {
                    state.cart.replace_lines(canonical);
                    // 明細と一緒にその衝突情報も消す
                    state.cart.take_conflict(id);
                    (Ok(()), state.cart.snapshot())
                }
                Err(e) => {
                    state.cart.restore(pre_lines, pre_totals);
                    let err = CartError::from(e);
                    state.record_error(&err);
                    (Err(err), state.cart.snapshot())
                }
            }
        };
        self.persist(to_save, correlation_id).await;
        result
    }

    /// カートを空にする
    ///
    /// 破壊的操作のため楽観的ステップはない
    /// サーバーのクリアが成功した場合のみローカル状態をリセットする
    pub async fn clear_cart(&self) -> Result<(), CartError> {
        let correlation_id = Uuid::new_v4();
        self.begin().await;

        if let Err(e) = self.server.clear().await {
            return self.fail(e.into()).await;
        }

        let to_save = {
            let mut state = self.state.lock().await;
            let ids: Vec<LineItemId> = state.cart.line_items().iter().map(|i| i.id()).collect();
            for id in ids {
                state.bump_epoch(id);
            }
            state.cart.clear_lines();
            state.cart.snapshot()
        };
        self.persist(to_save, correlation_id).await;
        Ok(())
    }

    /// 全明細を在庫オラクルと照合し、衝突情報を更新する
    ///
    /// この操作は明細と集計値を一切変更せず、衝突情報だけを更新する
    /// 照合中に変更が確定した明細については、変更前のデータに基づく
    /// 古い照合結果を破棄する（照合開始時のエポックと比較する）
    pub async fn reconcile_inventory(&self) {
        let correlation_id = Uuid::new_v4();
        self.begin().await;

        let (items, start_epoch) = {
            let mut state = self.state.lock().await;
            if state.cart.is_empty() {
                state.cart.set_conflicts(HashMap::new());
                state.cart.mark_reconciled(Utc::now());
                return;
            }
            state.is_validating_inventory = true;
            (state.cart.line_items().to_vec(), state.epoch_counter)
        };

        let detection = self.detector.detect(&items).await;

        let mut state = self.state.lock().await;
        let mut conflicts = HashMap::new();
        for conflict in detection.conflicts {
            let id = conflict.line_item_id;
            if state.cart.find(id).is_none() {
                continue;
            }
            if state.epoch_of(id) > start_epoch {
                // 照合開始後に変更された明細の結果は古いデータに基づくため捨てる
                let mut context = HashMap::new();
                context.insert("line_item_id".to_string(), id.to_string());
                self.logger.debug(
                    "CartService",
                    "照合中に変更された明細の古い照合結果を破棄します",
                    Some(correlation_id),
                    Some(context),
                );
                continue;
            }
            conflicts.insert(id, conflict);
        }
        state.cart.set_conflicts(conflicts);
        state.cart.mark_reconciled(Utc::now());
        state.is_validating_inventory = false;
    }

    /// 衝突をユーザーの選択に従って解決する
    ///
    /// - `Remove`: 明細を削除する
    /// - `Reduce`: 数量を在庫数まで減らす（在庫0なら削除する）
    /// - `Keep`: 明細はそのまま、ユーザーがリスクを受け入れる
    ///
    /// 事後条件: どの分岐でも該当の衝突エントリは削除されている
    pub async fn resolve_conflict(
        &self,
        id: LineItemId,
        action: ResolutionAction,
    ) -> Result<(), CartError> {
        self.begin().await;
        let conflict = {
            let mut state = self.state.lock().await;
            match state.cart.take_conflict(id) {
                Some(conflict) => conflict,
                None => {
                    let err = CartError::NotFound(format!("衝突が見つかりません: {}", id));
                    state.record_error(&err);
                    return Err(err);
                }
            }
        };
        match action {
            ResolutionAction::Keep => Ok(()),
            ResolutionAction::Remove => self.remove_item(id).await,
            ResolutionAction::Reduce => {
                if conflict.available_quantity == 0 {
                    self.remove_item(id).await
                } else {
                    self.update_item(id, Some(conflict.available_quantity), None)
                        .await
                }
            }
        }
    }

    /// 全明細のカタログスナップショットを再取得する
    ///
    /// 価格・在庫フラグの変化を変更エントリとして記録し、
    /// キャッシュ済みスナップショットを更新してから照合を実行する
    /// 衝突に至らない価格・在庫のドリフトも呼び出し側に通知できる
    ///
    /// # Returns
    /// * 検出された変更エントリのリスト
    pub async fn refresh_inventory(&self) -> Vec<SnapshotChange> {
        let correlation_id = Uuid::new_v4();
        let items = {
            let state = self.state.lock().await;
            state.cart.line_items().to_vec()
        };

        let mut changes = Vec::new();
        let mut updated_snapshots: Vec<(LineItemId, GearSnapshot)> = Vec::new();
        for item in &items {
            let fresh = match self.oracle.fetch_item(item.gear_id()).await {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    let mut context = HashMap::new();
                    context.insert("gear_id".to_string(), item.gear_id().to_string());
                    context.insert("error".to_string(), e.to_string());
                    self.logger.warn(
                        "CartService",
                        "カタログ再取得に失敗したため明細をスキップします",
                        Some(correlation_id),
                        Some(context),
                    );
                    continue;
                }
            };
            let cached = item.snapshot();
            if cached == &fresh {
                continue;
            }
            if cached.price != fresh.price {
                changes.push(SnapshotChange {
                    line_item_id: item.id(),
                    field: "price".to_string(),
                    old_value: cached.price.to_string(),
                    new_value: fresh.price.to_string(),
                });
            }
            if cached.rent_price != fresh.rent_price {
                changes.push(SnapshotChange {
                    line_item_id: item.id(),
                    field: "rent_price".to_string(),
                    old_value: cached.rent_price.to_string(),
                    new_value: fresh.rent_price.to_string(),
                });
            }
            if cached.in_stock != fresh.in_stock {
                changes.push(SnapshotChange {
                    line_item_id: item.id(),
                    field: "in_stock".to_string(),
                    old_value: cached.in_stock.to_string(),
                    new_value: fresh.in_stock.to_string(),
                });
            }
            updated_snapshots.push((item.id(), fresh));
        }

        {
            let mut state = self.state.lock().await;
            for (id, snapshot) in updated_snapshots {
                // 再取得の間に削除された明細はそのままスキップされる
                state.cart.set_snapshot_for(id, snapshot);
            }
        }

        self.reconcile_inventory().await;
        changes
    }

    /// カートが鮮度切れで再照合が必要かどうかを判定する
    ///
    /// 追加からも最終照合からも閾値以上経過した明細がある場合に真を返す
    /// 再照合の実行タイミングは呼び出し側の責務（内部タイマーは持たない）
    pub async fn needs_reconciliation(&self, max_age: Duration) -> bool {
        let state = self.state.lock().await;
        if state.cart.is_empty() {
            return false;
        }
        let now = Utc::now();
        let reconcile_stale = state
            .cart
            .last_reconciled_at()
            .map_or(true, |at| now - at >= max_age);
        let item_stale = state
            .cart
            .line_items()
            .iter()
            .any(|item| now - item.added_at() >= max_age);
        reconcile_stale && item_stale
    }

    // ---- 読み取りアクセサ ----

    /// 明細リストを取得
    pub async fn line_items(&self) -> Vec<LineItem> {
        self.state.lock().await.cart.line_items().to_vec()
    }

    /// 集計値を取得
    pub async fn totals(&self) -> CartTotals {
        *self.state.lock().await.cart.totals()
    }

    /// 衝突情報を取得
    pub async fn conflicts(&self) -> HashMap<LineItemId, Conflict> {
        self.state.lock().await.cart.conflicts().clone()
    }

    /// 最後に照合が成功した日時を取得
    pub async fn last_reconciled_at(&self) -> Option<DateTime<Utc>> {
        self.state.lock().await.cart.last_reconciled_at()
    }

    /// 直近の失敗メッセージを取得
    pub async fn last_error(&self) -> Option<String> {
        self.state.lock().await.last_error.clone()
    }

    /// カート全体の読み込み中かどうか
    pub async fn is_loading(&self) -> bool {
        self.state.lock().await.is_loading
    }

    /// 明細追加が進行中かどうか
    pub async fn is_adding_item(&self) -> bool {
        self.state.lock().await.is_adding_item
    }

    /// 指定明細の更新が進行中かどうか
    pub async fn is_updating_item(&self, id: LineItemId) -> bool {
        self.state.lock().await.updating.contains(&id)
    }

    /// 指定明細の削除が進行中かどうか
    pub async fn is_removing_item(&self, id: LineItemId) -> bool {
        self.state.lock().await.removing.contains(&id)
    }

    /// 在庫照合が進行中かどうか
    pub async fn is_validating_inventory(&self) -> bool {
        self.state.lock().await.is_validating_inventory
    }

    // ---- 内部ヘルパー ----

    /// 新しい操作の開始: 前回の失敗メッセージをクリアする
    async fn begin(&self) {
        self.state.lock().await.last_error = None;
    }

    /// 状態変更前の失敗: エラーを記録して返す
    async fn fail<T>(&self, err: CartError) -> Result<T, CartError> {
        self.state.lock().await.record_error(&err);
        Err(err)
    }

    /// スナップショットを保存する
    /// 永続化はベストエフォート。失敗は警告ログに残すだけで、
    /// カートの変更をロールバックすることはない
    async fn persist(&self, snapshot: CartSnapshot, correlation_id: Uuid) {
        if let Err(e) = self.store.save(&snapshot).await {
            let mut context = HashMap::new();
            context.insert("error".to_string(), e.to_string());
            self.logger.warn(
                "CartService",
                "スナップショットの保存に失敗しました",
                Some(correlation_id),
                Some(context),
            );
        }
    }
}
