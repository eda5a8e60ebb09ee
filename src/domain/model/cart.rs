use crate::domain::model::{
    Conflict, Currency, GearId, GearSnapshot, LineItem, LineItemId, Money, PricingPolicy,
    PurchaseMode,
};
use crate::domain::pricing;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// カート全体の集計値
/// 常に明細から導出され、単独で書き換えられることはない
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CartTotals {
    /// 小計
    pub subtotal: Money,
    /// 税額
    pub tax: Money,
    /// 送料
    pub shipping: Money,
    /// 合計金額
    pub grand_total: Money,
    /// 商品点数（数量の合計）
    pub item_count: u32,
}

impl CartTotals {
    /// すべてゼロの集計値を作成（空のカート用）
    pub fn zero(currency: Currency) -> Self {
        Self {
            subtotal: Money::zero(currency),
            tax: Money::zero(currency),
            shipping: Money::zero(currency),
            grand_total: Money::zero(currency),
            item_count: 0,
        }
    }
}

/// 永続化用のカートスナップショット
/// 明細・集計値・通貨のみを含み、一時的なフラグや衝突情報は含まない
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartSnapshot {
    /// カート明細
    pub line_items: Vec<LineItem>,
    /// 集計値
    pub totals: CartTotals,
    /// 通貨
    pub currency: Currency,
}

/// 在庫リフレッシュで検出された価格・在庫フラグの変化
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotChange {
    /// 対象の明細ID
    pub line_item_id: LineItemId,
    /// 変化したフィールド名
    pub field: String,
    /// 変更前の値
    pub old_value: String,
    /// 変更後の値
    pub new_value: String,
}

/// カート集約
/// 明細リスト・導出された集計値・衝突情報を一元管理する
/// 外部からの読み書きはすべて集約のメソッドを経由する
#[derive(Debug, Clone)]
pub struct Cart {
    line_items: Vec<LineItem>,
    totals: CartTotals,
    conflicts: HashMap<LineItemId, Conflict>,
    last_reconciled_at: Option<DateTime<Utc>>,
    policy: PricingPolicy,
}

impl Cart {
    /// 新しい空のカートを作成
    pub fn new(policy: PricingPolicy) -> Self {
        let totals = CartTotals::zero(policy.currency());
        Self {
            line_items: Vec::new(),
            totals,
            conflicts: HashMap::new(),
            last_reconciled_at: None,
            policy,
        }
    }

    /// 永続化スナップショットからカートを再構築
    /// 集計値は保存された値を信用せず再計算する
    pub fn from_snapshot(snapshot: CartSnapshot, policy: PricingPolicy) -> Self {
        let mut cart = Self::new(policy);
        cart.line_items = snapshot.line_items;
        cart.recompute_totals();
        cart
    }

    /// 明細リストを取得（表示順 = 挿入順）
    pub fn line_items(&self) -> &[LineItem] {
        &self.line_items
    }

    /// 集計値を取得
    pub fn totals(&self) -> &CartTotals {
        &self.totals
    }

    /// 価格計算ポリシーを取得
    pub fn policy(&self) -> &PricingPolicy {
        &self.policy
    }

    /// 衝突情報を取得
    pub fn conflicts(&self) -> &HashMap<LineItemId, Conflict> {
        &self.conflicts
    }

    /// 最後に照合が成功した日時を取得
    pub fn last_reconciled_at(&self) -> Option<DateTime<Utc>> {
        self.last_reconciled_at
    }

    /// カートが空かどうか
    pub fn is_empty(&self) -> bool {
        self.line_items.is_empty()
    }

    /// 明細IDで明細を検索
    pub fn find(&self, id: LineItemId) -> Option<&LineItem> {
        self.line_items.iter().find(|item| item.id() == id)
    }

    /// 同じギア・同じモードの既存明細を検索（追加時のマージ判定用）
    pub fn find_by_gear_and_mode(&self, gear_id: GearId, mode: PurchaseMode) -> Option<&LineItem> {
        self.line_items
            .iter()
            .find(|item| item.gear_id() == gear_id && item.mode() == mode)
    }

    /// 明細を末尾に追加し、集計値を再計算
    pub fn push_line(&mut self, item: LineItem) {
        self.line_items.push(item);
        self.recompute_totals();
    }

    /// 指定IDの明細を置き換え、集計値を再計算
    pub fn replace_line(&mut self, item: LineItem) {
        if let Some(slot) = self.line_items.iter_mut().find(|i| i.id() == item.id()) {
            *slot = item;
        }
        self.recompute_totals();
    }

    /// 指定IDの明細を削除し、集計値を再計算
    /// 削除された明細を返す
    pub fn remove_line(&mut self, id: LineItemId) -> Option<LineItem> {
        let position = self.line_items.iter().position(|item| item.id() == id);
        let removed = position.map(|pos| self.line_items.remove(pos));
        self.recompute_totals();
        removed
    }

    /// 明細リスト全体をサーバー確定版に置き換え、集計値を再計算
    /// サーバーが正とするカート状態をそのまま受け入れる
    pub fn replace_lines(&mut self, line_items: Vec<LineItem>) {
        self.line_items = line_items;
        self.recompute_totals();
    }

    /// 変更前スナップショットを値のまま復元する（ロールバック専用）
    /// 集計値も保存時の値をそのまま戻し、再計算はしない
    pub fn restore(&mut self, line_items: Vec<LineItem>, totals: CartTotals) {
        self.line_items = line_items;
        self.totals = totals;
    }

    /// 単一明細の変更前スナップショットを復元する（ロールバック専用）
    pub fn restore_line(&mut self, item: LineItem, totals: CartTotals) {
        if let Some(slot) = self.line_items.iter_mut().find(|i| i.id() == item.id()) {
            *slot = item;
        }
        self.totals = totals;
    }

    /// 指定IDの明細のカタログスナップショットを更新
    /// 単価・集計値には影響しない
    pub fn set_snapshot_for(&mut self, id: LineItemId, snapshot: GearSnapshot) {
        if let Some(item) = self.line_items.iter_mut().find(|i| i.id() == id) {
            item.set_snapshot(snapshot);
        }
    }

    /// すべての明細を削除して空のカートに戻す
    /// カート自体の同一性は保たれる
    pub fn clear_lines(&mut self) {
        self.line_items.clear();
        self.conflicts.clear();
        self.totals = CartTotals::zero(self.policy.currency());
    }

    /// 衝突情報を丸ごと置き換える（照合パスからのみ呼ばれる）
    pub fn set_conflicts(&mut self, conflicts: HashMap<LineItemId, Conflict>) {
        self.conflicts = conflicts;
    }

    /// 指定IDの衝突情報を取り出して削除
    pub fn take_conflict(&mut self, id: LineItemId) -> Option<Conflict> {
        self.conflicts.remove(&id)
    }

    /// 照合成功を記録
    pub fn mark_reconciled(&mut self, at: DateTime<Utc>) {
        self.last_reconciled_at = Some(at);
    }

    /// 集計値を明細から再計算する
    /// 明細の変更後は必ず呼ばれ、集計値が明細と乖離しないことを保証する
    fn recompute_totals(&mut self) {
        // 明細の構築時バリデーションにより計算は失敗しない
        self.totals = pricing::cart_totals(&self.line_items, &self.policy)
            .unwrap_or_else(|_| CartTotals::zero(self.policy.currency()));
    }

    /// 永続化用スナップショットを作成（値コピー、生きた参照は渡さない）
    pub fn snapshot(&self) -> CartSnapshot {
        CartSnapshot {
            line_items: self.line_items.clone(),
            totals: self.totals,
            currency: self.policy.currency(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn purchase_item(price_cents: i64, quantity: u32) -> LineItem {
        let snapshot = GearSnapshot::new(
            "ランタン".to_string(),
            Money::usd(price_cents),
            Money::usd(500),
            true,
        );
        LineItem::new(
            LineItemId::new(),
            GearId::new(),
            snapshot,
            quantity,
            PurchaseMode::Purchase,
            None,
            Money::usd(price_cents),
        )
        .unwrap()
    }

    #[test]
    fn test_new_cart_is_empty_with_zero_totals() {
        let cart = Cart::new(PricingPolicy::default());
        assert!(cart.is_empty());
        assert_eq!(cart.totals().subtotal.cents(), 0);
        assert_eq!(cart.totals().grand_total.cents(), 0);
        assert_eq!(cart.totals().item_count, 0);
        assert!(cart.last_reconciled_at().is_none());
    }

    #[test]
    fn test_push_line_recomputes_totals() {
        let mut cart = Cart::new(PricingPolicy::default());
        cart.push_line(purchase_item(5_000, 2));

        assert_eq!(cart.totals().subtotal.cents(), 10_000);
        assert_eq!(cart.totals().item_count, 2);
    }

    #[test]
    fn test_remove_line_returns_removed_item() {
        let mut cart = Cart::new(PricingPolicy::default());
        let item = purchase_item(5_000, 1);
        let id = item.id();
        cart.push_line(item);

        let removed = cart.remove_line(id);
        assert!(removed.is_some());
        assert!(cart.is_empty());
        assert_eq!(cart.totals().subtotal.cents(), 0);
    }

    #[test]
    fn test_restore_line_rolls_back_mutation() {
        let mut cart = Cart::new(PricingPolicy::default());
        let item = purchase_item(5_000, 1);
        let id = item.id();
        cart.push_line(item);

        let pre_item = cart.find(id).unwrap().clone();
        let pre_totals = *cart.totals();

        // 楽観的変更
        let mut mutated = pre_item.clone();
        mutated.set_quantity(4).unwrap();
        cart.replace_line(mutated);
        assert_eq!(cart.totals().item_count, 4);

        // ロールバック（値のまま復元）
        cart.restore_line(pre_item, pre_totals);
        assert_eq!(cart.totals().item_count, 1);
        assert_eq!(cart.totals().subtotal.cents(), 5_000);
    }

    #[test]
    fn test_restore_rolls_back_removal() {
        let mut cart = Cart::new(PricingPolicy::default());
        let item = purchase_item(5_000, 1);
        let id = item.id();
        cart.push_line(item);

        let pre_lines = cart.line_items().to_vec();
        let pre_totals = *cart.totals();

        cart.remove_line(id);
        assert!(cart.is_empty());

        cart.restore(pre_lines, pre_totals);
        assert_eq!(cart.line_items().len(), 1);
        assert_eq!(cart.totals().subtotal.cents(), 5_000);
    }

    #[test]
    fn test_clear_lines_resets_items_and_conflicts() {
        let mut cart = Cart::new(PricingPolicy::default());
        let item = purchase_item(5_000, 1);
        let id = item.id();
        cart.push_line(item);

        let mut conflicts = HashMap::new();
        conflicts.insert(id, Conflict::out_of_stock(id, 1, "ランタン"));
        cart.set_conflicts(conflicts);

        cart.clear_lines();
        assert!(cart.is_empty());
        assert!(cart.conflicts().is_empty());
        assert_eq!(cart.totals().grand_total.cents(), 0);
    }

    #[test]
    fn test_find_by_gear_and_mode() {
        let mut cart = Cart::new(PricingPolicy::default());
        let item = purchase_item(5_000, 1);
        let gear_id = item.gear_id();
        cart.push_line(item);

        assert!(cart
            .find_by_gear_and_mode(gear_id, PurchaseMode::Purchase)
            .is_some());
        assert!(cart
            .find_by_gear_and_mode(gear_id, PurchaseMode::Rent)
            .is_none());
        assert!(cart
            .find_by_gear_and_mode(GearId::new(), PurchaseMode::Purchase)
            .is_none());
    }

    #[test]
    fn test_from_snapshot_recomputes_totals() {
        let mut cart = Cart::new(PricingPolicy::default());
        cart.push_line(purchase_item(20_000, 1));
        let mut snapshot = cart.snapshot();

        // 保存されていた集計値が壊れていても再計算で正しくなる
        snapshot.totals.subtotal = Money::usd(1);

        let restored = Cart::from_snapshot(snapshot, PricingPolicy::default());
        assert_eq!(restored.totals().subtotal.cents(), 20_000);
    }

    #[test]
    fn test_snapshot_excludes_conflicts() {
        let mut cart = Cart::new(PricingPolicy::default());
        let item = purchase_item(5_000, 1);
        let id = item.id();
        cart.push_line(item);

        let mut conflicts = HashMap::new();
        conflicts.insert(id, Conflict::out_of_stock(id, 1, "ランタン"));
        cart.set_conflicts(conflicts);

        let snapshot = cart.snapshot();
        assert_eq!(snapshot.line_items.len(), 1);
        // スナップショットは明細・集計値・通貨のみを持つ
        let restored = Cart::from_snapshot(snapshot, PricingPolicy::default());
        assert!(restored.conflicts().is_empty());
    }

    #[test]
    fn test_take_conflict() {
        let mut cart = Cart::new(PricingPolicy::default());
        let id = LineItemId::new();
        let mut conflicts = HashMap::new();
        conflicts.insert(id, Conflict::out_of_stock(id, 1, "ランタン"));
        cart.set_conflicts(conflicts);

        assert!(cart.take_conflict(id).is_some());
        assert!(cart.take_conflict(id).is_none());
    }
}
