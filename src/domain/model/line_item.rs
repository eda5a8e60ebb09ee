use crate::domain::error::DomainError;
use crate::domain::model::{GearId, GearSnapshot, LineItemId, Money, PurchaseMode, RentalWindow};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// カート明細
/// 1つのギアを1つのモード（レンタル/購入）である数量だけ持つエントリ
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    id: LineItemId,
    gear_id: GearId,
    snapshot: GearSnapshot,
    quantity: u32,
    mode: PurchaseMode,
    rental_window: Option<RentalWindow>,
    unit_price: Money,
    added_at: DateTime<Utc>,
}

impl LineItem {
    /// 新しいカート明細を作成
    /// バリデーション:
    /// - 数量は1以上
    /// - レンタルモードはレンタル期間が必須
    /// - 購入モードはレンタル期間を持てない
    pub fn new(
        id: LineItemId,
        gear_id: GearId,
        snapshot: GearSnapshot,
        quantity: u32,
        mode: PurchaseMode,
        rental_window: Option<RentalWindow>,
        unit_price: Money,
    ) -> Result<Self, DomainError> {
        if quantity == 0 {
            return Err(DomainError::InvalidQuantity);
        }
        match mode {
            PurchaseMode::Rent => {
                if rental_window.is_none() {
                    return Err(DomainError::MissingRentalWindow);
                }
            }
            PurchaseMode::Purchase => {
                if rental_window.is_some() {
                    return Err(DomainError::InvalidValue(
                        "購入モードの明細はレンタル期間を持てません".to_string(),
                    ));
                }
            }
        }
        Ok(Self {
            id,
            gear_id,
            snapshot,
            quantity,
            mode,
            rental_window,
            unit_price,
            added_at: Utc::now(),
        })
    }

    /// 明細IDを取得
    pub fn id(&self) -> LineItemId {
        self.id
    }

    /// ギアIDを取得
    pub fn gear_id(&self) -> GearId {
        self.gear_id
    }

    /// カタログスナップショットを取得
    pub fn snapshot(&self) -> &GearSnapshot {
        &self.snapshot
    }

    /// 数量を取得
    pub fn quantity(&self) -> u32 {
        self.quantity
    }

    /// モードを取得
    pub fn mode(&self) -> PurchaseMode {
        self.mode
    }

    /// レンタル期間を取得
    pub fn rental_window(&self) -> Option<&RentalWindow> {
        self.rental_window.as_ref()
    }

    /// 単価を取得（追加時点で確定した価格）
    pub fn unit_price(&self) -> Money {
        self.unit_price
    }

    /// 追加日時を取得（鮮度判定に使用）
    pub fn added_at(&self) -> DateTime<Utc> {
        self.added_at
    }

    /// 数量を変更する
    /// 数量0は削除を意味するため明細には保存できない
    pub fn set_quantity(&mut self, quantity: u32) -> Result<(), DomainError> {
        if quantity == 0 {
            return Err(DomainError::InvalidQuantity);
        }
        self.quantity = quantity;
        Ok(())
    }

    /// レンタル期間を変更する（レンタルモードのみ）
    pub fn set_rental_window(&mut self, window: RentalWindow) -> Result<(), DomainError> {
        if self.mode != PurchaseMode::Rent {
            return Err(DomainError::InvalidValue(
                "購入モードの明細にはレンタル期間を設定できません".to_string(),
            ));
        }
        self.rental_window = Some(window);
        Ok(())
    }

    /// カタログスナップショットを最新の情報に置き換える
    /// 単価は追加時点のものを保持し続ける
    pub fn set_snapshot(&mut self, snapshot: GearSnapshot) {
        self.snapshot = snapshot;
    }

    /// 明細合計を計算（常に導出値、保存はしない）
    /// 購入: 単価 × 数量 / レンタル: 単価 × 数量 × レンタル日数
    pub fn line_total(&self) -> Result<Money, DomainError> {
        match self.mode {
            PurchaseMode::Purchase => Ok(self.unit_price.multiply(self.quantity)),
            PurchaseMode::Rent => {
                let window = self
                    .rental_window
                    .as_ref()
                    .ok_or(DomainError::MissingRentalWindow)?;
                Ok(self
                    .unit_price
                    .multiply(self.quantity)
                    .multiply(window.duration_days()))
            }
        }
    }
}
