use crate::domain::error::DomainError;
use crate::domain::model::LineItemId;
use chrono::NaiveDate;

use std::fmt;

/// 在庫衝突の種別
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictKind {
    /// 在庫切れ
    OutOfStock,
    /// 要求数量に対して在庫不足
    InsufficientQuantity,
    /// 希望するレンタル期間が利用不可
    DatesUnavailable,
}

impl fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind_str = match self {
            ConflictKind::OutOfStock => "out_of_stock",
            ConflictKind::InsufficientQuantity => "insufficient_quantity",
            ConflictKind::DatesUnavailable => "dates_unavailable",
        };
        write!(f, "{}", kind_str)
    }
}

/// 衝突に対する推奨アクション
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuggestedAction {
    /// 明細を削除する
    Remove,
    /// 数量を在庫数まで減らす
    ReduceQuantity,
    /// レンタル期間を変更する
    ChangeDates,
}

impl fmt::Display for SuggestedAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let action_str = match self {
            SuggestedAction::Remove => "remove",
            SuggestedAction::ReduceQuantity => "reduce_quantity",
            SuggestedAction::ChangeDates => "change_dates",
        };
        write!(f, "{}", action_str)
    }
}

/// ユーザーが衝突解決時に選ぶアクション
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionAction {
    /// 明細を削除する
    Remove,
    /// 数量を在庫数まで減らす（在庫0なら削除）
    Reduce,
    /// リスクを受け入れてそのまま維持する
    Keep,
}

impl ResolutionAction {
    /// 文字列からResolutionActionを作成
    pub fn from_string(s: &str) -> Result<Self, DomainError> {
        match s {
            "remove" => Ok(ResolutionAction::Remove),
            "reduce" => Ok(ResolutionAction::Reduce),
            "keep" => Ok(ResolutionAction::Keep),
            _ => Err(DomainError::InvalidValue(format!(
                "無効な解決アクション: {}",
                s
            ))),
        }
    }
}

/// 検出された在庫衝突
/// 要求と実際の在庫・期間のミスマッチを表すデータであり、例外ではない
#[derive(Debug, Clone, PartialEq)]
pub struct Conflict {
    /// 対象の明細ID
    pub line_item_id: LineItemId,
    /// 衝突の種別
    pub kind: ConflictKind,
    /// 要求していた数量
    pub requested_quantity: u32,
    /// 実際に利用可能な数量
    pub available_quantity: u32,
    /// 推奨アクション
    pub suggested_action: SuggestedAction,
    /// ユーザー向けメッセージ
    pub message: String,
}

impl Conflict {
    /// 在庫切れの衝突を作成
    pub fn out_of_stock(line_item_id: LineItemId, requested_quantity: u32, title: &str) -> Self {
        Self {
            line_item_id,
            kind: ConflictKind::OutOfStock,
            requested_quantity,
            available_quantity: 0,
            suggested_action: SuggestedAction::Remove,
            message: format!("「{}」は在庫切れです", title),
        }
    }

    /// 在庫不足の衝突を作成
    pub fn insufficient_quantity(
        line_item_id: LineItemId,
        requested_quantity: u32,
        available_quantity: u32,
        title: &str,
    ) -> Self {
        Self {
            line_item_id,
            kind: ConflictKind::InsufficientQuantity,
            requested_quantity,
            available_quantity,
            suggested_action: SuggestedAction::ReduceQuantity,
            message: format!(
                "「{}」の在庫は{}点のみです（要求: {}点）",
                title, available_quantity, requested_quantity
            ),
        }
    }

    /// レンタル期間利用不可の衝突を作成
    pub fn dates_unavailable(
        line_item_id: LineItemId,
        requested_quantity: u32,
        available_quantity: u32,
        next_available: NaiveDate,
        title: &str,
    ) -> Self {
        Self {
            line_item_id,
            kind: ConflictKind::DatesUnavailable,
            requested_quantity,
            available_quantity,
            suggested_action: SuggestedAction::ChangeDates,
            message: format!(
                "「{}」は希望期間に利用できません（次回利用可能日: {}）",
                title, next_available
            ),
        }
    }
}
