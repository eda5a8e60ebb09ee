// 価格計算機
// 純粋関数のみで構成し、I/Oや状態を持たない

use crate::domain::error::DomainError;
use crate::domain::model::{CartTotals, LineItem, Money, PricingPolicy};

/// 明細合計を計算
/// 購入: 単価 × 数量 / レンタル: 単価 × 数量 × レンタル日数（両端を含む）
pub fn line_total(item: &LineItem) -> Result<Money, DomainError> {
    item.line_total()
}

/// カート全体の集計値を計算
/// - 小計 = 全明細合計の和
/// - 税額 = 小計 × 税率（ここで一度だけ四捨五入する）
/// - 送料 = 小計が閾値以上なら0、未満なら固定送料
/// - 合計 = 小計 + 税額 + 送料
/// 空の明細リストはエラーではなく、すべてゼロの集計値を返す
pub fn cart_totals(line_items: &[LineItem], policy: &PricingPolicy) -> Result<CartTotals, DomainError> {
    if line_items.is_empty() {
        return Ok(CartTotals::zero(policy.currency()));
    }

    let mut subtotal = Money::zero(policy.currency());
    let mut item_count: u32 = 0;
    for item in line_items {
        subtotal = subtotal.add(&line_total(item)?)?;
        item_count += item.quantity();
    }

    let tax = subtotal.scale_rounded(policy.tax_rate);

    let shipping = if subtotal.cents() >= policy.free_shipping_threshold.cents() {
        Money::zero(policy.currency())
    } else {
        policy.flat_shipping_fee
    };

    let grand_total = subtotal.add(&tax)?.add(&shipping)?;

    Ok(CartTotals {
        subtotal,
        tax,
        shipping,
        grand_total,
        item_count,
    })
}
