use crate::domain::error::DomainError;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use std::fmt;

/// カート明細の一意識別子
/// 楽観的追加時はクライアント側で生成され、サーバー確定時に置き換えられる
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LineItemId(Uuid);

impl LineItemId {
    /// 新しい一意のLineItemIdを生成
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// UUIDから LineItemId を作成
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// 文字列からLineItemIdを作成
    pub fn from_string(s: &str) -> Result<Self, uuid::Error> {
        let uuid = Uuid::parse_str(s)?;
        Ok(Self(uuid))
    }

    /// 内部のUUIDを取得
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for LineItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Default for LineItemId {
    fn default() -> Self {
        Self::new()
    }
}

/// カタログ上のギア（商品）の一意識別子
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GearId(Uuid);

impl GearId {
    /// 新しい一意のGearIdを生成
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// UUIDから GearId を作成
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// 文字列からGearIdを作成
    pub fn from_string(s: &str) -> Result<Self, uuid::Error> {
        let uuid = Uuid::parse_str(s)?;
        Ok(Self(uuid))
    }

    /// 内部のUUIDを取得
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for GearId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Default for GearId {
    fn default() -> Self {
        Self::new()
    }
}

/// 通貨
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Currency {
    /// 米ドル
    #[allow(clippy::upper_case_acronyms)]
    USD,
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Currency::USD => write!(f, "USD"),
        }
    }
}

/// 金額を表す値オブジェクト
/// 精度を保つためセント単位の整数で保持する
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money {
    cents: i64,
    currency: Currency,
}

impl Money {
    /// セント単位の金額と通貨文字列から作成
    pub fn new(cents: i64, currency: String) -> Result<Self, DomainError> {
        let currency = match currency.as_str() {
            "USD" => Currency::USD,
            _ => {
                return Err(DomainError::InvalidValue(format!(
                    "サポートされていない通貨: {}",
                    currency
                )))
            }
        };
        Ok(Self { cents, currency })
    }

    /// 米ドルの金額をセント単位で作成
    pub fn usd(cents: i64) -> Self {
        Self {
            cents,
            currency: Currency::USD,
        }
    }

    /// 指定通貨のゼロ金額を作成
    pub fn zero(currency: Currency) -> Self {
        Self { cents: 0, currency }
    }

    /// セント単位の金額を取得
    pub fn cents(&self) -> i64 {
        self.cents
    }

    /// 通貨を取得
    pub fn currency(&self) -> Currency {
        self.currency
    }

    /// 金額を加算
    pub fn add(&self, other: &Money) -> Result<Money, DomainError> {
        if self.currency != other.currency {
            return Err(DomainError::CurrencyMismatch);
        }
        Ok(Money {
            cents: self.cents + other.cents,
            currency: self.currency,
        })
    }

    /// 金額を乗算
    pub fn multiply(&self, factor: u32) -> Money {
        Money {
            cents: self.cents * factor as i64,
            currency: self.currency,
        }
    }

    /// 税率などの係数を掛け、四捨五入（round-half-up）でセントに丸める
    /// 丸めは出力時のこの一点でのみ行う
    pub fn scale_rounded(&self, factor: f64) -> Money {
        let scaled = self.cents as f64 * factor;
        Money {
            cents: (scaled + 0.5).floor() as i64,
            currency: self.currency,
        }
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${}.{:02}", self.cents / 100, (self.cents % 100).abs())
    }
}

/// 明細のモード（レンタル / 購入）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PurchaseMode {
    /// レンタル（日割り課金）
    Rent,
    /// 購入
    Purchase,
}

impl fmt::Display for PurchaseMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mode_str = match self {
            PurchaseMode::Rent => "rent",
            PurchaseMode::Purchase => "purchase",
        };
        write!(f, "{}", mode_str)
    }
}

impl PurchaseMode {
    /// 文字列からPurchaseModeを作成
    pub fn from_string(s: &str) -> Result<Self, DomainError> {
        match s {
            "rent" => Ok(PurchaseMode::Rent),
            "purchase" => Ok(PurchaseMode::Purchase),
            _ => Err(DomainError::InvalidValue(format!(
                "無効なモード: {}",
                s
            ))),
        }
    }
}

/// レンタル期間を表す値オブジェクト
/// 日数は両端を含む（inclusive）で数える
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RentalWindow {
    start_date: NaiveDate,
    end_date: NaiveDate,
}

impl RentalWindow {
    /// 新しいレンタル期間を作成
    /// バリデーション:
    /// - 終了日は開始日以降である必要がある（逆転はエラー、丸めない）
    pub fn new(start_date: NaiveDate, end_date: NaiveDate) -> Result<Self, DomainError> {
        if end_date < start_date {
            return Err(DomainError::InvalidRentalWindow(format!(
                "終了日({})が開始日({})より前です",
                end_date, start_date
            )));
        }
        Ok(Self {
            start_date,
            end_date,
        })
    }

    /// 開始日を取得
    pub fn start_date(&self) -> NaiveDate {
        self.start_date
    }

    /// 終了日を取得
    pub fn end_date(&self) -> NaiveDate {
        self.end_date
    }

    /// レンタル日数を取得（両端を含むため常に1以上）
    pub fn duration_days(&self) -> u32 {
        (self.end_date - self.start_date).num_days() as u32 + 1
    }
}

/// カタログデータの非正規化コピー
/// 最終同期時点の情報であり、古くなっている可能性がある
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GearSnapshot {
    /// ギア名
    pub title: String,
    /// 購入価格
    pub price: Money,
    /// 1日あたりのレンタル価格
    pub rent_price: Money,
    /// 在庫有無フラグ
    pub in_stock: bool,
}

impl GearSnapshot {
    /// 新しいカタログスナップショットを作成
    pub fn new(title: String, price: Money, rent_price: Money, in_stock: bool) -> Self {
        Self {
            title,
            price,
            rent_price,
            in_stock,
        }
    }
}

/// 価格計算ポリシー
/// 税率・送料などの定数を不変の値として渡す（ハードコードしない）
#[derive(Debug, Clone, PartialEq)]
pub struct PricingPolicy {
    /// 税率（例: 0.08 = 8%）
    pub tax_rate: f64,
    /// この小計以上で送料無料になる閾値
    pub free_shipping_threshold: Money,
    /// 閾値未満のときの固定送料
    pub flat_shipping_fee: Money,
}

impl PricingPolicy {
    /// 新しい価格計算ポリシーを作成
    pub fn new(
        tax_rate: f64,
        free_shipping_threshold: Money,
        flat_shipping_fee: Money,
    ) -> Result<Self, DomainError> {
        if !(0.0..1.0).contains(&tax_rate) {
            return Err(DomainError::InvalidValue(format!(
                "無効な税率: {}",
                tax_rate
            )));
        }
        Ok(Self {
            tax_rate,
            free_shipping_threshold,
            flat_shipping_fee,
        })
    }

    /// ポリシーの通貨を取得
    pub fn currency(&self) -> Currency {
        self.free_shipping_threshold.currency()
    }
}

impl Default for PricingPolicy {
    /// 既定ポリシー: 税率8%、$100以上で送料無料、固定送料$15
    fn default() -> Self {
        Self {
            tax_rate: 0.08,
            free_shipping_threshold: Money::usd(10_000),
            flat_shipping_fee: Money::usd(1_500),
        }
    }
}
