/// ドメイン層のエラー型
/// 入力値や明細の形に関するルール違反を表現する
#[derive(Debug, Clone, PartialEq)]
pub enum DomainError {
    /// 無効な数量（例: 0の数量で明細を作ろうとした）
    InvalidQuantity,
    /// 無効なレンタル期間（例: 終了日が開始日より前）
    InvalidRentalWindow(String),
    /// レンタルモードなのにレンタル期間がない
    MissingRentalWindow,
    /// 通貨の不一致
    CurrencyMismatch,
    /// 無効な値
    InvalidValue(String),
}

impl std::fmt::Display for DomainError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DomainError::InvalidQuantity => write!(f, "Invalid quantity"),
            DomainError::InvalidRentalWindow(msg) => {
                write!(f, "Invalid rental window: {}", msg)
            }
            DomainError::MissingRentalWindow => write!(f, "Missing rental window"),
            DomainError::CurrencyMismatch => write!(f, "Currency mismatch"),
            DomainError::InvalidValue(msg) => write!(f, "Invalid value: {}", msg),
        }
    }
}

impl std::error::Error for DomainError {}
