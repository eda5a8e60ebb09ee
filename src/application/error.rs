use crate::domain::error::DomainError;
use crate::domain::port::{OracleError, ServerError};

/// アプリケーション層のエラー型
/// カート操作の失敗を分類して表現する
/// 衝突（Conflict）はエラーではなくデータとして扱われ、ここには現れない
#[derive(Debug, Clone, PartialEq)]
pub enum CartError {
    /// 操作への入力が不正（楽観的変更の適用前に拒否される）
    Validation(String),
    /// 存在しない明細IDを参照した（変更前に拒否される）
    NotFound(String),
    /// 要求数量に対して在庫不足（楽観的変更はコミットされない）
    InsufficientInventory {
        /// 要求した数量
        requested: u32,
        /// 利用可能な数量
        available: u32,
    },
    /// ネットワーク/タイムアウト/5xx系の一時障害
    /// 楽観的変更の適用後に発生した場合はロールバック済みであることを保証する
    TransientServer(String),
}

impl std::fmt::Display for CartError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CartError::Validation(msg) => write!(f, "Validation error: {}", msg),
            CartError::NotFound(msg) => write!(f, "Not found: {}", msg),
            CartError::InsufficientInventory {
                requested,
                available,
            } => write!(
                f,
                "Insufficient inventory: requested {}, available {}",
                requested, available
            ),
            CartError::TransientServer(msg) => write!(f, "Transient server error: {}", msg),
        }
    }
}

impl std::error::Error for CartError {}

// From実装でエラー変換を簡潔に
impl From<DomainError> for CartError {
    fn from(err: DomainError) -> Self {
        CartError::Validation(err.to_string())
    }
}

impl From<OracleError> for CartError {
    fn from(err: OracleError) -> Self {
        match err {
            OracleError::ItemNotFound(msg) => {
                CartError::Validation(format!("ギアが見つかりません: {}", msg))
            }
            OracleError::Unavailable(msg) => CartError::TransientServer(msg),
        }
    }
}

impl From<ServerError> for CartError {
    fn from(err: ServerError) -> Self {
        match err {
            ServerError::Rejected(msg) => CartError::Validation(msg),
            ServerError::Unavailable(msg) => CartError::TransientServer(msg),
        }
    }
}
