// アプリケーション層
// ポート越しに楽観的更新プロトコルを編成するカートサービス

pub mod error;
pub mod service;

pub use error::CartError;
pub use service::CartService;
