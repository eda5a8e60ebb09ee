// ドメイン層
// カート集約・価格計算・衝突検出と、外部依存のポート定義

pub mod error;
pub mod model;
pub mod port;
pub mod pricing;
pub mod service;
