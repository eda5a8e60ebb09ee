// クライアント保持型ショッピングカートの整合性コア
// 楽観的更新・在庫照合・衝突解決・価格計算・永続化スナップショット

pub mod adapter;
pub mod application;
pub mod domain;
