// アダプター層
// ドメイン層のポートを実装する

pub mod driven;
