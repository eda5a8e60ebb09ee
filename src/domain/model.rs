// ドメインモデル（エンティティと値オブジェクト）

mod value_objects;
mod line_item;
mod cart;
mod conflict;

pub use value_objects::{
    LineItemId, GearId,
    Currency, Money,
    PurchaseMode, RentalWindow,
    GearSnapshot,
    PricingPolicy,
};

pub use line_item::LineItem;
pub use cart::{Cart, CartSnapshot, CartTotals, SnapshotChange};
pub use conflict::{Conflict, ConflictKind, ResolutionAction, SuggestedAction};
