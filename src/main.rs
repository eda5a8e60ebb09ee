use chrono::NaiveDate;
use gear_rental_cart::adapter::driven::{
    ConsoleLogger, FileSnapshotStore, InMemoryCartServer, InMemoryInventoryOracle,
};
use gear_rental_cart::application::CartService;
use gear_rental_cart::domain::model::{
    GearId, GearSnapshot, Money, PricingPolicy, PurchaseMode, RentalWindow, ResolutionAction,
};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== アウトドアギアレンタル ショッピングカート ===");
    println!("楽観的更新と在庫照合のデモシナリオ");
    println!();

    // インメモリアダプターで構成を組み立てる
    let oracle = Arc::new(InMemoryInventoryOracle::new());
    let server = InMemoryCartServer::new();
    let store = FileSnapshotStore::new(std::env::temp_dir().join("gear-rental-cart.json"));
    let logger = Arc::new(ConsoleLogger::new());
    let service = CartService::new(
        PricingPolicy::default(),
        oracle.clone(),
        server,
        store,
        logger,
    );

    // カタログにギアを登録
    let tent_id = GearId::new();
    oracle
        .register(
            tent_id,
            GearSnapshot::new(
                "4人用テント".to_string(),
                Money::usd(30_000),
                Money::usd(4_500),
                true,
            ),
            3,
        )
        .await;
    let kayak_id = GearId::new();
    oracle
        .register(
            kayak_id,
            GearSnapshot::new(
                "タンデムカヤック".to_string(),
                Money::usd(80_000),
                Money::usd(2_500),
                true,
            ),
            2,
        )
        .await;
    println!("カタログに2点のギアを登録しました");
    println!();

    // 購入明細を追加
    let tent_item = service
        .add_item(tent_id, 1, PurchaseMode::Purchase, None)
        .await?;
    println!("テントをカートに追加しました: {}", tent_item);

    // レンタル明細を追加（3日間）
    let window = RentalWindow::new(
        NaiveDate::from_ymd_opt(2026, 9, 10).ok_or("invalid date")?,
        NaiveDate::from_ymd_opt(2026, 9, 12).ok_or("invalid date")?,
    )?;
    let kayak_item = service
        .add_item(kayak_id, 1, PurchaseMode::Rent, Some(window))
        .await?;
    println!("カヤックのレンタルをカートに追加しました: {}", kayak_item);
    println!();

    let totals = service.totals().await;
    println!("小計:     {}", totals.subtotal);
    println!("税額:     {}", totals.tax);
    println!("送料:     {}", totals.shipping);
    println!("合計:     {}", totals.grand_total);
    println!();

    // 在庫が減った状態で照合すると衝突が検出される
    oracle.set_quantity(tent_id, 0).await;
    service.reconcile_inventory().await;
    let conflicts = service.conflicts().await;
    println!("在庫照合で {} 件の衝突を検出しました", conflicts.len());
    for conflict in conflicts.values() {
        println!("  - {}", conflict.message);
    }
    println!();

    // 衝突を解決（明細を削除）
    service
        .resolve_conflict(tent_item, ResolutionAction::Remove)
        .await?;
    println!("衝突を解決しました（テントを削除）");

    let totals = service.totals().await;
    println!("解決後の合計: {}", totals.grand_total);

    Ok(())
}
