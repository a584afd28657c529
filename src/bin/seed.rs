use rust_decimal::Decimal;
use storefront_orders::{
    config::AppConfig,
    db::{create_pool, run_migrations},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;

    let pool = create_pool(&config.database_url, 1).await?;
    // Ensure migrations are applied.
    run_migrations(&pool).await?;

    seed_products(&pool).await?;
    Ok(())
}

async fn seed_products(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    let products = [
        ("Axum Hoodie", "Warm hoodie for Rustaceans", Decimal::new(5500, 2), 50),
        ("Ferris Mug", "Coffee tastes better with Ferris", Decimal::new(1200, 2), 100),
        ("Rust Sticker Pack", "Decorate your laptop", Decimal::new(500, 2), 200),
        ("Limited Print", "Signed poster, few left", Decimal::new(9900, 2), 1),
    ];

    for (name, desc, price, stock) in products {
        sqlx::query(
            r#"
            INSERT INTO products (name, description, price, stock)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (name) DO NOTHING
            "#,
        )
        .bind(name)
        .bind(desc)
        .bind(price)
        .bind(stock)
        .execute(pool)
        .await?;
    }

    println!("Seeded products");
    Ok(())
}
