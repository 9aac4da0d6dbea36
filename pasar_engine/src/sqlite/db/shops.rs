use sqlx::SqliteConnection;

use crate::{
    db_types::{Money, Product, ProductVariant, Shop},
    traits::StorageError,
};

pub async fn fetch_shop(shop_id: i64, conn: &mut SqliteConnection) -> Result<Option<Shop>, StorageError> {
    let shop = sqlx::query_as("SELECT * FROM shops WHERE id = $1").bind(shop_id).fetch_optional(&mut *conn).await?;
    Ok(shop)
}

pub(crate) async fn insert_shop(
    name: &str,
    auto_accept: bool,
    conn: &mut SqliteConnection,
) -> Result<Shop, StorageError> {
    let shop: Shop = sqlx::query_as("INSERT INTO shops (name, auto_accept) VALUES ($1, $2) RETURNING *")
        .bind(name)
        .bind(auto_accept)
        .fetch_one(&mut *conn)
        .await?;
    Ok(shop)
}

pub(crate) async fn insert_product(
    shop_id: i64,
    name: &str,
    price: Money,
    stock: Option<i64>,
    conn: &mut SqliteConnection,
) -> Result<Product, StorageError> {
    let product: Product =
        sqlx::query_as("INSERT INTO products (shop_id, name, price, stock) VALUES ($1, $2, $3, $4) RETURNING *")
            .bind(shop_id)
            .bind(name)
            .bind(price)
            .bind(stock)
            .fetch_one(&mut *conn)
            .await?;
    Ok(product)
}

pub(crate) async fn insert_variant(
    product_id: i64,
    name: &str,
    extra_price: Money,
    stock: Option<i64>,
    conn: &mut SqliteConnection,
) -> Result<ProductVariant, StorageError> {
    let variant: ProductVariant = sqlx::query_as(
        "INSERT INTO product_variants (product_id, name, extra_price, stock) VALUES ($1, $2, $3, $4) RETURNING *",
    )
    .bind(product_id)
    .bind(name)
    .bind(extra_price)
    .bind(stock)
    .fetch_one(&mut *conn)
    .await?;
    Ok(variant)
}

pub async fn fetch_product(product_id: i64, conn: &mut SqliteConnection) -> Result<Option<Product>, StorageError> {
    let product =
        sqlx::query_as("SELECT * FROM products WHERE id = $1").bind(product_id).fetch_optional(&mut *conn).await?;
    Ok(product)
}

pub async fn fetch_variant(
    variant_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<ProductVariant>, StorageError> {
    let variant = sqlx::query_as("SELECT * FROM product_variants WHERE id = $1")
        .bind(variant_id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(variant)
}
