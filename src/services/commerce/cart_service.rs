use crate::{
    config::AppConfig,
    db::{with_storage_timeout, DbPool},
    entities::commerce::{
        cart, cart_item, Cart, CartItem, CartItemModel, CartModel, ProductStatus, DEFAULT_LANGUAGE,
    },
    errors::{ErrorCode, ServiceError},
    services::commerce::product_catalog_service::{CatalogReader, ProductSnapshot},
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Set,
    SqlErr, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Size limits applied to every cart
#[derive(Debug, Clone, Copy)]
pub struct CartLimits {
    pub max_lines: usize,
    pub max_quantity: i32,
}

impl From<&AppConfig> for CartLimits {
    fn from(cfg: &AppConfig) -> Self {
        Self {
            max_lines: cfg.cart_max_lines as usize,
            max_quantity: i32::try_from(cfg.cart_max_quantity).unwrap_or(i32::MAX),
        }
    }
}

impl Default for CartLimits {
    fn default() -> Self {
        Self {
            max_lines: 50,
            max_quantity: 99,
        }
    }
}

/// Input for adding an item to the cart
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct AddToCartInput {
    #[serde(alias = "productId")]
    pub product_id: Uuid,
    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub quantity: i32,
    pub color: Option<String>,
    pub size: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateCartItemInput {
    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub quantity: i32,
}

/// Live product details shown next to a cart line
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CartProductView {
    pub id: Uuid,
    pub name: String,
    pub image: Option<String>,
    pub unit_price: Decimal,
    pub original_price: Decimal,
    pub discount_price: Option<Decimal>,
    pub stock: i32,
    pub status: ProductStatus,
}

impl CartProductView {
    fn from_snapshot(snapshot: &ProductSnapshot, lang: &str) -> Self {
        Self {
            id: snapshot.id,
            name: snapshot.name.resolve(lang).to_string(),
            image: snapshot.primary_image.clone(),
            unit_price: snapshot.unit_price,
            original_price: snapshot.original_price,
            discount_price: snapshot.discount_price,
            stock: snapshot.stock,
            status: snapshot.status,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CartLineView {
    pub id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    pub color: Option<String>,
    pub size: Option<String>,
    /// `None` when the product no longer exists
    pub product: Option<CartProductView>,
    pub line_total: Option<Decimal>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CartView {
    pub id: Uuid,
    pub user_id: Uuid,
    pub lines: Vec<CartLineView>,
    pub total_quantity: i32,
    /// Preview at current prices; checkout prices again
    pub subtotal: Decimal,
}

/// Result of adding an item
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AddItemOutcome {
    pub line_id: Uuid,
    pub quantity: i32,
    /// Quantity was summed into an existing line
    pub merged: bool,
    /// Quantity was capped by stock or the per-line maximum
    pub adjusted: bool,
    pub cart: CartView,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct UpdateItemOutcome {
    pub line_id: Uuid,
    pub quantity: i32,
    /// Requested quantity was clamped to available stock
    pub adjusted: bool,
    pub cart: CartView,
}

/// Per-user shopping cart. Lines carry stable ids; `(product, color, size)`
/// is unique within a cart.
#[derive(Clone)]
pub struct CartService {
    db: Arc<DbPool>,
    catalog: Arc<dyn CatalogReader>,
    limits: CartLimits,
    storage_timeout: Duration,
}

impl CartService {
    pub fn new(
        db: Arc<DbPool>,
        catalog: Arc<dyn CatalogReader>,
        limits: CartLimits,
        storage_timeout: Duration,
    ) -> Self {
        Self {
            db,
            catalog,
            limits,
            storage_timeout,
        }
    }

    #[instrument(skip(self))]
    pub async fn get_cart(&self, user_id: Uuid, lang: Option<&str>) -> Result<CartView, ServiceError> {
        with_storage_timeout(self.storage_timeout, async {
            let cart = get_or_create_cart(&*self.db, user_id).await?;
            self.build_view(cart, lang).await
        })
        .await
    }

    /// Adds `input.quantity` of a product variant, merging into an existing
    /// identical line. Quantities are capped at stock and the per-line maximum.
    #[instrument(skip(self), fields(product_id = %input.product_id))]
    pub async fn add_item(
        &self,
        user_id: Uuid,
        input: AddToCartInput,
        lang: Option<&str>,
    ) -> Result<AddItemOutcome, ServiceError> {
        with_storage_timeout(self.storage_timeout, self.add_item_inner(user_id, input, lang)).await
    }

    async fn add_item_inner(
        &self,
        user_id: Uuid,
        input: AddToCartInput,
        lang: Option<&str>,
    ) -> Result<AddItemOutcome, ServiceError> {
        self.check_quantity(input.quantity)?;

        let product = self
            .catalog
            .get_product(input.product_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", input.product_id)))?;

        if !product.status.is_listed() {
            return Err(ServiceError::rule(
                ErrorCode::ProductUnavailable,
                format!("Product {} is not available", product.id),
            ));
        }
        if product.stock <= 0 {
            return Err(ServiceError::rule(
                ErrorCode::OutOfStock,
                format!("Product {} is out of stock", product.id),
            ));
        }

        let color = canonical_variant(&product, "color", input.color.as_deref())?;
        let size = canonical_variant(&product, "size", input.size.as_deref())?;

        let cart = get_or_create_cart(&*self.db, user_id).await?;
        let cap = product.stock.min(self.limits.max_quantity);
        let now = Utc::now();

        let txn = self.db.begin().await?;
        let lines = load_lines(&txn, cart.id).await?;

        let existing = lines
            .iter()
            .find(|line| line.matches_variant(product.id, color.as_deref(), size.as_deref()))
            .cloned();

        let (line_id, quantity, merged, adjusted) = match existing {
            Some(line) => {
                let wanted = line.quantity.saturating_add(input.quantity);
                let quantity = wanted.min(cap);
                let line_id = line.id;
                let mut active: cart_item::ActiveModel = line.into();
                active.quantity = Set(quantity);
                active.updated_at = Set(now);
                active.update(&txn).await?;
                (line_id, quantity, true, quantity < wanted)
            }
            None => {
                if lines.len() >= self.limits.max_lines {
                    warn!(%user_id, lines = lines.len(), "Cart is full");
                    return Err(ServiceError::rule(
                        ErrorCode::CartFull,
                        format!("Cart cannot hold more than {} lines", self.limits.max_lines),
                    ));
                }

                let quantity = input.quantity.min(cap);
                let position = lines.iter().map(|l| l.position).max().map_or(0, |p| p + 1);
                let line = cart_item::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    cart_id: Set(cart.id),
                    product_id: Set(product.id),
                    quantity: Set(quantity),
                    color: Set(color),
                    size: Set(size),
                    position: Set(position),
                    created_at: Set(now),
                    updated_at: Set(now),
                }
                .insert(&txn)
                .await?;
                (line.id, quantity, false, quantity < input.quantity)
            }
        };

        touch_cart(&txn, cart.clone()).await?;
        txn.commit().await?;

        info!(%user_id, %line_id, quantity, merged, "Cart item added");
        let cart = self.build_view(cart, lang).await?;
        Ok(AddItemOutcome {
            line_id,
            quantity,
            merged,
            adjusted,
            cart,
        })
    }

    /// Sets a line's quantity, clamped to live stock
    #[instrument(skip(self))]
    pub async fn update_item_quantity(
        &self,
        user_id: Uuid,
        line_id: Uuid,
        quantity: i32,
        lang: Option<&str>,
    ) -> Result<UpdateItemOutcome, ServiceError> {
        with_storage_timeout(self.storage_timeout, async {
            self.check_quantity(quantity)?;

            let (cart, line) = self.find_line(user_id, line_id).await?;
            let product = self
                .catalog
                .get_product(line.product_id)
                .await?
                .ok_or_else(|| {
                    ServiceError::NotFound(format!("Product {} not found", line.product_id))
                })?;

            if product.stock <= 0 {
                return Err(ServiceError::rule(
                    ErrorCode::OutOfStock,
                    format!("Product {} is out of stock", product.id),
                ));
            }

            let applied = quantity.min(product.stock);
            let mut active: cart_item::ActiveModel = line.into();
            active.quantity = Set(applied);
            active.updated_at = Set(Utc::now());
            active.update(&*self.db).await?;

            info!(%user_id, %line_id, quantity = applied, "Cart item updated");
            let cart = self.build_view(cart, lang).await?;
            Ok(UpdateItemOutcome {
                line_id,
                quantity: applied,
                adjusted: applied < quantity,
                cart,
            })
        })
        .await
    }

    #[instrument(skip(self))]
    pub async fn remove_item(
        &self,
        user_id: Uuid,
        line_id: Uuid,
        lang: Option<&str>,
    ) -> Result<CartView, ServiceError> {
        with_storage_timeout(self.storage_timeout, async {
            let (cart, line) = self.find_line(user_id, line_id).await?;
            CartItem::delete_by_id(line.id).exec(&*self.db).await?;
            info!(%user_id, %line_id, "Cart item removed");
            self.build_view(cart, lang).await
        })
        .await
    }

    /// Empties the cart; the cart itself is kept
    #[instrument(skip(self))]
    pub async fn clear(&self, user_id: Uuid) -> Result<(), ServiceError> {
        with_storage_timeout(self.storage_timeout, async {
            let cart = get_or_create_cart(&*self.db, user_id).await?;
            clear_lines(&*self.db, cart).await?;
            info!(%user_id, "Cart cleared");
            Ok(())
        })
        .await
    }

    /// Sum of line quantities, for the cart badge
    #[instrument(skip(self))]
    pub async fn count(&self, user_id: Uuid) -> Result<i32, ServiceError> {
        with_storage_timeout(self.storage_timeout, async {
            let cart = Cart::find()
                .filter(cart::Column::UserId.eq(user_id))
                .one(&*self.db)
                .await?;
            let Some(cart) = cart else {
                return Ok(0);
            };
            let lines = load_lines(&*self.db, cart.id).await?;
            Ok(lines.iter().map(|l| l.quantity).sum())
        })
        .await
    }

    fn check_quantity(&self, quantity: i32) -> Result<(), ServiceError> {
        if quantity < 1 || quantity > self.limits.max_quantity {
            return Err(ServiceError::ValidationError(format!(
                "Quantity must be between 1 and {}",
                self.limits.max_quantity
            )));
        }
        Ok(())
    }

    async fn find_line(
        &self,
        user_id: Uuid,
        line_id: Uuid,
    ) -> Result<(CartModel, CartItemModel), ServiceError> {
        let not_found = || ServiceError::NotFound(format!("Cart line {} not found", line_id));

        let cart = Cart::find()
            .filter(cart::Column::UserId.eq(user_id))
            .one(&*self.db)
            .await?
            .ok_or_else(not_found)?;

        let line = CartItem::find_by_id(line_id)
            .filter(cart_item::Column::CartId.eq(cart.id))
            .one(&*self.db)
            .await?
            .ok_or_else(not_found)?;

        Ok((cart, line))
    }

    async fn build_view(&self, cart: CartModel, lang: Option<&str>) -> Result<CartView, ServiceError> {
        let lang = lang.unwrap_or(DEFAULT_LANGUAGE);
        let lines = load_lines(&*self.db, cart.id).await?;
        let ids: Vec<Uuid> = lines.iter().map(|l| l.product_id).collect();
        let products = self.catalog.get_products(&ids).await?;

        let lines: Vec<CartLineView> = lines
            .into_iter()
            .map(|line| {
                let product = products.get(&line.product_id);
                CartLineView {
                    id: line.id,
                    product_id: line.product_id,
                    quantity: line.quantity,
                    color: line.color,
                    size: line.size,
                    line_total: product.map(|p| p.unit_price * Decimal::from(line.quantity)),
                    product: product.map(|p| CartProductView::from_snapshot(p, lang)),
                }
            })
            .collect();

        Ok(CartView {
            id: cart.id,
            user_id: cart.user_id,
            total_quantity: lines.iter().map(|l| l.quantity).sum(),
            subtotal: lines.iter().filter_map(|l| l.line_total).sum(),
            lines,
        })
    }
}

/// Finds the user's cart or creates it. A concurrent creator winning the
/// unique `user_id` race is resolved by reading its row.
pub async fn get_or_create_cart<C: ConnectionTrait>(
    conn: &C,
    user_id: Uuid,
) -> Result<CartModel, ServiceError> {
    if let Some(cart) = find_cart(conn, user_id).await? {
        return Ok(cart);
    }

    let now = Utc::now();
    let inserted = cart::ActiveModel {
        id: Set(Uuid::new_v4()),
        user_id: Set(user_id),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(conn)
    .await;

    match inserted {
        Ok(cart) => Ok(cart),
        Err(err) if matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
            find_cart(conn, user_id)
                .await?
                .ok_or_else(|| ServiceError::InternalError("cart vanished after insert race".into()))
        }
        Err(err) => Err(err.into()),
    }
}

pub async fn find_cart<C: ConnectionTrait>(
    conn: &C,
    user_id: Uuid,
) -> Result<Option<CartModel>, ServiceError> {
    Ok(Cart::find()
        .filter(cart::Column::UserId.eq(user_id))
        .one(conn)
        .await?)
}

/// Lines in display order
pub async fn load_lines<C: ConnectionTrait>(
    conn: &C,
    cart_id: Uuid,
) -> Result<Vec<CartItemModel>, ServiceError> {
    Ok(CartItem::find()
        .filter(cart_item::Column::CartId.eq(cart_id))
        .order_by_asc(cart_item::Column::Position)
        .all(conn)
        .await?)
}

/// Deletes every line of `cart` and bumps its `updated_at`
pub async fn clear_lines<C: ConnectionTrait>(conn: &C, cart: CartModel) -> Result<(), ServiceError> {
    CartItem::delete_many()
        .filter(cart_item::Column::CartId.eq(cart.id))
        .exec(conn)
        .await?;
    touch_cart(conn, cart).await
}

async fn touch_cart<C: ConnectionTrait>(conn: &C, cart: CartModel) -> Result<(), ServiceError> {
    let mut active: cart::ActiveModel = cart.into();
    active.updated_at = Set(Utc::now());
    active.update(conn).await?;
    Ok(())
}

/// Validates a requested color or size against the product's declared
/// variants and returns the declared spelling. Unset values are accepted.
fn canonical_variant(
    product: &ProductSnapshot,
    kind: &str,
    requested: Option<&str>,
) -> Result<Option<String>, ServiceError> {
    let Some(requested) = requested.map(str::trim).filter(|v| !v.is_empty()) else {
        return Ok(None);
    };

    let declared = if kind == "color" {
        &product.colors
    } else {
        &product.sizes
    };

    declared
        .find_ignore_case(requested)
        .cloned()
        .map(Some)
        .ok_or_else(|| {
            ServiceError::rule(
                ErrorCode::InvalidVariant,
                format!(
                    "Invalid {} '{}' for this product; allowed: [{}]",
                    kind,
                    requested,
                    declared.0.join(", ")
                ),
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::commerce::{LocalizedText, StringList};
    use assert_matches::assert_matches;
    use rust_decimal_macros::dec;

    fn snapshot() -> ProductSnapshot {
        ProductSnapshot {
            id: Uuid::new_v4(),
            name: LocalizedText::from("Tee"),
            unit_price: dec!(100),
            original_price: dec!(100),
            discount_price: None,
            stock: 5,
            status: ProductStatus::Active,
            category_id: None,
            primary_image: None,
            colors: StringList::from(vec!["Red".to_string(), "Blue".to_string()]),
            sizes: StringList::default(),
        }
    }

    #[test]
    fn variants_resolve_to_declared_spelling() {
        let product = snapshot();
        assert_eq!(
            canonical_variant(&product, "color", Some(" red ")).unwrap(),
            Some("Red".to_string())
        );
        assert_eq!(canonical_variant(&product, "color", None).unwrap(), None);
    }

    #[test]
    fn unknown_variant_lists_allowed_values() {
        let product = snapshot();
        let err = canonical_variant(&product, "color", Some("Green")).unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidVariant);
        assert!(err.to_string().contains("Red, Blue"));

        // a product without declared sizes accepts none
        assert_matches!(
            canonical_variant(&product, "size", Some("XL")),
            Err(ServiceError::BusinessRule { code: ErrorCode::InvalidVariant, .. })
        );
    }
}
