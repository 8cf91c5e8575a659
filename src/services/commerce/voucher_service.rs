use crate::{
    db::{with_storage_timeout, DbPool},
    entities::commerce::{
        order, user_voucher, voucher, DiscountType, Order, UserVoucher, UserVoucherModel,
        UserVoucherStatus, UuidList, Voucher, VoucherModel, VoucherWindow,
    },
    errors::{ErrorCode, ServiceError},
    services::commerce::{
        cart_service::{find_cart, load_lines},
        pricing_service::evaluate_voucher,
        product_catalog_service::CatalogReader,
    },
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
    SqlErr,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationError};

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct VoucherCodeInput {
    #[validate(length(min = 1, max = 64, message = "Voucher code is required"))]
    pub code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RemoveVoucherInput {
    #[serde(alias = "voucherId")]
    pub voucher_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct PreviewLine {
    #[serde(alias = "productId")]
    pub product_id: Uuid,
    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub quantity: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct ValidateVoucherInput {
    #[validate(length(min = 1, max = 64, message = "Voucher code is required"))]
    pub code: String,
    pub subtotal: Option<Decimal>,
    #[serde(alias = "cartItems")]
    #[validate(custom = "validate_preview_lines")]
    pub cart_items: Option<Vec<PreviewLine>>,
}

fn validate_preview_lines(lines: &[PreviewLine]) -> Result<(), ValidationError> {
    if lines.iter().any(|line| line.validate().is_err()) {
        let mut err = ValidationError::new("cart_items");
        err.message = Some("Every cart item needs a quantity of at least 1".into());
        return Err(err);
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[validate(schema(function = "validate_voucher_definition"))]
pub struct CreateVoucherInput {
    #[validate(length(min = 1, max = 64))]
    pub code: String,
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    pub description: Option<String>,
    pub discount_value: Decimal,
    #[serde(default = "default_discount_type")]
    pub discount_type: DiscountType,
    #[serde(default)]
    pub min_order_value: Decimal,
    pub start_date: Option<DateTime<Utc>>,
    pub expired_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub category_ids: Vec<Uuid>,
}

fn default_discount_type() -> DiscountType {
    DiscountType::Auto
}

fn validate_voucher_definition(input: &CreateVoucherInput) -> Result<(), ValidationError> {
    if input.discount_value <= Decimal::ZERO {
        return Err(ValidationError::new("discount_value_must_be_positive"));
    }
    if input.discount_type == DiscountType::Percentage && input.discount_value > Decimal::ONE_HUNDRED {
        return Err(ValidationError::new("percentage_above_100"));
    }
    if input.min_order_value < Decimal::ZERO {
        return Err(ValidationError::new("min_order_value_negative"));
    }
    if let (Some(start), Some(end)) = (input.start_date, input.expired_date) {
        if start >= end {
            return Err(ValidationError::new("start_date_after_expired_date"));
        }
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct VoucherSummary {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    pub discount_value: Decimal,
    pub discount_type: DiscountType,
    pub min_order_value: Decimal,
    pub start_date: Option<DateTime<Utc>>,
    pub expired_date: Option<DateTime<Utc>>,
    pub category_ids: Vec<Uuid>,
}

impl From<&VoucherModel> for VoucherSummary {
    fn from(v: &VoucherModel) -> Self {
        Self {
            id: v.id,
            code: v.code.clone(),
            name: v.name.clone(),
            description: v.description.clone(),
            discount_value: v.discount_value,
            discount_type: v.discount_type,
            min_order_value: v.min_order_value,
            start_date: v.start_date,
            expired_date: v.expired_date,
            category_ids: v.category_ids.0.clone(),
        }
    }
}

/// A voucher as held by a user
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct UserVoucherView {
    pub id: Uuid,
    pub status: UserVoucherStatus,
    pub added_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
    pub order_id: Option<Uuid>,
    pub voucher: VoucherSummary,
}

impl UserVoucherView {
    fn new(link: UserVoucherModel, voucher: &VoucherModel) -> Self {
        Self {
            id: link.id,
            status: link.status,
            added_at: link.added_at,
            used_at: link.used_at,
            order_id: link.order_id,
            voucher: VoucherSummary::from(voucher),
        }
    }
}

/// Outcome of a voucher preview. Rule failures are reported here rather
/// than as errors.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct VoucherValidation {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<ErrorCode>,
    pub voucher: Option<VoucherSummary>,
    pub discount_amount: Decimal,
    pub message: String,
}

impl VoucherValidation {
    fn rejected(code: ErrorCode, message: impl Into<String>, voucher: Option<&VoucherModel>) -> Self {
        Self {
            valid: false,
            code: Some(code),
            voucher: voucher.map(VoucherSummary::from),
            discount_amount: Decimal::ZERO,
            message: message.into(),
        }
    }
}

/// Voucher definitions and per-user possession
#[derive(Clone)]
pub struct VoucherService {
    db: Arc<DbPool>,
    catalog: Arc<dyn CatalogReader>,
    storage_timeout: Duration,
}

impl VoucherService {
    pub fn new(db: Arc<DbPool>, catalog: Arc<dyn CatalogReader>, storage_timeout: Duration) -> Self {
        Self {
            db,
            catalog,
            storage_timeout,
        }
    }

    /// Links the voucher with `code` to the user
    #[instrument(skip(self))]
    pub async fn add_voucher_to_user(
        &self,
        user_id: Uuid,
        code: &str,
    ) -> Result<UserVoucherView, ServiceError> {
        with_storage_timeout(self.storage_timeout, async {
            let code = voucher::normalize_code(code);
            let voucher = self.find_by_code(&code).await?.ok_or_else(|| {
                ServiceError::rule(ErrorCode::InvalidCode, format!("Voucher code {} does not exist", code))
            })?;

            ensure_window(&voucher, Utc::now())?;

            let link = user_voucher::ActiveModel {
                id: Set(Uuid::new_v4()),
                user_id: Set(user_id),
                voucher_id: Set(voucher.id),
                status: Set(UserVoucherStatus::Active),
                added_at: Set(Utc::now()),
                used_at: Set(None),
                order_id: Set(None),
            }
            .insert(&*self.db)
            .await
            .map_err(|err| match err.sql_err() {
                Some(SqlErr::UniqueConstraintViolation(_)) => ServiceError::conflict(
                    ErrorCode::AlreadyAdded,
                    format!("Voucher {} is already in your wallet", code),
                ),
                _ => err.into(),
            })?;

            info!(%user_id, voucher_id = %voucher.id, %code, "Voucher added to user");
            Ok(UserVoucherView::new(link, &voucher))
        })
        .await
    }

    #[instrument(skip(self))]
    pub async fn remove_voucher_from_user(
        &self,
        user_id: Uuid,
        voucher_id: Uuid,
    ) -> Result<(), ServiceError> {
        with_storage_timeout(self.storage_timeout, async {
            let result = UserVoucher::delete_many()
                .filter(user_voucher::Column::UserId.eq(user_id))
                .filter(user_voucher::Column::VoucherId.eq(voucher_id))
                .exec(&*self.db)
                .await?;

            if result.rows_affected == 0 {
                return Err(ServiceError::NotFound(format!(
                    "Voucher {} is not in your wallet",
                    voucher_id
                )));
            }

            info!(%user_id, %voucher_id, "Voucher removed from user");
            Ok(())
        })
        .await
    }

    /// Lists the user's vouchers, newest first. Active links whose voucher
    /// has expired are flipped to `expired` on the way out.
    #[instrument(skip(self))]
    pub async fn list_user_vouchers(&self, user_id: Uuid) -> Result<Vec<UserVoucherView>, ServiceError> {
        with_storage_timeout(self.storage_timeout, async {
            let links = UserVoucher::find()
                .filter(user_voucher::Column::UserId.eq(user_id))
                .order_by_desc(user_voucher::Column::AddedAt)
                .find_also_related(Voucher)
                .all(&*self.db)
                .await?;

            let now = Utc::now();
            let mut stale = Vec::new();
            let mut views = Vec::with_capacity(links.len());

            for (mut link, voucher) in links {
                let Some(voucher) = voucher else { continue };
                if link.status == UserVoucherStatus::Active
                    && voucher.window_at(now) == VoucherWindow::Expired
                {
                    stale.push(link.id);
                    link.status = UserVoucherStatus::Expired;
                }
                views.push(UserVoucherView::new(link, &voucher));
            }

            if !stale.is_empty() {
                expire_links(&*self.db, stale).await?;
            }

            Ok(views)
        })
        .await
    }

    /// Read-only preview of what checkout would charge for this voucher.
    ///
    /// The subtotal comes from `cart_items` when given, then `subtotal`, then
    /// the user's cart. Eligible categories always come from actual lines.
    #[instrument(skip(self, input), fields(code = %input.code))]
    pub async fn validate_voucher(
        &self,
        user_id: Uuid,
        input: ValidateVoucherInput,
    ) -> Result<VoucherValidation, ServiceError> {
        with_storage_timeout(self.storage_timeout, self.validate_voucher_inner(user_id, input)).await
    }

    async fn validate_voucher_inner(
        &self,
        user_id: Uuid,
        input: ValidateVoucherInput,
    ) -> Result<VoucherValidation, ServiceError> {
        let code = voucher::normalize_code(&input.code);
        let Some(voucher) = self.find_by_code(&code).await? else {
            return Ok(VoucherValidation::rejected(
                ErrorCode::InvalidCode,
                format!("Voucher code {} does not exist", code),
                None,
            ));
        };

        let link = UserVoucher::find()
            .filter(user_voucher::Column::UserId.eq(user_id))
            .filter(user_voucher::Column::VoucherId.eq(voucher.id))
            .one(&*self.db)
            .await?;

        let precheck = ensure_link_usable(link.as_ref(), &voucher)
            .and_then(|_| ensure_window(&voucher, Utc::now()));
        if let Err(err) = precheck {
            return rule_outcome(err, &voucher);
        }

        let (lines, explicit) = match input.cart_items {
            Some(items) => (
                items.into_iter().map(|l| (l.product_id, l.quantity)).collect(),
                true,
            ),
            None => (self.cart_lines(user_id).await?, false),
        };

        let ids: Vec<Uuid> = lines.iter().map(|(id, _)| *id).collect();
        let products = self.catalog.get_products(&ids).await?;
        let categories: Vec<Option<Uuid>> = ids
            .iter()
            .filter_map(|id| products.get(id).map(|p| p.category_id))
            .collect();
        let priced: Decimal = lines
            .iter()
            .filter_map(|(id, qty)| products.get(id).map(|p| p.unit_price * Decimal::from(*qty)))
            .sum();

        let subtotal = match (explicit, input.subtotal) {
            (false, Some(given)) => given,
            _ => priced,
        };

        match evaluate_voucher(&voucher, subtotal, &categories) {
            Ok(discount) => Ok(VoucherValidation {
                valid: true,
                code: None,
                voucher: Some(VoucherSummary::from(&voucher)),
                discount_amount: discount,
                message: format!("Voucher {} applied", voucher.code),
            }),
            Err(err) => rule_outcome(err, &voucher),
        }
    }

    /// Admin: defines a new voucher
    #[instrument(skip(self, input), fields(code = %input.code))]
    pub async fn create_voucher(&self, input: CreateVoucherInput) -> Result<VoucherModel, ServiceError> {
        input.validate()?;

        with_storage_timeout(self.storage_timeout, async {
            let code = voucher::normalize_code(&input.code);
            let now = Utc::now();
            let created = voucher::ActiveModel {
                id: Set(Uuid::new_v4()),
                code: Set(code.clone()),
                name: Set(input.name),
                description: Set(input.description),
                discount_value: Set(input.discount_value),
                discount_type: Set(input.discount_type),
                min_order_value: Set(input.min_order_value),
                start_date: Set(input.start_date),
                expired_date: Set(input.expired_date),
                category_ids: Set(UuidList(input.category_ids)),
                created_at: Set(now),
                updated_at: Set(now),
            }
            .insert(&*self.db)
            .await
            .map_err(|err| match err.sql_err() {
                Some(SqlErr::UniqueConstraintViolation(_)) => ServiceError::conflict(
                    ErrorCode::Conflict,
                    format!("Voucher code {} already exists", code),
                ),
                _ => err.into(),
            })?;

            info!(voucher_id = %created.id, code = %created.code, "Voucher created");
            Ok(created)
        })
        .await
    }

    /// Admin: deletes a voucher no order references
    #[instrument(skip(self))]
    pub async fn delete_voucher(&self, voucher_id: Uuid) -> Result<(), ServiceError> {
        with_storage_timeout(self.storage_timeout, async {
            let voucher = Voucher::find_by_id(voucher_id)
                .one(&*self.db)
                .await?
                .ok_or_else(|| ServiceError::NotFound(format!("Voucher {} not found", voucher_id)))?;

            let referencing = Order::find()
                .filter(order::Column::VoucherId.eq(voucher_id))
                .count(&*self.db)
                .await?;
            if referencing > 0 {
                warn!(%voucher_id, referencing, "Refusing to delete voucher used by orders");
                return Err(ServiceError::conflict(
                    ErrorCode::VoucherInUse,
                    format!("Voucher {} is referenced by {} order(s)", voucher.code, referencing),
                ));
            }

            Voucher::delete_by_id(voucher_id).exec(&*self.db).await?;
            info!(%voucher_id, code = %voucher.code, "Voucher deleted");
            Ok(())
        })
        .await
    }

    async fn find_by_code(&self, code: &str) -> Result<Option<VoucherModel>, ServiceError> {
        Ok(Voucher::find()
            .filter(voucher::Column::Code.eq(code))
            .one(&*self.db)
            .await?)
    }

    async fn cart_lines(&self, user_id: Uuid) -> Result<Vec<(Uuid, i32)>, ServiceError> {
        let Some(cart) = find_cart(&*self.db, user_id).await? else {
            return Ok(Vec::new());
        };
        Ok(load_lines(&*self.db, cart.id)
            .await?
            .into_iter()
            .map(|l| (l.product_id, l.quantity))
            .collect())
    }
}

/// The user must hold the voucher and it must still be unused
pub(crate) fn ensure_link_usable(
    link: Option<&UserVoucherModel>,
    voucher: &VoucherModel,
) -> Result<(), ServiceError> {
    match link.map(|l| l.status) {
        Some(UserVoucherStatus::Active) => Ok(()),
        Some(UserVoucherStatus::Expired) => Err(ServiceError::rule(
            ErrorCode::VoucherExpired,
            format!("Voucher {} has expired", voucher.code),
        )),
        Some(UserVoucherStatus::Used) => Err(ServiceError::rule(
            ErrorCode::VoucherNotAvailable,
            format!("Voucher {} has already been used", voucher.code),
        )),
        None => Err(ServiceError::rule(
            ErrorCode::VoucherNotAvailable,
            format!("Voucher {} is not in your wallet", voucher.code),
        )),
    }
}

/// The voucher's validity window must cover `now`
pub(crate) fn ensure_window(voucher: &VoucherModel, now: DateTime<Utc>) -> Result<(), ServiceError> {
    match voucher.window_at(now) {
        VoucherWindow::Active => Ok(()),
        VoucherWindow::Expired => Err(ServiceError::rule(
            ErrorCode::VoucherExpired,
            format!("Voucher {} has expired", voucher.code),
        )),
        VoucherWindow::NotStarted => Err(ServiceError::rule(
            ErrorCode::VoucherNotStarted,
            format!("Voucher {} is not active yet", voucher.code),
        )),
    }
}

/// Marks still-active links as expired
pub(crate) async fn expire_links<C: sea_orm::ConnectionTrait>(
    conn: &C,
    link_ids: Vec<Uuid>,
) -> Result<u64, ServiceError> {
    let result = UserVoucher::update_many()
        .col_expr(
            user_voucher::Column::Status,
            sea_orm::sea_query::Expr::value(UserVoucherStatus::Expired),
        )
        .filter(user_voucher::Column::Id.is_in(link_ids))
        .filter(user_voucher::Column::Status.eq(UserVoucherStatus::Active))
        .exec(conn)
        .await?;
    Ok(result.rows_affected)
}

/// Marks an active link as used by `order_id`.
///
/// Only a link still in `active` is updated, so two checkouts racing on the
/// same link redeem it once. The loser gets `VOUCHER_NOT_AVAILABLE`.
pub async fn redeem_link<C: sea_orm::ConnectionTrait>(
    conn: &C,
    link_id: Uuid,
    voucher_code: &str,
    order_id: Uuid,
    now: DateTime<Utc>,
) -> Result<(), ServiceError> {
    use sea_orm::sea_query::Expr;

    let consumed = UserVoucher::update_many()
        .col_expr(user_voucher::Column::Status, Expr::value(UserVoucherStatus::Used))
        .col_expr(user_voucher::Column::UsedAt, Expr::value(Some(now)))
        .col_expr(user_voucher::Column::OrderId, Expr::value(Some(order_id)))
        .filter(user_voucher::Column::Id.eq(link_id))
        .filter(user_voucher::Column::Status.eq(UserVoucherStatus::Active))
        .exec(conn)
        .await?;
    if consumed.rows_affected == 0 {
        warn!(%link_id, voucher = voucher_code, "Voucher consumed by a concurrent checkout");
        return Err(ServiceError::conflict(
            ErrorCode::VoucherNotAvailable,
            format!("Voucher {} has already been used", voucher_code),
        ));
    }
    Ok(())
}

fn rule_outcome(err: ServiceError, voucher: &VoucherModel) -> Result<VoucherValidation, ServiceError> {
    match err {
        ServiceError::BusinessRule { code, message } => {
            Ok(VoucherValidation::rejected(code, message, Some(voucher)))
        }
        other => Err(other),
    }
}
