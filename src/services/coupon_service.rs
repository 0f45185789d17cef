use crate::entities::{
    CouponAppliesTo, DiscountType, RecordStatus, coupon_entity as coupon,
    coupons::UNLIMITED_REDEMPTIONS, event_instance_entity as instance,
    registration_entity as registration,
};
use crate::error::{AppError, AppResult};
use crate::models::*;
use crate::services::AuditLogBuffer;
use crate::services::payment_service::decide;
use crate::services::pricing_service::{PricingService, upsell_total};
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    IntoActiveModel, PaginatorTrait, QueryFilter, QueryOrder, Set, SqlErr,
};
use serde_json::json;

/// Discount in cents for the given sub-totals. Never exceeds the eligible
/// sub-total and never goes below zero.
pub fn compute_discount(coupon: &coupon::Model, registration_total: i64, upsell_total: i64) -> i64 {
    let eligible = match coupon.applies_to {
        CouponAppliesTo::Both => registration_total + upsell_total,
        CouponAppliesTo::Registration => registration_total,
        CouponAppliesTo::Upsells => upsell_total,
    };
    if eligible <= 0 {
        return 0;
    }

    let raw = match coupon.discount_type {
        DiscountType::Flat => coupon.amount,
        // whole percent, rounded half-up to the cent
        DiscountType::Percent => (eligible.saturating_mul(coupon.amount) + 50) / 100,
    };
    raw.clamp(0, eligible)
}

pub fn normalize_code(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}

#[derive(Clone)]
pub struct CouponService {
    pool: DatabaseConnection,
    pricing: PricingService,
}

impl CouponService {
    pub fn new(pool: DatabaseConnection, pricing: PricingService) -> Self {
        Self { pool, pricing }
    }

    /// Finalized, active registrations that used the coupon.
    pub async fn redemption_count<C: ConnectionTrait>(db: &C, coupon_id: i64) -> AppResult<u64> {
        Ok(registration::Entity::find()
            .filter(registration::Column::CouponId.eq(coupon_id))
            .filter(registration::Column::Finalized.eq(true))
            .filter(registration::Column::Status.eq(RecordStatus::Active))
            .count(db)
            .await?)
    }

    /// Looks up `code` for the event instance and rejects it when it cannot
    /// be applied right now.
    pub async fn validate_for_registration<C: ConnectionTrait>(
        db: &C,
        event_id: i64,
        instance_id: i64,
        code: &str,
        now: DateTime<Utc>,
    ) -> AppResult<coupon::Model> {
        let code = normalize_code(code);
        if code.is_empty() {
            return Err(AppError::coupon_invalid());
        }

        let found = coupon::Entity::find()
            .filter(coupon::Column::EventId.eq(event_id))
            .filter(coupon::Column::InstanceId.eq(instance_id))
            .filter(coupon::Column::Code.eq(code))
            .filter(coupon::Column::Status.eq(RecordStatus::Active))
            .one(db)
            .await?
            .ok_or_else(AppError::coupon_invalid)?;

        if let Some(ends_at) = found.ends_at
            && ends_at <= now
        {
            return Err(AppError::coupon_expired());
        }

        if !found.is_unlimited() {
            let used = Self::redemption_count(db, found.id).await?;
            if used as i64 >= found.max_redemptions {
                return Err(AppError::coupon_exhausted());
            }
        }

        Ok(found)
    }

    pub async fn create_coupon(
        &self,
        event_id: i64,
        instance_id: i64,
        req: CreateCouponRequest,
        audit: &mut AuditLogBuffer,
    ) -> AppResult<CouponResponse> {
        let code = normalize_code(&req.code);
        if code.is_empty() || code.len() > 64 {
            return Err(AppError::ValidationError(
                "Coupon code must be between 1 and 64 characters".to_string(),
            ));
        }
        if !code
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(AppError::ValidationError(
                "Coupon code may only contain letters, digits, '-' and '_'".to_string(),
            ));
        }
        if req.amount <= 0 {
            return Err(AppError::ValidationError(
                "Coupon amount must be positive".to_string(),
            ));
        }
        let max_redemptions = req.max_redemptions.unwrap_or(UNLIMITED_REDEMPTIONS);
        if max_redemptions != UNLIMITED_REDEMPTIONS && max_redemptions < 1 {
            return Err(AppError::ValidationError(
                "max_redemptions must be -1 (unlimited) or at least 1".to_string(),
            ));
        }

        instance::Entity::find_by_id(instance_id)
            .filter(instance::Column::EventId.eq(event_id))
            .filter(instance::Column::Status.eq(RecordStatus::Active))
            .one(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Event instance not found".to_string()))?;

        // Codes stay reserved after soft delete so redemption history is unambiguous.
        let existing = coupon::Entity::find()
            .filter(coupon::Column::EventId.eq(event_id))
            .filter(coupon::Column::InstanceId.eq(instance_id))
            .filter(coupon::Column::Code.eq(code.clone()))
            .one(&self.pool)
            .await?;
        if existing.is_some() {
            return Err(AppError::Conflict(format!("Coupon code {code} already exists")));
        }

        let now = Utc::now();
        let created = coupon::ActiveModel {
            event_id: Set(event_id),
            instance_id: Set(instance_id),
            code: Set(code.clone()),
            name: Set(req.name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty())),
            discount_type: Set(req.discount_type),
            amount: Set(req.amount),
            applies_to: Set(req.applies_to),
            max_redemptions: Set(max_redemptions),
            ends_at: Set(req.ends_at),
            status: Set(RecordStatus::Active),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&self.pool)
        .await
        .map_err(|e| match e.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(_)) => {
                AppError::Conflict(format!("Coupon code {code} already exists"))
            }
            _ => AppError::DatabaseError(e),
        })?;

        audit.push(
            Some(event_id),
            "coupon",
            Some(created.id),
            "coupon.created",
            json!({ "code": created.code, "amount": created.amount }),
        );
        Ok(created.into())
    }

    pub async fn list_coupons(
        &self,
        event_id: i64,
        instance_id: i64,
        params: &PaginationParams,
    ) -> AppResult<PaginatedResponse<CouponResponse>> {
        let paginator = coupon::Entity::find()
            .filter(coupon::Column::EventId.eq(event_id))
            .filter(coupon::Column::InstanceId.eq(instance_id))
            .filter(coupon::Column::Status.eq(RecordStatus::Active))
            .order_by_desc(coupon::Column::CreatedAt)
            .order_by_desc(coupon::Column::Id)
            .paginate(&self.pool, params.page_size());

        let total = paginator.num_items().await?;
        let items = paginator
            .fetch_page(params.page_index())
            .await?
            .into_iter()
            .map(CouponResponse::from)
            .collect();

        Ok(PaginatedResponse::new(items, params, total))
    }

    pub async fn delete_coupon(&self, coupon_id: i64, audit: &mut AuditLogBuffer) -> AppResult<()> {
        let found = coupon::Entity::find_by_id(coupon_id)
            .filter(coupon::Column::Status.eq(RecordStatus::Active))
            .one(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Coupon not found".to_string()))?;

        let event_id = found.event_id;
        let mut active = found.into_active_model();
        active.status = Set(RecordStatus::Deleted);
        active.updated_at = Set(Utc::now());
        active.update(&self.pool).await?;

        audit.push(
            Some(event_id),
            "coupon",
            Some(coupon_id),
            "coupon.deleted",
            json!({}),
        );
        Ok(())
    }

    /// Prices a selection with the coupon applied without creating anything.
    pub async fn quote(
        &self,
        event_id: i64,
        instance_id: i64,
        req: &QuoteCouponRequest,
    ) -> AppResult<QuoteCouponResponse> {
        let now = Utc::now();
        let (price, upsells) = tokio::try_join!(
            self.pricing.snapshot(
                event_id,
                instance_id,
                req.registration_tier_id,
                req.registration_period_pricing_id,
                now,
            ),
            self.pricing
                .snapshot_upsells(event_id, instance_id, &req.upsells),
        )?;

        let found =
            Self::validate_for_registration(&self.pool, event_id, instance_id, &req.code, now)
                .await?;
        let decision = decide(price.price, upsell_total(&upsells), Some(&found));

        Ok(QuoteCouponResponse {
            coupon_id: found.id,
            total_before: decision.total_before,
            discount: decision.discount,
            total: decision.total,
            requires_payment: decision.requires_payment,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::*;
    use chrono::Duration;

    #[test]
    fn eligible_subtotal_follows_applies_to() {
        let reg = coupon_model(DiscountType::Flat, 10, CouponAppliesTo::Registration);
        assert_eq!(compute_discount(&reg, 50, 20), 10);
        let ups = coupon_model(DiscountType::Flat, 100, CouponAppliesTo::Upsells);
        assert_eq!(compute_discount(&ups, 50, 20), 20);
        let both = coupon_model(DiscountType::Flat, 100, CouponAppliesTo::Both);
        assert_eq!(compute_discount(&both, 50, 20), 70);
    }

    #[test]
    fn nothing_eligible_means_no_discount() {
        let ups = coupon_model(DiscountType::Percent, 50, CouponAppliesTo::Upsells);
        assert_eq!(compute_discount(&ups, 5_000, 0), 0);
    }

    #[test]
    fn percent_is_capped_at_eligible() {
        let over = coupon_model(DiscountType::Percent, 150, CouponAppliesTo::Both);
        assert_eq!(compute_discount(&over, 100, 0), 100);
        let quarter = coupon_model(DiscountType::Percent, 25, CouponAppliesTo::Both);
        assert_eq!(compute_discount(&quarter, 3_000, 1_000), 1_000);
    }

    #[test]
    fn percent_rounds_half_up() {
        let c = coupon_model(DiscountType::Percent, 15, CouponAppliesTo::Registration);
        // 15% of 1_010 is 151.5
        assert_eq!(compute_discount(&c, 1_010, 0), 152);
        // 15% of 1_003 is 150.45
        assert_eq!(compute_discount(&c, 1_003, 0), 150);
    }

    #[test]
    fn both_never_exceeds_total() {
        for amount in [0, 1, 99, 100, 101, 5_000] {
            for (r, u) in [(0, 0), (50, 20), (1_000, 0), (0, 999)] {
                let flat = coupon_model(DiscountType::Flat, amount, CouponAppliesTo::Both);
                let pct = coupon_model(DiscountType::Percent, amount, CouponAppliesTo::Both);
                assert!(compute_discount(&flat, r, u) <= r + u);
                assert!(compute_discount(&pct, r, u) <= r + u);
                assert!(compute_discount(&pct, r, u) >= 0);
            }
        }
    }

    #[tokio::test]
    async fn validation_rejects_with_user_messages() {
        let db = setup_db().await;
        let scope = seed_scope(&db).await;
        let now = Utc::now();

        let err = CouponService::validate_for_registration(
            &db,
            scope.event.id,
            scope.instance.id,
            "NOPE",
            now,
        )
        .await
        .unwrap_err();
        assert_eq!(err.to_string(), AppError::coupon_invalid().to_string());

        let expired = seed_coupon(&db, &scope, "EARLY", -1, Some(now - Duration::hours(1))).await;
        let err = CouponService::validate_for_registration(
            &db,
            scope.event.id,
            scope.instance.id,
            &expired.code,
            now,
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("Coupon has expired"));

        let ok = seed_coupon(&db, &scope, "team10", -1, Some(now + Duration::days(1))).await;
        let found = CouponService::validate_for_registration(
            &db,
            scope.event.id,
            scope.instance.id,
            " Team10 ",
            now,
        )
        .await
        .unwrap();
        assert_eq!(found.id, ok.id);
    }

    #[tokio::test]
    async fn redemption_limit_counts_finalized_registrations_only() {
        let db = setup_db().await;
        let scope = seed_scope(&db).await;
        let pricing = seed_pricing(&db, &scope, 5_000).await;
        let single = seed_coupon(&db, &scope, "ONCE", 1, None).await;

        seed_registration(&db, &scope, &pricing, Some(single.id), false).await;
        CouponService::validate_for_registration(&db, scope.event.id, scope.instance.id, "ONCE", Utc::now())
            .await
            .unwrap();

        seed_registration(&db, &scope, &pricing, Some(single.id), true).await;
        let err = CouponService::validate_for_registration(
            &db,
            scope.event.id,
            scope.instance.id,
            "ONCE",
            Utc::now(),
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("Coupon has reached its redemption limit"));
    }

    #[tokio::test]
    async fn create_list_delete_cycle() {
        let db = setup_db().await;
        let scope = seed_scope(&db).await;
        let service = CouponService::new(db.clone(), PricingService::new(db.clone()));
        let mut audit = AuditLogBuffer::new();

        let req = CreateCouponRequest {
            code: "vip-20".into(),
            name: Some("VIP".into()),
            discount_type: DiscountType::Percent,
            amount: 20,
            applies_to: CouponAppliesTo::Both,
            max_redemptions: None,
            ends_at: None,
        };
        let created = service
            .create_coupon(scope.event.id, scope.instance.id, req.clone(), &mut audit)
            .await
            .unwrap();
        assert_eq!(created.code, "VIP-20");
        assert_eq!(created.max_redemptions, UNLIMITED_REDEMPTIONS);

        let dup = service
            .create_coupon(scope.event.id, scope.instance.id, req.clone(), &mut audit)
            .await
            .unwrap_err();
        assert!(matches!(dup, AppError::Conflict(_)));

        let page = service
            .list_coupons(scope.event.id, scope.instance.id, &PaginationParams::default())
            .await
            .unwrap();
        assert_eq!(page.total, 1);

        service.delete_coupon(created.id, &mut audit).await.unwrap();
        let page = service
            .list_coupons(scope.event.id, scope.instance.id, &PaginationParams::default())
            .await
            .unwrap();
        assert_eq!(page.total, 0);
        assert!(matches!(
            service.delete_coupon(created.id, &mut audit).await,
            Err(AppError::NotFound(_))
        ));
        assert_eq!(audit.len(), 2);
    }

    #[tokio::test]
    async fn quote_applies_coupon_to_selection() {
        let db = setup_db().await;
        let scope = seed_scope(&db).await;
        let pricing = seed_pricing(&db, &scope, 5_000).await;
        let shirt = seed_upsell(&db, &scope, 2_000).await;
        seed_coupon(&db, &scope, "HALF", -1, None).await;
        let service = CouponService::new(db.clone(), PricingService::new(db.clone()));

        let quote = service
            .quote(
                scope.event.id,
                scope.instance.id,
                &QuoteCouponRequest {
                    code: "half".into(),
                    registration_tier_id: scope.tier.id,
                    registration_period_pricing_id: pricing.id,
                    upsells: vec![UpsellSelection {
                        upsell_item_id: shirt.id,
                        quantity: 1,
                    }],
                },
            )
            .await
            .unwrap();
        assert_eq!(quote.total_before, 7_000);
        assert_eq!(quote.discount, 3_500);
        assert_eq!(quote.total, 3_500);
        assert!(quote.requires_payment);
    }
}
