use crate::entities::{coupon_entity, event_entity, registration_entity};
use crate::error::{AppError, AppResult};
use crate::external::{NewPaymentIntent, PaymentGateway, PaymentIntentInfo};
use crate::services::coupon_service::compute_discount;
use std::collections::HashMap;
use std::sync::Arc;

/// Totals below this many cents are treated as free.
pub const PAYMENT_THRESHOLD_CENTS: i64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaymentDecision {
    pub requires_payment: bool,
    pub total_before: i64,
    pub discount: i64,
    pub total: i64,
}

pub fn decide(
    registration_price: i64,
    upsell_total: i64,
    coupon: Option<&coupon_entity::Model>,
) -> PaymentDecision {
    let total_before = registration_price + upsell_total;
    let discount = coupon
        .map(|c| compute_discount(c, registration_price, upsell_total))
        .unwrap_or(0);
    let total = (total_before - discount).max(0);

    PaymentDecision {
        requires_payment: total >= PAYMENT_THRESHOLD_CENTS,
        total_before,
        discount,
        total,
    }
}

/// Person paying for a registration, when the form identified one.
#[derive(Debug, Clone, Default)]
pub struct Payer {
    pub email: Option<String>,
    pub name: Option<String>,
}

#[derive(Clone)]
pub struct PaymentService {
    gateway: Arc<dyn PaymentGateway>,
}

impl PaymentService {
    pub fn new(gateway: Arc<dyn PaymentGateway>) -> Self {
        Self { gateway }
    }

    fn connected_account(event: &event_entity::Model) -> AppResult<&str> {
        event
            .stripe_account_id
            .as_deref()
            .filter(|id| !id.is_empty())
            .ok_or_else(|| {
                AppError::ValidationError("This event is not set up to take payments".to_string())
            })
    }

    pub async fn create_registration_intent(
        &self,
        event: &event_entity::Model,
        registration: &registration_entity::Model,
        total: i64,
        payer: &Payer,
    ) -> AppResult<PaymentIntentInfo> {
        let account_id = Self::connected_account(event)?;

        // A missing customer only loses the Stripe-side linkage.
        let customer_id = match payer.email.as_deref() {
            Some(email) => match self
                .gateway
                .find_or_create_customer(account_id, email, payer.name.as_deref())
                .await
            {
                Ok(id) => Some(id),
                Err(e) => {
                    log::warn!(
                        "Could not resolve Stripe customer for registration {}: {e}",
                        registration.id
                    );
                    None
                }
            },
            None => None,
        };

        let metadata = HashMap::from([
            ("registration_id".to_string(), registration.id.to_string()),
            ("event_id".to_string(), registration.event_id.to_string()),
            ("instance_id".to_string(), registration.instance_id.to_string()),
            ("category".to_string(), "registration".to_string()),
        ]);

        let intent = self
            .gateway
            .create_payment_intent(NewPaymentIntent {
                account_id: account_id.to_string(),
                amount: total,
                customer_id,
                description: Some(format!("{} registration #{}", event.name, registration.id)),
                metadata,
            })
            .await?;

        log::info!(
            "Created payment intent {} for registration {} ({} cents)",
            intent.id,
            registration.id,
            total
        );
        Ok(intent)
    }

    pub async fn retrieve_intent(
        &self,
        event: &event_entity::Model,
        payment_intent_id: &str,
    ) -> AppResult<PaymentIntentInfo> {
        let account_id = Self::connected_account(event)?;
        self.gateway
            .retrieve_payment_intent(account_id, payment_intent_id)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{CouponAppliesTo, DiscountType};
    use crate::test_support::*;

    #[test]
    fn flat_registration_coupon_example() {
        let coupon = coupon_model(DiscountType::Flat, 10, CouponAppliesTo::Registration);
        let d = decide(50, 20, Some(&coupon));
        assert_eq!(d.total_before, 70);
        assert_eq!(d.discount, 10);
        assert_eq!(d.total, 60);
        assert!(d.requires_payment);
    }

    #[test]
    fn twenty_cents_is_free() {
        let d = decide(10, 10, None);
        assert_eq!(d.total, 20);
        assert!(!d.requires_payment);
    }

    #[test]
    fn below_threshold_never_requires_payment() {
        let coupons = [
            None,
            Some(coupon_model(DiscountType::Flat, 5, CouponAppliesTo::Both)),
            Some(coupon_model(DiscountType::Percent, 50, CouponAppliesTo::Upsells)),
        ];
        for price in 0..PAYMENT_THRESHOLD_CENTS {
            for coupon in &coupons {
                assert!(!decide(price, 0, coupon.as_ref()).requires_payment);
            }
        }
        assert!(decide(PAYMENT_THRESHOLD_CENTS, 0, None).requires_payment);
    }

    #[test]
    fn total_is_never_negative() {
        let coupon = coupon_model(DiscountType::Flat, 10_000, CouponAppliesTo::Both);
        let d = decide(1_500, 500, Some(&coupon));
        assert_eq!(d.discount, 2_000);
        assert_eq!(d.total, 0);
        assert!(!d.requires_payment);
    }

    #[tokio::test]
    async fn customer_failure_does_not_block_intent() {
        let gateway = Arc::new(FakeGateway::failing_customers());
        let service = PaymentService::new(gateway.clone());
        let db = setup_db().await;
        let scope = seed_scope(&db).await;
        let registration = registration_model(&scope, 4_000);

        let intent = service
            .create_registration_intent(
                &scope.event,
                &registration,
                4_000,
                &Payer {
                    email: Some("runner@example.com".into()),
                    name: None,
                },
            )
            .await
            .unwrap();

        assert_eq!(intent.amount, 4_000);
        assert_eq!(intent.metadata_i64("registration_id"), Some(registration.id));
        assert_eq!(gateway.last_customer(), None);
    }

    #[tokio::test]
    async fn event_without_account_cannot_take_payment() {
        let service = PaymentService::new(Arc::new(FakeGateway::default()));
        let db = setup_db().await;
        let mut scope = seed_scope(&db).await;
        scope.event.stripe_account_id = None;
        let registration = registration_model(&scope, 4_000);

        let err = service
            .create_registration_intent(&scope.event, &registration, 4_000, &Payer::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }
}
