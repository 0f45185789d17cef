use crate::entities::{
    RecordStatus, period_pricing_entity as pp, registration_period_entity as period,
    registration_tier_entity as tier, upsell_item_entity as upsell,
};
use crate::error::{AppError, AppResult};
use crate::models::UpsellSelection;
use chrono::{DateTime, Utc};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use std::collections::HashMap;

/// Price captured onto a registration at submit time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriceSnapshot {
    pub registration_tier_id: i64,
    pub registration_period_pricing_id: i64,
    pub price: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpsellSnapshot {
    pub upsell_item_id: i64,
    pub quantity: i32,
    pub price_snapshot: i64,
}

impl UpsellSnapshot {
    pub fn line_total(&self) -> i64 {
        self.price_snapshot * i64::from(self.quantity)
    }
}

pub fn upsell_total(lines: &[UpsellSnapshot]) -> i64 {
    lines.iter().map(UpsellSnapshot::line_total).sum()
}

#[derive(Clone)]
pub struct PricingService {
    pool: DatabaseConnection,
}

impl PricingService {
    pub fn new(pool: DatabaseConnection) -> Self {
        Self { pool }
    }

    pub async fn snapshot(
        &self,
        event_id: i64,
        instance_id: i64,
        tier_id: i64,
        period_pricing_id: i64,
        now: DateTime<Utc>,
    ) -> AppResult<PriceSnapshot> {
        tier::Entity::find_by_id(tier_id)
            .filter(tier::Column::EventId.eq(event_id))
            .filter(tier::Column::InstanceId.eq(instance_id))
            .filter(tier::Column::Status.eq(RecordStatus::Active))
            .one(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Registration tier not found".to_string()))?;

        let pricing = pp::Entity::find_by_id(period_pricing_id)
            .filter(pp::Column::RegistrationTierId.eq(tier_id))
            .filter(pp::Column::Status.eq(RecordStatus::Active))
            .one(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Registration pricing not found".to_string()))?;

        if !pricing.available {
            return Err(AppError::ValidationError(
                "This registration option is no longer available".to_string(),
            ));
        }

        let window = period::Entity::find_by_id(pricing.registration_period_id)
            .filter(period::Column::EventId.eq(event_id))
            .filter(period::Column::InstanceId.eq(instance_id))
            .one(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Registration period not found".to_string()))?;

        if !window.is_open_at(now) {
            return Err(AppError::ValidationError(
                "Registration is not open for this period".to_string(),
            ));
        }

        Ok(PriceSnapshot {
            registration_tier_id: tier_id,
            registration_period_pricing_id: pricing.id,
            price: pricing.price,
        })
    }

    pub async fn snapshot_upsells(
        &self,
        event_id: i64,
        instance_id: i64,
        selections: &[UpsellSelection],
    ) -> AppResult<Vec<UpsellSnapshot>> {
        if selections.is_empty() {
            return Ok(Vec::new());
        }
        if let Some(bad) = selections.iter().find(|s| s.quantity < 1) {
            return Err(AppError::ValidationError(format!(
                "Quantity for upsell {} must be at least 1",
                bad.upsell_item_id
            )));
        }

        let ids: Vec<i64> = selections.iter().map(|s| s.upsell_item_id).collect();
        let items: HashMap<i64, upsell::Model> = upsell::Entity::find()
            .filter(upsell::Column::Id.is_in(ids))
            .filter(upsell::Column::EventId.eq(event_id))
            .filter(upsell::Column::InstanceId.eq(instance_id))
            .filter(upsell::Column::Status.eq(RecordStatus::Active))
            .all(&self.pool)
            .await?
            .into_iter()
            .map(|item| (item.id, item))
            .collect();

        selections
            .iter()
            .map(|s| {
                let item = items.get(&s.upsell_item_id).ok_or_else(|| {
                    AppError::NotFound(format!("Upsell item {} not found", s.upsell_item_id))
                })?;
                Ok(UpsellSnapshot {
                    upsell_item_id: item.id,
                    quantity: s.quantity,
                    price_snapshot: item.price,
                })
            })
            .collect()
    }
}
