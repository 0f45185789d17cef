use sea_orm::entity::prelude::*;
use sea_orm::{DeriveActiveEnum, EnumIter};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Logical deletion state. Every query filters on it explicitly.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema, DeriveActiveEnum, EnumIter,
)]
#[sea_orm(rs_type = "String", db_type = "String(Some(16))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecordStatus {
    #[sea_orm(string_value = "ACTIVE")]
    Active,
    #[sea_orm(string_value = "DELETED")]
    Deleted,
}

#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema, DeriveActiveEnum, EnumIter,
)]
#[sea_orm(rs_type = "String", db_type = "String(Some(16))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DigestFrequency {
    #[sea_orm(string_value = "NONE")]
    None,
    #[sea_orm(string_value = "DAILY")]
    Daily,
    #[sea_orm(string_value = "WEEKLY")]
    Weekly,
}

impl DigestFrequency {
    /// Look-back window covered by one digest.
    pub fn window(&self) -> Option<chrono::Duration> {
        match self {
            DigestFrequency::None => None,
            DigestFrequency::Daily => Some(chrono::Duration::days(1)),
            DigestFrequency::Weekly => Some(chrono::Duration::days(7)),
        }
    }
}

impl std::fmt::Display for DigestFrequency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DigestFrequency::None => write!(f, "none"),
            DigestFrequency::Daily => write!(f, "daily"),
            DigestFrequency::Weekly => write!(f, "weekly"),
        }
    }
}

impl std::str::FromStr for DigestFrequency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(DigestFrequency::None),
            "daily" => Ok(DigestFrequency::Daily),
            "weekly" => Ok(DigestFrequency::Weekly),
            other => Err(format!("Unknown digest frequency: {other}")),
        }
    }
}

/// Form field types. The `Participant*` variants are semantic tags used to
/// locate the registrant's identity fields.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema, DeriveActiveEnum, EnumIter,
)]
#[sea_orm(rs_type = "String", db_type = "String(Some(32))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RegistrationFieldType {
    #[sea_orm(string_value = "TEXT")]
    Text,
    #[sea_orm(string_value = "TEXTAREA")]
    Textarea,
    #[sea_orm(string_value = "EMAIL")]
    Email,
    #[sea_orm(string_value = "PHONE")]
    Phone,
    #[sea_orm(string_value = "NUMBER")]
    Number,
    #[sea_orm(string_value = "CHECKBOX")]
    Checkbox,
    #[sea_orm(string_value = "DROPDOWN")]
    Dropdown,
    #[sea_orm(string_value = "DATE")]
    Date,
    #[sea_orm(string_value = "PARTICIPANT_NAME")]
    ParticipantName,
    #[sea_orm(string_value = "PARTICIPANT_EMAIL")]
    ParticipantEmail,
    #[sea_orm(string_value = "PARTICIPANT_PHONE")]
    ParticipantPhone,
}

#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema, DeriveActiveEnum, EnumIter,
)]
#[sea_orm(rs_type = "String", db_type = "String(Some(16))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiscountType {
    #[sea_orm(string_value = "FLAT")]
    Flat,
    #[sea_orm(string_value = "PERCENT")]
    Percent,
}

#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema, DeriveActiveEnum, EnumIter,
)]
#[sea_orm(rs_type = "String", db_type = "String(Some(16))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CouponAppliesTo {
    #[sea_orm(string_value = "REGISTRATION")]
    Registration,
    #[sea_orm(string_value = "UPSELLS")]
    Upsells,
    #[sea_orm(string_value = "BOTH")]
    Both,
}

#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema, DeriveActiveEnum, EnumIter,
)]
#[sea_orm(rs_type = "String", db_type = "String(Some(16))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LedgerSource {
    #[sea_orm(string_value = "REGISTRATION")]
    Registration,
    #[sea_orm(string_value = "MANUAL")]
    Manual,
}

#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema, DeriveActiveEnum, EnumIter,
)]
#[sea_orm(rs_type = "String", db_type = "String(Some(16))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CrmPersonSource {
    #[sea_orm(string_value = "REGISTRATION")]
    Registration,
    #[sea_orm(string_value = "EMAIL")]
    Email,
    #[sea_orm(string_value = "MANUAL")]
    Manual,
}
