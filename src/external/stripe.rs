use crate::config::StripeConfig;
use crate::error::{AppError, AppResult};
use async_trait::async_trait;
use std::collections::HashMap;
use stripe::{
    AccountId, Client, CreateCustomer, CreatePaymentIntent,
    CreatePaymentIntentAutomaticPaymentMethods, Currency, Customer, CustomerId, Event,
    EventObject, Expandable, ListCustomers, PaymentIntent, PaymentIntentId, PaymentIntentStatus,
    Webhook,
};

/// Provider-neutral view of a Stripe PaymentIntent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentIntentInfo {
    pub id: String,
    pub client_secret: Option<String>,
    pub amount: i64,
    pub succeeded: bool,
    pub metadata: HashMap<String, String>,
    pub receipt_url: Option<String>,
}

impl PaymentIntentInfo {
    pub fn metadata_i64(&self, key: &str) -> Option<i64> {
        self.metadata.get(key).and_then(|v| v.parse().ok())
    }
}

impl From<PaymentIntent> for PaymentIntentInfo {
    fn from(pi: PaymentIntent) -> Self {
        let receipt_url = match pi.latest_charge {
            Some(Expandable::Object(ref charge)) => charge.receipt_url.clone(),
            _ => None,
        };
        Self {
            id: pi.id.to_string(),
            client_secret: pi.client_secret,
            amount: pi.amount,
            succeeded: pi.status == PaymentIntentStatus::Succeeded,
            metadata: pi.metadata.into_iter().collect(),
            receipt_url,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewPaymentIntent {
    /// Connected account that receives the funds.
    pub account_id: String,
    pub amount: i64,
    pub customer_id: Option<String>,
    pub description: Option<String>,
    pub metadata: HashMap<String, String>,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Returns the id of a customer with this email on the connected account,
    /// creating one when none exists.
    async fn find_or_create_customer(
        &self,
        account_id: &str,
        email: &str,
        name: Option<&str>,
    ) -> AppResult<String>;

    async fn create_payment_intent(&self, req: NewPaymentIntent) -> AppResult<PaymentIntentInfo>;

    async fn retrieve_payment_intent(
        &self,
        account_id: &str,
        payment_intent_id: &str,
    ) -> AppResult<PaymentIntentInfo>;
}

#[derive(Clone)]
pub struct StripeService {
    client: Client,
    config: StripeConfig,
}

impl StripeService {
    pub fn new(config: StripeConfig) -> Self {
        Self {
            client: Client::new(config.secret_key.clone()),
            config,
        }
    }

    fn connected_client(&self, account_id: &str) -> AppResult<Client> {
        let account: AccountId = account_id.parse().map_err(|_| {
            AppError::ConfigError(format!("Invalid Stripe account id: {account_id}"))
        })?;
        Ok(self.client.clone().with_stripe_account(account))
    }

    fn currency(&self) -> AppResult<Currency> {
        match self.config.currency.to_ascii_lowercase().as_str() {
            "usd" => Ok(Currency::USD),
            "cad" => Ok(Currency::CAD),
            "eur" => Ok(Currency::EUR),
            "gbp" => Ok(Currency::GBP),
            "aud" => Ok(Currency::AUD),
            other => Err(AppError::ConfigError(format!(
                "Unsupported currency: {other}"
            ))),
        }
    }

    /// Verifies the `Stripe-Signature` header and parses the event.
    pub fn verify_webhook(&self, payload: &str, signature: &str) -> AppResult<Event> {
        Webhook::construct_event(payload, signature, &self.config.webhook_secret)
            .map_err(|e| AppError::AuthError(format!("Invalid webhook signature: {e}")))
    }
}

/// Pulls the PaymentIntent out of a `payment_intent.*` event.
pub fn payment_intent_from_event(event: Event) -> AppResult<PaymentIntentInfo> {
    match event.data.object {
        EventObject::PaymentIntent(pi) => Ok(pi.into()),
        _ => Err(AppError::ValidationError(
            "Event does not carry a PaymentIntent".to_string(),
        )),
    }
}

#[async_trait]
impl PaymentGateway for StripeService {
    async fn find_or_create_customer(
        &self,
        account_id: &str,
        email: &str,
        name: Option<&str>,
    ) -> AppResult<String> {
        let client = self.connected_client(account_id)?;

        let mut list = ListCustomers::new();
        list.email = Some(email);
        list.limit = Some(1);
        let existing = Customer::list(&client, &list).await?;
        if let Some(customer) = existing.data.into_iter().next() {
            return Ok(customer.id.to_string());
        }

        let mut create = CreateCustomer::new();
        create.email = Some(email);
        create.name = name;
        let customer = Customer::create(&client, create).await?;
        log::info!("Created Stripe customer {} on {account_id}", customer.id);
        Ok(customer.id.to_string())
    }

    async fn create_payment_intent(&self, req: NewPaymentIntent) -> AppResult<PaymentIntentInfo> {
        let client = self.connected_client(&req.account_id)?;

        let mut params = CreatePaymentIntent::new(req.amount, self.currency()?);
        params.automatic_payment_methods = Some(CreatePaymentIntentAutomaticPaymentMethods {
            enabled: true,
            allow_redirects: None,
        });
        params.description = req.description.as_deref();
        params.metadata = Some(req.metadata.clone());
        if let Some(customer_id) = req.customer_id.as_deref() {
            match customer_id.parse::<CustomerId>() {
                Ok(id) => params.customer = Some(id),
                Err(_) => log::warn!("Ignoring malformed Stripe customer id {customer_id}"),
            }
        }

        let pi = PaymentIntent::create(&client, params).await.map_err(|e| {
            log::error!("Stripe PaymentIntent creation failed: {e}");
            AppError::ExternalApiError(format!("Failed to create payment intent: {e}"))
        })?;
        Ok(pi.into())
    }

    async fn retrieve_payment_intent(
        &self,
        account_id: &str,
        payment_intent_id: &str,
    ) -> AppResult<PaymentIntentInfo> {
        let client = self.connected_client(account_id)?;
        let id: PaymentIntentId = payment_intent_id.parse().map_err(|_| {
            AppError::ValidationError(format!("Invalid payment intent id: {payment_intent_id}"))
        })?;
        let pi = PaymentIntent::retrieve(&client, &id, &["latest_charge"]).await?;
        Ok(pi.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(currency: &str) -> StripeConfig {
        StripeConfig {
            secret_key: "sk_test_123".to_string(),
            webhook_secret: "whsec_123".to_string(),
            currency: currency.to_string(),
        }
    }

    #[test]
    fn currency_is_read_from_config() {
        assert_eq!(StripeService::new(config("USD")).currency().unwrap(), Currency::USD);
        assert!(StripeService::new(config("xyz")).currency().is_err());
    }

    #[test]
    fn rejects_bad_connected_account() {
        let service = StripeService::new(config("usd"));
        assert!(service.connected_client("not-an-account").is_err());
        assert!(service.connected_client("acct_123").is_ok());
    }

    #[test]
    fn unsigned_webhook_is_rejected() {
        let service = StripeService::new(config("usd"));
        let err = service.verify_webhook("{}", "t=1,v1=deadbeef").unwrap_err();
        assert!(matches!(err, AppError::AuthError(_)));
    }

    #[test]
    fn reads_numeric_metadata() {
        let info = PaymentIntentInfo {
            id: "pi_1".into(),
            client_secret: None,
            amount: 100,
            succeeded: true,
            metadata: HashMap::from([("registration_id".to_string(), "42".to_string())]),
            receipt_url: None,
        };
        assert_eq!(info.metadata_i64("registration_id"), Some(42));
        assert_eq!(info.metadata_i64("event_id"), None);
    }
}
