use crate::{
    errors::ApiError,
    handlers::common::{created_response, validate_input},
    services::orders::ShippingInfo,
    AppState,
};
use axum::{
    extract::{Json, State},
    routing::post,
    Router,
};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

/// Creates the router for checkout submission
pub fn checkout_routes() -> Router<Arc<AppState>> {
    Router::new().route("/", post(submit_checkout))
}

/// Submit the session cart as an order for the given customer
async fn submit_checkout(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CheckoutRequest>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    validate_input(&payload)?;

    let shipping = ShippingInfo {
        address: payload.address.into_snapshot(),
    };
    let order = state
        .services
        .checkout
        .submit(&payload.session_id, payload.customer_id, shipping)
        .await?;

    Ok(created_response(order))
}

#[derive(Debug, Deserialize, Validate)]
pub struct CheckoutRequest {
    #[validate(length(min = 1, message = "Session id is required"))]
    pub session_id: String,
    pub customer_id: Uuid,
    #[validate]
    pub address: AddressRequest,
}

/// Shipping address fields collected at checkout. Flattened into a text
/// snapshot on the order.
#[derive(Debug, Deserialize, Validate)]
pub struct AddressRequest {
    #[validate(length(min = 1, message = "Street is required"))]
    pub street: String,
    #[validate(length(min = 1, message = "Number is required"))]
    pub number: String,
    pub complement: Option<String>,
    #[validate(length(min = 1, message = "Neighborhood is required"))]
    pub neighborhood: String,
    #[validate(length(min = 1, message = "City is required"))]
    pub city: String,
    #[validate(length(min = 2, max = 2, message = "State must be a 2-letter code"))]
    pub state: String,
    #[validate(length(min = 1, message = "Zip code is required"))]
    pub zip_code: String,
}

impl AddressRequest {
    fn into_snapshot(self) -> String {
        let mut snapshot = format!("{}, {}", self.street, self.number);
        if let Some(complement) = self.complement.filter(|c| !c.trim().is_empty()) {
            snapshot.push_str(&format!(" ({})", complement));
        }
        snapshot.push_str(&format!(
            " - {} - {}/{} - {}",
            self.neighborhood, self.city, self.state, self.zip_code
        ));
        snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn address() -> AddressRequest {
        AddressRequest {
            street: "Rua das Flores".to_string(),
            number: "100".to_string(),
            complement: None,
            neighborhood: "Centro".to_string(),
            city: "Curitiba".to_string(),
            state: "PR".to_string(),
            zip_code: "80000-000".to_string(),
        }
    }

    #[test]
    fn address_snapshot_is_readable() {
        let snapshot = address().into_snapshot();
        assert_eq!(snapshot, "Rua das Flores, 100 - Centro - Curitiba/PR - 80000-000");
    }

    #[test]
    fn complement_is_included_when_present() {
        let mut addr = address();
        addr.complement = Some("apto 12".to_string());
        assert!(addr.into_snapshot().contains("(apto 12)"));
    }

    #[test]
    fn blank_state_fails_validation() {
        let mut addr = address();
        addr.state = "PRX".to_string();
        assert!(addr.validate().is_err());
    }
}
