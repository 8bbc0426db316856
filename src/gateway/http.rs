use super::{GatewayPaymentStatus, HostedCheckout, PaymentGateway, PaymentLookup, PixCharge};
use crate::{
    config::GatewayConfig,
    entities::{OrderItemModel, OrderModel},
    errors::ServiceError,
};
use async_trait::async_trait;
use base64::Engine;
use rust_decimal::{prelude::ToPrimitive, Decimal};
use serde::Deserialize;
use serde_json::json;
use tracing::{instrument, warn};

/// Processors reject zero-priced line items; anything below a cent is
/// floored to this.
const MIN_ITEM_PRICE: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

/// Mercado Pago REST adapter. Holds a shared HTTP client; all requests are
/// authenticated with the configured bearer token.
pub struct MercadoPagoGateway {
    client: reqwest::Client,
    config: GatewayConfig,
}

impl MercadoPagoGateway {
    pub fn new(config: GatewayConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }
}

#[derive(Debug, Deserialize)]
struct PreferenceResponse {
    id: String,
    init_point: String,
}

#[derive(Debug, Deserialize)]
struct PixPaymentResponse {
    point_of_interaction: PointOfInteraction,
}

#[derive(Debug, Deserialize)]
struct PointOfInteraction {
    transaction_data: TransactionData,
}

#[derive(Debug, Deserialize)]
struct TransactionData {
    qr_code: String,
    qr_code_base64: String,
}

#[async_trait]
impl PaymentGateway for MercadoPagoGateway {
    #[instrument(skip(self, order, items), fields(order_id = %order.id))]
    async fn create_hosted_checkout(
        &self,
        order: &OrderModel,
        items: &[OrderItemModel],
    ) -> Result<HostedCheckout, ServiceError> {
        let line_items: Vec<serde_json::Value> = items
            .iter()
            .map(|item| {
                let title = match &item.variant_label {
                    Some(label) => format!("{} ({})", item.product_name, label),
                    None => item.product_name.clone(),
                };
                json!({
                    "title": title,
                    "quantity": item.quantity,
                    // The processor API takes floats; prices are 2-place
                    // decimals so the conversion is exact.
                    "unit_price": item.unit_price.max(MIN_ITEM_PRICE).to_f64().unwrap_or(0.01),
                })
            })
            .collect();

        let body = json!({
            "items": line_items,
            "back_urls": {
                "success": self.config.success_url,
                "failure": self.config.failure_url,
            },
            "auto_return": "approved",
            "external_reference": order.id.to_string(),
        });

        let response = self
            .client
            .post(self.url("/checkout/preferences"))
            .bearer_auth(&self.config.access_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| ServiceError::GatewayError(format!("preference request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            warn!(%status, detail, "hosted checkout creation rejected");
            return Err(ServiceError::GatewayError(format!(
                "preference creation returned {}",
                status
            )));
        }

        let preference: PreferenceResponse = response
            .json()
            .await
            .map_err(|e| ServiceError::GatewayError(format!("malformed preference response: {}", e)))?;

        Ok(HostedCheckout {
            preference_id: preference.id,
            redirect_url: preference.init_point,
        })
    }

    #[instrument(skip(self, order), fields(order_id = %order.id))]
    async fn create_pix_payment(&self, order: &OrderModel) -> Result<PixCharge, ServiceError> {
        let payer = &self.config.pix_payer;
        let body = json!({
            "transaction_amount": order.total.to_f64().unwrap_or(0.0),
            "description": format!("Order {}", order.id),
            "payment_method_id": "pix",
            "external_reference": order.id.to_string(),
            "payer": {
                "email": payer.email,
                "first_name": payer.first_name,
                "last_name": payer.last_name,
                "identification": {
                    "type": "CPF",
                    "number": payer.document,
                },
            },
        });

        let response = self
            .client
            .post(self.url("/v1/payments"))
            .bearer_auth(&self.config.access_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| ServiceError::GatewayError(format!("pix request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            warn!(%status, detail, "pix charge creation rejected");
            return Err(ServiceError::GatewayError(format!(
                "pix creation returned {}",
                status
            )));
        }

        let payment: PixPaymentResponse = response
            .json()
            .await
            .map_err(|e| ServiceError::GatewayError(format!("malformed pix response: {}", e)))?;
        let data = payment.point_of_interaction.transaction_data;

        // The QR image is rendered straight into the buyer's page; reject
        // undecodable payloads here rather than serving a broken image.
        if base64::engine::general_purpose::STANDARD
            .decode(&data.qr_code_base64)
            .is_err()
        {
            return Err(ServiceError::GatewayError(
                "pix QR image is not valid base64".to_string(),
            ));
        }

        Ok(PixCharge {
            copy_paste_code: data.qr_code,
            qr_image_base64: data.qr_code_base64,
        })
    }

    #[instrument(skip(self))]
    async fn get_payment(&self, payment_id: &str) -> Result<PaymentLookup, ServiceError> {
        let response = self
            .client
            .get(self.url(&format!("/v1/payments/{}", payment_id)))
            .bearer_auth(&self.config.access_token)
            .send()
            .await
            .map_err(|e| ServiceError::GatewayError(format!("payment lookup failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(ServiceError::GatewayError(format!(
                "payment lookup returned {}",
                response.status()
            )));
        }

        #[derive(Deserialize)]
        struct PaymentResponse {
            status: GatewayPaymentStatus,
            external_reference: Option<String>,
        }

        let payment: PaymentResponse = response
            .json()
            .await
            .map_err(|e| ServiceError::GatewayError(format!("malformed payment response: {}", e)))?;

        Ok(PaymentLookup {
            status: payment.status,
            external_reference: payment.external_reference,
        })
    }
}
