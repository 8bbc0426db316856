pub mod http;

use crate::entities::{OrderItemModel, OrderModel};
use crate::errors::ServiceError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Payment status as reported by the external processor. Statuses this
/// service does not act on collapse into `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GatewayPaymentStatus {
    Approved,
    Pending,
    InProcess,
    Rejected,
    Cancelled,
    #[serde(other)]
    Unknown,
}

/// A created hosted-checkout session: the buyer is redirected to
/// `redirect_url`, which the processor hosts.
#[derive(Debug, Clone, Serialize)]
pub struct HostedCheckout {
    pub preference_id: String,
    pub redirect_url: String,
}

/// A created Pix charge: textual copy-paste code plus the QR image.
#[derive(Debug, Clone, Serialize)]
pub struct PixCharge {
    pub copy_paste_code: String,
    pub qr_image_base64: String,
}

/// Synchronous payment lookup, used to verify webhook notifications instead
/// of trusting status values embedded in the callback.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentLookup {
    pub status: GatewayPaymentStatus,
    pub external_reference: Option<String>,
}

/// Boundary to the external payment processor. All calls are side-effecting
/// blocking awaits with no automatic retry; a failure surfaces immediately
/// to the invoking flow.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Creates a processor-hosted checkout session for the order and returns
    /// the page URL to redirect the buyer to.
    async fn create_hosted_checkout(
        &self,
        order: &OrderModel,
        items: &[OrderItemModel],
    ) -> Result<HostedCheckout, ServiceError>;

    /// Creates a direct Pix charge for the order's total.
    async fn create_pix_payment(&self, order: &OrderModel) -> Result<PixCharge, ServiceError>;

    /// Looks up a payment by the processor's id.
    async fn get_payment(&self, payment_id: &str) -> Result<PaymentLookup, ServiceError>;
}
