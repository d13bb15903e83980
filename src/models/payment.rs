use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::{BookingId, PaymentId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    /// Recorded before the gateway is called; the charge is in flight.
    Initiated,
    /// The gateway took the money.
    Success,
    /// Declined, timed out, or abandoned. No money moved.
    Failed,
}

impl PaymentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PaymentStatus::Initiated => "INITIATED",
            PaymentStatus::Success => "SUCCESS",
            PaymentStatus::Failed => "FAILED",
        }
    }
}

impl FromStr for PaymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "INITIATED" => Ok(PaymentStatus::Initiated),
            "SUCCESS" => Ok(PaymentStatus::Success),
            "FAILED" => Ok(PaymentStatus::Failed),
            other => Err(format!("unknown payment status '{}'", other)),
        }
    }
}

/// One charge attempt for a booking. Payments are never deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    /// `TXN...` identifier sent to the gateway, unique across all payments.
    pub transaction_id: String,
    pub booking_id: BookingId,
    /// Booking total at the time of the attempt.
    pub amount: Decimal,
    pub status: PaymentStatus,
    /// Gateway message (and reference, when it sends one) of a successful charge.
    pub gateway_response: Option<String>,
    /// Why the attempt failed.
    pub failure_reason: Option<String>,
    /// Set only on SUCCESS.
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Payment {
    pub fn succeed(&mut self, gateway_response: String) {
        let now = Utc::now();
        self.status = PaymentStatus::Success;
        self.gateway_response = Some(gateway_response);
        self.paid_at = Some(now);
        self.updated_at = now;
    }

    pub fn fail(&mut self, reason: String) {
        self.status = PaymentStatus::Failed;
        self.failure_reason = Some(reason);
        self.updated_at = Utc::now();
    }
}
