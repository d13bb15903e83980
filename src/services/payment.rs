//! Payment lifecycle of a booking.
//!
//! A payment runs in three steps:
//!
//! 1.  Under the trip lock: check the booking and any earlier attempts, then
//!     record an INITIATED payment.
//! 2.  Without any lock: charge through the `PaymentGateway`, bounded by the
//!     configured timeout. Elapsing counts as a failed charge.
//! 3.  Under the trip lock again: settle the payment and, when the booking is
//!     still PENDING, confirm it.
//!
//! Steps 2 and 3 run on a spawned task so a caller that goes away mid-charge
//! cannot leave a payment stuck in INITIATED. If that task dies the payment
//! is failed, and payments left INITIATED by a restart are failed on startup.
//! Every write reaches the `TripStore` before the in-process copy changes.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use super::gateway::{ChargeRequest, PaymentGateway};
use super::ledger::{Ledger, TripEntry};
use crate::config::PaymentConfig;
use crate::error::{AppError, AppResult};
use crate::models::{Booking, BookingId, BookingStatus, Payment, PaymentId, PaymentStatus};

#[derive(Debug, Clone)]
pub struct PaymentSettings {
    pub currency: String,
    pub timeout: Duration,
    /// When set, a booking whose earlier attempts all failed may be charged again.
    pub allow_retry_after_failure: bool,
}

impl From<&PaymentConfig> for PaymentSettings {
    fn from(config: &PaymentConfig) -> Self {
        Self {
            currency: config.currency.clone(),
            timeout: config.timeout(),
            allow_retry_after_failure: config.allow_retry_after_failure,
        }
    }
}

#[derive(Clone)]
pub struct PaymentCoordinator {
    ledger: Arc<Ledger>,
    gateway: Arc<dyn PaymentGateway>,
    settings: PaymentSettings,
}

impl PaymentCoordinator {
    pub fn new(ledger: Arc<Ledger>, gateway: Arc<dyn PaymentGateway>, settings: PaymentSettings) -> Self {
        Self { ledger, gateway, settings }
    }

    /// Charges a PENDING booking once.
    ///
    /// Returns the settled payment whether the charge succeeded or failed; a
    /// declined or timed-out charge is a FAILED payment, not an error. The
    /// one exception is a charge that succeeds after the booking was
    /// cancelled: the payment is kept as SUCCESS for refunding and the call
    /// fails with `InvalidState`.
    pub async fn process_payment(&self, booking_id: BookingId) -> AppResult<Payment> {
        let entry = self.ledger.entry(self.ledger.trip_of(booking_id)?)?;

        let (payment_id, charge) = {
            let mut state = entry.lock().await;
            let booking = state
                .booking(booking_id)
                .ok_or_else(|| AppError::not_found(format!("booking {}", booking_id)))?;

            let attempts = state.payments(booking_id);
            let blocking = if self.settings.allow_retry_after_failure {
                attempts.iter().find(|p| p.status != PaymentStatus::Failed)
            } else {
                attempts.last()
            };
            if let Some(existing) = blocking {
                return Err(AppError::Conflict(format!(
                    "payment {} already exists for booking {}",
                    existing.transaction_id, booking.reference
                )));
            }
            if booking.status != BookingStatus::Pending {
                return Err(AppError::InvalidState(format!(
                    "booking {} is {:?}, only pending bookings can be paid",
                    booking.reference, booking.status
                )));
            }

            let transaction_id = self.ledger.claim_transaction_id(booking_id);
            let charge = ChargeRequest {
                transaction_id: transaction_id.clone(),
                booking_reference: booking.reference.clone(),
                amount: booking.total_amount,
                currency: self.settings.currency.clone(),
                description: format!("Carpool booking {}", booking.reference),
            };

            let now = Utc::now();
            let payment = Payment {
                id: self.ledger.next_payment_id(),
                transaction_id,
                booking_id,
                amount: booking.total_amount,
                status: PaymentStatus::Initiated,
                gateway_response: None,
                failure_reason: None,
                paid_at: None,
                created_at: now,
                updated_at: now,
            };
            let payment_id = payment.id;
            if let Err(e) = self.ledger.store().insert_payment(&payment).await {
                self.ledger.release_transaction_id(&payment.transaction_id);
                error!(booking_id = %booking_id, "Failed to store payment: {}", e);
                return Err(e);
            }
            state.push_payment(payment);
            (payment_id, charge)
        };

        info!(
            booking_id = %booking_id,
            transaction_id = %charge.transaction_id,
            amount = %charge.amount,
            "Payment initiated"
        );

        let coordinator = self.clone();
        let task_entry = entry.clone();
        let transaction_id = charge.transaction_id.clone();
        let task = tokio::spawn(async move {
            coordinator.charge_and_settle(task_entry, booking_id, payment_id, charge).await
        });
        match task.await {
            Ok(result) => result,
            Err(e) => {
                error!(booking_id = %booking_id, transaction_id = %transaction_id, "Payment task died: {}", e);
                let reason = format!("payment task aborted: {}", e);
                if let Err(store_err) = self.abandon(&entry, booking_id, payment_id, reason).await {
                    error!(transaction_id = %transaction_id, "Could not fail abandoned payment: {}", store_err);
                }
                Err(AppError::Internal(format!("payment task for booking {} failed: {}", booking_id, e)))
            }
        }
    }

    async fn charge_and_settle(
        &self,
        entry: Arc<TripEntry>,
        booking_id: BookingId,
        payment_id: PaymentId,
        charge: ChargeRequest,
    ) -> AppResult<Payment> {
        let outcome = match tokio::time::timeout(self.settings.timeout, self.gateway.charge(&charge)).await {
            Ok(result) => result.map_err(|e| e.to_string()),
            Err(_) => Err(format!(
                "payment gateway did not respond within {} ms",
                self.settings.timeout.as_millis()
            )),
        };

        let mut state = entry.lock().await;
        let mut payment = state.payment(booking_id, payment_id).cloned().ok_or_else(|| {
            AppError::Internal(format!("payment {} vanished before settlement", charge.transaction_id))
        })?;
        let pending = state
            .booking(booking_id)
            .filter(|b| b.status == BookingStatus::Pending)
            .cloned();

        let receipt = match outcome {
            Ok(receipt) => receipt,
            Err(reason) => {
                payment.fail(reason);
                self.ledger.store().settle_payment(&payment, None).await?;
                state.replace_payment(payment.clone());
                warn!(
                    booking_id = %booking_id,
                    transaction_id = %payment.transaction_id,
                    reason = payment.failure_reason.as_deref().unwrap_or_default(),
                    "Payment failed, booking stays pending"
                );
                return Ok(payment);
            }
        };

        let response = match &receipt.gateway_reference {
            Some(reference) => format!("{} ({})", receipt.message, reference),
            None => receipt.message,
        };
        payment.succeed(response);

        let Some(booking) = pending else {
            self.ledger.store().settle_payment(&payment, None).await?;
            state.replace_payment(payment.clone());
            error!(
                booking_id = %booking_id,
                transaction_id = %payment.transaction_id,
                "Charge succeeded for a booking that is no longer pending, refund required"
            );
            return Err(AppError::InvalidState(format!(
                "booking {} was cancelled while payment {} was in flight; the charge must be refunded",
                booking_id, payment.transaction_id
            )));
        };

        let confirmed = Booking { status: BookingStatus::Confirmed, updated_at: Utc::now(), ..booking };
        self.ledger.store().settle_payment(&payment, Some(&confirmed)).await?;
        state.replace_payment(payment.clone());
        state.insert_booking(confirmed.clone());

        info!(
            booking_id = %booking_id,
            reference = %confirmed.reference,
            transaction_id = %payment.transaction_id,
            "Payment succeeded, booking confirmed"
        );
        Ok(payment)
    }

    /// Fails a payment whose settle task never finished. A payment that was
    /// settled before the task died is left alone.
    async fn abandon(
        &self,
        entry: &TripEntry,
        booking_id: BookingId,
        payment_id: PaymentId,
        reason: String,
    ) -> AppResult<()> {
        let mut state = entry.lock().await;
        let Some(payment) = state.payment(booking_id, payment_id) else {
            return Ok(());
        };
        if payment.status != PaymentStatus::Initiated {
            return Ok(());
        }
        let mut failed = payment.clone();
        failed.fail(reason);
        self.ledger.store().settle_payment(&failed, None).await?;
        warn!(booking_id = %booking_id, transaction_id = %failed.transaction_id, "Abandoned payment marked failed");
        state.replace_payment(failed);
        Ok(())
    }

    /// Fails every payment still INITIATED, i.e. whose charge was cut off by
    /// a restart. Run once after the ledger is restored.
    pub async fn fail_interrupted(&self) -> AppResult<usize> {
        let mut failed = 0;
        for entry in self.ledger.entries() {
            let mut state = entry.lock().await;
            let stuck: Vec<Payment> = state
                .all_payments()
                .filter(|p| p.status == PaymentStatus::Initiated)
                .cloned()
                .collect();
            for mut payment in stuck {
                payment.fail("payment interrupted by restart".to_string());
                self.ledger.store().settle_payment(&payment, None).await?;
                warn!(transaction_id = %payment.transaction_id, "Interrupted payment marked failed");
                state.replace_payment(payment);
                failed += 1;
            }
        }
        Ok(failed)
    }

    /// Latest payment attempt of a booking.
    pub async fn payment_for_booking(&self, booking_id: BookingId) -> AppResult<Payment> {
        let entry = self.ledger.entry(self.ledger.trip_of(booking_id)?)?;
        let state = entry.lock().await;
        state
            .payments(booking_id)
            .last()
            .cloned()
            .ok_or_else(|| AppError::not_found(format!("payment for booking {}", booking_id)))
    }

    pub async fn payment_by_transaction(&self, transaction_id: &str) -> AppResult<Payment> {
        let booking_id = self
            .ledger
            .booking_for_transaction(transaction_id)
            .ok_or_else(|| AppError::not_found(format!("payment {}", transaction_id)))?;
        let entry = self.ledger.entry(self.ledger.trip_of(booking_id)?)?;
        let state = entry.lock().await;
        state
            .payments(booking_id)
            .iter()
            .find(|p| p.transaction_id == transaction_id)
            .cloned()
            .ok_or_else(|| AppError::not_found(format!("payment {}", transaction_id)))
    }
}
