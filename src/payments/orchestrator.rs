use rust_decimal::Decimal;
use sqlx::{Postgres, Transaction};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::commission;
use crate::error::{AppError, AppResult};
use crate::ledger::models::{Commission, CommissionStatus, NeedStatus};
use crate::ledger::repository::LedgerRepository;
use crate::notifier::Notifier;
use crate::payments::processor::{CheckoutMetadata, PaymentProcessor};

/// A transfer that keeps failing stops being retried after this many
/// attempts and stays in `transfer_failed` for operator attention.
const MAX_TRANSFER_ATTEMPTS: i32 = 3;

/// Orchestrator configuration, captured once at startup
#[derive(Debug, Clone)]
pub struct PaymentConfig {
    pub commission_rate: Decimal,
    pub checkout_success_url: String,
    pub checkout_cancel_url: String,
    pub onboarding_refresh_url: String,
    pub onboarding_return_url: String,
}

/// Payment orchestrator - initiates checkouts for mutually approved offers
/// and reconciles asynchronous processor events back into the ledger.
pub struct PaymentOrchestrator {
    ledger: Arc<LedgerRepository>,
    processor: Arc<dyn PaymentProcessor>,
    notifier: Arc<Notifier>,
    config: PaymentConfig,
}

impl PaymentOrchestrator {
    pub fn new(
        ledger: Arc<LedgerRepository>,
        processor: Arc<dyn PaymentProcessor>,
        notifier: Arc<Notifier>,
        config: PaymentConfig,
    ) -> Self {
        Self {
            ledger,
            processor,
            notifier,
            config,
        }
    }

    /// Start a checkout for a mutually approved offer and return the
    /// redirect URL.
    ///
    /// The processor session is created first and the commission row only
    /// after that call succeeds: either both exist or neither does, so an
    /// upstream failure leaves nothing to clean up.
    pub async fn initiate_payment(
        &self,
        need_id: Uuid,
        help_offer_id: Uuid,
        caller: Uuid,
    ) -> AppResult<String> {
        let need = self
            .ledger
            .get_need(need_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("need {}", need_id)))?;

        let offer = self
            .ledger
            .get_offer(help_offer_id)
            .await?
            .filter(|o| o.need_id == need_id)
            .ok_or_else(|| AppError::NotFound(format!("offer {} on need {}", help_offer_id, need_id)))?;

        if need.requester_id != caller {
            return Err(AppError::Forbidden(
                "only the requester may pay for their need".to_string(),
            ));
        }

        if !offer.is_mutually_approved() {
            return Err(AppError::Forbidden(
                "payment requires a mutually approved offer".to_string(),
            ));
        }

        match need.status {
            NeedStatus::Completed => {
                return Err(AppError::Conflict(
                    "this need has already been paid for".to_string(),
                ))
            }
            NeedStatus::Cancelled => {
                return Err(AppError::Conflict("this need was cancelled".to_string()))
            }
            NeedStatus::Open | NeedStatus::InProgress => {}
        }

        let amount = need
            .budget_amount
            .ok_or_else(|| AppError::Invalid("need has no budget amount".to_string()))?;
        if amount <= Decimal::ZERO {
            return Err(AppError::Invalid("budget amount must be positive".to_string()));
        }

        let split = commission::split(amount, self.config.commission_rate);

        let metadata = CheckoutMetadata {
            need_id,
            help_offer_id,
            requester_id: need.requester_id,
            helper_id: offer.helper_id,
            original_amount: amount,
            commission_amount: split.commission_amount,
        };

        // Upstream call first; the local row is written only once the
        // session exists.
        let session = self
            .processor
            .create_checkout_session(
                amount,
                &need.budget_currency,
                &need.title,
                &self.config.checkout_success_url,
                &self.config.checkout_cancel_url,
                metadata,
            )
            .await?;

        let commission = self
            .ledger
            .create_commission(
                need_id,
                help_offer_id,
                offer.helper_id,
                need.requester_id,
                amount,
                split.commission_amount,
                self.config.commission_rate,
                &need.budget_currency,
                &session.id,
            )
            .await?;

        info!(
            "💳 Checkout created: commission={} session={} amount={} {}",
            commission.id, session.id, amount, need.budget_currency
        );

        Ok(session.url)
    }

    /// Reconcile a captured checkout session. Idempotent: the commission row
    /// is locked, and a row already marked completed is left untouched no
    /// matter how many times the processor redelivers the event.
    pub async fn reconcile_payment_completed(
        &self,
        checkout_session_id: &str,
        payment_intent_id: Option<&str>,
    ) -> AppResult<()> {
        let mut tx = self.ledger.begin_tx().await?;

        let commission = match self
            .ledger
            .get_commission_by_session_for_update(&mut tx, checkout_session_id)
            .await?
        {
            Some(c) => c,
            None => {
                warn!(
                    "checkout session {} has no commission record, skipping",
                    checkout_session_id
                );
                return Ok(());
            }
        };

        self.settle_locked(tx, commission, payment_intent_id).await
    }

    /// Re-attempt settlement of a specific commission (onboarding-completion
    /// hook path).
    async fn retry_settlement(&self, commission_id: Uuid) -> AppResult<()> {
        let mut tx = self.ledger.begin_tx().await?;

        let commission = match self
            .ledger
            .get_commission_for_update(&mut tx, commission_id)
            .await?
        {
            Some(c) => c,
            None => return Ok(()),
        };

        self.settle_locked(tx, commission, None).await
    }

    /// Settlement core. Runs with the commission row locked, so duplicate
    /// deliveries and concurrent retries serialize here; the transfer call is
    /// additionally keyed by the commission id at the processor, which is the
    /// at-most-once backstop.
    async fn settle_locked(
        &self,
        mut tx: Transaction<'_, Postgres>,
        commission: Commission,
        payment_intent_id: Option<&str>,
    ) -> AppResult<()> {
        if commission.is_settled() {
            info!(
                "commission {} already completed, duplicate delivery ignored",
                commission.id
            );
            tx.commit().await?;
            return Ok(());
        }

        if commission.transfer_attempts >= MAX_TRANSFER_ATTEMPTS {
            warn!(
                "commission {} exhausted its {} transfer attempts, leaving as {:?}",
                commission.id, MAX_TRANSFER_ATTEMPTS, commission.status
            );
            tx.commit().await?;
            return Ok(());
        }

        // At most one offer per need ever settles. The need row is locked so
        // that captures for two different offers on the same need cannot both
        // pass this check; the loser stays unsettled for the refund path.
        if let Some(need_id) = commission.need_id {
            if let Some(need) = self.ledger.get_need_for_update(&mut tx, need_id).await? {
                if need.status == NeedStatus::Completed {
                    warn!(
                        "commission {} targets need {} which is already settled, leaving as {:?}",
                        commission.id, need_id, commission.status
                    );
                    tx.commit().await?;
                    return Ok(());
                }
            }
        }

        let helper = self
            .ledger
            .get_user(commission.helper_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("helper {}", commission.helper_id)))?;

        let destination = match helper.stripe_account_id.as_deref() {
            Some(account) if helper.payouts_ready => account.to_string(),
            _ => {
                // No transfer is attempted until onboarding completes; the
                // account.updated hook picks the row back up.
                self.ledger
                    .mark_commission_transfer_pending(&mut tx, commission.id, payment_intent_id)
                    .await?;
                tx.commit().await?;

                info!(
                    "commission {} parked as transfer_pending: helper {} not ready for payouts",
                    commission.id, commission.helper_id
                );
                return Ok(());
            }
        };

        // Funds move here and nowhere else. Local writes stay strictly after
        // the upstream call so a failed transfer never looks settled.
        let transfer = match self
            .processor
            .create_transfer(
                commission.helper_amount(),
                &commission.currency,
                &destination,
                commission.id,
            )
            .await
        {
            Ok(transfer) => transfer,
            Err(err) => {
                self.ledger
                    .mark_commission_transfer_failed(&mut tx, commission.id, payment_intent_id)
                    .await?;
                tx.commit().await?;

                warn!(
                    "transfer for commission {} failed (attempt {}): {}",
                    commission.id,
                    commission.transfer_attempts + 1,
                    err
                );
                return Err(err);
            }
        };

        self.ledger
            .mark_commission_completed(&mut tx, commission.id, &transfer.id, payment_intent_id)
            .await?;

        if let Some(need_id) = commission.need_id {
            self.ledger.mark_need_completed(&mut tx, need_id).await?;
        }

        tx.commit().await?;

        info!(
            "✅ Commission {} settled: transfer {} of {} {} to helper {}",
            commission.id,
            transfer.id,
            commission.helper_amount(),
            commission.currency,
            commission.helper_id
        );

        self.notifier
            .notify(
                commission.helper_id,
                "Payment received",
                &format!(
                    "You have been paid {} {} for your help.",
                    commission.helper_amount(),
                    commission.currency
                ),
                commission.need_id,
                commission.help_offer_id,
            )
            .await;
        self.notifier
            .notify(
                commission.requester_id,
                "Payment completed",
                "Your payment has been processed and your helper has been paid.",
                commission.need_id,
                commission.help_offer_id,
            )
            .await;

        Ok(())
    }

    /// Apply a connected-account status event. The onboarding flag is
    /// level-triggered state, so this is a plain overwrite that is safe to
    /// replay or reorder. When the account becomes ready, any commissions
    /// parked on this helper are re-attempted.
    pub async fn reconcile_account_updated(
        &self,
        stripe_account_id: &str,
        details_submitted: bool,
        payouts_enabled: bool,
        user_id: Option<Uuid>,
    ) -> AppResult<()> {
        let ready = details_submitted && payouts_enabled;

        let mut owner = self.ledger.set_payouts_ready(stripe_account_id, ready).await?;

        // The account may not be attached yet if the onboarding redirect
        // raced the webhook; the event metadata tells us whose it is.
        if owner.is_none() {
            if let Some(user_id) = user_id {
                self.ledger.set_stripe_account(user_id, stripe_account_id).await?;
                owner = self.ledger.set_payouts_ready(stripe_account_id, ready).await?;
            }
        }

        let Some(helper_id) = owner else {
            warn!(
                "account.updated for unknown account {}, skipping",
                stripe_account_id
            );
            return Ok(());
        };

        info!(
            "payment account {} for user {}: details_submitted={} payouts_enabled={} -> ready={}",
            stripe_account_id, helper_id, details_submitted, payouts_enabled, ready
        );

        if !ready {
            return Ok(());
        }

        let parked = self
            .ledger
            .list_retryable_commissions_for_helper(helper_id, MAX_TRANSFER_ATTEMPTS)
            .await?;

        for commission in parked {
            debug_assert!(commission.status != CommissionStatus::Completed);
            if let Err(err) = self.retry_settlement(commission.id).await {
                warn!(
                    "retrying commission {} after onboarding failed: {}",
                    commission.id, err
                );
            }
        }

        Ok(())
    }

    /// Create (once) the helper's connected account and hand back a fresh
    /// onboarding link.
    pub async fn start_onboarding(&self, caller: Uuid) -> AppResult<String> {
        let user = self
            .ledger
            .get_user(caller)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("user {}", caller)))?;

        let account_id = match user.stripe_account_id {
            Some(account_id) => account_id,
            None => {
                let account = self
                    .processor
                    .create_connected_account(&user.email, user.id)
                    .await?;
                self.ledger.set_stripe_account(user.id, &account.id).await?;
                account.id
            }
        };

        self.processor
            .create_onboarding_link(
                &account_id,
                &self.config.onboarding_refresh_url,
                &self.config.onboarding_return_url,
            )
            .await
    }
}
