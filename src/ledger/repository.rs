use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::models::*;
use crate::error::{AppError, AppResult};
use crate::offers::state::{ApprovalParty, OfferState};

/// Ledger repository - THE source of truth for all state
pub struct LedgerRepository {
    pub pool: PgPool,
}

impl LedgerRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn begin_tx(&self) -> AppResult<Transaction<'_, Postgres>> {
        Ok(self.pool.begin().await?)
    }

    // ========== USER OPERATIONS ==========

    pub async fn create_user(
        &self,
        display_name: &str,
        email: &str,
        phone: Option<String>,
    ) -> AppResult<User> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (display_name, email, phone)
            VALUES ($1, $2, $3)
            RETURNING id, display_name, email, phone, stripe_account_id,
                      payouts_ready, created_at, updated_at
            "#,
        )
        .bind(display_name)
        .bind(email)
        .bind(phone)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::from_db(e, "a user with this email already exists"))?;

        Ok(user)
    }

    pub async fn get_user(&self, user_id: Uuid) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, display_name, email, phone, stripe_account_id,
                   payouts_ready, created_at, updated_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    /// Attach a freshly created connected account to the helper's profile.
    /// Only the first attachment wins; onboarding restarts reuse the stored id.
    pub async fn set_stripe_account(&self, user_id: Uuid, account_id: &str) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE users
            SET stripe_account_id = $2, updated_at = NOW()
            WHERE id = $1 AND stripe_account_id IS NULL
            "#,
        )
        .bind(user_id)
        .bind(account_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Level-triggered overwrite of the onboarding-complete flag. Safe to
    /// apply any number of times and out of order. Returns the owning user id
    /// when the account is known.
    pub async fn set_payouts_ready(
        &self,
        stripe_account_id: &str,
        ready: bool,
    ) -> AppResult<Option<Uuid>> {
        let row = sqlx::query_scalar::<_, Uuid>(
            r#"
            UPDATE users
            SET payouts_ready = $2, updated_at = NOW()
            WHERE stripe_account_id = $1
            RETURNING id
            "#,
        )
        .bind(stripe_account_id)
        .bind(ready)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    // ========== NEED OPERATIONS ==========

    #[allow(clippy::too_many_arguments)]
    pub async fn create_need(
        &self,
        requester_id: Uuid,
        title: &str,
        description: &str,
        category: NeedCategory,
        budget_amount: Option<Decimal>,
        budget_currency: &str,
        location: Option<String>,
        needed_by: Option<NaiveDate>,
    ) -> AppResult<Need> {
        let need = sqlx::query_as::<_, Need>(
            r#"
            INSERT INTO needs (
                requester_id, title, description, category,
                budget_amount, budget_currency, location, needed_by
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id, requester_id, title, description, category,
                      budget_amount, budget_currency, location, needed_by,
                      status, created_at, updated_at
            "#,
        )
        .bind(requester_id)
        .bind(title)
        .bind(description)
        .bind(category)
        .bind(budget_amount)
        .bind(budget_currency)
        .bind(location)
        .bind(needed_by)
        .fetch_one(&self.pool)
        .await?;

        Ok(need)
    }

    pub async fn get_need(&self, need_id: Uuid) -> AppResult<Option<Need>> {
        let need = sqlx::query_as::<_, Need>(
            r#"
            SELECT id, requester_id, title, description, category,
                   budget_amount, budget_currency, location, needed_by,
                   status, created_at, updated_at
            FROM needs
            WHERE id = $1
            "#,
        )
        .bind(need_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(need)
    }

    /// Owner-only cancellation of a still-open need
    pub async fn cancel_need(&self, need_id: Uuid, caller: Uuid) -> AppResult<Need> {
        let need = self
            .get_need(need_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("need {}", need_id)))?;

        if !need.is_owned_by(caller) {
            return Err(AppError::Forbidden(
                "only the requester may cancel their need".to_string(),
            ));
        }

        let result = sqlx::query(
            r#"
            UPDATE needs
            SET status = 'cancelled', updated_at = NOW()
            WHERE id = $1 AND status = 'open'
            "#,
        )
        .bind(need_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::Conflict(
                "only open needs can be cancelled".to_string(),
            ));
        }

        self.get_need(need_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("need {}", need_id)))
    }

    /// Owner-only deletion. Offers cascade away; commissions and
    /// notifications keep their rows with the need reference nulled.
    pub async fn delete_need(&self, need_id: Uuid, caller: Uuid) -> AppResult<()> {
        let need = self
            .get_need(need_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("need {}", need_id)))?;

        if !need.is_owned_by(caller) {
            return Err(AppError::Forbidden(
                "only the requester may delete their need".to_string(),
            ));
        }

        sqlx::query("DELETE FROM needs WHERE id = $1")
            .bind(need_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Lock a need row for the duration of a settlement transaction.
    /// Settlements of different commissions on the same need serialize here,
    /// which is what keeps "at most one completed settlement per need" true.
    pub async fn get_need_for_update(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        need_id: Uuid,
    ) -> AppResult<Option<Need>> {
        let need = sqlx::query_as::<_, Need>(
            r#"
            SELECT id, requester_id, title, description, category,
                   budget_amount, budget_currency, location, needed_by,
                   status, created_at, updated_at
            FROM needs
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(need_id)
        .fetch_optional(&mut **tx)
        .await?;

        Ok(need)
    }

    /// Settlement transition, driven only by the payment orchestrator.
    /// Idempotent: completing an already completed need affects no rows.
    pub async fn mark_need_completed(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        need_id: Uuid,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE needs
            SET status = 'completed', updated_at = NOW()
            WHERE id = $1 AND status <> 'completed'
            "#,
        )
        .bind(need_id)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }

    // ========== HELP OFFER OPERATIONS ==========

    /// Create an offer on an open need. Enforces the one-offer-per-helper
    /// uniqueness and the owner-never-helper rule at the boundary.
    pub async fn create_offer(
        &self,
        need_id: Uuid,
        helper_id: Uuid,
        message: Option<String>,
        helper_approved: bool,
    ) -> AppResult<(HelpOffer, Need)> {
        let need = self
            .get_need(need_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("need {}", need_id)))?;

        if need.is_owned_by(helper_id) {
            return Err(AppError::Forbidden(
                "cannot offer help on your own need".to_string(),
            ));
        }

        if !need.is_open() {
            return Err(AppError::Conflict(
                "offers can only be made on open needs".to_string(),
            ));
        }

        let offer = sqlx::query_as::<_, HelpOffer>(
            r#"
            INSERT INTO help_offers (need_id, helper_id, message, state)
            VALUES ($1, $2, $3, $4)
            RETURNING id, need_id, helper_id, message, state, created_at, updated_at
            "#,
        )
        .bind(need_id)
        .bind(helper_id)
        .bind(message)
        .bind(OfferState::initial(helper_approved))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::from_db(e, "you have already offered help on this need"))?;

        Ok((offer, need))
    }

    pub async fn get_offer(&self, offer_id: Uuid) -> AppResult<Option<HelpOffer>> {
        let offer = sqlx::query_as::<_, HelpOffer>(
            r#"
            SELECT id, need_id, helper_id, message, state, created_at, updated_at
            FROM help_offers
            WHERE id = $1
            "#,
        )
        .bind(offer_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(offer)
    }

    pub async fn list_offers_for_need(&self, need_id: Uuid) -> AppResult<Vec<HelpOffer>> {
        let offers = sqlx::query_as::<_, HelpOffer>(
            r#"
            SELECT id, need_id, helper_id, message, state, created_at, updated_at
            FROM help_offers
            WHERE need_id = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(need_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(offers)
    }

    /// Apply an approval to an offer. The row is locked FOR UPDATE so that
    /// near-simultaneous approvals from both parties serialize and neither
    /// is lost; the pure transition in `offers::state` decides the new state.
    ///
    /// Returns the updated offer, its need, and whether this call made the
    /// offer mutually approved.
    pub async fn approve_offer(
        &self,
        offer_id: Uuid,
        caller: Uuid,
    ) -> AppResult<(HelpOffer, Need, bool)> {
        let mut tx = self.begin_tx().await?;

        let offer = sqlx::query_as::<_, HelpOffer>(
            r#"
            SELECT id, need_id, helper_id, message, state, created_at, updated_at
            FROM help_offers
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(offer_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("offer {}", offer_id)))?;

        let need = sqlx::query_as::<_, Need>(
            r#"
            SELECT id, requester_id, title, description, category,
                   budget_amount, budget_currency, location, needed_by,
                   status, created_at, updated_at
            FROM needs
            WHERE id = $1
            "#,
        )
        .bind(offer.need_id)
        .fetch_one(&mut *tx)
        .await?;

        let party = if caller == need.requester_id {
            ApprovalParty::Requester
        } else if caller == offer.helper_id {
            ApprovalParty::Helper
        } else {
            return Err(AppError::Forbidden(
                "only the requester or the helper may approve this offer".to_string(),
            ));
        };

        let new_state = offer.state.approve(party);
        let became_mutual = new_state.is_mutually_approved() && !offer.state.is_mutually_approved();

        let offer = if new_state != offer.state {
            sqlx::query_as::<_, HelpOffer>(
                r#"
                UPDATE help_offers
                SET state = $2, updated_at = NOW()
                WHERE id = $1
                RETURNING id, need_id, helper_id, message, state, created_at, updated_at
                "#,
            )
            .bind(offer_id)
            .bind(new_state)
            .fetch_one(&mut *tx)
            .await?
        } else {
            offer
        };

        tx.commit().await?;

        Ok((offer, need, became_mutual))
    }

    /// Helper-only withdrawal, legal while not mutually approved. The guard
    /// is part of the DELETE itself so a racing approval cannot be undone.
    pub async fn withdraw_offer(&self, offer_id: Uuid, caller: Uuid) -> AppResult<()> {
        let offer = self
            .get_offer(offer_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("offer {}", offer_id)))?;

        if offer.helper_id != caller {
            return Err(AppError::Forbidden(
                "only the helper may withdraw their offer".to_string(),
            ));
        }

        let result = sqlx::query(
            r#"
            DELETE FROM help_offers
            WHERE id = $1 AND state <> 'mutually_approved'
            "#,
        )
        .bind(offer_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::Conflict(
                "a mutually approved offer can no longer be withdrawn".to_string(),
            ));
        }

        Ok(())
    }

    // ========== COMMISSION OPERATIONS ==========

    /// Persist the commission row for a freshly created checkout session.
    /// Called strictly after the processor call succeeded; the session id is
    /// unique, so a replayed insert surfaces as Conflict instead of a
    /// duplicate row.
    #[allow(clippy::too_many_arguments)]
    pub async fn create_commission(
        &self,
        need_id: Uuid,
        help_offer_id: Uuid,
        helper_id: Uuid,
        requester_id: Uuid,
        original_amount: Decimal,
        commission_amount: Decimal,
        commission_rate: Decimal,
        currency: &str,
        checkout_session_id: &str,
    ) -> AppResult<Commission> {
        let commission = sqlx::query_as::<_, Commission>(
            r#"
            INSERT INTO commissions (
                need_id, help_offer_id, helper_id, requester_id,
                original_amount, commission_amount, commission_rate,
                currency, checkout_session_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING id, need_id, help_offer_id, helper_id, requester_id,
                      original_amount, commission_amount, commission_rate,
                      currency, checkout_session_id, payment_intent_id,
                      transfer_id, status, transfer_attempts,
                      created_at, completed_at
            "#,
        )
        .bind(need_id)
        .bind(help_offer_id)
        .bind(helper_id)
        .bind(requester_id)
        .bind(original_amount)
        .bind(commission_amount)
        .bind(commission_rate)
        .bind(currency)
        .bind(checkout_session_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::from_db(e, "a commission for this checkout session already exists"))?;

        Ok(commission)
    }

    /// Load a commission by its checkout session id and lock the row for the
    /// duration of the reconciliation transaction. The lock is what makes
    /// duplicate webhook deliveries serialize instead of double-transferring.
    pub async fn get_commission_by_session_for_update(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        checkout_session_id: &str,
    ) -> AppResult<Option<Commission>> {
        let commission = sqlx::query_as::<_, Commission>(
            r#"
            SELECT id, need_id, help_offer_id, helper_id, requester_id,
                   original_amount, commission_amount, commission_rate,
                   currency, checkout_session_id, payment_intent_id,
                   transfer_id, status, transfer_attempts,
                   created_at, completed_at
            FROM commissions
            WHERE checkout_session_id = $1
            FOR UPDATE
            "#,
        )
        .bind(checkout_session_id)
        .fetch_optional(&mut **tx)
        .await?;

        Ok(commission)
    }

    pub async fn get_commission_for_update(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        commission_id: Uuid,
    ) -> AppResult<Option<Commission>> {
        let commission = sqlx::query_as::<_, Commission>(
            r#"
            SELECT id, need_id, help_offer_id, helper_id, requester_id,
                   original_amount, commission_amount, commission_rate,
                   currency, checkout_session_id, payment_intent_id,
                   transfer_id, status, transfer_attempts,
                   created_at, completed_at
            FROM commissions
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(commission_id)
        .fetch_optional(&mut **tx)
        .await?;

        Ok(commission)
    }

    /// Payment captured but helper not ready for payouts: park the
    /// commission until onboarding completes.
    pub async fn mark_commission_transfer_pending(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        commission_id: Uuid,
        payment_intent_id: Option<&str>,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE commissions
            SET status = 'transfer_pending',
                payment_intent_id = COALESCE($2, payment_intent_id)
            WHERE id = $1 AND status <> 'completed'
            "#,
        )
        .bind(commission_id)
        .bind(payment_intent_id)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }

    /// Record the transfer and close out the commission. Guarded on status so
    /// a replay against an already completed row affects nothing.
    pub async fn mark_commission_completed(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        commission_id: Uuid,
        transfer_id: &str,
        payment_intent_id: Option<&str>,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE commissions
            SET status = 'completed',
                transfer_id = $2,
                payment_intent_id = COALESCE($3, payment_intent_id),
                transfer_attempts = transfer_attempts + 1,
                completed_at = NOW()
            WHERE id = $1 AND status <> 'completed'
            "#,
        )
        .bind(commission_id)
        .bind(transfer_id)
        .bind(payment_intent_id)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }

    pub async fn mark_commission_transfer_failed(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        commission_id: Uuid,
        payment_intent_id: Option<&str>,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE commissions
            SET status = 'transfer_failed',
                payment_intent_id = COALESCE($2, payment_intent_id),
                transfer_attempts = transfer_attempts + 1
            WHERE id = $1 AND status <> 'completed'
            "#,
        )
        .bind(commission_id)
        .bind(payment_intent_id)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }

    /// Commissions for a helper that are still waiting on a transfer and have
    /// retry budget left. Fed by the account.updated reconciliation hook.
    pub async fn list_retryable_commissions_for_helper(
        &self,
        helper_id: Uuid,
        max_attempts: i32,
    ) -> AppResult<Vec<Commission>> {
        let commissions = sqlx::query_as::<_, Commission>(
            r#"
            SELECT id, need_id, help_offer_id, helper_id, requester_id,
                   original_amount, commission_amount, commission_rate,
                   currency, checkout_session_id, payment_intent_id,
                   transfer_id, status, transfer_attempts,
                   created_at, completed_at
            FROM commissions
            WHERE helper_id = $1
              AND status IN ('transfer_pending', 'transfer_failed')
              AND transfer_attempts < $2
            ORDER BY created_at ASC
            "#,
        )
        .bind(helper_id)
        .bind(max_attempts)
        .fetch_all(&self.pool)
        .await?;

        Ok(commissions)
    }

    // ========== NOTIFICATION OPERATIONS ==========

    pub async fn insert_notification(
        &self,
        recipient_id: Uuid,
        title: &str,
        message: &str,
        need_id: Option<Uuid>,
        help_offer_id: Option<Uuid>,
    ) -> AppResult<Notification> {
        let notification = sqlx::query_as::<_, Notification>(
            r#"
            INSERT INTO notifications (recipient_id, title, message, need_id, help_offer_id)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, recipient_id, title, message, is_read,
                      need_id, help_offer_id, created_at
            "#,
        )
        .bind(recipient_id)
        .bind(title)
        .bind(message)
        .bind(need_id)
        .bind(help_offer_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(notification)
    }

    pub async fn list_notifications(&self, recipient_id: Uuid) -> AppResult<Vec<Notification>> {
        let notifications = sqlx::query_as::<_, Notification>(
            r#"
            SELECT id, recipient_id, title, message, is_read,
                   need_id, help_offer_id, created_at
            FROM notifications
            WHERE recipient_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(recipient_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(notifications)
    }

    /// Recipient-only read-flag mutation. Scoping the UPDATE by recipient
    /// means someone else's notification id reads as NotFound.
    pub async fn mark_notification_read(&self, notification_id: Uuid, caller: Uuid) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE notifications
            SET is_read = TRUE
            WHERE id = $1 AND recipient_id = $2
            "#,
        )
        .bind(notification_id)
        .bind(caller)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "notification {}",
                notification_id
            )));
        }

        Ok(())
    }
}
