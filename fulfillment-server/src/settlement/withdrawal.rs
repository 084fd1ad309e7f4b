//! Withdrawal Service
//!
//! 提现校验：`min_withdrawal ≤ amount ≤ total_earnings − total_withdrawn`。
//! 可提现额度按累计收入（含现金订单）计算，而不只是线上钱包余额。
//!
//! | 阶段 | total_withdrawn | wallet_balance |
//! |------|-----------------|----------------|
//! | 申请（Pending） | += amount（冻结） | 不变 |
//! | 完成（Completed） | 不变 | −= amount（最低为 0） |
//! | 失败 / 取消 | −= amount（解冻） | 不变 |
//!
//! 自动审批时申请与完成在同一事务内发生。

use crate::core::error::{FulfillmentError, FulfillmentResult};
use crate::ledger::LedgerStorage;
use crate::notify::NotificationSink;
use crate::orders::money::withdrawal_fee;
use rust_decimal::Decimal;
use shared::message::{Channel, LifecycleEvent};
use shared::models::{
    Account, ProcessWithdrawalRequest, Withdrawal, WithdrawalRequest, WithdrawalStatus,
};
use shared::util::{now_millis, prefixed_id};
use std::sync::Arc;

/// Payout-relevant fields of a vendor or rider
struct PayoutLedger<'a> {
    total_earnings: Decimal,
    total_withdrawn: &'a mut Decimal,
    wallet_balance: &'a mut Decimal,
}

fn payout_ledger(account: &mut Account) -> Option<PayoutLedger<'_>> {
    match account {
        Account::Vendor(v) => Some(PayoutLedger {
            total_earnings: v.wallet.total_earnings,
            total_withdrawn: &mut v.wallet.total_withdrawn,
            wallet_balance: &mut v.wallet.wallet_balance,
        }),
        Account::Rider(r) => Some(PayoutLedger {
            total_earnings: r.total_earnings,
            total_withdrawn: &mut r.total_withdrawn,
            wallet_balance: &mut r.wallet_balance,
        }),
        _ => None,
    }
}

fn account_channel(account: &Account) -> Option<Channel> {
    match account {
        Account::Vendor(v) => Some(Channel::Vendor(v.id.clone())),
        Account::Rider(r) => Some(Channel::Rider(r.id.clone())),
        _ => None,
    }
}

#[derive(Clone)]
pub struct WithdrawalService {
    storage: LedgerStorage,
    sink: Arc<dyn NotificationSink>,
    min_withdrawal: Decimal,
    auto_approve: bool,
}

impl std::fmt::Debug for WithdrawalService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WithdrawalService")
            .field("min_withdrawal", &self.min_withdrawal)
            .field("auto_approve", &self.auto_approve)
            .finish_non_exhaustive()
    }
}

impl WithdrawalService {
    pub fn new(
        storage: LedgerStorage,
        sink: Arc<dyn NotificationSink>,
        min_withdrawal: Decimal,
        auto_approve: bool,
    ) -> Self {
        Self {
            storage,
            sink,
            min_withdrawal,
            auto_approve,
        }
    }

    /// Request a payout for a vendor or rider
    pub fn request_withdrawal(&self, req: WithdrawalRequest) -> FulfillmentResult<Withdrawal> {
        if req.amount <= Decimal::ZERO {
            return Err(FulfillmentError::Validation(format!(
                "withdrawal amount must be positive, got {}",
                req.amount
            )));
        }
        if req.amount < self.min_withdrawal {
            return Err(FulfillmentError::BelowMinimumWithdrawal {
                requested: req.amount,
                minimum: self.min_withdrawal,
            });
        }

        let txn = self.storage.begin_write()?;
        let mut account = self
            .storage
            .get_account_txn(&txn, &req.account_id)?
            .ok_or_else(|| FulfillmentError::AccountNotFound(req.account_id.clone()))?;
        let role = account.role();
        let bank = account.bank().cloned();

        let now = now_millis();
        let (fee, net_amount) = withdrawal_fee(req.amount);
        let status = if self.auto_approve {
            WithdrawalStatus::Completed
        } else {
            WithdrawalStatus::Pending
        };

        // 先判角色，再要求银行信息
        let bank = {
            let ledger = payout_ledger(&mut account).ok_or_else(|| {
                FulfillmentError::WithdrawalNotAllowed {
                    account_id: req.account_id.clone(),
                    role,
                }
            })?;
            let bank =
                bank.ok_or_else(|| FulfillmentError::BankDetailsMissing(req.account_id.clone()))?;
            let available = ledger.total_earnings - *ledger.total_withdrawn;
            if req.amount > available {
                return Err(FulfillmentError::InsufficientBalance {
                    requested: req.amount,
                    available,
                });
            }
            *ledger.total_withdrawn += req.amount;
            if status == WithdrawalStatus::Completed {
                *ledger.wallet_balance = (*ledger.wallet_balance - req.amount).max(Decimal::ZERO);
            }
            bank
        };

        let withdrawal = Withdrawal {
            id: prefixed_id("wd"),
            account_id: req.account_id.clone(),
            role,
            amount: req.amount,
            fee,
            net_amount,
            status,
            requested_at: now,
            processed_at: (status == WithdrawalStatus::Completed).then_some(now),
            bank,
            note: None,
        };

        self.storage.put_account(&txn, &account)?;
        self.storage.put_withdrawal(&txn, &withdrawal)?;
        txn.commit()?;

        tracing::info!(
            withdrawal_id = %withdrawal.id,
            account_id = %withdrawal.account_id,
            amount = %withdrawal.amount,
            fee = %withdrawal.fee,
            status = ?withdrawal.status,
            "Withdrawal requested"
        );

        if withdrawal.status.is_final() {
            self.notify(&account, &withdrawal);
        }
        Ok(withdrawal)
    }

    /// Administrative decision on a pending withdrawal
    pub fn process_withdrawal(
        &self,
        withdrawal_id: &str,
        req: ProcessWithdrawalRequest,
    ) -> FulfillmentResult<Withdrawal> {
        let txn = self.storage.begin_write()?;
        let mut withdrawal = self
            .storage
            .get_withdrawal_txn(&txn, withdrawal_id)?
            .ok_or_else(|| FulfillmentError::WithdrawalNotFound(withdrawal_id.to_string()))?;
        if withdrawal.status.is_final() {
            return Err(FulfillmentError::WithdrawalAlreadyProcessed(withdrawal_id.to_string()));
        }

        let mut account = self
            .storage
            .get_account_txn(&txn, &withdrawal.account_id)?
            .ok_or_else(|| FulfillmentError::AccountNotFound(withdrawal.account_id.clone()))?;

        let status = req.outcome.target_status();
        {
            let ledger = payout_ledger(&mut account).ok_or_else(|| {
                FulfillmentError::Validation(format!("{} accounts cannot withdraw", withdrawal.role))
            })?;
            match status {
                WithdrawalStatus::Completed => {
                    *ledger.wallet_balance =
                        (*ledger.wallet_balance - withdrawal.amount).max(Decimal::ZERO);
                }
                // 解冻
                _ => *ledger.total_withdrawn -= withdrawal.amount,
            }
        }

        withdrawal.status = status;
        withdrawal.processed_at = Some(now_millis());
        withdrawal.note = req.note;

        self.storage.put_account(&txn, &account)?;
        self.storage.put_withdrawal(&txn, &withdrawal)?;
        txn.commit()?;

        tracing::info!(withdrawal_id = %withdrawal_id, status = ?status, "Withdrawal processed");
        self.notify(&account, &withdrawal);
        Ok(withdrawal)
    }

    pub fn list_withdrawals(&self, account_id: Option<&str>) -> FulfillmentResult<Vec<Withdrawal>> {
        Ok(self.storage.list_withdrawals(account_id)?)
    }

    fn notify(&self, account: &Account, withdrawal: &Withdrawal) {
        let event = LifecycleEvent::WithdrawalProcessed {
            withdrawal_id: withdrawal.id.clone(),
            account_id: withdrawal.account_id.clone(),
            status: withdrawal.status,
            net_amount: withdrawal.net_amount,
        };
        let mut channels: Vec<Channel> = account_channel(account).into_iter().collect();
        channels.push(Channel::Admin);
        self.sink.publish_many(channels, event);
    }
}
