use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Decimal places stored by the `NUMERIC(20,4)` money columns.
pub const AMOUNT_SCALE: u32 = 4;

/// True when `amount` is stored without rounding. Trailing zeros are ignored.
pub fn fits_amount_scale(amount: Decimal) -> bool {
    amount.normalize().scale() <= AMOUNT_SCALE
}

/// The single mutable monetary amount attached to an account.
/// Only the balance store writes it, always under a row lock.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AccountBalance {
    pub account_id: Uuid,
    pub user_id: Uuid,
    pub amount: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AccountBalance {
    /// Creates a zero balance for a new account.
    pub fn new(account_id: Uuid, user_id: Uuid) -> Self {
        Self::with_amount(account_id, user_id, Decimal::ZERO)
    }

    /// Creates a balance with an opening amount.
    pub fn with_amount(account_id: Uuid, user_id: Uuid, amount: Decimal) -> Self {
        let now = Utc::now();
        Self {
            account_id,
            user_id,
            amount,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn has_sufficient_funds(&self, amount: Decimal) -> bool {
        self.amount >= amount
    }
}

/// Outcome of a single-account balance mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceUpdate {
    pub account_id: Uuid,
    pub balance: Decimal,
}

/// Balances of both legs after a successful transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferResult {
    pub source_balance: Decimal,
    pub destination_balance: Decimal,
}

impl TransferResult {
    pub fn new(source_balance: Decimal, destination_balance: Decimal) -> Self {
        Self {
            source_balance,
            destination_balance,
        }
    }

    /// Sum of both legs, used to check conservation.
    pub fn total(&self) -> Decimal {
        self.source_balance + self.destination_balance
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_amount_scale_ignores_trailing_zeros() {
        assert!(fits_amount_scale(dec!(0.0001)));
        assert!(fits_amount_scale(dec!(1.50000)));
        assert!(!fits_amount_scale(dec!(0.99995)));
        assert!(!fits_amount_scale(dec!(0.00001)));
    }

    #[test]
    fn test_new_balance_is_zero() {
        let balance = AccountBalance::new(Uuid::new_v4(), Uuid::new_v4());
        assert_eq!(balance.amount, Decimal::ZERO);
        assert!(balance.has_sufficient_funds(Decimal::ZERO));
        assert!(!balance.has_sufficient_funds(dec!(0.01)));
    }

    #[test]
    fn test_with_amount() {
        let balance = AccountBalance::with_amount(Uuid::new_v4(), Uuid::new_v4(), dec!(1000));
        assert_eq!(balance.amount, dec!(1000));
        assert!(balance.has_sufficient_funds(dec!(1000)));
        assert!(!balance.has_sufficient_funds(dec!(1000.0001)));
    }

    #[test]
    fn test_transfer_result_total() {
        let result = TransferResult::new(dec!(500), dec!(600));
        assert_eq!(result.total(), dec!(1100));
    }

    #[test]
    fn test_serialization() {
        let balance = AccountBalance::with_amount(Uuid::new_v4(), Uuid::new_v4(), dec!(100.50));
        let json = serde_json::to_string(&balance).unwrap();
        let deserialized: AccountBalance = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized.amount, dec!(100.50));
    }
}
