use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Product classification of an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "account_type", rename_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum AccountType {
    /// Everyday savings account.
    SavingAccount,
    /// Credit line or loan account.
    CreditLoan,
    /// Savings account tracking progress towards a goal.
    GoalDrivenSaving,
}

/// Origin of an account flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "flag_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum FlagType {
    System,
    User,
}

/// A bank account owned by exactly one user.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Account {
    pub id: Uuid,
    pub user_id: Uuid,
    #[sqlx(rename = "type")]
    pub account_type: AccountType,
    pub currency: String,
    pub account_number: String,
    pub issuer: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Account {
    pub fn new(
        user_id: Uuid,
        account_type: AccountType,
        currency: String,
        account_number: String,
        issuer: String,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            account_type,
            currency,
            account_number,
            issuer,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    /// Returns true if the account has been soft-deleted.
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// Presentation details of an account.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AccountDetail {
    pub account_id: Uuid,
    pub user_id: Uuid,
    pub color: String,
    pub is_main_account: bool,
    pub progress: i32,
}

/// A system- or user-assigned label on an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct AccountFlag {
    pub id: i64,
    pub account_id: Uuid,
    pub user_id: Uuid,
    pub flag_type: FlagType,
    pub flag_value: String,
    pub created_at: DateTime<Utc>,
}

/// Flattened read model of an account with its detail, balance and flags.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AccountWithDetails {
    pub id: Uuid,
    pub user_id: Uuid,
    #[sqlx(rename = "type")]
    pub account_type: AccountType,
    pub currency: String,
    pub account_number: String,
    pub issuer: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub color: String,
    pub is_main_account: bool,
    pub progress: i32,
    pub amount: Decimal,
    #[sqlx(skip)]
    pub flags: Vec<AccountFlag>,
}

impl AccountWithDetails {
    /// Returns the flag values of the given type.
    pub fn flag_values(&self, flag_type: FlagType) -> Vec<&str> {
        self.flags
            .iter()
            .filter(|flag| flag.flag_type == flag_type)
            .map(|flag| flag.flag_value.as_str())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_account_type_wire_names() {
        assert_eq!(
            serde_json::to_string(&AccountType::SavingAccount).unwrap(),
            "\"saving-account\""
        );
        assert_eq!(
            serde_json::to_string(&AccountType::CreditLoan).unwrap(),
            "\"credit-loan\""
        );
        let parsed: AccountType = serde_json::from_str("\"goal-driven-saving\"").unwrap();
        assert_eq!(parsed, AccountType::GoalDrivenSaving);
    }

    #[test]
    fn test_account_creation() {
        let user_id = Uuid::new_v4();
        let account = Account::new(
            user_id,
            AccountType::SavingAccount,
            "THB".to_string(),
            "568-2-81740-9".to_string(),
            "TestLab".to_string(),
        );

        assert_eq!(account.user_id, user_id);
        assert_eq!(account.currency, "THB");
        assert_eq!(account.created_at, account.updated_at);
        assert!(!account.is_deleted());
    }

    #[test]
    fn test_flag_values_filters_by_type() {
        let account_id = Uuid::new_v4();
        let user_id = Uuid::new_v4();
        let flag = |id, flag_type, value: &str| AccountFlag {
            id,
            account_id,
            user_id,
            flag_type,
            flag_value: value.to_string(),
            created_at: Utc::now(),
        };

        let details = AccountWithDetails {
            id: account_id,
            user_id,
            account_type: AccountType::SavingAccount,
            currency: "THB".to_string(),
            account_number: "111-1-11111-1".to_string(),
            issuer: "TestLab".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            color: "#24c875".to_string(),
            is_main_account: true,
            progress: 0,
            amount: dec!(100),
            flags: vec![
                flag(1, FlagType::System, "Disbursement"),
                flag(2, FlagType::User, "Flag11"),
                flag(3, FlagType::System, "Overdue"),
            ],
        };

        assert_eq!(details.flag_values(FlagType::System), vec!["Disbursement", "Overdue"]);
        assert_eq!(details.flag_values(FlagType::User), vec!["Flag11"]);
    }
}
