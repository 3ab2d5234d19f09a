use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use thiserror::Error;

use crate::{
    account::{AccountNumber, AccountType, ContactDetails, Customer},
    record::TransactionKind,
};

/// Fractional digits accepted for monetary input.
pub const MONEY_SCALE: u32 = 2;

pub const INITIAL_DEPOSIT_DESCRIPTION: &str = "Initial deposit";
pub const DEFAULT_DESCRIPTION: &str = "Manual transaction by employee";

const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("Invalid amount `{input}`: {reason}")]
    InvalidAmount { input: String, reason: &'static str },
    #[error("{field} is required")]
    MissingField { field: &'static str },
    #[error("Invalid {field}: `{value}`")]
    InvalidField { field: &'static str, value: String },
}

fn invalid_amount(amount: impl ToString, reason: &'static str) -> CommandError {
    CommandError::InvalidAmount {
        input: amount.to_string(),
        reason,
    }
}

fn check_scale(amount: Decimal) -> Result<Decimal, CommandError> {
    if amount.normalize().scale() > MONEY_SCALE {
        return Err(invalid_amount(amount, "at most two fractional digits are allowed"));
    }
    let mut amount = amount;
    amount.rescale(MONEY_SCALE);
    Ok(amount)
}

/// Amount of a deposit or withdrawal: strictly positive, two fractional digits.
pub fn validate_amount(amount: Decimal) -> Result<Decimal, CommandError> {
    if amount <= Decimal::ZERO {
        return Err(invalid_amount(amount, "must be positive"));
    }
    check_scale(amount)
}

/// Amount funding a new account: zero is allowed.
pub fn validate_opening_deposit(amount: Decimal) -> Result<Decimal, CommandError> {
    if amount < Decimal::ZERO {
        return Err(invalid_amount(amount, "must not be negative"));
    }
    check_scale(amount)
}

fn parse_decimal(input: &str) -> Result<Decimal, CommandError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(invalid_amount(input, "amount is required"));
    }
    Decimal::from_str(trimmed).map_err(|_| invalid_amount(input, "not a number"))
}

pub fn parse_amount(input: &str) -> Result<Decimal, CommandError> {
    validate_amount(parse_decimal(input)?)
}

pub fn parse_account_number(input: &str) -> Result<AccountNumber, CommandError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(CommandError::MissingField {
            field: "account number",
        });
    }
    trimmed
        .parse()
        .map_err(|_| CommandError::InvalidField {
            field: "account number",
            value: input.to_string(),
        })
}

pub fn parse_account_type(input: &str) -> Result<AccountType, CommandError> {
    match input.trim().to_ascii_lowercase().as_str() {
        "savings" => Ok(AccountType::Savings),
        "current" => Ok(AccountType::Current),
        _ => Err(CommandError::InvalidField {
            field: "account type",
            value: input.to_string(),
        }),
    }
}

/// Trims `value` and fails when nothing is left.
pub fn required(value: &str, field: &'static str) -> Result<String, CommandError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(CommandError::MissingField { field })
    } else {
        Ok(trimmed.to_string())
    }
}

fn optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// A validated deposit or withdrawal request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovementCommand {
    pub account_number: AccountNumber,
    pub kind: TransactionKind,
    pub amount: Decimal,
    pub description: String,
}

impl MovementCommand {
    pub fn parse(
        account_number: &str,
        kind: TransactionKind,
        amount: &str,
        description: Option<&str>,
    ) -> Result<Self, CommandError> {
        Ok(Self {
            account_number: parse_account_number(account_number)?,
            kind,
            amount: parse_amount(amount)?,
            description: description
                .map(str::trim)
                .filter(|d| !d.is_empty())
                .unwrap_or(DEFAULT_DESCRIPTION)
                .to_string(),
        })
    }
}

/// Raw account opening form as typed in by the operator.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OpenAccountForm {
    pub first_name: String,
    pub last_name: String,
    /// `YYYY-MM-DD`
    pub date_of_birth: String,
    pub gender: Option<String>,
    pub national_id: String,
    pub pan: String,
    pub account_type: String,
    pub initial_deposit: String,
    pub mobile: String,
    pub email: Option<String>,
    pub address: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenAccountCommand {
    pub owner: Customer,
    pub account_type: AccountType,
    pub initial_deposit: Decimal,
}

impl OpenAccountForm {
    pub fn parse(self) -> Result<OpenAccountCommand, CommandError> {
        let first_name = required(&self.first_name, "first name")?;
        let last_name = required(&self.last_name, "last name")?;
        let date_of_birth = required(&self.date_of_birth, "date of birth")?;
        let date_of_birth = NaiveDate::parse_from_str(&date_of_birth, DATE_FORMAT).map_err(|_| {
            CommandError::InvalidField {
                field: "date of birth",
                value: date_of_birth.clone(),
            }
        })?;
        let contact = ContactDetails {
            address: required(&self.address, "address")?,
            city: required(&self.city, "city")?,
            state: required(&self.state, "state")?,
            postal_code: required(&self.postal_code, "postal code")?,
            mobile: required(&self.mobile, "mobile")?,
            email: optional(self.email),
        };
        // identifiers are compared case-insensitively, like the unique columns they replace
        let national_id = required(&self.national_id, "national id")?.to_ascii_uppercase();
        let pan = required(&self.pan, "PAN")?.to_ascii_uppercase();
        let account_type = parse_account_type(&self.account_type)?;
        let initial_deposit = validate_opening_deposit(parse_decimal(&self.initial_deposit)?)?;

        Ok(OpenAccountCommand {
            owner: Customer {
                first_name,
                last_name,
                date_of_birth,
                gender: optional(self.gender),
                national_id,
                pan,
                contact,
            },
            account_type,
            initial_deposit,
        })
    }
}
