use std::io::Write;

use anyhow::{Context, Result};
use csv::Writer;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::account::{AccountNumber, AccountStatus, AccountType};

#[derive(Debug, Serialize)]
pub struct AccountRow {
    pub account: AccountNumber,
    pub owner: String,
    #[serde(rename = "type")]
    pub account_type: AccountType,
    pub status: AccountStatus,
    pub balance: Decimal,
}

pub fn print_accounts<W>(output: &mut W, accounts: impl Iterator<Item = AccountRow>) -> Result<()>
where
    W: Write,
{
    let mut writer = Writer::from_writer(output);
    for row in accounts {
        let account = row.account;
        writer
            .serialize(row)
            .with_context(|| format!("Failed to write account {account}"))?;
    }
    writer.flush().context("Failed to flush account table")
}
