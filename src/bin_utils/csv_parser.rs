use std::io::Read;

use csv::{StringRecord, StringRecordsIntoIter, Trim};
use serde::Deserialize;

use crate::command::OpenAccountForm;

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Open,
    Deposit,
    Withdraw,
    Close,
}

/// One row of the operations file. Which columns matter depends on `kind`:
/// `open` reads the customer columns and `amount` as the initial deposit,
/// `deposit`/`withdraw` read `account`, `amount` and `text` (description),
/// `close` reads `account`, `text` (reason) and `operator`.
#[derive(Debug, Deserialize)]
pub struct Operation {
    #[serde(rename = "type")]
    pub kind: OperationKind,
    pub account: Option<String>,
    pub amount: Option<String>,
    pub text: Option<String>,
    pub operator: Option<u32>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub date_of_birth: Option<String>,
    pub gender: Option<String>,
    pub national_id: Option<String>,
    pub pan: Option<String>,
    pub account_type: Option<String>,
    pub mobile: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
}

impl Operation {
    pub fn open_form(&self) -> OpenAccountForm {
        let text = |value: &Option<String>| value.clone().unwrap_or_default();
        OpenAccountForm {
            first_name: text(&self.first_name),
            last_name: text(&self.last_name),
            date_of_birth: text(&self.date_of_birth),
            gender: self.gender.clone(),
            national_id: text(&self.national_id),
            pan: text(&self.pan),
            account_type: text(&self.account_type),
            initial_deposit: self.amount.clone().unwrap_or_else(|| "0".to_string()),
            mobile: text(&self.mobile),
            email: self.email.clone(),
            address: text(&self.address),
            city: text(&self.city),
            state: text(&self.state),
            postal_code: text(&self.postal_code),
        }
    }
}

/// Parses an operations list in CSV format, yielding each row with the line
/// it starts on.
pub struct CsvOperationParser<R> {
    headers: StringRecord,
    iter: StringRecordsIntoIter<R>,
}

impl<R> CsvOperationParser<R>
where
    R: Read,
{
    pub fn new(source: R) -> csv::Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(Trim::All)
            .flexible(true)
            .from_reader(source);
        let headers = reader.headers()?.clone();

        Ok(Self {
            headers,
            iter: reader.into_records(),
        })
    }
}

impl<R> Iterator for CsvOperationParser<R>
where
    R: Read,
{
    type Item = (u64, csv::Result<Operation>);

    fn next(&mut self) -> Option<Self::Item> {
        let record = self.iter.next()?;
        Some(match record {
            Ok(record) => {
                let line = record.position().map_or(0, |pos| pos.line());
                (line, record.deserialize(Some(&self.headers)))
            }
            Err(err) => {
                let line = err.position().map_or(0, |pos| pos.line());
                (line, Err(err))
            }
        })
    }
}
