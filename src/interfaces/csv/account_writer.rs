use crate::error::Result;
use rust_decimal::Decimal;
use serde::Serialize;
use std::io::Write;

/// Final state of one account after a replay.
#[derive(Debug, Serialize, PartialEq, Clone)]
pub struct AccountSummary {
    pub account: String,
    pub balance: Decimal,
    pub approved: usize,
    pub rejected: usize,
    pub pending: usize,
}

/// Writes account summaries as CSV.
pub struct AccountWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> AccountWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    /// Writes a header and one row per summary. Balances are printed without
    /// trailing zeros.
    pub fn write_accounts(&mut self, summaries: Vec<AccountSummary>) -> Result<()> {
        for mut summary in summaries {
            summary.balance = summary.balance.normalize();
            self.writer.serialize(summary)?;
        }
        self.writer.flush()?;
        Ok(())
    }
}
