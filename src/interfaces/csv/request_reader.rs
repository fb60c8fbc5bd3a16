use crate::domain::events::VerdictStatus;
use crate::error::{GatewayError, Result};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Read;

#[derive(Debug, Deserialize, PartialEq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum RequestType {
    Open,
    Charge,
    Topup,
    Verdict,
}

/// One row of a replay file. Which columns are required depends on `type`.
#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct Request {
    pub r#type: RequestType,
    pub account: Option<String>,
    pub email: Option<String>,
    pub reference: Option<String>,
    pub amount: Option<Decimal>,
    pub description: Option<String>,
    pub payment_type: Option<String>,
    pub card_number: Option<String>,
    pub status: Option<VerdictStatus>,
}

/// Reads requests from a CSV source.
///
/// This reader wraps `csv::Reader` and provides an iterator over `Result<Request>`.
/// It handles whitespace trimming and flexible record lengths automatically.
pub struct RequestReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> RequestReader<R> {
    /// Creates a new `RequestReader` from any `Read` source (e.g., File, Stdin).
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Returns an iterator that lazily reads and deserializes requests.
    pub fn requests(self) -> impl Iterator<Item = Result<Request>> {
        self.reader
            .into_deserialize()
            .map(|result| result.map_err(GatewayError::from))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const HEADER: &str =
        "type, account, email, reference, amount, description, payment_type, card_number, status";

    #[test]
    fn test_reader_valid_stream() {
        let data = format!(
            "{HEADER}\n\
             open, alice, alice@example.com, , , , , , \n\
             charge, alice, , t1, 50.00, Coffee, credit_card, 4111111111111111, \n\
             verdict, , , t1, , , , , approved"
        );
        let reader = RequestReader::new(data.as_bytes());
        let results: Vec<Result<Request>> = reader.requests().collect();

        assert_eq!(results.len(), 3);
        let open = results[0].as_ref().unwrap();
        assert_eq!(open.r#type, RequestType::Open);
        assert_eq!(open.email.as_deref(), Some("alice@example.com"));
        assert_eq!(open.amount, None);

        let charge = results[1].as_ref().unwrap();
        assert_eq!(charge.r#type, RequestType::Charge);
        assert_eq!(charge.amount, Some(dec!(50.00)));
        assert_eq!(charge.reference.as_deref(), Some("t1"));

        let verdict = results[2].as_ref().unwrap();
        assert_eq!(verdict.status, Some(VerdictStatus::Approved));
    }

    #[test]
    fn test_reader_malformed_line() {
        let data = format!("{HEADER}\ninvalid, alice, , , 1.0, , , , ");
        let reader = RequestReader::new(data.as_bytes());
        let results: Vec<Result<Request>> = reader.requests().collect();

        assert!(matches!(results[0], Err(GatewayError::CsvError(_))));
    }
}
