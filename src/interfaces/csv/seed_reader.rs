use crate::domain::customer::Customer;
use crate::domain::payment::Payment;
use crate::domain::rule::DunningRule;
use crate::error::{DunningError, Result};
use serde::de::DeserializeOwned;
use std::io::Read;

/// Reads seed records (customers, rules or payments) from a CSV source.
///
/// Wraps `csv::Reader` with whitespace trimming and flexible record lengths.
/// Empty cells deserialize as `None` for optional columns.
pub struct SeedReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> SeedReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    pub fn customers(self) -> impl Iterator<Item = Result<Customer>> {
        self.records()
    }

    pub fn rules(self) -> impl Iterator<Item = Result<DunningRule>> {
        self.records()
    }

    pub fn payments(self) -> impl Iterator<Item = Result<Payment>> {
        self.records()
    }

    /// Lazily deserializes every row as `T`.
    fn records<T: DeserializeOwned>(self) -> impl Iterator<Item = Result<T>> {
        self.reader
            .into_deserialize()
            .map(|result| result.map_err(DunningError::from))
    }
}
