//! Query functions, one module per table group.

pub mod accounts;
pub mod coins;
pub mod offerings;
pub mod participations;
pub mod queue;
pub mod settings;
pub mod transactions;
pub mod vip;
pub mod wallets;

use rust_decimal::Decimal;

/// Read a TEXT column as a `Decimal` inside a rusqlite row mapper.
pub(crate) fn dec_col(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<Decimal> {
    let text: String = row.get(idx)?;
    text.parse().map_err(|e: rust_decimal::Error| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

/// Serialize a `Decimal` for TEXT storage.
pub(crate) fn dec_sql(value: Decimal) -> String {
    value.normalize().to_string()
}
