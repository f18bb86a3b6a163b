//! Offering (token-sale round) query functions.

use rusqlite::{Connection, OptionalExtension};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use idopad_types::{AddressId, CoinId, OfferingId};

use crate::queries::{dec_col, dec_sql};
use crate::{DbError, Result};

/// An offering row.
#[derive(Clone, Debug)]
pub struct OfferingRow {
    pub id: OfferingId,
    pub name: String,
    pub description: String,
    pub general_allocation: Decimal,
    pub person_allocation: Decimal,
    pub buy_date: u64,
    pub tge: u64,
    pub vesting: String,
    pub smartcontract_id: Option<AddressId>,
    pub coin_id: Option<CoinId>,
    pub telegram: Option<String>,
    pub twitter: Option<String>,
    pub discord: Option<String>,
    pub site: Option<String>,
    pub white_paper: Option<String>,
    pub without_pay: bool,
    pub charge_manually: bool,
    pub created_at: u64,
}

impl OfferingRow {
    /// Theoretical maximum participant count:
    /// `floor(general_allocation / person_allocation)`.
    pub fn max_participants(&self) -> i64 {
        if self.person_allocation.is_zero() {
            return 0;
        }
        (self.general_allocation / self.person_allocation)
            .floor()
            .to_i64()
            .unwrap_or(0)
    }
}

/// Fields required to create an offering.
#[derive(Debug, Default)]
pub struct NewOffering<'a> {
    pub name: &'a str,
    pub description: &'a str,
    pub general_allocation: Decimal,
    pub person_allocation: Decimal,
    pub buy_date: u64,
    pub tge: u64,
    pub vesting: &'a str,
    pub smartcontract_id: Option<AddressId>,
    pub coin_id: Option<CoinId>,
    pub telegram: Option<&'a str>,
    pub twitter: Option<&'a str>,
    pub discord: Option<&'a str>,
    pub site: Option<&'a str>,
    pub white_paper: Option<&'a str>,
    pub without_pay: bool,
    pub charge_manually: bool,
    pub created_at: u64,
}

const COLUMNS: &str = "id, name, description, general_allocation, person_allocation, buy_date, \
                       tge, vesting, smartcontract_id, coin_id, telegram, twitter, discord, \
                       site, white_paper, without_pay, charge_manually, created_at";

fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<OfferingRow> {
    Ok(OfferingRow {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        general_allocation: dec_col(row, 3)?,
        person_allocation: dec_col(row, 4)?,
        buy_date: row.get::<_, i64>(5)? as u64,
        tge: row.get::<_, i64>(6)? as u64,
        vesting: row.get(7)?,
        smartcontract_id: row.get(8)?,
        coin_id: row.get(9)?,
        telegram: row.get(10)?,
        twitter: row.get(11)?,
        discord: row.get(12)?,
        site: row.get(13)?,
        white_paper: row.get(14)?,
        without_pay: row.get(15)?,
        charge_manually: row.get(16)?,
        created_at: row.get::<_, i64>(17)? as u64,
    })
}

/// Insert a new offering.
pub fn insert(conn: &Connection, offering: &NewOffering<'_>) -> Result<OfferingId> {
    conn.execute(
        "INSERT INTO offerings (name, description, general_allocation, person_allocation, \
                                buy_date, tge, vesting, smartcontract_id, coin_id, telegram, \
                                twitter, discord, site, white_paper, without_pay, \
                                charge_manually, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
        rusqlite::params![
            offering.name,
            offering.description,
            dec_sql(offering.general_allocation),
            dec_sql(offering.person_allocation),
            offering.buy_date as i64,
            offering.tge as i64,
            offering.vesting,
            offering.smartcontract_id,
            offering.coin_id,
            offering.telegram,
            offering.twitter,
            offering.discord,
            offering.site,
            offering.white_paper,
            offering.without_pay,
            offering.charge_manually,
            offering.created_at as i64,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Fetch an offering by id.
pub fn by_id(conn: &Connection, id: OfferingId) -> Result<OfferingRow> {
    conn.query_row(
        &format!("SELECT {COLUMNS} FROM offerings WHERE id = ?1"),
        [id],
        map_row,
    )
    .optional()?
    .ok_or_else(|| DbError::NotFound(format!("offering {id}")))
}

/// Fetch the offering selling the given coin, if any.
pub fn find_by_coin(conn: &Connection, coin_id: CoinId) -> Result<Option<OfferingRow>> {
    Ok(conn
        .query_row(
            &format!("SELECT {COLUMNS} FROM offerings WHERE coin_id = ?1"),
            [coin_id],
            map_row,
        )
        .optional()?)
}

/// All offerings, newest first.
pub fn all(conn: &Connection) -> Result<Vec<OfferingRow>> {
    let mut stmt = conn.prepare(&format!("SELECT {COLUMNS} FROM offerings ORDER BY id DESC"))?;
    let rows = stmt
        .query_map([], map_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Offerings whose queues accept self-enrollment (not manually assigned).
pub fn open_for_queueing(conn: &Connection) -> Result<Vec<OfferingRow>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COLUMNS} FROM offerings WHERE without_pay = 0 ORDER BY id"
    ))?;
    let rows = stmt
        .query_map([], map_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Update the mutable fields of an offering.
pub fn update(conn: &Connection, id: OfferingId, offering: &NewOffering<'_>) -> Result<()> {
    let updated = conn.execute(
        "UPDATE offerings SET name = ?1, description = ?2, general_allocation = ?3, \
                              person_allocation = ?4, buy_date = ?5, tge = ?6, vesting = ?7, \
                              smartcontract_id = ?8, coin_id = ?9, telegram = ?10, \
                              twitter = ?11, discord = ?12, site = ?13, white_paper = ?14, \
                              without_pay = ?15, charge_manually = ?16
         WHERE id = ?17",
        rusqlite::params![
            offering.name,
            offering.description,
            dec_sql(offering.general_allocation),
            dec_sql(offering.person_allocation),
            offering.buy_date as i64,
            offering.tge as i64,
            offering.vesting,
            offering.smartcontract_id,
            offering.coin_id,
            offering.telegram,
            offering.twitter,
            offering.discord,
            offering.site,
            offering.white_paper,
            offering.without_pay,
            offering.charge_manually,
            id,
        ],
    )?;
    if updated == 0 {
        return Err(DbError::NotFound(format!("offering {id}")));
    }
    Ok(())
}

/// Delete an offering (participations and queue entries cascade).
pub fn delete(conn: &Connection, id: OfferingId) -> Result<()> {
    let deleted = conn.execute("DELETE FROM offerings WHERE id = ?1", [id])?;
    if deleted == 0 {
        return Err(DbError::NotFound(format!("offering {id}")));
    }
    Ok(())
}
