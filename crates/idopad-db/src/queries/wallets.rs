//! Address and wallet query functions.
//!
//! An address maps an external chain address string to a coin; it is owned
//! either by a member account (through `member_wallets`), by the platform
//! (`owner_admin`, through `admin_wallets`), or by an offering's smart
//! contract.

use rusqlite::{Connection, OptionalExtension};
use rust_decimal::Decimal;

use idopad_types::{AccountId, AddressId, CoinId, WalletId};

use crate::queries::{dec_col, dec_sql};
use crate::{constraint, DbError, Result};

/// An address row.
#[derive(Clone, Debug)]
pub struct AddressRow {
    pub id: AddressId,
    pub address: String,
    pub coin_id: Option<CoinId>,
    pub owner_admin: bool,
}

/// A member wallet binding, with the address text joined in.
#[derive(Clone, Debug)]
pub struct MemberWalletRow {
    pub account_id: AccountId,
    pub address_id: AddressId,
    pub address: String,
}

/// A platform wallet row, with the address joined in.
#[derive(Clone, Debug)]
pub struct AdminWalletRow {
    pub id: WalletId,
    pub address_id: AddressId,
    pub address: String,
    pub coin_id: Option<CoinId>,
    pub balance: Decimal,
    pub decimals: u32,
}

fn map_address(row: &rusqlite::Row<'_>) -> rusqlite::Result<AddressRow> {
    Ok(AddressRow {
        id: row.get(0)?,
        address: row.get(1)?,
        coin_id: row.get(2)?,
        owner_admin: row.get(3)?,
    })
}

fn map_admin_wallet(row: &rusqlite::Row<'_>) -> rusqlite::Result<AdminWalletRow> {
    Ok(AdminWalletRow {
        id: row.get(0)?,
        address_id: row.get(1)?,
        address: row.get(2)?,
        coin_id: row.get(3)?,
        balance: dec_col(row, 4)?,
        decimals: row.get(5)?,
    })
}

const ADMIN_WALLET_COLUMNS: &str = "w.id, w.address_id, a.address, a.coin_id, w.balance, w.decimals";

/// Register an external address. Duplicate text is a constraint error.
pub fn create_address(
    conn: &Connection,
    address: &str,
    coin_id: Option<CoinId>,
    owner_admin: bool,
) -> Result<AddressId> {
    conn.execute(
        "INSERT INTO addresses (address, coin_id, owner_admin) VALUES (?1, ?2, ?3)",
        rusqlite::params![address, coin_id, owner_admin],
    )
    .map_err(|e| constraint(e, "address already registered"))?;
    Ok(conn.last_insert_rowid())
}

/// Fetch an address row by id.
pub fn address_by_id(conn: &Connection, id: AddressId) -> Result<AddressRow> {
    conn.query_row(
        "SELECT id, address, coin_id, owner_admin FROM addresses WHERE id = ?1",
        [id],
        map_address,
    )
    .optional()?
    .ok_or_else(|| DbError::NotFound(format!("address {id}")))
}

/// Look up an address row by its text, if present.
pub fn find_address(conn: &Connection, address: &str) -> Result<Option<AddressRow>> {
    Ok(conn
        .query_row(
            "SELECT id, address, coin_id, owner_admin FROM addresses WHERE address = ?1",
            [address],
            map_address,
        )
        .optional()?)
}

/// Bind a member wallet. A second binding for the account is a constraint
/// error; rebinding is an explicit admin operation via [`rebind_member_wallet`].
pub fn bind_member_wallet(
    conn: &Connection,
    account_id: AccountId,
    address_id: AddressId,
) -> Result<()> {
    conn.execute(
        "INSERT INTO member_wallets (account_id, address_id) VALUES (?1, ?2)",
        rusqlite::params![account_id, address_id],
    )
    .map_err(|e| constraint(e, "wallet already bound"))?;
    Ok(())
}

/// Replace the bound address of an existing member wallet.
pub fn rebind_member_wallet(
    conn: &Connection,
    account_id: AccountId,
    address_id: AddressId,
) -> Result<()> {
    let updated = conn.execute(
        "UPDATE member_wallets SET address_id = ?1 WHERE account_id = ?2",
        rusqlite::params![address_id, account_id],
    )?;
    if updated == 0 {
        return Err(DbError::NotFound(format!("member wallet for account {account_id}")));
    }
    Ok(())
}

/// Fetch the wallet bound to an account, if any.
pub fn member_wallet(conn: &Connection, account_id: AccountId) -> Result<Option<MemberWalletRow>> {
    Ok(conn
        .query_row(
            "SELECT m.account_id, m.address_id, a.address
             FROM member_wallets m JOIN addresses a ON a.id = m.address_id
             WHERE m.account_id = ?1",
            [account_id],
            |row| {
                Ok(MemberWalletRow {
                    account_id: row.get(0)?,
                    address_id: row.get(1)?,
                    address: row.get(2)?,
                })
            },
        )
        .optional()?)
}

/// Reverse lookup: the member wallet bound to an address, if any.
pub fn member_by_address(conn: &Connection, address_id: AddressId) -> Result<Option<MemberWalletRow>> {
    Ok(conn
        .query_row(
            "SELECT m.account_id, m.address_id, a.address
             FROM member_wallets m JOIN addresses a ON a.id = m.address_id
             WHERE m.address_id = ?1",
            [address_id],
            |row| {
                Ok(MemberWalletRow {
                    account_id: row.get(0)?,
                    address_id: row.get(1)?,
                    address: row.get(2)?,
                })
            },
        )
        .optional()?)
}

/// Create a platform wallet over an existing admin-owned address.
pub fn create_admin_wallet(
    conn: &Connection,
    address_id: AddressId,
    decimals: u32,
) -> Result<WalletId> {
    conn.execute(
        "INSERT INTO admin_wallets (address_id, decimals) VALUES (?1, ?2)",
        rusqlite::params![address_id, decimals],
    )
    .map_err(|e| constraint(e, "admin wallet already exists for this address"))?;
    Ok(conn.last_insert_rowid())
}

/// The main platform wallet: the admin-owned address for the given coin.
pub fn admin_wallet_for_coin(conn: &Connection, coin_id: CoinId) -> Result<AdminWalletRow> {
    conn.query_row(
        &format!(
            "SELECT {ADMIN_WALLET_COLUMNS} FROM admin_wallets w
             JOIN addresses a ON a.id = w.address_id
             WHERE a.owner_admin = 1 AND a.coin_id = ?1"
        ),
        [coin_id],
        map_admin_wallet,
    )
    .optional()?
    .ok_or_else(|| DbError::NotFound(format!("admin wallet for coin {coin_id}")))
}

/// Fetch an admin wallet by id.
pub fn admin_wallet_by_id(conn: &Connection, id: WalletId) -> Result<AdminWalletRow> {
    conn.query_row(
        &format!(
            "SELECT {ADMIN_WALLET_COLUMNS} FROM admin_wallets w
             JOIN addresses a ON a.id = w.address_id
             WHERE w.id = ?1"
        ),
        [id],
        map_admin_wallet,
    )
    .optional()?
    .ok_or_else(|| DbError::NotFound(format!("admin wallet {id}")))
}

/// Custom-token platform wallets: every admin wallet except the one holding
/// the given (quote) coin.
pub fn custom_admin_wallets(conn: &Connection, quote_coin_id: CoinId) -> Result<Vec<AdminWalletRow>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {ADMIN_WALLET_COLUMNS} FROM admin_wallets w
         JOIN addresses a ON a.id = w.address_id
         WHERE a.coin_id IS NOT ?1
         ORDER BY w.id"
    ))?;
    let rows = stmt
        .query_map([quote_coin_id], map_admin_wallet)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Store a platform wallet's denormalized balance.
pub fn set_admin_balance(conn: &Connection, id: WalletId, balance: Decimal) -> Result<()> {
    let updated = conn.execute(
        "UPDATE admin_wallets SET balance = ?1 WHERE id = ?2",
        rusqlite::params![dec_sql(balance), id],
    )?;
    if updated == 0 {
        return Err(DbError::NotFound(format!("admin wallet {id}")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::{accounts, coins};

    fn test_db() -> Connection {
        crate::open_memory().expect("open test db")
    }

    fn test_account(conn: &Connection) -> AccountId {
        accounts::insert(
            conn,
            &accounts::NewAccount {
                email: "a@example.com",
                first_name: None,
                last_name: None,
                invite_code: "code-a",
                inviter_id: None,
                line: 1,
                created_at: 0,
            },
        )
        .expect("account")
    }

    #[test]
    fn test_bind_and_fetch_member_wallet() {
        let conn = test_db();
        let account = test_account(&conn);
        let addr = create_address(&conn, "0xabc", None, false).expect("address");
        bind_member_wallet(&conn, account, addr).expect("bind");

        let wallet = member_wallet(&conn, account).expect("query").expect("bound");
        assert_eq!(wallet.address, "0xabc");
    }

    #[test]
    fn test_duplicate_address_rejected() {
        let conn = test_db();
        create_address(&conn, "0xabc", None, false).expect("first");
        let result = create_address(&conn, "0xabc", None, false);
        assert!(matches!(result, Err(DbError::Constraint(_))));
    }

    #[test]
    fn test_double_bind_rejected() {
        let conn = test_db();
        let account = test_account(&conn);
        let a = create_address(&conn, "0xabc", None, false).expect("a");
        let b = create_address(&conn, "0xdef", None, false).expect("b");
        bind_member_wallet(&conn, account, a).expect("bind");
        assert!(matches!(
            bind_member_wallet(&conn, account, b),
            Err(DbError::Constraint(_))
        ));

        rebind_member_wallet(&conn, account, b).expect("rebind");
        let wallet = member_wallet(&conn, account).expect("query").expect("bound");
        assert_eq!(wallet.address, "0xdef");
    }

    #[test]
    fn test_admin_wallet_for_coin() {
        let conn = test_db();
        let quote = coins::quote_coin(&conn).expect("quote");
        let addr = create_address(&conn, "0xadmin", Some(quote.id), true).expect("address");
        let id = create_admin_wallet(&conn, addr, 8).expect("wallet");

        let wallet = admin_wallet_for_coin(&conn, quote.id).expect("fetch");
        assert_eq!(wallet.id, id);
        assert_eq!(wallet.balance, Decimal::ZERO);
        assert_eq!(wallet.decimals, 8);
    }

    #[test]
    fn test_custom_admin_wallets_excludes_quote() {
        let conn = test_db();
        let quote = coins::quote_coin(&conn).expect("quote");
        let token = coins::upsert(&conn, "ZYX", "BEP20").expect("token");

        let quote_addr = create_address(&conn, "0xq", Some(quote.id), true).expect("addr");
        create_admin_wallet(&conn, quote_addr, 8).expect("quote wallet");
        let token_addr = create_address(&conn, "0xt", Some(token.id), true).expect("addr");
        let token_wallet = create_admin_wallet(&conn, token_addr, 18).expect("token wallet");

        let custom = custom_admin_wallets(&conn, quote.id).expect("custom");
        assert_eq!(custom.len(), 1);
        assert_eq!(custom[0].id, token_wallet);
        assert_eq!(custom[0].decimals, 18);
    }

    #[test]
    fn test_set_admin_balance() {
        let conn = test_db();
        let quote = coins::quote_coin(&conn).expect("quote");
        let addr = create_address(&conn, "0xadmin", Some(quote.id), true).expect("address");
        let id = create_admin_wallet(&conn, addr, 8).expect("wallet");

        set_admin_balance(&conn, id, Decimal::from(500)).expect("set");
        let wallet = admin_wallet_by_id(&conn, id).expect("fetch");
        assert_eq!(wallet.balance, Decimal::from(500));
    }
}
