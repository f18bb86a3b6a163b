//! SQL schema definitions.

/// Complete schema for the idopad v1 database.
pub const SCHEMA_V1: &str = r#"
-- ============================================================
-- Accounts & capabilities
-- ============================================================

CREATE TABLE IF NOT EXISTS accounts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    email TEXT NOT NULL UNIQUE,
    first_name TEXT,
    last_name TEXT,
    invite_code TEXT NOT NULL UNIQUE,
    can_invite INTEGER NOT NULL DEFAULT 0,
    inviter_id INTEGER REFERENCES accounts(id),
    line INTEGER NOT NULL DEFAULT 1,
    status TEXT NOT NULL DEFAULT 'not_active',
    balance TEXT NOT NULL DEFAULT '0',
    referral_balance TEXT NOT NULL DEFAULT '0',
    hold TEXT NOT NULL DEFAULT '0',
    permanent_place INTEGER,
    is_staff INTEGER NOT NULL DEFAULT 0,
    is_superuser INTEGER NOT NULL DEFAULT 0,
    created_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_accounts_inviter ON accounts(inviter_id);

CREATE TABLE IF NOT EXISTS account_permissions (
    account_id INTEGER NOT NULL REFERENCES accounts(id) ON DELETE CASCADE,
    permission TEXT NOT NULL,
    PRIMARY KEY (account_id, permission)
);

CREATE TABLE IF NOT EXISTS vip_accounts (
    account_id INTEGER PRIMARY KEY REFERENCES accounts(id) ON DELETE CASCADE,
    profit_pct TEXT NOT NULL
);

-- ============================================================
-- Coins, addresses & wallets
-- ============================================================

CREATE TABLE IF NOT EXISTS coins (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    symbol TEXT NOT NULL,
    network TEXT NOT NULL,
    quote_price TEXT,
    updated_at INTEGER NOT NULL DEFAULT 0,
    UNIQUE (symbol, network)
);

CREATE TABLE IF NOT EXISTS addresses (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    address TEXT NOT NULL UNIQUE,
    coin_id INTEGER REFERENCES coins(id),
    owner_admin INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS member_wallets (
    account_id INTEGER PRIMARY KEY REFERENCES accounts(id) ON DELETE CASCADE,
    address_id INTEGER NOT NULL UNIQUE REFERENCES addresses(id)
);

CREATE TABLE IF NOT EXISTS admin_wallets (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    address_id INTEGER NOT NULL UNIQUE REFERENCES addresses(id),
    balance TEXT NOT NULL DEFAULT '0',
    decimals INTEGER NOT NULL DEFAULT 8
);

-- ============================================================
-- Offerings, participations & queues
-- ============================================================

CREATE TABLE IF NOT EXISTS offerings (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    general_allocation TEXT NOT NULL,
    person_allocation TEXT NOT NULL,
    buy_date INTEGER NOT NULL DEFAULT 0,
    tge INTEGER NOT NULL DEFAULT 0,
    vesting TEXT NOT NULL DEFAULT '',
    smartcontract_id INTEGER UNIQUE REFERENCES addresses(id),
    coin_id INTEGER REFERENCES coins(id),
    telegram TEXT,
    twitter TEXT,
    discord TEXT,
    site TEXT,
    white_paper TEXT,
    without_pay INTEGER NOT NULL DEFAULT 0,
    charge_manually INTEGER NOT NULL DEFAULT 0,
    created_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS participations (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    offering_id INTEGER NOT NULL REFERENCES offerings(id) ON DELETE CASCADE,
    account_id INTEGER NOT NULL REFERENCES accounts(id) ON DELETE CASCADE,
    allocation TEXT NOT NULL,
    refund_allocation TEXT NOT NULL DEFAULT '0',
    income_from_income TEXT NOT NULL DEFAULT '0',
    correlation_id TEXT NOT NULL UNIQUE,
    created_at INTEGER NOT NULL,
    UNIQUE (offering_id, account_id)
);

CREATE TABLE IF NOT EXISTS queue_entries (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    offering_id INTEGER NOT NULL REFERENCES offerings(id) ON DELETE CASCADE,
    account_id INTEGER NOT NULL REFERENCES accounts(id) ON DELETE CASCADE,
    number INTEGER NOT NULL,
    permanent INTEGER NOT NULL DEFAULT 0,
    created_at INTEGER NOT NULL,
    UNIQUE (offering_id, account_id)
);

CREATE INDEX IF NOT EXISTS idx_queue_offering_number ON queue_entries(offering_id, number);

-- ============================================================
-- Ledger
-- ============================================================

CREATE TABLE IF NOT EXISTS transactions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    address_from_id INTEGER NOT NULL REFERENCES addresses(id),
    address_to_id INTEGER NOT NULL REFERENCES addresses(id),
    coin_id INTEGER NOT NULL REFERENCES coins(id),
    amount TEXT NOT NULL,
    is_commission INTEGER NOT NULL DEFAULT 0,
    is_referral INTEGER NOT NULL DEFAULT 0,
    is_received INTEGER NOT NULL DEFAULT 0,
    is_fill_up INTEGER NOT NULL DEFAULT 0,
    visible INTEGER NOT NULL DEFAULT 1,
    correlation_id TEXT,
    created_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_tx_to ON transactions(address_to_id, coin_id);
CREATE INDEX IF NOT EXISTS idx_tx_correlation ON transactions(correlation_id);
CREATE INDEX IF NOT EXISTS idx_tx_created ON transactions(created_at);

-- ============================================================
-- Settings
-- ============================================================

CREATE TABLE IF NOT EXISTS settings (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;
