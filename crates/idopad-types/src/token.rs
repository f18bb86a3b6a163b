//! Opaque random tokens: invite codes and ledger correlation ids.

use rand::RngCore;

/// Byte length of generated tokens.
const TOKEN_BYTES: usize = 16;

/// Generate a random hex token (32 characters).
fn random_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Generate a fresh invite code for a new account.
pub fn new_invite_code() -> String {
    random_token()
}

/// Generate a correlation id linking ledger transactions to the
/// participation event that produced them.
pub fn new_correlation_id() -> String {
    random_token()
}
