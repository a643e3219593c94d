//! PBKDF2-HMAC-SHA256 password hashes.
//!
//! Encoded as `pbkdf2_sha256$<iterations>$<salt hex>$<digest hex>`.

use pbkdf2::pbkdf2_hmac;
use sha2::Sha256;

const SCHEME: &str = "pbkdf2_sha256";
const ITERATIONS: u32 = 100_000;
const DIGEST_LEN: usize = 32;

fn derive(password: &str, salt: &[u8], iterations: u32) -> [u8; DIGEST_LEN] {
    let mut digest = [0_u8; DIGEST_LEN];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, iterations, &mut digest);
    digest
}

/// Hash `password` with a fresh random salt.
#[must_use]
pub fn hash_password(password: &str) -> String {
    let salt: [u8; 16] = rand::random();
    let digest = derive(password, &salt, ITERATIONS);
    format!("{SCHEME}${ITERATIONS}${}${}", hex::encode(salt), hex::encode(digest))
}

/// Check `password` against an encoded hash. Malformed hashes never verify.
#[must_use]
pub fn verify_password(password: &str, encoded: &str) -> bool {
    let mut parts = encoded.split('$');
    let (Some(SCHEME), Some(iterations), Some(salt), Some(expected), None) =
        (parts.next(), parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return false;
    };
    let (Ok(iterations), Ok(salt), Ok(expected)) =
        (iterations.parse::<u32>(), hex::decode(salt), hex::decode(expected))
    else {
        return false;
    };
    if iterations == 0 || expected.len() != DIGEST_LEN {
        return false;
    }
    let actual = derive(password, &salt, iterations);
    actual.iter().zip(&expected).fold(0_u8, |acc, (a, b)| acc | (a ^ b)) == 0
}
