//! Random alphanumeric filler strings.
//!
//! Every byte drawn from the source is mapped onto [`ALPHABET`] with
//! `byte % 62`. The mapping is slightly biased towards the first eight
//! symbols, which is fine for leak payloads and must not be used for tokens.

use rand::{RngCore, rngs::OsRng};

pub const ALPHABET: &[u8; 62] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// Builds a string of exactly `len` symbols using the operating system CSPRNG.
pub fn random_string(len: usize) -> Result<String, rand::Error> {
    random_string_from(&mut OsRng, len)
}

/// Same as [`random_string`], drawing bytes from `rng`.
pub fn random_string_from<R>(rng: &mut R, len: usize) -> Result<String, rand::Error>
where
    R: RngCore + ?Sized,
{
    let mut bytes = vec![0u8; len];
    rng.try_fill_bytes(&mut bytes)?;

    Ok(bytes
        .into_iter()
        .map(|byte| ALPHABET[usize::from(byte) % ALPHABET.len()] as char)
        .collect())
}
