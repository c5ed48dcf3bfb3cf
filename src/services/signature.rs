use ring::hmac;

/// HMAC-SHA256 over `payload`, hex encoded.
pub fn sign(payload: &str, key: &[u8]) -> String {
    let key = hmac::Key::new(hmac::HMAC_SHA256, key);
    hex::encode(hmac::sign(&key, payload.as_bytes()).as_ref())
}

/// Constant-time check of a hex HMAC-SHA256 produced by [`sign`].
pub fn verify(payload: &str, signature_hex: &str, key: &[u8]) -> bool {
    verify_with(hmac::HMAC_SHA256, payload.as_bytes(), signature_hex, key)
}

/// Constant-time check of a hex HMAC-SHA512 (Paystack webhook scheme).
pub fn verify_sha512(body: &[u8], signature_hex: &str, key: &[u8]) -> bool {
    verify_with(hmac::HMAC_SHA512, body, signature_hex, key)
}

fn verify_with(algorithm: hmac::Algorithm, body: &[u8], signature_hex: &str, key: &[u8]) -> bool {
    let Ok(tag) = hex::decode(signature_hex.trim()) else {
        return false;
    };
    let key = hmac::Key::new(algorithm, key);
    hmac::verify(&key, body, &tag).is_ok()
}

#[cfg(test)]
pub(crate) fn sign_sha512(body: &[u8], key: &[u8]) -> String {
    let key = hmac::Key::new(hmac::HMAC_SHA512, key);
    hex::encode(hmac::sign(&key, body).as_ref())
}
