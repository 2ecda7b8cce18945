//! Webhook signature verification (`X-Twilio-Signature`).
//!
//! The provider signs each webhook with HMAC-SHA1 over the full request URL
//! followed by every form parameter, sorted by name, written as `name`
//! immediately followed by `value`. The base64 digest is sent in the
//! signature header.

use base64::Engine;
use hmac::{Hmac, Mac};
use sha1::Sha1;
use subtle::ConstantTimeEq;

/// Header carrying the provider's request signature.
pub const SIGNATURE_HEADER: &str = "x-twilio-signature";

type HmacSha1 = Hmac<Sha1>;

/// Builds the string the provider signs: the URL followed by the sorted form
/// parameters with no separators.
///
/// Parameters are ordered by name (byte order); repeated names keep their
/// original relative order.
pub fn canonical_string(full_url: &str, form: &[(String, String)]) -> String {
    let mut params: Vec<&(String, String)> = form.iter().collect();
    params.sort_by(|a, b| a.0.cmp(&b.0));

    let mut canonical = String::from(full_url);
    for (key, value) in params {
        canonical.push_str(key);
        canonical.push_str(value);
    }
    canonical
}

/// Computes the base64 HMAC-SHA1 signature the provider would send for this
/// request.
pub fn compute_signature(secret: &str, full_url: &str, form: &[(String, String)]) -> String {
    // HMAC accepts keys of any length.
    let mut mac = HmacSha1::new_from_slice(secret.as_bytes()).expect("HMAC key length is valid");
    mac.update(canonical_string(full_url, form).as_bytes());
    base64::engine::general_purpose::STANDARD.encode(mac.finalize().into_bytes())
}

/// Verifies a webhook request.
///
/// Returns `true` unconditionally when verification is disabled. Otherwise
/// the signature header, the secret and the URL must all be present and the
/// header must match the computed signature exactly.
pub fn verify(
    enabled: bool,
    secret: Option<&str>,
    full_url: Option<&str>,
    signature_header: Option<&str>,
    form: &[(String, String)],
) -> bool {
    if !enabled {
        return true;
    }

    let (Some(secret), Some(full_url), Some(provided)) = (
        secret.filter(|s| !s.is_empty()),
        full_url.filter(|u| !u.is_empty()),
        signature_header.filter(|h| !h.is_empty()),
    ) else {
        return false;
    };

    let expected = compute_signature(secret, full_url, form);
    // `ct_eq` on slices of different length is false.
    bool::from(expected.as_bytes().ct_eq(provided.as_bytes()))
}
