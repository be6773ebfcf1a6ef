//! Each vendor crate only speaks HTTP. The adapters here map its errors onto the transient or
//! fatal classes of [crate::Error], implement [crate::paginate::VendorClient] on top of it and
//! build the matching collector from the environment.

use crate::Error;

pub mod bitsight;
pub mod google_reports;
pub mod harfanglab;

/// Throttling and server side failures are worth another try next cycle, any other status means
/// the request itself is wrong and will not get better.
pub(crate) fn status_error(vendor: &str, status: u16, body: &str) -> Error {
    if status == 429 || (500..600).contains(&status) {
        Error::TransientFetch(format!("{vendor} returned {status}: {body}"))
    } else {
        Error::Vendor(format!("{vendor} returned {status}: {body}"))
    }
}

/// Builds the store key of a collector instance.
pub(crate) fn checkpoint_key(parts: &[&str]) -> crate::Result<String> {
    let key = parts.join(".");
    let valid = parts.iter().all(|part| {
        !part.is_empty()
            && part
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-'))
    });
    if valid {
        Ok(key)
    } else {
        Err(Error::Config(format!(
            "Invalid instance key {key}, only letters, digits, '_' and '-' are allowed"
        )))
    }
}
