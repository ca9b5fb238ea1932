//! BIP21 payment URI parsing.
//!
//! Handles `bitcoin:<address>?amount=..&label=..&message=..` as well as a
//! bare address. The amount is a BTC decimal converted with integer satoshi
//! arithmetic; the address itself is only extracted here, network validation
//! happens where the wallet's network is known.

use crate::error::WalletError;
use crate::units;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invoice {
    pub address: String,
    /// Requested amount in satoshis, if the URI carried one.
    pub amount: Option<u64>,
    pub label: Option<String>,
    pub message: Option<String>,
}

/// Parse a BIP21 URI or bare address string.
pub fn parse_invoice(input: &str) -> Result<Invoice, WalletError> {
    let input = input.trim();
    let rest = match input.strip_prefix("bitcoin:") {
        Some(rest) => rest,
        None if input.contains(':') => {
            return Err(WalletError::AddressInvalid(format!(
                "Unsupported URI scheme in {:?}",
                input
            )))
        }
        None => input,
    };

    let (address, query) = match rest.split_once('?') {
        Some((a, q)) => (a, Some(q)),
        None => (rest, None),
    };
    if address.is_empty() {
        return Err(WalletError::AddressInvalid("Empty address".to_string()));
    }

    let mut invoice = Invoice {
        address: address.to_string(),
        amount: None,
        label: None,
        message: None,
    };

    if let Some(query) = query {
        for pair in query.split('&').filter(|p| !p.is_empty()) {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            match key {
                "amount" => {
                    let sats = units::btc_to_sats(value).ok_or_else(|| {
                        WalletError::AddressInvalid(format!("Invalid amount {:?}", value))
                    })?;
                    invoice.amount = Some(sats);
                }
                "label" => invoice.label = Some(percent_decode(value)),
                "message" => invoice.message = Some(percent_decode(value)),
                // BIP21 requires rejecting unknown req-* parameters.
                _ if key.starts_with("req-") => {
                    return Err(WalletError::AddressInvalid(format!(
                        "Unsupported required parameter {:?}",
                        key
                    )))
                }
                _ => {}
            }
        }
    }

    Ok(invoice)
}

fn percent_decode(value: &str) -> String {
    let bytes = value.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            if let (Some(hi), Some(lo)) = (
                bytes.get(i + 1).and_then(|b| (*b as char).to_digit(16)),
                bytes.get(i + 2).and_then(|b| (*b as char).to_digit(16)),
            ) {
                out.push((hi * 16 + lo) as u8);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}
