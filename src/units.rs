//! Satoshi/BTC-string conversions for the presentation boundary.
//!
//! Display helpers only. Selection, fee and balance math stays in integer
//! satoshis; nothing here feeds back into transaction construction.

pub const SATS_PER_BTC: u64 = 100_000_000;

/// Render satoshis as a BTC decimal string, trailing zeros trimmed.
pub fn sats_to_btc_string(sats: u64) -> String {
    let whole = sats / SATS_PER_BTC;
    let frac = sats % SATS_PER_BTC;
    if frac == 0 {
        return whole.to_string();
    }
    let mut out = format!("{}.{:08}", whole, frac);
    while out.ends_with('0') {
        out.pop();
    }
    out
}

/// Parse a BTC decimal string into satoshis with pure integer arithmetic.
///
/// Accepts at most 8 fractional digits. Returns `None` on anything else:
/// empty input, stray characters, too much precision, or overflow.
pub fn btc_to_sats(input: &str) -> Option<u64> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }

    let (whole, frac) = match input.split_once('.') {
        Some((w, f)) => (w, f),
        None => (input, ""),
    };
    if whole.is_empty() && frac.is_empty() {
        return None;
    }
    if frac.len() > 8 || !frac.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let whole_sats = if whole.is_empty() {
        0
    } else {
        whole
            .parse::<u64>()
            .ok()?
            .checked_mul(SATS_PER_BTC)?
    };

    // Right-pad the fraction to 8 digits: "05" -> 05000000 sats.
    let mut frac_sats = 0u64;
    if !frac.is_empty() {
        frac_sats = frac.parse::<u64>().ok()?;
        for _ in frac.len()..8 {
            frac_sats *= 10;
        }
    }

    whole_sats.checked_add(frac_sats)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sats_to_btc_string() {
        assert_eq!(sats_to_btc_string(0), "0");
        assert_eq!(sats_to_btc_string(1), "0.00000001");
        assert_eq!(sats_to_btc_string(100_000), "0.001");
        assert_eq!(sats_to_btc_string(150_000_000), "1.5");
        assert_eq!(sats_to_btc_string(2_100_000_000_000_000), "21000000");
    }

    #[test]
    fn test_btc_to_sats() {
        assert_eq!(btc_to_sats("1"), Some(100_000_000));
        assert_eq!(btc_to_sats("0.001"), Some(100_000));
        assert_eq!(btc_to_sats(".5"), Some(50_000_000));
        assert_eq!(btc_to_sats("1."), Some(100_000_000));
        assert_eq!(btc_to_sats("0.00000001"), Some(1));
        assert_eq!(btc_to_sats(" 2.5 "), Some(250_000_000));
    }

    #[test]
    fn test_btc_to_sats_rejects_garbage() {
        for bad in ["", ".", "1.2.3", "0.123456789", "1e3", "-1", "0x10", "1,5"] {
            assert_eq!(btc_to_sats(bad), None, "{:?} should not parse", bad);
        }
    }

    #[test]
    fn test_round_trip_exactness() {
        for sats in [0u64, 1, 546, 100_000, 99_999_999, 100_000_000, 123_456_789] {
            assert_eq!(btc_to_sats(&sats_to_btc_string(sats)), Some(sats));
        }
    }
}
