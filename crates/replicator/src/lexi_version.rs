//! Lexicographically sortable state versions.
//!
//! A version is the base-36 rendering of a number, prefixed by one base-36
//! digit holding the rendering's length minus one. Comparing two versions
//! as strings then agrees with comparing the numbers. State versions are
//! derived from commit LSNs, so `0/E` becomes `"0e"`.

use crate::error::{ReplicatorError, Result};

const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Encodes `n` as a lexi version.
pub fn encode(n: u64) -> String {
    let mut digits = Vec::with_capacity(13);
    let mut rest = n;
    loop {
        digits.push(DIGITS[(rest % 36) as usize]);
        rest /= 36;
        if rest == 0 {
            break;
        }
    }
    // u64::MAX has 13 base-36 digits, so the length prefix is one digit.
    let mut out = String::with_capacity(digits.len() + 1);
    out.push(DIGITS[digits.len() - 1] as char);
    out.extend(digits.iter().rev().map(|&d| d as char));
    out
}

/// Decodes a lexi version produced by [`encode`].
pub fn decode(version: &str) -> Result<u64> {
    let invalid = || ReplicatorError::InvalidLsn(format!("invalid lexi version {version:?}"));
    let mut chars = version.chars();
    let len = chars.next().and_then(|c| c.to_digit(36)).ok_or_else(invalid)? as usize + 1;
    let body = chars.as_str();
    if body.len() != len {
        return Err(invalid());
    }
    u64::from_str_radix(body, 36).map_err(|_| invalid())
}

/// Parses an LSN of the form `X/Y` (hexadecimal halves).
pub fn parse_lsn(lsn: &str) -> Result<u64> {
    let invalid = || ReplicatorError::InvalidLsn(lsn.to_string());
    let (hi, lo) = lsn.split_once('/').ok_or_else(invalid)?;
    let hi = u32::from_str_radix(hi, 16).map_err(|_| invalid())?;
    let lo = u32::from_str_radix(lo, 16).map_err(|_| invalid())?;
    Ok((u64::from(hi) << 32) | u64::from(lo))
}

/// Formats a 64-bit position as an `X/Y` LSN.
pub fn format_lsn(lsn: u64) -> String {
    format!("{:X}/{:X}", lsn >> 32, lsn & 0xFFFF_FFFF)
}

/// The state version of a transaction committed at `lsn`.
pub fn to_lexi_version(lsn: &str) -> Result<String> {
    parse_lsn(lsn).map(encode)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_lsn_versions() {
        assert_eq!(to_lexi_version("0/e").unwrap(), "0e");
        assert_eq!(to_lexi_version("0/1").unwrap(), "01");
        assert_eq!(to_lexi_version("0/30").unwrap(), "11c");
        assert_eq!(to_lexi_version("1/0").unwrap(), "61z141z4");
    }

    #[test]
    fn test_encode_bounds() {
        assert_eq!(encode(0), "00");
        assert_eq!(encode(35), "0z");
        assert_eq!(encode(36), "110");
        assert_eq!(encode(u64::MAX), "c3w5e11264sgsf");
        assert_eq!(decode("c3w5e11264sgsf").unwrap(), u64::MAX);
    }

    #[test]
    fn test_invalid_inputs() {
        assert!(parse_lsn("0e").is_err());
        assert!(parse_lsn("0/xyz").is_err());
        assert!(decode("").is_err());
        assert!(decode("2ab").is_err());
    }

    #[test]
    fn test_format_lsn() {
        assert_eq!(format_lsn(parse_lsn("16/B374D848").unwrap()), "16/B374D848");
    }

    proptest! {
        #[test]
        fn encoding_preserves_order(a: u64, b: u64) {
            prop_assert_eq!(a.cmp(&b), encode(a).cmp(&encode(b)));
            prop_assert_eq!(decode(&encode(a)).unwrap(), a);
        }
    }
}
