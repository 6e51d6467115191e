//! Decoding of hex-encoded JSON-RPC quantities.

/// Parse a hex quantity (`0x`-prefixed, prefix optional) to `u128`.
pub fn parse_hex_u128(s: &str) -> Result<u128, String> {
    let digits = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);
    if digits.is_empty() {
        return Err("empty hex quantity".into());
    }
    // from_str_radix would take a leading sign
    if !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(format!("invalid hex quantity {s:?}"));
    }
    u128::from_str_radix(digits, 16).map_err(|e| e.to_string())
}

/// Parse a hex quantity (`0x`-prefixed, prefix optional) to `u64`.
pub fn parse_hex_u64(s: &str) -> Result<u64, String> {
    let wide = parse_hex_u128(s)?;
    u64::try_from(wide).map_err(|_| format!("{s} does not fit in 64 bits"))
}
