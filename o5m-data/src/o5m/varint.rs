//! Variable-length integers used throughout `o5m` datasets.
//!
//! Unsigned values are little-endian base-128 groups with a continuation bit.
//! Signed values fold the sign into the lowest bit: an odd raw value `v`
//! encodes `-(v >> 1) - 1`.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum VarintError {
    /// The bytes ran out before the final group.
    Truncated,
    /// The value does not fit into 64 bits.
    Overflow,
}

/// Longest encoding of a 64-bit value.
pub(crate) const MAX_VARINT_LEN: usize = 10;

pub(crate) fn decode_unsigned(bytes: &[u8], position: &mut usize) -> Result<u64, VarintError> {
    let mut value = 0_u64;
    for shift in (0..64).step_by(7) {
        let byte = *bytes.get(*position).ok_or(VarintError::Truncated)?;
        *position += 1;
        let group = u64::from(byte & 0x7f);
        if shift == 63 && group > 1 {
            return Err(VarintError::Overflow);
        }
        value |= group << shift;
        if byte & 0x80 == 0 {
            return Ok(value);
        }
    }
    Err(VarintError::Overflow)
}

pub(crate) fn decode_signed(bytes: &[u8], position: &mut usize) -> Result<i64, VarintError> {
    let raw = decode_unsigned(bytes, position)?;
    let magnitude = i64::try_from(raw >> 1).map_err(|_| VarintError::Overflow)?;
    if raw & 1 == 0 {
        Ok(magnitude)
    } else {
        Ok(-magnitude - 1)
    }
}

#[cfg(test)]
pub(crate) fn encode_unsigned(mut value: u64, out: &mut Vec<u8>) {
    while value >= 0x80 {
        out.push(u8::try_from(value & 0x7f).unwrap_or_default() | 0x80);
        value >>= 7;
    }
    out.push(u8::try_from(value).unwrap_or_default());
}

#[cfg(test)]
pub(crate) fn encode_signed(value: i64, out: &mut Vec<u8>) {
    let raw = if value < 0 {
        (value.unsigned_abs() - 1) << 1 | 1
    } else {
        value.unsigned_abs() << 1
    };
    encode_unsigned(raw, out);
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(&[0x00], 0)]
    #[case(&[0x7f], 127)]
    #[case(&[0x80, 0x01], 128)]
    #[case(&[0xc3, 0x94, 0x01], 19_011)]
    fn decodes_unsigned_groups(#[case] bytes: &[u8], #[case] expected: u64) {
        let mut position = 0;
        assert_eq!(decode_unsigned(bytes, &mut position), Ok(expected));
        assert_eq!(position, bytes.len());
    }

    #[rstest]
    #[case(&[0x00], 0)]
    #[case(&[0x01], -1)]
    #[case(&[0x02], 1)]
    #[case(&[0x03], -2)]
    #[case(&[0x80, 0x01], 64)]
    fn decodes_sign_in_lowest_bit(#[case] bytes: &[u8], #[case] expected: i64) {
        let mut position = 0;
        assert_eq!(decode_signed(bytes, &mut position), Ok(expected));
    }

    #[rstest]
    fn reports_truncated_groups() {
        let mut position = 0;
        assert_eq!(
            decode_unsigned(&[0x80, 0x80], &mut position),
            Err(VarintError::Truncated)
        );
    }

    #[rstest]
    fn rejects_values_wider_than_64_bits() {
        let mut position = 0;
        let bytes = [0xff; MAX_VARINT_LEN];
        assert_eq!(
            decode_unsigned(&bytes, &mut position),
            Err(VarintError::Overflow)
        );
    }

    #[rstest]
    #[case(i64::MIN)]
    #[case(i64::MAX)]
    #[case(-481_000_000)]
    fn signed_extremes_survive_encoding(#[case] value: i64) {
        let mut bytes = Vec::new();
        encode_signed(value, &mut bytes);
        let mut position = 0;
        assert_eq!(decode_signed(&bytes, &mut position), Ok(value));
    }
}
