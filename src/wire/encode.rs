//! CompactSize (varint) encoding shared by the message writers.

/// Appends `value` as a Bitcoin CompactSize integer.
pub(crate) fn write_varint(value: u64, out: &mut Vec<u8>) {
    match value {
        0..=0xFC => out.push(value as u8),
        0xFD..=0xFFFF => {
            out.push(0xFD);
            out.extend(&(value as u16).to_le_bytes());
        }
        0x1_0000..=0xFFFF_FFFF => {
            out.push(0xFE);
            out.extend(&(value as u32).to_le_bytes());
        }
        _ => {
            out.push(0xFF);
            out.extend(&value.to_le_bytes());
        }
    }
}

/// Number of bytes `write_varint` emits for `value`.
pub fn varint_size(value: u64) -> usize {
    match value {
        0..=0xFC => 1,
        0xFD..=0xFFFF => 3,
        0x1_0000..=0xFFFF_FFFF => 5,
        _ => 9,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_matches_encoding_at_thresholds() {
        for v in [0u64, 0xFC, 0xFD, 0xFFFF, 0x1_0000, 0xFFFF_FFFF, 0x1_0000_0000] {
            let mut out = vec![];
            write_varint(v, &mut out);
            assert_eq!(out.len(), varint_size(v), "value {v:#x}");
        }
    }

    #[test]
    fn three_byte_form_is_little_endian() {
        let mut out = vec![];
        write_varint(1001, &mut out);
        assert_eq!(out, [0xFD, 0xE9, 0x03]);
    }
}
