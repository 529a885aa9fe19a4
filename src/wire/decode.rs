//! Cursor helpers for reading wire fields out of a payload.
//!
//! Every reader takes the payload slice and a cursor that is advanced past
//! the consumed bytes. Running off the end yields
//! [`WireError::Truncated`] with the name of the field being read.

use crate::error::WireError;

pub(crate) fn read_varint(p: &[u8], c: &mut usize) -> Result<u64, WireError> {
    let first = *p.get(*c).ok_or(WireError::Truncated("varint"))?;
    *c += 1;
    match first {
        0xFD => Ok(u16::from_le_bytes(read_array(p, c, "varint:fd")?) as u64),
        0xFE => Ok(u32::from_le_bytes(read_array(p, c, "varint:fe")?) as u64),
        0xFF => Ok(u64::from_le_bytes(read_array(p, c, "varint:ff")?)),
        n => Ok(n as u64),
    }
}

pub(crate) fn read_u8(p: &[u8], c: &mut usize, ctx: &'static str) -> Result<u8, WireError> {
    let b = *p.get(*c).ok_or(WireError::Truncated(ctx))?;
    *c += 1;
    Ok(b)
}

pub(crate) fn read_u32(p: &[u8], c: &mut usize) -> Result<u32, WireError> {
    Ok(u32::from_le_bytes(read_array(p, c, "u32")?))
}

pub(crate) fn read_u64(p: &[u8], c: &mut usize) -> Result<u64, WireError> {
    Ok(u64::from_le_bytes(read_array(p, c, "u64")?))
}

pub(crate) fn read_u16_be(p: &[u8], c: &mut usize, ctx: &'static str) -> Result<u16, WireError> {
    Ok(u16::from_be_bytes(read_array(p, c, ctx)?))
}

pub(crate) fn read_array<const N: usize>(
    p: &[u8],
    c: &mut usize,
    ctx: &'static str,
) -> Result<[u8; N], WireError> {
    let mut out = [0u8; N];
    out.copy_from_slice(read_slice(p, c, N, ctx)?);
    Ok(out)
}

pub(crate) fn read_slice<'a>(
    p: &'a [u8],
    c: &mut usize,
    len: usize,
    ctx: &'static str,
) -> Result<&'a [u8], WireError> {
    let end = c.checked_add(len).ok_or(WireError::Truncated(ctx))?;
    let s = p.get(*c..end).ok_or(WireError::Truncated(ctx))?;
    *c = end;
    Ok(s)
}
