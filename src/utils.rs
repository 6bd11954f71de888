use crate::error::{Error, Result};

pub(crate) fn write_u16(value: u16, vec8: &mut Vec<u8>) {
    vec8.extend_from_slice(&value.to_le_bytes());
}

pub(crate) fn write_u32(value: u32, vec8: &mut Vec<u8>) {
    vec8.extend_from_slice(&value.to_le_bytes());
}

pub(crate) fn write_u64(value: u64, vec8: &mut Vec<u8>) {
    vec8.extend_from_slice(&value.to_le_bytes());
}

#[inline]
pub(crate) fn read_u16_ref(vec8: &[u8], pos: &mut usize) -> u16 {
    *pos += 2;
    u16::from_le_bytes(vec8[*pos - 2..*pos].try_into().unwrap())
}

#[inline]
pub(crate) fn read_u32_ref(vec8: &[u8], pos: &mut usize) -> u32 {
    *pos += 4;
    u32::from_le_bytes(vec8[*pos - 4..*pos].try_into().unwrap())
}

#[inline]
pub(crate) fn read_u64_ref(vec8: &[u8], pos: &mut usize) -> u64 {
    *pos += 8;
    u64::from_le_bytes(vec8[*pos - 8..*pos].try_into().unwrap())
}

/// Bounds check before the infallible cursor readers touch untrusted bytes.
#[inline]
pub(crate) fn check_remaining(vec8: &[u8], pos: usize, needed: usize) -> Result<()> {
    if vec8.len() < pos + needed {
        Err(Error::Corruption(format!(
            "unexpected end of data at position {pos}: {needed} more bytes required, {} available",
            vec8.len() - pos.min(vec8.len())
        )))
    } else {
        Ok(())
    }
}

pub(crate) fn read_u8_vec(vec8: &[u8], pos: &mut usize) -> Result<Vec<u8>> {
    check_remaining(vec8, *pos, 4)?;
    let len = read_u32_ref(vec8, pos) as usize;
    check_remaining(vec8, *pos, len)?;
    let values = vec8[*pos..*pos + len].to_vec();
    *pos += len;
    Ok(values)
}

pub(crate) fn read_u16_vec(vec8: &[u8], pos: &mut usize) -> Result<Vec<u16>> {
    check_remaining(vec8, *pos, 4)?;
    let len = read_u32_ref(vec8, pos) as usize;
    check_remaining(vec8, *pos, len * 2)?;
    let mut values = Vec::with_capacity(len);
    for _ in 0..len {
        values.push(read_u16_ref(vec8, pos));
    }
    Ok(values)
}

pub(crate) fn read_u32_vec(vec8: &[u8], pos: &mut usize) -> Result<Vec<u32>> {
    check_remaining(vec8, *pos, 4)?;
    let len = read_u32_ref(vec8, pos) as usize;
    check_remaining(vec8, *pos, len * 4)?;
    let mut values = Vec::with_capacity(len);
    for _ in 0..len {
        values.push(read_u32_ref(vec8, pos));
    }
    Ok(values)
}

pub(crate) fn write_u8_vec(values: &[u8], vec8: &mut Vec<u8>) {
    write_u32(values.len() as u32, vec8);
    vec8.extend_from_slice(values);
}

pub(crate) fn write_u16_vec(values: &[u16], vec8: &mut Vec<u8>) {
    write_u32(values.len() as u32, vec8);
    for &value in values {
        write_u16(value, vec8);
    }
}

pub(crate) fn write_u32_vec(values: &[u32], vec8: &mut Vec<u8>) {
    write_u32(values.len() as u32, vec8);
    for &value in values {
        write_u32(value, vec8);
    }
}
