//! Host ↔ wire byte-order conversion for fixed-layout record images.
//!
//! Fixed records (the archive header and every payload header) are packed
//! into a `[u8; N]` image at explicit offsets.  Each record type publishes a
//! `&'static [Field]` table naming the integer fields inside that image.
//! [`to_wire_order`] / [`to_host_order`] walk the table and reverse each
//! field in place when the host is little-endian; the wire order is always
//! big-endian.  Byte arrays (magic-free padding, checksums, integrity bytes)
//! are simply left out of the table.

/// One multi-byte integer inside a record image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    pub offset: usize,
    pub width:  usize,
}

impl Field {
    pub const fn new(offset: usize, width: usize) -> Self {
        Self { offset, width }
    }

    #[inline]
    fn range(self) -> std::ops::Range<usize> {
        self.offset..self.offset + self.width
    }
}

#[inline]
fn swap_fields(image: &mut [u8], fields: &[Field]) {
    if cfg!(target_endian = "big") {
        return;
    }
    for field in fields {
        image[field.range()].reverse();
    }
}

/// Convert a host-order image to wire order.
pub fn to_wire_order(image: &mut [u8], fields: &[Field]) {
    swap_fields(image, fields);
}

/// Convert a wire-order image to host order.
pub fn to_host_order(image: &mut [u8], fields: &[Field]) {
    swap_fields(image, fields);
}

// ── Typed host-order accessors ──────────────────────────────────────────────

pub fn put_u16(image: &mut [u8], field: Field, value: u16) {
    debug_assert_eq!(field.width, 2);
    image[field.range()].copy_from_slice(&value.to_ne_bytes());
}

pub fn put_u32(image: &mut [u8], field: Field, value: u32) {
    debug_assert_eq!(field.width, 4);
    image[field.range()].copy_from_slice(&value.to_ne_bytes());
}

pub fn put_u64(image: &mut [u8], field: Field, value: u64) {
    debug_assert_eq!(field.width, 8);
    image[field.range()].copy_from_slice(&value.to_ne_bytes());
}

pub fn get_u16(image: &[u8], field: Field) -> u16 {
    let mut buf = [0u8; 2];
    buf.copy_from_slice(&image[field.range()]);
    u16::from_ne_bytes(buf)
}

pub fn get_u32(image: &[u8], field: Field) -> u32 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(&image[field.range()]);
    u32::from_ne_bytes(buf)
}

pub fn get_u64(image: &[u8], field: Field) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&image[field.range()]);
    u64::from_ne_bytes(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: Field = Field::new(0, 4);
    const B: Field = Field::new(4, 2);
    const C: Field = Field::new(8, 8);
    const FIELDS: &[Field] = &[A, B, C];

    #[test]
    fn wire_order_is_big_endian() {
        let mut image = [0u8; 16];
        put_u32(&mut image, A, 0x0102_0304);
        put_u16(&mut image, B, 0x0506);
        put_u64(&mut image, C, 0x0708_090a_0b0c_0d0e);
        image[6] = 0xAA;
        to_wire_order(&mut image, FIELDS);
        assert_eq!(&image[0..4], &[1, 2, 3, 4]);
        assert_eq!(&image[4..6], &[5, 6]);
        assert_eq!(image[6], 0xAA, "bytes outside the table are untouched");
        assert_eq!(&image[8..16], &[7, 8, 9, 10, 11, 12, 13, 14]);
    }

    #[test]
    fn host_after_wire_is_identity() {
        let mut image = [0u8; 16];
        put_u32(&mut image, A, 0xdead_beef);
        put_u16(&mut image, B, 0x1234);
        put_u64(&mut image, C, u64::MAX - 7);
        let original = image;
        to_wire_order(&mut image, FIELDS);
        to_host_order(&mut image, FIELDS);
        assert_eq!(image, original);
        assert_eq!(get_u32(&image, A), 0xdead_beef);
        assert_eq!(get_u16(&image, B), 0x1234);
        assert_eq!(get_u64(&image, C), u64::MAX - 7);
    }
}
