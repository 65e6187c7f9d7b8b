/// TGA image decoder.
///
/// Handles the four image types the console blits: raw and run-length
/// encoded, each either color-mapped or true-color, at 24 or 32 bits per
/// color sample. Output is packed ARGB, row-major, top row first.

use alloc::vec::Vec;
use core::fmt;

pub const HEADER_LEN: usize = 18;

/// Set in the image descriptor byte when rows are stored top to bottom.
const TOP_LEFT_ORIGIN: u8 = 0x20;

/// Number of leading slots in a decoded buffer holding width and height.
pub const SLOT_HEADER_LEN: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    InvalidDimensions { width: usize, height: usize },
    DimensionMismatch {
        declared: (usize, usize),
        header: (usize, usize),
    },
    Truncated { offset: usize },
    UnsupportedImageType(u8),
    InvalidColorMap,
    UnsupportedPixelDepth(u8),
    PaletteIndexOutOfRange { index: usize, len: usize },
    OutOfMemory,
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::InvalidDimensions { width, height } => {
                write!(f, "invalid image dimensions {}x{}", width, height)
            }
            DecodeError::DimensionMismatch { declared, header } => write!(
                f,
                "declared size {}x{} does not match header size {}x{}",
                declared.0, declared.1, header.0, header.1
            ),
            DecodeError::Truncated { offset } => {
                write!(f, "image data truncated at byte {}", offset)
            }
            DecodeError::UnsupportedImageType(t) => write!(f, "unsupported image type {}", t),
            DecodeError::InvalidColorMap => write!(f, "color map does not match image type"),
            DecodeError::UnsupportedPixelDepth(d) => write!(f, "unsupported pixel depth {}", d),
            DecodeError::PaletteIndexOutOfRange { index, len } => {
                write!(f, "palette index {} out of range ({} entries)", index, len)
            }
            DecodeError::OutOfMemory => write!(f, "out of memory for decoded image"),
        }
    }
}

/// The four supported layouts of the image-type byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    RawIndexed,
    RawTrueColor,
    RleIndexed,
    RleTrueColor,
}

impl ImageKind {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(ImageKind::RawIndexed),
            2 => Some(ImageKind::RawTrueColor),
            9 => Some(ImageKind::RleIndexed),
            10 => Some(ImageKind::RleTrueColor),
            _ => None,
        }
    }

    pub fn is_indexed(self) -> bool {
        matches!(self, ImageKind::RawIndexed | ImageKind::RleIndexed)
    }

    pub fn is_rle(self) -> bool {
        matches!(self, ImageKind::RleIndexed | ImageKind::RleTrueColor)
    }
}

/// Fields of the fixed 18-byte header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TgaHeader {
    pub id_length: u8,
    pub color_map_type: u8,
    pub image_type: u8,
    pub color_map_first: u16,
    pub color_map_length: u16,
    pub color_map_depth: u8,
    pub width: u16,
    pub height: u16,
    pub pixel_depth: u8,
    pub descriptor: u8,
}

impl TgaHeader {
    pub fn parse(bytes: &[u8]) -> Result<Self, DecodeError> {
        let h = bytes
            .get(..HEADER_LEN)
            .ok_or(DecodeError::Truncated { offset: bytes.len() })?;
        let le16 = |i: usize| u16::from_le_bytes([h[i], h[i + 1]]);
        Ok(TgaHeader {
            id_length: h[0],
            color_map_type: h[1],
            image_type: h[2],
            color_map_first: le16(3),
            color_map_length: le16(5),
            color_map_depth: h[7],
            width: le16(12),
            height: le16(14),
            pixel_depth: h[16],
            descriptor: h[17],
        })
    }

    pub fn top_left_origin(&self) -> bool {
        self.descriptor & TOP_LEFT_ORIGIN != 0
    }

    pub fn palette_offset(&self) -> usize {
        HEADER_LEN + self.id_length as usize
    }

    /// Byte length of the color map; zero when no map is present.
    pub fn palette_len(&self) -> usize {
        if self.color_map_type == 0 {
            return 0;
        }
        self.color_map_length as usize * (self.color_map_depth as usize >> 3)
    }

    pub fn data_offset(&self) -> usize {
        self.palette_offset() + self.palette_len()
    }

    /// Checks the color map and depth constraints for `kind`, returning the
    /// byte width of one color sample.
    fn validate(&self, kind: ImageKind) -> Result<usize, DecodeError> {
        if kind.is_indexed() {
            // The low byte of the map length is free; the first entry index
            // and the high byte must be zero.
            if self.color_map_type != 1
                || self.color_map_first != 0
                || self.color_map_length > 0xFF
            {
                return Err(DecodeError::InvalidColorMap);
            }
            if !matches!(self.color_map_depth, 24 | 32) {
                return Err(DecodeError::UnsupportedPixelDepth(self.color_map_depth));
            }
            if self.pixel_depth != 8 {
                return Err(DecodeError::UnsupportedPixelDepth(self.pixel_depth));
            }
            Ok(self.color_map_depth as usize >> 3)
        } else {
            if self.color_map_type != 0 || self.color_map_length != 0 {
                return Err(DecodeError::InvalidColorMap);
            }
            if !matches!(self.pixel_depth, 24 | 32) {
                return Err(DecodeError::UnsupportedPixelDepth(self.pixel_depth));
            }
            Ok(self.pixel_depth as usize >> 3)
        }
    }
}

/// Decoded image owning its pixel slots.
///
/// Slot 0 holds the width, slot 1 the height, and the remaining
/// `width * height` slots the ARGB pixels, top row first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedImage {
    slots: Vec<u32>,
}

impl DecodedImage {
    pub fn width(&self) -> usize {
        self.slots[0] as usize
    }

    pub fn height(&self) -> usize {
        self.slots[1] as usize
    }

    pub fn pixels(&self) -> &[u32] {
        &self.slots[SLOT_HEADER_LEN..]
    }

    pub fn pixel(&self, x: usize, y: usize) -> Option<u32> {
        if x >= self.width() || y >= self.height() {
            return None;
        }
        self.pixels().get(y * self.width() + x).copied()
    }

    pub fn as_slots(&self) -> &[u32] {
        &self.slots
    }

    pub fn into_slots(self) -> Vec<u32> {
        self.slots
    }
}

/// Packs one little-endian BGR(A) sample.
#[inline]
fn pack_argb(sample: &[u8]) -> u32 {
    let alpha = if sample.len() == 4 { sample[3] } else { 0xFF };
    (alpha as u32) << 24 | (sample[2] as u32) << 16 | (sample[1] as u32) << 8 | sample[0] as u32
}

/// Where color samples come from: the pixel stream itself or a palette.
enum Lookup<'a> {
    Direct,
    Palette { entries: &'a [u8], len: usize },
}

/// Sequential reader over the pixel stream.
///
/// Raw streams yield one sample per pixel. RLE streams are expanded packet by
/// packet; `repeat` and `literal` hold what is left of the current packet.
struct SampleReader<'a> {
    bytes: &'a [u8],
    offset: usize,
    sample_len: usize,
    lookup: Lookup<'a>,
    rle: bool,
    repeat: usize,
    literal: usize,
    current: u32,
}

impl<'a> SampleReader<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8], DecodeError> {
        let bytes = self.bytes;
        let end = self.offset + n;
        let chunk = bytes
            .get(self.offset..end)
            .ok_or(DecodeError::Truncated { offset: bytes.len() })?;
        self.offset = end;
        Ok(chunk)
    }

    fn read_color(&mut self) -> Result<u32, DecodeError> {
        match self.lookup {
            Lookup::Direct => {
                let n = self.sample_len;
                self.take(n).map(pack_argb)
            }
            Lookup::Palette { entries, len } => {
                let index = self.take(1)?[0] as usize;
                if index >= len {
                    return Err(DecodeError::PaletteIndexOutOfRange { index, len });
                }
                let start = index * self.sample_len;
                Ok(pack_argb(&entries[start..start + self.sample_len]))
            }
        }
    }

    fn next_color(&mut self) -> Result<u32, DecodeError> {
        if !self.rle {
            return self.read_color();
        }
        if self.repeat == 0 && self.literal == 0 {
            let control = self.take(1)?[0];
            if control > 127 {
                self.repeat = control as usize - 127;
                self.current = self.read_color()?;
            } else {
                self.literal = control as usize + 1;
            }
        }
        if self.repeat > 0 {
            self.repeat -= 1;
            Ok(self.current)
        } else {
            self.literal -= 1;
            self.read_color()
        }
    }
}

/// Decodes `bytes` as a TGA image of the declared size.
pub fn decode(bytes: &[u8], width: usize, height: usize) -> Result<DecodedImage, DecodeError> {
    if width < 1 || height < 1 {
        return Err(DecodeError::InvalidDimensions { width, height });
    }

    let header = TgaHeader::parse(bytes)?;
    let header_size = (header.width as usize, header.height as usize);
    if header_size != (width, height) {
        return Err(DecodeError::DimensionMismatch {
            declared: (width, height),
            header: header_size,
        });
    }

    let kind = ImageKind::from_code(header.image_type)
        .ok_or(DecodeError::UnsupportedImageType(header.image_type))?;
    let sample_len = header.validate(kind)?;

    let lookup = if kind.is_indexed() {
        let start = header.palette_offset();
        let entries = bytes
            .get(start..start + header.palette_len())
            .ok_or(DecodeError::Truncated { offset: bytes.len() })?;
        Lookup::Palette {
            entries,
            len: header.color_map_length as usize,
        }
    } else {
        Lookup::Direct
    };

    let pixel_count = width
        .checked_mul(height)
        .ok_or(DecodeError::InvalidDimensions { width, height })?;
    let mut slots = Vec::new();
    slots
        .try_reserve_exact(pixel_count + SLOT_HEADER_LEN)
        .map_err(|_| DecodeError::OutOfMemory)?;
    slots.push(width as u32);
    slots.push(height as u32);
    slots.resize(pixel_count + SLOT_HEADER_LEN, 0);

    let mut reader = SampleReader {
        bytes,
        offset: header.data_offset(),
        sample_len,
        lookup,
        rle: kind.is_rle(),
        repeat: 0,
        literal: 0,
        current: 0,
    };

    let top_left = header.top_left_origin();
    for source_row in 0..height {
        let row = if top_left { source_row } else { height - 1 - source_row };
        let start = SLOT_HEADER_LEN + row * width;
        for slot in &mut slots[start..start + width] {
            *slot = reader.next_color()?;
        }
    }

    log::debug!(
        "tga: decoded {:?} {}x{} ({} bytes consumed)",
        kind,
        width,
        height,
        reader.offset
    );
    Ok(DecodedImage { slots })
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    fn header(image_type: u8, map: (u8, u16, u8), size: (u16, u16), depth: u8, desc: u8) -> Vec<u8> {
        let mut h = vec![0u8; HEADER_LEN];
        h[1] = map.0;
        h[2] = image_type;
        h[5..7].copy_from_slice(&map.1.to_le_bytes());
        h[7] = map.2;
        h[12..14].copy_from_slice(&size.0.to_le_bytes());
        h[14..16].copy_from_slice(&size.1.to_le_bytes());
        h[16] = depth;
        h[17] = desc;
        h
    }

    #[test]
    fn header_fields_are_little_endian() {
        let h = header(2, (0, 0, 0), (0x0102, 0x0304), 32, 0x20);
        let parsed = TgaHeader::parse(&h).unwrap();
        assert_eq!(parsed.width, 0x0102);
        assert_eq!(parsed.height, 0x0304);
        assert_eq!(parsed.pixel_depth, 32);
        assert!(parsed.top_left_origin());
        assert_eq!(parsed.data_offset(), HEADER_LEN);
    }

    #[test]
    fn short_header_is_truncated() {
        assert_eq!(
            TgaHeader::parse(&[0u8; 10]),
            Err(DecodeError::Truncated { offset: 10 })
        );
    }

    #[test]
    fn raw_indexed_uses_palette() {
        // 2x1, palette of two 24-bit entries: blue, red.
        let mut bytes = header(1, (1, 2, 24), (2, 1), 8, 0x20);
        bytes.extend_from_slice(&[0xFF, 0x00, 0x00, 0x00, 0x00, 0xFF]);
        bytes.extend_from_slice(&[1, 0]);
        let image = decode(&bytes, 2, 1).unwrap();
        assert_eq!(image.pixels(), &[0xFFFF_0000, 0xFF00_00FF]);
    }

    #[test]
    fn rle_indexed_packet_spans_rows() {
        // 2x2 bottom-left origin, one repeat packet of 3 then one literal.
        let mut bytes = header(9, (1, 2, 32), (2, 2), 8, 0);
        bytes.extend_from_slice(&[0x10, 0x20, 0x30, 0x40, 0x01, 0x02, 0x03, 0x04]);
        bytes.extend_from_slice(&[0x82, 0, 0x00, 1]);
        let image = decode(&bytes, 2, 2).unwrap();
        let a = 0x4030_2010;
        let b = 0x0403_0201;
        // Source row 0 is the bottom output row.
        assert_eq!(image.pixels(), &[a, b, a, a]);
    }

    #[test]
    fn id_field_is_skipped() {
        let mut bytes = header(2, (0, 0, 0), (1, 1), 24, 0);
        bytes[0] = 3;
        bytes.extend_from_slice(b"abc");
        bytes.extend_from_slice(&[0x03, 0x02, 0x01]);
        assert_eq!(decode(&bytes, 1, 1).unwrap().pixels(), &[0xFF01_0203]);
    }

    #[test]
    fn palette_index_past_map_is_rejected() {
        let mut bytes = header(1, (1, 1, 24), (1, 1), 8, 0);
        bytes.extend_from_slice(&[1, 2, 3, 5]);
        assert_eq!(
            decode(&bytes, 1, 1),
            Err(DecodeError::PaletteIndexOutOfRange { index: 5, len: 1 })
        );
    }

    #[test]
    fn indexed_map_constraints() {
        let mut bytes = header(1, (1, 1, 24), (1, 1), 8, 0);
        bytes[3] = 1; // first entry index
        bytes.extend_from_slice(&[1, 2, 3, 0]);
        assert_eq!(decode(&bytes, 1, 1), Err(DecodeError::InvalidColorMap));

        let mut bytes = header(9, (1, 1, 16), (1, 1), 8, 0);
        bytes.extend_from_slice(&[1, 2, 0x80, 0]);
        assert_eq!(decode(&bytes, 1, 1), Err(DecodeError::UnsupportedPixelDepth(16)));
    }

    #[test]
    fn true_color_rejects_color_map() {
        let mut bytes = header(10, (1, 0, 0), (1, 1), 24, 0);
        bytes.extend_from_slice(&[0x80, 1, 2, 3]);
        assert_eq!(decode(&bytes, 1, 1), Err(DecodeError::InvalidColorMap));

        let bytes = header(2, (0, 0, 0), (1, 1), 16, 0);
        assert_eq!(decode(&bytes, 1, 1), Err(DecodeError::UnsupportedPixelDepth(16)));
    }

    #[test]
    fn missing_pixel_data_is_truncated() {
        let mut bytes = header(2, (0, 0, 0), (2, 1), 24, 0);
        bytes.extend_from_slice(&[1, 2, 3, 4]);
        assert!(matches!(decode(&bytes, 2, 1), Err(DecodeError::Truncated { .. })));
    }

    #[test]
    fn overlong_final_packet_is_clipped() {
        let mut bytes = header(10, (0, 0, 0), (2, 1), 24, 0);
        bytes.extend_from_slice(&[0xFF, 9, 8, 7]);
        let image = decode(&bytes, 2, 1).unwrap();
        assert_eq!(image.pixels(), &[0xFF07_0809, 0xFF07_0809]);
    }
}
