//! Image header sniffing.

/// Raster formats recognised from magic bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Jpeg,
    Png,
    Gif,
    WebP,
}

/// Native format of an image resource: its format and pixel size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageInfo {
    pub format: ImageFormat,
    pub width: u32,
    pub height: u32,
}

impl ImageInfo {
    /// Identify the format and read the dimensions from the file header.
    pub fn sniff(data: &[u8]) -> Option<ImageInfo> {
        let (format, (width, height)) = if data.starts_with(&[0x89, b'P', b'N', b'G']) {
            (ImageFormat::Png, png_dimensions(data)?)
        } else if data.starts_with(&[0xFF, 0xD8]) {
            (ImageFormat::Jpeg, jpeg_dimensions(data)?)
        } else if data.starts_with(b"GIF8") {
            (ImageFormat::Gif, gif_dimensions(data)?)
        } else if data.len() >= 12 && &data[0..4] == b"RIFF" && &data[8..12] == b"WEBP" {
            (ImageFormat::WebP, webp_dimensions(data)?)
        } else {
            return None;
        };
        Some(ImageInfo {
            format,
            width,
            height,
        })
    }
}

// Width and height live in the IHDR chunk at bytes 16..24
fn png_dimensions(data: &[u8]) -> Option<(u32, u32)> {
    let header = data.get(16..24)?;
    let width = u32::from_be_bytes([header[0], header[1], header[2], header[3]]);
    let height = u32::from_be_bytes([header[4], header[5], header[6], header[7]]);
    Some((width, height))
}

fn gif_dimensions(data: &[u8]) -> Option<(u32, u32)> {
    let header = data.get(6..10)?;
    let width = u16::from_le_bytes([header[0], header[1]]) as u32;
    let height = u16::from_le_bytes([header[2], header[3]]) as u32;
    Some((width, height))
}

/// Walk the JPEG marker segments until a start-of-frame marker.
fn jpeg_dimensions(data: &[u8]) -> Option<(u32, u32)> {
    let mut i = 2;
    while i + 4 < data.len() {
        if data[i] != 0xFF {
            i += 1;
            continue;
        }

        let marker = data[i + 1];
        if matches!(
            marker,
            0xC0 | 0xC1 | 0xC2 | 0xC3 | 0xC5 | 0xC6 | 0xC7 | 0xC9 | 0xCA | 0xCB | 0xCD | 0xCE | 0xCF
        ) && i + 9 < data.len()
        {
            let height = u16::from_be_bytes([data[i + 5], data[i + 6]]) as u32;
            let width = u16::from_be_bytes([data[i + 7], data[i + 8]]) as u32;
            return Some((width, height));
        }

        let length = u16::from_be_bytes([data[i + 2], data[i + 3]]) as usize;
        i += 2 + length;
    }
    None
}

fn webp_dimensions(data: &[u8]) -> Option<(u32, u32)> {
    let chunk = data.get(12..16)?;
    match chunk {
        b"VP8 " => {
            let frame = data.get(26..30)?;
            let width = (u16::from_le_bytes([frame[0], frame[1]]) & 0x3FFF) as u32;
            let height = (u16::from_le_bytes([frame[2], frame[3]]) & 0x3FFF) as u32;
            Some((width, height))
        }
        b"VP8L" => {
            let bits = data.get(21..25)?;
            let (b0, b1, b2, b3) = (bits[0] as u32, bits[1] as u32, bits[2] as u32, bits[3] as u32);
            let width = 1 + (((b1 & 0x3F) << 8) | b0);
            let height = 1 + (((b3 & 0x0F) << 10) | (b2 << 2) | ((b1 & 0xC0) >> 6));
            Some((width, height))
        }
        b"VP8X" => {
            let canvas = data.get(24..30)?;
            let width = 1 + u32::from_le_bytes([canvas[0], canvas[1], canvas[2], 0]);
            let height = 1 + u32::from_le_bytes([canvas[3], canvas[4], canvas[5], 0]);
            Some((width, height))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png_header(width: u32, height: u32) -> Vec<u8> {
        let mut data = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
        data.extend_from_slice(&[0, 0, 0, 13]);
        data.extend_from_slice(b"IHDR");
        data.extend_from_slice(&width.to_be_bytes());
        data.extend_from_slice(&height.to_be_bytes());
        data
    }

    #[test]
    fn test_png() {
        let info = ImageInfo::sniff(&png_header(640, 480)).unwrap();
        assert_eq!(info.format, ImageFormat::Png);
        assert_eq!((info.width, info.height), (640, 480));
    }

    #[test]
    fn test_gif() {
        let mut data = b"GIF89a".to_vec();
        data.extend_from_slice(&[0x20, 0x00, 0x10, 0x00]);
        let info = ImageInfo::sniff(&data).unwrap();
        assert_eq!(info.format, ImageFormat::Gif);
        assert_eq!((info.width, info.height), (32, 16));
    }

    #[test]
    fn test_jpeg_sof() {
        let mut data = vec![0xFF, 0xD8];
        // APP0 segment, length 4
        data.extend_from_slice(&[0xFF, 0xE0, 0x00, 0x04, 0x00, 0x00]);
        // SOF0: length, precision, height, width
        data.extend_from_slice(&[0xFF, 0xC0, 0x00, 0x11, 0x08, 0x01, 0x2C, 0x00, 0xC8, 0x03]);
        let info = ImageInfo::sniff(&data).unwrap();
        assert_eq!(info.format, ImageFormat::Jpeg);
        assert_eq!((info.width, info.height), (200, 300));
    }

    #[test]
    fn test_unrecognised() {
        assert_eq!(ImageInfo::sniff(b"not an image at all, really"), None);
        assert_eq!(ImageInfo::sniff(&[0x89, b'P', b'N', b'G']), None);
    }
}
