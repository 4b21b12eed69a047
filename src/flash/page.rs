//! Image partitioning into flash pages.
//!
//! Pages are half-open `[start, end)` slices of the image. The final
//! partial page is padded with the flash fill byte to full page size for
//! CRC computation only — transmitted bytes are never padded.

/// Erased-flash fill byte; pads the final partial page before CRC.
pub const PAGE_FILL: u8 = 0xFF;

/// Number of pages an image occupies: `ceil(len / page_size)`.
pub fn page_count(image_len: usize, page_size: usize) -> usize {
    image_len.div_ceil(page_size)
}

/// One page of the source image. Holds only the real (unpadded) bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    /// Zero-based page index within the image.
    pub index: usize,
    /// Real image bytes; shorter than the page size only for the final
    /// partial page.
    pub data: Vec<u8>,
}

impl Page {
    /// The page data padded with [`PAGE_FILL`] to exactly `page_size`.
    pub fn padded(&self, page_size: usize) -> Vec<u8> {
        let mut bytes = self.data.clone();
        bytes.resize(page_size, PAGE_FILL);
        bytes
    }

    /// CRC-32 (zlib polynomial) over the padded page. Both ends compute
    /// this over the full page, including any fill bytes the final page
    /// never transmitted.
    pub fn crc32(&self, page_size: usize) -> u32 {
        crc32fast::hash(&self.padded(page_size))
    }
}

/// Split an image into pages of `page_size`, last page clamped to the
/// image's true end.
pub fn split_pages(image: &[u8], page_size: usize) -> Vec<Page> {
    assert!(page_size > 0, "page size must be nonzero");
    image
        .chunks(page_size)
        .enumerate()
        .map(|(index, chunk)| Page { index, data: chunk.to_vec() })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_count_is_ceiling_division() {
        assert_eq!(page_count(0, 256), 0);
        assert_eq!(page_count(1, 256), 1);
        assert_eq!(page_count(256, 256), 1);
        assert_eq!(page_count(257, 256), 2);
        assert_eq!(page_count(600, 256), 3);
    }

    #[test]
    fn split_clamps_final_page_to_image_end() {
        let image = vec![0xAB; 600];
        let pages = split_pages(&image, 256);
        assert_eq!(pages.len(), 3);
        assert_eq!(pages[0].data.len(), 256);
        assert_eq!(pages[1].data.len(), 256);
        assert_eq!(pages[2].data.len(), 88);
        assert_eq!(pages[2].index, 2);
    }

    #[test]
    fn padded_final_page_has_exact_page_size() {
        let page = Page { index: 0, data: vec![0x11; 88] };
        let padded = page.padded(256);
        assert_eq!(padded.len(), 256);
        assert_eq!(&padded[..88], &[0x11; 88][..]);
        assert!(padded[88..].iter().all(|&b| b == PAGE_FILL));
    }

    #[test]
    fn full_page_is_unchanged_by_padding() {
        let page = Page { index: 0, data: vec![0x22; 256] };
        assert_eq!(page.padded(256), vec![0x22; 256]);
    }

    #[test]
    fn crc_covers_fill_bytes() {
        let partial = Page { index: 0, data: vec![0x33; 10] };
        let explicit = {
            let mut bytes = vec![0x33; 10];
            bytes.resize(256, PAGE_FILL);
            crc32fast::hash(&bytes)
        };
        assert_eq!(partial.crc32(256), explicit);
        // And differs from the CRC over the unpadded bytes.
        assert_ne!(partial.crc32(256), crc32fast::hash(&partial.data));
    }

    #[test]
    fn empty_page_crc_is_crc_of_all_fill() {
        let page = Page { index: 0, data: Vec::new() };
        assert_eq!(page.crc32(64), crc32fast::hash(&[PAGE_FILL; 64]));
    }
}
