//! Property tests for the wire codec and page partitioning.

use bootlink::flash::page::{PAGE_FILL, page_count, split_pages};
use bootlink::rpc::codec::{
    CODEC_VERSION, Decoder, Encoder, MessageHeader, MessageType,
};
use proptest::prelude::*;

// ── Header round-trip ─────────────────────────────────────────

fn arb_message_type() -> impl Strategy<Value = MessageType> {
    prop_oneof![
        Just(MessageType::Invocation),
        Just(MessageType::OnewayInvocation),
        Just(MessageType::SingleNormalReply),
        Just(MessageType::Notification),
    ]
}

proptest! {
    /// Any header with in-width fields survives pack/unpack unchanged.
    #[test]
    fn header_round_trips(
        service in 0u8..=0x1F,
        request in 0u8..=0x3F,
        sequence in 0u8..=0x1F,
        message_type in arb_message_type(),
        protocol in 0u8..=0xF,
    ) {
        let header = MessageHeader {
            version: CODEC_VERSION,
            service,
            request,
            sequence,
            message_type,
            protocol,
        };
        prop_assert_eq!(MessageHeader::unpack(header.pack()).unwrap(), header);
    }

    /// The packed form is always exactly 3 bytes with version bits clear
    /// (version 0 is the only version this codec speaks).
    #[test]
    fn packed_header_version_bits(
        service in 0u8..=0x1F,
        request in 0u8..=0x3F,
        sequence in 0u8..=0x1F,
    ) {
        let bytes = MessageHeader::request(service, request, sequence).pack();
        prop_assert_eq!(bytes[0] & 0x3, CODEC_VERSION);
    }
}

// ── Primitive round-trips ─────────────────────────────────────

proptest! {
    #[test]
    fn fixed_width_round_trips(
        a in any::<u8>(),
        b in any::<i16>(),
        c in any::<u32>(),
        d in any::<i64>(),
        e in any::<u64>(),
        f in any::<f32>(),
        g in any::<f64>(),
        h in any::<bool>(),
    ) {
        let mut enc = Encoder::new();
        enc.write_u8(a);
        enc.write_i16(b);
        enc.write_u32(c);
        enc.write_i64(d);
        enc.write_u64(e);
        enc.write_f32(f);
        enc.write_f64(g);
        enc.write_bool(h);

        let mut dec = Decoder::new(enc.into_bytes());
        prop_assert_eq!(dec.read_u8().unwrap(), a);
        prop_assert_eq!(dec.read_i16().unwrap(), b);
        prop_assert_eq!(dec.read_u32().unwrap(), c);
        prop_assert_eq!(dec.read_i64().unwrap(), d);
        prop_assert_eq!(dec.read_u64().unwrap(), e);
        // Bit-exact float round-trip, NaN included.
        prop_assert_eq!(dec.read_f32().unwrap().to_bits(), f.to_bits());
        prop_assert_eq!(dec.read_f64().unwrap().to_bits(), g.to_bits());
        prop_assert_eq!(dec.read_bool().unwrap(), h);
        prop_assert_eq!(dec.remaining(), 0);
    }

    #[test]
    fn string_round_trips(s in ".*") {
        let mut enc = Encoder::new();
        enc.write_string(&s);
        let mut dec = Decoder::new(enc.into_bytes());
        prop_assert_eq!(dec.read_string().unwrap(), s);
    }

    #[test]
    fn binary_round_trips(data in proptest::collection::vec(any::<u8>(), 0..512)) {
        let mut enc = Encoder::new();
        enc.write_binary(&data);
        let mut dec = Decoder::new(enc.into_bytes());
        prop_assert_eq!(dec.read_binary().unwrap(), data);
    }

    /// The list prefix always uses the smallest width that fits.
    #[test]
    fn list_prefix_width_is_minimal(length in 0usize..=1_000_000) {
        let mut enc = Encoder::new();
        enc.start_list(length);
        let expected = if length < 256 {
            1
        } else if length < 65_536 {
            2
        } else {
            4
        };
        prop_assert_eq!(enc.len(), expected);
    }

    /// Truncating an encoded buffer at any point yields TruncatedBuffer,
    /// never a panic or a bogus value.
    #[test]
    fn truncation_is_always_detected(cut in 0usize..8) {
        let mut enc = Encoder::new();
        enc.write_u64(0x0102_0304_0506_0708);
        let mut bytes = enc.into_bytes();
        bytes.truncate(cut);
        let mut dec = Decoder::new(bytes);
        prop_assert!(dec.read_u64().is_err());
    }
}

// ── Page partitioning ─────────────────────────────────────────

proptest! {
    #[test]
    fn partition_invariants(
        image in proptest::collection::vec(any::<u8>(), 1..2048),
        page_size in 1usize..512,
    ) {
        let pages = split_pages(&image, page_size);

        // ceil(N/P) pages.
        prop_assert_eq!(pages.len(), page_count(image.len(), page_size));
        prop_assert_eq!(pages.len(), image.len().div_ceil(page_size));

        // Concatenated page data reassembles the image exactly.
        let rejoined: Vec<u8> = pages.iter().flat_map(|p| p.data.clone()).collect();
        prop_assert_eq!(rejoined, image.clone());

        // Every page except the last is full; every padded page is exact.
        for page in &pages {
            if page.index + 1 < pages.len() {
                prop_assert_eq!(page.data.len(), page_size);
            }
            prop_assert_eq!(page.padded(page_size).len(), page_size);
        }

        // Padding bytes are all the flash fill value.
        let last = &pages[pages.len() - 1];
        let padded = last.padded(page_size);
        prop_assert!(padded[last.data.len()..].iter().all(|&b| b == PAGE_FILL));
    }
}

// ── CRC-32 against an independent reference ───────────────────

/// Bitwise zlib CRC-32 (reflected polynomial 0xEDB88320), written
/// independently of the crc32fast dependency.
fn crc32_reference(data: &[u8]) -> u32 {
    let mut crc: u32 = 0xFFFF_FFFF;
    for &byte in data {
        crc ^= u32::from(byte);
        for _ in 0..8 {
            let mask = (crc & 1).wrapping_neg();
            crc = (crc >> 1) ^ (0xEDB8_8320 & mask);
        }
    }
    !crc
}

#[test]
fn crc_reference_known_vector() {
    // The classic check value for "123456789".
    assert_eq!(crc32_reference(b"123456789"), 0xCBF4_3926);
    assert_eq!(crc32fast::hash(b"123456789"), 0xCBF4_3926);
}

#[test]
fn empty_page_crc_matches_reference() {
    for page_size in [64usize, 256, 512] {
        let page = bootlink::flash::page::Page { index: 0, data: Vec::new() };
        assert_eq!(
            page.crc32(page_size),
            crc32_reference(&vec![PAGE_FILL; page_size]),
            "all-fill page of {page_size} bytes"
        );
    }
}

proptest! {
    /// Page CRCs agree with the independent bitwise implementation.
    #[test]
    fn page_crc_matches_reference(
        data in proptest::collection::vec(any::<u8>(), 0..256),
    ) {
        let page_size = 256;
        let page = bootlink::flash::page::Page { index: 0, data };
        prop_assert_eq!(page.crc32(page_size), crc32_reference(&page.padded(page_size)));
    }
}
