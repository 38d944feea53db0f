mod common;

use proptest::prelude::*;
use psdw::channel::{compress_channel, compress_composite};
use psdw::compression::*;
use psdw::PsdError;

fn packbits(row: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    packbits_encode_row(row, &mut out);
    out
}

#[test]
fn test_packbits_single_byte() {
    assert_eq!(packbits(&[42]), vec![0, 42]);
}

#[test]
fn test_packbits_run() {
    assert_eq!(packbits(&[0xAA; 5]), vec![0xFC, 0xAA]);
    assert_eq!(packbits(&[7; 3]), vec![254, 7]);
}

#[test]
fn test_packbits_literal() {
    assert_eq!(packbits(&[1, 2, 3, 4]), vec![3, 1, 2, 3, 4]);
}

#[test]
fn test_packbits_literal_then_run() {
    let input = [1, 2, 3, 0xAA, 0xAA, 0xAA, 0xAA, 0xAA];
    assert_eq!(packbits(&input), vec![2, 1, 2, 3, 0xFC, 0xAA]);
}

#[test]
fn test_packbits_short_runs_stay_literal() {
    assert_eq!(packbits(&[7, 7]), vec![1, 7, 7]);
    assert_eq!(packbits(&[1, 1, 2]), vec![2, 1, 1, 2]);
    assert_eq!(packbits(&[5, 6, 6, 5]), vec![3, 5, 6, 6, 5]);
}

#[test]
fn test_packbits_run_capped_at_128() {
    assert_eq!(packbits(&[9; 128]), vec![129, 9]);
    // 128-run, then a 2-byte remainder that must not be run encoded
    assert_eq!(packbits(&[9; 130]), vec![129, 9, 1, 9, 9]);
    assert_eq!(packbits(&[9; 131]), vec![129, 9, 254, 9]);
}

#[test]
fn test_packbits_literal_capped_at_128() {
    let input: Vec<u8> = (0..200).map(|i| i as u8).collect();
    let encoded = packbits(&input);

    assert_eq!(encoded[0], 127);
    assert_eq!(&encoded[1..129], &input[..128]);
    assert_eq!(encoded[129], 71);
    assert_eq!(&encoded[130..], &input[128..]);
}

#[test]
fn test_encode_rle_rows_lengths() {
    let data = [0u8, 0, 0, 0, 1, 2, 3, 4];
    let rows = encode_rle_rows(&data, 4).expect("encode");

    assert_eq!(rows.row_lengths, vec![2, 5]);
    assert_eq!(rows.payload, vec![253, 0, 3, 1, 2, 3, 4]);
}

#[test]
fn test_encode_rle_row_too_large() {
    // No three equal neighbours, so the row is all literals and expands.
    let row: Vec<u8> = (0..70_000u32).map(|i| (i % 251) as u8).collect();
    let err = encode_rle_rows(&row, row.len()).expect_err("row must not fit u16");

    match err {
        PsdError::RowTooLarge { row, length } => {
            assert_eq!(row, 0);
            assert!(length > usize::from(u16::MAX));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_predict_rows() {
    let mut data = [10u8, 12, 11, 11];
    predict_rows(&mut data, 4);
    assert_eq!(data, [10, 2, 255, 0]);

    // The first byte of every row is kept
    let mut data = [5u8, 1, 3, 3];
    predict_rows(&mut data, 2);
    assert_eq!(data, [5, 252, 3, 0]);
}

#[test]
fn test_deflate_roundtrip() {
    let data: Vec<u8> = (0..10_000u32).map(|i| (i / 7) as u8).collect();
    let compressed = deflate(&data).expect("deflate");

    assert!(compressed.len() < data.len());
    assert_eq!(common::inflate(&compressed), data);
}

#[test]
fn test_compression_tags() {
    for (tag, method) in Compression::ALL.into_iter().enumerate() {
        assert_eq!(method.tag(), tag as u16);
        assert_eq!(Compression::from_u16(tag as u16).expect("known tag"), method);
    }
    assert_eq!(Compression::default(), Compression::Rle);
    assert_eq!(Compression::ZipWithPrediction.to_string(), "zip-with-prediction");
}

#[test]
fn test_unknown_compression_tag() {
    let err = Compression::try_from(4u16).expect_err("tag 4 is not defined");
    assert!(matches!(err, PsdError::UnsupportedCompressionMethod(4)));
    assert!(err.is_validation_error());
}

#[test]
fn test_channel_block_layout_rle() {
    let plane = [3u8, 3, 3, 1, 2, 3];
    let block = compress_channel(&plane, 3, Compression::Rle).expect("compress");

    // tag, two row lengths, then payloads
    assert_eq!(&block[..2], &[0, 1]);
    assert_eq!(&block[2..6], &[0, 2, 0, 4]);
    assert_eq!(&block[6..], &[254, 3, 2, 1, 2, 3]);
}

#[test]
fn test_channel_block_layout_raw() {
    let plane = [9u8, 8, 7];
    let block = compress_channel(&plane, 3, Compression::Raw).expect("compress");
    assert_eq!(block, vec![0, 0, 9, 8, 7]);
}

#[test]
fn test_composite_rle_groups_tables_before_payloads() {
    let red = [1u8, 1, 1, 1];
    let green = [2u8, 3, 4, 5];
    let blue = [0u8, 0, 0, 0];
    let planes: [&[u8]; 3] = [&red, &green, &blue];
    let block = compress_composite(&planes, 2, Compression::Rle).expect("compress");

    let expected: Vec<u8> = [
        &[0u8, 1][..],
        // red rows, green rows, blue rows
        &[0, 3, 0, 3],
        &[0, 3, 0, 3],
        &[0, 3, 0, 3],
        // payloads in the same order
        &[1, 1, 1],
        &[1, 1, 1],
        &[1, 2, 3],
        &[1, 4, 5],
        &[1, 0, 0],
        &[1, 0, 0],
    ]
    .concat();
    assert_eq!(block, expected);
}

#[test]
fn test_composite_prediction_is_per_plane() {
    let red = [10u8, 20];
    let green = [30u8, 25];
    let planes: [&[u8]; 2] = [&red, &green];
    let block =
        compress_composite(&planes, 2, Compression::ZipWithPrediction).expect("compress");

    assert_eq!(&block[..2], &[0, 3]);
    // The first byte of the green plane is not differenced against red
    assert_eq!(common::inflate(&block[2..]), vec![10, 10, 30, 251]);
}

fn rows_strategy() -> impl Strategy<Value = (usize, Vec<u8>)> {
    (1usize..300, 1usize..4).prop_flat_map(|(width, height)| {
        let runs = prop_oneof![
            any::<u8>(),
            Just(0u8),
            Just(255u8),
        ];
        (Just(width), proptest::collection::vec(runs, width * height))
    })
}

proptest! {
    #[test]
    fn prop_rle_roundtrip((width, data) in rows_strategy()) {
        let rows = encode_rle_rows(&data, width).expect("encode");
        prop_assert_eq!(rows.row_lengths.len(), data.len() / width);

        let mut offset = 0;
        let mut decoded = Vec::with_capacity(data.len());
        for &len in &rows.row_lengths {
            let len = usize::from(len);
            // checks control byte ranges and the decoded row length
            decoded.extend(common::packbits_decode_row(&rows.payload[offset..offset + len], width));
            offset += len;
        }
        prop_assert_eq!(offset, rows.payload.len());
        prop_assert_eq!(decoded, data);
    }

    #[test]
    fn prop_rle_worst_case_expansion(row in proptest::collection::vec(any::<u8>(), 1..1000)) {
        let encoded = packbits(&row);
        prop_assert!(encoded.len() <= row.len() + row.len().div_ceil(MAX_PACKBITS_RUN));
    }

    #[test]
    fn prop_every_method_roundtrips((width, data) in rows_strategy()) {
        let height = data.len() / width;
        for method in Compression::ALL {
            let block = compress_channel(&data, width, method).expect("compress");
            let (tag, decoded) = common::decode_channel_block(&block, width, height);
            prop_assert_eq!(tag, method.tag());
            prop_assert_eq!(&decoded, &data);
        }
    }
}
