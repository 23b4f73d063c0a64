/// Integration tests: full compress → decompress cycles through `DepthCodec`,
/// covering the reference-frame state machine, corruption handling and the
/// second-stage compressors.
use dpk_codecs::{Lz4Compressor, ZstdCompressor};
use dpk_core::format::{self, FrameHeader, HEADER_SIZE, STAGE_STORED, STAGE_ZSTD, TAG_LOSSLESS, TAG_LOSSY};
use dpk_core::nibble::NibbleReader;
use dpk_core::rvl::{decode_residuals, encode_residuals};
use dpk_core::{ByteCompressor, DepthCodec, DepthError, Lossless, LosslessCodec, Lossy, LossyCodec};
use xxhash_rust::xxh3::xxh3_64;

const W: u32 = 160;
const H: u32 = 120;

/// Deterministic synthetic depth scene at time `t`: a sloped back wall, a
/// floor, a blob moving across the frame, sensor holes and a little noise.
fn depth_scene(width: u32, height: u32, t: u32, seed: u64) -> Vec<u16> {
    let mut rng = seed ^ (t as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15);
    let blob_x = (20 + t * 3) % width;
    let blob_y = height / 2;
    (0..height)
        .flat_map(|y| (0..width).map(move |x| (x, y)))
        .map(|(x, y)| {
            rng = rng
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            let noise = ((rng >> 60) as i32) - 8;
            if (rng >> 40) % 97 == 0 {
                return 0; // hole
            }
            let dx = x as i32 - blob_x as i32;
            let dy = y as i32 - blob_y as i32;
            let base = if dx * dx + dy * dy < 400 {
                1200 + dx.abs() * 2
            } else if y > height * 3 / 4 {
                2000 + (height - y) as i32 * 40
            } else {
                4500 + x as i32 * 3
            };
            (base + noise).clamp(1, u16::MAX as i32) as u16
        })
        .collect()
}

fn roundtrip_sequence<Q: dpk_core::Quantizer>(
    mut encoder: DepthCodec<Q>,
    mut decoder: DepthCodec<Q>,
    frames: usize,
) -> Vec<(Vec<u16>, Vec<u16>)> {
    (0..frames as u32)
        .map(|t| {
            let frame = depth_scene(W, H, t, 7);
            let keyframe = t % 10 == 0;
            let buf = encoder.compress(W, H, &frame, keyframe).unwrap();
            assert_eq!(format::is_keyframe(&buf), keyframe);
            let out = decoder.decompress(&buf).unwrap();
            assert_eq!((out.width, out.height), (W, H));
            (frame, out.depth)
        })
        .collect()
}

// ── scenarios ──────────────────────────────────────────────────────────────

#[test]
fn test_two_by_two_zero_keyframe() {
    let mut enc = LosslessCodec::lossless();
    let buf = enc.compress(2, 2, &[0; 4], true).unwrap();

    // One VLE word: zeroCount=4, nonzeroCount=0, padding.
    assert_eq!(buf.len(), HEADER_SIZE + 4);
    let header = FrameHeader::peek(&buf).unwrap();
    assert_eq!(header.stage, STAGE_STORED);
    assert_eq!(header.payload_len, 4);
    assert!(header.keyframe);

    let mut r = NibbleReader::new(&buf[HEADER_SIZE..]).unwrap();
    assert_eq!(r.read_varint().unwrap(), 4);
    assert_eq!(r.read_varint().unwrap(), 0);

    let mut dec = LosslessCodec::lossless();
    let out = dec.decompress(&buf).unwrap();
    assert_eq!((out.width, out.height), (2, 2));
    assert_eq!(out.depth, vec![0; 4]);
}

#[test]
fn test_delta_frame_encodes_temporal_residual() {
    let a = [0u16, 0, 5, 0];
    let b = [0u16, 0, 5, 1];

    let mut enc = LosslessCodec::lossless();
    let buf_a = enc.compress(2, 2, &a, true).unwrap();
    let buf_b = enc.compress(2, 2, &b, false).unwrap();

    assert!(!format::is_keyframe(&buf_b));
    let residuals = decode_residuals(&buf_b[HEADER_SIZE..], 4).unwrap();
    assert_eq!(residuals, vec![0, 0, 0, 1]);

    let mut dec = LosslessCodec::lossless();
    assert_eq!(dec.decompress(&buf_a).unwrap().depth, a);
    assert_eq!(dec.decompress(&buf_b).unwrap().depth, b);
}

#[test]
fn test_empty_buffer_is_corrupted() {
    let mut dec = LosslessCodec::lossless();
    assert_eq!(dec.decompress(&[]), Err(DepthError::Corrupted));
    assert!(!dec.has_reference());
}

// ── reference-frame state machine ──────────────────────────────────────────

#[test]
fn test_delta_compress_requires_reference() {
    let mut enc = LosslessCodec::lossless();
    let frame = depth_scene(W, H, 0, 1);
    assert_eq!(enc.compress(W, H, &frame, false), Err(DepthError::MissingReference));
    assert!(!enc.has_reference());

    // Still usable for a keyframe afterwards.
    enc.compress(W, H, &frame, true).unwrap();
    assert!(enc.has_reference());
}

#[test]
fn test_delta_decompress_requires_reference() {
    let mut enc = LosslessCodec::lossless();
    let key = enc.compress(W, H, &depth_scene(W, H, 0, 1), true).unwrap();
    let delta = enc.compress(W, H, &depth_scene(W, H, 1, 1), false).unwrap();

    let mut dec = LosslessCodec::lossless();
    assert_eq!(dec.decompress(&delta), Err(DepthError::MissingReference));
    assert!(!dec.has_reference());

    dec.decompress(&key).unwrap();
    dec.decompress(&delta).unwrap();
}

#[test]
fn test_resolution_change_needs_keyframe() {
    let mut enc = LosslessCodec::lossless();
    enc.compress(4, 4, &[100; 16], true).unwrap();
    assert_eq!(enc.compress(2, 8, &[100; 16], false), Err(DepthError::MissingReference));

    let key = enc.compress(2, 8, &[100; 16], true).unwrap();
    let delta = enc.compress(2, 8, &[101; 16], false).unwrap();

    let mut dec = LosslessCodec::lossless();
    dec.decompress(&key).unwrap();
    assert_eq!(dec.decompress(&delta).unwrap().depth, vec![101; 16]);
}

#[test]
fn test_skipped_frame_is_missing_reference() {
    let mut enc = LosslessCodec::lossless();
    let bufs: Vec<Vec<u8>> = (0..4)
        .map(|t| enc.compress(W, H, &depth_scene(W, H, t, 3), t == 0).unwrap())
        .collect();

    let mut dec = LosslessCodec::lossless();
    dec.decompress(&bufs[0]).unwrap();
    // Frame 1 lost in transit.
    assert_eq!(dec.decompress(&bufs[2]), Err(DepthError::MissingReference));
    // Reference still frame 0, so frame 1 arriving late still decodes.
    assert_eq!(dec.decompress(&bufs[1]).unwrap().depth, depth_scene(W, H, 1, 3));
    assert_eq!(dec.decompress(&bufs[2]).unwrap().depth, depth_scene(W, H, 2, 3));
}

#[test]
fn test_failed_decode_leaves_reference_untouched() {
    let mut enc = LosslessCodec::lossless();
    let bufs: Vec<Vec<u8>> = (0..3)
        .map(|t| enc.compress(W, H, &depth_scene(W, H, t, 5), t == 0).unwrap())
        .collect();

    let mut dec = LosslessCodec::lossless();
    dec.decompress(&bufs[0]).unwrap();
    dec.decompress(&bufs[1]).unwrap();

    let mut damaged = bufs[2].clone();
    let last = damaged.len() - 1;
    damaged[last] ^= 0x40;
    assert_eq!(dec.decompress(&damaged), Err(DepthError::Corrupted));

    assert_eq!(dec.decompress(&bufs[2]).unwrap().depth, depth_scene(W, H, 2, 5));
}

#[test]
fn test_reset_forces_keyframe() {
    let mut enc = LossyCodec::lossy();
    enc.compress(W, H, &depth_scene(W, H, 0, 9), true).unwrap();
    enc.reset();
    assert!(!enc.has_reference());
    assert_eq!(
        enc.compress(W, H, &depth_scene(W, H, 1, 9), false),
        Err(DepthError::MissingReference)
    );
}

#[test]
fn test_frame_numbers_follow_reference() {
    let mut enc = LosslessCodec::lossless();
    let numbers: Vec<u16> = (0..5)
        .map(|t| {
            let buf = enc.compress(2, 2, &[t as u16 + 1; 4], t % 2 == 0).unwrap();
            FrameHeader::peek(&buf).unwrap().frame_number
        })
        .collect();
    assert_eq!(numbers, vec![0, 1, 2, 3, 4]);
}

// ── validation and corruption ──────────────────────────────────────────────

#[test]
fn test_bad_dimensions() {
    let mut enc = LosslessCodec::lossless();
    assert_eq!(enc.compress(0, 4, &[], true), Err(DepthError::BadDimensions));
    assert_eq!(enc.compress(4, 0, &[], true), Err(DepthError::BadDimensions));
    assert_eq!(enc.compress(2, 2, &[1, 2, 3], true), Err(DepthError::BadDimensions));
    assert_eq!(enc.compress(2, 2, &[1, 2, 3, 4, 5], true), Err(DepthError::BadDimensions));
    assert!(!enc.has_reference());
}

#[test]
fn test_wrong_format() {
    let mut lossy = LossyCodec::lossy();
    let buf = lossy.compress(W, H, &depth_scene(W, H, 0, 2), true).unwrap();

    let mut lossless = LosslessCodec::lossless();
    assert_eq!(lossless.decompress(&buf), Err(DepthError::WrongFormat));

    let mut foreign = buf.clone();
    foreign[0] = 0x00;
    assert_eq!(lossy.decompress(&foreign), Err(DepthError::WrongFormat));
}

#[test]
fn test_every_truncation_is_corrupted() {
    let mut enc = LosslessCodec::lossless();
    let buf = enc.compress(W, H, &depth_scene(W, H, 0, 4), true).unwrap();

    let mut dec = LosslessCodec::lossless();
    for cut in 1..=buf.len() {
        assert_eq!(
            dec.decompress(&buf[..buf.len() - cut]),
            Err(DepthError::Corrupted),
            "truncating {cut} bytes"
        );
    }
    assert!(!dec.has_reference());
    assert_eq!(dec.decompress(&buf).unwrap().depth, depth_scene(W, H, 0, 4));
}

#[test]
fn test_lying_header_is_corrupted() {
    let mut enc = LosslessCodec::lossless();
    let buf = enc.compress(W, H, &depth_scene(W, H, 0, 8), true).unwrap();
    let mut dec = LosslessCodec::lossless();

    // Claim more pixels than the stream holds.
    let mut header = FrameHeader::peek(&buf).unwrap();
    header.height += 1;
    let mut forged = header.to_bytes().to_vec();
    forged.extend_from_slice(&buf[HEADER_SIZE..]);
    assert_eq!(dec.decompress(&forged), Err(DepthError::Corrupted));

    // Oversized resolution is refused before anything is allocated.
    let mut header = FrameHeader::peek(&buf).unwrap();
    header.width = u32::MAX;
    let mut forged = header.to_bytes().to_vec();
    forged.extend_from_slice(&buf[HEADER_SIZE..]);
    assert_eq!(dec.decompress(&forged), Err(DepthError::BadDimensions));
}

/// Re-frame `payload` under `header`, with a consistent length and checksum.
fn reframe(header: FrameHeader, payload: &[u8]) -> Vec<u8> {
    let header = FrameHeader {
        payload_len: payload.len() as u32,
        checksum: xxh3_64(payload),
        ..header
    };
    let mut buf = header.to_bytes().to_vec();
    buf.extend_from_slice(payload);
    buf
}

/// Stored keyframe carrying `residuals` as its VLE payload.
fn keyframe_from_residuals(tag: u8, width: u32, height: u32, residuals: &[i32]) -> Vec<u8> {
    let payload = encode_residuals(residuals);
    let header = FrameHeader {
        tag,
        keyframe: true,
        stage: STAGE_STORED,
        frame_number: 0,
        width,
        height,
        raw_len: payload.len() as u32,
        payload_len: 0,
        checksum: 0,
    };
    reframe(header, &payload)
}

#[test]
fn test_zero_dimension_in_header() {
    let mut enc = LosslessCodec::lossless();
    let buf = enc.compress(W, H, &depth_scene(W, H, 0, 3), true).unwrap();
    let mut dec = LosslessCodec::lossless();

    for (w, h) in [(0, H), (W, 0)] {
        let mut header = FrameHeader::peek(&buf).unwrap();
        header.width = w;
        header.height = h;
        let forged = reframe(header, &buf[HEADER_SIZE..]);
        assert_eq!(dec.decompress(&forged), Err(DepthError::BadDimensions));
    }
    assert!(!dec.has_reference());
}

#[test]
fn test_out_of_range_steps_are_corrupted() {
    let mut dec = LosslessCodec::lossless();

    // 60000 + 60000 overflows the 16-bit depth range.
    let buf = keyframe_from_residuals(TAG_LOSSLESS, 2, 1, &[60000, 60000]);
    assert_eq!(dec.decompress(&buf), Err(DepthError::Corrupted));

    // Negative depth.
    let buf = keyframe_from_residuals(TAG_LOSSLESS, 2, 1, &[5, -10]);
    assert_eq!(dec.decompress(&buf), Err(DepthError::Corrupted));
    assert!(!dec.has_reference());

    // In-range residuals still decode.
    let buf = keyframe_from_residuals(TAG_LOSSLESS, 2, 1, &[60000, -60000]);
    assert_eq!(dec.decompress(&buf).unwrap().depth, vec![60000, 0]);

    let mut lossy = LossyCodec::lossy();
    let buf = keyframe_from_residuals(TAG_LOSSY, 1, 1, &[4096]);
    assert_eq!(lossy.decompress(&buf), Err(DepthError::Corrupted));
    let buf = keyframe_from_residuals(TAG_LOSSY, 1, 1, &[4095]);
    assert!(lossy.decompress(&buf).is_ok());
}

#[test]
fn test_out_of_range_delta_keeps_reference() {
    let mut enc = LosslessCodec::lossless();
    let key = enc.compress(2, 1, &[65000, 10], true).unwrap();
    let mut dec = LosslessCodec::lossless();
    dec.decompress(&key).unwrap();

    let payload = encode_residuals(&[1000, 0]);
    let header = FrameHeader {
        keyframe: false,
        frame_number: 1,
        raw_len: payload.len() as u32,
        ..FrameHeader::peek(&key).unwrap()
    };
    assert_eq!(dec.decompress(&reframe(header, &payload)), Err(DepthError::Corrupted));

    let delta = enc.compress(2, 1, &[65001, 10], false).unwrap();
    assert_eq!(dec.decompress(&delta).unwrap().depth, vec![65001, 10]);
}

#[test]
fn test_stored_length_mismatch_is_corrupted() {
    let mut enc = LosslessCodec::lossless();
    let buf = enc.compress(W, H, &depth_scene(W, H, 0, 5), true).unwrap();
    let mut dec = LosslessCodec::lossless();

    let mut header = FrameHeader::peek(&buf).unwrap();
    header.raw_len += 4;
    assert_eq!(dec.decompress(&reframe(header, &buf[HEADER_SIZE..])), Err(DepthError::Corrupted));
    assert_eq!(dec.decompress(&buf).unwrap().depth, depth_scene(W, H, 0, 5));
}

#[test]
fn test_raw_len_above_bound_is_corrupted() {
    let frame = striped_frame();
    let mut enc = DepthCodec::with_compressor(Lossless, Box::new(ZstdCompressor::default()));
    let buf = enc.compress(W, H, &frame, true).unwrap();
    let mut dec = DepthCodec::with_compressor(Lossless, Box::new(ZstdCompressor::default()));

    let mut header = FrameHeader::peek(&buf).unwrap();
    assert_eq!(header.stage, STAGE_ZSTD);
    header.raw_len = (W * H) * 4 + 65;
    assert_eq!(dec.decompress(&reframe(header, &buf[HEADER_SIZE..])), Err(DepthError::Corrupted));

    let mut header = FrameHeader::peek(&buf).unwrap();
    header.raw_len = u32::MAX;
    assert_eq!(dec.decompress(&reframe(header, &buf[HEADER_SIZE..])), Err(DepthError::Corrupted));
    assert!(!dec.has_reference());
}

#[test]
fn test_second_stage_inversion_failures_are_corrupted() {
    let frame = striped_frame();
    let mut enc = DepthCodec::with_compressor(Lossless, Box::new(ZstdCompressor::default()));
    let buf = enc.compress(W, H, &frame, true).unwrap();
    let mut dec = DepthCodec::with_compressor(Lossless, Box::new(ZstdCompressor::default()));
    let header = FrameHeader::peek(&buf).unwrap();

    // Not a zstd frame at all.
    let garbage = reframe(header.clone(), &[0xFF; 37]);
    assert_eq!(dec.decompress(&garbage), Err(DepthError::Corrupted));

    // Valid zstd frame, wrong declared size in either direction.
    for raw_len in [header.raw_len - 4, header.raw_len + 4] {
        let forged = reframe(FrameHeader { raw_len, ..header.clone() }, &buf[HEADER_SIZE..]);
        assert_eq!(dec.decompress(&forged), Err(DepthError::Corrupted), "raw_len {raw_len}");
    }

    assert!(!dec.has_reference());
    assert_eq!(dec.decompress(&buf).unwrap().depth, frame);
}

/// Second stage that always fails to compress.
struct BrokenCompressor;

impl ByteCompressor for BrokenCompressor {
    fn id(&self) -> u8 {
        7
    }

    fn name(&self) -> &'static str {
        "broken"
    }

    fn compress(&self, _raw: &[u8]) -> anyhow::Result<Vec<u8>> {
        anyhow::bail!("out of scratch space")
    }

    fn decompress(&self, _compressed: &[u8], _raw_len: usize) -> anyhow::Result<Vec<u8>> {
        anyhow::bail!("out of scratch space")
    }
}

#[test]
fn test_failing_second_stage_falls_back_to_stored() {
    let frame = striped_frame();
    let mut enc = DepthCodec::with_compressor(Lossless, Box::new(BrokenCompressor));
    let buf = enc.compress(W, H, &frame, true).unwrap();
    let header = FrameHeader::peek(&buf).unwrap();
    assert_eq!(header.stage, STAGE_STORED);
    assert_eq!(header.raw_len, header.payload_len);

    let mut dec = LosslessCodec::lossless();
    assert_eq!(dec.decompress(&buf).unwrap().depth, frame);
}

// ── tiers ──────────────────────────────────────────────────────────────────

#[test]
fn test_lossless_sequence_is_exact() {
    for (original, decoded) in roundtrip_sequence(
        LosslessCodec::lossless(),
        LosslessCodec::lossless(),
        25,
    ) {
        assert_eq!(original, decoded);
    }
}

#[test]
fn test_lossy_sequence_is_bounded() {
    for (original, decoded) in roundtrip_sequence(LossyCodec::lossy(), LossyCodec::lossy(), 25) {
        for (&o, &d) in original.iter().zip(&decoded) {
            if o == 0 {
                assert_eq!(d, 0);
            }
            let err = (o as i32 - d as i32).unsigned_abs();
            assert!(err <= Lossy::step_width(o) as u32, "{o} decoded as {d}");
        }
    }
}

#[test]
fn test_lossy_is_smaller_than_lossless() {
    let frame = depth_scene(W, H, 0, 11);
    let lossless = LosslessCodec::lossless().compress(W, H, &frame, true).unwrap();
    let lossy = LossyCodec::lossy().compress(W, H, &frame, true).unwrap();
    assert!(lossy.len() < lossless.len());
    assert!(lossless.len() < frame.len() * 2);
}

// ── second stage ───────────────────────────────────────────────────────────

/// Rows alternating between two depths: one long nonzero run of ±1 residuals,
/// i.e. a highly repetitive nibble stream.
fn striped_frame() -> Vec<u16> {
    (0..W * H).map(|i| 1000 + (i % 2) as u16).collect()
}

#[test]
fn test_zstd_sequence_roundtrip() {
    let enc = DepthCodec::with_compressor(Lossless, Box::new(ZstdCompressor::default()));
    let dec = DepthCodec::with_compressor(Lossless, Box::new(ZstdCompressor::default()));
    for (original, decoded) in roundtrip_sequence(enc, dec, 12) {
        assert_eq!(original, decoded);
    }
}

#[test]
fn test_lz4_sequence_roundtrip() {
    let enc = DepthCodec::with_compressor(Lossy, Box::new(Lz4Compressor));
    let dec = DepthCodec::with_compressor(Lossy, Box::new(Lz4Compressor));
    for (original, decoded) in roundtrip_sequence(enc, dec, 12) {
        for (&o, &d) in original.iter().zip(&decoded) {
            assert!((o as i32 - d as i32).unsigned_abs() <= Lossy::step_width(o) as u32);
        }
    }
}

#[test]
fn test_second_stage_used_only_when_smaller() {
    let frame = striped_frame();
    let mut plain = LosslessCodec::lossless();
    let mut zstd = DepthCodec::with_compressor(Lossless, Box::new(ZstdCompressor::default()));

    let plain_buf = plain.compress(W, H, &frame, true).unwrap();
    let zstd_buf = zstd.compress(W, H, &frame, true).unwrap();
    let header = FrameHeader::peek(&zstd_buf).unwrap();
    assert_eq!(header.stage, STAGE_ZSTD);
    assert_eq!(header.raw_len as usize, plain_buf.len() - HEADER_SIZE);
    assert!(zstd_buf.len() < plain_buf.len());

    // A tiny payload never shrinks, so it is stored as is.
    let tiny = zstd.compress(2, 2, &[0; 4], true).unwrap();
    assert_eq!(FrameHeader::peek(&tiny).unwrap().stage, STAGE_STORED);
}

#[test]
fn test_compressed_payload_needs_matching_stage() {
    let frame = striped_frame();
    let mut enc = DepthCodec::with_compressor(Lossless, Box::new(ZstdCompressor::default()));
    let buf = enc.compress(W, H, &frame, true).unwrap();

    let mut no_stage = LosslessCodec::lossless();
    assert_eq!(no_stage.decompress(&buf), Err(DepthError::WrongFormat));

    let mut lz4 = DepthCodec::with_compressor(Lossless, Box::new(Lz4Compressor));
    assert_eq!(lz4.decompress(&buf), Err(DepthError::WrongFormat));

    let mut zstd = DepthCodec::with_compressor(Lossless, Box::new(ZstdCompressor::new(19)));
    assert_eq!(zstd.decompress(&buf).unwrap().depth, frame);
}

#[test]
fn test_set_compressor_keeps_reference() {
    let mut enc = DepthCodec::with_compressor(Lossless, Box::new(ZstdCompressor::default()));
    let key = enc.compress(W, H, &striped_frame(), true).unwrap();
    let delta = enc.compress(W, H, &striped_frame(), false).unwrap();

    let mut dec = DepthCodec::with_compressor(Lossless, Box::new(ZstdCompressor::default()));
    dec.decompress(&key).unwrap();
    dec.set_compressor(None);
    assert!(dec.has_reference());
    // Identical frame: all-zero residuals, tiny payload, stored stage.
    assert_eq!(FrameHeader::peek(&delta).unwrap().stage, STAGE_STORED);
    assert_eq!(dec.decompress(&delta).unwrap().depth, striped_frame());
}

#[test]
fn test_stored_payload_decodes_without_stage() {
    let mut enc = DepthCodec::with_compressor(Lossless, Box::new(Lz4Compressor));
    let buf = enc.compress(2, 2, &[7, 0, 0, 7], true).unwrap();
    assert_eq!(FrameHeader::peek(&buf).unwrap().stage, STAGE_STORED);

    let mut dec = LosslessCodec::lossless();
    assert_eq!(dec.decompress(&buf).unwrap().depth, vec![7, 0, 0, 7]);
}

// ── concurrency ────────────────────────────────────────────────────────────

#[test]
fn test_independent_streams_in_parallel() {
    std::thread::scope(|s| {
        for seed in 0..4u64 {
            s.spawn(move || {
                let mut enc = DepthCodec::with_compressor(Lossless, Box::new(ZstdCompressor::default()));
                let mut dec = DepthCodec::with_compressor(Lossless, Box::new(ZstdCompressor::default()));
                for t in 0..6 {
                    let frame = depth_scene(W, H, t, seed);
                    let buf = enc.compress(W, H, &frame, t == 0).unwrap();
                    assert_eq!(dec.decompress(&buf).unwrap().depth, frame);
                }
            });
        }
    });
}
