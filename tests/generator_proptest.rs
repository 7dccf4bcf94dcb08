use proptest::prelude::*;
use random_chunk::emitter::{emit, RecordingSink, TRAILER_PREFIX};
use random_chunk::generator::{generate, GeneratorConfig, Segment};
use random_chunk::http::chunked::{split_chunks, ChunkedEncoder};

proptest! {
    #[test]
    fn generation_is_deterministic(seed in any::<u32>(), count in 0_u64..512) {
        prop_assert_eq!(generate(seed, count), generate(seed, count));
    }

    #[test]
    fn shorter_run_is_a_prefix(seed in any::<u32>(), count in 0_u64..512, cut in 0_u64..512) {
        let cut = cut.min(count);
        let full = generate(seed, count);
        let prefix = generate(seed, cut);
        prop_assert_eq!(&full[..cut as usize], &prefix[..]);
    }

    #[test]
    fn segments_respect_their_shape(seed in any::<u32>(), count in 1_u64..512) {
        for (index, segment) in GeneratorConfig::new(seed, count).segments().enumerate() {
            match segment {
                Segment::SingleByte { value } => {
                    let expected = if index % 2 == 0 { b'1' } else { b'0' };
                    prop_assert_eq!(value, expected);
                }
                Segment::Empty => {}
                Segment::Filled { length, byte } => {
                    prop_assert!((1..32).contains(&length));
                    prop_assert_eq!(byte, b'2' + length);
                }
            }
        }
    }

    #[test]
    fn trailer_reports_body_length(seed in any::<u32>(), count in 0_u64..512) {
        let mut sink = RecordingSink::new();
        let result = emit(generate(seed, count), &mut sink).unwrap();

        let (trailer, body) = sink.chunks().split_last().unwrap();
        let body_len: usize = body.iter().map(|chunk| chunk.len()).sum();
        prop_assert_eq!(result.total_bytes_written, body_len as u64);
        let want = format!("{}{}", TRAILER_PREFIX, body_len);
        prop_assert_eq!(&trailer[..], want.as_bytes());
        prop_assert!(body.iter().all(|chunk| !chunk.is_empty()));
        prop_assert_eq!(result.segments, count);
    }

    #[test]
    fn framing_keeps_every_write(seed in any::<u32>(), count in 0_u64..256) {
        let mut recorded = RecordingSink::new();
        emit(generate(seed, count), &mut recorded).unwrap();

        let mut encoder = ChunkedEncoder::new(Vec::new());
        emit(generate(seed, count), &mut encoder).unwrap();
        encoder.finish().unwrap();

        let framed = split_chunks(encoder.get_ref()).unwrap();
        let expected: Vec<Vec<u8>> = recorded.chunks().iter().map(|chunk| chunk.to_vec()).collect();
        prop_assert_eq!(framed, expected);
    }
}
