//! The "bizzare" codec: a flag-word LZ77 variant over 16-bit words.
//!
//! # Stream layout
//! A compressed stream is a sequence of little-endian 16-bit words.  A flag
//! word precedes every group of up to 16 units; its bits, high bit first,
//! mark each following unit as a literal word (0) or a control word (1).
//!
//! ```text
//! control word:  LLLLL OOOOOOOOOOO
//!                ^^^^^ length (0 = next word holds the length)
//!                      ^^^^^^^^^^^ offset in words (0 = zero fill)
//! ```
//!
//! A control word with offset 0 writes `length` zero words; offset 0 with
//! length 0 ends the stream.  Any other offset copies `length` words one at a
//! time from `offset` words back in the output, so `offset < length` repeats
//! a periodic pattern.
//!
//! # Asymmetry
//! The compressor only ever emits literals and back-references.  Zero fill
//! exists in the decoder for streams produced by the game's own tools.

use byteorder::{ByteOrder, LittleEndian};
use thiserror::Error;
use tracing::{debug, trace};

/// Size of one codec unit in bytes.
pub const WORD: usize = 2;
/// Largest back-reference distance the 11-bit offset field can carry.
pub const MAX_WINDOW: usize = 0x7FF;
/// Largest match length the 5-bit length field can carry.
pub const MAX_MATCH: usize = 31;
/// Shortest match worth a control word.
pub const MIN_MATCH: usize = 2;
/// Block size compressed container payloads are padded to.
pub const BLOCK_ALIGN: usize = 2048;

const OFFSET_MASK: u16 = 0x7FF;
const LENGTH_SHIFT: u32 = 11;
const FLAG_TOP: u16 = 0x8000;
const GROUP: usize = 16;

// ── Error type ───────────────────────────────────────────────────────────────

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// A back-reference reached before the first output word.
    #[error("Back-reference of {offset} words at output word {position} points before the start of the output")]
    InvalidBackReference { offset: usize, position: usize },
}

// ── Options ──────────────────────────────────────────────────────────────────

/// Match-search parameters for [`compress_with`] and [`compress_aligned`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressOptions {
    /// Backward search window in words.
    pub window:    usize,
    /// Match length cap in words.
    pub max_match: usize,
}

impl CompressOptions {
    /// Build options, clamping both values to what the control word can encode.
    pub fn new(window: usize, max_match: usize) -> Self {
        Self {
            window:    window.clamp(1, MAX_WINDOW),
            max_match: max_match.clamp(MIN_MATCH, MAX_MATCH),
        }
    }
}

impl Default for CompressOptions {
    fn default() -> Self {
        Self { window: MAX_WINDOW, max_match: MAX_MATCH }
    }
}

// ── Decompression ────────────────────────────────────────────────────────────

/// Decompress a whole stream, pre-sizing the output to twice the input.
pub fn decompress(input: &[u8]) -> Result<Vec<u8>, CodecError> {
    decompress_with_capacity(input, input.len() * 2)
}

/// Decompress a stream with an output size hint in bytes.
///
/// The hint only sets the initial capacity; the output grows as needed and
/// keeps everything already written.  Decoding stops at the zero/zero
/// sentinel or when the input runs out, whichever comes first, so a
/// truncated stream yields truncated output rather than an error.  A trailing
/// odd byte is ignored.
pub fn decompress_with_capacity(input: &[u8], hint: usize) -> Result<Vec<u8>, CodecError> {
    let mut words = input.chunks_exact(WORD).map(LittleEndian::read_u16);
    let mut out: Vec<u16> = Vec::with_capacity(hint / WORD);
    let mut flags = 0u16;
    let mut mask  = 0u16;

    loop {
        if mask == 0 {
            let Some(word) = words.next() else { break };
            flags = word;
            mask  = FLAG_TOP;
        }

        if flags & mask == 0 {
            let Some(word) = words.next() else { break };
            out.push(word);
        } else {
            let Some(control) = words.next() else { break };
            let offset = (control & OFFSET_MASK) as usize;
            let mut length = (control >> LENGTH_SHIFT) as usize;
            if length == 0 {
                let Some(extended) = words.next() else { break };
                length = extended as usize;
            }

            if offset == 0 {
                if length == 0 {
                    trace!("end-of-stream sentinel at output word {}", out.len());
                    break;
                }
                out.resize(out.len() + length, 0);
            } else {
                if offset > out.len() {
                    return Err(CodecError::InvalidBackReference {
                        offset,
                        position: out.len(),
                    });
                }
                let start = out.len() - offset;
                for i in 0..length {
                    let word = out[start + i];
                    out.push(word);
                }
            }
        }

        mask >>= 1;
    }

    debug!("decompressed {} bytes -> {} bytes", input.len(), out.len() * WORD);
    Ok(words_to_bytes(&out))
}

// ── Compression ──────────────────────────────────────────────────────────────

/// Compress with the default window (2047 words) and match cap (31 words).
pub fn compress(input: &[u8]) -> Vec<u8> {
    compress_with(input, &CompressOptions::default())
}

/// Compress and terminate the stream with an explicit zero/zero sentinel.
pub fn compress_with(input: &[u8], opts: &CompressOptions) -> Vec<u8> {
    let mut stream = encode(input, opts);
    stream.extend_from_slice(&[0, 0]);
    words_to_bytes(&stream)
}

/// Compress and zero-pad the stream to a multiple of `block` bytes (at least
/// one block), the layout container files use on disk.
///
/// The padding supplies the terminating control word, so no sentinel is
/// written explicitly; a stream that ends exactly on a block boundary is
/// terminated by running out of input instead.
pub fn compress_aligned(input: &[u8], opts: &CompressOptions, block: usize) -> Vec<u8> {
    let mut bytes = words_to_bytes(&encode(input, opts));
    let target = crate::layout::align_up(bytes.len().max(1), block);
    bytes.resize(target, 0);
    debug!("compressed {} bytes -> {} bytes ({} aligned)", input.len(), bytes.len(), block);
    bytes
}

/// Greedy encode.  The returned stream has the flag bit after the last unit
/// set, so the next word the decoder sees is read as a control word.
fn encode(input: &[u8], opts: &CompressOptions) -> Vec<u16> {
    let words = bytes_to_words(input);
    let mut out: Vec<u16> = Vec::with_capacity(words.len() + words.len() / GROUP + 2);

    let mut flag_pos = 0usize;
    let mut mask     = FLAG_TOP;
    let mut pos      = 0usize;
    out.push(0);

    while pos < words.len() {
        if mask == 0 {
            flag_pos = out.len();
            out.push(0);
            mask = FLAG_TOP;
        }

        let (offset, length) = longest_match(&words, pos, opts);
        if length >= MIN_MATCH {
            out.push(((length as u16) << LENGTH_SHIFT) | offset as u16);
            out[flag_pos] |= mask;
            pos += length;
        } else {
            out.push(words[pos]);
            pos += 1;
        }

        mask >>= 1;
    }

    if mask == 0 {
        out.push(FLAG_TOP);
    } else {
        out[flag_pos] |= mask;
    }
    out
}

/// Brute-force backward search.  Returns `(offset, length)`; the nearest
/// candidate wins ties.
fn longest_match(words: &[u16], pos: usize, opts: &CompressOptions) -> (usize, usize) {
    let cap    = opts.max_match.min(words.len() - pos);
    let lowest = pos.saturating_sub(opts.window);
    let target = &words[pos..pos + cap];

    let mut best = (0usize, 0usize);
    for start in (lowest..pos).rev() {
        let length = words[start..]
            .iter()
            .zip(target)
            .take_while(|(a, b)| a == b)
            .count();
        if length > best.1 {
            best = (pos - start, length);
            if length == cap {
                break;
            }
        }
    }
    best
}

fn bytes_to_words(input: &[u8]) -> Vec<u16> {
    let mut words: Vec<u16> = input.chunks_exact(WORD).map(LittleEndian::read_u16).collect();
    if let [.., last] = input {
        if input.len() % WORD == 1 {
            trace!("odd input length {}, padding final word", input.len());
            words.push(u16::from(*last));
        }
    }
    words
}

fn words_to_bytes(words: &[u16]) -> Vec<u8> {
    let mut bytes = vec![0u8; words.len() * WORD];
    LittleEndian::write_u16_into(words, &mut bytes);
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn le(words: &[u16]) -> Vec<u8> {
        words_to_bytes(words)
    }

    /// Walk a stream and collect every control word's (offset, length).
    fn controls(stream: &[u8]) -> Vec<(usize, usize)> {
        let words: Vec<u16> = stream.chunks_exact(2).map(LittleEndian::read_u16).collect();
        let mut found = Vec::new();
        let (mut i, mut flags, mut mask) = (0usize, 0u16, 0u16);
        while i < words.len() {
            if mask == 0 {
                flags = words[i];
                mask = FLAG_TOP;
                i += 1;
                continue;
            }
            if i >= words.len() { break; }
            if flags & mask != 0 {
                let cw = words[i];
                let (off, len) = ((cw & OFFSET_MASK) as usize, (cw >> LENGTH_SHIFT) as usize);
                if off == 0 && len == 0 { break; }
                found.push((off, len));
            }
            i += 1;
            mask >>= 1;
        }
        found
    }

    #[test]
    fn literals_only() {
        let out = decompress(&le(&[0x0000, 0x1234, 0x5678])).unwrap();
        assert_eq!(out, le(&[0x1234, 0x5678]));
    }

    #[test]
    fn zero_fill_control_word() {
        let out = decompress(&le(&[0x8000, 2 << 11])).unwrap();
        assert_eq!(out, le(&[0x0000, 0x0000]));
    }

    #[test]
    fn zero_fill_extended_length() {
        // length field 0 -> next word is the length (40 > 31)
        let out = decompress(&le(&[0x8000, 0x0000, 40])).unwrap();
        assert_eq!(out, vec![0u8; 80]);
    }

    #[test]
    fn sentinel_stops_decoding() {
        let out = decompress(&le(&[0x4000, 0xAAAA, 0x0000, 0x0000, 0xBBBB])).unwrap();
        assert_eq!(out, le(&[0xAAAA]));
    }

    #[test]
    fn overlapping_back_reference_repeats_pattern() {
        // two literals, then offset 2 length 6
        let out = decompress(&le(&[0x2000, 0x0001, 0x0002, (6 << 11) | 2])).unwrap();
        assert_eq!(out, le(&[1, 2, 1, 2, 1, 2, 1, 2]));
    }

    #[test]
    fn back_reference_extended_length() {
        // two literals, then offset 2 with length 0 -> next word is the length
        let out = decompress(&le(&[0x2000, 0x0001, 0x0002, 0x0002, 40])).unwrap();
        assert_eq!(out, le(&[1, 2].repeat(21)));
    }

    #[test]
    fn back_reference_before_start_is_an_error() {
        let err = decompress(&le(&[0x4000, 0x0001, (2 << 11) | 5])).unwrap_err();
        assert_eq!(err, CodecError::InvalidBackReference { offset: 5, position: 1 });
    }

    #[test]
    fn truncated_stream_keeps_prefix() {
        // flag promises a control word that never arrives
        let out = decompress(&le(&[0x4000, 0x0101])).unwrap();
        assert_eq!(out, le(&[0x0101]));
        // odd trailing byte is ignored
        let mut odd = le(&[0x0000, 0x0202]);
        odd.push(0xFF);
        assert_eq!(decompress(&odd).unwrap(), le(&[0x0202]));
    }

    #[test]
    fn flag_word_reloads_after_sixteen_units() {
        let mut stream = vec![0x0000];
        stream.extend(1..=16u16);
        stream.push(0x0000);
        stream.push(17);
        let out = decompress(&le(&stream)).unwrap();
        assert_eq!(out, le(&(1..=17u16).collect::<Vec<_>>()));
    }

    #[test]
    fn small_capacity_hint_still_grows() {
        let data: Vec<u8> = b"MOMOMOMOMOMOMOMOMOMOMOMOMOMOMOMO".repeat(8);
        let packed = compress(&data);
        assert_eq!(decompress_with_capacity(&packed, 0).unwrap(), data);
    }

    #[test]
    fn compress_emits_back_references() {
        let data = vec![0x41u8; 256];
        let packed = compress(&data);
        assert!(packed.len() < data.len() / 4, "runs should collapse to control words");
        assert!(controls(&packed).iter().all(|&(off, _)| off != 0), "no zero-fill runs emitted");
        assert_eq!(decompress(&packed).unwrap(), data);
    }

    #[test]
    fn match_cap_is_respected() {
        let data: Vec<u8> = (0..64u8).cycle().take(2048).collect();
        for cap in [11usize, 31] {
            let opts = CompressOptions::new(MAX_WINDOW, cap);
            let packed = compress_with(&data, &opts);
            let ctl = controls(&packed);
            assert!(!ctl.is_empty());
            assert!(ctl.iter().all(|&(_, len)| (MIN_MATCH..=cap).contains(&len)));
            assert_eq!(decompress(&packed).unwrap(), data);
        }
    }

    #[test]
    fn options_clamp_to_field_widths() {
        let opts = CompressOptions::new(5000, 64);
        assert_eq!(opts, CompressOptions { window: MAX_WINDOW, max_match: MAX_MATCH });
        assert_eq!(CompressOptions::new(0, 0).max_match, MIN_MATCH);
    }

    #[test]
    fn aligned_output_is_block_padded_and_decodes() {
        let data = b"TIM2 texture header and some repeating repeating repeating data".to_vec();
        let mut even = data.clone();
        if even.len() % 2 == 1 { even.push(0); }
        let packed = compress_aligned(&data, &CompressOptions::default(), BLOCK_ALIGN);
        assert_eq!(packed.len() % BLOCK_ALIGN, 0);
        assert_eq!(decompress(&packed).unwrap(), even);
    }

    #[test]
    fn aligned_empty_input_decodes_to_nothing() {
        let packed = compress_aligned(&[], &CompressOptions::default(), BLOCK_ALIGN);
        assert_eq!(packed.len(), BLOCK_ALIGN);
        assert!(decompress(&packed).unwrap().is_empty());
    }

    #[test]
    fn full_final_group_still_terminates() {
        // exactly 16 literal units fill the first group
        let data: Vec<u8> = (0..16u16).flat_map(|w| (w * 0x1000 + 7).to_le_bytes()).collect();
        let packed = compress_aligned(&data, &CompressOptions::default(), BLOCK_ALIGN);
        assert_eq!(decompress(&packed).unwrap(), data);
    }

    proptest! {
        #[test]
        fn roundtrip_random_words(words in proptest::collection::vec(any::<u16>(), 0..300)) {
            let data = le(&words);
            prop_assert_eq!(decompress(&compress(&data)).unwrap(), data);
        }

        #[test]
        fn roundtrip_low_entropy(words in proptest::collection::vec(0u16..4, 0..600)) {
            let data = le(&words);
            let packed = compress_aligned(&data, &CompressOptions::default(), BLOCK_ALIGN);
            prop_assert_eq!(decompress(&packed).unwrap(), data);
        }
    }
}
