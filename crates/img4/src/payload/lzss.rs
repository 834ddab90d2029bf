//! Apple `complzss` codec
//!
//! ## Structure
//!
//! ```text
//! ┌──────────────────────────────────────┐
//! │ Header (0x180 bytes, big-endian)     │
//! │  - signature: "comp"                 │
//! │  - type: "lzss"                      │
//! │  - adler32 of uncompressed data      │
//! │  - uncompressed length               │
//! │  - compressed length                 │
//! │  - reserved / padding                │
//! ├──────────────────────────────────────┤
//! │ LZSS stream (compressed length)      │
//! ├──────────────────────────────────────┤
//! │ Trailing data (optional)             │
//! └──────────────────────────────────────┘
//! ```
//!
//! The stream is classic Okumura LZSS: a 4096-byte ring buffer pre-filled
//! with spaces, flag bytes read least significant bit first, literal when the
//! bit is set, otherwise a 12-bit ring position plus a 4-bit length.

use crate::der::read_be;
use crate::{Error, Result};

/// Ring buffer size
const N: usize = 4096;

/// Longest match
const F: usize = 18;

/// Matches of this length or shorter are emitted as literals
const THRESHOLD: usize = 2;

/// Size of the `complzss` header
pub const HEADER_SIZE: usize = 0x180;

const SIGNATURE: &[u8; 4] = b"comp";
const LZSS_TYPE: &[u8; 4] = b"lzss";

const HASH_BITS: usize = 15;
const MAX_CHAIN: usize = 32;

/// Whether `data` starts with a `complzss` header.
pub fn is_complzss(data: &[u8]) -> bool {
    data.len() >= HEADER_SIZE && &data[0..4] == SIGNATURE && &data[4..8] == LZSS_TYPE
}

/// Adler-32 checksum as stored in the header.
pub fn adler32(data: &[u8]) -> u32 {
    const MOD: u32 = 65521;
    let (mut a, mut b) = (1u32, 0u32);
    // 5552 is the largest run that cannot overflow `b` before reduction
    for chunk in data.chunks(5552) {
        for &byte in chunk {
            a += byte as u32;
            b += a;
        }
        a %= MOD;
        b %= MOD;
    }
    (b << 16) | a
}

/// Largest output a single input byte can expand to: a flag byte plus eight
/// two-byte references yields `8 * F` bytes from 17 input bytes.
const MAX_EXPANSION: usize = 9;

/// Decode a raw LZSS stream, stopping after `limit` output bytes.
pub fn decompress(src: &[u8], limit: usize) -> Vec<u8> {
    let mut ring = [0u8; N];
    ring[..N - F].fill(b' ');
    let mut r = N - F;
    let mut flags: u32 = 0;
    // `limit` usually comes from an untrusted header
    let mut out = Vec::with_capacity(limit.min(src.len().saturating_mul(MAX_EXPANSION)));
    let mut input = src.iter().copied();

    while out.len() < limit {
        flags >>= 1;
        if flags & 0x100 == 0 {
            let Some(c) = input.next() else { break };
            flags = c as u32 | 0xff00;
        }

        if flags & 1 != 0 {
            let Some(c) = input.next() else { break };
            out.push(c);
            ring[r] = c;
            r = (r + 1) & (N - 1);
        } else {
            let (Some(lo), Some(hi)) = (input.next(), input.next()) else {
                break;
            };
            let position = lo as usize | ((hi as usize & 0xf0) << 4);
            let length = (hi as usize & 0x0f) + THRESHOLD + 1;
            for k in 0..length {
                let c = ring[(position + k) & (N - 1)];
                out.push(c);
                ring[r] = c;
                r = (r + 1) & (N - 1);
            }
        }
    }

    out.truncate(limit);
    out
}

fn insert(src: &[u8], p: usize, head: &mut [usize], prev: &mut [usize]) {
    if p + 2 < src.len() {
        let h = hash(src, p);
        prev[p % N] = head[h];
        head[h] = p;
    }
}

fn hash(data: &[u8], pos: usize) -> usize {
    let h = ((data[pos] as usize) << 10) ^ ((data[pos + 1] as usize) << 5) ^ data[pos + 2] as usize;
    h & ((1 << HASH_BITS) - 1)
}

/// Encode `src` as a raw LZSS stream.
///
/// Greedy matching over a hash chain; references only ever point at data
/// already emitted, never at the initial spaces of the ring.
pub fn compress(src: &[u8]) -> Vec<u8> {
    const NONE: usize = usize::MAX;
    let window = N - F;

    let mut out = Vec::with_capacity(src.len() / 2 + 16);
    let mut head = vec![NONE; 1 << HASH_BITS];
    let mut prev = vec![NONE; N];
    let mut pos = 0;

    while pos < src.len() {
        let flag_index = out.len();
        out.push(0u8);
        let mut flags = 0u8;

        for bit in 0..8 {
            if pos >= src.len() {
                break;
            }

            let max_len = F.min(src.len() - pos);
            let (mut best_len, mut best_pos) = (0, 0);
            if max_len > THRESHOLD {
                let mut candidate = head[hash(src, pos)];
                let mut depth = 0;
                while candidate != NONE && pos - candidate < window && depth < MAX_CHAIN {
                    let len = (0..max_len)
                        .take_while(|&k| src[candidate + k] == src[pos + k])
                        .count();
                    if len > best_len {
                        best_len = len;
                        best_pos = candidate;
                        if len == max_len {
                            break;
                        }
                    }
                    candidate = prev[candidate % N];
                    depth += 1;
                }
            }

            if best_len > THRESHOLD {
                let ring = (best_pos + N - F) & (N - 1);
                out.push((ring & 0xff) as u8);
                out.push((((ring >> 4) & 0xf0) | (best_len - THRESHOLD - 1)) as u8);
                for p in pos..pos + best_len {
                    insert(src, p, &mut head, &mut prev);
                }
                pos += best_len;
            } else {
                flags |= 1 << bit;
                out.push(src[pos]);
                insert(src, pos, &mut head, &mut prev);
                pos += 1;
            }
        }

        out[flag_index] = flags;
    }

    out
}

/// Build a `complzss` container around `data`, followed by `trailing`.
pub fn pack(data: &[u8], trailing: &[u8]) -> Result<Vec<u8>> {
    let stream = compress(data);
    let uncompressed = u32::try_from(data.len())
        .map_err(|_| Error::Value("payload too large for complzss".into()))?;
    let compressed = u32::try_from(stream.len())
        .map_err(|_| Error::Value("payload too large for complzss".into()))?;

    let mut out = Vec::with_capacity(HEADER_SIZE + stream.len() + trailing.len());
    out.extend_from_slice(SIGNATURE);
    out.extend_from_slice(LZSS_TYPE);
    out.extend(adler32(data).to_be_bytes());
    out.extend(uncompressed.to_be_bytes());
    out.extend(compressed.to_be_bytes());
    out.resize(HEADER_SIZE, 0);
    out.extend(stream);
    out.extend_from_slice(trailing);
    Ok(out)
}

/// Decode a `complzss` container, returning the data and any trailing bytes.
pub fn unpack(data: &[u8]) -> Result<(Vec<u8>, &[u8])> {
    if !is_complzss(data) {
        return Err(Error::Decompression("missing complzss header".into()));
    }

    let checksum = read_be(&data[8..12]) as u32;
    let uncompressed = read_be(&data[12..16]) as usize;
    let compressed = read_be(&data[16..20]) as usize;

    let end = HEADER_SIZE
        .checked_add(compressed)
        .filter(|&end| end <= data.len())
        .ok_or_else(|| {
            Error::Decompression(format!(
                "compressed length {compressed} exceeds {} available bytes",
                data.len() - HEADER_SIZE
            ))
        })?;

    let out = decompress(&data[HEADER_SIZE..end], uncompressed);
    if out.len() != uncompressed {
        return Err(Error::Decompression(format!(
            "stream ended after {} of {uncompressed} bytes",
            out.len()
        )));
    }

    let actual = adler32(&out);
    if actual != checksum {
        tracing::warn!(
            expected = checksum,
            actual,
            "complzss checksum mismatch"
        );
    }

    Ok((out, &data[end..]))
}
