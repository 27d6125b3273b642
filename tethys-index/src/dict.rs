//! Shared adaptive compression dictionary.
//!
//! One `LzwDict` is scoped to one index: every dictionary-mode encode
//! extends it with newly observed symbol patterns, and every decode
//! resolves codes against it. Codes are stable once assigned and the
//! dictionary only grows, so a blob written early in an indexing run
//! decodes correctly against any later snapshot of the same dictionary.
//! Blobs therefore never rely on the decoder inferring entries; all
//! back-references resolve by plain lookup.
//!
//! Concurrent encoders share the dictionary as
//! `Arc<parking_lot::Mutex<LzwDict>>`, locking only for the duration of
//! a single encode or decode call.

use std::collections::HashMap;

use tethys_core::{hash::Fnv1a, Result, TethysError};

/// Snapshot format version; bumped on any layout change.
const DICT_VERSION: u8 = 1;

/// Symbol alphabet shared with the feature codec: one code per byte.
pub const DEFAULT_ALPHABET: usize = 256;

/// Hard cap on total codes, keeping codewords within 16 bits.
const MAX_CODES: usize = 1 << 16;

/// Adaptive LZW dictionary over byte symbols.
///
/// Codes `0..alphabet_size` are the fixed single-symbol alphabet;
/// higher codes are learned patterns `(prefix code, next symbol)`.
#[derive(Debug, Clone)]
pub struct LzwDict {
    alphabet_size: usize,
    /// (prefix code, symbol) -> code, for the longest-match walk.
    forward: HashMap<(u32, u8), u32>,
    /// Learned entries in code order: entries[i] = (prefix, symbol) for
    /// code `alphabet_size + i`.
    entries: Vec<(u32, u8)>,
}

impl LzwDict {
    pub fn new(alphabet_size: usize) -> Self {
        LzwDict {
            alphabet_size,
            forward: HashMap::new(),
            entries: Vec::new(),
        }
    }

    pub fn alphabet_size(&self) -> usize {
        self.alphabet_size
    }

    /// Total codes currently assigned (alphabet + learned patterns).
    pub fn code_count(&self) -> usize {
        self.alphabet_size + self.entries.len()
    }

    /// Drop every learned pattern; blobs written against the previous
    /// state no longer decode.
    pub fn reset(&mut self) {
        self.forward.clear();
        self.entries.clear();
    }

    fn lookup(&self, prefix: u32, symbol: u8) -> Option<u32> {
        self.forward.get(&(prefix, symbol)).copied()
    }

    fn add(&mut self, prefix: u32, symbol: u8) {
        if self.code_count() >= MAX_CODES {
            return;
        }
        let code = self.code_count() as u32;
        self.forward.insert((prefix, symbol), code);
        self.entries.push((prefix, symbol));
    }

    /// Expand one code to its byte sequence.
    fn expand(&self, code: u32, out: &mut Vec<u8>) -> Result<()> {
        let start = out.len();
        let mut code = code;
        loop {
            if (code as usize) < self.alphabet_size {
                out.push(code as u8);
                break;
            }
            let idx = code as usize - self.alphabet_size;
            let (prefix, symbol) = *self
                .entries
                .get(idx)
                .ok_or_else(|| TethysError::Codec(format!("unknown dictionary code {code}")))?;
            out.push(symbol);
            code = prefix;
        }
        out[start..].reverse();
        Ok(())
    }

    /// Compress a symbol stream, learning new patterns as a side effect.
    pub fn compress(&mut self, input: &[u8]) -> Result<Vec<u32>> {
        let mut codes = Vec::new();
        let mut iter = input.iter().copied();
        let Some(first) = iter.next() else {
            return Ok(codes);
        };
        if first as usize >= self.alphabet_size {
            return Err(TethysError::Codec(format!(
                "symbol {first} outside alphabet of {}",
                self.alphabet_size
            )));
        }
        let mut current: u32 = first as u32;
        for symbol in iter {
            if symbol as usize >= self.alphabet_size {
                return Err(TethysError::Codec(format!(
                    "symbol {symbol} outside alphabet of {}",
                    self.alphabet_size
                )));
            }
            match self.lookup(current, symbol) {
                Some(code) => current = code,
                None => {
                    codes.push(current);
                    self.add(current, symbol);
                    current = symbol as u32;
                }
            }
        }
        codes.push(current);
        Ok(codes)
    }

    /// Expand a code stream produced by [`compress`](Self::compress)
    /// against this dictionary or any later snapshot of it.
    pub fn decompress(&self, codes: &[u32]) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        for &code in codes {
            self.expand(code, &mut out)?;
        }
        Ok(out)
    }

    /// FNV over the learned entries; detects snapshot corruption.
    fn checksum(&self) -> u64 {
        let mut h = Fnv1a::new();
        h.update(self.alphabet_size as u64);
        for &(prefix, symbol) in &self.entries {
            h.update(((prefix as u64) << 8) | symbol as u64);
        }
        h.finish()
    }

    /// Serialize for persistence alongside the index.
    pub fn snapshot(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(16 + self.entries.len() * 5);
        out.push(DICT_VERSION);
        out.extend_from_slice(&(self.alphabet_size as u16).to_le_bytes());
        out.extend_from_slice(&(self.entries.len() as u32).to_le_bytes());
        for &(prefix, symbol) in &self.entries {
            out.extend_from_slice(&prefix.to_le_bytes());
            out.push(symbol);
        }
        out.extend_from_slice(&self.checksum().to_le_bytes());
        out
    }

    /// Rebuild from a snapshot; a version or checksum mismatch fails
    /// with [`TethysError::Dictionary`].
    pub fn restore(data: &[u8]) -> Result<Self> {
        let mut pos = 0usize;
        let take = |pos: &mut usize, n: usize| -> Result<&[u8]> {
            let slice = data
                .get(*pos..*pos + n)
                .ok_or_else(|| TethysError::Dictionary("truncated dictionary snapshot".into()))?;
            *pos += n;
            Ok(slice)
        };

        let version = take(&mut pos, 1)?[0];
        if version != DICT_VERSION {
            return Err(TethysError::Dictionary(format!(
                "dictionary version {version} does not match expected {DICT_VERSION}"
            )));
        }
        let alphabet_size = u16::from_le_bytes(
            take(&mut pos, 2)?.try_into().map_err(|_| internal_len())?,
        ) as usize;
        let count = u32::from_le_bytes(
            take(&mut pos, 4)?.try_into().map_err(|_| internal_len())?,
        ) as usize;

        let mut dict = LzwDict::new(alphabet_size);
        for _ in 0..count {
            let prefix =
                u32::from_le_bytes(take(&mut pos, 4)?.try_into().map_err(|_| internal_len())?);
            let symbol = take(&mut pos, 1)?[0];
            if (prefix as usize) >= dict.code_count() {
                return Err(TethysError::Dictionary(format!(
                    "dictionary entry references unassigned code {prefix}"
                )));
            }
            dict.add(prefix, symbol);
        }

        let stored =
            u64::from_le_bytes(take(&mut pos, 8)?.try_into().map_err(|_| internal_len())?);
        if stored != dict.checksum() {
            return Err(TethysError::Dictionary("dictionary checksum mismatch".into()));
        }
        Ok(dict)
    }
}

fn internal_len() -> TethysError {
    TethysError::Internal("slice length mismatch".into())
}

/// Pack 16-bit codes into a byte stream: `u16` code count, then codes.
pub fn pack_codes(codes: &[u32]) -> Result<Vec<u8>> {
    if codes.len() > u16::MAX as usize {
        return Err(TethysError::Codec("symbol stream too long".into()));
    }
    let mut out = Vec::with_capacity(2 + codes.len() * 2);
    out.extend_from_slice(&(codes.len() as u16).to_le_bytes());
    for &code in codes {
        if code >= MAX_CODES as u32 {
            return Err(TethysError::Codec(format!("code {code} exceeds codeword width")));
        }
        out.extend_from_slice(&(code as u16).to_le_bytes());
    }
    Ok(out)
}

/// Inverse of [`pack_codes`]; returns the codes and the bytes consumed.
pub fn unpack_codes(data: &[u8]) -> Result<(Vec<u32>, usize)> {
    let count = data
        .get(..2)
        .ok_or_else(|| TethysError::Codec("truncated code stream".into()))?;
    let count = u16::from_le_bytes([count[0], count[1]]) as usize;
    let mut codes = Vec::with_capacity(count);
    let mut pos = 2;
    for _ in 0..count {
        let pair = data
            .get(pos..pos + 2)
            .ok_or_else(|| TethysError::Codec("truncated code stream".into()))?;
        codes.push(u16::from_le_bytes([pair[0], pair[1]]) as u32);
        pos += 2;
    }
    Ok((codes, pos))
}
