//! Opaque pagination cursors
//!
//! Wire format: base64url (no padding) over a compact binary blob.
//!
//! ```text
//! [version u8][kind u8][payload...]
//!
//! record  (kind 'R'): [flags u8][id str][expiry i64][owner str][score i64][subscore i64][rank i64]?
//! catalog (kind 'C'): [last_seen_id str]
//!
//! str = u16 big-endian length + UTF-8 bytes, integers big-endian
//! flags: bit0 = is_next, bit1 = rank present
//! ```
//!
//! Decoding is strict: unknown versions, kinds or flag bits, truncated
//! payloads and trailing bytes are all rejected.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use thiserror::Error;

use crate::error::RankingError;
use crate::types::RankKey;

pub const CURSOR_VERSION: u8 = 1;

const KIND_RECORD: u8 = b'R';
const KIND_CATALOG: u8 = b'C';

const FLAG_IS_NEXT: u8 = 0b01;
const FLAG_HAS_RANK: u8 = 0b10;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CursorError {
    #[error("cursor is not valid base64url")]
    Encoding,
    #[error("cursor is truncated")]
    Truncated,
    #[error("unsupported cursor version {0}")]
    Version(u8),
    #[error("unexpected cursor kind {0:#04x}")]
    Kind(u8),
    #[error("unknown cursor flags {0:#04x}")]
    Flags(u8),
    #[error("cursor string field is not UTF-8")]
    Utf8,
    #[error("cursor string field is too long")]
    FieldTooLong,
    #[error("cursor has trailing bytes")]
    TrailingBytes,
}

impl From<CursorError> for RankingError {
    fn from(_: CursorError) -> Self {
        RankingError::invalid("cursor is not valid")
    }
}

/// Resume point for record listings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordCursor {
    /// `true` = page after the anchor, `false` = page before it.
    pub is_next: bool,
    pub leaderboard_id: String,
    pub expiry: i64,
    pub owner_id: String,
    pub score: i64,
    pub subscore: i64,
    pub rank: Option<i64>,
}

impl RecordCursor {
    pub fn anchor(&self) -> RankKey {
        RankKey::new(self.score, self.subscore, self.owner_id.clone())
    }

    pub fn encode(&self) -> String {
        let mut w = Writer::new(KIND_RECORD);
        let mut flags = 0;
        if self.is_next {
            flags |= FLAG_IS_NEXT;
        }
        if self.rank.is_some() {
            flags |= FLAG_HAS_RANK;
        }
        w.put_u8(flags);
        w.put_str(&self.leaderboard_id);
        w.put_i64(self.expiry);
        w.put_str(&self.owner_id);
        w.put_i64(self.score);
        w.put_i64(self.subscore);
        if let Some(rank) = self.rank {
            w.put_i64(rank);
        }
        w.finish()
    }

    pub fn decode(token: &str) -> Result<Self, CursorError> {
        let bytes = URL_SAFE_NO_PAD
            .decode(token.as_bytes())
            .map_err(|_| CursorError::Encoding)?;
        let mut r = Reader::open(&bytes, KIND_RECORD)?;
        let flags = r.get_u8()?;
        if flags & !(FLAG_IS_NEXT | FLAG_HAS_RANK) != 0 {
            return Err(CursorError::Flags(flags));
        }
        let cursor = RecordCursor {
            is_next: flags & FLAG_IS_NEXT != 0,
            leaderboard_id: r.get_str()?,
            expiry: r.get_i64()?,
            owner_id: r.get_str()?,
            score: r.get_i64()?,
            subscore: r.get_i64()?,
            rank: if flags & FLAG_HAS_RANK != 0 {
                Some(r.get_i64()?)
            } else {
                None
            },
        };
        r.finish()?;
        Ok(cursor)
    }
}

/// Resume point for config catalog listings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogCursor {
    pub last_seen_id: String,
}

impl CatalogCursor {
    pub fn encode(&self) -> String {
        let mut w = Writer::new(KIND_CATALOG);
        w.put_str(&self.last_seen_id);
        w.finish()
    }

    pub fn decode(token: &str) -> Result<Self, CursorError> {
        let bytes = URL_SAFE_NO_PAD
            .decode(token.as_bytes())
            .map_err(|_| CursorError::Encoding)?;
        let mut r = Reader::open(&bytes, KIND_CATALOG)?;
        let last_seen_id = r.get_str()?;
        r.finish()?;
        Ok(CatalogCursor { last_seen_id })
    }
}

/// Treat blank tokens as "no cursor".
pub fn non_empty(token: Option<&str>) -> Option<&str> {
    token.map(str::trim).filter(|t| !t.is_empty())
}

// ============================================================================
// Byte-level codec
// ============================================================================

struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    fn new(kind: u8) -> Self {
        let mut buf = Vec::with_capacity(64);
        buf.push(CURSOR_VERSION);
        buf.push(kind);
        Self { buf }
    }

    fn put_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    fn put_i64(&mut self, v: i64) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    fn put_str(&mut self, s: &str) {
        // Ids are capped well below u16::MAX upstream; clamp at a char boundary regardless.
        let mut end = s.len().min(u16::MAX as usize);
        while !s.is_char_boundary(end) {
            end -= 1;
        }
        self.buf.extend_from_slice(&(end as u16).to_be_bytes());
        self.buf.extend_from_slice(&s.as_bytes()[..end]);
    }

    fn finish(self) -> String {
        URL_SAFE_NO_PAD.encode(self.buf)
    }
}

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn open(buf: &'a [u8], kind: u8) -> Result<Self, CursorError> {
        let mut r = Reader { buf, pos: 0 };
        let version = r.get_u8()?;
        if version != CURSOR_VERSION {
            return Err(CursorError::Version(version));
        }
        let found = r.get_u8()?;
        if found != kind {
            return Err(CursorError::Kind(found));
        }
        Ok(r)
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], CursorError> {
        let end = self.pos.checked_add(n).ok_or(CursorError::FieldTooLong)?;
        let slice = self.buf.get(self.pos..end).ok_or(CursorError::Truncated)?;
        self.pos = end;
        Ok(slice)
    }

    fn get_u8(&mut self) -> Result<u8, CursorError> {
        Ok(self.take(1)?[0])
    }

    fn get_i64(&mut self) -> Result<i64, CursorError> {
        let mut raw = [0u8; 8];
        raw.copy_from_slice(self.take(8)?);
        Ok(i64::from_be_bytes(raw))
    }

    fn get_str(&mut self) -> Result<String, CursorError> {
        let mut len = [0u8; 2];
        len.copy_from_slice(self.take(2)?);
        let bytes = self.take(u16::from_be_bytes(len) as usize)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| CursorError::Utf8)
    }

    fn finish(self) -> Result<(), CursorError> {
        if self.pos == self.buf.len() {
            Ok(())
        } else {
            Err(CursorError::TrailingBytes)
        }
    }
}
