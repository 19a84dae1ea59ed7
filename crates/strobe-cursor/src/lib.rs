// Cursor-string codec: per-topic read positions round-trip through one
// opaque string. The format is bit-exact across library versions because
// cursor strings survive in untrusted storage between reconnects.
//
// Per cursor: escape(key) "," hex16(id). Cursors joined by "|", no trailing
// delimiter. hex16 is exactly 16 uppercase zero-padded hex digits.

pub type Result<T> = std::result::Result<T, Error>;

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    #[error("invalid id digit {0:?}")]
    InvalidIdDigit(char),
    #[error("id exceeds 64 bits")]
    IdOverflow,
    #[error("dangling escape at end of cursor")]
    DanglingEscape,
    #[error("cursor entry has no id")]
    MissingId,
}

/// One decoded read position: a topic key and the next message id the
/// subscriber expects from that topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cursor {
    pub key: String,
    pub id: u64,
}

const HEX_UPPER: &[u8; 16] = b"0123456789ABCDEF";

/// Serialize an ordered cursor list to its opaque string form.
///
/// Accepts any iterator of `(key, id)` pairs so callers can encode straight
/// from their own cursor representation.
///
/// ```
/// let encoded = strobe_cursor::encode([("t", 3u64)]);
/// assert_eq!(encoded, "t,0000000000000003");
/// assert_eq!(strobe_cursor::encode(std::iter::empty::<(&str, u64)>()), "");
/// ```
pub fn encode<'a, I>(cursors: I) -> String
where
    I: IntoIterator<Item = (&'a str, u64)>,
{
    let mut out = String::new();
    for (index, (key, id)) in cursors.into_iter().enumerate() {
        if index > 0 {
            out.push('|');
        }
        escape_into(key, &mut out);
        out.push(',');
        push_hex16(id, &mut out);
    }
    out
}

/// Parse an opaque cursor string back into `(key, id)` pairs.
///
/// Decoded cursors carry no topic linkage; the subscriber setup attaches
/// topic references afterwards. Lowercase hex ids are accepted. A trailing
/// id without a closing `|` is accepted.
pub fn decode(input: &str) -> Result<Vec<Cursor>> {
    let mut cursors = Vec::new();
    if input.is_empty() {
        return Ok(cursors);
    }
    let mut key = String::new();
    let mut id: u64 = 0;
    let mut escaped = false;
    let mut in_id = false;
    for ch in input.chars() {
        if escaped {
            key.push(ch);
            escaped = false;
            continue;
        }
        if in_id {
            if ch == '|' {
                cursors.push(Cursor {
                    key: std::mem::take(&mut key),
                    id,
                });
                id = 0;
                in_id = false;
            } else {
                let digit = ch.to_digit(16).ok_or(Error::InvalidIdDigit(ch))? as u64;
                id = id
                    .checked_mul(16)
                    .and_then(|value| value.checked_add(digit))
                    .ok_or(Error::IdOverflow)?;
            }
        } else {
            match ch {
                '\\' => escaped = true,
                ',' => in_id = true,
                '|' => return Err(Error::MissingId),
                _ => key.push(ch),
            }
        }
    }
    if escaped {
        return Err(Error::DanglingEscape);
    }
    if !in_id {
        return Err(Error::MissingId);
    }
    cursors.push(Cursor { key, id });
    Ok(cursors)
}

fn escape_into(key: &str, out: &mut String) {
    // Fast path: most keys carry none of the reserved characters.
    if !key.contains(['\\', '|', ',']) {
        out.push_str(key);
        return;
    }
    for ch in key.chars() {
        if matches!(ch, '\\' | '|' | ',') {
            out.push('\\');
        }
        out.push(ch);
    }
}

fn push_hex16(id: u64, out: &mut String) {
    for shift in (0..16).rev() {
        let nibble = ((id >> (shift * 4)) & 0xF) as usize;
        out.push(HEX_UPPER[nibble] as char);
    }
}
