//! Line codec for the NUT network protocol spoken by `upsd`.
//!
//! Every request is a single line and every reply line is a sequence of
//! whitespace separated words, where a word may be a double-quoted string
//! using `\"` and `\\` escapes. Failures come back as `ERR <CODE>`.
use std::time::Duration;
use thiserror::Error;

/// Error code `upsd` returns when its cached driver data is too old to trust.
pub const DATA_STALE: &str = "DATA-STALE";

#[derive(Debug, Error)]
pub enum NutError {
    #[error("daemon reported DATA-STALE")]
    DataStale,
    #[error("daemon returned ERR {0}")]
    Daemon(String),
    #[error("unexpected reply from daemon: {0}")]
    Protocol(String),
    #[error("connection closed by daemon")]
    Closed,
    #[error("daemon did not answer within {0:?}")]
    Timeout(Duration),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl NutError {
    pub fn is_stale(&self) -> bool {
        matches!(self, NutError::DataStale)
    }

    /// Whether the session can no longer be used after this error.
    ///
    /// `ERR` replies leave the line stream in sync, so only transport and
    /// framing failures invalidate the session.
    pub fn breaks_session(&self) -> bool {
        matches!(
            self,
            NutError::Closed | NutError::Io(_) | NutError::Protocol(_) | NutError::Timeout(_)
        )
    }
}

pub fn error_from_code(code: &str) -> NutError {
    if code == DATA_STALE {
        NutError::DataStale
    } else {
        NutError::Daemon(code.to_string())
    }
}

/// Split a reply line into words, unquoting quoted strings.
pub fn split_words(line: &str) -> Result<Vec<String>, NutError> {
    let mut words = Vec::new();
    let mut chars = line.chars().peekable();
    loop {
        while chars.next_if(|c| c.is_ascii_whitespace()).is_some() {}
        let Some(first) = chars.next() else {
            break;
        };
        let mut word = String::new();
        if first == '"' {
            loop {
                match chars.next() {
                    Some('"') => break,
                    Some('\\') => match chars.next() {
                        Some(escaped) => word.push(escaped),
                        None => return Err(NutError::Protocol(format!("dangling escape in {line:?}"))),
                    },
                    Some(c) => word.push(c),
                    None => return Err(NutError::Protocol(format!("unterminated quote in {line:?}"))),
                }
            }
        } else {
            word.push(first);
            while let Some(c) = chars.next_if(|c| !c.is_ascii_whitespace()) {
                word.push(c);
            }
        }
        words.push(word);
    }
    Ok(words)
}

/// Parse one reply line, turning `ERR <CODE>` into the matching error.
pub fn parse_reply(line: &str) -> Result<Vec<String>, NutError> {
    let words = split_words(line.trim_end_matches(['\r', '\n']))?;
    match words.first().map(String::as_str) {
        Some("ERR") => Err(error_from_code(words.get(1).map(String::as_str).unwrap_or("UNKNOWN"))),
        Some(_) => Ok(words),
        None => Err(NutError::Protocol("empty reply line".into())),
    }
}

/// Quote an argument for a request line when it needs it.
pub fn quote(arg: &str) -> String {
    if !arg.is_empty() && !arg.chars().any(|c| c.is_ascii_whitespace() || c == '"' || c == '\\') {
        return arg.to_string();
    }
    let mut out = String::with_capacity(arg.len() + 2);
    out.push('"');
    for c in arg.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}
