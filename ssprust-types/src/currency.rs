//! ISO-style three letter currency codes

use std::fmt;

/// Three character currency code as sent on the wire (e.g. `TRY`, `EUR`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct Currency(pub [u8; 3]);

impl Currency {
    /// Build from the first three bytes of `bytes`
    ///
    /// Returns `None` when fewer than three bytes are available.
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let code: [u8; 3] = bytes.get(..3)?.try_into().ok()?;
        Some(Self(code))
    }

    pub fn as_bytes(&self) -> &[u8; 3] {
        &self.0
    }

    /// True when no code has been assigned (all zero bytes)
    pub fn is_empty(&self) -> bool {
        self.0 == [0; 3]
    }
}

impl From<[u8; 3]> for Currency {
    fn from(code: [u8; 3]) -> Self {
        Self(code)
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("---");
        }
        for &b in &self.0 {
            let c = if b.is_ascii_graphic() { b as char } else { '?' };
            write!(f, "{}", c)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_currency_display() {
        assert_eq!(Currency(*b"EUR").to_string(), "EUR");
        assert_eq!(Currency::default().to_string(), "---");
    }

    #[test]
    fn test_currency_from_slice() {
        assert_eq!(Currency::from_slice(b"TRYX"), Some(Currency(*b"TRY")));
        assert_eq!(Currency::from_slice(b"TR"), None);
    }
}
