pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Reply too short for {what}: expected at least {expected} bytes, got {actual}")]
    Truncated {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Parse error: {0}")]
    Parse(String),
}

impl Error {
    pub(crate) fn ensure(what: &'static str, data: &[u8], expected: usize) -> Result<()> {
        if data.len() < expected {
            return Err(Error::Truncated {
                what,
                expected,
                actual: data.len(),
            });
        }
        Ok(())
    }
}
