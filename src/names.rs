use crate::error::{Error, ErrorKind};

use std::collections::HashSet;

const FIRST: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";
const REST: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

// Generated names are short counters, anything longer means the generator
// is being driven by something other than a template.
const MAX_LENGTH: usize = 8;

/// Hands out short unique Javascript variable names in order, skipping a
/// reserved set of keywords and the runtime escape function name.
#[derive(Debug)]
pub(crate) struct NameGenerator {
    current: String,
    reserved: HashSet<String>,
}

impl NameGenerator {
    /// Create a new [`NameGenerator`] that will never produce the given
    /// escape function name.
    pub fn new(escaper: &str) -> Self {
        let mut reserved: HashSet<String> = ["if", "else", "while", "for", "var", "function"]
            .iter()
            .map(|k| k.to_string())
            .collect();
        reserved.insert(escaper.to_string());

        NameGenerator {
            current: "a".to_string(),
            reserved,
        }
    }

    /// Return the next unused variable name.
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] when the generator runs out of names.
    pub fn next_name(&mut self) -> Result<String, Error> {
        let mut name = self.current.clone();
        while self.reserved.contains(&name) {
            name = increment(&name)?;
        }
        self.current = increment(&name)?;

        Ok(name)
    }
}

/// Return the name that follows the given one.
///
/// The first character counts through letters, later characters through
/// letters and digits. A full carry extends the name by one character.
fn increment(name: &str) -> Result<String, Error> {
    let mut bytes = name.as_bytes().to_vec();
    let mut position = bytes.len();
    while position > 0 {
        position -= 1;
        let alphabet = if position == 0 { FIRST } else { REST };
        let index = alphabet
            .iter()
            .position(|b| *b == bytes[position])
            .expect("generated names only contain alphabet characters");
        if index + 1 < alphabet.len() {
            bytes[position] = alphabet[index + 1];
            return Ok(String::from_utf8(bytes).expect("alphabet is ascii"));
        }
        bytes[position] = b'a';
    }

    if name.len() >= MAX_LENGTH {
        return Err(Error::build("out of variable names")
            .with_kind(ErrorKind::NameSpaceExhausted)
            .with_help("translation generated more unique variables than fit the name space"));
    }
    Ok("a".repeat(name.len() + 1))
}

#[cfg(test)]
mod tests {
    use super::{increment, NameGenerator};
    use std::collections::HashSet;

    #[test]
    fn test_order() {
        let mut generator = NameGenerator::new("html_escape");
        assert_eq!(generator.next_name().unwrap(), "a");
        assert_eq!(generator.next_name().unwrap(), "b");
        assert_eq!(generator.next_name().unwrap(), "c");
    }

    #[test]
    fn test_carry() {
        assert_eq!(increment("z").unwrap(), "A");
        assert_eq!(increment("Z").unwrap(), "aa");
        assert_eq!(increment("az").unwrap(), "aA");
        assert_eq!(increment("aZ").unwrap(), "a0");
        assert_eq!(increment("a9").unwrap(), "ba");
        assert_eq!(increment("Z9").unwrap(), "aaa");
    }

    #[test]
    fn test_skips_reserved() {
        let mut generator = NameGenerator::new("e");
        let mut seen = HashSet::new();
        for _ in 0..100 {
            let name = generator.next_name().unwrap();
            assert_ne!(name, "e");
            assert_ne!(name, "if");
            assert!(seen.insert(name));
        }
    }

    #[test]
    fn test_exhaustion() {
        // The space only runs out once every position holds the last
        // symbol of its alphabet.
        assert_eq!(increment("ZZZZZZZ9").unwrap(), "ZZZZZZ0a");
        assert!(increment("Z9999999").is_err());
    }
}
