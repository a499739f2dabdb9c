use crate::value::{html_escape, Concrete};

use std::fmt::{Arguments, Result, Write};

use serde_json::Value;

/// Wraps some underlying buffer by providing methods that write template
/// output to it.
pub(crate) struct Pipe<'buffer> {
    buffer: &'buffer mut (dyn Write + 'buffer),
}

impl<'buffer> Pipe<'buffer> {
    /// Create a new Pipe that writes to the given buffer.
    pub fn new(buffer: &'buffer mut String) -> Self {
        Self { buffer }
    }

    /// Write the given [`Concrete`] to the Pipe buffer.
    ///
    /// Text is escaped on the way out unless it is already marked safe.
    /// Other value types are written as their text form and escaped.
    pub fn write_concrete(&mut self, value: &Concrete) -> Result {
        match value {
            Concrete::Safe(text) => self.write_str(text),
            Concrete::Value(Value::String(text)) => self.write_escaped(text),
            Concrete::Value(other) => self.write_escaped(&other.to_string()),
            Concrete::DateTime(datetime) => self.write_escaped(&datetime.to_string()),
        }
    }

    fn write_escaped(&mut self, text: &str) -> Result {
        self.write_str(&html_escape(text))
    }
}

impl Write for Pipe<'_> {
    #[inline]
    fn write_str(&mut self, s: &str) -> Result {
        Write::write_str(self.buffer, s)
    }

    #[inline]
    fn write_char(&mut self, c: char) -> Result {
        Write::write_char(self.buffer, c)
    }

    #[inline]
    fn write_fmt(&mut self, args: Arguments<'_>) -> Result {
        Write::write_fmt(self.buffer, args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_write_concrete() {
        let mut buffer = String::new();
        let mut pipe = Pipe::new(&mut buffer);
        pipe.write_concrete(&Concrete::Value(json!("<b>"))).unwrap();
        pipe.write_concrete(&Concrete::Safe("<i>".into())).unwrap();
        pipe.write_concrete(&Concrete::Value(json!(12))).unwrap();
        assert_eq!(buffer, "&lt;b&gt;<i>12");
    }
}
