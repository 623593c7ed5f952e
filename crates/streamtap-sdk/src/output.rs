//! Line-delimited protocol output.

use std::io::Write;

use streamtap_types::message::Message;
use streamtap_types::TapError;

/// Writes one JSON message per line to the wrapped sink.
#[derive(Debug)]
pub struct MessageWriter<W: Write> {
    sink: W,
    lines: u64,
}

impl<W: Write> MessageWriter<W> {
    pub fn new(sink: W) -> Self {
        Self { sink, lines: 0 }
    }

    /// Serialize and write `message` followed by a newline.
    ///
    /// # Errors
    ///
    /// Returns [`TapError::Serialization`] or [`TapError::Io`].
    pub fn write(&mut self, message: &Message) -> Result<(), TapError> {
        serde_json::to_writer(&mut self.sink, message)?;
        self.sink.write_all(b"\n")?;
        self.lines += 1;
        Ok(())
    }

    /// Write raw text as-is (used for the pretty-printed discovery catalog).
    ///
    /// # Errors
    ///
    /// Returns [`TapError::Io`].
    pub fn write_raw(&mut self, text: &str) -> Result<(), TapError> {
        self.sink.write_all(text.as_bytes())?;
        if !text.ends_with('\n') {
            self.sink.write_all(b"\n")?;
        }
        Ok(())
    }

    /// # Errors
    ///
    /// Returns [`TapError::Io`].
    pub fn flush(&mut self) -> Result<(), TapError> {
        self.sink.flush()?;
        Ok(())
    }

    /// Protocol messages written so far.
    #[must_use]
    pub fn lines(&self) -> u64 {
        self.lines
    }

    #[must_use]
    pub fn get_ref(&self) -> &W {
        &self.sink
    }

    pub fn into_inner(self) -> W {
        self.sink
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use streamtap_types::bookmark::BookmarkState;

    #[test]
    fn messages_are_newline_delimited() {
        let mut writer = MessageWriter::new(Vec::new());
        let state = Message::State {
            value: BookmarkState::new(),
        };
        writer.write(&state).unwrap();
        writer.write(&state).unwrap();
        let out = String::from_utf8(writer.into_inner()).unwrap();
        assert_eq!(out.lines().count(), 2);
        assert!(out.ends_with("}\n"));
    }

    #[test]
    fn raw_text_gets_trailing_newline() {
        let mut writer = MessageWriter::new(Vec::new());
        writer.write_raw("{\n  \"streams\": []\n}").unwrap();
        assert_eq!(writer.lines(), 0);
        assert_eq!(writer.get_ref().last(), Some(&b'\n'));
    }
}
