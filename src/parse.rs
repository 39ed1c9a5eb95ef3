use crate::KeyValueCollection;

/// What kind of line format a [`StreamParser`] expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineFormat {
    /// `<digest><whitespace run><relative path>` — keyed by path
    Manifest,
    /// `<Tag-Name>: <value>` — keyed by tag name, duplicates kept in order
    Tag,
}

/// Streaming parser for manifest and tag-file content.
///
/// Input arrives as arbitrary byte chunks, not necessarily line-aligned. A
/// trailing partial line is buffered and prepended to the next chunk, so the
/// parsed result is independent of chunk boundaries. A non-empty final
/// fragment with no terminating newline is still a logical line.
#[derive(Debug)]
pub struct StreamParser {
    format: LineFormat,
    buffer: Vec<u8>,
    entries: KeyValueCollection,
}

impl StreamParser {
    pub fn manifest() -> Self {
        Self::new(LineFormat::Manifest)
    }

    pub fn tag_file() -> Self {
        Self::new(LineFormat::Tag)
    }

    fn new(format: LineFormat) -> Self {
        Self {
            format,
            buffer: Vec::new(),
            entries: KeyValueCollection::new(),
        }
    }

    /// Feed one chunk of bytes.
    pub fn feed(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);

        while let Some(newline) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=newline).collect();
            self.parse_line(&line[..line.len() - 1]);
        }
    }

    /// Signal end of stream and take the parsed entries.
    pub fn finish(mut self) -> KeyValueCollection {
        if !self.buffer.is_empty() {
            let line = std::mem::take(&mut self.buffer);
            self.parse_line(&line);
        }
        self.entries
    }

    fn parse_line(&mut self, raw: &[u8]) {
        let line = String::from_utf8_lossy(raw);
        let line = line.strip_suffix('\r').unwrap_or(&line);
        if line.trim().is_empty() {
            return;
        }

        match self.format {
            LineFormat::Manifest => {
                // Split on the first whitespace run. Known fragility: payload
                // paths containing embedded whitespace runs cannot be
                // represented in this line format.
                if let Some((digest, rest)) = line.split_once(char::is_whitespace) {
                    let path = rest.trim_start();
                    if !digest.is_empty() && !path.is_empty() {
                        self.entries.add(path, digest);
                    }
                }
            }
            LineFormat::Tag => {
                if let Some((name, value)) = line.split_once(':') {
                    self.entries.add(name.trim(), value.trim());
                }
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const MANIFEST: &[u8] = b"5d41402abc4b2a76b9719d911017c592 data/a.txt\n\
        7d793037a0760186574b0282f2f435e7  data/b.txt\n\
        d41d8cd98f00b204e9800998ecf8427e data/empty.txt\n";

    #[test]
    fn manifest_lines() {
        let mut parser = StreamParser::manifest();
        parser.feed(MANIFEST);
        let entries = parser.finish();

        assert_eq!(entries.len(), 3);
        assert_eq!(
            entries.first("data/a.txt"),
            Some("5d41402abc4b2a76b9719d911017c592")
        );
        // Multiple separator spaces collapse into one split
        assert_eq!(
            entries.first("data/b.txt"),
            Some("7d793037a0760186574b0282f2f435e7")
        );
        assert_eq!(
            entries.keys().collect::<Vec<_>>(),
            vec!["data/a.txt", "data/b.txt", "data/empty.txt"]
        );
    }

    #[test]
    fn chunk_boundaries_do_not_change_result() {
        let whole = {
            let mut parser = StreamParser::manifest();
            parser.feed(MANIFEST);
            parser.finish()
        };

        for split in 0..MANIFEST.len() {
            let mut parser = StreamParser::manifest();
            parser.feed(&MANIFEST[..split]);
            parser.feed(&MANIFEST[split..]);
            assert_eq!(parser.finish(), whole, "split at {split}");
        }

        // One byte at a time
        let mut parser = StreamParser::manifest();
        for byte in MANIFEST {
            parser.feed(std::slice::from_ref(byte));
        }
        assert_eq!(parser.finish(), whole);
    }

    #[test]
    fn trailing_line_without_newline_is_kept() {
        let mut parser = StreamParser::manifest();
        parser.feed(b"abc123 data/x.txt\ndef456 data/y.txt");
        let entries = parser.finish();
        assert_eq!(entries.first("data/y.txt"), Some("def456"));
        assert_eq!(entries.len(), 2);
    }

    #[test]
    fn tag_file_duplicates_and_colons_in_values() {
        let mut parser = StreamParser::tag_file();
        parser.feed(b"Source-Organization: Example Org\n");
        parser.feed(b"Internal-Sender-Identifier: one\n");
        parser.feed(b"Internal-Sender-Identifier: two\n");
        parser.feed(b"External-Description: a bag: with a colon\n");
        let entries = parser.finish();

        assert_eq!(entries.first("Source-Organization"), Some("Example Org"));
        assert_eq!(
            entries.all("Internal-Sender-Identifier"),
            Some(["one".to_string(), "two".to_string()].as_slice())
        );
        assert_eq!(
            entries.first("External-Description"),
            Some("a bag: with a colon")
        );
    }

    #[test]
    fn blank_lines_and_crlf() {
        let mut parser = StreamParser::tag_file();
        parser.feed(b"BagIt-Version: 0.97\r\n\r\nTag-File-Character-Encoding: UTF-8\r\n");
        let entries = parser.finish();
        assert_eq!(entries.first("BagIt-Version"), Some("0.97"));
        assert_eq!(entries.first("Tag-File-Character-Encoding"), Some("UTF-8"));
        assert_eq!(entries.len(), 2);
    }
}
