use std::io;

use futures::Stream;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};

/// Splits a byte stream into newline-terminated text lines
pub struct LineSplitter<R> {
    reader: BufReader<R>,
    buf: Vec<u8>,
}

impl<R: AsyncRead + Unpin> LineSplitter<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader: BufReader::new(reader),
            buf: Vec::new(),
        }
    }

    /// Read the next line without its trailing newline.
    ///
    /// Returns `Ok(None)` once the stream is closed. A final line without a
    /// newline is still returned. Invalid UTF-8 is replaced, not rejected.
    pub async fn next_line(&mut self) -> io::Result<Option<String>> {
        self.buf.clear();
        let read = self.reader.read_until(b'\n', &mut self.buf).await?;
        if read == 0 {
            return Ok(None);
        }
        if self.buf.last() == Some(&b'\n') {
            self.buf.pop();
        }
        Ok(Some(String::from_utf8_lossy(&self.buf).into_owned()))
    }

    pub fn into_stream(self) -> impl Stream<Item = io::Result<String>> {
        futures::stream::try_unfold(self, |mut splitter| async move {
            let line = splitter.next_line().await?;
            Ok(line.map(|line| (line, splitter)))
        })
    }
}

/// Lazy stream of the lines read from `reader`
pub fn lines<R: AsyncRead + Unpin>(reader: R) -> impl Stream<Item = io::Result<String>> {
    LineSplitter::new(reader).into_stream()
}
