//! Line input shared by the chat prompt and the approval prompt.
//!
//! Both read through one buffered reader so that a prompt abandoned
//! mid-read (Ctrl+C during a `[y/N]` question) never consumes the line
//! typed for the next prompt.

use std::future::Future;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::Mutex;

pub struct TerminalInput<R = BufReader<Stdin>> {
    lines: Mutex<Lines<R>>,
}

impl TerminalInput {
    pub fn stdin() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()))
    }
}

impl<R: AsyncBufRead + Unpin + Send> TerminalInput<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: Mutex::new(reader.lines()),
        }
    }

    /// The next line without its terminator. `None` on end of input.
    ///
    /// Cancel safe: a line that arrives after the caller gave up is kept
    /// for the next call.
    pub async fn read_line(&self) -> std::io::Result<Option<String>> {
        self.lines.lock().await.next_line().await
    }

    /// Like [`read_line`](Self::read_line), but `None` as soon as
    /// `interrupt` completes.
    pub async fn read_line_or<F: Future>(&self, interrupt: F) -> std::io::Result<Option<String>> {
        tokio::select! {
            line = self.read_line() => line,
            _ = interrupt => Ok(None),
        }
    }
}
