/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Button edge decoder.
//!
//! sysfs GPIO reports level changes on the `value` attribute as a
//! high-priority poll event (`EPOLLPRI`), not as readable data.  After every
//! wake-up the attribute has to be rewound and re-read; only the text
//! `"1\n"` counts as a press.  Release edges, short or empty reads, and
//! spurious wake-ups all decode to [`Edge::Other`].

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};

use thiserror::Error;
use tokio::io::unix::AsyncFd;
use tokio::io::Interest;
use tracing::debug;

// ── Constants ─────────────────────────────────────────────────────────────────

/// Size of the scratch buffer used for one `value` read.
pub const VALUE_BUF_LEN: usize = 1024;

/// Content of the `value` attribute while the button is held.
const PRESSED: &[u8] = b"1\n";

// ── Error type ────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum GpioError {
    #[error("gpio{gpio}: cannot register value handle for edge notification: {source}")]
    Register {
        gpio: u32,
        #[source]
        source: io::Error,
    },

    #[error("gpio{gpio}: waiting for edge failed: {source}")]
    Wait {
        gpio: u32,
        #[source]
        source: io::Error,
    },

    #[error("gpio{gpio}: reading value failed: {source}")]
    Read {
        gpio: u32,
        #[source]
        source: io::Error,
    },
}

// ── Edge decoding ─────────────────────────────────────────────────────────────

/// Meaning of one edge notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    /// The line reads active (`"1\n"`).
    Press,
    /// Anything else: release, empty or short read, spurious wake-up.
    Other,
}

/// Classify the bytes read from a `value` attribute.
pub fn decode(buf: &[u8]) -> Edge {
    if buf.starts_with(PRESSED) {
        Edge::Press
    } else {
        Edge::Other
    }
}

/// Rewind `file` and decode its current level.
///
/// Reads at most [`VALUE_BUF_LEN`] bytes into a zeroed buffer.
pub fn read_level<R: Read + Seek>(file: &mut R) -> io::Result<Edge> {
    let mut buf = [0u8; VALUE_BUF_LEN];
    file.seek(SeekFrom::Start(0))?;
    let n = file.read(&mut buf)?;
    Ok(decode(&buf[..n]))
}

// ── ButtonEdge ────────────────────────────────────────────────────────────────

/// The button's `value` attribute registered for priority readiness.
#[derive(Debug)]
pub struct ButtonEdge {
    fd: AsyncFd<File>,
    gpio: u32,
}

/// A source of button edges.  The multiplexer is generic over this so the
/// supervisor loop can be driven without a real GPIO line.
#[allow(async_fn_in_trait)]
pub trait EdgeSource {
    fn gpio(&self) -> u32;

    /// Wait for the next edge notification and decode the level behind it.
    async fn next_edge(&mut self) -> Result<Edge, GpioError>;
}

impl ButtonEdge {
    /// Register an already-opened (O_RDONLY | O_NONBLOCK) `value` handle.
    ///
    /// Must be called from inside a tokio runtime.
    pub fn register(value: File, gpio: u32) -> Result<Self, GpioError> {
        let fd = AsyncFd::with_interest(value, Interest::PRIORITY)
            .map_err(|source| GpioError::Register { gpio, source })?;
        Ok(Self { fd, gpio })
    }
}

impl EdgeSource for ButtonEdge {
    fn gpio(&self) -> u32 {
        self.gpio
    }

    async fn next_edge(&mut self) -> Result<Edge, GpioError> {
        let gpio = self.gpio;
        let mut guard = self
            .fd
            .ready_mut(Interest::PRIORITY)
            .await
            .map_err(|source| GpioError::Wait { gpio, source })?;

        let edge = read_level(guard.get_inner_mut());
        // Priority readiness is never cleared by tokio on its own.
        guard.clear_ready();

        let edge = edge.map_err(|source| GpioError::Read { gpio, source })?;
        debug!(gpio, ?edge, "edge notification");
        Ok(edge)
    }
}

// ── Scripted source (tests) ───────────────────────────────────────────────────

#[cfg(test)]
pub(crate) mod scripted {
    use std::collections::VecDeque;
    use std::io::{self, Cursor};

    use super::{read_level, Edge, EdgeSource, GpioError};

    /// Replays a fixed list of `value` reads, then never fires again.
    #[derive(Debug)]
    pub(crate) struct ScriptedButton {
        gpio: u32,
        reads: VecDeque<io::Result<Vec<u8>>>,
    }

    impl ScriptedButton {
        pub(crate) fn new(gpio: u32, reads: impl IntoIterator<Item = io::Result<Vec<u8>>>) -> Self {
            Self {
                gpio,
                reads: reads.into_iter().collect(),
            }
        }

        pub(crate) fn levels(gpio: u32, levels: &[&str]) -> Self {
            Self::new(gpio, levels.iter().map(|l| Ok(l.as_bytes().to_vec())))
        }
    }

    impl EdgeSource for ScriptedButton {
        fn gpio(&self) -> u32 {
            self.gpio
        }

        async fn next_edge(&mut self) -> Result<Edge, GpioError> {
            let gpio = self.gpio;
            match self.reads.pop_front() {
                Some(Ok(bytes)) => read_level(&mut Cursor::new(bytes))
                    .map_err(|source| GpioError::Read { gpio, source }),
                Some(Err(source)) => Err(GpioError::Read { gpio, source }),
                None => std::future::pending().await,
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};
    use tempfile::NamedTempFile;

    // ── decode ────────────────────────────────────────────────────────────────

    #[test]
    fn active_level_is_a_press() {
        assert_eq!(decode(b"1\n"), Edge::Press);
    }

    #[test]
    fn release_level_is_ignored() {
        assert_eq!(decode(b"0\n"), Edge::Other);
    }

    #[test]
    fn short_and_empty_reads_are_ignored() {
        assert_eq!(decode(b""), Edge::Other);
        assert_eq!(decode(b"1"), Edge::Other);
    }

    #[test]
    fn trailing_bytes_after_press_still_press() {
        assert_eq!(decode(b"1\ngarbage"), Edge::Press);
    }

    #[test]
    fn other_content_is_ignored() {
        assert_eq!(decode(b"10\n"), Edge::Other);
        assert_eq!(decode(b" 1\n"), Edge::Other);
    }

    // ── read_level ────────────────────────────────────────────────────────────

    #[test]
    fn read_level_rewinds_before_reading() {
        let mut cursor = Cursor::new(b"1\n".to_vec());
        assert_eq!(read_level(&mut cursor).unwrap(), Edge::Press);
        // cursor now sits at EOF; a second read must still see the level
        assert_eq!(read_level(&mut cursor).unwrap(), Edge::Press);
    }

    #[test]
    fn read_level_on_value_file() {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(b"0\n").unwrap();
        let mut file = File::open(f.path()).unwrap();
        assert_eq!(read_level(&mut file).unwrap(), Edge::Other);

        std::fs::write(f.path(), "1\n").unwrap();
        assert_eq!(read_level(&mut file).unwrap(), Edge::Press);
    }

    #[test]
    fn read_level_caps_read_size() {
        let mut big = vec![b'1', b'\n'];
        big.resize(VALUE_BUF_LEN * 4, b'x');
        let mut cursor = Cursor::new(big);
        assert_eq!(read_level(&mut cursor).unwrap(), Edge::Press);
        assert_eq!(cursor.position(), VALUE_BUF_LEN as u64);
    }

    // ── ButtonEdge ────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn regular_file_cannot_be_registered() {
        // epoll refuses regular files; only a real sysfs value attribute
        // delivers priority events.
        let f = NamedTempFile::new().unwrap();
        let file = File::open(f.path()).unwrap();
        let err = ButtonEdge::register(file, 17).unwrap_err();
        assert!(matches!(err, GpioError::Register { gpio: 17, .. }));
        assert!(err.to_string().starts_with("gpio17:"));
    }
}
