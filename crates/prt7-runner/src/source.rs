//! Line sources feeding the decoder.
//!
//! The decoder only sees one of three outcomes per read: a text line, an
//! empty read, or an error. Transports are hidden behind [`LineSource`].
//!
//! A read timeout with nothing buffered is silence, not a blank line: the
//! source keeps waiting, checking its stop flag between timeouts.

use std::collections::VecDeque;
use std::fs::File;
use std::io::{self, Read};
use std::net::{TcpStream, ToSocketAddrs};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError};
use prt7_protocol::LineCodec;
use serialport::{ClearBuffer, DataBits, FlowControl, Parity, SerialPort, StopBits};
use tracing::{debug, trace};

use crate::error::SourceError;

/// Default read timeout for stdin, serial and socket sources, in milliseconds.
pub const DEFAULT_READ_TIMEOUT_MS: u64 = 50;

/// Default serial line speed.
pub const DEFAULT_BAUD_RATE: u32 = 9600;

/// Size of each transport read.
const READ_CHUNK: usize = 256;

/// Outcome of a successful read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineRead {
    /// A non-empty line, line terminators removed.
    Line(String),
    /// A blank line, the end of the stream, or a stop request while waiting.
    Empty,
}

impl LineRead {
    fn from_text(text: String) -> Self {
        if text.is_empty() {
            LineRead::Empty
        } else {
            LineRead::Line(text)
        }
    }
}

/// A supplier of text lines, one per call.
pub trait LineSource {
    /// Read the next line.
    fn next_line(&mut self) -> Result<LineRead, SourceError>;

    /// Short description used in logs and metric labels.
    fn describe(&self) -> String {
        "unknown".to_string()
    }
}

impl<S: LineSource + ?Sized> LineSource for Box<S> {
    fn next_line(&mut self) -> Result<LineRead, SourceError> {
        (**self).next_line()
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

/// Line source over any byte stream.
///
/// Bytes are split into lines by [`LineCodec`]. A read timeout ends the
/// pending partial line if there is one; with nothing pending the source
/// keeps reading until data arrives or the stop flag is raised. Once the
/// stream ends every further read is empty, so the driver's idle threshold
/// ends the session.
pub struct StreamLineSource<R> {
    reader: R,
    codec: LineCodec,
    description: String,
    eof: bool,
    stop: Option<Arc<AtomicBool>>,
}

impl<R: Read> StreamLineSource<R> {
    /// Wrap a reader.
    pub fn new(reader: R, description: impl Into<String>) -> Self {
        StreamLineSource {
            reader,
            codec: LineCodec::new(),
            description: description.into(),
            eof: false,
            stop: None,
        }
    }

    /// Give up waiting for data once `flag` is set.
    ///
    /// The flag is checked after every read timeout or interrupted read,
    /// so the reader needs a timeout for this to take effect.
    pub fn with_stop_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.stop = Some(flag);
        self
    }

    /// Whether the underlying stream has ended.
    pub fn is_eof(&self) -> bool {
        self.eof
    }

    fn flush_partial(&mut self) -> LineRead {
        self.codec
            .finish()
            .map(LineRead::from_text)
            .unwrap_or(LineRead::Empty)
    }

    fn stop_requested(&self) -> bool {
        self.stop
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::SeqCst))
    }
}

impl StreamLineSource<ChannelReader> {
    /// Read frames from standard input.
    ///
    /// Stdin is read on a background thread so that waiting for input can
    /// time out and notice a stop request.
    pub fn from_stdin(read_timeout: Duration) -> Result<Self, SourceError> {
        let reader = ChannelReader::spawn(io::stdin(), "stdin", read_timeout).map_err(|source| SourceError::Open {
            target: "stdin".to_string(),
            source,
        })?;
        Ok(StreamLineSource::new(reader, "stdin"))
    }
}

impl StreamLineSource<File> {
    /// Read frames from a file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SourceError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| SourceError::Open {
            target: path.display().to_string(),
            source,
        })?;
        Ok(StreamLineSource::new(file, format!("file:{}", path.display())))
    }
}

impl StreamLineSource<Box<dyn SerialPort>> {
    /// Open a serial device at `baud`, 8N1, no flow control.
    ///
    /// Reads time out after `read_timeout`. Input already queued in the
    /// driver is discarded.
    pub fn open_serial(path: impl AsRef<Path>, baud: u32, read_timeout: Duration) -> Result<Self, SourceError> {
        let path = path.as_ref();
        let target = path.display().to_string();
        let open_err = |e: serialport::Error| SourceError::Open {
            target: target.clone(),
            source: e.into(),
        };

        let port = serialport::new(path.to_string_lossy(), baud)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(read_timeout)
            .open()
            .map_err(open_err)?;
        port.clear(ClearBuffer::Input).map_err(open_err)?;

        debug!(%target, baud, ?read_timeout, "serial port opened");
        Ok(StreamLineSource::new(port, format!("serial:{target}")))
    }
}

impl StreamLineSource<TcpStream> {
    /// Connect to a serial-over-TCP bridge.
    pub fn connect(addr: impl ToSocketAddrs + ToString, read_timeout: Duration) -> Result<Self, SourceError> {
        let target = addr.to_string();
        let open_err = |source| SourceError::Open {
            target: target.clone(),
            source,
        };
        let stream = TcpStream::connect(&addr).map_err(open_err)?;
        stream.set_read_timeout(Some(read_timeout)).map_err(open_err)?;
        debug!(%target, ?read_timeout, "connected to frame source");
        Ok(StreamLineSource::new(stream, format!("tcp:{target}")))
    }
}

impl<R: Read> LineSource for StreamLineSource<R> {
    fn next_line(&mut self) -> Result<LineRead, SourceError> {
        let mut chunk = [0u8; READ_CHUNK];
        loop {
            if let Some(line) = self.codec.decode_line() {
                return Ok(LineRead::from_text(line));
            }
            if self.eof {
                return Ok(self.flush_partial());
            }

            match self.reader.read(&mut chunk) {
                Ok(0) => {
                    trace!(source = %self.description, "end of stream");
                    self.eof = true;
                }
                Ok(n) => self.codec.push(&chunk[..n]),
                Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {
                    if self.codec.buffered_len() > 0 {
                        return Ok(self.flush_partial());
                    }
                    if self.stop_requested() {
                        return Ok(LineRead::Empty);
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {
                    if self.stop_requested() {
                        return Ok(LineRead::Empty);
                    }
                }
                Err(e) => return Err(SourceError::Io(e)),
            }
        }
    }

    fn describe(&self) -> String {
        self.description.clone()
    }
}

/// Reader fed by a background thread.
///
/// Wraps a blocking stream (such as stdin) so that reads time out with
/// [`io::ErrorKind::TimedOut`] instead of blocking forever. The thread is
/// detached and ends with the stream or the process.
pub struct ChannelReader {
    rx: Receiver<io::Result<Vec<u8>>>,
    timeout: Duration,
    pending: Vec<u8>,
    pos: usize,
    done: bool,
}

impl ChannelReader {
    /// Start reading `inner` on a thread named `reader-<name>`.
    pub fn spawn<R: Read + Send + 'static>(mut inner: R, name: &str, timeout: Duration) -> io::Result<Self> {
        let (tx, rx) = crossbeam_channel::bounded(16);

        thread::Builder::new()
            .name(format!("reader-{name}"))
            .spawn(move || {
                let mut chunk = [0u8; READ_CHUNK];
                loop {
                    let msg = match inner.read(&mut chunk) {
                        Ok(n) => Ok(chunk[..n].to_vec()),
                        Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                        Err(e) => Err(e),
                    };
                    let last = !matches!(&msg, Ok(data) if !data.is_empty());
                    // Receiver gone: nobody is decoding any more.
                    if tx.send(msg).is_err() || last {
                        break;
                    }
                }
            })?;

        Ok(ChannelReader {
            rx,
            timeout,
            pending: Vec::new(),
            pos: 0,
            done: false,
        })
    }
}

impl Read for ChannelReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.pos >= self.pending.len() {
            if self.done {
                return Ok(0);
            }
            match self.rx.recv_timeout(self.timeout) {
                Ok(Ok(data)) if data.is_empty() => {
                    self.done = true;
                    return Ok(0);
                }
                Ok(Ok(data)) => {
                    self.pending = data;
                    self.pos = 0;
                }
                Ok(Err(e)) => {
                    self.done = true;
                    return Err(e);
                }
                Err(RecvTimeoutError::Timeout) => {
                    return Err(io::Error::new(io::ErrorKind::TimedOut, "no data within read timeout"));
                }
                Err(RecvTimeoutError::Disconnected) => {
                    self.done = true;
                    return Ok(0);
                }
            }
        }

        let n = buf.len().min(self.pending.len() - self.pos);
        buf[..n].copy_from_slice(&self.pending[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

/// In-memory source replaying a fixed sequence of reads.
///
/// Once the script is exhausted every read is empty.
#[derive(Debug, Default)]
pub struct ScriptedLineSource {
    reads: VecDeque<Result<LineRead, String>>,
}

impl ScriptedLineSource {
    /// Create an empty script.
    pub fn new() -> Self {
        ScriptedLineSource::default()
    }

    /// Script one read per line; blank lines become empty reads.
    pub fn from_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut source = ScriptedLineSource::new();
        for line in lines {
            source = source.line(line);
        }
        source
    }

    /// Append a line read.
    pub fn line(mut self, line: impl Into<String>) -> Self {
        self.reads.push_back(Ok(LineRead::from_text(line.into())));
        self
    }

    /// Append `count` empty reads.
    pub fn empty(mut self, count: usize) -> Self {
        self.reads.extend((0..count).map(|_| Ok(LineRead::Empty)));
        self
    }

    /// Append a failing read.
    pub fn error(mut self, message: impl Into<String>) -> Self {
        self.reads.push_back(Err(message.into()));
        self
    }

    /// Reads not yet consumed.
    pub fn remaining(&self) -> usize {
        self.reads.len()
    }
}

impl LineSource for ScriptedLineSource {
    fn next_line(&mut self) -> Result<LineRead, SourceError> {
        match self.reads.pop_front() {
            Some(Ok(read)) => Ok(read),
            Some(Err(message)) => Err(SourceError::Scripted(message)),
            None => Ok(LineRead::Empty),
        }
    }

    fn describe(&self) -> String {
        "script".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn line(s: &str) -> LineRead {
        LineRead::Line(s.to_string())
    }

    #[test]
    fn test_stream_source_splits_lines() {
        let mut source = StreamLineSource::new(Cursor::new(b"L,H\r\nM,2\n\nL,A".to_vec()), "mem");
        assert_eq!(source.next_line().unwrap(), line("L,H"));
        assert_eq!(source.next_line().unwrap(), line("M,2"));
        assert_eq!(source.next_line().unwrap(), LineRead::Empty);
        // Unterminated tail is flushed at end of stream.
        assert_eq!(source.next_line().unwrap(), line("L,A"));
        assert!(source.is_eof());
        assert_eq!(source.next_line().unwrap(), LineRead::Empty);
        assert_eq!(source.next_line().unwrap(), LineRead::Empty);
        assert_eq!(source.describe(), "mem");
    }

    #[test]
    fn test_stream_source_keeps_spaces() {
        let mut source = StreamLineSource::new(Cursor::new(b"L, \n".to_vec()), "mem");
        assert_eq!(source.next_line().unwrap(), line("L, "));
    }

    struct FailingReader;

    impl Read for FailingReader {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "gone"))
        }
    }

    #[test]
    fn test_stream_source_reports_io_errors() {
        let mut source = StreamLineSource::new(FailingReader, "broken");
        assert!(matches!(source.next_line(), Err(SourceError::Io(_))));
    }

    /// Replays chunks, `None` being a read timeout. Once exhausted it raises
    /// `stop` and times out forever.
    struct TimeoutReader {
        reads: VecDeque<Option<&'static str>>,
        stop: Arc<AtomicBool>,
    }

    impl TimeoutReader {
        fn new(reads: &[Option<&'static str>]) -> (Self, Arc<AtomicBool>) {
            let stop = Arc::new(AtomicBool::new(false));
            let reader = TimeoutReader {
                reads: reads.iter().copied().collect(),
                stop: stop.clone(),
            };
            (reader, stop)
        }
    }

    impl Read for TimeoutReader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.reads.pop_front() {
                Some(Some(data)) => {
                    buf[..data.len()].copy_from_slice(data.as_bytes());
                    Ok(data.len())
                }
                Some(None) => Err(io::Error::new(io::ErrorKind::WouldBlock, "timeout")),
                None => {
                    self.stop.store(true, Ordering::SeqCst);
                    Err(io::Error::new(io::ErrorKind::TimedOut, "timeout"))
                }
            }
        }
    }

    #[test]
    fn test_timeout_flushes_partial_line() {
        let (reader, stop) = TimeoutReader::new(&[Some("M,5"), None]);
        let mut source = StreamLineSource::new(reader, "slow").with_stop_flag(stop);
        assert_eq!(source.next_line().unwrap(), line("M,5"));
        assert!(!source.is_eof());
    }

    #[test]
    fn test_silence_is_not_an_empty_read() {
        let (reader, stop) = TimeoutReader::new(&[None, None, None, None, Some("L,A\n"), None, None]);
        let mut source = StreamLineSource::new(reader, "slow").with_stop_flag(stop.clone());
        assert_eq!(source.next_line().unwrap(), line("L,A"));
        assert!(!stop.load(Ordering::SeqCst));

        // Only the stop request ends the wait.
        assert_eq!(source.next_line().unwrap(), LineRead::Empty);
        assert!(stop.load(Ordering::SeqCst));
    }

    /// Every read is interrupted by a signal.
    struct InterruptedReader;

    impl Read for InterruptedReader {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::Interrupted, "signal"))
        }
    }

    #[test]
    fn test_interrupted_read_honours_stop_flag() {
        let stop = Arc::new(AtomicBool::new(true));
        let mut source = StreamLineSource::new(InterruptedReader, "tty").with_stop_flag(stop);
        assert_eq!(source.next_line().unwrap(), LineRead::Empty);
    }

    #[test]
    fn test_channel_reader_times_out_then_delivers() {
        let (tx, rx) = std::sync::mpsc::channel::<u8>();
        // A blocking reader that only yields once the test allows it.
        struct Gate(std::sync::mpsc::Receiver<u8>);
        impl Read for Gate {
            fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
                match self.0.recv() {
                    Ok(b) => {
                        buf[0] = b;
                        Ok(1)
                    }
                    Err(_) => Ok(0),
                }
            }
        }

        let mut reader = ChannelReader::spawn(Gate(rx), "gate", Duration::from_millis(20)).unwrap();
        let mut buf = [0u8; 8];
        let err = reader.read(&mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::TimedOut);

        tx.send(b'Z').unwrap();
        let n = loop {
            match reader.read(&mut buf) {
                Ok(n) => break n,
                Err(e) => assert_eq!(e.kind(), io::ErrorKind::TimedOut),
            }
        };
        assert_eq!(&buf[..n], b"Z");

        drop(tx);
        let n = loop {
            match reader.read(&mut buf) {
                Ok(n) => break n,
                Err(e) => assert_eq!(e.kind(), io::ErrorKind::TimedOut),
            }
        };
        assert_eq!(n, 0);
        assert_eq!(reader.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn test_open_serial_missing_device() {
        let err = StreamLineSource::open_serial("/definitely/not/a/tty", DEFAULT_BAUD_RATE, Duration::from_millis(50))
            .err()
            .unwrap();
        assert!(matches!(err, SourceError::Open { ref target, .. } if target == "/definitely/not/a/tty"));
    }

    #[test]
    fn test_open_missing_file() {
        let err = StreamLineSource::open("/definitely/not/here.frames").err().unwrap();
        assert!(matches!(err, SourceError::Open { .. }));
    }

    #[test]
    fn test_scripted_source() {
        let mut source = ScriptedLineSource::from_lines(["L,A", ""])
            .empty(1)
            .error("unplugged");
        assert_eq!(source.remaining(), 4);
        assert_eq!(source.next_line().unwrap(), line("L,A"));
        assert_eq!(source.next_line().unwrap(), LineRead::Empty);
        assert_eq!(source.next_line().unwrap(), LineRead::Empty);
        assert!(matches!(source.next_line(), Err(SourceError::Scripted(m)) if m == "unplugged"));
        assert_eq!(source.next_line().unwrap(), LineRead::Empty);
    }
}
