use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{Receiver, SyncSender, sync_channel};
use std::thread::{self, JoinHandle};

/// Tuning knobs for the host-to-engine bridge
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Bytes read from the host source per worker iteration
    pub chunk_size: usize,
    /// Maximum chunks buffered in the pipe before the worker blocks
    pub max_chunks_in_flight: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            chunk_size: 8192,
            max_chunks_in_flight: 16,
        }
    }
}

/// Host-to-engine direction of the stream bridge.
///
/// Adapts an arbitrary host-side byte source into a stream the engine can
/// consume through `Read`, without materializing the payload: a dedicated
/// worker thread pulls chunks from the source and pushes them through a
/// bounded channel. The bounded capacity gives natural backpressure in both
/// directions; the worker blocks when the consumer is slower, the consumer
/// blocks when no data is buffered.
///
/// Worker-side I/O failures are funneled through the channel and surface as
/// read errors on the consuming side, never silently dropped. Dropping or
/// closing the consumer disconnects the channel, which stops the worker and
/// releases the host source.
pub struct HostStreamBridge {
    receiver: Option<Receiver<io::Result<Vec<u8>>>>,
    worker: Option<JoinHandle<()>>,
    pending: Vec<u8>,
    failed: bool,
}

impl HostStreamBridge {
    pub fn new<R: Read + Send + 'static>(source: R) -> Self {
        Self::with_config(source, BridgeConfig::default())
    }

    pub fn with_config<R: Read + Send + 'static>(source: R, config: BridgeConfig) -> Self {
        let (sender, receiver) = sync_channel(config.max_chunks_in_flight.max(1));
        let chunk_size = config.chunk_size.max(1);
        let worker = thread::spawn(move || pump_source(source, sender, chunk_size));

        Self {
            receiver: Some(receiver),
            worker: Some(worker),
            pending: Vec::new(),
            failed: false,
        }
    }

    /// Stop the worker and release the pipe. Idempotent; also runs on drop.
    pub fn close(&mut self) {
        // Disconnecting the receiver unblocks a worker waiting on a full pipe
        drop(self.receiver.take());
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                log::warn!("stream bridge worker thread panicked");
            }
        }
    }

    fn next_chunk(&mut self) -> io::Result<Option<Vec<u8>>> {
        if self.failed {
            return Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "stream bridge failed on an earlier read",
            ));
        }
        let Some(receiver) = self.receiver.as_ref() else {
            return Ok(None); // closed: end of stream
        };
        match receiver.recv() {
            Ok(Ok(chunk)) => Ok(Some(chunk)),
            Ok(Err(err)) => {
                self.failed = true;
                Err(err)
            }
            // Worker exited after exhausting the source
            Err(_) => Ok(None),
        }
    }
}

impl Read for HostStreamBridge {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        if self.pending.is_empty() {
            match self.next_chunk()? {
                Some(chunk) => self.pending = chunk,
                None => return Ok(0),
            }
        }
        let n = buf.len().min(self.pending.len());
        buf[..n].copy_from_slice(&self.pending[..n]);
        self.pending.drain(..n);
        Ok(n)
    }
}

impl Drop for HostStreamBridge {
    fn drop(&mut self) {
        self.close();
    }
}

/// Worker loop: move chunks from the host source into the pipe until the
/// source is exhausted, an error occurs, or the consumer hangs up
fn pump_source<R: Read>(mut source: R, sender: SyncSender<io::Result<Vec<u8>>>, chunk_size: usize) {
    let mut buf = vec![0u8; chunk_size];
    loop {
        match source.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => {
                if sender.send(Ok(buf[..n].to_vec())).is_err() {
                    // Consumer closed the pipe: cancellation
                    log::debug!("stream bridge consumer hung up; stopping worker");
                    break;
                }
            }
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => {
                // Must reach the consumer as a read failure
                let _ = sender.send(Err(err));
                break;
            }
        }
    }
    // Source dropped here, releasing the host-side resource
}

/// Engine-to-host direction of the stream bridge.
///
/// Wraps an engine-side reader and exposes incremental, byte-oriented reads
/// with conventional buffering semantics: `read_bytes(None)` drains to
/// completion, sized reads may be interleaved arbitrarily, and an empty
/// result is the exhaustion sentinel (repeated reads past the end keep
/// returning it rather than failing). Any text decoding is the caller's
/// responsibility.
pub struct BridgedReader<R: Read> {
    source: Option<R>,
    buffer: Vec<u8>,
    buffer_size: usize,
    exhausted: bool,
}

impl<R: Read> BridgedReader<R> {
    pub const DEFAULT_BUFFER_SIZE: usize = 4096;

    pub fn new(source: R) -> Self {
        Self::with_buffer_size(source, Self::DEFAULT_BUFFER_SIZE)
    }

    /// `buffer_size` controls how much is pulled from the engine side per
    /// underlying read
    pub fn with_buffer_size(source: R, buffer_size: usize) -> Self {
        Self {
            source: Some(source),
            buffer: Vec::new(),
            buffer_size: buffer_size.max(1),
            exhausted: false,
        }
    }

    /// Pull one chunk from the engine side into the internal buffer.
    /// Returns the number of bytes pulled; 0 means the source is exhausted.
    fn pull(&mut self) -> io::Result<usize> {
        if self.exhausted {
            return Ok(0);
        }
        let source = self.source.as_mut().ok_or_else(closed_error)?;
        let mut chunk = vec![0u8; self.buffer_size];
        let n = source.read(&mut chunk)?;
        if n == 0 {
            self.exhausted = true;
        } else {
            self.buffer.extend_from_slice(&chunk[..n]);
        }
        Ok(n)
    }

    fn ensure_open(&self) -> io::Result<()> {
        if self.source.is_none() && !self.exhausted {
            return Err(closed_error());
        }
        Ok(())
    }

    /// Read up to `size` bytes, or everything remaining when `size` is
    /// `None`. A zero-size read returns an empty result without touching the
    /// underlying source; so does any read after exhaustion.
    pub fn read_bytes(&mut self, size: Option<usize>) -> io::Result<Vec<u8>> {
        self.ensure_open()?;
        match size {
            Some(0) => Ok(Vec::new()),
            Some(n) => {
                while self.buffer.len() < n && self.pull()? > 0 {}
                let take = n.min(self.buffer.len());
                Ok(self.buffer.drain(..take).collect())
            }
            None => {
                while self.pull()? > 0 {}
                Ok(std::mem::take(&mut self.buffer))
            }
        }
    }

    /// Read one line, including its trailing newline. Returns an empty
    /// result once the source is exhausted.
    pub fn read_line(&mut self) -> io::Result<Vec<u8>> {
        self.ensure_open()?;
        loop {
            if let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
                return Ok(self.buffer.drain(..=pos).collect());
            }
            if self.pull()? == 0 {
                return Ok(std::mem::take(&mut self.buffer));
            }
        }
    }

    /// Read all remaining lines
    pub fn read_lines(&mut self) -> io::Result<Vec<Vec<u8>>> {
        let mut lines = Vec::new();
        loop {
            let line = self.read_line()?;
            if line.is_empty() {
                return Ok(lines);
            }
            lines.push(line);
        }
    }

    /// Close the wrapper and the underlying engine-side resource. Reads
    /// after close fail unless the source was already drained.
    pub fn close(&mut self) {
        self.source = None;
        self.buffer.clear();
    }
}

impl<R: Read> Read for BridgedReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        self.ensure_open()?;
        if self.buffer.is_empty() && self.pull()? == 0 {
            return Ok(0);
        }
        let n = buf.len().min(self.buffer.len());
        buf[..n].copy_from_slice(&self.buffer[..n]);
        self.buffer.drain(..n);
        Ok(n)
    }
}

fn closed_error() -> io::Error {
    io::Error::new(io::ErrorKind::BrokenPipe, "bridged reader is closed")
}

/// Drain a reader into a UTF-8 string
pub fn read_to_string<R: Read>(mut reader: R) -> io::Result<String> {
    let mut out = String::new();
    reader.read_to_string(&mut out)?;
    Ok(out)
}

/// Stream a reader into a freshly created file using chunked copy, creating
/// parent directories as needed. Returns the path written.
pub fn copy_to_file<R: Read + ?Sized>(reader: &mut R, path: &Path) -> io::Result<PathBuf> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let mut file = File::create(path)?;
    io::copy(reader, &mut file)?;
    file.flush()?;
    Ok(path.to_path_buf())
}
