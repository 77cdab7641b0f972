use byteorder::{ByteOrder, LittleEndian};
use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufReader, ErrorKind, Read};
use std::path::{Path, PathBuf};

use super::error::EventSourceError;

/// Anything that can hand out raw events one at a time
pub trait EventSource {
    /// Fill `buffer` with the next event.
    ///
    /// Returns `Ok(false)` once the source is exhausted.
    fn next_event(&mut self, buffer: &mut Vec<i32>) -> Result<bool, EventSourceError>;

    /// Total size of the source in bytes, if known. Used for progress reporting
    fn total_size_bytes(&self) -> u64 {
        0
    }
}

/// EventFile replays a raw event file: a flat stream of little-endian 32-bit words,
/// `event_size` words per event, with no headers.
#[derive(Debug)]
pub struct EventFile {
    reader: BufReader<File>,
    path: PathBuf,
    event_size: usize,
    bytes: Vec<u8>,
    size_bytes: u64,
    is_eof: bool,
}

impl EventFile {
    pub fn new(path: &Path, event_size: usize) -> Result<Self, EventSourceError> {
        if !path.exists() {
            return Err(EventSourceError::BadFilePath(path.to_path_buf()));
        }
        if event_size == 0 {
            return Err(EventSourceError::ZeroEventSize);
        }
        let file = File::open(path)?;
        let size_bytes = file.metadata()?.len();
        Ok(Self {
            reader: BufReader::new(file),
            path: path.to_path_buf(),
            event_size,
            bytes: vec![0; event_size * 4],
            size_bytes,
            is_eof: size_bytes == 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn event_size(&self) -> usize {
        self.event_size
    }

    pub fn is_eof(&self) -> bool {
        self.is_eof
    }

    /// Read as much of one event as the file holds
    fn fill(&mut self) -> Result<usize, EventSourceError> {
        let mut n_read = 0;
        while n_read < self.bytes.len() {
            match self.reader.read(&mut self.bytes[n_read..]) {
                Ok(0) => break,
                Ok(n) => n_read += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(EventSourceError::IOError(e)),
            }
        }
        Ok(n_read)
    }
}

impl EventSource for EventFile {
    fn next_event(&mut self, buffer: &mut Vec<i32>) -> Result<bool, EventSourceError> {
        if self.is_eof {
            return Ok(false);
        }
        let n_read = self.fill()?;
        if n_read == 0 {
            self.is_eof = true;
            return Ok(false);
        } else if n_read < self.bytes.len() {
            self.is_eof = true;
            return Err(EventSourceError::TruncatedEvent(n_read, self.bytes.len()));
        }
        buffer.resize(self.event_size, 0);
        LittleEndian::read_i32_into(&self.bytes, buffer);
        Ok(true)
    }

    fn total_size_bytes(&self) -> u64 {
        self.size_bytes
    }
}

/// In-memory event source, mostly for tests and simulations
#[derive(Debug, Clone, Default)]
pub struct VecSource {
    events: VecDeque<Vec<i32>>,
    size_bytes: u64,
}

impl VecSource {
    pub fn new(events: Vec<Vec<i32>>) -> Self {
        let size_bytes = events.iter().map(|e| (e.len() * 4) as u64).sum();
        Self {
            events: events.into(),
            size_bytes,
        }
    }

    pub fn push(&mut self, event: Vec<i32>) {
        self.size_bytes += (event.len() * 4) as u64;
        self.events.push_back(event);
    }

    pub fn remaining(&self) -> usize {
        self.events.len()
    }
}

impl EventSource for VecSource {
    fn next_event(&mut self, buffer: &mut Vec<i32>) -> Result<bool, EventSourceError> {
        match self.events.pop_front() {
            Some(event) => {
                buffer.clear();
                buffer.extend_from_slice(&event);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn total_size_bytes(&self) -> u64 {
        self.size_bytes
    }
}

/// Write events as a raw little-endian event file
pub fn write_event_file(path: &Path, events: &[Vec<i32>]) -> Result<(), EventSourceError> {
    let mut bytes: Vec<u8> = Vec::with_capacity(events.iter().map(|e| e.len() * 4).sum());
    for event in events {
        let start = bytes.len();
        bytes.resize(start + event.len() * 4, 0);
        LittleEndian::write_i32_into(event, &mut bytes[start..]);
    }
    std::fs::write(path, bytes)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("specsort_{}_{}.evt", name, std::process::id()))
    }

    #[test]
    fn test_event_file() {
        let path = temp_path("replay");
        write_event_file(&path, &[vec![100, 5], vec![200, -60]]).unwrap();

        let mut file = EventFile::new(&path, 2).unwrap();
        assert_eq!(file.total_size_bytes(), 16);
        let mut buffer = Vec::new();
        assert!(file.next_event(&mut buffer).unwrap());
        assert_eq!(buffer, vec![100, 5]);
        assert!(file.next_event(&mut buffer).unwrap());
        assert_eq!(buffer, vec![200, -60]);
        assert!(!file.next_event(&mut buffer).unwrap());
        assert!(file.is_eof());
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_truncated_event() {
        let path = temp_path("truncated");
        write_event_file(&path, &[vec![1, 2, 3]]).unwrap();

        let mut file = EventFile::new(&path, 2).unwrap();
        let mut buffer = Vec::new();
        assert!(file.next_event(&mut buffer).unwrap());
        match file.next_event(&mut buffer) {
            Err(EventSourceError::TruncatedEvent(4, 8)) => (),
            other => panic!("expected a truncated event, got {other:?}"),
        }
        assert!(!file.next_event(&mut buffer).unwrap());
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_bad_inputs() {
        assert!(matches!(
            EventFile::new(Path::new("/no/such/file.evt"), 2),
            Err(EventSourceError::BadFilePath(_))
        ));
        let path = temp_path("zero");
        write_event_file(&path, &[vec![1]]).unwrap();
        assert!(matches!(
            EventFile::new(&path, 0),
            Err(EventSourceError::ZeroEventSize)
        ));
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_vec_source() {
        let mut source = VecSource::new(vec![vec![1, 2]]);
        source.push(vec![3, 4]);
        assert_eq!(source.total_size_bytes(), 16);
        let mut buffer = vec![9; 5];
        assert!(source.next_event(&mut buffer).unwrap());
        assert_eq!(buffer, vec![1, 2]);
        assert_eq!(source.remaining(), 1);
        assert!(source.next_event(&mut buffer).unwrap());
        assert!(!source.next_event(&mut buffer).unwrap());
    }
}
