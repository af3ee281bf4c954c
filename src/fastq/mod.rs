use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

use crate::errors::{QcError, Result};

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FastqRecord {
    pub name: Vec<u8>,
    pub seq: Vec<u8>,
    pub plus: Vec<u8>,
    pub qual: Vec<u8>,
}

impl FastqRecord {
    pub fn new(name: &[u8], seq: &[u8], plus: &[u8], qual: &[u8]) -> Self {
        Self { name: name.to_vec(), seq: seq.to_vec(), plus: plus.to_vec(), qual: qual.to_vec() }
    }

    pub fn len(&self) -> usize {
        self.seq.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seq.is_empty()
    }

    /// Identifier with the leading `'@'` removed.
    pub fn id(&self) -> &[u8] {
        self.name.strip_prefix(b"@").unwrap_or(&self.name)
    }
}

/// Sequential FASTQ reader over a plain or gzip-compressed file.
pub struct Reader {
    reader: Box<dyn BufRead + Send>,
    path: PathBuf,
    scratch: Vec<u8>,
}

impl Reader {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut raw = BufReader::new(File::open(&path)?);
        let is_gzip = raw.fill_buf()?.starts_with(&GZIP_MAGIC);
        let reader: Box<dyn BufRead + Send> = if is_gzip {
            Box::new(BufReader::new(MultiGzDecoder::new(raw)))
        } else {
            Box::new(raw)
        };
        Ok(Self { reader, path, scratch: Vec::new() })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn next_record(&mut self) -> Result<Option<FastqRecord>> {
        let mut name = Vec::new();
        if read_line(&mut self.reader, &mut name)? == 0 {
            return Ok(None);
        }
        let mut seq = Vec::new();
        let mut plus = Vec::new();
        let mut qual = Vec::new();
        for line in [&mut seq, &mut plus, &mut qual] {
            if read_line(&mut self.reader, line)? == 0 {
                return Err(self.malformed("truncated record at end of file"));
            }
        }

        if !name.starts_with(b"@") {
            return Err(self.malformed(format!(
                "identifier line does not start with '@': {}",
                String::from_utf8_lossy(&name)
            )));
        }
        if !plus.starts_with(b"+") {
            return Err(self.malformed(format!(
                "separator line does not start with '+' in {}",
                String::from_utf8_lossy(&name)
            )));
        }
        if seq.len() != qual.len() {
            return Err(self.malformed(format!(
                "sequence length {} differs from quality length {} in {}",
                seq.len(),
                qual.len(),
                String::from_utf8_lossy(&name)
            )));
        }

        Ok(Some(FastqRecord { name, seq, plus, qual }))
    }

    /// Discards up to `n` records and returns how many were actually skipped.
    pub fn skip_records(&mut self, n: usize) -> Result<usize> {
        for skipped in 0..n {
            self.scratch.clear();
            if self.reader.read_until(b'\n', &mut self.scratch)? == 0 {
                return Ok(skipped);
            }
            for _ in 0..3 {
                self.scratch.clear();
                if self.reader.read_until(b'\n', &mut self.scratch)? == 0 {
                    return Err(self.malformed("truncated record at end of file"));
                }
            }
        }
        Ok(n)
    }

    fn malformed(&self, reason: impl Into<String>) -> QcError {
        QcError::MalformedRecord { path: self.path.clone(), reason: reason.into() }
    }
}

fn read_line<R: BufRead + ?Sized>(reader: &mut R, buf: &mut Vec<u8>) -> io::Result<usize> {
    let n = reader.read_until(b'\n', buf)?;
    if buf.ends_with(b"\n") { buf.pop(); }
    if buf.ends_with(b"\r") { buf.pop(); }
    Ok(n)
}

enum Sink {
    Gz(GzEncoder<BufWriter<File>>),
    Plain(BufWriter<File>),
}

pub struct Writer {
    sink: Sink,
}

impl Writer {
    /// Creates `path`, gzip-compressing when `compression` is given.
    pub fn create<P: AsRef<Path>>(path: P, compression: Option<u32>) -> Result<Self> {
        let f = BufWriter::new(File::create(path)?);
        let sink = match compression {
            Some(level) => Sink::Gz(GzEncoder::new(f, Compression::new(level))),
            None => Sink::Plain(f),
        };
        Ok(Self { sink })
    }

    pub fn write_record(&mut self, rec: &FastqRecord) -> io::Result<()> {
        for line in [&rec.name, &rec.seq, &rec.plus, &rec.qual] {
            self.write_all(line)?;
            self.write_all(b"\n")?;
        }
        Ok(())
    }

    /// Flushes buffered data and writes the gzip trailer.
    pub fn finish(self) -> io::Result<()> {
        match self.sink {
            Sink::Gz(enc) => enc.finish()?.flush(),
            Sink::Plain(mut f) => f.flush(),
        }
    }
}

impl Write for Writer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match &mut self.sink {
            Sink::Gz(w) => w.write(buf),
            Sink::Plain(w) => w.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match &mut self.sink {
            Sink::Gz(w) => w.flush(),
            Sink::Plain(w) => w.flush(),
        }
    }
}

/// Gzip level implied by an output file name: compressed iff it ends in `.gz`.
pub fn compression_for(path: &Path, level: u32) -> Option<u32> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("gz") => Some(level),
        _ => None,
    }
}
