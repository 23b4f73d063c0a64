//! Length-prefixed file of DPK1 frame buffers, as written by `dpk compress`.
//!
//! ```text
//! [MAGIC: 4 bytes "DPKS"]
//! [len:u32 LE][frame buffer] [len:u32 LE][frame buffer] ...
//! ```

use std::fs::File;
use std::io::{BufReader, BufWriter, ErrorKind, Read, Write};
use std::path::Path;

use anyhow::Context;

pub const STREAM_MAGIC: &[u8; 4] = b"DPKS";

/// Sequential writer for a frame stream file.
pub struct StreamWriter {
    out: BufWriter<File>,
    frames: u64,
    bytes: u64,
}

impl StreamWriter {
    pub fn create(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let mut out = BufWriter::new(
            File::create(path).with_context(|| format!("creating stream file {:?}", path))?,
        );
        out.write_all(STREAM_MAGIC)?;
        Ok(Self {
            out,
            frames: 0,
            bytes: STREAM_MAGIC.len() as u64,
        })
    }

    pub fn write_frame(&mut self, buf: &[u8]) -> anyhow::Result<()> {
        let len = u32::try_from(buf.len()).context("frame buffer larger than 4 GiB")?;
        self.out.write_all(&len.to_le_bytes())?;
        self.out.write_all(buf)?;
        self.frames += 1;
        self.bytes += 4 + buf.len() as u64;
        Ok(())
    }

    /// Flush and return `(frames, bytes)` written.
    pub fn finish(mut self) -> anyhow::Result<(u64, u64)> {
        self.out.flush()?;
        Ok((self.frames, self.bytes))
    }
}

/// Sequential reader for a frame stream file.
pub struct StreamReader {
    src: BufReader<File>,
}

impl StreamReader {
    pub fn open(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let mut src = BufReader::new(
            File::open(path).with_context(|| format!("opening stream file {:?}", path))?,
        );
        let mut magic = [0u8; 4];
        src.read_exact(&mut magic)
            .with_context(|| format!("reading stream magic from {:?}", path))?;
        if &magic != STREAM_MAGIC {
            anyhow::bail!("invalid stream magic bytes, not a DPK stream file");
        }
        Ok(Self { src })
    }

    /// Next frame buffer, or `None` at a clean end of file.
    pub fn next_frame(&mut self) -> anyhow::Result<Option<Vec<u8>>> {
        let mut len_buf = [0u8; 4];
        let mut filled = 0;
        while filled < len_buf.len() {
            match self.src.read(&mut len_buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        match filled {
            0 => return Ok(None),
            4 => {}
            n => anyhow::bail!("stream ends inside a frame length ({} of 4 bytes)", n),
        }
        let len = u32::from_le_bytes(len_buf) as usize;
        let mut buf = vec![0u8; len];
        self.src
            .read_exact(&mut buf)
            .context("stream ends inside a frame record")?;
        Ok(Some(buf))
    }
}
