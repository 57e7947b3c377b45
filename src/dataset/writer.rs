use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

/// Appends one JSON object per line; non-ASCII is written as raw UTF-8.
pub struct JsonlWriter<W: Write> {
    inner: W,
    written: usize,
}

impl JsonlWriter<BufWriter<File>> {
    pub fn create(path: &Path) -> Result<Self> {
        let file = File::create(path)
            .with_context(|| format!("create output {}", path.display()))?;
        Ok(Self::new(BufWriter::new(file)))
    }
}

impl<W: Write> JsonlWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner, written: 0 }
    }

    pub fn write<T: Serialize>(&mut self, row: &T) -> Result<()> {
        serde_json::to_writer(&mut self.inner, row).context("serialize output row")?;
        self.inner.write_all(b"\n").context("write output row")?;
        self.written += 1;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.inner.flush().context("flush output")
    }

    pub fn written(&self) -> usize { self.written }

    #[cfg(test)]
    pub fn into_inner(self) -> W { self.inner }
}
