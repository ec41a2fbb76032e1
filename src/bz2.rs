use crate::config::BZ2_BUF_SIZE;
use bzip2::bufread::BzDecoder;
use std::io::{self, BufReader, Read};
use tracing::debug;

/// Streaming bzip2 byte source for dump files.
///
/// Wraps a [`BzDecoder`] over a buffered reader of the compressed stream and
/// latches end-of-stream: once the decoder reports stream end or any error,
/// every further read returns zero bytes. Decoder failures never surface as
/// I/O errors, so a consumer simply observes a (possibly truncated) stream
/// ending normally.
pub struct Bz2Source<R: Read> {
    decoder: BzDecoder<BufReader<R>>,
    done: bool,
}

impl<R: Read> Bz2Source<R> {
    pub fn new(source: R) -> Self {
        Self {
            decoder: BzDecoder::new(BufReader::with_capacity(BZ2_BUF_SIZE, source)),
            done: false,
        }
    }
}

impl<R: Read> Read for Bz2Source<R> {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        if self.done || out.is_empty() {
            return Ok(0);
        }
        match self.decoder.read(out) {
            Ok(0) => {
                self.done = true;
                Ok(0)
            }
            Ok(count) => Ok(count),
            Err(err) => {
                debug!(error = %err, "bzip2 decode failed, ending stream");
                self.done = true;
                Ok(0)
            }
        }
    }
}
