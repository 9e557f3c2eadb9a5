//! Cancellation for file work running on the blocking pool.
//!
//! Dropping the future that awaits a `spawn_blocking` task does not stop the
//! task. Copies that end in a rename over a live file therefore check a
//! [`CancelFlag`] between chunks and right before the rename, and give up
//! once their caller has stopped waiting.

use std::io::{self, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

const COPY_CHUNK_SIZE: usize = 64 * 1024;

/// Shared flag telling a blocking worker to stop.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Error for the worker to return when it notices the flag.
    pub fn check(&self) -> io::Result<()> {
        if self.is_cancelled() {
            Err(io::Error::new(io::ErrorKind::Interrupted, "cancelled"))
        } else {
            Ok(())
        }
    }

    /// Guard that cancels the flag when dropped, e.g. when the awaiting
    /// future is dropped by a timeout.
    pub fn cancel_on_drop(&self) -> CancelOnDrop {
        CancelOnDrop(self.clone())
    }
}

#[derive(Debug)]
pub struct CancelOnDrop(CancelFlag);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.cancel();
    }
}

/// `io::copy` that stops between chunks once `cancel` is set.
pub fn copy_cancellable<R, W>(reader: &mut R, writer: &mut W, cancel: &CancelFlag) -> io::Result<u64>
where
    R: Read + ?Sized,
    W: Write + ?Sized,
{
    let mut buffer = vec![0u8; COPY_CHUNK_SIZE];
    let mut copied = 0u64;

    loop {
        cancel.check()?;
        let read = match reader.read(&mut buffer) {
            Ok(0) => return Ok(copied),
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted && !cancel.is_cancelled() => continue,
            Err(e) => return Err(e),
        };
        writer.write_all(&buffer[..read])?;
        copied += read as u64;
    }
}
