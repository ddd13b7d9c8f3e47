//! Dedicated writer task for outgoing frames.
//!
//! Request senders never touch the socket: they hand frames to an mpsc
//! channel and a single task owns the write half. Enqueueing is synchronous
//! (unbounded channel), so a request can be queued inside the same critical
//! section that allocates its ticket; URI searches rely on wire order
//! matching allocation order.
//!
//! ```text
//! issue()  ─┐
//! cancel() ─┼─► UnboundedSender<OutboundFrame> ─► writer task ─► socket
//! ...      ─┘
//! ```
//!
//! The task batches whatever is already queued and writes it with a single
//! vectored syscall where possible.

use std::io::IoSlice;

use bytes::Bytes;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::{GrailError, Result};
use crate::protocol::LENGTH_PREFIX_SIZE;

/// Maximum frames folded into one vectored write.
const MAX_BATCH_SIZE: usize = 64;

/// A frame ready to be written: pre-encoded length prefix plus payload.
#[derive(Debug)]
pub struct OutboundFrame {
    prefix: [u8; LENGTH_PREFIX_SIZE],
    payload: Bytes,
}

impl OutboundFrame {
    /// Wrap a payload (control code first) for sending.
    pub fn new(payload: Bytes) -> Self {
        Self {
            prefix: (payload.len() as u32).to_be_bytes(),
            payload,
        }
    }

    /// Total wire size of this frame.
    #[inline]
    pub fn size(&self) -> usize {
        LENGTH_PREFIX_SIZE + self.payload.len()
    }
}

/// Cheaply cloneable handle for queueing frames to the writer task.
#[derive(Clone)]
pub struct WriterHandle {
    tx: mpsc::UnboundedSender<OutboundFrame>,
}

impl WriterHandle {
    /// Queue a frame. Fails once the writer task has shut down.
    pub fn send(&self, frame: OutboundFrame) -> Result<()> {
        self.tx.send(frame).map_err(|_| GrailError::NotConnected)
    }

    /// A handle with no writer task behind it; every send fails.
    ///
    /// Used by connections whose handshake never completed.
    pub(crate) fn detached() -> Self {
        let (tx, _) = mpsc::unbounded_channel();
        Self { tx }
    }
}

/// Spawn the writer task over the given write half.
pub fn spawn_writer_task<W>(writer: W) -> (WriterHandle, JoinHandle<Result<()>>)
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::unbounded_channel();
    let task = tokio::spawn(writer_loop(rx, writer));
    (WriterHandle { tx }, task)
}

async fn writer_loop<W>(
    mut rx: mpsc::UnboundedReceiver<OutboundFrame>,
    mut writer: W,
) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    loop {
        let first = match rx.recv().await {
            Some(f) => f,
            // All handles dropped: clean shutdown.
            None => return Ok(()),
        };

        let mut batch = Vec::with_capacity(MAX_BATCH_SIZE);
        batch.push(first);
        while batch.len() < MAX_BATCH_SIZE {
            match rx.try_recv() {
                Ok(frame) => batch.push(frame),
                Err(_) => break,
            }
        }

        write_batch(&mut writer, &batch).await?;
    }
}

/// Write a batch of frames with scatter/gather I/O.
async fn write_batch<W>(writer: &mut W, batch: &[OutboundFrame]) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    if batch.is_empty() {
        return Ok(());
    }

    let mut slices: Vec<IoSlice<'_>> = Vec::with_capacity(batch.len() * 2);
    for frame in batch {
        slices.push(IoSlice::new(&frame.prefix));
        if !frame.payload.is_empty() {
            slices.push(IoSlice::new(&frame.payload));
        }
    }

    let total_size: usize = batch.iter().map(|f| f.size()).sum();

    let written = writer.write_vectored(&slices).await?;
    if written == 0 {
        return Err(GrailError::Io(std::io::Error::new(
            std::io::ErrorKind::WriteZero,
            "write_vectored returned 0",
        )));
    }

    // Partial write: continue with whatever remains.
    let mut total_written = written;
    while total_written < total_size {
        let remaining = build_remaining_slices(batch, total_written);
        if remaining.is_empty() {
            break;
        }

        let written = writer.write_vectored(&remaining).await?;
        if written == 0 {
            return Err(GrailError::Io(std::io::Error::new(
                std::io::ErrorKind::WriteZero,
                "write_vectored returned 0",
            )));
        }
        total_written += written;
    }

    writer.flush().await?;
    Ok(())
}

/// Rebuild the IoSlice array after `skip_bytes` were already written.
fn build_remaining_slices(batch: &[OutboundFrame], skip_bytes: usize) -> Vec<IoSlice<'_>> {
    let mut slices = Vec::with_capacity(batch.len() * 2);
    let mut skipped = 0;

    for frame in batch {
        let prefix_end = skipped + LENGTH_PREFIX_SIZE;
        if skip_bytes < prefix_end {
            let start = skip_bytes.saturating_sub(skipped);
            slices.push(IoSlice::new(&frame.prefix[start..]));
        }
        skipped = prefix_end;

        if !frame.payload.is_empty() {
            let payload_end = skipped + frame.payload.len();
            if skip_bytes < payload_end {
                let start = skip_bytes.saturating_sub(skipped);
                slices.push(IoSlice::new(&frame.payload[start..]));
            }
            skipped = payload_end;
        }
    }

    slices
}
