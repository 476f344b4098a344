/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadBuf};
use tokio::sync::OwnedMutexGuard;

use super::{FtpFileLength, FtpTransferDescriptor, FtpTransferDirection};
use crate::error::FtpSessionError;
use crate::log_msg;
use crate::session::{SessionInner, SessionState};

/// One side of an open data connection.
///
/// The stream keeps the session guard for its whole lifetime, so no other
/// caller can touch the control channel until the transfer completion reply
/// has been consumed. `close()` must be called when done with the transfer;
/// a stream dropped without close leaves the completion reply pending and
/// the session drains it before the next command goes out.
pub struct FtpDataStream<T>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    data: T,
    descriptor: FtpTransferDescriptor,
    position: u64,
    transferred: u64,
    length: FtpFileLength,
    end_wait_timeout: Duration,
    closed: bool,
    guard: OwnedMutexGuard<SessionInner<T>>,
}

impl<T> std::fmt::Debug for FtpDataStream<T>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FtpDataStream")
            .field("descriptor", &self.descriptor)
            .field("position", &self.position)
            .field("transferred", &self.transferred)
            .field("length", &self.length)
            .field("end_wait_timeout", &self.end_wait_timeout)
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

impl<T> FtpDataStream<T>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    pub(crate) fn new(
        data: T,
        guard: OwnedMutexGuard<SessionInner<T>>,
        descriptor: FtpTransferDescriptor,
        end_wait_timeout: Duration,
    ) -> Self {
        FtpDataStream {
            data,
            position: descriptor.restart_offset,
            transferred: 0,
            length: descriptor.length,
            end_wait_timeout,
            closed: false,
            descriptor,
            guard,
        }
    }

    pub fn direction(&self) -> FtpTransferDirection {
        self.descriptor.direction
    }

    /// Current byte position. Starts at the restart offset and only moves
    /// forward.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Length of the transferred file, if it may be and has been determined.
    pub fn length(&self) -> Option<u64> {
        match self.length {
            FtpFileLength::Known(n) => Some(n),
            FtpFileLength::Unknown | FtpFileLength::Irrelevant => None,
        }
    }

    async fn drain_data(&mut self) {
        let mut scratch = [0u8; 4096];
        loop {
            match self.data.read(&mut scratch).await {
                Ok(0) | Err(_) => break,
                Ok(_) => {}
            }
        }
    }

    /// Close the data connection and resynchronize the control channel.
    ///
    /// Idempotent. Exactly one completion reply is consumed and the session
    /// goes back to idle even when the reply signals a failed transfer; in
    /// that case the failure is returned as `CommandFailed` but the session
    /// stays usable.
    pub async fn close(&mut self) -> Result<(), FtpSessionError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        match self.descriptor.direction {
            FtpTransferDirection::Upload => {
                if let FtpFileLength::Unknown = self.length {
                    self.length = FtpFileLength::Known(self.transferred);
                }
                let _ = self.data.shutdown().await;
            }
            FtpTransferDirection::Download => {
                // let the server finish its side so the completion reply
                // can arrive; errors here do not matter, the socket may
                // already be gone
                let _ = tokio::time::timeout(self.end_wait_timeout, self.drain_data()).await;
                let _ = self.data.shutdown().await;
            }
        }

        let inner = &mut *self.guard;
        let reply = match inner.control.timed_read_reply("transfer completion").await {
            Ok(reply) => reply,
            Err(e) => {
                inner.state = SessionState::Disconnected;
                return Err(e.into());
            }
        };
        inner.state = SessionState::Idle;

        if reply.success() {
            Ok(())
        } else {
            Err(FtpSessionError::CommandFailed(reply))
        }
    }
}

impl<T> AsyncRead for FtpDataStream<T>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        if this.descriptor.direction != FtpTransferDirection::Download {
            return Poll::Ready(Err(io::ErrorKind::Unsupported.into()));
        }
        if buf.remaining() == 0 {
            return Poll::Ready(Ok(()));
        }

        let filled = buf.filled().len();
        match Pin::new(&mut this.data).poll_read(cx, buf) {
            Poll::Ready(Ok(())) => {
                let nr = buf.filled().len() - filled;
                if nr == 0 {
                    // end of data seen, an unknown length is now known
                    if let FtpFileLength::Unknown = this.length {
                        this.length = FtpFileLength::Known(this.transferred);
                    }
                } else {
                    this.position += nr as u64;
                    this.transferred += nr as u64;
                }
                Poll::Ready(Ok(()))
            }
            other => other,
        }
    }
}

impl<T> AsyncWrite for FtpDataStream<T>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        if this.descriptor.direction != FtpTransferDirection::Upload {
            return Poll::Ready(Err(io::ErrorKind::Unsupported.into()));
        }

        match Pin::new(&mut this.data).poll_write(cx, buf) {
            Poll::Ready(Ok(nr)) => {
                this.position += nr as u64;
                this.transferred += nr as u64;
                Poll::Ready(Ok(nr))
            }
            other => other,
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().data).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().data).poll_shutdown(cx)
    }
}

impl<T> Drop for FtpDataStream<T>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    fn drop(&mut self) {
        if !self.closed {
            log_msg!(
                "{:?} stream dropped without close, completion reply left pending",
                self.descriptor.direction
            );
        }
    }
}
