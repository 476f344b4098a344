/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

//! Thread-blocking adapters over the async session.
//!
//! Every method drives the same state machine as the async surface on a
//! private current-thread runtime, so both call styles produce identical
//! wire traffic. Concurrent callers of a cloned session serialize on the
//! same internal mutex.

use std::io::{self, Read, Write};
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::runtime::{Builder, Runtime};

use crate::connection::FtpConnectionProvider;
use crate::control::{FtpCommand, FtpReply};
use crate::error::FtpSessionError;
use crate::transfer::{FtpTransferDescriptor, FtpTransferDirection};

fn new_runtime() -> Result<Runtime, FtpSessionError> {
    Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(FtpSessionError::TransportError)
}

pub struct FtpSession<T>
where
    T: AsyncRead + AsyncWrite + Unpin + Send,
{
    session: crate::FtpSession<T>,
    rt: Arc<Runtime>,
}

impl<T> Clone for FtpSession<T>
where
    T: AsyncRead + AsyncWrite + Unpin + Send,
{
    fn clone(&self) -> Self {
        FtpSession {
            session: self.session.clone(),
            rt: Arc::clone(&self.rt),
        }
    }
}

impl<T> FtpSession<T>
where
    T: AsyncRead + AsyncWrite + Unpin + Send,
{
    pub fn connect<P>(
        provider: &mut P,
        server_addr: SocketAddr,
        config: crate::FtpClientConfig,
    ) -> Result<Self, FtpSessionError>
    where
        P: FtpConnectionProvider<T> + Send,
    {
        let rt = new_runtime()?;
        let session = rt.block_on(crate::FtpSession::connect(provider, server_addr, config))?;
        Ok(FtpSession {
            session,
            rt: Arc::new(rt),
        })
    }

    /// Wrap an already connected control transport. The transport must have
    /// been created inside this crate's runtime context or be runtime
    /// independent; when in doubt use `connect()`.
    pub fn from_stream(
        stream: T,
        peer_addr: SocketAddr,
        config: crate::FtpClientConfig,
    ) -> Result<Self, FtpSessionError> {
        let rt = new_runtime()?;
        let session = crate::FtpSession::new(stream, peer_addr, config);
        Ok(FtpSession {
            session,
            rt: Arc::new(rt),
        })
    }

    pub fn read_greeting(&self) -> Result<FtpReply, FtpSessionError> {
        self.rt.block_on(self.session.read_greeting())
    }

    pub fn execute(&self, cmd: FtpCommand) -> Result<FtpReply, FtpSessionError> {
        self.rt.block_on(self.session.execute(cmd))
    }

    pub fn execute1(&self, cmd: FtpCommand, arg: &str) -> Result<FtpReply, FtpSessionError> {
        self.rt.block_on(self.session.execute1(cmd, arg))
    }

    pub fn delete_file(&self, path: &str) -> Result<(), FtpSessionError> {
        self.rt.block_on(self.session.delete_file(path))
    }

    pub fn request_size(&self, path: &str) -> Result<Option<u64>, FtpSessionError> {
        self.rt.block_on(self.session.request_size(path))
    }

    pub fn quit(&self) -> Result<(), FtpSessionError> {
        self.rt.block_on(self.session.quit())
    }

    pub fn open_transfer_stream<P>(
        &self,
        provider: &mut P,
        cmd: FtpCommand,
        path: &str,
        descriptor: FtpTransferDescriptor,
    ) -> Result<FtpDataStream<T>, FtpSessionError>
    where
        P: FtpConnectionProvider<T> + Send,
    {
        let inner = self
            .rt
            .block_on(
                self.session
                    .open_transfer_stream(provider, cmd, path, descriptor),
            )?;
        Ok(FtpDataStream {
            inner,
            rt: Arc::clone(&self.rt),
        })
    }

    pub fn retrieve<P>(
        &self,
        provider: &mut P,
        path: &str,
        descriptor: FtpTransferDescriptor,
    ) -> Result<FtpDataStream<T>, FtpSessionError>
    where
        P: FtpConnectionProvider<T> + Send,
    {
        let inner = self
            .rt
            .block_on(self.session.retrieve(provider, path, descriptor))?;
        Ok(FtpDataStream {
            inner,
            rt: Arc::clone(&self.rt),
        })
    }

    pub fn store<P>(
        &self,
        provider: &mut P,
        path: &str,
        descriptor: FtpTransferDescriptor,
    ) -> Result<FtpDataStream<T>, FtpSessionError>
    where
        P: FtpConnectionProvider<T> + Send,
    {
        let inner = self
            .rt
            .block_on(self.session.store(provider, path, descriptor))?;
        Ok(FtpDataStream {
            inner,
            rt: Arc::clone(&self.rt),
        })
    }
}

pub struct FtpDataStream<T>
where
    T: AsyncRead + AsyncWrite + Unpin + Send,
{
    inner: crate::FtpDataStream<T>,
    rt: Arc<Runtime>,
}

impl<T> FtpDataStream<T>
where
    T: AsyncRead + AsyncWrite + Unpin + Send,
{
    pub fn direction(&self) -> FtpTransferDirection {
        self.inner.direction()
    }

    pub fn position(&self) -> u64 {
        self.inner.position()
    }

    pub fn length(&self) -> Option<u64> {
        self.inner.length()
    }

    pub fn close(&mut self) -> Result<(), FtpSessionError> {
        self.rt.block_on(self.inner.close())
    }
}

impl<T> Read for FtpDataStream<T>
where
    T: AsyncRead + AsyncWrite + Unpin + Send,
{
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.rt.block_on(self.inner.read(buf))
    }
}

impl<T> Write for FtpDataStream<T>
where
    T: AsyncRead + AsyncWrite + Unpin + Send,
{
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.rt.block_on(self.inner.write(buf))
    }

    fn flush(&mut self) -> io::Result<()> {
        self.rt.block_on(self.inner.flush())
    }
}
