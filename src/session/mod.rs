/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::future::Future;
use std::io;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio_util::sync::CancellationToken;

use crate::config::{FtpClientConfig, FtpDataAddressing, FtpDataChannelMode};
use crate::connection::FtpConnectionProvider;
use crate::control::{FtpCommand, FtpControlChannel, FtpReply};
use crate::error::{FtpReplyError, FtpSessionError};
use crate::log_msg;
use crate::transfer::{
    FtpDataStream, FtpFileLength, FtpTransferDescriptor, FtpTransferDirection, FtpTransferType,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SessionState {
    Disconnected,
    Idle,
    AwaitingDataReply,
}

pub(crate) struct SessionInner<T>
where
    T: AsyncRead + AsyncWrite,
{
    pub(crate) control: FtpControlChannel<T>,
    pub(crate) state: SessionState,
}

impl<T> SessionInner<T>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    /// Bring the session back to idle before a new command goes out.
    ///
    /// A transfer stream dropped without `close()` leaves its completion
    /// reply unread; consume and discard it here so the next command and its
    /// reply stay paired up.
    async fn resync(&mut self) -> Result<(), FtpSessionError> {
        match self.state {
            SessionState::Idle => Ok(()),
            SessionState::Disconnected => Err(FtpSessionError::NotConnected),
            SessionState::AwaitingDataReply => {
                match self.control.timed_read_reply("resynchronize").await {
                    Ok(reply) => {
                        log_msg!("discarded stale completion reply {}", reply.code());
                        self.state = SessionState::Idle;
                        Ok(())
                    }
                    Err(e) => {
                        self.state = SessionState::Disconnected;
                        Err(e.into())
                    }
                }
            }
        }
    }

    /// Send one command and read back its reply. The reply is returned as-is,
    /// whatever its code; transport and parse failures mark the session
    /// disconnected.
    async fn exchange(
        &mut self,
        cmd: FtpCommand,
        arg: Option<&str>,
        stage: &'static str,
    ) -> Result<FtpReply, FtpSessionError> {
        debug_assert_eq!(self.state, SessionState::Idle);
        let sent = match arg {
            Some(arg) => self.control.send_cmd1(cmd, arg).await,
            None => self.control.send_cmd(cmd).await,
        };
        if let Err(e) = sent {
            self.state = SessionState::Disconnected;
            return Err(FtpSessionError::TransportError(e));
        }
        match self.control.timed_read_reply(stage).await {
            Ok(reply) => Ok(reply),
            Err(e) => {
                self.state = SessionState::Disconnected;
                Err(e.into())
            }
        }
    }

    async fn exchange_checked(
        &mut self,
        cmd: FtpCommand,
        arg: Option<&str>,
        stage: &'static str,
    ) -> Result<FtpReply, FtpSessionError> {
        let reply = self.exchange(cmd, arg, stage).await?;
        if reply.success() {
            Ok(reply)
        } else {
            Err(FtpSessionError::CommandFailed(reply))
        }
    }

    /// A transfer command went out but its data connection will never be
    /// used. Consume the completion reply so the session stays usable.
    async fn abort_pending_transfer(&mut self) {
        match self.control.timed_read_reply("abort pending transfer").await {
            Ok(reply) => {
                log_msg!("aborted transfer finished with reply {}", reply.code());
                self.state = SessionState::Idle;
            }
            Err(_) => self.state = SessionState::Disconnected,
        }
    }
}

fn validate_arg(arg: &str) -> Result<(), FtpSessionError> {
    if arg.is_empty() {
        return Err(FtpSessionError::InvalidArgument("argument is empty"));
    }
    if arg.bytes().any(|b| b == b'\r' || b == b'\n' || b == 0) {
        return Err(FtpSessionError::InvalidArgument(
            "argument contains control characters",
        ));
    }
    Ok(())
}

fn parse_size_reply(reply: &FtpReply) -> Result<Option<u64>, FtpSessionError> {
    if !reply.success() {
        return Ok(None);
    }
    let size = reply
        .message()
        .trim()
        .parse::<u64>()
        .map_err(|_| FtpSessionError::ProtocolViolation(FtpReplyError::InvalidReplySyntax))?;
    Ok(Some(size))
}

fn check_cancelled(cancel: Option<&CancellationToken>) -> Result<(), FtpSessionError> {
    if cancel.is_some_and(|t| t.is_cancelled()) {
        Err(FtpSessionError::Cancelled)
    } else {
        Ok(())
    }
}

/// Run a socket wait, aborting it if the token fires first.
async fn io_with_cancel<F, O>(
    cancel: Option<&CancellationToken>,
    fut: F,
) -> Result<O, FtpSessionError>
where
    F: Future<Output = Result<O, FtpSessionError>>,
{
    match cancel {
        None => fut.await,
        Some(token) => {
            tokio::select! {
                biased;
                _ = token.cancelled() => Err(FtpSessionError::Cancelled),
                r = fut => r,
            }
        }
    }
}

/// One FTP session: a control connection plus at most one open data
/// connection at a time.
///
/// The session is cheap to clone and safe to share; all operations serialize
/// on an internal async mutex, and a transfer holds that mutex from its first
/// preparatory command until its stream is closed. The cancellable variants
/// may abort while waiting for the mutex or for data channel sockets, but a
/// transfer command that already went out always gets its completion reply
/// consumed before the cancellation surfaces.
pub struct FtpSession<T>
where
    T: AsyncRead + AsyncWrite,
{
    inner: Arc<Mutex<SessionInner<T>>>,
    peer_addr: SocketAddr,
    config: Arc<FtpClientConfig>,
}

impl<T> Clone for FtpSession<T>
where
    T: AsyncRead + AsyncWrite,
{
    fn clone(&self) -> Self {
        FtpSession {
            inner: Arc::clone(&self.inner),
            peer_addr: self.peer_addr,
            config: Arc::clone(&self.config),
        }
    }
}

impl<T> FtpSession<T>
where
    T: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Build a session over an already connected control transport.
    /// `peer_addr` is the control connection peer; extended passive replies
    /// only carry a port and reuse its host.
    pub fn new(stream: T, peer_addr: SocketAddr, config: FtpClientConfig) -> Self {
        let control = FtpControlChannel::new(stream, config.control.clone());
        FtpSession {
            inner: Arc::new(Mutex::new(SessionInner {
                control,
                state: SessionState::Idle,
            })),
            peer_addr,
            config: Arc::new(config),
        }
    }

    pub async fn connect<P>(
        provider: &mut P,
        server_addr: SocketAddr,
        config: FtpClientConfig,
    ) -> Result<Self, FtpSessionError>
    where
        P: FtpConnectionProvider<T> + Send,
    {
        let stream = provider
            .new_control_connection(server_addr)
            .await
            .map_err(FtpSessionError::TransportError)?;
        Ok(FtpSession::new(stream, server_addr, config))
    }

    async fn lock(
        &self,
        cancel: Option<&CancellationToken>,
    ) -> Result<OwnedMutexGuard<SessionInner<T>>, FtpSessionError> {
        io_with_cancel(cancel, async { Ok(self.inner.clone().lock_owned().await) }).await
    }

    /// Consume the server banner. 120 marks a delayed service and is waited
    /// out; any other preliminary or positive code is returned.
    pub async fn read_greeting(&self) -> Result<FtpReply, FtpSessionError> {
        let mut inner = self.lock(None).await?;
        if inner.state == SessionState::Disconnected {
            return Err(FtpSessionError::NotConnected);
        }
        loop {
            let reply = match inner.control.timed_read_reply("greeting").await {
                Ok(reply) => reply,
                Err(e) => {
                    inner.state = SessionState::Disconnected;
                    return Err(e.into());
                }
            };
            match reply.code() {
                120 => continue,
                _ if reply.success() => return Ok(reply),
                _ => return Err(FtpSessionError::CommandFailed(reply)),
            }
        }
    }

    async fn execute_args(
        &self,
        cmd: FtpCommand,
        arg: Option<&str>,
        cancel: Option<&CancellationToken>,
    ) -> Result<FtpReply, FtpSessionError> {
        if let Some(arg) = arg {
            validate_arg(arg)?;
        }
        let mut inner = self.lock(cancel).await?;
        inner.resync().await?;
        check_cancelled(cancel)?;
        inner.exchange(cmd, arg, "execute command").await
    }

    /// Send a bare command and return its reply, whatever the code.
    pub async fn execute(&self, cmd: FtpCommand) -> Result<FtpReply, FtpSessionError> {
        self.execute_args(cmd, None, None).await
    }

    /// Send a command with one argument and return its reply.
    pub async fn execute1(&self, cmd: FtpCommand, arg: &str) -> Result<FtpReply, FtpSessionError> {
        self.execute_args(cmd, Some(arg), None).await
    }

    pub async fn execute_with_cancel(
        &self,
        cmd: FtpCommand,
        cancel: &CancellationToken,
    ) -> Result<FtpReply, FtpSessionError> {
        self.execute_args(cmd, None, Some(cancel)).await
    }

    pub async fn execute1_with_cancel(
        &self,
        cmd: FtpCommand,
        arg: &str,
        cancel: &CancellationToken,
    ) -> Result<FtpReply, FtpSessionError> {
        self.execute_args(cmd, Some(arg), Some(cancel)).await
    }

    pub async fn delete_file(&self, path: &str) -> Result<(), FtpSessionError> {
        let reply = self.execute1(FtpCommand::DELE, path).await?;
        if reply.success() {
            Ok(())
        } else {
            Err(FtpSessionError::CommandFailed(reply))
        }
    }

    /// SIZE query. A failure reply means the server can not tell (no SIZE
    /// support, missing file) and maps to `None`.
    pub async fn request_size(&self, path: &str) -> Result<Option<u64>, FtpSessionError> {
        let reply = self.execute1(FtpCommand::SIZE, path).await?;
        parse_size_reply(&reply)
    }

    pub async fn quit(&self) -> Result<(), FtpSessionError> {
        let mut inner = self.lock(None).await?;
        inner.resync().await?;
        let reply = inner.exchange(FtpCommand::QUIT, None, "quit").await?;
        inner.state = SessionState::Disconnected;
        if reply.success() {
            Ok(())
        } else {
            Err(FtpSessionError::CommandFailed(reply))
        }
    }

    async fn negotiate_passive(
        &self,
        inner: &mut SessionInner<T>,
    ) -> Result<SocketAddr, FtpSessionError> {
        match self.config.transfer.addressing {
            FtpDataAddressing::Extended => self.request_epsv(inner).await,
            FtpDataAddressing::Basic => self.request_pasv(inner).await,
            FtpDataAddressing::Auto => match self.request_epsv(inner).await {
                Err(FtpSessionError::CommandFailed(_)) => self.request_pasv(inner).await,
                r => r,
            },
        }
    }

    async fn request_epsv(
        &self,
        inner: &mut SessionInner<T>,
    ) -> Result<SocketAddr, FtpSessionError> {
        let reply = inner
            .exchange_checked(FtpCommand::EPSV, None, "request extended passive")
            .await?;
        let port = reply
            .parse_epsv_229()
            .ok_or(FtpSessionError::ProtocolViolation(FtpReplyError::InvalidReplySyntax))?;
        Ok(SocketAddr::new(self.peer_addr.ip(), port))
    }

    async fn request_pasv(
        &self,
        inner: &mut SessionInner<T>,
    ) -> Result<SocketAddr, FtpSessionError> {
        let reply = inner
            .exchange_checked(FtpCommand::PASV, None, "request passive")
            .await?;
        reply
            .parse_pasv_227()
            .ok_or(FtpSessionError::ProtocolViolation(FtpReplyError::InvalidReplySyntax))
    }

    async fn announce_active(
        &self,
        inner: &mut SessionInner<T>,
        local: SocketAddr,
    ) -> Result<(), FtpSessionError> {
        match self.config.transfer.addressing {
            FtpDataAddressing::Extended => self.request_eprt(inner, local).await,
            FtpDataAddressing::Basic => self.request_port(inner, local).await,
            FtpDataAddressing::Auto => match self.request_eprt(inner, local).await {
                Err(FtpSessionError::CommandFailed(_)) => self.request_port(inner, local).await,
                r => r,
            },
        }
    }

    async fn request_eprt(
        &self,
        inner: &mut SessionInner<T>,
        local: SocketAddr,
    ) -> Result<(), FtpSessionError> {
        let proto = match local.ip() {
            IpAddr::V4(_) => 1,
            IpAddr::V6(_) => 2,
        };
        let arg = format!("|{}|{}|{}|", proto, local.ip(), local.port());
        inner
            .exchange_checked(FtpCommand::EPRT, Some(arg.as_str()), "request extended active")
            .await?;
        Ok(())
    }

    async fn request_port(
        &self,
        inner: &mut SessionInner<T>,
        local: SocketAddr,
    ) -> Result<(), FtpSessionError> {
        let IpAddr::V4(ip) = local.ip() else {
            return Err(FtpSessionError::InvalidArgument(
                "PORT needs an IPv4 local address",
            ));
        };
        let o = ip.octets();
        let arg = format!(
            "{},{},{},{},{},{}",
            o[0],
            o[1],
            o[2],
            o[3],
            local.port() >> 8,
            local.port() & 0xff
        );
        inner
            .exchange_checked(FtpCommand::PORT, Some(arg.as_str()), "request active")
            .await?;
        Ok(())
    }

    fn check_transfer_config(&self) -> Result<(), FtpSessionError> {
        let transfer = &self.config.transfer;
        if transfer.mode == FtpDataChannelMode::Active && transfer.active_bind_ip.is_unspecified() {
            return Err(FtpSessionError::InvalidArgument(
                "active mode needs a configured local address",
            ));
        }
        Ok(())
    }

    async fn open_stream_args<P>(
        &self,
        provider: &mut P,
        cmd: FtpCommand,
        path: &str,
        descriptor: FtpTransferDescriptor,
        cancel: Option<&CancellationToken>,
    ) -> Result<FtpDataStream<T>, FtpSessionError>
    where
        P: FtpConnectionProvider<T> + Send,
    {
        validate_arg(path)?;
        self.check_transfer_config()?;

        let mut inner = self.lock(cancel).await?;
        inner.resync().await?;
        check_cancelled(cancel)?;

        self.open_stream_locked(inner, provider, cmd, path, descriptor, cancel)
            .await
    }

    async fn open_stream_locked<P>(
        &self,
        mut inner: OwnedMutexGuard<SessionInner<T>>,
        provider: &mut P,
        cmd: FtpCommand,
        path: &str,
        descriptor: FtpTransferDescriptor,
        cancel: Option<&CancellationToken>,
    ) -> Result<FtpDataStream<T>, FtpSessionError>
    where
        P: FtpConnectionProvider<T> + Send,
    {
        let transfer = &self.config.transfer;

        let type_cmd = match descriptor.transfer_type {
            FtpTransferType::Ascii => FtpCommand::TYPE_A,
            FtpTransferType::Image => FtpCommand::TYPE_I,
        };
        inner
            .exchange_checked(type_cmd, None, "set transfer type")
            .await?;

        if descriptor.restart_offset > 0 {
            let offset = descriptor.restart_offset.to_string();
            inner
                .exchange_checked(FtpCommand::REST, Some(offset.as_str()), "set restart offset")
                .await?;
        }
        check_cancelled(cancel)?;

        match transfer.mode {
            FtpDataChannelMode::Passive => {
                let data_addr = self.negotiate_passive(&mut inner).await?;

                let data = io_with_cancel(cancel, async {
                    match tokio::time::timeout(
                        transfer.data_connect_timeout,
                        provider.new_data_connection(data_addr),
                    )
                    .await
                    {
                        Ok(Ok(stream)) => Ok(stream),
                        Ok(Err(e)) => Err(FtpSessionError::TransportError(e)),
                        Err(_) => Err(FtpSessionError::TransportError(
                            io::ErrorKind::TimedOut.into(),
                        )),
                    }
                })
                .await?;
                check_cancelled(cancel)?;

                let reply = inner.exchange(cmd, Some(path), "start transfer").await?;
                if !reply.success() {
                    // data connection is dropped here, nothing is pending
                    return Err(FtpSessionError::CommandFailed(reply));
                }
                inner.state = SessionState::AwaitingDataReply;

                if cancel.is_some_and(|t| t.is_cancelled()) {
                    drop(data);
                    inner.abort_pending_transfer().await;
                    return Err(FtpSessionError::Cancelled);
                }

                Ok(FtpDataStream::new(
                    data,
                    inner,
                    descriptor,
                    transfer.end_wait_timeout,
                ))
            }
            FtpDataChannelMode::Active => {
                let listener = TcpListener::bind((transfer.active_bind_ip, 0))
                    .await
                    .map_err(FtpSessionError::TransportError)?;
                let local = listener
                    .local_addr()
                    .map_err(FtpSessionError::TransportError)?;
                self.announce_active(&mut inner, local).await?;
                check_cancelled(cancel)?;

                let reply = inner.exchange(cmd, Some(path), "start transfer").await?;
                if !reply.success() {
                    return Err(FtpSessionError::CommandFailed(reply));
                }
                inner.state = SessionState::AwaitingDataReply;

                let accepted = io_with_cancel(cancel, async {
                    match tokio::time::timeout(
                        transfer.data_accept_timeout,
                        provider.accept_data_connection(listener),
                    )
                    .await
                    {
                        Ok(Ok(stream)) => Ok(stream),
                        Ok(Err(e)) => Err(FtpSessionError::TransportError(e)),
                        Err(_) => Err(FtpSessionError::TransportError(
                            io::ErrorKind::TimedOut.into(),
                        )),
                    }
                })
                .await;
                match accepted {
                    Ok(data) => Ok(FtpDataStream::new(
                        data,
                        inner,
                        descriptor,
                        transfer.end_wait_timeout,
                    )),
                    Err(e) => {
                        // the server was already told to transfer; drain the
                        // completion reply before giving the session back
                        inner.abort_pending_transfer().await;
                        Err(e)
                    }
                }
            }
        }
    }

    /// Negotiate a data channel, send `cmd path` and hand out the stream.
    ///
    /// The returned stream owns the session until closed. On any failure the
    /// session is left idle with no data connection open.
    pub async fn open_transfer_stream<P>(
        &self,
        provider: &mut P,
        cmd: FtpCommand,
        path: &str,
        descriptor: FtpTransferDescriptor,
    ) -> Result<FtpDataStream<T>, FtpSessionError>
    where
        P: FtpConnectionProvider<T> + Send,
    {
        self.open_stream_args(provider, cmd, path, descriptor, None)
            .await
    }

    pub async fn open_transfer_stream_with_cancel<P>(
        &self,
        provider: &mut P,
        cmd: FtpCommand,
        path: &str,
        descriptor: FtpTransferDescriptor,
        cancel: &CancellationToken,
    ) -> Result<FtpDataStream<T>, FtpSessionError>
    where
        P: FtpConnectionProvider<T> + Send,
    {
        self.open_stream_args(provider, cmd, path, descriptor, Some(cancel))
            .await
    }

    /// Open `path` for reading. An `Unknown` length is resolved with a SIZE
    /// query up front; `Irrelevant` skips the query entirely.
    pub async fn retrieve<P>(
        &self,
        provider: &mut P,
        path: &str,
        mut descriptor: FtpTransferDescriptor,
    ) -> Result<FtpDataStream<T>, FtpSessionError>
    where
        P: FtpConnectionProvider<T> + Send,
    {
        descriptor.direction = FtpTransferDirection::Download;
        validate_arg(path)?;
        self.check_transfer_config()?;

        let mut inner = self.lock(None).await?;
        inner.resync().await?;

        // resolve the length inside the same session window as the transfer
        // setup; a concurrent caller can not slip a command in between
        if descriptor.length == FtpFileLength::Unknown {
            let reply = inner
                .exchange(FtpCommand::SIZE, Some(path), "request size")
                .await?;
            if let Some(size) = parse_size_reply(&reply)? {
                descriptor.length = FtpFileLength::Known(size);
            }
        }
        self.open_stream_locked(inner, provider, FtpCommand::RETR, path, descriptor, None)
            .await
    }

    /// Open `path` for writing.
    pub async fn store<P>(
        &self,
        provider: &mut P,
        path: &str,
        mut descriptor: FtpTransferDescriptor,
    ) -> Result<FtpDataStream<T>, FtpSessionError>
    where
        P: FtpConnectionProvider<T> + Send,
    {
        descriptor.direction = FtpTransferDirection::Upload;
        self.open_stream_args(provider, FtpCommand::STOR, path, descriptor, None)
            .await
    }
}
