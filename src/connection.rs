/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::io;
use std::net::SocketAddr;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};

/// Produces the transports a session runs on.
///
/// A provider that wants protected data channels (FTPS `PROT P`) wraps the
/// returned transports in TLS; the session itself never touches encryption.
/// Errors from other sources should be wrapped with [`io::Error::other`].
#[async_trait]
pub trait FtpConnectionProvider<T: AsyncRead + AsyncWrite + Send> {
    async fn new_control_connection(&mut self, server_addr: SocketAddr) -> io::Result<T>;
    /// Open a data connection to the endpoint from a passive mode reply.
    async fn new_data_connection(&mut self, server_addr: SocketAddr) -> io::Result<T>;
    /// Accept the data connection the server opens in active mode.
    async fn accept_data_connection(&mut self, listener: TcpListener) -> io::Result<T>;
}

/// Plain TCP connections, no encryption.
#[derive(Default)]
pub struct FtpTcpConnector;

#[async_trait]
impl FtpConnectionProvider<TcpStream> for FtpTcpConnector {
    async fn new_control_connection(&mut self, server_addr: SocketAddr) -> io::Result<TcpStream> {
        TcpStream::connect(server_addr).await
    }

    async fn new_data_connection(&mut self, server_addr: SocketAddr) -> io::Result<TcpStream> {
        TcpStream::connect(server_addr).await
    }

    async fn accept_data_connection(&mut self, listener: TcpListener) -> io::Result<TcpStream> {
        let (stream, _addr) = listener.accept().await?;
        Ok(stream)
    }
}
