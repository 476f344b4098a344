/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::io;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufStream};

use crate::config::FtpControlConfig;
use crate::error::FtpReplyError;

mod command;
pub use command::FtpCommand;

mod reply;
pub use reply::FtpReply;
use reply::MultiLineReply;

/// The control connection of a session. Sends one command line at a time and
/// reads back exactly one reply. Reply codes are not interpreted here beyond
/// the syntactic level; that is the caller's job.
pub(crate) struct FtpControlChannel<T>
where
    T: AsyncRead + AsyncWrite,
{
    config: FtpControlConfig,
    stream: BufStream<T>,
}

impl<T> FtpControlChannel<T>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    pub(crate) fn new(stream: T, config: FtpControlConfig) -> Self {
        FtpControlChannel {
            config,
            stream: BufStream::new(stream),
        }
    }

    async fn send_all(&mut self, buf: &[u8]) -> io::Result<()> {
        #[cfg(feature = "log-raw-io")]
        crate::debug::log_cmd(unsafe { std::str::from_utf8_unchecked(buf).trim_end() });

        self.stream.write_all(buf).await?;
        self.stream.flush().await?;
        Ok(())
    }

    pub(crate) async fn send_cmd(&mut self, cmd: FtpCommand) -> io::Result<()> {
        let verb = cmd.as_str();
        let mut buf: Vec<u8> = Vec::with_capacity(verb.len() + 2);
        buf.extend_from_slice(verb.as_bytes());
        buf.extend_from_slice(b"\r\n");

        self.send_all(buf.as_ref()).await
    }

    pub(crate) async fn send_cmd1(&mut self, cmd: FtpCommand, param1: &str) -> io::Result<()> {
        let verb = cmd.as_str();
        let mut buf: Vec<u8> = Vec::with_capacity(verb.len() + 1 + param1.len() + 2);
        buf.extend_from_slice(verb.as_bytes());
        buf.push(b' ');
        buf.extend_from_slice(param1.as_bytes());
        buf.extend_from_slice(b"\r\n");

        self.send_all(buf.as_ref()).await
    }

    /// Read one LF terminated line, buffering at most `max_line_len` bytes.
    /// An over-long line fails at the cap, before the rest of it arrives.
    async fn read_line(&mut self, buf: &mut Vec<u8>) -> Result<(), FtpReplyError> {
        buf.clear();

        loop {
            let available = self
                .stream
                .fill_buf()
                .await
                .map_err(FtpReplyError::ReadFailed)?;
            if available.is_empty() {
                return if buf.is_empty() {
                    Err(FtpReplyError::ConnectionClosed)
                } else {
                    Err(FtpReplyError::UnexpectedEof)
                };
            }

            match memchr::memchr(b'\n', available) {
                Some(p) => {
                    if buf.len() + p + 1 > self.config.max_line_len {
                        return Err(FtpReplyError::LineTooLong);
                    }
                    buf.extend_from_slice(&available[..=p]);
                    self.stream.consume(p + 1);

                    #[cfg(feature = "log-raw-io")]
                    crate::debug::log_rsp(String::from_utf8_lossy(buf).trim_end());

                    return Ok(());
                }
                None => {
                    let nr = available.len();
                    if buf.len() + nr > self.config.max_line_len {
                        return Err(FtpReplyError::LineTooLong);
                    }
                    buf.extend_from_slice(available);
                    self.stream.consume(nr);
                }
            }
        }
    }

    /// Read exactly one reply, following continuation lines of a multi-line
    /// reply until the terminal line is seen.
    pub(crate) async fn read_reply(&mut self) -> Result<FtpReply, FtpReplyError> {
        let mut buf = Vec::<u8>::with_capacity(self.config.max_line_len);
        self.read_line(&mut buf).await?;
        if buf.len() < 4 {
            return Err(FtpReplyError::InvalidLineFormat);
        }

        match buf[3] {
            b' ' => FtpReply::single_line(&buf),
            b'-' => {
                let mut ml = MultiLineReply::start(&buf)?;
                for _ in 0..self.config.max_multi_lines {
                    self.read_line(&mut buf).await?;
                    if ml.feed_line(&buf)? {
                        return Ok(ml.finish());
                    }
                }
                Err(FtpReplyError::TooManyLines)
            }
            _ => Err(FtpReplyError::InvalidLineFormat),
        }
    }

    pub(crate) async fn timed_read_reply(
        &mut self,
        stage: &'static str,
    ) -> Result<FtpReply, FtpReplyError> {
        match tokio::time::timeout(self.config.command_timeout, self.read_reply()).await {
            Ok(r) => r,
            Err(_) => Err(FtpReplyError::ReadTimedOut(stage)),
        }
    }
}
