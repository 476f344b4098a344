/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::io;

use thiserror::Error;

/// Errors hit while reading or parsing a single control channel reply.
#[derive(Debug, Error)]
pub enum FtpReplyError {
    #[error("read failed: {0:?}")]
    ReadFailed(io::Error),
    #[error("connection closed")]
    ConnectionClosed,
    #[error("connection closed with a partial reply pending")]
    UnexpectedEof,
    #[error("line too long")]
    LineTooLong,
    #[error("invalid line format")]
    InvalidLineFormat,
    #[error("invalid reply code {0}")]
    InvalidReplyCode(u16),
    #[error("line is not utf8")]
    LineIsNotUtf8,
    #[error("too many lines")]
    TooManyLines,
    #[error("reply payload does not match the expected syntax")]
    InvalidReplySyntax,
    #[error("read reply for stage '{0}' timed out")]
    ReadTimedOut(&'static str),
}

impl FtpReplyError {
    /// True if the underlying transport failed, as opposed to the peer
    /// sending bytes that do not form a valid reply.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            FtpReplyError::ReadFailed(_)
                | FtpReplyError::ConnectionClosed
                | FtpReplyError::ReadTimedOut(_)
        )
    }
}
