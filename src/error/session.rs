/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::io;

use thiserror::Error;

use super::FtpReplyError;
use crate::control::FtpReply;

/// Error taxonomy of the session surface.
///
/// `CommandFailed` is the only recoverable variant: the session stays usable
/// for the next command. `ProtocolViolation` and `TransportError` leave the
/// control channel in an unusable state and the caller has to reconnect.
#[derive(Debug, Error)]
pub enum FtpSessionError {
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),
    #[error("protocol violation: {0}")]
    ProtocolViolation(FtpReplyError),
    #[error("command failed: {0}")]
    CommandFailed(FtpReply),
    #[error("transport error: {0:?}")]
    TransportError(io::Error),
    #[error("operation cancelled")]
    Cancelled,
    #[error("session is not connected")]
    NotConnected,
}

impl From<FtpReplyError> for FtpSessionError {
    fn from(e: FtpReplyError) -> Self {
        match e {
            FtpReplyError::ReadFailed(e) => FtpSessionError::TransportError(e),
            FtpReplyError::ConnectionClosed => {
                FtpSessionError::TransportError(io::ErrorKind::UnexpectedEof.into())
            }
            FtpReplyError::ReadTimedOut(_) => {
                FtpSessionError::TransportError(io::ErrorKind::TimedOut.into())
            }
            e => FtpSessionError::ProtocolViolation(e),
        }
    }
}

impl From<io::Error> for FtpSessionError {
    fn from(e: io::Error) -> Self {
        FtpSessionError::TransportError(e)
    }
}

impl FtpSessionError {
    /// True if the control channel can not be used for further commands.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            FtpSessionError::ProtocolViolation(_)
                | FtpSessionError::TransportError(_)
                | FtpSessionError::NotConnected
        )
    }

    pub fn reply(&self) -> Option<&FtpReply> {
        match self {
            FtpSessionError::CommandFailed(reply) => Some(reply),
            _ => None,
        }
    }
}
