/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

//! Protocol core of an FTP/FTPS client.
//!
//! This crate implements the hard part of an FTP client: the control channel
//! (commands and multi-line numeric replies), per-transfer data channel
//! negotiation in passive or active mode, and transfer streams that keep the
//! control channel synchronized once a transfer ends. Directory listing
//! dialects, retry policies and other conveniences are left to callers.

mod debug;
pub use debug::{FTP_DEBUG_LOG_LEVEL, FTP_DEBUG_LOG_TARGET};

mod config;
pub use config::{
    FtpClientConfig, FtpControlConfig, FtpDataAddressing, FtpDataChannelMode, FtpTransferConfig,
};

mod error;
pub use error::{FtpReplyError, FtpSessionError};

mod connection;
pub use connection::{FtpConnectionProvider, FtpTcpConnector};

mod control;
pub use control::{FtpCommand, FtpReply};

mod transfer;
pub use transfer::{
    FtpDataStream, FtpFileLength, FtpTransferDescriptor, FtpTransferDirection, FtpTransferType,
};

mod session;
pub use session::FtpSession;

pub mod blocking;
