/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

mod stream;
pub use stream::FtpDataStream;

/// Representation type set before a transfer (`TYPE A` / `TYPE I`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FtpTransferType {
    Ascii,
    #[default]
    Image,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FtpTransferDirection {
    Download,
    Upload,
}

/// How much is known about the length of the transferred file.
///
/// This tri-state is a contract: `Irrelevant` means the length must never be
/// determined or reported, `Unknown` means it becomes known once end of data
/// is observed. Do not collapse it to an optional integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FtpFileLength {
    Irrelevant,
    #[default]
    Unknown,
    Known(u64),
}

impl FtpFileLength {
    /// Map the conventional raw encoding: -1 irrelevant, 0 unknown,
    /// positive known.
    pub fn from_raw(v: i64) -> Self {
        match v {
            ..=-1 => FtpFileLength::Irrelevant,
            0 => FtpFileLength::Unknown,
            n => FtpFileLength::Known(n as u64),
        }
    }

    pub fn as_raw(&self) -> i64 {
        match self {
            FtpFileLength::Irrelevant => -1,
            FtpFileLength::Unknown => 0,
            FtpFileLength::Known(n) => *n as i64,
        }
    }
}

/// Parameters of one transfer. Owned by the data stream it configures.
#[derive(Debug, Clone, Copy)]
pub struct FtpTransferDescriptor {
    pub direction: FtpTransferDirection,
    pub transfer_type: FtpTransferType,
    pub restart_offset: u64,
    pub length: FtpFileLength,
}

impl FtpTransferDescriptor {
    pub fn download() -> Self {
        FtpTransferDescriptor {
            direction: FtpTransferDirection::Download,
            transfer_type: FtpTransferType::default(),
            restart_offset: 0,
            length: FtpFileLength::default(),
        }
    }

    pub fn upload() -> Self {
        FtpTransferDescriptor {
            direction: FtpTransferDirection::Upload,
            transfer_type: FtpTransferType::default(),
            restart_offset: 0,
            length: FtpFileLength::Irrelevant,
        }
    }

    pub fn with_restart_offset(mut self, offset: u64) -> Self {
        self.restart_offset = offset;
        self
    }

    pub fn with_transfer_type(mut self, t: FtpTransferType) -> Self {
        self.transfer_type = t;
        self
    }

    pub fn with_length(mut self, length: FtpFileLength) -> Self {
        self.length = length;
        self
    }
}
