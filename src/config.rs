/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

const DEFAULT_MAX_LINE_LEN: usize = 2048;
const DEFAULT_MAX_MULTI_LINES: usize = 64;

/// Which side opens the listening socket for the data channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FtpDataChannelMode {
    #[default]
    Passive,
    Active,
}

/// Endpoint encoding used when negotiating the data channel.
///
/// `Auto` tries the extended form (EPSV/EPRT) first and falls back to the
/// basic form (PASV/PORT) when the server rejects it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FtpDataAddressing {
    #[default]
    Auto,
    Extended,
    Basic,
}

#[derive(Debug, Clone)]
pub struct FtpControlConfig {
    pub max_line_len: usize,
    pub max_multi_lines: usize,
    pub command_timeout: Duration,
}

impl Default for FtpControlConfig {
    fn default() -> Self {
        FtpControlConfig {
            max_line_len: DEFAULT_MAX_LINE_LEN,
            max_multi_lines: DEFAULT_MAX_MULTI_LINES,
            command_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FtpTransferConfig {
    pub mode: FtpDataChannelMode,
    pub addressing: FtpDataAddressing,
    /// Local address announced to the server in active mode. Must be set to
    /// a routable address of this host before active mode can be used.
    pub active_bind_ip: IpAddr,
    pub data_connect_timeout: Duration,
    pub data_accept_timeout: Duration,
    /// How long to wait for the transfer completion reply after the data
    /// connection has been closed.
    pub end_wait_timeout: Duration,
}

impl Default for FtpTransferConfig {
    fn default() -> Self {
        FtpTransferConfig {
            mode: FtpDataChannelMode::default(),
            addressing: FtpDataAddressing::default(),
            active_bind_ip: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            data_connect_timeout: Duration::from_secs(15),
            data_accept_timeout: Duration::from_secs(30),
            end_wait_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct FtpClientConfig {
    pub control: FtpControlConfig,
    pub transfer: FtpTransferConfig,
}

impl FtpClientConfig {
    pub fn set_command_timeout(&mut self, timeout: Duration) {
        self.control.command_timeout = timeout;
    }

    pub fn set_data_channel_mode(&mut self, mode: FtpDataChannelMode) {
        self.transfer.mode = mode;
    }

    pub fn set_data_addressing(&mut self, addressing: FtpDataAddressing) {
        self.transfer.addressing = addressing;
    }

    pub fn set_active_bind_ip(&mut self, ip: IpAddr) {
        self.transfer.active_bind_ip = ip;
    }
}
