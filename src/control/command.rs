/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::fmt;

/// A single command verb. Sent as `VERB[ SP arg]CRLF`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FtpCommand(&'static str);

impl fmt::Display for FtpCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

macro_rules! ftp_commands {
    (
        $(
            $(#[$docs:meta])*
            ($konst:ident, $phrase:expr);
        )+
    ) => {
        impl FtpCommand {
        $(
            $(#[$docs])*
            pub const $konst: FtpCommand = FtpCommand($phrase);
        )+
        }
    };
}

ftp_commands! {
    (NOOP, "NOOP");
    (USER, "USER");
    (PASS, "PASS");
    (QUIT, "QUIT");
    (AUTH_TLS, "AUTH TLS");
    (PBSZ, "PBSZ");
    (PROT, "PROT");
    (TYPE_A, "TYPE A");
    (TYPE_I, "TYPE I");
    (REST, "REST");
    (PASV, "PASV");
    (EPSV, "EPSV");
    (PORT, "PORT");
    (EPRT, "EPRT");
    (RETR, "RETR");
    (STOR, "STOR");
    (APPE, "APPE");
    (DELE, "DELE");
    (SIZE, "SIZE");
}

impl FtpCommand {
    pub fn as_str(&self) -> &'static str {
        self.0
    }
}
