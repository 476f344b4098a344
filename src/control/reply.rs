/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::str::FromStr;

use crate::error::FtpReplyError;

/// A parsed control channel reply.
///
/// Multi-line replies keep all their lines in order; `message()` is the
/// text of the terminal line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FtpReply {
    code: u16,
    lines: Vec<String>,
}

impl fmt::Display for FtpReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.code, self.message())
    }
}

fn parse_code(line: &[u8]) -> Result<u16, FtpReplyError> {
    if line.len() < 4 {
        return Err(FtpReplyError::InvalidLineFormat);
    }
    if !line[0].is_ascii_digit() || !line[1].is_ascii_digit() || !line[2].is_ascii_digit() {
        return Err(FtpReplyError::InvalidLineFormat);
    }
    let code =
        (line[0] - b'0') as u16 * 100 + (line[1] - b'0') as u16 * 10 + (line[2] - b'0') as u16;
    if !(100..600).contains(&code) {
        return Err(FtpReplyError::InvalidReplyCode(code));
    }
    Ok(code)
}

fn message_of(line: &[u8]) -> Result<String, FtpReplyError> {
    let msg = std::str::from_utf8(&line[4..]).map_err(|_| FtpReplyError::LineIsNotUtf8)?;
    Ok(msg.trim_end().to_string())
}

impl FtpReply {
    pub fn code(&self) -> u16 {
        self.code
    }

    /// Success iff the first digit of the reply code is 1, 2 or 3.
    pub fn success(&self) -> bool {
        matches!(self.code / 100, 1..=3)
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Text of the terminal line.
    pub fn message(&self) -> &str {
        self.lines.last().map(|s| s.as_str()).unwrap_or_default()
    }

    pub(crate) fn single_line(line: &[u8]) -> Result<Self, FtpReplyError> {
        let code = parse_code(line)?;
        let msg = message_of(line)?;
        Ok(FtpReply {
            code,
            lines: vec![msg],
        })
    }

    /// Parse the host and port out of a PASV 227 reply, which carries a
    /// six-number comma separated IPv4 and port encoding.
    pub(crate) fn parse_pasv_227(&self) -> Option<SocketAddr> {
        let line = self.message();
        let p_start = memchr::memchr(b'(', line.as_bytes())?;
        let p_end = memchr::memchr(b')', &line.as_bytes()[p_start..])? + p_start;

        let mut numbers = [0u8; 6];
        let mut count = 0;
        for part in line[p_start + 1..p_end].split(',') {
            if count >= 6 {
                return None;
            }
            numbers[count] = u8::from_str(part.trim()).ok()?;
            count += 1;
        }
        if count != 6 {
            return None;
        }

        let ip = IpAddr::V4(Ipv4Addr::new(numbers[0], numbers[1], numbers[2], numbers[3]));
        let port = ((numbers[4] as u16) << 8) + numbers[5] as u16;
        Some(SocketAddr::new(ip, port))
    }

    /// Parse the port out of an EPSV 229 reply (`(|||port|)`). The host is
    /// implied as the control connection peer.
    pub(crate) fn parse_epsv_229(&self) -> Option<u16> {
        let line = self.message();
        let p_start = memchr::memchr(b'(', line.as_bytes())?;
        let p_end = memchr::memchr(b')', &line.as_bytes()[p_start..])? + p_start;

        let inner = &line[p_start + 1..p_end];
        let port_str = inner.strip_prefix("|||")?.strip_suffix('|')?;
        if port_str.is_empty() {
            return None;
        }
        u16::from_str(port_str).ok()
    }
}

pub(super) struct MultiLineReply {
    code: u16,
    end_prefix: [u8; 4],
    lines: Vec<String>,
}

impl MultiLineReply {
    pub(super) fn start(line: &[u8]) -> Result<Self, FtpReplyError> {
        let code = parse_code(line)?;
        let msg = message_of(line)?;
        Ok(MultiLineReply {
            code,
            end_prefix: [line[0], line[1], line[2], b' '],
            lines: vec![msg],
        })
    }

    /// Returns true once the terminal line (same code followed by a space)
    /// has been fed.
    pub(super) fn feed_line(&mut self, line: &[u8]) -> Result<bool, FtpReplyError> {
        if line.starts_with(&self.end_prefix) {
            self.lines.push(message_of(line)?);
            Ok(true)
        } else {
            let msg = std::str::from_utf8(line).map_err(|_| FtpReplyError::LineIsNotUtf8)?;
            // do not trim whitespace at line start
            self.lines.push(msg.trim_end().to_string());
            Ok(false)
        }
    }

    pub(super) fn finish(self) -> FtpReply {
        FtpReply {
            code: self.code,
            lines: self.lines,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_by_first_digit() {
        for code in [b"150", b"200", b"227", b"350"] {
            let mut line = code.to_vec();
            line.extend_from_slice(b" message\r\n");
            let reply = FtpReply::single_line(&line).unwrap();
            assert!(reply.success(), "{} should be success", reply.code());
        }
        for code in [b"425", b"450", b"500", b"550"] {
            let mut line = code.to_vec();
            line.extend_from_slice(b" message\r\n");
            let reply = FtpReply::single_line(&line).unwrap();
            assert!(!reply.success(), "{} should be failure", reply.code());
        }
    }

    #[test]
    fn single_line() {
        let reply = FtpReply::single_line(b"220 ready\r\n").unwrap();
        assert_eq!(reply.code(), 220);
        assert_eq!(reply.message(), "ready");
        assert_eq!(reply.lines().len(), 1);
    }

    #[test]
    fn multi_line() {
        let mut ml = MultiLineReply::start(b"150-listing\r\n").unwrap();
        assert!(!ml.feed_line(b" item1\r\n").unwrap());
        assert!(!ml.feed_line(b" item2\r\n").unwrap());
        assert!(ml.feed_line(b"150 done\r\n").unwrap());
        let reply = ml.finish();
        assert_eq!(reply.code(), 150);
        assert!(reply.success());
        assert_eq!(reply.lines().len(), 4);
        assert_eq!(reply.message(), "done");
    }

    #[test]
    fn multi_line_embedded_code() {
        // a line starting with the same digits but no space is not terminal
        let mut ml = MultiLineReply::start(b"211-features\r\n").unwrap();
        assert!(!ml.feed_line(b"211-more\r\n").unwrap());
        assert!(!ml.feed_line(b" SIZE\r\n").unwrap());
        assert!(ml.feed_line(b"211 end\r\n").unwrap());
        assert_eq!(ml.finish().message(), "end");
    }

    #[test]
    fn malformed_prefix() {
        assert!(matches!(
            FtpReply::single_line(b"2x0 hmm\r\n"),
            Err(FtpReplyError::InvalidLineFormat)
        ));
        assert!(matches!(
            FtpReply::single_line(b"050 hmm\r\n"),
            Err(FtpReplyError::InvalidReplyCode(50))
        ));
    }

    #[test]
    fn pasv_and_epsv_same_endpoint() {
        let pasv =
            FtpReply::single_line(b"227 Entering Passive Mode (192,168,1,9,8,1)\r\n").unwrap();
        let addr = pasv.parse_pasv_227().unwrap();
        assert_eq!(addr, "192.168.1.9:2049".parse().unwrap());

        let epsv =
            FtpReply::single_line(b"229 Entering Extended Passive Mode (|||2049|)\r\n").unwrap();
        let port = epsv.parse_epsv_229().unwrap();
        let host = IpAddr::V4(Ipv4Addr::new(192, 168, 1, 9));
        assert_eq!(SocketAddr::new(host, port), addr);
    }

    #[test]
    fn pasv_malformed() {
        let r = FtpReply::single_line(b"227 whatever (1,2,3,4,5)\r\n").unwrap();
        assert!(r.parse_pasv_227().is_none());
        let r = FtpReply::single_line(b"227 no parens at all\r\n").unwrap();
        assert!(r.parse_pasv_227().is_none());
    }

    #[test]
    fn epsv_malformed() {
        let r = FtpReply::single_line(b"229 bad (||2049|)\r\n").unwrap();
        assert!(r.parse_epsv_229().is_none());
        let r = FtpReply::single_line(b"229 bad (|||abc|)\r\n").unwrap();
        assert!(r.parse_epsv_229().is_none());
        let r = FtpReply::single_line(b"229 bad (||||)\r\n").unwrap();
        assert!(r.parse_epsv_229().is_none());
    }
}
