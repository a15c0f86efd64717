//! Telnet option negotiation for TN5250 (RFC 854, RFC 1205, RFC 2877).

use std::collections::HashMap;

use crate::error::{ConnectionError, Error, Result};

pub const IAC: u8 = 0xFF;
pub const DONT: u8 = 0xFE;
pub const DO: u8 = 0xFD;
pub const WONT: u8 = 0xFC;
pub const WILL: u8 = 0xFB;
pub const SB: u8 = 0xFA;
pub const SE: u8 = 0xF0;
pub const EOR: u8 = 0xEF;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TelnetOption {
    Binary,
    EndOfRecord,
    SuppressGoAhead,
    TerminalType,
    NewEnviron,
    TimingMark,
}

impl TelnetOption {
    pub fn code(self) -> u8 {
        match self {
            TelnetOption::Binary => 0,
            TelnetOption::SuppressGoAhead => 3,
            TelnetOption::TimingMark => 6,
            TelnetOption::TerminalType => 24,
            TelnetOption::EndOfRecord => 25,
            TelnetOption::NewEnviron => 39,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(TelnetOption::Binary),
            3 => Some(TelnetOption::SuppressGoAhead),
            6 => Some(TelnetOption::TimingMark),
            24 => Some(TelnetOption::TerminalType),
            25 => Some(TelnetOption::EndOfRecord),
            39 => Some(TelnetOption::NewEnviron),
            _ => None,
        }
    }

    const REQUIRED: [TelnetOption; 3] =
        [TelnetOption::Binary, TelnetOption::EndOfRecord, TelnetOption::SuppressGoAhead];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegotiationState {
    NotNegotiated,
    Enabled,
    Disabled,
}

/// Tracks per-option negotiation state and produces the reply bytes for
/// each incoming Telnet command.
pub struct TelnetNegotiator {
    option_states: HashMap<TelnetOption, NegotiationState>,
    pub device_name: String,
    pub user: Option<String>,
    pub password: Option<String>,
}

impl TelnetNegotiator {
    pub fn new(device_name: impl Into<String>) -> Self {
        TelnetNegotiator {
            option_states: HashMap::new(),
            device_name: device_name.into(),
            user: None,
            password: None,
        }
    }

    pub fn is_complete(&self) -> bool {
        TelnetOption::REQUIRED.iter().all(|opt| {
            matches!(self.option_states.get(opt), Some(NegotiationState::Enabled))
        })
    }

    pub fn state_of(&self, option: TelnetOption) -> NegotiationState {
        *self.option_states.get(&option).unwrap_or(&NegotiationState::NotNegotiated)
    }

    /// Handle `IAC <DO|DONT|WILL|WONT> <option>`, returning the reply bytes.
    pub fn process_command(&mut self, command: u8, option_code: u8) -> Result<Vec<u8>> {
        let Some(option) = TelnetOption::from_code(option_code) else {
            // Unsupported option: politely refuse, do not abort the session.
            return Ok(match command {
                DO => vec![IAC, WONT, option_code],
                WILL => vec![IAC, DONT, option_code],
                _ => Vec::new(),
            });
        };

        match command {
            WILL => {
                self.option_states.insert(option, NegotiationState::Enabled);
                Ok(vec![IAC, DO, option_code])
            }
            WONT => {
                self.option_states.insert(option, NegotiationState::Disabled);
                Ok(Vec::new())
            }
            DO => {
                self.option_states.insert(option, NegotiationState::Enabled);
                Ok(vec![IAC, WILL, option_code])
            }
            DONT => {
                self.option_states.insert(option, NegotiationState::Disabled);
                Ok(Vec::new())
            }
            _ => Err(Error::Connection(ConnectionError::NegotiationRejected { option: option_code })),
        }
    }

    /// Handle `IAC SB <option> ... IAC SE` payloads (already de-escaped and
    /// stripped of the `IAC SB`/`IAC SE` wrapper by the framer).
    pub fn process_subnegotiation(&mut self, option_code: u8, data: &[u8]) -> Result<Option<Vec<u8>>> {
        match TelnetOption::from_code(option_code) {
            Some(TelnetOption::TerminalType) => {
                if data.first() != Some(&1) {
                    return Ok(None);
                }
                let mut reply = vec![IAC, SB, option_code, 0];
                reply.extend_from_slice(self.device_name.as_bytes());
                reply.extend_from_slice(&[IAC, SE]);
                Ok(Some(reply))
            }
            Some(TelnetOption::NewEnviron) => Ok(self.build_new_environ_reply(data)),
            _ => Ok(None),
        }
    }

    fn build_new_environ_reply(&self, data: &[u8]) -> Option<Vec<u8>> {
        // SEND request: IS our VAR/VALUE pairs for DEVNAME and, if present,
        // USER/USERVAR entries carrying sign-on credentials (RFC 4777).
        if data.first() != Some(&1) {
            return None;
        }
        let mut payload = vec![0u8]; // IS
        push_var(&mut payload, 0, "DEVNAME", &self.device_name);
        if let Some(user) = &self.user {
            push_var(&mut payload, 3, "USER", user);
        }
        if let Some(password) = &self.password {
            push_var(&mut payload, 3, "PASSWORD", password);
        }
        let mut reply = vec![IAC, SB, TelnetOption::NewEnviron.code()];
        reply.extend_from_slice(&payload);
        reply.extend_from_slice(&[IAC, SE]);
        Some(reply)
    }
}

fn push_var(out: &mut Vec<u8>, kind: u8, name: &str, value: &str) {
    out.push(kind);
    out.extend_from_slice(name.as_bytes());
    out.push(1); // VALUE
    out.extend_from_slice(value.as_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negotiation_completes_after_required_wills() {
        let mut n = TelnetNegotiator::new("IBM-3179-2");
        assert!(!n.is_complete());
        for opt in TelnetOption::REQUIRED {
            n.process_command(WILL, opt.code()).unwrap();
        }
        assert!(n.is_complete());
    }

    #[test]
    fn unsupported_option_is_refused_not_fatal() {
        let mut n = TelnetNegotiator::new("IBM-3179-2");
        let reply = n.process_command(DO, 200).unwrap();
        assert_eq!(reply, vec![IAC, WONT, 200]);
    }

    #[test]
    fn terminal_type_subnegotiation_replies_with_device_name() {
        let mut n = TelnetNegotiator::new("IBM-3179-2");
        let reply = n.process_subnegotiation(TelnetOption::TerminalType.code(), &[1]).unwrap().unwrap();
        assert_eq!(reply[0..3], [IAC, SB, TelnetOption::TerminalType.code()]);
        assert!(reply.windows(9).any(|w| w == b"IBM-3179-"));
        assert_eq!(&reply[reply.len() - 2..], &[IAC, SE]);
    }

    #[test]
    fn new_environ_carries_devname_and_credentials() {
        let mut n = TelnetNegotiator::new("IBM-3179-2");
        n.user = Some("USER1".into());
        n.password = Some("PASS1".into());
        let reply = n.process_subnegotiation(TelnetOption::NewEnviron.code(), &[1]).unwrap().unwrap();
        let text = String::from_utf8_lossy(&reply);
        assert!(text.contains("DEVNAME"));
        assert!(text.contains("USER1"));
        assert!(text.contains("PASS1"));
    }
}
