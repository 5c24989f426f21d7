//! Output classifier - extracts the master peer fact from raw `netstat` text
//!
//! First line containing "master" wins; inside that line the last token
//! containing "master" is the peer address and the last token equal to
//! ESTABLISHED / SYN_SENT is the state. Nothing found means `NoMaster`.

use netwatch_common::ConnectionState;

const MASTER_MARKER: &str = "master";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub peer_address: String,
    pub state: ConnectionState,
}

pub fn classify(raw_output: &str) -> Classification {
    let mut peer_address = String::new();
    let mut state = ConnectionState::NoMaster;

    if let Some(line) = raw_output.lines().find(|line| line.contains(MASTER_MARKER)) {
        for token in line.split_whitespace() {
            if token.contains(MASTER_MARKER) {
                peer_address = token.to_string();
            } else if token == "ESTABLISHED" {
                state = ConnectionState::Established;
            } else if token == "SYN_SENT" {
                state = ConnectionState::SynSent;
            }
        }
    }

    Classification { peer_address, state }
}

#[cfg(test)]
mod tests {
    use super::*;
    use netwatch_devkit::{netstat_with_master, netstat_without_master};

    #[test]
    fn test_established_master_line() {
        let c = classify("tcp 0 0 10.0.0.5:5000 10.0.0.9:7000-master ESTABLISHED");
        assert_eq!(c.peer_address, "10.0.0.9:7000-master");
        assert_eq!(c.state, ConnectionState::Established);
    }

    #[test]
    fn test_no_master_line_yields_empty_pair() {
        let c = classify(&netstat_without_master());
        assert_eq!(c.peer_address, "");
        assert_eq!(c.state, ConnectionState::NoMaster);
        assert_eq!(c.state.as_str(), "");
    }

    #[test]
    fn test_first_master_line_wins() {
        // fixture has a SYN_SENT master line followed by an ESTABLISHED one
        let c = classify(&netstat_with_master("SYN_SENT"));
        assert_eq!(c.peer_address, "10.0.0.9:7000-master");
        assert_eq!(c.state, ConnectionState::SynSent);
    }

    #[test]
    fn test_last_matching_token_wins_within_line() {
        let c = classify("a-master b-master SYN_SENT ESTABLISHED");
        assert_eq!(c.peer_address, "b-master");
        assert_eq!(c.state, ConnectionState::Established);
    }

    #[test]
    fn test_master_line_without_known_state() {
        let c = classify("tcp6 0 0 ::1:5000 host-master:7000 TIME_WAIT\r\n");
        assert_eq!(c.peer_address, "host-master:7000");
        assert_eq!(c.state, ConnectionState::NoMaster);
    }

    #[test]
    fn test_tabs_and_repeated_spaces() {
        let c = classify("tcp\t0   0  10.0.0.5:5000\t\tmaster.lan:7000     SYN_SENT");
        assert_eq!(c.peer_address, "master.lan:7000");
        assert_eq!(c.state, ConnectionState::SynSent);
    }

    #[test]
    fn test_classify_is_pure() {
        let raw = netstat_with_master("ESTABLISHED");
        assert_eq!(classify(&raw), classify(&raw));
        assert_eq!(classify(""), classify(""));
    }
}
