//! Connection state machine

use crate::{Error, Result};

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Initial state (transport dialed, nothing read)
    Initial,

    /// Reading the server handshake
    Handshaking,

    /// SSL request sent, TLS handshake in progress
    NegotiatingTls,

    /// Handshake response sent, exchanging authentication packets
    Authenticating,

    /// Idle (ready for a command)
    Idle,

    /// Command sent, reading its reply
    CommandInProgress,

    /// Closed
    Closed,
}

impl ConnectionState {
    /// Check if transition is valid
    pub fn can_transition_to(&self, next: ConnectionState) -> bool {
        use ConnectionState::*;

        matches!(
            (self, next),
            (Initial, Handshaking)
                | (Handshaking, NegotiatingTls)
                | (Handshaking, Authenticating)
                | (NegotiatingTls, Authenticating)
                | (Authenticating, Idle)
                | (Idle, CommandInProgress)
                | (CommandInProgress, Idle)
                | (_, Closed)
        )
    }

    /// Transition to new state
    pub fn transition(&mut self, next: ConnectionState) -> Result<()> {
        if !self.can_transition_to(next) {
            return Err(Error::InvalidState {
                expected: format!("valid transition from {:?}", self),
                actual: format!("{:?}", next),
            });
        }
        *self = next;
        Ok(())
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Initial => write!(f, "initial"),
            Self::Handshaking => write!(f, "handshaking"),
            Self::NegotiatingTls => write!(f, "negotiating_tls"),
            Self::Authenticating => write!(f, "authenticating"),
            Self::Idle => write!(f, "idle"),
            Self::CommandInProgress => write!(f, "command_in_progress"),
            Self::Closed => write!(f, "closed"),
        }
    }
}
