//! gpg
//!
//! Reads the recipient key IDs out of an OpenPGP message without
//! decrypting it.
//!
//! An encrypted message starts with one Public-Key Encrypted Session Key
//! packet per recipient, followed by the encrypted data. Packets are read
//! with the `pgp` crate's streaming parser. Reading stops at the first
//! packet that is not a session key; nothing after it is parsed.

use pgp::packet::{Packet, PacketParser as PgpPacketParser};
use thiserror::Error;

const ARMOR_PREFIX: &[u8] = b"-----BEGIN PGP";

/// Errors from packet parsing.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PacketError {
    #[error("ascii-armored input; dearmor it first")]
    Armored,

    #[error("not an OpenPGP packet header (0x{byte:02x})")]
    BadHeader { byte: u8 },

    #[error("malformed OpenPGP packet: {0}")]
    Parse(String),
}

/// Extracts recipient key IDs from ciphertext.
pub trait RecipientParser {
    /// Key IDs the ciphertext is encrypted to, as upper-case hex.
    fn recipients(&self, ciphertext: &[u8]) -> Result<Vec<String>, PacketError>;
}

/// Binary OpenPGP (RFC 4880) message parser.
#[derive(Debug, Clone, Copy, Default)]
pub struct PacketParser;

impl RecipientParser for PacketParser {
    fn recipients(&self, ciphertext: &[u8]) -> Result<Vec<String>, PacketError> {
        if ciphertext.starts_with(ARMOR_PREFIX) {
            return Err(PacketError::Armored);
        }
        match ciphertext.first() {
            None => return Ok(Vec::new()),
            Some(&byte) if byte & 0x80 == 0 => return Err(PacketError::BadHeader { byte }),
            Some(_) => {}
        }

        let mut ids = Vec::new();
        for packet in PgpPacketParser::new(ciphertext) {
            match packet.map_err(|e| PacketError::Parse(e.to_string()))? {
                Packet::PublicKeyEncryptedSessionKey(key) => {
                    let id: &[u8] = key
                        .id()
                        .map_err(|e| PacketError::Parse(e.to_string()))?
                        .as_ref();
                    ids.push(id.iter().map(|b| format!("{:02X}", b)).collect());
                }
                _ => break,
            }
        }
        Ok(ids)
    }
}
