//! Per-packet payload encryption.
//!
//! Every RTP payload (and RTCP Sender Report body) is sealed with
//! XChaCha20-Poly1305 before it reaches the wire. The 12-byte RTP header
//! stays in the clear and is bound to the ciphertext as AEAD associated
//! data, so a tampered header fails authentication on the receiver.
//!
//! Nonces are derived from a monotonic 32-bit counter owned by the cipher
//! and shared by every packetizer on the connection. The counter occupies
//! the first four bytes of the 24-byte nonce (rest zero) and is appended to
//! each packet so the receiver can reconstruct it. One counter per key keeps
//! nonces unique even when audio and video stream concurrently over the same
//! channel.

use std::sync::atomic::{AtomicU32, Ordering};

use chacha20poly1305::aead::{Aead, Payload};
use chacha20poly1305::{KeyInit, XChaCha20Poly1305, XNonce};

use crate::error::{Result, StreamError};

/// Symmetric key length in bytes.
pub const KEY_LEN: usize = 32;
/// Poly1305 authentication tag length in bytes.
pub const TAG_LEN: usize = 16;
/// Length of the nonce counter appended to each packet.
pub const NONCE_TAIL_LEN: usize = 4;

/// AEAD cipher for one media connection.
///
/// The key is supplied once by the signaling layer and is immutable for the
/// stream's lifetime. Shared across packetizers via `Arc`; encryption takes
/// `&self` (the nonce counter is atomic).
pub struct PacketCipher {
    cipher: XChaCha20Poly1305,
    nonce_counter: AtomicU32,
}

impl PacketCipher {
    /// Create a cipher from a 32-byte session key.
    pub fn new(key: &[u8]) -> Result<Self> {
        if key.len() != KEY_LEN {
            return Err(StreamError::InvalidKeyLength(key.len()));
        }
        let cipher =
            XChaCha20Poly1305::new_from_slice(key).map_err(|_| StreamError::Encryption)?;
        Ok(Self {
            cipher,
            nonce_counter: AtomicU32::new(0),
        })
    }

    /// Seal a payload, binding `aad` (the packet header) to the ciphertext.
    ///
    /// Returns the ciphertext (plaintext length + [`TAG_LEN`]) and the
    /// 4-byte nonce counter to append to the packet.
    pub fn encrypt(&self, aad: &[u8], plaintext: &[u8]) -> Result<(Vec<u8>, [u8; NONCE_TAIL_LEN])> {
        let counter = self.nonce_counter.fetch_add(1, Ordering::Relaxed);
        let tail = counter.to_be_bytes();

        let mut nonce = [0u8; 24];
        nonce[..NONCE_TAIL_LEN].copy_from_slice(&tail);

        let ciphertext = self
            .cipher
            .encrypt(
                XNonce::from_slice(&nonce),
                Payload {
                    msg: plaintext,
                    aad,
                },
            )
            .map_err(|_| StreamError::Encryption)?;

        Ok((ciphertext, tail))
    }

    /// Number of payloads sealed so far.
    pub fn nonces_used(&self) -> u32 {
        self.nonce_counter.load(Ordering::Relaxed)
    }
}
