//! Key exchange and XOR "encryption" pass-through.
//!
//! No cryptographic property is required: the key exchange derives a
//! deterministic shared string from both public keys, and payload
//! "encryption" is a byte-wise XOR carried as a hex string so it stays
//! valid UTF-8 on the wire. Decrypt(encrypt(x, k), k) == x for any
//! non-empty key.

use crate::net::{Addr, Frame, Kind, KeyExchangeFields, Priority};
use std::collections::HashMap;

/// Pseudo public key derived from an address.
pub fn generate_public_key(addr: Addr) -> String {
    format!(
        "{:x}",
        (addr.0 as u64)
            .wrapping_mul(0x12345)
            .wrapping_add(0x6789_ABCD)
    )
}

/// Combine the two public keys into a 16-byte shared secret, hex-encoded.
/// The keys are taken in sorted order so both peers derive the same string
/// regardless of who initiated the exchange.
pub fn compute_shared_secret(mine: &str, theirs: &str) -> String {
    let (lo, hi) = if mine <= theirs {
        (mine, theirs)
    } else {
        (theirs, mine)
    };
    let combined: Vec<u8> = lo.bytes().chain(hi.bytes()).collect();
    let mut secret = Vec::with_capacity(16);
    for i in 0..16u8 {
        let b = combined[i as usize % combined.len()];
        secret.push((b ^ 0x5A).wrapping_add(i));
    }
    to_hex(&secret)
}

/// XOR the payload with the cycled key (and a fixed whitening byte) and
/// hex-encode the result.
pub fn xor_encrypt(plain: &str, key: &str) -> String {
    let key = key.as_bytes();
    debug_assert!(!key.is_empty());
    let out: Vec<u8> = plain
        .bytes()
        .enumerate()
        .map(|(i, b)| b ^ key[i % key.len()] ^ 0xAA)
        .collect();
    to_hex(&out)
}

/// Inverse of [`xor_encrypt`]. Returns `None` when the input is not a
/// valid hex ciphertext or does not decode to UTF-8.
pub fn xor_decrypt(cipher_hex: &str, key: &str) -> Option<String> {
    let key = key.as_bytes();
    if key.is_empty() {
        return None;
    }
    let raw = from_hex(cipher_hex)?;
    let out: Vec<u8> = raw
        .iter()
        .enumerate()
        .map(|(i, b)| b ^ key[i % key.len()] ^ 0xAA)
        .collect();
    String::from_utf8(out).ok()
}

fn to_hex(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        s.push_str(&format!("{b:02x}"));
    }
    s
}

fn from_hex(s: &str) -> Option<Vec<u8>> {
    if s.len() % 2 != 0 {
        return None;
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(s.get(i..i + 2)?, 16).ok())
        .collect()
}

/// Per-node key material: our public key plus the shared secrets agreed
/// with each peer.
#[derive(Debug)]
pub struct KeyStore {
    local: Addr,
    my_public: String,
    shared: HashMap<Addr, String>,
}

impl KeyStore {
    pub fn new(local: Addr) -> KeyStore {
        KeyStore {
            local,
            my_public: generate_public_key(local),
            shared: HashMap::new(),
        }
    }

    /// Build the key-exchange frame announcing our public key.
    pub fn exchange_frame(&self, peer: Addr) -> Frame {
        Frame::new(
            self.local,
            peer,
            Kind::KeyExchange(KeyExchangeFields {
                public_key: self.my_public.clone(),
            }),
        )
        .with_priority(Priority::High)
    }

    /// Record the peer's public key. Returns `true` when this was the
    /// first exchange with that peer (i.e. a reply is owed); a duplicate
    /// exchange updates the key but must not be answered.
    pub fn accept(&mut self, peer: Addr, peer_public: &str) -> bool {
        let first = !self.shared.contains_key(&peer);
        let secret = compute_shared_secret(&self.my_public, peer_public);
        self.shared.insert(peer, secret);
        first
    }

    pub fn key_for(&self, peer: Addr) -> Option<&str> {
        self.shared.get(&peer).map(String::as_str)
    }

    /// Encrypt `plain` for `peer` if a shared key exists.
    pub fn encrypt_for(&self, peer: Addr, plain: &str) -> Option<String> {
        self.key_for(peer).map(|k| xor_encrypt(plain, k))
    }

    /// Decrypt data from `peer`; the opaque ciphertext is kept when no
    /// key is held or the ciphertext is malformed.
    pub fn decrypt_from(&self, peer: Addr, cipher_hex: &str) -> Option<String> {
        self.key_for(peer).and_then(|k| xor_decrypt(cipher_hex, k))
    }
}
