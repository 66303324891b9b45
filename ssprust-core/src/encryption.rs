//! Encrypted payload wrapping
//!
//! # Inner record
//!
//! ```text
//! ┌────────┬─────────────┬───────────┬──────────┬────────┐
//! │  LEN   │  COUNT (LE) │   DATA    │ PADDING  │  CRC   │
//! │ 1 byte │   4 bytes   │ LEN bytes │  random  │ 2 (LE) │
//! └────────┴─────────────┴───────────┴──────────┴────────┘
//! ```
//!
//! Padding brings the record to a multiple of 16 bytes. The record is then
//! encrypted with AES-128 in ECB mode and sent as `STEX | ciphertext`.

use aes::cipher::{generic_array::GenericArray, BlockDecrypt, BlockEncrypt, KeyInit};
use aes::Aes128;
use byteorder::{ByteOrder, LittleEndian};
use bytes::{BufMut, Bytes, BytesMut};
use rand::Rng;
use tracing::trace;

use crate::{
    checksum,
    constants::STEX,
    error::{Error, Result},
    keys::KeyMaterial,
};

const BLOCK_SIZE: usize = 16;

/// LEN + COUNT
const INNER_HEADER: usize = 5;

const INNER_CRC: usize = 2;

fn cipher(keys: &KeyMaterial) -> Result<Aes128> {
    let key = keys.aes_key().ok_or(Error::KeyNotNegotiated)?;
    Ok(Aes128::new(GenericArray::from_slice(&key)))
}

/// Wrap `payload` into an encrypted frame payload
///
/// # Errors
///
/// Returns [`Error::KeyNotNegotiated`] if the key exchange has not completed,
/// or [`Error::PayloadTooLarge`] if the payload cannot be described by the
/// inner length byte.
pub fn encrypt<R: Rng + ?Sized>(
    keys: &KeyMaterial,
    counter: u32,
    payload: &[u8],
    rng: &mut R,
) -> Result<Bytes> {
    let cipher = cipher(keys)?;

    let unpadded = INNER_HEADER + payload.len() + INNER_CRC;
    let total = unpadded.div_ceil(BLOCK_SIZE) * BLOCK_SIZE;
    // Outer payload is STEX plus the ciphertext and must fit a length byte
    if payload.len() > u8::MAX as usize || total + 1 > u8::MAX as usize {
        return Err(Error::PayloadTooLarge {
            size: payload.len(),
            max: u8::MAX as usize - 1 - INNER_HEADER - INNER_CRC,
        });
    }

    let mut record = BytesMut::with_capacity(total);
    record.put_u8(payload.len() as u8);
    record.put_u32_le(counter);
    record.put_slice(payload);
    for _ in unpadded..total {
        record.put_u8(rng.r#gen());
    }
    let crc = checksum::calculate(&record);
    record.put_u16_le(crc);

    for block in record.chunks_exact_mut(BLOCK_SIZE) {
        cipher.encrypt_block(GenericArray::from_mut_slice(block));
    }

    trace!(counter, len = payload.len(), blocks = total / BLOCK_SIZE, "Encrypted payload");

    let mut out = BytesMut::with_capacity(total + 1);
    out.put_u8(STEX);
    out.put_slice(&record);
    Ok(out.freeze())
}

/// Unwrap an encrypted frame payload, returning its counter and plaintext
///
/// # Errors
///
/// Returns [`Error::Decrypt`] if the marker is missing, the ciphertext is not
/// block aligned, the declared length overruns the record, or the inner CRC
/// does not match.
pub fn decrypt(keys: &KeyMaterial, data: &[u8]) -> Result<(u32, Bytes)> {
    let cipher = cipher(keys)?;

    let (&marker, ciphertext) = data
        .split_first()
        .ok_or_else(|| Error::Decrypt("empty payload".to_string()))?;
    if marker != STEX {
        return Err(Error::Decrypt(format!(
            "expected STEX marker, got 0x{:02X}",
            marker
        )));
    }
    if ciphertext.is_empty() || ciphertext.len() % BLOCK_SIZE != 0 {
        return Err(Error::Decrypt(format!(
            "ciphertext of {} bytes is not block aligned",
            ciphertext.len()
        )));
    }

    let mut record = BytesMut::from(ciphertext);
    for block in record.chunks_exact_mut(BLOCK_SIZE) {
        cipher.decrypt_block(GenericArray::from_mut_slice(block));
    }

    let len = record[0] as usize;
    if INNER_HEADER + len + INNER_CRC > record.len() {
        return Err(Error::Decrypt(format!(
            "inner length {} exceeds record of {} bytes",
            len,
            record.len()
        )));
    }

    let crc_at = record.len() - INNER_CRC;
    let received = LittleEndian::read_u16(&record[crc_at..]);
    let expected = checksum::calculate(&record[..crc_at]);
    if expected != received {
        return Err(Error::Decrypt(format!(
            "inner checksum mismatch: expected 0x{:04X}, received 0x{:04X}",
            expected, received
        )));
    }

    let counter = LittleEndian::read_u32(&record[1..INNER_HEADER]);
    let payload = record
        .freeze()
        .slice(INNER_HEADER..INNER_HEADER + len);

    trace!(counter, len, "Decrypted payload");
    Ok((counter, payload))
}
