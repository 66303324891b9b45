//! Key negotiation for the encrypted link
//!
//! Generator, modulus and the host's intermediate key go out as three plain
//! commands. The reply to the last one carries the device's intermediate
//! key, from which both sides derive the same shared key.

use tracing::{debug, info, warn};

use ssprust_core::{Command, KeyMaterial, Session};

use crate::config::DeviceConfig;
use crate::error::{Error, Result};
use crate::exchange::Link;

/// Offset of the device's intermediate key in the key-exchange reply
const SLAVE_KEY: std::ops::Range<usize> = 1..9;

/// Run a full key exchange and switch the session to encrypted mode
///
/// Any failure leaves the session in plain mode without a key.
pub(crate) async fn negotiate(
    link: &mut Link,
    session: &Session,
    config: &DeviceConfig,
) -> Result<u64> {
    session.insecure();
    link.keys = None;

    let mut keys = KeyMaterial::generate(&mut rand::thread_rng());
    debug!(?keys, "Generated key material");

    let steps = [
        (Command::SetGenerator, keys.generator),
        (Command::SetModulus, keys.modulus),
        (Command::RequestKeyExchange, keys.host_inter),
    ];

    let mut reply = None;
    for (step, value) in steps {
        let response = link.exchange(session, config, step, &value.to_le_bytes()).await;
        if !response.is_ok() {
            warn!(step = %step, status = %response.status, "Key exchange aborted");
            return Err(Error::KeyExchange {
                step,
                status: response.status,
            });
        }
        reply = Some(response);
    }

    let data = reply.map(|r| r.data).unwrap_or_default();
    let slave_inter = data
        .get(SLAVE_KEY)
        .and_then(|b| b.try_into().ok())
        .map(u64::from_le_bytes)
        .ok_or_else(|| ssprust_core::Error::MalformedReply {
            command: Command::RequestKeyExchange,
            reason: format!("expected 8 key bytes, got {}", data.len().saturating_sub(1)),
        })?;

    let shared = keys.complete(slave_inter);
    link.keys = Some(keys);
    session.secure()?;

    info!("Encryption key negotiated");
    Ok(shared)
}
