//! Command/response engine
//!
//! One call sends one command and waits for its reply. The sequence byte is
//! toggled once per command; retries resend the identical frame.

use bytes::{Bytes, BytesMut};
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

use ssprust_core::{
    encryption, Command, Deframer, KeyMaterial, Packet, Response, ResponseStatus, Session,
};
use ssprust_transport::{Error as TransportError, Transport};

use crate::config::DeviceConfig;

/// Why one attempt produced no usable frame
enum AttemptError {
    Write(TransportError),
    Read(TransportError),
    Frame(ssprust_core::Error),
}

impl AttemptError {
    fn status(&self) -> ResponseStatus {
        match self {
            Self::Read(TransportError::ReadTimeout) => ResponseStatus::PortTimeout,
            Self::Write(TransportError::NotOpen) | Self::Read(TransportError::NotOpen) => {
                ResponseStatus::PortClosed
            }
            _ => ResponseStatus::PortError,
        }
    }

    fn message(&self) -> String {
        match self {
            Self::Write(e) => format!("write failed: {}", e),
            Self::Read(e) => format!("read failed: {}", e),
            Self::Frame(e) => format!("bad frame: {}", e),
        }
    }
}

/// Serial channel and key material, guarded by the exchange lock
pub(crate) struct Link {
    pub(crate) transport: Box<dyn Transport>,
    pub(crate) keys: Option<KeyMaterial>,
}

impl Link {
    pub(crate) fn new(transport: Box<dyn Transport>) -> Self {
        Self {
            transport,
            keys: None,
        }
    }

    /// Send `command` with `params` and classify the reply
    ///
    /// Never fails: link and crypto failures are reported in the status.
    pub(crate) async fn exchange(
        &mut self,
        session: &Session,
        config: &DeviceConfig,
        command: Command,
        params: &[u8],
    ) -> Response {
        let mut request = Vec::with_capacity(params.len() + 1);
        request.push(u8::from(command));
        request.extend_from_slice(params);

        if !self.transport.is_open() {
            return Response::failed(command, &request, ResponseStatus::PortClosed, "port not open");
        }

        let sequence = session.next_sequence();
        let encrypted = session.encryption_enabled() && !command.is_key_exchange();
        let counter = session.counter();

        let payload = if encrypted {
            let Some(keys) = self.keys.as_ref() else {
                return Response::failed(
                    command,
                    &request,
                    ResponseStatus::EncryptFail,
                    "encryption enabled without a key",
                );
            };
            match encryption::encrypt(keys, counter, &request, &mut rand::thread_rng()) {
                Ok(payload) => payload,
                Err(e) => {
                    let status = ResponseStatus::EncryptFail;
                    return Response::failed(command, &request, status, e.to_string());
                }
            }
        } else {
            Bytes::copy_from_slice(&request)
        };

        let frame = match Packet::new(sequence, payload).encode() {
            Ok(frame) => frame,
            Err(e) => {
                let status = ResponseStatus::SystemError;
                return Response::failed(command, &request, status, e.to_string());
            }
        };

        let reply = match self.round_trip(config, command, &frame).await {
            Ok(packet) => packet,
            Err(failure) => {
                let response =
                    Response::failed(command, &request, failure.status(), failure.message());
                log_exchange(session, &response, counter);
                return response;
            }
        };

        let data = if encrypted {
            match self.unwrap_reply(session, counter, &reply.payload) {
                Ok(data) => data,
                Err(e) => {
                    let status = ResponseStatus::DecryptFail;
                    let response = Response::failed(command, &request, status, e.to_string());
                    log_exchange(session, &response, counter);
                    return response;
                }
            }
        } else {
            reply.payload
        };

        let response = Response::from_reply(command, &request, data);
        log_exchange(session, &response, counter);
        response
    }

    /// Write the frame and read one reply, retrying on link failure
    async fn round_trip(
        &mut self,
        config: &DeviceConfig,
        command: Command,
        frame: &[u8],
    ) -> std::result::Result<Packet, AttemptError> {
        let mut last = AttemptError::Read(TransportError::ReadTimeout);

        for attempt in 1..=config.retries {
            match self.attempt(config, frame).await {
                Ok(packet) => return Ok(packet),
                Err(failure) => {
                    warn!(
                        command = %command,
                        attempt,
                        of = config.retries,
                        "{}",
                        failure.message()
                    );
                    last = failure;
                }
            }
        }

        Err(last)
    }

    async fn attempt(
        &mut self,
        config: &DeviceConfig,
        frame: &[u8],
    ) -> std::result::Result<Packet, AttemptError> {
        if let Err(e) = self.transport.clear() {
            debug!("Could not clear port buffers: {}", e);
        }

        trace!("Sending frame: {}", hex::encode_upper(frame));
        self.transport.send(frame).await.map_err(AttemptError::Write)?;

        let raw = self.read_frame(config).await.map_err(AttemptError::Read)?;
        trace!("Received frame: {}", hex::encode_upper(&raw));

        Packet::decode(&raw).map_err(AttemptError::Frame)
    }

    /// Collect bytes until one complete frame has arrived or time runs out
    async fn read_frame(&mut self, config: &DeviceConfig) -> ssprust_transport::Result<BytesMut> {
        let deadline = Instant::now() + config.frame_timeout;
        let mut deframer = Deframer::new();

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(TransportError::ReadTimeout);
            }

            match self.transport.receive(remaining).await {
                Ok(chunk) => {
                    if let Some(frame) = deframer.push_slice(&chunk) {
                        return Ok(frame);
                    }
                }
                Err(TransportError::ReadTimeout) => continue,
                Err(e) => return Err(e),
            }
        }
    }

    fn unwrap_reply(
        &self,
        session: &Session,
        expected: u32,
        payload: &[u8],
    ) -> ssprust_core::Result<Bytes> {
        let keys = self
            .keys
            .as_ref()
            .ok_or(ssprust_core::Error::KeyNotNegotiated)?;
        let (received, data) = encryption::decrypt(keys, payload)?;

        if received != expected {
            return Err(ssprust_core::Error::CounterMismatch { expected, received });
        }

        session.advance_counter();
        Ok(data)
    }
}

fn log_exchange(session: &Session, response: &Response, counter: u32) {
    if !session.debug() {
        return;
    }

    if response.is_ok() {
        info!(
            command = %response.command,
            status = %response.status,
            counter,
            request = %response.request_hex,
            response = %response.response_hex,
            "Exchange complete"
        );
    } else {
        info!(
            command = %response.command,
            status = %response.status,
            code = ?response.error_code,
            counter,
            request = %response.request_hex,
            response = %response.response_hex,
            "Exchange failed: {}",
            response.describe()
        );
    }
}
