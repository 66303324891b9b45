//! High-level device interface

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};

use ssprust_core::constants::{payout_option, route};
use ssprust_core::{
    payout, poll, Command, DenominationPlan, EventTracker, PollEvent, Reaction, Response, Session,
};
use ssprust_transport::{SerialTransport, Transport};
use ssprust_types::{
    CashboxPayout, ChannelInfo, ChannelTable, Counters, Currency, Notification, PayoutRequest,
    SetupInfo, UnitData, UnitType,
};

use crate::config::DeviceConfig;
use crate::error::{Error, ResponseExt, Result};
use crate::exchange::Link;
use crate::key_exchange;
use crate::listener::Listener;

/// Buffered notifications per subscriber
const NOTIFICATION_CAPACITY: usize = 64;

/// SSP banknote validator / smart payout
///
/// Cheap to clone; clones share the same connection. Commands from any
/// clone are serialised, so at most one is on the wire at a time.
///
/// # Examples
///
/// ```no_run
/// use ssprust::Device;
///
/// #[tokio::main]
/// async fn main() -> ssprust::Result<()> {
///     let device = Device::serial("/dev/ttyUSB0");
///
///     device.connect().await?;
///     let setup = device.initialize().await?;
///     println!("Unit: {} with {} channels", setup.unit_type, setup.channels.len());
///
///     let mut notes = device.subscribe();
///     device.enable_validator().await?;
///     while let Ok(notification) = notes.recv().await {
///         println!("{}", notification);
///     }
///
///     device.disconnect().await?;
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct Device {
    inner: Arc<Inner>,
}

struct Inner {
    config: DeviceConfig,
    session: Session,

    /// Exchange lock: one command in flight
    link: Mutex<Link>,

    /// Poll-tick lock: one poll (and its follow-up commands) at a time
    tracker: Mutex<EventTracker>,

    channels: parking_lot::RwLock<ChannelTable>,
    unit_type: parking_lot::RwLock<UnitType>,
    notifications: broadcast::Sender<Notification>,
    listener: parking_lot::Mutex<Option<Listener>>,
    listening: AtomicBool,

    /// Bumped whenever a listener is started or stopped
    generation: AtomicU64,
}

impl Device {
    /// Create a device on top of any transport
    pub fn new(transport: impl Transport + 'static, config: DeviceConfig) -> Self {
        let session = Session::new(config.address);
        session.set_debug(config.debug);
        let (notifications, _) = broadcast::channel(NOTIFICATION_CAPACITY);

        Self {
            inner: Arc::new(Inner {
                config,
                session,
                link: Mutex::new(Link::new(Box::new(transport))),
                tracker: Mutex::new(EventTracker::default()),
                channels: parking_lot::RwLock::new(ChannelTable::new()),
                unit_type: parking_lot::RwLock::new(UnitType::Unknown),
                notifications,
                listener: parking_lot::Mutex::new(None),
                listening: AtomicBool::new(false),
                generation: AtomicU64::new(0),
            }),
        }
    }

    /// Create a device on a serial port with default settings
    pub fn serial(port: impl Into<String>) -> Self {
        Self::new(SerialTransport::new(port), DeviceConfig::default())
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.inner.config
    }

    /// Check if connected
    pub fn is_connected(&self) -> bool {
        self.inner.session.is_connected()
    }

    /// Check if commands are encrypted
    pub fn encryption_enabled(&self) -> bool {
        self.inner.session.encryption_enabled()
    }

    /// Check if the poll listener should be running
    pub fn is_listening(&self) -> bool {
        self.inner.listening.load(Ordering::Acquire)
    }

    /// Toggle exchange logging at runtime
    pub fn set_debug(&self, enabled: bool) {
        self.inner.session.set_debug(enabled);
    }

    /// Unit type reported by the last setup request
    pub fn unit_type(&self) -> UnitType {
        *self.inner.unit_type.read()
    }

    /// Snapshot of the channel table
    pub fn channels(&self) -> Vec<ChannelInfo> {
        self.inner.channels.read().as_slice().to_vec()
    }

    /// Receive notifications raised while the validator is listening
    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.inner.notifications.subscribe()
    }

    /// Open the port
    ///
    /// An already open port is closed and reopened; any key is dropped.
    pub async fn connect(&self) -> Result<()> {
        let mut link = self.inner.link.lock().await;

        info!("Connecting to {}...", link.transport.port_name());

        if link.transport.is_open() {
            link.transport.close().await?;
        }
        self.inner.session.close();
        link.keys = None;

        link.transport.open().await?;
        self.inner.session.open()?;

        info!("Connected to {}", link.transport.port_name());
        Ok(())
    }

    /// Stop listening and close the port
    pub async fn disconnect(&self) -> Result<()> {
        self.stop_listening();

        let mut link = self.inner.link.lock().await;
        if !link.transport.is_open() && !self.is_connected() {
            return Ok(());
        }

        info!("Disconnecting from {}...", link.transport.port_name());

        link.keys = None;
        self.inner.session.close();
        link.transport.close().await?;

        info!("Disconnected");
        Ok(())
    }

    /// Send one command and return the classified reply
    ///
    /// This is the raw entry point every other operation goes through; it
    /// never fails, the outcome is in [`Response::status`].
    pub async fn send_command(&self, command: Command, params: &[u8]) -> Response {
        let mut link = self.inner.link.lock().await;
        link.exchange(&self.inner.session, &self.inner.config, command, params)
            .await
    }

    /// Bring a freshly connected device into service
    ///
    /// Sync, announce the host protocol version, negotiate encryption, read
    /// the setup, open all channels and light the bezel.
    pub async fn initialize(&self) -> Result<SetupInfo> {
        self.sync().await?;
        self.host_protocol_version().await?;
        self.negotiate_encryption().await?;
        let setup = self.setup_request().await?;
        self.set_channel_inhibits(0xFFFF).await?;
        self.configure_bezel(0x00, 0xFF, 0x00, false).await?;
        Ok(setup)
    }

    /// Synchronise the sequence flag with the device
    pub async fn sync(&self) -> Result<()> {
        self.simple(Command::Sync, &[]).await
    }

    /// Announce the configured host protocol version
    pub async fn host_protocol_version(&self) -> Result<()> {
        let version = self.inner.config.protocol_version;
        self.simple(Command::HostProtocolVersion, &[version]).await
    }

    /// Negotiate a new encryption key and switch to encrypted commands
    ///
    /// Returns the shared key.
    pub async fn negotiate_encryption(&self) -> Result<u64> {
        self.ensure_connected()?;

        let mut link = self.inner.link.lock().await;
        key_exchange::negotiate(&mut link, &self.inner.session, &self.inner.config).await
    }

    /// Read unit setup and rebuild the channel table
    ///
    /// On a smart payout the level and route of every channel are queried
    /// as well.
    pub async fn setup_request(&self) -> Result<SetupInfo> {
        let mut tracker = self.inner.tracker.lock().await;

        let response = self.request(Command::SetupRequest, &[]).await?;
        let setup = SetupInfo::parse(response.body())?;

        debug!(
            unit = %setup.unit_type,
            firmware = %setup.firmware_version,
            country = %setup.country,
            channels = setup.channels.len(),
            "Setup received"
        );

        *self.inner.unit_type.write() = setup.unit_type;
        self.inner.channels.write().replace(setup.channels.clone());
        tracker.set_refresh_on_credit(setup.unit_type.is_smart_payout());

        if setup.unit_type.is_smart_payout() {
            self.refresh_channels().await?;
        }

        Ok(setup)
    }

    /// Query unit type, firmware, country and protocol version
    pub async fn unit_data(&self) -> Result<UnitData> {
        let response = self.request(Command::UnitData, &[]).await?;
        Ok(UnitData::parse(response.body())?)
    }

    /// Accept notes and start polling
    pub async fn enable_validator(&self) -> Result<()> {
        self.simple(Command::Enable, &[]).await?;

        self.inner.listening.store(true, Ordering::Release);
        let mut slot = self.inner.listener.lock();
        let running = slot.as_ref().is_some_and(|l| !l.is_finished());
        if !running {
            let generation = self.inner.generation.fetch_add(1, Ordering::AcqRel) + 1;
            let interval = self.inner.config.poll_interval;
            *slot = Some(Listener::spawn(self.clone(), interval, generation));
        }
        Ok(())
    }

    /// Stop polling and refuse notes
    pub async fn disable_validator(&self) -> Result<()> {
        self.stop_listening();
        self.simple(Command::Disable, &[]).await
    }

    pub async fn enable_payout_device(&self) -> Result<()> {
        self.simple(Command::EnablePayoutDevice, &[]).await
    }

    pub async fn disable_payout_device(&self) -> Result<()> {
        self.simple(Command::DisablePayoutDevice, &[]).await
    }

    /// Set which channels accept notes; bit 0 is channel 1
    pub async fn set_channel_inhibits(&self, mask: u16) -> Result<()> {
        self.simple(Command::SetChannelInhibits, &mask.to_le_bytes())
            .await
    }

    /// Set the bezel colour; `persist` stores it across power cycles
    pub async fn configure_bezel(&self, red: u8, green: u8, blue: u8, persist: bool) -> Result<()> {
        self.simple(Command::ConfigureBezel, &[red, green, blue, persist as u8])
            .await
    }

    pub async fn display_on(&self) -> Result<()> {
        self.simple(Command::DisplayOn, &[]).await
    }

    pub async fn display_off(&self) -> Result<()> {
        self.simple(Command::DisplayOff, &[]).await
    }

    /// Disable the validator, then restart the unit
    pub async fn reset(&self) -> Result<()> {
        if let Err(e) = self.disable_validator().await {
            warn!(error = %e, "Disable before reset failed");
        }
        self.simple(Command::Reset, &[]).await
    }

    pub async fn get_counters(&self) -> Result<Counters> {
        let response = self.request(Command::GetCounters, &[]).await?;
        Ok(Counters::parse(response.body())?)
    }

    pub async fn reset_counters(&self) -> Result<()> {
        self.simple(Command::ResetCounters, &[]).await
    }

    /// `true` when notes of this denomination are kept for payout
    pub async fn get_denomination_route(&self, value: u32, currency: Currency) -> Result<bool> {
        let response = self
            .request(Command::GetDenominationRoute, &denomination(value, currency))
            .await?;

        let recycling = match response.body().first() {
            Some(&byte) => byte == route::PAYOUT_STORE,
            None => return Err(malformed(Command::GetDenominationRoute, "missing route byte")),
        };

        self.update_channel(value, currency, |table, ch| table.set_recycling(ch, recycling));
        Ok(recycling)
    }

    /// Route notes of this denomination to the payout store (`recycle`) or
    /// the cashbox
    pub async fn set_denomination_route(
        &self,
        value: u32,
        currency: Currency,
        recycle: bool,
    ) -> Result<()> {
        let mut params = Vec::with_capacity(8);
        params.push(if recycle { route::PAYOUT_STORE } else { route::CASHBOX });
        params.extend_from_slice(&denomination(value, currency));

        self.simple(Command::SetDenominationRoute, &params).await?;
        self.update_channel(value, currency, |table, ch| table.set_recycling(ch, recycle));
        Ok(())
    }

    /// Notes of this denomination stored for payout
    pub async fn get_denomination_level(&self, value: u32, currency: Currency) -> Result<u32> {
        let response = self
            .request(Command::GetDenominationLevel, &denomination(value, currency))
            .await?;

        let level = match response.body() {
            [lo, hi, ..] => u16::from_le_bytes([*lo, *hi]) as u32,
            [level] => *level as u32,
            [] => return Err(malformed(Command::GetDenominationLevel, "missing level")),
        };

        self.update_channel(value, currency, |table, ch| table.set_level(ch, level));
        Ok(level)
    }

    /// Pay out the given notes; with `test` the device only checks it could
    pub async fn payout_by_denomination(
        &self,
        requests: &[PayoutRequest],
        test: bool,
    ) -> Result<()> {
        if requests.len() > u8::MAX as usize {
            return Err(ssprust_core::Error::PayloadTooLarge {
                size: requests.len(),
                max: u8::MAX as usize,
            }
            .into());
        }

        let mut params = Vec::with_capacity(2 + requests.len() * 9);
        params.push(requests.len() as u8);
        for request in requests {
            params.extend_from_slice(&request.count.to_le_bytes());
            params.extend_from_slice(&denomination(request.value, request.currency));
        }
        params.push(option(test));

        self.simple(Command::PayoutByDenomination, &params).await
    }

    /// Pay out `value` in whatever notes the device chooses
    pub async fn payout_amount(&self, value: u32, currency: Currency, test: bool) -> Result<()> {
        let mut params = denomination(value, currency).to_vec();
        params.push(option(test));
        self.simple(Command::PayoutAmount, &params).await
    }

    pub async fn halt_payout(&self) -> Result<()> {
        self.simple(Command::HaltPayout, &[]).await
    }

    /// Move every stored note to the cashbox
    pub async fn empty_all(&self) -> Result<()> {
        self.simple(Command::EmptyAll, &[]).await
    }

    /// Empty the payout store, counting what goes to the cashbox
    pub async fn smart_empty(&self) -> Result<()> {
        self.simple(Command::SmartEmpty, &[]).await
    }

    /// Return the note held in escrow
    pub async fn reject_banknote(&self) -> Result<()> {
        self.simple(Command::RejectBanknote, &[]).await
    }

    /// Keep the note in escrow a little longer
    pub async fn hold(&self) -> Result<()> {
        self.simple(Command::Hold, &[]).await
    }

    pub async fn get_serial_number(&self) -> Result<u32> {
        let response = self.request(Command::GetSerialNumber, &[]).await?;
        match response.body() {
            [a, b, c, d, ..] => Ok(u32::from_be_bytes([*a, *b, *c, *d])),
            _ => Err(malformed(Command::GetSerialNumber, "expected 4 bytes")),
        }
    }

    pub async fn get_dataset_version(&self) -> Result<String> {
        let response = self.request(Command::GetDatasetVersion, &[]).await?;
        Ok(String::from_utf8_lossy(response.body())
            .trim_end_matches('\0')
            .to_string())
    }

    /// Notes moved to the cashbox by the last payout operation
    pub async fn cashbox_payout_operation_data(&self) -> Result<Vec<CashboxPayout>> {
        let response = self
            .request(Command::CashboxPayoutOperationData, &[])
            .await?;
        Ok(CashboxPayout::parse_list(response.body())?)
    }

    /// Poll once and act on what the device reports
    ///
    /// Normally driven by the listener while the validator is enabled.
    pub async fn poll(&self) -> Result<Vec<PollEvent>> {
        let mut tracker = self.inner.tracker.lock().await;

        let response = self.request(Command::Poll, &[]).await?;
        let events = poll::decode(response.body());

        for event in &events {
            info!(event = %event, "Poll event");

            let reactions = {
                let channels = self.inner.channels.read();
                tracker.apply(event, &channels)
            };

            for reaction in reactions {
                match reaction {
                    Reaction::Notify(notification) => {
                        debug!(%notification, "Publishing notification");
                        let _ = self.inner.notifications.send(notification);
                    }
                    Reaction::RefreshChannels => {
                        if let Err(e) = self.refresh_channels().await {
                            warn!(error = %e, "Channel refresh failed");
                        }
                    }
                    Reaction::EnableValidator => {
                        let response = self.send_command(Command::Enable, &[]).await;
                        if !response.is_ok() {
                            warn!(status = %response.status, "Re-enable after payout failed");
                        }
                    }
                }
            }
        }

        Ok(events)
    }

    /// Re-read level and route of every channel
    pub async fn update_channel_data(&self) -> Result<()> {
        let _tracker = self.inner.tracker.lock().await;
        self.refresh_channels().await
    }

    /// Plan an exact payout of `amount` (minor units) from current levels
    pub fn plan_payout(&self, amount: u32) -> Option<DenominationPlan> {
        let channels = self.inner.channels.read();
        payout::resolve(amount, channels.as_slice())
    }

    /// True while the listener started as `generation` should keep running
    pub(crate) fn listener_active(&self, generation: u64) -> bool {
        self.is_listening() && self.inner.generation.load(Ordering::Acquire) == generation
    }

    /// Called by the listener when a poll fails
    ///
    /// Does nothing if that listener was stopped or replaced while the poll
    /// was in flight.
    pub(crate) async fn close_after_poll_failure(&self, generation: u64) {
        let mut link = self.inner.link.lock().await;
        if !self.listener_active(generation) {
            return;
        }

        self.inner.listening.store(false, Ordering::Release);
        drop(self.inner.listener.lock().take());

        link.keys = None;
        self.inner.session.close();
        if let Err(e) = link.transport.close().await {
            warn!(error = %e, "Closing port failed");
        }
    }

    // Helper methods

    fn ensure_connected(&self) -> Result<()> {
        if !self.is_connected() {
            return Err(Error::NotConnected);
        }
        Ok(())
    }

    fn stop_listening(&self) {
        self.inner.listening.store(false, Ordering::Release);
        self.inner.generation.fetch_add(1, Ordering::AcqRel);
        if let Some(listener) = self.inner.listener.lock().take() {
            listener.stop();
        }
    }

    /// Send and require an OK reply
    async fn request(&self, command: Command, params: &[u8]) -> Result<Response> {
        self.ensure_connected()?;
        self.send_command(command, params).await.into_result()
    }

    async fn simple(&self, command: Command, params: &[u8]) -> Result<()> {
        self.request(command, params).await.map(|_| ())
    }

    /// Level and route of every known channel; does not take the poll lock
    async fn refresh_channels(&self) -> Result<()> {
        for channel in self.channels() {
            self.get_denomination_level(channel.value, channel.currency)
                .await?;
            self.get_denomination_route(channel.value, channel.currency)
                .await?;
        }
        Ok(())
    }

    fn update_channel(
        &self,
        value: u32,
        currency: Currency,
        update: impl FnOnce(&mut ChannelTable, u8) -> bool,
    ) {
        let mut table = self.inner.channels.write();
        let channel = table
            .iter()
            .find(|c| c.value == value && c.currency == currency)
            .map(|c| c.channel);
        if let Some(channel) = channel {
            update(&mut table, channel);
        }
    }
}

/// Value (LE) and currency, as most payout commands take them
fn denomination(value: u32, currency: Currency) -> [u8; 7] {
    let mut bytes = [0u8; 7];
    bytes[..4].copy_from_slice(&value.to_le_bytes());
    bytes[4..].copy_from_slice(currency.as_bytes());
    bytes
}

fn option(test: bool) -> u8 {
    if test {
        payout_option::TEST
    } else {
        payout_option::PAYOUT
    }
}

fn malformed(command: Command, reason: &str) -> Error {
    ssprust_core::Error::MalformedReply {
        command,
        reason: reason.to_string(),
    }
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_create() {
        let device = Device::serial("/dev/ttyUSB0");
        assert!(!device.is_connected());
        assert!(!device.is_listening());
        assert_eq!(device.unit_type(), UnitType::Unknown);
        assert!(device.channels().is_empty());
    }

    #[test]
    fn test_denomination_layout() {
        assert_eq!(
            denomination(2000, Currency(*b"EUR")),
            [0xD0, 0x07, 0x00, 0x00, b'E', b'U', b'R']
        );
    }

    #[test]
    fn test_payout_option() {
        assert_eq!(option(true), 0x19);
        assert_eq!(option(false), 0x58);
    }

    #[tokio::test]
    async fn test_commands_require_connection() {
        let device = Device::serial("/dev/ttyUSB0");
        assert!(matches!(device.sync().await, Err(Error::NotConnected)));
        assert!(matches!(
            device.negotiate_encryption().await,
            Err(Error::NotConnected)
        ));
    }

    #[tokio::test]
    #[ignore] // Only run with real device
    async fn test_device_initialize() {
        let device = Device::serial("/dev/ttyUSB0");
        device.connect().await.unwrap();

        let setup = device.initialize().await.unwrap();
        println!("{:?}", setup);

        device.disconnect().await.unwrap();
    }
}
