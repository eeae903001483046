//! Wi-Fi soft access point adapter.
//!
//! Implements [`AccessPointPort`] — the open network a client joins in
//! serving mode to reach the command terminal.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: `EspWifi` in AP mode via `BlockingWifi`,
//!   TX power capped with `esp_wifi_set_max_tx_power`.
//! - **all other targets**: simulation that validates and logs; the host
//!   TCP listener is reachable on the loopback interface.

use log::{info, warn};

use crate::app::ports::{AccessPointPort, TransportError};

use super::utils::is_printable_ascii;

/// SSIDs are 1–32 printable ASCII bytes.
fn validate_ssid(ssid: &str) -> Result<(), TransportError> {
    if ssid.is_empty() || ssid.len() > 32 || !is_printable_ascii(ssid) {
        warn!("WiFi AP: invalid SSID '{}'", ssid);
        return Err(TransportError::AccessPointFailed);
    }
    Ok(())
}

/// `esp_wifi_set_max_tx_power` takes quarter-dBm units in 8..=84.
pub fn tx_power_quarter_dbm(dbm: f32) -> i8 {
    (dbm * 4.0).round().clamp(8.0, 84.0) as i8
}

// ───────────────────────────────────────────────────────────────
// SoftAp
// ───────────────────────────────────────────────────────────────

pub struct SoftAp {
    started: bool,
    #[cfg(target_os = "espidf")]
    wifi: esp_idf_svc::wifi::EspWifi<'static>,
    #[cfg(target_os = "espidf")]
    sys_loop: esp_idf_svc::eventloop::EspSystemEventLoop,
}

impl SoftAp {
    #[cfg(target_os = "espidf")]
    pub fn new(
        modem: esp_idf_hal::modem::Modem,
        sys_loop: esp_idf_svc::eventloop::EspSystemEventLoop,
        nvs: Option<esp_idf_svc::nvs::EspDefaultNvsPartition>,
    ) -> Result<Self, TransportError> {
        let wifi = esp_idf_svc::wifi::EspWifi::new(modem, sys_loop.clone(), nvs).map_err(|e| {
            warn!("WiFi AP: driver init failed: {:?}", e);
            TransportError::AccessPointFailed
        })?;
        Ok(Self {
            started: false,
            wifi,
            sys_loop,
        })
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn new() -> Self {
        Self { started: false }
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    #[cfg(target_os = "espidf")]
    fn platform_start(&mut self, ssid: &str, tx_power_dbm: f32) -> Result<(), TransportError> {
        use esp_idf_svc::wifi::{AccessPointConfiguration, AuthMethod, BlockingWifi, Configuration};

        let mut wifi = BlockingWifi::wrap(&mut self.wifi, self.sys_loop.clone())
            .map_err(|_| TransportError::AccessPointFailed)?;
        wifi.set_configuration(&Configuration::AccessPoint(AccessPointConfiguration {
            ssid: ssid.try_into().map_err(|_| TransportError::AccessPointFailed)?,
            auth_method: AuthMethod::None,
            channel: 1,
            ..Default::default()
        }))
        .map_err(|e| {
            warn!("WiFi AP: configuration rejected: {:?}", e);
            TransportError::AccessPointFailed
        })?;
        wifi.start().map_err(|_| TransportError::AccessPointFailed)?;
        wifi.wait_netif_up()
            .map_err(|_| TransportError::AccessPointFailed)?;

        let rc = unsafe {
            esp_idf_sys::esp_wifi_set_max_tx_power(tx_power_quarter_dbm(tx_power_dbm))
        };
        if rc != esp_idf_sys::ESP_OK {
            warn!("WiFi AP: failed to set TX power: esp_err_t={}", rc);
        }

        match wifi.wifi().ap_netif().get_ip_info() {
            Ok(ip) => info!("AP IP address: {}", ip.ip),
            Err(e) => warn!("WiFi AP: IP info unavailable: {:?}", e),
        }
        Ok(())
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_start(&mut self, ssid: &str, tx_power_dbm: f32) -> Result<(), TransportError> {
        info!(
            "WiFi AP(sim): '{}' up at {:.1} dBm (reach the terminal on 127.0.0.1)",
            ssid, tx_power_dbm
        );
        Ok(())
    }
}

#[cfg(not(target_os = "espidf"))]
impl Default for SoftAp {
    fn default() -> Self {
        Self::new()
    }
}

impl AccessPointPort for SoftAp {
    fn start(&mut self, ssid: &str, tx_power_dbm: f32) -> Result<(), TransportError> {
        validate_ssid(ssid)?;
        if self.started {
            return Ok(());
        }
        info!("WiFi AP: starting '{}'", ssid);
        self.platform_start(ssid, tx_power_dbm)?;
        self.started = true;
        Ok(())
    }
}
