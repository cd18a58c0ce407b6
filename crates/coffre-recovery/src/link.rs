//! Device link payload
//!
//! A linked device scans a small JSON document (usually rendered as a QR
//! code) naming the origin device, its vault, and when the payload was
//! issued:
//!
//! ```json
//! {"device_id":"…","vault_id":"…","timestamp":1760000000000}
//! ```

use std::time::{SystemTime, UNIX_EPOCH};

use coffre_core::{CoffreError, CoffreResult, DeviceId, VaultId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceLink {
    pub device_id: DeviceId,
    pub vault_id: VaultId,
    /// Issue time, milliseconds since the Unix epoch
    pub timestamp: u64,
}

impl DeviceLink {
    /// Build a payload stamped with the current time.
    pub fn new(device_id: DeviceId, vault_id: VaultId) -> Self {
        Self {
            device_id,
            vault_id,
            timestamp: now_millis(),
        }
    }

    pub fn to_payload(&self) -> CoffreResult<String> {
        serde_json::to_string(self)
            .map_err(|e| CoffreError::InvalidLinkPayload(format!("serialize: {e}")))
    }

    /// Parse a scanned payload. Missing fields, malformed ids, and a zero
    /// timestamp are all rejected.
    pub fn parse(payload: &str) -> CoffreResult<Self> {
        let link: DeviceLink = serde_json::from_str(payload.trim())
            .map_err(|e| CoffreError::InvalidLinkPayload(e.to_string()))?;
        if link.timestamp == 0 {
            return Err(CoffreError::InvalidLinkPayload(
                "timestamp must be non-zero".into(),
            ));
        }
        Ok(link)
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
