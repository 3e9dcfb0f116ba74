use crate::errors::{CaptureError, NoDeviceError};
use common::{RetryError, RetryPolicy, retry_fixed};
use std::sync::atomic::AtomicBool;
use std::time::Duration;

/// Which way a camera points, as far as the driver lets us tell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Facing {
    Back,
    Front,
    External,
    Unknown,
}

impl Facing {
    /// Guess from the driver's card and bus names.
    pub fn from_names(card: &str, bus: &str) -> Self {
        let card = card.to_ascii_lowercase();
        if ["rear", "back", "world"].iter().any(|k| card.contains(k)) {
            Facing::Back
        } else if ["front", "user", "face"].iter().any(|k| card.contains(k)) {
            Facing::Front
        } else if bus.starts_with("usb") {
            Facing::External
        } else {
            Facing::Unknown
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub index: u32,
    pub name: String,
    pub facing: Facing,
}

/// Lists capture-capable devices currently present.
pub trait DeviceEnumerator {
    fn enumerate(&self) -> Result<Vec<DeviceInfo>, CaptureError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceRetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl DeviceRetryPolicy {
    pub const DEFAULT_ATTEMPTS: u32 = 10;
    pub const DEFAULT_DELAY: Duration = Duration::from_millis(500);
}

impl Default for DeviceRetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: Self::DEFAULT_ATTEMPTS,
            delay: Self::DEFAULT_DELAY,
        }
    }
}

impl From<DeviceRetryPolicy> for RetryPolicy {
    fn from(policy: DeviceRetryPolicy) -> Self {
        RetryPolicy::new(policy.max_attempts, policy.delay)
    }
}

/// Picks the camera to open, retrying while none is available.
///
/// Preference order on each attempt: the explicitly requested index, then a
/// rear-facing device, then whatever comes first.
pub struct DeviceSelector<E> {
    enumerator: E,
    policy: DeviceRetryPolicy,
    preferred_index: Option<u32>,
}

impl<E: DeviceEnumerator> DeviceSelector<E> {
    pub fn new(enumerator: E, policy: DeviceRetryPolicy) -> Self {
        Self {
            enumerator,
            policy,
            preferred_index: None,
        }
    }

    pub fn with_preferred_index(mut self, index: Option<u32>) -> Self {
        self.preferred_index = index;
        self
    }

    pub fn policy(&self) -> DeviceRetryPolicy {
        self.policy
    }

    /// Blocks for up to `max_attempts * delay`. Raising `cancel` stops the
    /// search before the next attempt.
    pub fn select(&self, cancel: &AtomicBool) -> Result<DeviceInfo, CaptureError> {
        let result = retry_fixed(self.policy.into(), cancel, "Camera selection", |attempt| {
            let devices = self.enumerator.enumerate()?;
            tracing::debug!(attempt, found = devices.len(), "Enumerated cameras");
            self.pick(devices).ok_or(CaptureError::NoDevicesFound)
        });

        match result {
            Ok(device) => {
                tracing::info!(
                    index = device.index,
                    name = %device.name,
                    facing = ?device.facing,
                    "Camera selected"
                );
                Ok(device)
            }
            Err(RetryError::Exhausted { attempts, last }) => Err(NoDeviceError {
                attempts,
                last_error: last.to_string(),
            }
            .into()),
            Err(RetryError::Cancelled { .. }) => Err(CaptureError::Cancelled),
        }
    }

    fn pick(&self, devices: Vec<DeviceInfo>) -> Option<DeviceInfo> {
        if let Some(index) = self.preferred_index
            && let Some(device) = devices.iter().find(|d| d.index == index)
        {
            return Some(device.clone());
        }

        if let Some(rear) = devices.iter().find(|d| d.facing == Facing::Back) {
            return Some(rear.clone());
        }

        devices.into_iter().next()
    }
}
