//! Vendor status translation
//!
//! Bare-metal servers report an inventory hardware status and virtual guests
//! report a power state. Both collapse onto [`CanonicalStatus`], which is the
//! only status vocabulary exposed above the orchestrator. Translation is
//! total: unknown or missing vendor keys become `Unrecognized`.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::ResourceKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalStatus {
    Pending,
    Running,
    Suspended,
    Unrecognized,
}

impl fmt::Display for CanonicalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CanonicalStatus::Pending => write!(f, "pending"),
            CanonicalStatus::Running => write!(f, "running"),
            CanonicalStatus::Suspended => write!(f, "suspended"),
            CanonicalStatus::Unrecognized => write!(f, "unrecognized"),
        }
    }
}

/// Inventory state of a bare-metal server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HardwareStatus {
    Active,
    Deploy,
    Deploy2,
    MacWait,
    Reclaim,
    Unrecognized,
}

impl HardwareStatus {
    pub fn from_value(value: &str) -> Self {
        match normalize_key(value).as_str() {
            "ACTIVE" => HardwareStatus::Active,
            "DEPLOY" => HardwareStatus::Deploy,
            "DEPLOY2" => HardwareStatus::Deploy2,
            "MACWAIT" | "MAC_WAIT" => HardwareStatus::MacWait,
            "RECLAIM" => HardwareStatus::Reclaim,
            _ => HardwareStatus::Unrecognized,
        }
    }

    pub fn canonical(self) -> CanonicalStatus {
        match self {
            HardwareStatus::Deploy | HardwareStatus::Deploy2 | HardwareStatus::MacWait => {
                CanonicalStatus::Pending
            }
            HardwareStatus::Reclaim => CanonicalStatus::Suspended,
            HardwareStatus::Active => CanonicalStatus::Running,
            HardwareStatus::Unrecognized => CanonicalStatus::Unrecognized,
        }
    }
}

/// Power state of a virtual guest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PowerState {
    Halted,
    Paused,
    Running,
    Unrecognized,
}

impl PowerState {
    pub fn from_value(value: &str) -> Self {
        match normalize_key(value).as_str() {
            "HALTED" => PowerState::Halted,
            "PAUSED" => PowerState::Paused,
            "RUNNING" => PowerState::Running,
            _ => PowerState::Unrecognized,
        }
    }

    pub fn canonical(self) -> CanonicalStatus {
        match self {
            PowerState::Halted => CanonicalStatus::Pending,
            PowerState::Paused => CanonicalStatus::Suspended,
            PowerState::Running => CanonicalStatus::Running,
            PowerState::Unrecognized => CanonicalStatus::Unrecognized,
        }
    }
}

/// Translate a raw vendor status key for the given resource kind
pub fn translate(kind: ResourceKind, status: Option<&str>) -> CanonicalStatus {
    let Some(value) = status else {
        return CanonicalStatus::Unrecognized;
    };

    match kind {
        ResourceKind::BareMetal => HardwareStatus::from_value(value).canonical(),
        ResourceKind::VirtualGuest => PowerState::from_value(value).canonical(),
    }
}

/// Normalize `UpperCamel`, `lower_snake` and `UPPER_UNDERSCORE` keys to
/// `UPPER_UNDERSCORE`.
pub fn normalize_key(value: &str) -> String {
    let value = value.trim();
    let mut out = String::with_capacity(value.len() + 4);
    let mut prev_lower = false;

    for ch in value.chars() {
        if ch == '-' || ch == ' ' {
            out.push('_');
            prev_lower = false;
            continue;
        }
        if ch.is_ascii_uppercase() && prev_lower {
            out.push('_');
        }
        prev_lower = ch.is_ascii_lowercase() || ch.is_ascii_digit();
        out.push(ch.to_ascii_uppercase());
    }

    out
}
