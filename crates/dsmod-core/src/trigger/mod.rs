//! Adaptive trigger effects and the device they are sent to.

mod device;
mod profiles;

pub use device::*;
pub use profiles::*;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};

use crate::error::{Error, Result};

/// Maximum parameter bytes a preset accepts
pub const MAX_PRESET_PARAMS: usize = 11;
/// Maximum force bytes of a raw custom mode
pub const MAX_CUSTOM_BYTES: usize = 7;

/// Named presets understood by the device library
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    EnumString,
    IntoStaticStr,
    Display,
)]
pub enum TriggerProfile {
    Normal,
    GameCube,
    VerySoft,
    Soft,
    Medium,
    Hard,
    VeryHard,
    Hardest,
    Rigid,
    VibrateTrigger,
    Choppy,
    CustomTriggerValue,
    Resistance,
    Bow,
    Galloping,
    SemiAutomaticGun,
    AutomaticGun,
    Machine,
    VibrateTriggerPulse,
    SlopeFeedback,
    MultiplePositionFeedback,
    MultiplePositionVibration,
    Feedback,
    Vibration,
    Weapon,
}

/// Raw custom waveform modes that bypass the presets
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    EnumString,
    IntoStaticStr,
    Display,
)]
pub enum TriggerMode {
    Off,
    Rigid,
    Pulse,
    #[serde(rename = "Rigid_A")]
    #[strum(serialize = "Rigid_A")]
    RigidA,
    #[serde(rename = "Rigid_B")]
    #[strum(serialize = "Rigid_B")]
    RigidB,
    #[serde(rename = "Rigid_AB")]
    #[strum(serialize = "Rigid_AB")]
    RigidAB,
    #[serde(rename = "Pulse_A")]
    #[strum(serialize = "Pulse_A")]
    PulseA,
    #[serde(rename = "Pulse_B")]
    #[strum(serialize = "Pulse_B")]
    PulseB,
    #[serde(rename = "Pulse_AB")]
    #[strum(serialize = "Pulse_AB")]
    PulseAB,
    Calibration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
pub enum TriggerSide {
    Left,
    Right,
}

/// Effect for one trigger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TriggerEffect {
    Preset {
        profile: TriggerProfile,
        #[serde(default)]
        params: Vec<u8>,
    },
    Custom {
        mode: TriggerMode,
        #[serde(default)]
        bytes: Vec<u8>,
    },
}

impl TriggerEffect {
    pub fn preset(profile: TriggerProfile, params: &[u8]) -> Self {
        Self::Preset {
            profile,
            params: params.to_vec(),
        }
    }

    pub fn custom(mode: TriggerMode, bytes: &[u8]) -> Self {
        Self::Custom {
            mode,
            bytes: bytes.to_vec(),
        }
    }

    pub fn neutral() -> Self {
        Self::preset(TriggerProfile::Normal, &[])
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Preset { profile, params } if params.len() > MAX_PRESET_PARAMS => {
                Err(Error::InvalidProfile(format!(
                    "{} takes at most {} params, got {}",
                    profile,
                    MAX_PRESET_PARAMS,
                    params.len()
                )))
            }
            Self::Custom { mode, bytes } if bytes.len() > MAX_CUSTOM_BYTES => {
                Err(Error::InvalidProfile(format!(
                    "custom {} takes at most {} bytes, got {}",
                    mode,
                    MAX_CUSTOM_BYTES,
                    bytes.len()
                )))
            }
            _ => Ok(()),
        }
    }
}

/// Effects for both analog triggers (L2, R2)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerPair {
    pub left: TriggerEffect,
    pub right: TriggerEffect,
}

impl TriggerPair {
    pub fn new(left: TriggerEffect, right: TriggerEffect) -> Self {
        Self { left, right }
    }

    pub fn neutral() -> Self {
        Self::new(TriggerEffect::neutral(), TriggerEffect::neutral())
    }

    pub fn validate(&self) -> Result<()> {
        self.left.validate()?;
        self.right.validate()
    }
}
