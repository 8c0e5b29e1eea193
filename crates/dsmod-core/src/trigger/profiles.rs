use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::{TriggerEffect, TriggerMode, TriggerPair, TriggerProfile};
use crate::error::{Error, Result};

/// Trigger effects for one weapon, with an optional weapon-mod variant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeaponProfile {
    /// In-game name shown to the player, informational only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(flatten)]
    pub primary: TriggerPair,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modded: Option<TriggerPair>,
}

impl WeaponProfile {
    pub fn new(display_name: &str, primary: TriggerPair) -> Self {
        Self {
            display_name: Some(display_name.to_string()),
            primary,
            modded: None,
        }
    }

    pub fn with_mod(mut self, modded: TriggerPair) -> Self {
        self.modded = Some(modded);
        self
    }

    /// The pair to use, falling back to primary when no mod variant exists.
    pub fn pair(&self, modded: bool) -> (&TriggerPair, bool) {
        match (&self.modded, modded) {
            (Some(pair), true) => (pair, true),
            _ => (&self.primary, false),
        }
    }
}

/// Weapon id → trigger effects
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileTable {
    /// Sent while the current weapon's ammo pool is empty
    pub no_ammo: TriggerPair,
    pub weapons: BTreeMap<String, WeaponProfile>,
}

impl Default for ProfileTable {
    fn default() -> Self {
        Self {
            no_ammo: TriggerPair::neutral(),
            weapons: BTreeMap::new(),
        }
    }
}

impl ProfileTable {
    pub fn get(&self, weapon_id: &str) -> Option<&WeaponProfile> {
        self.weapons.get(weapon_id)
    }

    pub fn validate(&self) -> Result<()> {
        self.no_ammo.validate()?;
        for (id, profile) in &self.weapons {
            let check = |pair: &TriggerPair| {
                pair.validate()
                    .map_err(|e| Error::InvalidProfile(format!("{}: {}", id, e)))
            };
            check(&profile.primary)?;
            if let Some(modded) = &profile.modded {
                check(modded)?;
            }
        }
        Ok(())
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)?;
        let table: Self = serde_json::from_str(&content)?;
        table.validate()?;
        Ok(table)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Profiles shipped with the mod
    pub fn builtin() -> Self {
        use TriggerEffect as E;
        use TriggerMode as M;
        use TriggerProfile as P;

        let weapons = [
            (
                "WEAPON_PISTOL_DEFAULT",
                WeaponProfile::new(
                    "Grip",
                    TriggerPair::new(E::preset(P::Choppy, &[]), E::preset(P::Soft, &[])),
                )
                .with_mod(TriggerPair::new(
                    E::preset(P::Choppy, &[]),
                    E::preset(P::Medium, &[]),
                )),
            ),
            (
                "WEAPON_SHOTGUN_SINGLESHOT",
                WeaponProfile::new(
                    "Shatter",
                    TriggerPair::new(
                        E::custom(M::RigidA, &[60, 71, 56, 128, 195, 210, 255]),
                        E::preset(P::SlopeFeedback, &[0, 5, 1, 8]),
                    ),
                )
                .with_mod(TriggerPair::new(
                    E::custom(M::RigidA, &[60, 71, 56, 128, 195, 210, 255]),
                    E::preset(P::Machine, &[1, 8, 3, 3, 184, 0]),
                )),
            ),
            (
                "WEAPON_SMG_STANDARD",
                WeaponProfile::new(
                    "Spin",
                    TriggerPair::new(
                        E::custom(M::RigidA, &[71, 96, 128, 128, 128, 128, 128]),
                        E::preset(P::Vibration, &[3, 4, 14]),
                    ),
                ),
            ),
            (
                "WEAPON_RAILGUN_STANDARD",
                WeaponProfile::new(
                    "Pierce",
                    TriggerPair::new(
                        E::preset(P::Machine, &[1, 8, 3, 3, 184, 0]),
                        E::custom(M::PulseB, &[238, 215, 66, 120, 43, 160, 215]),
                    ),
                ),
            ),
            (
                "WEAPON_ROCKETLAUNCHER_TRIPLESHOT",
                WeaponProfile::new(
                    "Charge",
                    TriggerPair::new(
                        E::custom(M::Rigid, &[]),
                        E::custom(M::RigidA, &[209, 42, 232, 192, 232, 209, 232]),
                    ),
                ),
            ),
            (
                "WEAPON_DLC2_STICKYLAUNCHER",
                WeaponProfile::new(
                    "Surge",
                    TriggerPair::new(
                        E::preset(P::Feedback, &[3, 3]),
                        E::preset(P::VeryHard, &[]),
                    ),
                ),
            ),
        ];

        Self {
            no_ammo: TriggerPair::new(E::preset(P::Normal, &[]), E::preset(P::VerySoft, &[])),
            weapons: weapons
                .into_iter()
                .map(|(id, profile)| (id.to_string(), profile))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_is_valid() {
        let table = ProfileTable::builtin();
        assert!(table.validate().is_ok());
        assert_eq!(table.weapons.len(), 6);
        assert!(table.get("WEAPON_RAILGUN_STANDARD").is_some());
        assert!(table.get("WEAPON_BFG").is_none());
    }

    #[test]
    fn test_mod_variant_falls_back_to_primary() {
        let table = ProfileTable::builtin();
        let smg = table.get("WEAPON_SMG_STANDARD").unwrap();
        let (pair, modded) = smg.pair(true);
        assert!(!modded);
        assert_eq!(pair, &smg.primary);

        let shotgun = table.get("WEAPON_SHOTGUN_SINGLESHOT").unwrap();
        let (pair, modded) = shotgun.pair(true);
        assert!(modded);
        assert_eq!(Some(pair), shotgun.modded.as_ref());
    }

    #[test]
    fn test_load_rejects_oversized_params() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("profiles.json");
        let mut table = ProfileTable::builtin();
        table.weapons.insert(
            "WEAPON_BROKEN".to_string(),
            WeaponProfile::new(
                "Broken",
                TriggerPair::new(
                    TriggerEffect::preset(TriggerProfile::Machine, &[0; 12]),
                    TriggerEffect::neutral(),
                ),
            ),
        );
        table.save(&path).unwrap();

        let err = ProfileTable::load(&path).unwrap_err();
        assert!(err.to_string().contains("WEAPON_BROKEN"));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("profiles.json");
        let table = ProfileTable::builtin();
        table.save(&path).unwrap();
        assert_eq!(ProfileTable::load(&path).unwrap(), table);
    }
}
