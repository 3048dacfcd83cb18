//! Named feature groups offered to the operator, each expanding to catalog
//! entries.

use crate::catalog;
use crate::patch::PatchEntry;
use crate::{PatchError, Result};

#[derive(Debug, Clone, Copy)]
pub struct FeatureGroup {
    pub key: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub default: bool,
    pub entries: &'static [&'static str],
}

pub static FEATURES: &[FeatureGroup] = &[
    FeatureGroup {
        key: "pause_micro",
        name: "Pause Micromanagement",
        description: "Deploy, move, swap, and retire towers while the game is paused",
        default: true,
        entries: &["pause_micromanagement"],
    },
    FeatureGroup {
        key: "speed",
        name: "10x Speed",
        description: "Adds 2x, 3x, 5x, and 10x game speed options",
        default: true,
        entries: &["speed"],
    },
    FeatureGroup {
        key: "endless",
        name: "Endless Mode",
        description: "Continue past wave 100 with scaling difficulty and checkpoints",
        default: true,
        entries: &[
            "endless_mode",
            "endless_waves",
            "endless_checkpoints",
            "enemy_scaling",
            "profile_endless_stats",
        ],
    },
    FeatureGroup {
        key: "infinite_levels",
        name: "Infinite Levels",
        description: "Remove level 100 cap, asymptotic stat scaling",
        default: true,
        entries: &["pokemon_mods"],
    },
    FeatureGroup {
        key: "shiny",
        name: "Shiny Eggs & Starters (1/30)",
        description: "1 in 30 chance for shiny Pokemon from eggs and starters",
        default: true,
        entries: &["shiny_eggs", "shiny_starters", "shiny_reveal", "shiny_sprites"],
    },
    FeatureGroup {
        key: "auto_continue",
        name: "Auto-Continue Option",
        description: "Adds \"Continue\" to auto-reset options for endless mode",
        default: true,
        entries: &["text_continue_option", "menu_autoreset_range"],
    },
    FeatureGroup {
        key: "wave_record",
        name: "Wave Record Uncap",
        description: "Display wave records above 100 on the map",
        default: true,
        entries: &["map_record_uncap"],
    },
    FeatureGroup {
        key: "ui",
        name: "UI Improvements",
        description: "Item tooltips, save/load tooltips, and visual polish",
        default: true,
        entries: &["item_tooltips", "ui_mods", "emoji_font_fix"],
    },
    FeatureGroup {
        key: "box_expansion",
        name: "Box Expansion",
        description: "Expand Pokemon storage to 200 box slots",
        default: true,
        entries: &["box_expansion"],
    },
    FeatureGroup {
        key: "egg_shop",
        name: "Expanded Egg Shop",
        description: "Sell the Pokemon that exist in game data but never appear in the egg shop",
        default: true,
        entries: &["expanded_egg_list"],
    },
    FeatureGroup {
        key: "deltatime",
        name: "Delta Time Fixes",
        description: "Smoother animations and accurate projectile timing",
        default: true,
        entries: &["tower_deltatime", "projectile_scaling", "pokemonscene_mods"],
    },
    FeatureGroup {
        key: "devtools",
        name: "Developer Tools (F12)",
        description: "Enable F12/Ctrl+Shift+I for browser dev tools",
        default: true,
        entries: &["devtools"],
    },
    FeatureGroup {
        key: "challenge_fix",
        name: "Challenge Level Cap Fix",
        description: "Level cap only lowers high-level Pokemon instead of boosting low-level ones",
        default: true,
        entries: &["challenge_levelcap_fix"],
    },
    FeatureGroup {
        key: "hidden_items",
        name: "Unlock Hidden Item(s)",
        description: "Unlocks the Magma Stone, already supported by the game code",
        default: true,
        entries: &["hidden_items"],
    },
];

pub fn find(key: &str) -> Option<&'static FeatureGroup> {
    FEATURES.iter().find(|f| f.key == key)
}

/// Keys of every group enabled by default.
pub fn defaults() -> Vec<&'static str> {
    FEATURES.iter().filter(|f| f.default).map(|f| f.key).collect()
}

/// Expand group keys to catalog entries, deduplicated and in catalog order.
pub fn expand<S: AsRef<str>>(selected: &[S]) -> Result<Vec<&'static PatchEntry>> {
    let mut picked = vec![false; catalog::CATALOG.len()];
    for key in selected {
        let key = key.as_ref();
        let group =
            find(key).ok_or_else(|| PatchError::Config(format!("unknown feature '{key}'")))?;
        for entry in group.entries {
            let idx = catalog::position(entry).ok_or_else(|| {
                PatchError::Config(format!("feature '{key}' names unknown entry '{entry}'"))
            })?;
            picked[idx] = true;
        }
    }
    Ok(catalog::CATALOG
        .iter()
        .zip(picked)
        .filter_map(|(entry, on)| on.then_some(entry))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_group_names_real_entries() {
        for group in FEATURES {
            for entry in group.entries {
                assert!(catalog::find(entry).is_some(), "{} -> {entry}", group.key);
            }
        }
    }

    #[test]
    fn groups_cover_the_catalog() {
        let all: Vec<&str> = FEATURES.iter().map(|f| f.key).collect();
        assert_eq!(expand(&all).unwrap().len(), catalog::CATALOG.len());
    }

    #[test]
    fn expansion_follows_catalog_order() {
        let keys: Vec<&str> = expand(&["pause_micro", "speed", "speed"])
            .unwrap()
            .iter()
            .map(|e| e.key)
            .collect();
        assert_eq!(keys, ["speed", "pause_micromanagement"]);
    }

    #[test]
    fn unknown_group_is_rejected() {
        assert!(matches!(expand(&["warp"]), Err(PatchError::Config(_))));
    }
}
