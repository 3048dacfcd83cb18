//! Edits on an exported save (the save helper's transfer file).
//!
//! Documents come either wrapped as `{ "save": { ... } }` or bare; both are
//! handled and written back in the shape they were read.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::path::Path;

use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::catalog::EXPANDED_EGG_LIST;
use crate::{PatchError, Result};

pub const TEAM_SLOTS: usize = 6;
pub const MIN_RECORDS: usize = 9;
pub const MAX_RECORD: u64 = 100;
pub const STARTING_EGG_PRICE: u64 = 10;

#[derive(Debug, Clone, PartialEq)]
pub struct SaveDocument {
    root: Value,
}

impl SaveDocument {
    pub fn from_value(root: Value) -> Result<Self> {
        if !root.is_object() {
            return Err(PatchError::Config("save document is not a JSON object".into()));
        }
        Ok(Self { root })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)?;
        Self::from_value(serde_json::from_str(&data)?)
    }

    pub fn store(&self, path: &Path) -> Result<()> {
        fs::write(path, serde_json::to_string(&self.root)?)?;
        Ok(())
    }

    pub fn into_value(self) -> Value {
        self.root
    }

    fn save(&self) -> &Value {
        self.root.get("save").unwrap_or(&self.root)
    }

    fn save_mut(&mut self) -> &mut Map<String, Value> {
        let wrapped = self.root.get("save").map(Value::is_object).unwrap_or(false);
        let target = if wrapped {
            &mut self.root["save"]
        } else {
            &mut self.root
        };
        ensure_object(target)
    }

    fn section_mut(&mut self, key: &str) -> &mut Map<String, Value> {
        let entry = self
            .save_mut()
            .entry(key.to_string())
            .or_insert_with(|| json!({}));
        ensure_object(entry)
    }

    fn list_mut(&mut self, key: &str) -> &mut Vec<Value> {
        let entry = self
            .save_mut()
            .entry(key.to_string())
            .or_insert_with(|| json!([]));
        if !entry.is_array() {
            *entry = json!([]);
        }
        match entry {
            Value::Array(items) => items,
            _ => unreachable!("replaced with an array above"),
        }
    }

    fn list(&self, key: &str) -> &[Value] {
        self.save()
            .get(key)
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn team(&self) -> &[Value] {
        self.list("team")
    }

    pub fn boxed(&self) -> &[Value] {
        self.list("box")
    }

    pub fn gold(&self) -> u64 {
        self.save()["player"]["gold"].as_u64().unwrap_or(0)
    }

    pub fn stars(&self) -> u64 {
        self.save()["player"]["stars"].as_u64().unwrap_or(0)
    }

    /// Slots 0..6 are the team, everything after is the box.
    pub fn slot(&self, index: usize) -> Option<&Value> {
        let (list, i) = split_slot(index);
        self.list(list).get(i).filter(|v| !v.is_null())
    }

    pub fn set_slot(&mut self, index: usize, pokemon: Value) {
        let (list, i) = split_slot(index);
        let items = self.list_mut(list);
        if items.len() <= i {
            items.resize(i + 1, Value::Null);
        }
        items[i] = pokemon;
        while items.last().map(Value::is_null).unwrap_or(false) {
            items.pop();
        }
    }

    /// Remove a slot; later slots of the same list move up.
    pub fn delete_slot(&mut self, index: usize) -> bool {
        let (list, i) = split_slot(index);
        let items = self.list_mut(list);
        if i < items.len() {
            items.remove(i);
            true
        } else {
            false
        }
    }

    pub fn set_gold(&mut self, amount: u64) {
        self.section_mut("player").insert("gold".into(), json!(amount));
    }

    /// Max every stage record and recompute stars. Returns the new star total.
    pub fn complete_all_stages(&mut self) -> u64 {
        let player = self.section_mut("player");
        let mut count = player
            .get("records")
            .and_then(Value::as_array)
            .map(Vec::len)
            .unwrap_or(0);
        count = count.max(MIN_RECORDS);
        let stars = MAX_RECORD * count as u64;
        player.insert("records".into(), json!(vec![MAX_RECORD; count]));
        player.insert("stars".into(), json!(stars));
        stars
    }

    /// Append every expanded-list egg the shop lacks, keeping existing order.
    pub fn inject_missing_eggs(&mut self) -> usize {
        let shop = self.section_mut("shop");
        let eggs = shop.entry("eggList").or_insert_with(|| json!([]));
        if !eggs.is_array() {
            *eggs = json!([]);
        }
        let Value::Array(eggs) = eggs else {
            return 0;
        };
        let present: HashSet<String> = eggs
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect();
        let missing: Vec<&str> = EXPANDED_EGG_LIST
            .iter()
            .copied()
            .filter(|egg| !present.contains(*egg))
            .collect();
        eggs.extend(missing.iter().map(|egg| json!(egg)));
        missing.len()
    }

    pub fn reset_eggs(&mut self) {
        let shop = self.section_mut("shop");
        shop.insert("eggList".into(), json!(EXPANDED_EGG_LIST));
        shop.insert("eggPrice".into(), json!(STARTING_EGG_PRICE));
    }

    fn pokemon_mut(&mut self) -> Vec<&mut Map<String, Value>> {
        let save = self.save_mut();
        let mut all: Vec<&mut Map<String, Value>> = Vec::new();
        for (key, value) in save.iter_mut() {
            if key == "team" || key == "box" {
                if let Value::Array(items) = value {
                    all.extend(items.iter_mut().filter_map(Value::as_object_mut));
                }
            }
        }
        all
    }

    /// Returns how many Pokemon changed.
    pub fn set_all_shiny(&mut self) -> usize {
        let mut changed = 0;
        for mon in self.pokemon_mut() {
            if mon.get("isShiny").and_then(Value::as_bool) != Some(true) {
                mon.insert("isShiny".into(), Value::Bool(true));
                changed += 1;
            }
        }
        changed
    }

    pub fn evolve_all(&mut self, evolutions: &EvolutionMap) -> usize {
        self.rewrite_species(|key| evolutions.final_form(key))
    }

    pub fn devolve_all(&mut self, evolutions: &EvolutionMap) -> usize {
        self.rewrite_species(|key| evolutions.base_form(key))
    }

    fn rewrite_species(&mut self, map: impl Fn(&str) -> String) -> usize {
        let mut changed = 0;
        for mon in self.pokemon_mut() {
            let Some(old) = mon.get("specieKey").and_then(Value::as_str) else {
                continue;
            };
            let new = map(old);
            if new != old {
                mon.insert("specieKey".into(), Value::String(new));
                changed += 1;
            }
        }
        changed
    }
}

fn split_slot(index: usize) -> (&'static str, usize) {
    if index < TEAM_SLOTS {
        ("team", index)
    } else {
        ("box", index - TEAM_SLOTS)
    }
}

fn ensure_object(value: &mut Value) -> &mut Map<String, Value> {
    if !value.is_object() {
        *value = json!({});
    }
    match value {
        Value::Object(map) => map,
        _ => unreachable!("replaced with an object above"),
    }
}

#[derive(Debug, Clone, Deserialize)]
struct Evolution {
    evolves_to: String,
}

#[derive(Debug, Clone, Deserialize)]
struct PokemonData {
    #[serde(default)]
    evolutions: BTreeMap<String, Evolution>,
}

/// Species → next evolution, as listed in `pokemon_data.json`.
#[derive(Debug, Clone, Default)]
pub struct EvolutionMap {
    next: HashMap<String, String>,
    prev: HashMap<String, String>,
}

impl EvolutionMap {
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut map = Self::default();
        for (from, to) in pairs {
            let (from, to) = (from.into(), to.into());
            map.prev.insert(to.clone(), from.clone());
            map.next.insert(from, to);
        }
        map
    }

    pub fn load(path: &Path) -> Result<Self> {
        let data: PokemonData = serde_json::from_str(&fs::read_to_string(path)?)?;
        Ok(Self::from_pairs(
            data.evolutions.into_iter().map(|(k, v)| (k, v.evolves_to)),
        ))
    }

    pub fn final_form(&self, key: &str) -> String {
        walk(&self.next, key)
    }

    pub fn base_form(&self, key: &str) -> String {
        walk(&self.prev, key)
    }
}

/// Follow `links` from `key` until it ends or revisits a species.
fn walk(links: &HashMap<String, String>, key: &str) -> String {
    let mut seen = HashSet::new();
    let mut current = key.to_string();
    while let Some(next) = links.get(&current) {
        if !seen.insert(current.clone()) {
            break;
        }
        current = next.clone();
    }
    current
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mon(species: &str) -> Value {
        json!({ "specieKey": species, "lvl": 5, "isShiny": false })
    }

    fn wrapped() -> SaveDocument {
        SaveDocument::from_value(json!({
            "save": {
                "player": { "gold": 50, "records": [10, 20], "stars": 30 },
                "team": [mon("charmander"), mon("pidgey")],
                "box": [mon("magikarp")],
                "shop": { "eggList": ["natu", "spoink"], "eggPrice": 400 }
            }
        }))
        .unwrap()
    }

    #[test]
    fn slots_span_team_then_box() {
        let doc = wrapped();
        assert_eq!(doc.slot(1).unwrap()["specieKey"], "pidgey");
        assert_eq!(doc.slot(TEAM_SLOTS).unwrap()["specieKey"], "magikarp");
        assert!(doc.slot(TEAM_SLOTS + 1).is_none());
    }

    #[test]
    fn set_slot_pads_and_trims() {
        let mut doc = wrapped();
        doc.set_slot(TEAM_SLOTS + 3, mon("ditto"));
        assert_eq!(doc.boxed().len(), 4);
        assert!(doc.boxed()[2].is_null());
        doc.set_slot(TEAM_SLOTS + 3, Value::Null);
        assert_eq!(doc.boxed().len(), 1);
    }

    #[test]
    fn delete_slot_shifts_team() {
        let mut doc = wrapped();
        assert!(doc.delete_slot(0));
        assert_eq!(doc.slot(0).unwrap()["specieKey"], "pidgey");
        assert!(!doc.delete_slot(5));
    }

    #[test]
    fn stages_fill_to_minimum() {
        let mut doc = wrapped();
        assert_eq!(doc.complete_all_stages(), 900);
        assert_eq!(doc.stars(), 900);
        assert_eq!(
            doc.clone().into_value()["save"]["player"]["records"]
                .as_array()
                .unwrap()
                .len(),
            MIN_RECORDS
        );
    }

    #[test]
    fn bare_layout_is_supported() {
        let mut doc = SaveDocument::from_value(json!({ "player": { "gold": 1 } })).unwrap();
        doc.set_gold(999);
        let value = doc.into_value();
        assert_eq!(value["player"]["gold"], 999);
        assert!(value.get("save").is_none());
    }

    #[test]
    fn missing_eggs_are_appended_in_order() {
        let mut doc = wrapped();
        let added = doc.inject_missing_eggs();
        assert_eq!(added, EXPANDED_EGG_LIST.len() - 2);
        let value = doc.into_value();
        let eggs = value["save"]["shop"]["eggList"].as_array().unwrap();
        assert_eq!(eggs[0], "natu");
        assert_eq!(eggs[2], "charmander");
        assert_eq!(eggs.len(), EXPANDED_EGG_LIST.len());
    }

    #[test]
    fn reset_eggs_restores_price() {
        let mut doc = wrapped();
        doc.reset_eggs();
        let value = doc.into_value();
        assert_eq!(value["save"]["shop"]["eggPrice"], STARTING_EGG_PRICE);
        assert_eq!(value["save"]["shop"]["eggList"][0], "charmander");
    }

    #[test]
    fn shiny_counts_only_changes() {
        let mut doc = wrapped();
        doc.set_slot(0, json!({ "specieKey": "charmander", "isShiny": true }));
        assert_eq!(doc.set_all_shiny(), 2);
        assert_eq!(doc.set_all_shiny(), 0);
    }

    #[test]
    fn evolution_walks_both_ways() {
        let evos = EvolutionMap::from_pairs([
            ("charmander", "charmeleon"),
            ("charmeleon", "charizard"),
            ("pidgey", "pidgeotto"),
        ]);
        let mut doc = wrapped();
        assert_eq!(doc.evolve_all(&evos), 2);
        assert_eq!(doc.slot(0).unwrap()["specieKey"], "charizard");
        assert_eq!(doc.devolve_all(&evos), 2);
        assert_eq!(doc.slot(1).unwrap()["specieKey"], "pidgey");
    }

    #[test]
    fn evolution_cycle_terminates() {
        let evos = EvolutionMap::from_pairs([("a", "b"), ("b", "a")]);
        let end = evos.final_form("a");
        assert!(end == "a" || end == "b");
    }
}
