#![allow(dead_code)]

use std::cell::Cell;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use pathmod_core::archive::{ArchiveTool, Invocation, ToolReport};
use pathmod_core::catalog::CATALOG;
use pathmod_core::patch::{Detect, Strategy};
use pathmod_core::process::{ProcessProbe, ToolError, ToolOutput};
use pathmod_core::save::{SaveHelper, SaveVariant};
use pathmod_core::GameLayout;
use walkdir::WalkDir;

/// Archive stand-in: the "asar" is a JSON map of relative path to contents.
#[derive(Default)]
pub struct JsonArchive {
    pub extracts: Cell<usize>,
    pub packs: Cell<usize>,
}

fn report() -> ToolReport {
    ToolReport {
        invocation: Invocation::Bundled,
        output: ToolOutput::default(),
        fallback_note: None,
    }
}

impl ArchiveTool for JsonArchive {
    fn extract(&self, archive: &Path, dest: &Path) -> Result<ToolReport, ToolError> {
        self.extracts.set(self.extracts.get() + 1);
        let files = read_archive(archive);
        write_tree(dest, &files);
        Ok(report())
    }

    fn pack(&self, src: &Path, archive: &Path) -> Result<ToolReport, ToolError> {
        self.packs.set(self.packs.get() + 1);
        write_archive(archive, &snapshot(src));
        Ok(report())
    }
}

pub struct BrokenArchive;

impl ArchiveTool for BrokenArchive {
    fn extract(&self, _: &Path, _: &Path) -> Result<ToolReport, ToolError> {
        Err(ToolError::NotFound {
            program: "npx".into(),
        })
    }

    fn pack(&self, _: &Path, _: &Path) -> Result<ToolReport, ToolError> {
        Err(ToolError::TimedOut {
            program: "npx".into(),
            secs: 300,
        })
    }
}

pub fn read_archive(archive: &Path) -> BTreeMap<String, String> {
    serde_json::from_str(&fs::read_to_string(archive).unwrap()).unwrap()
}

pub fn write_archive(archive: &Path, files: &BTreeMap<String, String>) {
    fs::write(archive, serde_json::to_string(files).unwrap()).unwrap();
}

pub fn write_tree(dir: &Path, files: &BTreeMap<String, String>) {
    for (rel, body) in files {
        let path = dir.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, body).unwrap();
    }
}

/// Every file under `dir`, keyed by `/`-separated relative path.
pub fn snapshot(dir: &Path) -> BTreeMap<String, String> {
    WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| {
            let rel = e.path().strip_prefix(dir).unwrap();
            let key = rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join("/");
            (key, String::from_utf8_lossy(&fs::read(e.path()).unwrap()).into_owned())
        })
        .collect()
}

pub struct Probe(pub bool);

impl ProcessProbe for Probe {
    fn is_running(&self, _: &str) -> bool {
        self.0
    }
}

/// Save helper stand-in: exports `.ldb` files of a store into one JSON
/// document and imports them back.
pub struct JsonSaves {
    pub original: PathBuf,
    pub modified: PathBuf,
    pub transfer: PathBuf,
    pub fail_export: bool,
}

impl JsonSaves {
    fn store(&self, variant: SaveVariant) -> &Path {
        match variant {
            SaveVariant::Original => &self.original,
            SaveVariant::Modified => &self.modified,
        }
    }
}

impl SaveHelper for JsonSaves {
    fn export(&self, variant: SaveVariant) -> Result<PathBuf, ToolError> {
        if self.fail_export {
            return Err(ToolError::Failed {
                program: "save_helper.js export".into(),
                code: Some(1),
                output: "LEVEL_LOCKED".into(),
            });
        }
        write_archive(&self.transfer, &snapshot(self.store(variant)));
        Ok(self.transfer.clone())
    }

    fn import(&self, transfer: &Path, variant: SaveVariant) -> Result<(), ToolError> {
        let files = read_archive(transfer);
        write_tree(self.store(variant), &files);
        Ok(())
    }
}

pub const TEXT_JS: &str = "export const text = {\n\
\tmenu: {\n\
\t\tsettings: {\n\
\t\t\tautoReset: ['Auto Reset', 'Auto reinicio', 'Auto reset', 'Auto reset', 'Auto reset', 'Auto-Reset', 'オートリセット', '자동 재시작', '自动重置', 'Auto reset'],\n\
\t\t\treset: {\n\
\t\t\t\t0: ['Off', 'Apagado', 'Arrêt', 'Desligado', 'Spento', 'Aus', 'オフ', '끄기', '关闭', 'Wył.'],\n\
\t\t\t\t1: ['Restart', 'Reiniciar', 'Recommencer', 'Reiniciar', 'Ricomincia', 'Neustarten', 'リスタート', '재시작', '重新开始', 'Restart'],\n\
\t\t\t\t2: ['Retry', 'Reintentar', 'Réessayer', 'Tentar', 'Riprova', 'Wiederholen', 'リトライ', '재시도', '重试', 'Ponów']\n\
\t\t\t},\n\
\t\t},\n\
\t},\n\
};\n";

pub const MAP_SCENE_JS: &str = "export class MapScene {\n\
\trenderRecords() {\n\
\t\tfor (let i = 0; i < 12; i++) {\n\
\t\t\tconst recordValue = this.main.player.records[i] ?? 0;\n\
\t\t\tthis.labels[i].innerText = `${Math.min(100, recordValue)}`;\n\
\t\t\tthis.stars[i] = Math.min(100, this.main.player.records[i]);\n\
\t\t}\n\
\t}\n\
}\n";

pub const CHALLENGE_SCENE_JS: &str = "export class ChallengeScene {\n\
\tapplyCap(pokemon, capLevel) {\n\
\t\tpokemon.forEach(poke => poke.setStatsLevel(capLevel));\n\
\t}\n\
}\n";

pub const BOX_SCENE_JS: &str = "export class BoxScene {\n\
\tcanStore(i) {\n\
\t\treturn i < 103;\n\
\t}\n\
}\n";

pub const ITEM_DATA_JS: &str = "export const itemData = {\n\
\tleftovers: {\n\
\t\tname: 'Leftovers',\n\
\t},\n\
\t// magmaStone: {\n\
\t// \tname: 'Magma Stone',\n\
\t// \trestriction: {\n\
\t// \t\ttype: 'fire',\n\
\t// \t},\n\
\t// \tprice: 50000,\n\
\t// },\n\
\tcharcoal: {\n\
\t\tname: 'Charcoal',\n\
\t},\n\
}\n\
\n\
export const itemListData = [\n\
\t'leftovers',\n\
\t'charcoal',\n\
]\n";

pub const MAIN_JS: &str = "const { app, BrowserWindow } = require('electron');\n\
app.whenReady().then(() => new BrowserWindow({}));\n";

pub const MAIN_MODDED_JS: &str = "const { app, BrowserWindow, globalShortcut } = require('electron');\n\
app.whenReady().then(() => {\n\
\tconst win = new BrowserWindow({});\n\
\tglobalShortcut.register('F12', () => win.webContents.toggleDevTools());\n\
});\n";

/// A small but representative slice of the shipped game sources.
pub fn vanilla_files() -> BTreeMap<String, String> {
    [
        ("main.js", MAIN_JS),
        ("src/js/file/text.js", TEXT_JS),
        ("src/js/game/scenes/MapScene.js", MAP_SCENE_JS),
        ("src/js/game/scenes/ChallengeScene.js", CHALLENGE_SCENE_JS),
        ("src/js/game/scenes/BoxScene.js", BOX_SCENE_JS),
        ("src/js/game/data/itemData.js", ITEM_DATA_JS),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

/// A game root with `resources/app.asar` holding `files` and an empty
/// fixtures folder.
pub fn game_with(files: &BTreeMap<String, String>) -> (tempfile::TempDir, GameLayout) {
    let dir = tempfile::tempdir().unwrap();
    let layout = GameLayout::new(dir.path(), Some(dir.path().join("fixtures")));
    fs::create_dir_all(&layout.resources).unwrap();
    fs::create_dir_all(&layout.fixtures).unwrap();
    write_archive(&layout.archive, files);
    (dir, layout)
}

pub const GAME_JS: &str = "export class Game {\n\
\tanimate(time) {\n\
\t\tif (this.stopped) return;\n\
\t\tthis.update(time - this.last);\n\
\t}\n\
}\n";

pub const GAME_MODDED_JS: &str = "export class Game {\n\
\tanimate(time) {\n\
\t\tconst dt = this.stopped ? 0 : time - this.last;\n\
\t\tthis.update(dt * this.speed);\n\
\t}\n\
}\n";

pub const MENU_SCENE_JS: &str = "export class MenuScene {\n\
\tupdateAutoReset = (dir) => {\n\
\x20\x20\x20\x20\tlet pos = Number(this.main.autoReset) + dir;\n\
\t\tif (pos < 0) pos = 2;\n\
\t\telse if (pos == 3) pos = 0;\n\
\t}\n\
}\n";

pub const NEW_GAME_SCENE_JS: &str = "export class NewGameScene {\n\
\tclose() {\n\
\t\tsuper.close();\n\
\t\tthis.main.team.addPokemon(new Pokemon(STARTER[this.starterSelected], 1, null, this.main));\n\
\t\tthis.main.shop.eggList.splice(this.starterSelected, 1);\n\
\t}\n\
}\n";

pub const SHOP_SCENE_JS: &str = "class DisplayPokemon extends GameScene {\n\
\topen(pokemon) {\n\
\t\tplaySound('results', 'ui');\n\
\t\tthis.pokemon = pokemon;\n\
\n\
\t\tsuper.open();\n\
\t\tthis.update();\n\
\t}\n\
}\n";

pub const POKEMON_DATA_JS: &str = "export const eggListData = [\n\
\t'natu', 'spoink', 'murkrow',\n\
];\n";

pub const SCENES_CSS: &str = ".msrre {\n\
\tvertical-align: middle;\n\
\ttop: -2px;\n\
}\n";

/// Every catalog target, with a fixture for each whole-file entry and one
/// shiny sprite, so the whole catalog can run.
pub fn full_game(layout: &GameLayout) -> BTreeMap<String, String> {
    let mut files = vanilla_files();
    for (rel, body) in [
        ("src/js/game/Game.js", GAME_JS),
        ("src/js/game/scenes/MenuScene.js", MENU_SCENE_JS),
        ("src/js/game/scenes/NewGameScene.js", NEW_GAME_SCENE_JS),
        ("src/js/game/scenes/ShopScene.js", SHOP_SCENE_JS),
        ("src/js/game/data/pokemonData.js", POKEMON_DATA_JS),
        ("src/css/scenes.css", SCENES_CSS),
    ] {
        files.insert(rel.to_string(), body.to_string());
    }

    for entry in CATALOG {
        if let (Detect::MatchesFixture, Strategy::WholeFile { fixture, .. }) =
            (entry.detect, entry.strategy)
        {
            files
                .entry(entry.target.to_string())
                .or_insert_with(|| format!("export class {} {{}}\n", entry.key));
            fs::write(
                layout.fixtures.join(fixture),
                format!("export class {} {{\n\tmodded() {{ return 1; }}\n}}\n", entry.key),
            )
            .unwrap();
        }
    }
    fs::write(layout.fixtures.join("main.modded.js"), MAIN_MODDED_JS).unwrap();
    fs::write(layout.fixtures.join("Game.modded.js"), GAME_MODDED_JS).unwrap();

    let sprites = layout.fixtures.join("shiny_sprites");
    fs::create_dir_all(&sprites).unwrap();
    fs::write(sprites.join("charmander.png"), [0x89, b'P', b'N', b'G']).unwrap();

    write_archive(&layout.archive, &files);
    files
}
