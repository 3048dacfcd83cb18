//! The fixed catalog of game modifications, in application order.
//!
//! Entries touching the same file are ordered so that later detections see
//! earlier edits (`speed` installs Game.js before `pause_micromanagement`
//! verifies it).

use std::sync::OnceLock;

use regex::Regex;

use crate::patch::{Detect, Edit, PatchEntry, PatchFailure, Strategy};
use crate::text::{self, indent_of, Syntax};

const NO_EDITS: &[Edit] = &[];

const fn whole_file(fixture: &'static str) -> Strategy {
    Strategy::WholeFile {
        fixture,
        inline: NO_EDITS,
        verify: None,
    }
}

pub static CATALOG: &[PatchEntry] = &[
    PatchEntry {
        key: "devtools",
        label: "main.js: DevTools on F12 / Ctrl+Shift+I",
        target: "main.js",
        detect: Detect::MatchesFixture,
        strategy: whole_file("main.modded.js"),
    },
    PatchEntry {
        key: "speed",
        label: "Game.js: 2x/3x/5x/10x speed",
        target: "src/js/game/Game.js",
        detect: Detect::MatchesFixture,
        strategy: whole_file("Game.modded.js"),
    },
    PatchEntry {
        key: "pause_micromanagement",
        label: "Game.js: pause micromanagement",
        target: "src/js/game/Game.js",
        detect: Detect::Custom(pause_ready),
        strategy: Strategy::WholeFile {
            fixture: "Game.modded.js",
            inline: NO_EDITS,
            verify: Some(verify_pause),
        },
    },
    PatchEntry {
        key: "text_continue_option",
        label: "text.js: Continue auto-reset option",
        target: "src/js/file/text.js",
        detect: Detect::Custom(has_continue_row),
        strategy: Strategy::Pattern {
            exact: NO_EDITS,
            fallback: add_continue_row,
        },
    },
    PatchEntry {
        key: "menu_autoreset_range",
        label: "MenuScene.js: auto-reset cycles 0-3",
        target: "src/js/game/scenes/MenuScene.js",
        detect: Detect::Contains("else if (pos == 4) pos = 0;"),
        strategy: Strategy::Exact(&[
            Edit::required(AUTORESET_CYCLE_OLD, AUTORESET_CYCLE_NEW),
            Edit::optional(AUTORESET_DISPLAY_OLD, AUTORESET_DISPLAY_NEW),
        ]),
    },
    PatchEntry {
        key: "map_record_uncap",
        label: "MapScene.js: wave record above 100",
        target: "src/js/game/scenes/MapScene.js",
        detect: Detect::Custom(record_uncapped),
        strategy: Strategy::Pattern {
            exact: &[
                Edit::optional("Math.min(100, recordValue)", "recordValue"),
                Edit::optional(
                    "Math.min(100, this.main.player.records[i])",
                    "this.main.player.records[i]",
                ),
            ],
            fallback: unwrap_record_cap,
        },
    },
    PatchEntry {
        key: "shiny_eggs",
        label: "Shop.js: 1/30 shiny eggs",
        target: "src/js/game/core/Shop.js",
        detect: Detect::MatchesFixture,
        strategy: whole_file("Shop.modded.js"),
    },
    PatchEntry {
        key: "shiny_starters",
        label: "NewGameScene.js: 1/30 shiny starters",
        target: "src/js/game/scenes/NewGameScene.js",
        detect: Detect::Custom(has_shiny_starter_roll),
        strategy: Strategy::Exact(&[Edit::required(STARTER_CLOSE_OLD, STARTER_CLOSE_NEW)]),
    },
    PatchEntry {
        key: "shiny_reveal",
        label: "ShopScene.js: shiny reveal",
        target: "src/js/game/scenes/ShopScene.js",
        detect: Detect::Contains("this.isShinyReveal = isShiny;"),
        strategy: Strategy::Exact(&[
            Edit::optional(REVEAL_CTOR_OLD, REVEAL_CTOR_NEW),
            Edit::optional(REVEAL_RENDER_OLD, REVEAL_RENDER_NEW),
            Edit::optional(REVEAL_UPDATE_OLD, REVEAL_UPDATE_NEW),
            Edit::optional(REVEAL_OPEN_OLD, REVEAL_OPEN_NEW),
        ]),
    },
    PatchEntry {
        key: "endless_mode",
        label: "FinalScene.js: endless continue/restart",
        target: "src/js/game/scenes/FinalScene.js",
        detect: Detect::MatchesFixture,
        strategy: whole_file("FinalScene.modded.js"),
    },
    PatchEntry {
        key: "item_tooltips",
        label: "Tooltip.js: item tooltips",
        target: "src/js/utils/Tooltip.js",
        detect: Detect::MatchesFixture,
        strategy: whole_file("Tooltip.modded.js"),
    },
    PatchEntry {
        key: "ui_mods",
        label: "UI.js: save/load tooltips, level cap",
        target: "src/js/game/UI.js",
        detect: Detect::MatchesFixture,
        strategy: whole_file("UI.modded.js"),
    },
    PatchEntry {
        key: "pokemon_mods",
        label: "Pokemon.js: uncapped levels, asymptotic speed",
        target: "src/js/game/component/Pokemon.js",
        detect: Detect::MatchesFixture,
        strategy: whole_file("Pokemon.modded.js"),
    },
    PatchEntry {
        key: "pokemonscene_mods",
        label: "PokemonScene.js: level cap removal",
        target: "src/js/game/scenes/PokemonScene.js",
        detect: Detect::MatchesFixture,
        strategy: whole_file("PokemonScene.modded.js"),
    },
    PatchEntry {
        key: "endless_waves",
        label: "Area.js: endless waves",
        target: "src/js/game/core/Area.js",
        detect: Detect::MatchesFixture,
        strategy: whole_file("Area.modded.js"),
    },
    PatchEntry {
        key: "endless_checkpoints",
        label: "DefeatScene.js: endless checkpoints",
        target: "src/js/game/scenes/DefeatScene.js",
        detect: Detect::MatchesFixture,
        strategy: whole_file("DefeatScene.modded.js"),
    },
    PatchEntry {
        key: "enemy_scaling",
        label: "Enemy.js: endless scaling",
        target: "src/js/game/component/Enemy.js",
        detect: Detect::MatchesFixture,
        strategy: whole_file("Enemy.modded.js"),
    },
    PatchEntry {
        key: "tower_deltatime",
        label: "Tower.js: delta time",
        target: "src/js/game/component/Tower.js",
        detect: Detect::MatchesFixture,
        strategy: whole_file("Tower.modded.js"),
    },
    PatchEntry {
        key: "projectile_scaling",
        label: "Projectile.js: endless damage, delta time",
        target: "src/js/game/component/Projectile.js",
        detect: Detect::MatchesFixture,
        strategy: whole_file("Projectile.modded.js"),
    },
    PatchEntry {
        key: "box_expansion",
        label: "BoxScene.js: 200 box slots",
        target: "src/js/game/scenes/BoxScene.js",
        detect: Detect::Custom(box_expanded),
        strategy: Strategy::WholeFile {
            fixture: "BoxScene.modded.js",
            inline: &[Edit::required("< 103", "< 200")],
            verify: None,
        },
    },
    PatchEntry {
        key: "profile_endless_stats",
        label: "ProfileScene.js: endless stats",
        target: "src/js/game/scenes/ProfileScene.js",
        detect: Detect::MatchesFixture,
        strategy: whole_file("ProfileScene.modded.js"),
    },
    PatchEntry {
        key: "expanded_egg_list",
        label: "pokemonData.js: expanded egg shop",
        target: "src/js/game/data/pokemonData.js",
        detect: Detect::Custom(egg_list_expanded),
        strategy: Strategy::Pattern {
            exact: &[Edit::required(EGG_LIST_OLD, EGG_LIST_NEW)],
            fallback: replace_egg_list,
        },
    },
    PatchEntry {
        key: "shiny_sprites",
        label: "shiny sprites for non-final evolutions",
        target: "src/assets/images/pokemon/shiny",
        detect: Detect::FixtureAssets,
        strategy: Strategy::AssetCopy {
            fixture_dir: "shiny_sprites",
            extension: "png",
        },
    },
    PatchEntry {
        key: "challenge_levelcap_fix",
        label: "ChallengeScene.js: level cap only caps",
        target: "src/js/game/scenes/ChallengeScene.js",
        detect: Detect::Custom(challenge_fixed),
        strategy: Strategy::Exact(&[Edit::required(
            "pokemon.forEach(poke => poke.setStatsLevel(capLevel))",
            "pokemon.forEach(poke => poke.updateStats())",
        )]),
    },
    PatchEntry {
        key: "emoji_font_fix",
        label: "scenes.css: emoji font",
        target: "src/css/scenes.css",
        detect: Detect::Contains("'Segoe UI Emoji'"),
        strategy: Strategy::Pattern {
            exact: &[Edit::required(EMOJI_CSS_OLD, EMOJI_CSS_NEW)],
            fallback: add_emoji_font,
        },
    },
    PatchEntry {
        key: "hidden_items",
        label: "itemData.js: unlock Magma Stone",
        target: "src/js/game/data/itemData.js",
        detect: Detect::Custom(hidden_item_unlocked),
        strategy: Strategy::Pattern {
            exact: NO_EDITS,
            fallback: unlock_hidden_item,
        },
    },
];

pub fn find(key: &str) -> Option<&'static PatchEntry> {
    CATALOG.iter().find(|e| e.key == key)
}

/// Position in the catalog; used to keep expanded selections ordered.
pub fn position(key: &str) -> Option<usize> {
    CATALOG.iter().position(|e| e.key == key)
}

fn regex(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).expect("catalog regex compiles"))
}

// ---------------------------------------------------------------------------
// Game.js
// ---------------------------------------------------------------------------

const PAUSE_MARKER: &str = "this.stopped ? 0 :";

fn early_stop_return() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(
        &RE,
        r"animate\s*\([^)]*\)\s*\{\s*\n\s*if\s*\(\s*this\.stopped\s*\)\s*return\s*;",
    )
}

fn pause_ready(src: &str) -> bool {
    src.contains(PAUSE_MARKER) && !early_stop_return().is_match(src)
}

fn verify_pause(src: &str) -> Result<(), PatchFailure> {
    if early_stop_return().is_match(src) {
        return Err(PatchFailure::VerificationFailed(
            "animate() still returns early while stopped".into(),
        ));
    }
    if !src.contains(PAUSE_MARKER) {
        return Err(PatchFailure::VerificationFailed(
            "Game.js fixture does not freeze delta while stopped".into(),
        ));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// text.js
// ---------------------------------------------------------------------------

/// "Continue" in the game's language column order.
pub const CONTINUE_LABELS: &[&str] = &[
    "Continue",
    "Continuar",
    "Continuer",
    "Continuar",
    "Continua",
    "Fortsetzen",
    "つづく",
    "계속",
    "继续",
    "Kontynuuj",
];

fn reset_block() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(
        &RE,
        r"reset:\s*\{[ \t]*\r?\n((?:[ \t]*\d+[ \t]*:[ \t]*\[[^\]]*\][ \t]*,?[ \t]*\r?\n)+)[ \t]*\}",
    )
}

fn reset_row() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(&RE, r"^([ \t]*)(\d+)[ \t]*:[ \t]*\[([^\]]*)\]")
}

fn quoted_item() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(&RE, r#"'(?:[^'\\]|\\.)*'|"(?:[^"\\]|\\.)*""#)
}

fn has_continue_row(src: &str) -> bool {
    reset_block()
        .captures(src)
        .map(|caps| {
            caps[1]
                .lines()
                .filter_map(|l| reset_row().captures(l))
                .any(|row| &row[2] == "3")
        })
        .unwrap_or(false)
}

/// Add row 3 to the `reset` table, sized and quoted like the existing rows.
fn add_continue_row(src: &str) -> Result<String, PatchFailure> {
    let caps = reset_block()
        .captures(src)
        .ok_or(PatchFailure::PatternNotFound)?;
    let rows_match = caps.get(1).ok_or(PatchFailure::PatternNotFound)?;
    let rows = rows_match.as_str();

    let parsed: Vec<_> = rows
        .lines()
        .filter_map(|l| reset_row().captures(l))
        .collect();
    let keys: Vec<&str> = parsed.iter().map(|c| c.get(2).map_or("", |m| m.as_str())).collect();
    if keys != ["0", "1", "2"] {
        return Err(PatchFailure::PatternNotFound);
    }

    let first = &parsed[0];
    let indent = first.get(1).map_or("", |m| m.as_str());
    let columns: Vec<&str> = quoted_item()
        .find_iter(first.get(3).map_or("", |m| m.as_str()))
        .map(|m| m.as_str())
        .collect();
    if columns.is_empty() {
        return Err(PatchFailure::PatternNotFound);
    }
    let quote = if columns[0].starts_with('"') { '"' } else { '\'' };

    let items: Vec<String> = (0..columns.len())
        .map(|i| {
            let label = CONTINUE_LABELS.get(i).copied().unwrap_or(CONTINUE_LABELS[0]);
            format!("{quote}{label}{quote}")
        })
        .collect();

    let newline = if rows.contains("\r\n") { "\r\n" } else { "\n" };
    let body = rows.trim_end_matches(['\r', '\n']);
    let body = if body.trim_end().ends_with(',') {
        body.to_string()
    } else {
        format!("{},", body.trim_end())
    };
    let new_rows = format!(
        "{body}{newline}{indent}3: [{}],{newline}",
        items.join(", ")
    );

    let mut out = String::with_capacity(src.len() + new_rows.len());
    out.push_str(&src[..rows_match.start()]);
    out.push_str(&new_rows);
    out.push_str(&src[rows_match.end()..]);
    Ok(out)
}

// ---------------------------------------------------------------------------
// MenuScene.js
// ---------------------------------------------------------------------------

const AUTORESET_CYCLE_OLD: &str = "updateAutoReset = (dir) => {\n\
\x20\x20\x20\x20\tlet pos = Number(this.main.autoReset) + dir;\n\
\t\tif (pos < 0) pos = 2;\n\
\t\telse if (pos == 3) pos = 0;";

const AUTORESET_CYCLE_NEW: &str = "updateAutoReset = (dir) => {\n\
\x20\x20\x20\x20\tlet pos = Number(this.main.autoReset) + dir;\n\
\t\tif (pos < 0) pos = 3;\n\
\t\telse if (pos == 4) pos = 0;";

const AUTORESET_DISPLAY_OLD: &str = "this.autoResetRow.label.innerText = text.menu.settings.autoReset[this.main.lang].toUpperCase();\n\
\x20\x20\t\tif (data.config.autoReset == 1) this.autoResetRow.value.innerText = text.menu.settings.reset[1][this.main.lang].toUpperCase();\n\
\x20\x20\t\telse if (data.config.autoReset == 2) this.autoResetRow.value.innerText = text.menu.settings.reset[2][this.main.lang].toUpperCase();\n\
\x20\x20\t\telse this.autoResetRow.value.innerText = text.menu.settings.reset[0][this.main.lang].toUpperCase();";

const AUTORESET_DISPLAY_NEW: &str = "this.autoResetRow.label.innerText = text.menu.settings.autoReset[this.main.lang].toUpperCase();\n\
\x20\x20\t\tif (data.config.autoReset == 1) this.autoResetRow.value.innerText = text.menu.settings.reset[1][this.main.lang].toUpperCase();\n\
\x20\x20\t\telse if (data.config.autoReset == 2) this.autoResetRow.value.innerText = text.menu.settings.reset[2][this.main.lang].toUpperCase();\n\
\x20\x20\t\telse if (data.config.autoReset == 3) this.autoResetRow.value.innerText = text.menu.settings.reset[3][this.main.lang].toUpperCase();\n\
\x20\x20\t\telse this.autoResetRow.value.innerText = text.menu.settings.reset[0][this.main.lang].toUpperCase();";

// ---------------------------------------------------------------------------
// MapScene.js
// ---------------------------------------------------------------------------

/// The cap around the two wave-record reads; other `Math.min(100, ..)` calls
/// in the scene are left alone.
fn record_cap() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(
        &RE,
        r"Math\.min\(\s*100\s*,\s*(recordValue|this\.main\.player\.records\[\s*\w+\s*\])\s*\)",
    )
}

fn record_uncapped(src: &str) -> bool {
    !record_cap().is_match(src)
}

fn unwrap_record_cap(src: &str) -> Result<String, PatchFailure> {
    Ok(record_cap().replace_all(src, "$1").into_owned())
}

// ---------------------------------------------------------------------------
// NewGameScene.js / ShopScene.js
// ---------------------------------------------------------------------------

fn shiny_roll() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(
        &RE,
        r"isShiny\s*=\s*Math\.random\(\)\s*<\s*\(?\s*1\s*/\s*30",
    )
}

fn has_shiny_starter_roll(src: &str) -> bool {
    shiny_roll().is_match(src)
}

const STARTER_CLOSE_OLD: &str = "\tclose() {\n\
\t\tsuper.close();\n\
\t\tthis.main.team.addPokemon(new Pokemon(STARTER[this.starterSelected], 1, null, this.main));\n\
\t\tthis.main.shop.eggList.splice(this.starterSelected, 1);";

const STARTER_CLOSE_NEW: &str = "\tclose() {\n\
\t\tsuper.close();\n\
\t\t// 1 in 30 chance for shiny starter\n\
\t\tconst isShiny = Math.random() < (1 / 30);\n\
\t\tthis.main.team.addPokemon(new Pokemon(STARTER[this.starterSelected], 1, null, this.main, undefined, false, null, undefined, isShiny));\n\
\t\tthis.main.shop.eggList.splice(this.starterSelected, 1);";

const REVEAL_CTOR_OLD: &str = "class DisplayPokemon extends GameScene {\n\
\tconstructor(main) {\n\
\t\tsuper(200, 200);\n\
\t\tthis.main = main;\n\
\t\tthis.pokemon;\n\
\t\t\n\
\t\tthis.header.removeChild(this.closeButton);\n\
\t\tthis.render();\n\
\t}";

const REVEAL_CTOR_NEW: &str = "class DisplayPokemon extends GameScene {\n\
\tconstructor(main) {\n\
\t\tsuper(200, 200);\n\
\t\tthis.main = main;\n\
\t\tthis.pokemon;\n\
\t\tthis.isShinyReveal = false;\n\
\t\t\n\
\t\tthis.header.removeChild(this.closeButton);\n\
\t\tthis.render();\n\
\t}";

const REVEAL_RENDER_OLD: &str = "\trender() {\n\
\t\tthis.title.innerHTML = text.shop.title[this.main.lang].toUpperCase();\n\
\t\tthis.prompt = new Element(this.container, { className: 'dp-scene-prompt' }).element;\n\
\t\tthis.pokemonName = new Element(this.container, { className: 'dp-scene-pokemon-name' }).element;\n\
\t\tthis.image = new Element(this.container, { className: 'dp-scene-image' }).element;\n\
\t\tthis.closeButton = new Element(this.container, { className: 'shop-scene-purchase' }).element;";

const REVEAL_RENDER_NEW: &str = "\trender() {\n\
\t\tthis.title.innerHTML = text.shop.title[this.main.lang].toUpperCase();\n\
\t\tthis.prompt = new Element(this.container, { className: 'dp-scene-prompt' }).element;\n\
\t\tthis.pokemonName = new Element(this.container, { className: 'dp-scene-pokemon-name' }).element;\n\
\t\tthis.image = new Element(this.container, { className: 'dp-scene-image' }).element;\n\
\t\t\n\
\t\t// Shiny symbol - enlarged star positioned in corner\n\
\t\tthis.shinySymbol = new Element(this.container, { className: 'dp-scene-shiny-symbol' }).element;\n\
\t\tthis.shinySymbol.innerHTML = '✨';\n\
\t\tthis.shinySymbol.style.cssText = 'position:absolute;top:10px;right:10px;font-size:40px;display:none;text-shadow:0 0 10px gold,0 0 20px gold;';\n\
\t\t\n\
\t\t// Add pulse animation keyframe if not exists\n\
\t\tif (!document.getElementById('shinyPulseStyle')) {\n\
\t\t\tconst style = document.createElement('style');\n\
\t\t\tstyle.id = 'shinyPulseStyle';\n\
\t\t\tstyle.textContent = '@keyframes shinyPulse{0%,100%{transform:scale(1);opacity:1}50%{transform:scale(1.2);opacity:0.8}}';\n\
\t\t\tdocument.head.appendChild(style);\n\
\t\t}\n\
\t\tthis.shinySymbol.style.animation = 'shinyPulse 1s ease-in-out infinite';\n\
\t\t\n\
\t\tthis.closeButton = new Element(this.container, { className: 'shop-scene-purchase' }).element;";

const REVEAL_UPDATE_OLD: &str = "\tupdate() {\n\
\t\tthis.title.innerHTML = text.shop.title[this.main.lang].toUpperCase();\n\
\t\tthis.prompt.innerText = text.shop.new[this.main.lang].toUpperCase();\n\
\t\tthis.pokemonName.innerHTML = this.pokemon.name[this.main.lang].toUpperCase();\n\
\t\tthis.pokemonName.style.color = this.pokemon.specie.color;\n\
\t\tthis.image.style.backgroundImage = `url(\"${this.pokemon.sprite.base}\")`;\n\
\t\tthis.closeButton.innerHTML = 'OK';\n\
\t}";

const REVEAL_UPDATE_NEW: &str = "\tupdate() {\n\
\t\tthis.title.innerHTML = text.shop.title[this.main.lang].toUpperCase();\n\
\t\tthis.prompt.innerText = this.isShinyReveal ? '⭐ SHINY! ⭐' : text.shop.new[this.main.lang].toUpperCase();\n\
\t\tthis.pokemonName.innerHTML = this.pokemon.name[this.main.lang].toUpperCase();\n\
\t\tthis.pokemonName.style.color = this.pokemon.specie.color;\n\
\t\tthis.image.style.backgroundImage = `url(\"${this.pokemon.sprite.base}\")`;\n\
\t\tthis.closeButton.innerHTML = 'OK';\n\
\t\t\n\
\t\t// Show shiny symbol if it's a shiny reveal\n\
\t\tthis.shinySymbol.style.display = this.isShinyReveal ? 'block' : 'none';\n\
\t}";

const REVEAL_OPEN_OLD: &str = "\topen(pokemon) {\n\
\t\tplaySound('results', 'ui');\n\
\t\tthis.pokemon = pokemon;\n\
\n\
\t\tsuper.open();\n\
\t\tthis.update();\n\
\t}";

const REVEAL_OPEN_NEW: &str = "\topen(pokemon, isShiny = false) {\n\
\t\tplaySound('results', 'ui');\n\
\t\tthis.pokemon = pokemon;\n\
\t\tthis.isShinyReveal = isShiny;\n\
\n\
\t\tsuper.open();\n\
\t\tthis.update();\n\
\t}";

// ---------------------------------------------------------------------------
// BoxScene.js / ChallengeScene.js
// ---------------------------------------------------------------------------

fn box_expanded(src: &str) -> bool {
    src.contains("< 200") && !src.contains("< 103")
}

fn challenge_fixed(src: &str) -> bool {
    src.contains("poke.updateStats()") && !src.contains("setStatsLevel")
}

// ---------------------------------------------------------------------------
// pokemonData.js
// ---------------------------------------------------------------------------

/// The egg shop after expansion, in shop order.
pub const EXPANDED_EGG_LIST: &[&str] = &[
    // starters
    "charmander", "treecko", "froaki", "chikorita", "totodile", "fennekin",
    "turtwig", "chimchar", "oshawott", "sobble", "rowlet", "fuecoco",
    // shipped eggs
    "natu", "spoink", "murkrow",
    "voltorb", "machop", "mankey",
    "yamask", "cryogonal", "sableye", "meowth", "tangela",
    "spinarak", "shroomish", "barboach", "drudiggon", "remoraid", "clauncher",
    "seel", "staryu", "psyduck", "gulpin", "lapras",
    "ferroseed", "shuckle", "maractus", "sunkern", "aron", "hawlucha",
    "cubone", "binacle", "absol", "sandshrew", "sneasel",
    "trapinch", "pidgey", "noibat", "riolu", "mareep", "surskit",
    "cottonee", "petilil", "hoppip", "drilbur", "ekans",
    "girafarig", "torkoal", "spinda", "dunsparce", "ralts", "koffing",
    "farfetchd", "omanyte", "kabuto", "corsola",
    "castform", "clefairy", "anorith", "lileep", "shieldon", "cranidos",
    "starly", "abra", "gastly", "ditto",
    "magikarp", "pikachu", "larvesta", "cherubi",
    "rockruff", "pawniard", "sandile", "wimpod", "honedge",
    "comfey", "smeargle", "carvanha",
    // present in game data but never sold
    "bidoof", "cacnea", "greavard", "stakataka", "luvdisc", "chatot",
    "munna", "hoothoot", "wingull", "archen", "inkay", "vulpix",
    "tarountula", "carbink",
];

fn egg_list_decl() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(&RE, r"export const eggListData = \[[^\]]*\]")
}

fn egg_list_expanded(src: &str) -> bool {
    egg_list_decl()
        .find(src)
        .map(|m| {
            let list = m.as_str();
            ["'bidoof'", "'turtwig'", "'vulpix'"]
                .iter()
                .all(|name| list.contains(name))
        })
        .unwrap_or(false)
}

fn render_egg_list() -> String {
    let mut out = String::from("export const eggListData = [\n");
    for chunk in EXPANDED_EGG_LIST.chunks(6) {
        let row: Vec<String> = chunk.iter().map(|n| format!("'{n}'")).collect();
        out.push('\t');
        out.push_str(&row.join(", "));
        out.push_str(",\n");
    }
    out.push(']');
    out
}

fn replace_egg_list(src: &str) -> Result<String, PatchFailure> {
    let m = egg_list_decl()
        .find(src)
        .ok_or(PatchFailure::PatternNotFound)?;
    let mut out = String::with_capacity(src.len() + 512);
    out.push_str(&src[..m.start()]);
    out.push_str(&render_egg_list());
    out.push_str(&src[m.end()..]);
    Ok(out)
}

const EGG_LIST_OLD: &str = "export const eggListData = [\n\
\t'charmander', 'treecko', 'froaki', \n\
\n\
\t'natu', 'spoink', 'murkrow',\n\
\t'voltorb', 'machop', 'mankey', 'chimchar', \n\
\t'yamask', 'cryogonal', 'sableye', 'meowth', 'tangela', 'chikorita', \n\
\t'spinarak', 'shroomish', 'barboach', 'drudiggon', 'remoraid', 'clauncher', \n\
\t'seel', 'staryu', 'psyduck', 'gulpin', 'lapras', \n\
\t'ferroseed', 'shuckle', 'maractus', 'sunkern', 'aron', 'hawlucha', \n\
\t'cubone', 'binacle', 'absol', 'oshawott', 'sandshrew', 'sneasel', \n\
\t'trapinch', 'pidgey', 'noibat', 'riolu', 'mareep', 'surskit', \n\
\t'cottonee', 'petilil', 'hoppip', 'drilbur', 'ekans',\n\
\t'girafarig', 'torkoal', 'spinda', 'dunsparce', 'ralts', 'koffing', \n\
\t'farfetchd', 'omanyte', 'kabuto', 'corsola', \n\
\t'castform', 'clefairy', 'anorith', 'lileep', 'shieldon', 'cranidos', \n\
\t'starly', 'abra', 'gastly', 'ditto', \n\
\n\
\t'magikarp', 'pikachu', 'fuecoco', 'larvesta', 'cherubi',\n\
\t'rockruff', 'pawniard', 'sandile', 'wimpod', 'honedge', \n\
\t'sobble', 'rowlet', 'comfey', 'smeargle', 'carvanha', \n\
]";

const EGG_LIST_NEW: &str = "export const eggListData = [\n\
\t// === STARTERS ===\n\
\t'charmander', 'treecko', 'froaki', 'chikorita', 'totodile', 'fennekin', \n\
\t'turtwig', 'chimchar', 'oshawott', 'sobble', 'rowlet', 'fuecoco',\n\
\n\
\t// === ORIGINAL EGG POKEMON ===\n\
\t'natu', 'spoink', 'murkrow',\n\
\t'voltorb', 'machop', 'mankey', \n\
\t'yamask', 'cryogonal', 'sableye', 'meowth', 'tangela', \n\
\t'spinarak', 'shroomish', 'barboach', 'drudiggon', 'remoraid', 'clauncher', \n\
\t'seel', 'staryu', 'psyduck', 'gulpin', 'lapras', \n\
\t'ferroseed', 'shuckle', 'maractus', 'sunkern', 'aron', 'hawlucha', \n\
\t'cubone', 'binacle', 'absol', 'sandshrew', 'sneasel', \n\
\t'trapinch', 'pidgey', 'noibat', 'riolu', 'mareep', 'surskit', \n\
\t'cottonee', 'petilil', 'hoppip', 'drilbur', 'ekans',\n\
\t'girafarig', 'torkoal', 'spinda', 'dunsparce', 'ralts', 'koffing', \n\
\t'farfetchd', 'omanyte', 'kabuto', 'corsola', \n\
\t'castform', 'clefairy', 'anorith', 'lileep', 'shieldon', 'cranidos', \n\
\t'starly', 'abra', 'gastly', 'ditto', \n\
\t'magikarp', 'pikachu', 'larvesta', 'cherubi',\n\
\t'rockruff', 'pawniard', 'sandile', 'wimpod', 'honedge', \n\
\t'comfey', 'smeargle', 'carvanha', \n\
\n\
\t// === NEW POKEMON (previously missing from shop) ===\n\
\t'bidoof', 'cacnea', 'greavard', 'stakataka', 'luvdisc', 'chatot',\n\
\t'munna', 'hoothoot', 'wingull', 'archen', 'inkay', 'vulpix',\n\
\t'tarountula', 'carbink',\n\
]";

// ---------------------------------------------------------------------------
// scenes.css
// ---------------------------------------------------------------------------

const EMOJI_FONT_DECL: &str =
    "font-family: 'Segoe UI Emoji', 'Apple Color Emoji', 'Noto Color Emoji', sans-serif;";

const EMOJI_CSS_OLD: &str = ".msrre {\n\
\tvertical-align: middle;\n\
\tposition: relative;\n\
\ttop: -4px; /* ajusta según se necesite */\n\
}";

const EMOJI_CSS_NEW: &str = ".msrre {\n\
\tvertical-align: middle;\n\
\tposition: relative;\n\
\ttop: -4px; /* ajusta según se necesite */\n\
\tfont-family: 'Segoe UI Emoji', 'Apple Color Emoji', 'Noto Color Emoji', sans-serif;\n\
}";

fn msrre_rule() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(&RE, r"\.msrre\s*\{[^}]*\}")
}

fn add_emoji_font(src: &str) -> Result<String, PatchFailure> {
    let rule = msrre_rule()
        .find(src)
        .ok_or(PatchFailure::PatternNotFound)?;
    let close = rule.end() - 1;
    let body = src[rule.start()..close].trim_end();
    let mut out = String::with_capacity(src.len() + EMOJI_FONT_DECL.len() + 4);
    out.push_str(&src[..rule.start()]);
    out.push_str(body);
    out.push_str("\n\t");
    out.push_str(EMOJI_FONT_DECL);
    out.push('\n');
    out.push_str(&src[close..]);
    Ok(out)
}

// ---------------------------------------------------------------------------
// itemData.js
// ---------------------------------------------------------------------------

const HIDDEN_ITEM: &str = "magmaStone";

fn hidden_item_unlocked(src: &str) -> bool {
    src.contains("\tmagmaStone: {") && !src.contains("// magmaStone")
}

fn item_list() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(&RE, r"(?s)(export const itemListData = \[.*?)(\]\s*\n)")
}

/// Body of a `//` comment line with its indentation kept: `\t// \tx` -> `\t\tx`.
fn uncomment(line: &str) -> Option<String> {
    let indent = indent_of(line);
    let rest = line[indent.len()..].strip_prefix("//")?;
    let rest = rest.strip_prefix(' ').unwrap_or(rest);
    Some(format!("{indent}{rest}"))
}

/// Net `{`/`}` count of a line, ignoring quoted text.
fn brace_delta(line: &str) -> i32 {
    let mut delta = 0;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for c in line.chars() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '\'' | '"' | '`' => quote = Some(c),
            '{' => delta += 1,
            '}' => delta -= 1,
            _ => {}
        }
    }
    delta
}

/// Uncomment the hidden item's definition and list it in the shop.
///
/// The block end is found by brace depth, so nested objects inside the item
/// survive. Anything that does not look like a cleanly closed block is
/// rejected without touching the file.
fn unlock_hidden_item(src: &str) -> Result<String, PatchFailure> {
    let lines: Vec<&str> = src.split('\n').collect();
    let header = format!("// {HIDDEN_ITEM}: {{");
    let start = lines
        .iter()
        .position(|l| l.trim_start().starts_with(&header))
        .ok_or(PatchFailure::PatternNotFound)?;

    let mut out: Vec<String> = lines[..start].iter().map(|l| l.to_string()).collect();
    let mut depth = 0i32;
    let mut end = None;
    for (i, line) in lines.iter().enumerate().skip(start) {
        let opened = uncomment(line).ok_or_else(|| {
            PatchFailure::ValidationRejected(format!(
                "line {} inside the {HIDDEN_ITEM} block is not commented",
                i + 1
            ))
        })?;
        depth += brace_delta(&opened);
        out.push(opened);
        if depth <= 0 {
            end = Some(i);
            break;
        }
    }
    let end = end.ok_or_else(|| {
        PatchFailure::ValidationRejected(format!("{HIDDEN_ITEM} block never closes"))
    })?;

    // A commented line that is deeper than the item or starts with a closer
    // means the block was cut short.
    if let Some(next) = lines[end + 1..].iter().find(|l| !l.trim().is_empty()) {
        if let Some(body) = uncomment(next) {
            let inner = &body[indent_of(next).len()..];
            if inner.starts_with(char::is_whitespace) || inner.starts_with(['}', ']', ')']) {
                return Err(PatchFailure::ValidationRejected(format!(
                    "{HIDDEN_ITEM} block closes before its commented body ends"
                )));
            }
        }
    }

    out.extend(lines[end + 1..].iter().map(|l| l.to_string()));
    let mut content = out.join("\n");

    if let Some(caps) = item_list().captures(&content) {
        let (head, tail) = (caps.get(1), caps.get(2));
        if let (Some(head), Some(tail)) = (head, tail) {
            let quoted = format!("'{HIDDEN_ITEM}'");
            if !head.as_str().contains(&quoted) {
                let mut listed = String::with_capacity(content.len() + 16);
                listed.push_str(&content[..head.end()]);
                listed.push_str(&format!("\t{quoted},\n"));
                listed.push_str(&content[tail.start()..]);
                content = listed;
            }
        }
    }

    text::check_balance(&content, Syntax::Js)
        .map_err(|e| PatchFailure::ValidationRejected(e.to_string()))?;
    Ok(content)
}
