use eframe::egui;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use pathmod_core::features::{self, FEATURES};
use pathmod_core::{install, restore, status, PatcherConfig, SystemServices};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
struct GuiConfig {
    game_root: String,
    features: Vec<String>,
}

impl Default for GuiConfig {
    fn default() -> Self {
        Self {
            game_root: String::new(),
            features: features::defaults().into_iter().map(str::to_string).collect(),
        }
    }
}

impl GuiConfig {
    fn path() -> Option<PathBuf> {
        let base = dirs::config_dir().or_else(dirs::data_dir)?;
        Some(base.join("pathmod").join("gui_config.json"))
    }

    /// Last session's settings; defaults when there are none or they
    /// cannot be read.
    fn load() -> Self {
        let Some(path) = Self::path() else {
            return Self::default();
        };
        let data = match fs::read_to_string(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Self::default(),
            Err(e) => {
                log::warn!("could not read {}: {e}", path.display());
                return Self::default();
            }
        };
        serde_json::from_str(&data).unwrap_or_else(|e| {
            log::warn!("ignoring malformed {}: {e}", path.display());
            Self::default()
        })
    }

    fn save(&self) {
        let Some(path) = Self::path() else {
            log::warn!("no config directory; settings not saved");
            return;
        };
        if let Err(e) = write_json(&path, self) {
            log::warn!("could not save settings to {}: {e}", path.display());
        }
    }
}

fn write_json(path: &Path, value: &impl Serialize) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let data = serde_json::to_string_pretty(value)?;
    fs::write(path, data)
}

fn detect_game_install() -> Option<PathBuf> {
    let mut candidates = Vec::new();
    if let Some(local) = dirs::data_local_dir() {
        candidates.push(local.join("Programs").join("pokePathTD_Electron"));
    }
    candidates.push(PathBuf::from(r"C:\Program Files\pokePathTD_Electron"));

    candidates
        .into_iter()
        .find(|p| p.join("resources").join("app.asar").exists())
}

fn init_logging() {
    let _ = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "{} [{}] {}",
                chrono::Local::now().format("%H:%M:%S"),
                record.level(),
                message
            ))
        })
        .level(log::LevelFilter::Info)
        .chain(std::io::stderr())
        .apply();
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum ConfigTab {
    General,
    Features,
}

enum WorkerMsg {
    Progress { current: usize, total: usize, label: String },
    Finished(Vec<String>),
}

struct PatcherApp {
    current_tab: ConfigTab,
    game_root: String,
    selected: BTreeSet<String>,

    is_running: bool,
    progress: f32,
    log: String,
    worker_rx: Option<mpsc::Receiver<WorkerMsg>>,
}

impl Default for PatcherApp {
    fn default() -> Self {
        let mut cfg = GuiConfig::load();

        if cfg.game_root.is_empty() {
            if let Some(game) = detect_game_install() {
                cfg.game_root = game.display().to_string();
            }
        }

        Self {
            current_tab: ConfigTab::General,
            game_root: cfg.game_root,
            selected: cfg.features.into_iter().collect(),
            is_running: false,
            progress: 0.0,
            log: String::new(),
            worker_rx: None,
        }
    }
}

impl PatcherApp {
    fn push_log(&mut self, line: &str) {
        if !self.log.is_empty() {
            self.log.push('\n');
        }
        self.log.push_str(line);
    }

    fn patcher_config(&self) -> PatcherConfig {
        PatcherConfig {
            game_root: PathBuf::from(self.game_root.trim()),
            ..PatcherConfig::default()
        }
    }

    /// Run `job` on a worker thread; its lines land in the log pane.
    fn spawn<F>(&mut self, start_message: &str, job: F)
    where
        F: FnOnce(&PatcherConfig, &mpsc::Sender<WorkerMsg>) -> Vec<String> + Send + 'static,
    {
        GuiConfig {
            game_root: self.game_root.clone(),
            features: self.selected.iter().cloned().collect(),
        }
        .save();

        let config = self.patcher_config();
        let (tx, rx) = mpsc::channel();
        self.worker_rx = Some(rx);
        self.is_running = true;
        self.progress = 0.0;
        self.push_log(start_message);

        thread::spawn(move || {
            let lines = job(&config, &tx);
            let _ = tx.send(WorkerMsg::Finished(lines));
        });
    }

    fn start_install(&mut self) {
        let selected: Vec<String> = FEATURES
            .iter()
            .filter(|f| self.selected.contains(f.key))
            .map(|f| f.key.to_string())
            .collect();

        self.spawn("Installing mods...", move |config, tx| {
            let system = SystemServices::from_config(config);
            let mut progress = |current: usize, total: usize, label: &str| {
                let _ = tx.send(WorkerMsg::Progress {
                    current,
                    total,
                    label: label.to_string(),
                });
            };
            match install(config, &selected[..], system.services(), Some(&mut progress)) {
                Ok(report) => report.lines(),
                Err(e) => vec![format!("Install failed: {e}")],
            }
        });
    }

    fn start_restore(&mut self) {
        self.spawn("Restoring original game...", |config, _| {
            let system = SystemServices::from_config(config);
            match restore(config, &system.probe) {
                Ok(()) => vec!["Original app.asar restored.".to_string()],
                Err(e) => vec![format!("Restore failed: {e}")],
            }
        });
    }

    fn show_status(&mut self) {
        let layout = self.patcher_config().layout();
        let lines = match layout.validate().and_then(|()| status(&layout)) {
            Ok(st) => {
                let mut lines = vec![
                    format!("Backup present: {}", st.has_backup),
                    format!(
                        "app.asar: {}",
                        match (st.archive_present, st.archive_marker) {
                            (false, _) => "missing".to_string(),
                            (true, Some(marker)) => format!("modified ('{marker}')"),
                            (true, None) => "original".to_string(),
                        }
                    ),
                    format!("Modified mode: {}", st.modded),
                ];
                let applied = st.entries.iter().filter(|(_, on)| *on).count();
                if st.has_working_dir {
                    lines.push(format!(
                        "Extracted sources: {applied}/{} patches present",
                        st.entries.len()
                    ));
                }
                lines
            }
            Err(e) => vec![format!("Status failed: {e}")],
        };
        for line in lines {
            self.push_log(&line);
        }
    }

    fn drain_worker(&mut self) {
        let mut finished = None;
        if let Some(rx) = self.worker_rx.as_ref() {
            while let Ok(msg) = rx.try_recv() {
                match msg {
                    WorkerMsg::Progress {
                        current,
                        total,
                        label,
                    } => {
                        if total > 0 {
                            self.progress = current as f32 / total as f32;
                        }
                        if current < total {
                            log::debug!("[{}/{total}] {label}", current + 1);
                        }
                    }
                    WorkerMsg::Finished(lines) => finished = Some(lines),
                }
            }
        }
        if let Some(lines) = finished {
            for line in lines {
                self.push_log(&line);
            }
            self.is_running = false;
            self.progress = 1.0;
            self.worker_rx = None;
        }
    }
}

impl eframe::App for PatcherApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.drain_worker();

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.selectable_value(&mut self.current_tab, ConfigTab::General, "General");
                ui.selectable_value(&mut self.current_tab, ConfigTab::Features, "Features");
            });

            ui.separator();

            match self.current_tab {
                ConfigTab::General => {
                    ui.horizontal(|ui| {
                        ui.label("Game folder:");
                        ui.text_edit_singleline(&mut self.game_root);
                        if ui.button("Browse...").clicked() {
                            let mut dialog = rfd::FileDialog::new();
                            if !self.game_root.trim().is_empty() {
                                dialog = dialog.set_directory(self.game_root.trim());
                            }
                            if let Some(path) = dialog.pick_folder() {
                                self.game_root = path.display().to_string();
                            }
                        }
                    });
                    let resources = Path::new(self.game_root.trim()).join("resources");
                    if !self.game_root.trim().is_empty() && !resources.is_dir() {
                        ui.colored_label(
                            egui::Color32::from_rgb(230, 140, 60),
                            "No resources folder here; pick the PokePath TD install folder.",
                        );
                    }
                }
                ConfigTab::Features => {
                    ui.horizontal(|ui| {
                        if ui.button("All").clicked() {
                            self.selected = FEATURES.iter().map(|f| f.key.to_string()).collect();
                        }
                        if ui.button("None").clicked() {
                            self.selected.clear();
                        }
                    });
                    for feature in FEATURES {
                        let mut on = self.selected.contains(feature.key);
                        if ui
                            .checkbox(&mut on, feature.name)
                            .on_hover_text(feature.description)
                            .changed()
                        {
                            if on {
                                self.selected.insert(feature.key.to_string());
                            } else {
                                self.selected.remove(feature.key);
                            }
                        }
                    }
                }
            }

            ui.separator();

            ui.horizontal(|ui| {
                let idle = !self.is_running;
                let can_install = idle && !self.selected.is_empty();
                if ui
                    .add_enabled(can_install, egui::Button::new("Install mods"))
                    .clicked()
                {
                    self.start_install();
                }
                if ui
                    .add_enabled(idle, egui::Button::new("Restore original"))
                    .clicked()
                {
                    self.start_restore();
                }
                if ui.add_enabled(idle, egui::Button::new("Status")).clicked() {
                    self.show_status();
                }
            });

            if self.is_running {
                ui.add(egui::ProgressBar::new(self.progress).show_percentage());
            }

            ui.separator();
            ui.label("Log:");
            egui::ScrollArea::vertical()
                .id_source("log_scroll")
                .stick_to_bottom(true)
                .show(ui, |ui| {
                    ui.monospace(&self.log);
                });
        });

        if self.is_running {
            ctx.request_repaint_after(Duration::from_millis(100));
        }
    }
}

fn main() -> eframe::Result<()> {
    init_logging();

    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default().with_inner_size([560.0, 620.0]),
        ..Default::default()
    };
    eframe::run_native(
        "PokePath TD Mod Installer",
        native_options,
        Box::new(|cc| {
            cc.egui_ctx.set_visuals(egui::Visuals::dark());

            let fonts = egui::FontDefinitions::default();
            cc.egui_ctx.set_fonts(fonts);

            Box::new(PatcherApp::default())
        }),
    )
}
