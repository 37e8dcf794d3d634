use crate::app::{self, AppState, Dialog, Services, Theme};
use crate::config::Config;
use crate::languages;
use crate::particles::{MAX_PARTICLES, MIN_PARTICLES};
use crate::scheduler::Scheduler;
use crate::speech::{SpeechService, MAX_RATE, MIN_RATE};
use crate::tasks::TaskCoordinator;
use crate::translate::Translator;
use anyhow::{Context as _, Result};
use eframe::egui;
use egui_phosphor::regular as icon;
use std::fs;
use std::sync::Arc;
use std::time::Instant;

const TITLE: &str = "Language Translator";

const CJK_FONTS: [&str; 8] = [
    r"C:\Windows\Fonts\msyh.ttc",
    r"C:\Windows\Fonts\msyh.ttf",
    r"C:\Windows\Fonts\simsun.ttc",
    "/System/Library/Fonts/PingFang.ttc",
    "/System/Library/Fonts/Hiragino Sans GB.ttc",
    "/usr/share/fonts/opentype/noto/NotoSansCJK-Regular.ttc",
    "/usr/share/fonts/noto-cjk/NotoSansCJK-Regular.ttc",
    "/usr/share/fonts/truetype/wqy/wqy-microhei.ttc",
];

struct Palette {
    root: egui::Color32,
    panel: egui::Color32,
    text: egui::Color32,
    fg: egui::Color32,
}

fn palette(theme: Theme) -> Palette {
    match theme {
        Theme::Darkly => Palette {
            root: egui::Color32::BLACK,
            panel: egui::Color32::from_rgba_unmultiplied(0x05, 0x05, 0x05, 215),
            text: egui::Color32::from_rgb(0x0a, 0x0a, 0x0a),
            fg: egui::Color32::from_rgb(0xf2, 0xf2, 0xf2),
        },
        Theme::Flatly => Palette {
            root: egui::Color32::from_rgb(0xf5, 0xf7, 0xfb),
            panel: egui::Color32::from_rgba_unmultiplied(0xff, 0xff, 0xff, 215),
            text: egui::Color32::WHITE,
            fg: egui::Color32::from_rgb(0x11, 0x11, 0x11),
        },
    }
}

/// User intents collected while drawing and applied once the frame's widgets are done.
#[derive(Debug, Clone, PartialEq)]
enum Action {
    Translate,
    InputChanged,
    Speak,
    StopSpeaking,
    Copy,
    Paste,
    Clear,
    ClearInput,
    Swap,
    SelectSource(String),
    SelectTarget(String),
    ShowHistory,
    Import,
    Export,
    ToggleTheme,
    ClearStatus,
    Rate(i32),
    Volume(f32),
    Particles(usize),
    DismissDialog,
}

/// Lazily opened system clipboard.
struct SystemClipboard<'a>(&'a mut Option<arboard::Clipboard>);

impl SystemClipboard<'_> {
    fn inner(&mut self) -> Result<&mut arboard::Clipboard> {
        if self.0.is_none() {
            *self.0 = Some(arboard::Clipboard::new()?);
        }
        self.0.as_mut().context("clipboard unavailable")
    }
}

impl app::Clipboard for SystemClipboard<'_> {
    fn get_text(&mut self) -> Result<String> {
        Ok(self.inner()?.get_text()?)
    }

    fn set_text(&mut self, text: &str) -> Result<()> {
        self.inner()?.set_text(text)?;
        Ok(())
    }
}

fn setup_fonts(ctx: &egui::Context) {
    let mut fonts = egui::FontDefinitions::default();
    egui_phosphor::add_to_fonts(&mut fonts, egui_phosphor::Variant::Regular);

    let loaded = CJK_FONTS.iter().find_map(|path| fs::read(path).ok().map(|bytes| (*path, bytes)));
    match loaded {
        Some((path, bytes)) => {
            fonts.font_data.insert("cjk".to_owned(), egui::FontData::from_owned(bytes));
            fonts.families.entry(egui::FontFamily::Proportional).or_default().push("cjk".to_owned());
            fonts.families.entry(egui::FontFamily::Monospace).or_default().push("cjk".to_owned());
            log::info!("Loaded CJK fallback font: {path}");
        }
        None => log::info!("No CJK font found; some scripts may render as squares"),
    }
    ctx.set_fonts(fonts);
}

struct TranslatorApp {
    state: AppState,
    sched: Scheduler<AppState>,
    clipboard: Option<arboard::Clipboard>,
    source_options: Vec<String>,
    target_options: Vec<String>,
    applied_theme: Option<Theme>,
    viewport: egui::Vec2,
}

impl TranslatorApp {
    fn new(cc: &eframe::CreationContext<'_>, cfg: &Config, translator: Arc<dyn Translator>, speech: Arc<SpeechService>) -> Self {
        setup_fonts(&cc.egui_ctx);

        let mut sched = Scheduler::new();
        let ctx = cc.egui_ctx.clone();
        sched.set_waker(move || ctx.request_repaint());
        let services = Services { translator, speech, tasks: TaskCoordinator::new(sched.poster()) };
        let mut state = AppState::new(cfg, services);
        state.start(&mut sched);

        Self {
            state,
            sched,
            clipboard: None,
            source_options: languages::source_options(),
            target_options: languages::dropdown_options(),
            applied_theme: None,
            viewport: egui::Vec2::ZERO,
        }
    }

    fn apply_theme(&mut self, ctx: &egui::Context) {
        let theme = self.state.theme;
        if self.applied_theme == Some(theme) {
            return;
        }
        let colors = palette(theme);
        let mut visuals = if theme.is_dark() { egui::Visuals::dark() } else { egui::Visuals::light() };
        visuals.panel_fill = colors.panel;
        visuals.extreme_bg_color = colors.text;
        visuals.override_text_color = Some(colors.fg);
        ctx.set_visuals(visuals);
        self.applied_theme = Some(theme);
    }

    fn shortcuts(&self, ctx: &egui::Context, actions: &mut Vec<Action>) {
        let ctrl_shift = egui::Modifiers::COMMAND | egui::Modifiers::SHIFT;
        ctx.input_mut(|i| {
            // Ctrl+Shift+C reaches egui as a Copy event rather than a key press.
            let copy_event = i.modifiers.command
                && i.modifiers.shift
                && i.events.iter().any(|e| matches!(e, egui::Event::Copy));
            if copy_event {
                i.events.retain(|e| !matches!(e, egui::Event::Copy));
            }
            if copy_event || i.consume_key(ctrl_shift, egui::Key::C) {
                actions.push(Action::Copy);
            }
            if i.consume_key(ctrl_shift, egui::Key::S) {
                actions.push(Action::Swap);
            }
            if i.consume_key(egui::Modifiers::COMMAND, egui::Key::Enter) {
                actions.push(Action::Translate);
            }
            if i.consume_key(egui::Modifiers::COMMAND, egui::Key::L) {
                actions.push(Action::Clear);
            }
            if i.consume_key(egui::Modifiers::NONE, egui::Key::Escape) {
                actions.push(Action::ClearStatus);
            }
        });
    }

    fn language_row(&self, ui: &mut egui::Ui, actions: &mut Vec<Action>) {
        ui.horizontal(|ui| {
            ui.label("From");
            egui::ComboBox::from_id_source("source_lang")
                .width(180.0)
                .selected_text(self.state.picker.source())
                .show_ui(ui, |ui| {
                    for option in &self.source_options {
                        if languages::is_header(option) {
                            ui.label(egui::RichText::new(option.as_str()).weak());
                        } else if ui.selectable_label(option == self.state.picker.source(), option.as_str()).clicked() {
                            actions.push(Action::SelectSource(option.clone()));
                        }
                    }
                });
            if ui.button(format!("{} Swap", icon::ARROWS_LEFT_RIGHT)).clicked() {
                actions.push(Action::Swap);
            }
            ui.label("To");
            egui::ComboBox::from_id_source("target_lang")
                .width(180.0)
                .selected_text(self.state.picker.target())
                .show_ui(ui, |ui| {
                    for option in &self.target_options {
                        if languages::is_header(option) {
                            ui.label(egui::RichText::new(option.as_str()).weak());
                        } else if ui.selectable_label(option == self.state.picker.target(), option.as_str()).clicked() {
                            actions.push(Action::SelectTarget(option.clone()));
                        }
                    }
                });
        });
    }

    fn text_panes(&mut self, ui: &mut egui::Ui, actions: &mut Vec<Action>) {
        let pane_height = ((ui.available_height() - 150.0) / 2.0).max(80.0);

        let input = egui::ScrollArea::vertical()
            .id_source("input_scroll")
            .max_height(pane_height)
            .show(ui, |ui| {
                ui.add_sized(
                    [ui.available_width(), pane_height],
                    egui::TextEdit::multiline(&mut self.state.input).hint_text("Type or paste text to translate"),
                )
            })
            .inner;
        if input.changed() {
            actions.push(Action::InputChanged);
        }

        ui.horizontal(|ui| {
            if ui.button("Clear Input").clicked() {
                actions.push(Action::ClearInput);
            }
            ui.label(egui::RichText::new(&self.state.char_count).weak());
            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                if ui.button("Translate ✨").clicked() {
                    actions.push(Action::Translate);
                }
            });
        });
        ui.add_space(8.0);

        egui::ScrollArea::vertical()
            .id_source("output_scroll")
            .max_height(pane_height)
            .show(ui, |ui| {
                let mut output = self.state.output.as_str();
                ui.add_sized([ui.available_width(), pane_height], egui::TextEdit::multiline(&mut output));
            });
    }

    fn toolbar(&self, ui: &mut egui::Ui, actions: &mut Vec<Action>) {
        ui.horizontal(|ui| {
            let buttons = [
                (format!("{} Translate", icon::TRANSLATE), Action::Translate),
                (format!("{} Speak", icon::SPEAKER_HIGH), Action::Speak),
                (format!("{} Copy", icon::COPY), Action::Copy),
                (format!("{} Paste", icon::CLIPBOARD_TEXT), Action::Paste),
                (format!("{} Clear", icon::TRASH), Action::Clear),
                (format!("{} History", icon::CLOCK_COUNTER_CLOCKWISE), Action::ShowHistory),
                (format!("{} Import .txt", icon::FILE_ARROW_UP), Action::Import),
                (format!("{} Export .txt", icon::FILE_ARROW_DOWN), Action::Export),
            ];
            for (label, action) in buttons {
                if ui.button(label).clicked() {
                    actions.push(action);
                }
            }
            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                if ui.button(format!("{} Theme", icon::PALETTE)).clicked() {
                    actions.push(Action::ToggleTheme);
                }
            });
        });
    }

    fn speech_row(&self, ui: &mut egui::Ui, actions: &mut Vec<Action>) {
        ui.horizontal(|ui| {
            let mut rate = self.state.tts.rate();
            if ui.add(egui::Slider::new(&mut rate, MIN_RATE..=MAX_RATE).text("Speed")).changed() {
                actions.push(Action::Rate(rate));
            }
            let mut volume = self.state.tts.volume() * 100.0;
            if ui.add(egui::Slider::new(&mut volume, 0.0..=100.0).text("Volume")).changed() {
                actions.push(Action::Volume(volume));
            }
            if ui.button(format!("{} Stop Speaking", icon::STOP)).clicked() {
                actions.push(Action::StopSpeaking);
            }
            ui.separator();
            let mut particles = self.state.scene.field.desired_count();
            if ui.add(egui::Slider::new(&mut particles, MIN_PARTICLES..=MAX_PARTICLES).text("Particles")).changed() {
                actions.push(Action::Particles(particles));
            }
        });
    }

    fn dialogs(&mut self, ctx: &egui::Context, actions: &mut Vec<Action>) {
        if let Some(dialog) = &self.state.dialog {
            let (title, message) = match dialog {
                Dialog::Info { title, message } => (title.clone(), message.clone()),
                Dialog::Error { title, message } => (title.clone(), format!("{} {message}", icon::WARNING)),
            };
            egui::Window::new(title)
                .collapsible(false)
                .resizable(false)
                .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
                .show(ctx, |ui| {
                    ui.label(message);
                    if ui.button("OK").clicked() {
                        actions.push(Action::DismissDialog);
                    }
                });
        }

        if self.state.show_history {
            let mut open = true;
            let text = self.state.history.render();
            egui::Window::new("Recent Translations")
                .open(&mut open)
                .default_size([520.0, 320.0])
                .show(ctx, |ui| {
                    egui::ScrollArea::vertical().show(ui, |ui| ui.label(text));
                });
            self.state.show_history = open;
        }
    }

    fn apply(&mut self, action: Action) {
        let state = &mut self.state;
        let sched = &mut self.sched;
        match action {
            Action::Translate => state.translate(sched),
            Action::InputChanged => state.on_input_change(sched),
            Action::Speak => state.speak_translation(),
            Action::StopSpeaking => state.stop_speaking(),
            Action::Copy => state.copy_translation(&mut SystemClipboard(&mut self.clipboard)),
            Action::Paste => state.paste_from_clipboard(sched, &mut SystemClipboard(&mut self.clipboard)),
            Action::Clear => state.clear_text(sched),
            Action::ClearInput => state.clear_input_only(sched),
            Action::Swap => state.swap_languages(),
            Action::SelectSource(name) => state.select_source(&name),
            Action::SelectTarget(name) => state.select_target(&name),
            Action::ShowHistory => state.show_history(),
            Action::Import => state.import_text_file(sched, || {
                rfd::FileDialog::new()
                    .add_filter("Text files", &["txt"])
                    .add_filter("All files", &["*"])
                    .pick_file()
            }),
            Action::Export => state.export_translation_file(|| {
                rfd::FileDialog::new()
                    .add_filter("Text files", &["txt"])
                    .set_file_name("translation.txt")
                    .save_file()
            }),
            Action::ToggleTheme => state.toggle_theme(),
            Action::ClearStatus => state.clear_status(),
            Action::Rate(rate) => state.set_tts_rate(rate),
            Action::Volume(volume) => state.set_tts_volume(volume),
            Action::Particles(count) => state.set_particle_count(count),
            Action::DismissDialog => state.dialog = None,
        }
    }
}

impl eframe::App for TranslatorApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let minimized = ctx.input(|i| i.viewport().minimized.unwrap_or(false));
        if minimized && self.state.scene.is_running() {
            self.state.scene.stop(&mut self.sched);
            log::debug!("Window minimized; animation paused");
        } else if !minimized && !self.state.scene.is_running() {
            self.state.scene.start(&mut self.sched);
        }
        self.sched.pump(&mut self.state, Instant::now());
        self.apply_theme(ctx);

        let mut actions = Vec::new();
        self.shortcuts(ctx, &mut actions);

        let colors = palette(self.state.theme);
        egui::CentralPanel::default()
            .frame(egui::Frame::none().fill(colors.root))
            .show(ctx, |ui| {
                let rect = ui.max_rect();
                if rect.size() != self.viewport {
                    self.viewport = rect.size();
                    self.state.scene.field.resize(rect.width(), rect.height());
                }
                self.state.scene.field.layer().paint(ui.painter(), rect.min);

                egui::Frame::none()
                    .fill(colors.panel)
                    .rounding(12.0)
                    .outer_margin(18.0)
                    .inner_margin(24.0)
                    .show(ui, |ui| {
                        ui.heading(format!("{}  {TITLE}", icon::GLOBE));
                        ui.add_space(10.0);
                        self.language_row(ui, &mut actions);
                        ui.add_space(10.0);
                        self.text_panes(ui, &mut actions);
                        ui.add_space(10.0);
                        self.toolbar(ui, &mut actions);
                        ui.add_space(6.0);
                        self.speech_row(ui, &mut actions);
                        ui.add_space(10.0);
                        ui.horizontal(|ui| {
                            if self.state.busy() {
                                ui.spinner();
                            } else if self.state.auto_translate_pending(&self.sched) {
                                ui.label(egui::RichText::new(icon::HOURGLASS).weak());
                            }
                            ui.label(egui::RichText::new(&self.state.status).strong());
                        });
                    });
            });

        self.dialogs(ctx, &mut actions);
        for action in actions {
            self.apply(action);
        }

        if let Some(next) = self.sched.next_deadline() {
            ctx.request_repaint_after(next.saturating_duration_since(Instant::now()));
        }
    }
}

impl Drop for TranslatorApp {
    fn drop(&mut self) {
        self.state.shutdown(&mut self.sched);
        log::info!("Main UI: window closed");
    }
}

/// Runs the window on the calling (main) thread until it is closed.
pub fn run(cfg: Config, translator: Arc<dyn Translator>, speech: Arc<SpeechService>) -> Result<()> {
    log::info!("Main UI: starting event loop");
    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title(TITLE)
            .with_inner_size([1080.0, 680.0])
            .with_min_inner_size([720.0, 560.0])
            .with_resizable(true),
        ..Default::default()
    };
    eframe::run_native(
        TITLE,
        native_options,
        Box::new(move |cc| Box::new(TranslatorApp::new(cc, &cfg, translator, speech))),
    )
    .map_err(|e| anyhow::anyhow!("UI error: {e}"))
}
