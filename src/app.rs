//! Application state and user operations, independent of the widget toolkit.

use crate::config::Config;
use crate::history::History;
use crate::languages::{self, LanguagePicker};
use crate::particles::{Animated, ParticleField, ParticleScene, MAX_PARTICLES, MIN_PARTICLES};
use crate::scheduler::Scheduler;
use crate::speech::{SpeechOutcome, SpeechService, TtsPreferences};
use crate::tasks::{Debouncer, RequestSeq, TaskCoordinator, TaskError};
use crate::translate::{Translation, Translator};
use anyhow::Result;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

pub const READY_STATUS: &str = "Ready. Press Translate ✨ or Ctrl+Enter.";
const RESEED_DELAY: Duration = Duration::from_millis(150);

pub trait Clipboard {
    fn get_text(&mut self) -> Result<String>;
    fn set_text(&mut self, text: &str) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Theme {
    Darkly,
    Flatly,
}

impl Theme {
    pub fn name(self) -> &'static str {
        match self {
            Theme::Darkly => "darkly",
            Theme::Flatly => "flatly",
        }
    }

    pub fn next(self) -> Self {
        match self {
            Theme::Darkly => Theme::Flatly,
            Theme::Flatly => Theme::Darkly,
        }
    }

    pub fn is_dark(self) -> bool {
        self == Theme::Darkly
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dialog {
    Info { title: String, message: String },
    Error { title: String, message: String },
}

/// Collaborators the operations hand blocking work to.
pub struct Services {
    pub translator: Arc<dyn Translator>,
    pub speech: Arc<SpeechService>,
    pub tasks: TaskCoordinator<AppState>,
}

pub struct AppState {
    services: Services,
    pub picker: LanguagePicker,
    pub input: String,
    pub output: String,
    pub status: String,
    pub char_count: String,
    pub last_translation: String,
    pub last_detected: String,
    pub history: History,
    pub tts: TtsPreferences,
    pub theme: Theme,
    pub scene: ParticleScene,
    pub dialog: Option<Dialog>,
    pub show_history: bool,
    debounce: Debouncer,
    requests: RequestSeq,
}

impl Animated for AppState {
    fn scene(&mut self) -> &mut ParticleScene {
        &mut self.scene
    }
}

pub fn count_words_and_chars(text: &str) -> String {
    let text = text.trim_matches('\n');
    let words = text.split_whitespace().count();
    let chars = text.chars().count();
    format!("Words: {words} | Characters: {chars}")
}

impl AppState {
    pub fn new(cfg: &Config, services: Services) -> Self {
        let particles = cfg.particle_count.clamp(MIN_PARTICLES, MAX_PARTICLES);
        Self {
            services,
            picker: LanguagePicker::new(&cfg.source_lang, &cfg.target_lang),
            input: String::new(),
            output: String::new(),
            status: READY_STATUS.to_string(),
            char_count: count_words_and_chars(""),
            last_translation: String::new(),
            last_detected: String::new(),
            history: History::default(),
            tts: TtsPreferences::new(cfg.tts_rate, cfg.tts_volume),
            theme: Theme::Darkly,
            scene: ParticleScene::new(ParticleField::new(particles)),
            dialog: None,
            show_history: false,
            debounce: Debouncer::new(Duration::from_millis(cfg.auto_translate_delay_ms)),
            requests: RequestSeq::default(),
        }
    }

    /// Starts the background animation and schedules the first reseed once laid out.
    pub fn start(&mut self, sched: &mut Scheduler<AppState>) {
        self.scene.start(sched);
        sched.schedule_after(RESEED_DELAY, |state: &mut AppState, _| state.scene.field.reseed());
    }

    pub fn set_status(&mut self, message: impl Into<String>) {
        self.status = message.into();
        log::debug!("Status: {}", self.status);
    }

    pub fn clear_status(&mut self) {
        self.set_status("Status cleared.");
    }

    pub fn translate(&mut self, sched: &mut Scheduler<AppState>) {
        let text = self.input.trim().to_string();
        if text.is_empty() {
            self.set_status("Type something to translate.");
            return;
        }
        self.debounce.cancel(sched);

        let (source, target) = (self.picker.source_code(), self.picker.target_code());
        self.set_status("Translating…");
        let token = self.requests.next();
        let translator = Arc::clone(&self.services.translator);
        self.services.tasks.submit(
            "translate",
            move || translator.translate(&text, source, target),
            move |state: &mut AppState, translation: Translation| state.apply_translation(token, translation),
            move |state: &mut AppState, err: TaskError| state.handle_error(token, err),
        );
    }

    fn apply_translation(&mut self, token: u64, translation: Translation) {
        if !self.requests.is_latest(token) {
            log::debug!("Discarding stale translation #{token}");
            return;
        }
        let detected = languages::name_for(&translation.source_code);
        let target = languages::name_for(&translation.target_code);

        self.output = translation.text.clone();
        if !detected.is_empty() {
            self.output.push_str(&format!("\n\n[Detected language: {detected}]"));
        }
        self.last_translation = translation.text.clone();
        self.last_detected = detected.clone();
        if detected.is_empty() {
            self.set_status(format!("Translated to {target}."));
            self.history.record(translation.original.trim(), &translation.text, languages::AUTO_DETECT, &target);
        } else {
            self.set_status(format!("Translated {detected} → {target}."));
            self.history.record(translation.original.trim(), &translation.text, &detected, &target);
        }
    }

    fn handle_error(&mut self, token: u64, err: TaskError) {
        if !self.requests.is_latest(token) {
            log::debug!("Discarding stale failure #{token}: {err}");
            return;
        }
        self.set_status("Translation failed. Check network/API limits.");
        self.dialog = Some(Dialog::Error { title: "Translation Error".into(), message: err.to_string() });
    }

    /// Refreshes the counters and (re)arms the auto-translate timer.
    pub fn on_input_change(&mut self, sched: &mut Scheduler<AppState>) {
        self.char_count = count_words_and_chars(&self.input);
        self.debounce.trigger(sched, |state: &mut AppState, sched| state.translate(sched));
    }

    /// True while a translation or utterance is still running on a worker.
    pub fn busy(&self) -> bool {
        self.services.tasks.in_flight() > 0
    }

    pub fn auto_translate_pending(&self, sched: &Scheduler<AppState>) -> bool {
        self.debounce.is_pending(sched)
    }

    pub fn speak_translation(&mut self) {
        let text = self.last_translation.trim().to_string();
        if text.is_empty() {
            self.set_status("Nothing to speak. Translate first.");
            return;
        }
        let prefs = self.tts;
        let speech = Arc::clone(&self.services.speech);
        self.set_status("Speaking…");
        self.services.tasks.submit(
            "speak",
            move || speech.speak(&text, prefs),
            |state: &mut AppState, outcome: SpeechOutcome| {
                if outcome == SpeechOutcome::Finished {
                    state.set_status("Done speaking.");
                }
            },
            |state: &mut AppState, err: TaskError| state.set_status(format!("TTS failed: {err}")),
        );
    }

    pub fn stop_speaking(&mut self) {
        self.services.speech.stop();
        self.set_status("Stopped speaking.");
    }

    pub fn set_tts_rate(&mut self, rate: i32) {
        self.tts = TtsPreferences::new(rate, self.tts.volume());
    }

    /// `percent` is the 0..=100 slider value.
    pub fn set_tts_volume(&mut self, percent: f32) {
        self.tts = TtsPreferences::new(self.tts.rate(), percent / 100.0);
    }

    pub fn set_particle_count(&mut self, count: usize) {
        self.scene.field.set_count(count);
    }

    pub fn copy_translation(&mut self, clipboard: &mut dyn Clipboard) {
        let text = self.last_translation.trim().to_string();
        if text.is_empty() {
            self.set_status("Nothing to copy yet.");
            return;
        }
        match clipboard.set_text(&text) {
            Ok(()) => self.set_status("Copied translation to clipboard."),
            Err(e) => self.set_status(format!("Clipboard unavailable: {e}")),
        }
    }

    pub fn paste_from_clipboard(&mut self, sched: &mut Scheduler<AppState>, clipboard: &mut dyn Clipboard) {
        let text = match clipboard.get_text() {
            Ok(text) if !text.is_empty() => text,
            _ => {
                self.set_status("Clipboard empty.");
                return;
            }
        };
        self.input.push_str(&text);
        self.on_input_change(sched);
        self.set_status("Pasted from clipboard.");
    }

    /// Also invalidates any translation still in flight.
    pub fn clear_text(&mut self, sched: &mut Scheduler<AppState>) {
        self.debounce.cancel(sched);
        self.requests.next();
        self.input.clear();
        self.output.clear();
        self.last_translation.clear();
        self.last_detected.clear();
        self.char_count = count_words_and_chars("");
        self.set_status("Cleared input and output.");
    }

    pub fn clear_input_only(&mut self, sched: &mut Scheduler<AppState>) {
        self.debounce.cancel(sched);
        self.input.clear();
        self.char_count = count_words_and_chars("");
        self.set_status("Cleared input.");
    }

    pub fn swap_languages(&mut self) {
        if !self.picker.swap() {
            self.set_status("Cannot swap while source is Auto Detect.");
        }
    }

    pub fn select_source(&mut self, value: &str) {
        self.picker.select_source(value);
    }

    pub fn select_target(&mut self, value: &str) {
        self.picker.select_target(value);
    }

    pub fn show_history(&mut self) {
        if self.history.is_empty() {
            self.dialog = Some(Dialog::Info { title: "History".into(), message: "No translations yet.".into() });
            return;
        }
        self.show_history = true;
    }

    /// `pick` asks the user for a file; `None` means cancelled.
    pub fn import_text_file(&mut self, sched: &mut Scheduler<AppState>, pick: impl FnOnce() -> Option<PathBuf>) {
        let Some(path) = pick() else { return };
        match std::fs::read_to_string(&path) {
            Ok(content) => {
                self.input = content;
                self.on_input_change(sched);
                self.set_status(format!("Loaded text from {}", path.display()));
            }
            Err(e) => {
                log::warn!("Import of {} failed: {e}", path.display());
                self.set_status(format!("Failed to open file: {e}"));
            }
        }
    }

    pub fn export_translation_file(&mut self, pick: impl FnOnce() -> Option<PathBuf>) {
        if self.last_translation.trim().is_empty() {
            self.set_status("Translate something before exporting.");
            return;
        }
        let Some(path) = pick() else { return };
        self.export_to(&path);
    }

    fn export_to(&mut self, path: &Path) {
        match std::fs::write(path, &self.last_translation) {
            Ok(()) => self.set_status(format!("Saved translation to {}", path.display())),
            Err(e) => {
                log::warn!("Export to {} failed: {e}", path.display());
                self.set_status(format!("Failed to save file: {e}"));
            }
        }
    }

    pub fn toggle_theme(&mut self) {
        self.theme = self.theme.next();
        self.set_status(format!("Theme set to {}", self.theme.name()));
    }

    /// Stops the animation, pending auto-translate and any speech before the window goes away.
    pub fn shutdown(&mut self, sched: &mut Scheduler<AppState>) {
        self.scene.stop(sched);
        self.debounce.cancel(sched);
        self.services.speech.stop();
    }
}
