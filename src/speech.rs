//! Text-to-speech behind a single speaker thread.

use anyhow::{Context, Result};
use crossbeam_channel::{Receiver, Sender};
use std::io::Write;
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

pub const MIN_RATE: i32 = 120;
pub const MAX_RATE: i32 = 220;
pub const DEFAULT_RATE: i32 = 170;
pub const DEFAULT_VOLUME: f32 = 0.8;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TtsPreferences {
    rate: i32,
    volume: f32,
}

impl Default for TtsPreferences {
    fn default() -> Self {
        Self { rate: DEFAULT_RATE, volume: DEFAULT_VOLUME }
    }
}

impl TtsPreferences {
    /// Rate is words per minute, volume a 0..=1 fraction; both are clamped.
    pub fn new(rate: i32, volume: f32) -> Self {
        let volume = if volume.is_finite() { volume.clamp(0.0, 1.0) } else { DEFAULT_VOLUME };
        Self { rate: rate.clamp(MIN_RATE, MAX_RATE), volume }
    }

    pub fn rate(&self) -> i32 {
        self.rate
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeechOutcome {
    Finished,
    Interrupted,
}

/// Reports whether a stop was requested after an utterance was queued.
#[derive(Debug, Clone)]
pub struct StopToken {
    epoch: Arc<AtomicU64>,
    issued: u64,
}

impl StopToken {
    pub fn is_stopped(&self) -> bool {
        self.epoch.load(Ordering::SeqCst) != self.issued
    }
}

pub trait SpeechEngine: Send + Sync {
    fn set_rate(&self, rate: i32);
    fn set_volume(&self, volume: f32);
    /// Blocks until the audio finishes, [`SpeechEngine::stop`] is called or `stop` fires.
    fn speak(&self, text: &str, stop: &StopToken) -> Result<SpeechOutcome>;
    fn stop(&self);
}

/// Drives the platform voice as a child process, text fed on stdin.
#[derive(Default)]
pub struct SystemVoice {
    prefs: Mutex<TtsPreferences>,
    child: Mutex<Option<Child>>,
    stops: AtomicU64,
    program: Option<(String, Vec<String>)>,
}

impl SystemVoice {
    fn prefs(&self) -> TtsPreferences {
        self.prefs.lock().map(|p| *p).unwrap_or_default()
    }

    fn command(&self, prefs: TtsPreferences) -> Command {
        if let Some((program, args)) = &self.program {
            let mut cmd = Command::new(program);
            cmd.args(args);
            return cmd;
        }
        if cfg!(target_os = "windows") {
            // SAPI rate runs -10..=10 around the default speaking speed.
            let rate = ((prefs.rate() - DEFAULT_RATE) / 10).clamp(-10, 10);
            let volume = (prefs.volume() * 100.0).round() as i32;
            let script = format!(
                "Add-Type -AssemblyName System.Speech; \
                 $s = New-Object System.Speech.Synthesis.SpeechSynthesizer; \
                 $s.Rate = {rate}; $s.Volume = {volume}; \
                 $s.Speak([Console]::In.ReadToEnd())"
            );
            let mut cmd = Command::new("powershell");
            cmd.args(["-NoProfile", "-NonInteractive", "-Command", &script]);
            cmd
        } else if cfg!(target_os = "macos") {
            let mut cmd = Command::new("say");
            cmd.args(["-r", &prefs.rate().to_string(), "-f", "-"]);
            cmd
        } else {
            let program = if which("espeak-ng") { "espeak-ng" } else { "espeak" };
            let amplitude = (prefs.volume() * 200.0).round() as i32;
            let mut cmd = Command::new(program);
            cmd.args(["-s", &prefs.rate().to_string(), "-a", &amplitude.to_string(), "--stdin"]);
            cmd
        }
    }

    fn slot(&self) -> Result<MutexGuard<'_, Option<Child>>> {
        self.child.lock().map_err(|_| anyhow::anyhow!("voice lock poisoned"))
    }

    /// Kills and reaps whatever child is still in the slot.
    fn kill_current(&self) {
        if let Ok(mut slot) = self.child.lock() {
            if let Some(mut child) = slot.take() {
                let _ = child.kill();
                let _ = child.wait();
            }
        }
    }
}

fn which(program: &str) -> bool {
    std::env::var_os("PATH")
        .map(|paths| std::env::split_paths(&paths).any(|dir| dir.join(program).is_file()))
        .unwrap_or(false)
}

impl SpeechEngine for SystemVoice {
    fn set_rate(&self, rate: i32) {
        if let Ok(mut p) = self.prefs.lock() {
            *p = TtsPreferences::new(rate, p.volume());
        }
    }

    fn set_volume(&self, volume: f32) {
        if let Ok(mut p) = self.prefs.lock() {
            *p = TtsPreferences::new(p.rate(), volume);
        }
    }

    fn speak(&self, text: &str, stop: &StopToken) -> Result<SpeechOutcome> {
        let stops = self.stops.load(Ordering::SeqCst);
        let interrupted = || stop.is_stopped() || self.stops.load(Ordering::SeqCst) != stops;

        let mut cmd = self.command(self.prefs());
        let mut child = cmd
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .with_context(|| format!("failed to start {:?}", cmd.get_program()))?;
        let stdin = child.stdin.take();
        *self.slot()? = Some(child);

        // The child must be in the slot before this check so a concurrent stop always finds it.
        if interrupted() {
            self.kill_current();
            return Ok(SpeechOutcome::Interrupted);
        }
        if let Some(mut stdin) = stdin {
            if let Err(e) = stdin.write_all(text.as_bytes()) {
                self.kill_current();
                if interrupted() {
                    return Ok(SpeechOutcome::Interrupted);
                }
                return Err(e).context("failed to send text to voice");
            }
        }

        loop {
            let status = match self.slot()?.as_mut() {
                Some(child) => child.try_wait()?,
                None => return Ok(SpeechOutcome::Interrupted),
            };
            if let Some(status) = status {
                self.slot()?.take();
                if interrupted() {
                    return Ok(SpeechOutcome::Interrupted);
                }
                anyhow::ensure!(status.success(), "voice exited with {status}");
                return Ok(SpeechOutcome::Finished);
            }
            thread::sleep(Duration::from_millis(20));
        }
    }

    fn stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
        self.kill_current();
    }
}

struct Utterance {
    text: String,
    prefs: TtsPreferences,
    stop: StopToken,
    reply: Sender<Result<SpeechOutcome>>,
}

/// Serialises every use of the engine through one speaker thread.
pub struct SpeechService {
    engine: Arc<dyn SpeechEngine>,
    queue: Sender<Utterance>,
    epoch: Arc<AtomicU64>,
}

impl SpeechService {
    pub fn new(engine: Arc<dyn SpeechEngine>) -> Result<Self> {
        let (queue, rx) = crossbeam_channel::unbounded::<Utterance>();
        {
            let engine = Arc::clone(&engine);
            thread::Builder::new()
                .name("speaker".into())
                .spawn(move || speaker_loop(engine, rx))
                .context("failed to start speaker thread")?;
        }
        Ok(Self { engine, queue, epoch: Arc::new(AtomicU64::new(0)) })
    }

    /// Queues `text` and blocks until it has been spoken, skipped or failed.
    pub fn speak(&self, text: &str, prefs: TtsPreferences) -> Result<SpeechOutcome> {
        let (reply, done) = crossbeam_channel::bounded(1);
        let stop = StopToken { epoch: Arc::clone(&self.epoch), issued: self.epoch.load(Ordering::SeqCst) };
        let utterance = Utterance { text: text.to_string(), prefs, stop, reply };
        self.queue.send(utterance).map_err(|_| anyhow::anyhow!("speaker thread has stopped"))?;
        done.recv().context("speaker thread dropped the request")?
    }

    /// Interrupts the current utterance and skips everything queued before now.
    pub fn stop(&self) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
        self.engine.stop();
    }
}

fn speaker_loop(engine: Arc<dyn SpeechEngine>, rx: Receiver<Utterance>) {
    for utterance in rx {
        if utterance.stop.is_stopped() {
            let _ = utterance.reply.send(Ok(SpeechOutcome::Interrupted));
            continue;
        }
        engine.set_rate(utterance.prefs.rate());
        engine.set_volume(utterance.prefs.volume());
        log::debug!("Speaking {} chars at rate {}", utterance.text.len(), utterance.prefs.rate());
        let outcome = engine.speak(&utterance.text, &utterance.stop);
        if let Err(e) = &outcome {
            log::warn!("Speech failed: {e:#}");
        }
        let _ = utterance.reply.send(outcome);
    }
    log::debug!("Speaker thread exiting");
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// Records calls; `speak` blocks until released when `gate` is set.
    #[derive(Default)]
    pub struct FakeVoice {
        pub calls: Mutex<Vec<String>>,
        pub active: AtomicU64,
        pub max_active: AtomicU64,
        pub gate: Option<Mutex<Receiver<()>>>,
        pub fail: bool,
    }

    impl SpeechEngine for FakeVoice {
        fn set_rate(&self, rate: i32) {
            self.calls.lock().unwrap().push(format!("rate {rate}"));
        }

        fn set_volume(&self, volume: f32) {
            self.calls.lock().unwrap().push(format!("volume {volume}"));
        }

        fn speak(&self, text: &str, stop: &StopToken) -> Result<SpeechOutcome> {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_active.fetch_max(now, Ordering::SeqCst);
            self.calls.lock().unwrap().push(format!("speak {text}"));
            if let Some(gate) = &self.gate {
                let _ = gate.lock().unwrap().recv();
            }
            self.active.fetch_sub(1, Ordering::SeqCst);
            anyhow::ensure!(!self.fail, "audio device busy");
            if stop.is_stopped() {
                return Ok(SpeechOutcome::Interrupted);
            }
            Ok(SpeechOutcome::Finished)
        }

        fn stop(&self) {
            self.calls.lock().unwrap().push("stop".into());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::FakeVoice;
    use super::*;
    use pretty_assertions::assert_eq;
    use std::time::Instant;

    #[test]
    fn preferences_are_clamped() {
        let prefs = TtsPreferences::new(500, 1.7);
        assert_eq!((prefs.rate(), prefs.volume()), (MAX_RATE, 1.0));
        let prefs = TtsPreferences::new(10, -0.5);
        assert_eq!((prefs.rate(), prefs.volume()), (MIN_RATE, 0.0));
    }

    #[test]
    fn preferences_applied_before_each_speak() {
        let voice = Arc::new(FakeVoice::default());
        let service = SpeechService::new(voice.clone()).unwrap();

        let outcome = service.speak("hola", TtsPreferences::new(150, 0.5)).unwrap();
        assert_eq!(outcome, SpeechOutcome::Finished);
        service.speak("adiós", TtsPreferences::new(200, 1.0)).unwrap();

        assert_eq!(
            *voice.calls.lock().unwrap(),
            vec!["rate 150", "volume 0.5", "speak hola", "rate 200", "volume 1", "speak adiós"]
        );
    }

    #[test]
    fn concurrent_requests_never_overlap() {
        let voice = Arc::new(FakeVoice::default());
        let service = Arc::new(SpeechService::new(voice.clone()).unwrap());
        let workers: Vec<_> = (0..4)
            .map(|i| {
                let service = Arc::clone(&service);
                thread::spawn(move || service.speak(&format!("line {i}"), TtsPreferences::default()))
            })
            .collect();
        for w in workers {
            assert_eq!(w.join().unwrap().unwrap(), SpeechOutcome::Finished);
        }
        assert_eq!(voice.max_active.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn engine_failure_is_returned() {
        let voice = Arc::new(FakeVoice { fail: true, ..FakeVoice::default() });
        let service = SpeechService::new(voice).unwrap();
        let err = service.speak("hola", TtsPreferences::default()).unwrap_err();
        assert_eq!(err.to_string(), "audio device busy");
    }

    #[test]
    fn stop_skips_queued_utterances() {
        let (release, gate) = crossbeam_channel::unbounded();
        let voice = Arc::new(FakeVoice { gate: Some(Mutex::new(gate)), ..FakeVoice::default() });
        let service = Arc::new(SpeechService::new(voice.clone()).unwrap());

        let first = {
            let service = Arc::clone(&service);
            thread::spawn(move || service.speak("first", TtsPreferences::default()))
        };
        while voice.active.load(Ordering::SeqCst) == 0 {
            thread::sleep(Duration::from_millis(1));
        }
        let second = {
            let service = Arc::clone(&service);
            thread::spawn(move || service.speak("second", TtsPreferences::default()))
        };
        // Give the second request time to reach the queue.
        thread::sleep(Duration::from_millis(50));

        service.stop();
        release.send(()).unwrap();

        assert_eq!(first.join().unwrap().unwrap(), SpeechOutcome::Interrupted);
        assert_eq!(second.join().unwrap().unwrap(), SpeechOutcome::Interrupted);
        assert!(!voice.calls.lock().unwrap().contains(&"speak second".to_string()));
    }

    #[cfg(unix)]
    fn live_token() -> StopToken {
        StopToken { epoch: Arc::new(AtomicU64::new(0)), issued: 0 }
    }

    /// A voice that holds its stdin for five seconds without reading it.
    #[cfg(unix)]
    fn slow_voice() -> SystemVoice {
        SystemVoice {
            program: Some(("sh".into(), vec!["-c".into(), "exec sleep 5".into()])),
            ..SystemVoice::default()
        }
    }

    #[cfg(unix)]
    #[test]
    fn stop_kills_voice_still_reading_its_text() {
        let voice = Arc::new(slow_voice());
        let started = Instant::now();
        let speaker = {
            let voice = Arc::clone(&voice);
            // larger than a pipe buffer, so the write blocks until the child reads or dies
            thread::spawn(move || voice.speak(&"a".repeat(1 << 20), &live_token()))
        };
        thread::sleep(Duration::from_millis(300));
        voice.stop();

        assert_eq!(speaker.join().unwrap().unwrap(), SpeechOutcome::Interrupted);
        assert!(started.elapsed() < Duration::from_secs(3), "voice kept running after stop");
        assert!(voice.child.lock().unwrap().is_none());
    }

    #[cfg(unix)]
    #[test]
    fn stop_before_speaking_starts_is_not_lost() {
        let voice = slow_voice();
        let stop = live_token();
        stop.epoch.fetch_add(1, Ordering::SeqCst);

        let started = Instant::now();
        assert_eq!(voice.speak("hola", &stop).unwrap(), SpeechOutcome::Interrupted);
        assert!(started.elapsed() < Duration::from_secs(3));
        assert!(voice.child.lock().unwrap().is_none());
    }

    #[cfg(unix)]
    #[test]
    fn service_stop_interrupts_system_voice() {
        let service = Arc::new(SpeechService::new(Arc::new(slow_voice())).unwrap());
        let started = Instant::now();
        let speaker = {
            let service = Arc::clone(&service);
            thread::spawn(move || service.speak(&"a".repeat(1 << 20), TtsPreferences::default()))
        };
        thread::sleep(Duration::from_millis(300));
        service.stop();

        assert_eq!(speaker.join().unwrap().unwrap(), SpeechOutcome::Interrupted);
        assert!(started.elapsed() < Duration::from_secs(3));
    }
}
