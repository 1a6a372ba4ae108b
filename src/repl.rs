use std::io::{self, Write};
use std::sync::mpsc as std_mpsc;
use std::time::Duration;

use crossterm::event::{
    self, Event, KeyCode, KeyEvent, KeyEventKind, KeyboardEnhancementFlags,
    PushKeyboardEnhancementFlags,
};
use crossterm::terminal::{self, EnterAlternateScreen, LeaveAlternateScreen};
use crossterm::{execute, queue};
use log::{info, warn};

use crate::keyboard::{BASS_KEYS, HIGH_KEYS, MID_KEYS, char_to_degree};
use crate::label::label_with_octave;
use crate::layout::{Drone, Layout, Selection, rebuild};
use crate::synth::{AudioEngine, LiveCommand};
use crate::theory::MAQAMAT;
use crate::tonic::{TonicOption, build_options};
use crate::tuning::OCTAVE;
use crate::voice::Voice;

const TONIC_DRONE_KEY: char = 'o';
const UPPER_DRONE_KEY: char = 'p';
const MODE_KEY: char = 'l';

/// What a note key does
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PlayMode {
    /// Sound while the key is down
    Hold,
    /// One decaying pluck per press
    Pluck,
}

impl PlayMode {
    fn toggled(self) -> Self {
        match self {
            PlayMode::Hold => PlayMode::Pluck,
            PlayMode::Pluck => PlayMode::Hold,
        }
    }

    fn name(self) -> &'static str {
        match self {
            PlayMode::Hold => "hold",
            PlayMode::Pluck => "pluck",
        }
    }
}

/// Everything the live loop can switch between.
struct LiveState {
    selection: Selection,
    layout: Layout,
    tonics: Vec<TonicOption>,
    tonic_idx: usize,
    mode: PlayMode,
    drones: Vec<Drone>,
}

impl LiveState {
    fn new(selection: Selection) -> Result<Self, String> {
        let layout = rebuild(&selection).map_err(|e| e.to_string())?;
        let tonics = build_options();
        let tonic_idx = tonics
            .iter()
            .position(|t| t.position == selection.transposition.offset())
            .unwrap_or(0);
        Ok(Self {
            selection,
            layout,
            tonics,
            tonic_idx,
            mode: PlayMode::Hold,
            drones: Vec::new(),
        })
    }

    /// Swap in a new selection only if it rebuilds cleanly.
    fn select(&mut self, selection: Selection) -> Result<(), String> {
        let layout = rebuild(&selection).map_err(|e| e.to_string())?;
        info!(
            "live: {} / {} at {:+}",
            layout.maqam,
            layout.upper_jins,
            selection.transposition.offset()
        );
        self.selection = selection;
        self.layout = layout;
        Ok(())
    }

    /// The current selection moved to the neighbouring catalog tonic.
    fn next_tonic(&mut self, forward: bool) -> Selection {
        let n = self.tonics.len();
        self.tonic_idx = if forward {
            (self.tonic_idx + 1) % n
        } else {
            (self.tonic_idx + n - 1) % n
        };
        let transposition = self.tonics[self.tonic_idx].transposition();
        self.selection.with_transposition(transposition)
    }

    /// Stop notes and drones alike.
    fn silence(&mut self) -> LiveCommand {
        self.drones.clear();
        LiveCommand::AllNotesOff
    }

    fn toggle_drone(&mut self, drone: Drone) -> LiveCommand {
        if let Some(i) = self.drones.iter().position(|&d| d == drone) {
            self.drones.remove(i);
            return LiveCommand::DroneOff { drone };
        }
        self.drones.push(drone);
        LiveCommand::DroneOn {
            drone,
            freq: self.selection.drone_freq(drone),
        }
    }

    /// Leaving hold mode silences whatever is held.
    fn toggle_mode(&mut self) -> Option<LiveCommand> {
        self.mode = self.mode.toggled();
        match self.mode {
            PlayMode::Pluck => Some(self.silence()),
            PlayMode::Hold => None,
        }
    }

    fn note_command(&self, key: char, freq: f64) -> LiveCommand {
        match self.mode {
            PlayMode::Hold => LiveCommand::NoteOn { key, freq },
            PlayMode::Pluck => LiveCommand::Pluck { freq },
        }
    }

    fn drone_status(&self) -> String {
        if self.drones.is_empty() {
            return "off".to_string();
        }
        let names: Vec<&str> = Drone::ALL
            .into_iter()
            .filter(|d| self.drones.contains(d))
            .map(Drone::name)
            .collect();
        names.join("+")
    }
}

/// The lowercased note key behind a key code, if it is bound.
fn note_key(code: KeyCode) -> Option<char> {
    let KeyCode::Char(c) = code else { return None };
    let c = c.to_ascii_lowercase();
    char_to_degree(c).map(|_| c)
}

/// Label of a scale degree moved by whole octaves.
fn degree_label(layout: &Layout, degree: usize, shift: i32) -> String {
    let tonic = layout.scale[0].position;
    let position = layout.scale[degree].position + shift as f64 * OCTAVE;
    label_with_octave(position, tonic)
}

fn row_labels(layout: &Layout, shift: i32) -> Vec<String> {
    (0..layout.scale.len())
        .map(|degree| degree_label(layout, degree, shift))
        .collect()
}

/// Run the interactive live keyboard mode
pub fn run(selection: Selection, voice: Voice) -> Result<(), String> {
    let mut state = LiveState::new(selection)?;
    let engine = AudioEngine::new(voice)?;

    let mut stdout = io::stdout();

    // Enter raw mode
    terminal::enable_raw_mode().map_err(|e| format!("failed to enable raw mode: {}", e))?;
    execute!(stdout, EnterAlternateScreen).map_err(|e| format!("alternate screen: {}", e))?;

    // Enable keyboard enhancement for key release detection.
    // On macOS, the terminal may accept the enhancement flag but not actually
    // send release events, so we disable it and use the fallback timer.
    let has_key_release = if cfg!(target_os = "macos") {
        false
    } else {
        queue!(
            stdout,
            PushKeyboardEnhancementFlags(KeyboardEnhancementFlags::REPORT_EVENT_TYPES)
        )
        .is_ok()
            && stdout.flush().is_ok()
    };
    if !has_key_release {
        warn!("no key release events, notes stop after a fixed time");
    }

    print_banner(&mut stdout, &state);

    let result = event_loop(&engine, &mut stdout, &mut state, has_key_release);

    // Restore terminal
    let _ = engine.send(LiveCommand::AllNotesOff);
    std::thread::sleep(Duration::from_millis(20));
    let _ = engine.send(LiveCommand::Shutdown);

    if has_key_release {
        let _ = execute!(
            stdout,
            crossterm::event::PopKeyboardEnhancementFlags,
            LeaveAlternateScreen
        );
    } else {
        let _ = execute!(stdout, LeaveAlternateScreen);
    }
    let _ = terminal::disable_raw_mode();

    result
}

fn event_loop(
    engine: &AudioEngine,
    stdout: &mut io::Stdout,
    state: &mut LiveState,
    has_key_release: bool,
) -> Result<(), String> {
    // For the fallback path: timer threads send the key back here so the
    // main loop can send NoteOff at the right time.
    let (fallback_tx, fallback_rx) = std_mpsc::channel::<char>();

    loop {
        // Drain any fallback NoteOff messages from timer threads
        if !has_key_release {
            while let Ok(key) = fallback_rx.try_recv() {
                engine.send(LiveCommand::NoteOff { key })?;
            }
        }

        if !event::poll(Duration::from_millis(50))
            .map_err(|e| format!("event poll error: {}", e))?
        {
            continue;
        }

        let ev = event::read().map_err(|e| format!("event read error: {}", e))?;

        let Event::Key(KeyEvent { code, kind, .. }) = ev else {
            continue;
        };

        if kind == KeyEventKind::Release {
            if let Some(c) = note_key(code) {
                engine.send(LiveCommand::NoteOff { key: c })?;
                update_status(stdout, state, None);
            }
            continue;
        }
        if kind != KeyEventKind::Press {
            continue;
        }

        let code = match code {
            KeyCode::Char(c) => KeyCode::Char(c.to_ascii_lowercase()),
            other => other,
        };

        // Anything that changes the selection rebuilds and silences first.
        let changed = match code {
            KeyCode::Esc => return Ok(()),
            KeyCode::Char(' ') => {
                engine.send(state.silence())?;
                print_banner(stdout, state);
                continue;
            }
            KeyCode::Char(TONIC_DRONE_KEY) => {
                engine.send(state.toggle_drone(Drone::Tonic))?;
                print_banner(stdout, state);
                continue;
            }
            KeyCode::Char(UPPER_DRONE_KEY) => {
                engine.send(state.toggle_drone(Drone::Upper))?;
                print_banner(stdout, state);
                continue;
            }
            KeyCode::Char(MODE_KEY) => {
                if let Some(cmd) = state.toggle_mode() {
                    engine.send(cmd)?;
                }
                print_banner(stdout, state);
                continue;
            }
            KeyCode::Tab => Some(state.selection.next_upper().map_err(|e| e.to_string())),
            KeyCode::Left => Some(Ok(state.next_tonic(false))),
            KeyCode::Right => Some(Ok(state.next_tonic(true))),
            KeyCode::Char(c) => match c.to_digit(10) {
                Some(d) if (1..=MAQAMAT.len() as u32).contains(&d) => Some(
                    state
                        .selection
                        .with_maqam(MAQAMAT[d as usize - 1].name)
                        .map_err(|e| e.to_string()),
                ),
                _ => None,
            },
            _ => continue,
        };

        if let Some(next) = changed {
            engine.send(state.silence())?;
            match next.and_then(|sel| state.select(sel)) {
                Ok(()) => print_banner(stdout, state),
                Err(e) => {
                    warn!("live: {}", e);
                    print_banner(stdout, state);
                    update_status(stdout, state, Some(e));
                }
            }
            continue;
        }

        let Some(c) = note_key(code) else { continue };
        let Some((degree, shift)) = char_to_degree(c) else {
            continue;
        };
        let Some(freq) = state.layout.keyboard.freq(c) else {
            continue;
        };
        let holding = state.mode == PlayMode::Hold;

        // Without key release events, stop the note before starting it again
        if holding && !has_key_release {
            engine.send(LiveCommand::NoteOff { key: c })?;
        }

        engine.send(state.note_command(c, freq))?;
        update_status(
            stdout,
            state,
            Some(format!(
                "{} ({:.2} Hz)",
                degree_label(&state.layout, degree, shift),
                freq
            )),
        );

        // Without key release events, auto-off after 300ms
        if holding && !has_key_release {
            let tx = fallback_tx.clone();
            std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(300));
                let _ = tx.send(c);
            });
        }
    }
}

fn row(keys: &[char], labels: &[String]) -> String {
    keys.iter()
        .zip(labels)
        .map(|(k, l)| format!("{}={}", k, l))
        .collect::<Vec<_>>()
        .join("  ")
}

fn print_banner(stdout: &mut io::Stdout, state: &LiveState) {
    let layout = &state.layout;
    let tonic = &state.tonics[state.tonic_idx];

    let maqamat: Vec<String> = MAQAMAT
        .iter()
        .enumerate()
        .map(|(i, m)| format!("{} {}", i + 1, m.name))
        .collect();

    let banner = format!(
        "\x1b[2J\x1b[H\
maqamat live - 53-EDO keyboard\r\n\
─────────────────────────────────────────\r\n\
\r\n\
  Maqam:   {} (upper {}: {})\r\n\
  Tonic:   {} {}\r\n\
  Mode:    {}   Drones: {}\r\n\
\r\n\
  High:    {}\r\n\
  Middle:  {}\r\n\
  Bass:    {}\r\n\
\r\n\
  {}\r\n\
  Tab: next upper jins   Left/Right: tonic\r\n\
  o/p: tonic/upper drone l: pluck/hold\r\n\
  Space: silence         Esc: quit\r\n\
\r\n",
        layout.maqam,
        layout.upper_jins,
        state.selection.maqam.upper_options.join("/"),
        tonic.name,
        tonic.info(),
        state.mode.name(),
        state.drone_status(),
        row(&HIGH_KEYS, &row_labels(layout, 1)),
        row(&MID_KEYS, &row_labels(layout, 0)),
        row(&BASS_KEYS, &row_labels(layout, -1)),
        maqamat.join("  "),
    );
    let _ = write!(stdout, "{}", banner);
    update_status(stdout, state, None);
}

fn update_status(stdout: &mut io::Stdout, state: &LiveState, note: Option<String>) {
    let note_display = note.unwrap_or_else(|| "---".to_string());
    let _ = write!(
        stdout,
        "\x1b[19;1H\x1b[2K  {}  |  Note: {}\r",
        state.layout.upper_jins, note_display
    );
    let _ = stdout.flush();
}
