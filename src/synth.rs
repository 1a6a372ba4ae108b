use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use log::{debug, error};
use std::f64::consts::TAU;
use std::sync::mpsc;
use std::time::Duration;

use crate::layout::Drone;
use crate::voice::Voice;

/// A command sent to the audio thread
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LiveCommand {
    /// Start a held note, ignored if `key` is already sounding
    NoteOn { key: char, freq: f64 },
    /// Release a held note
    NoteOff { key: char },
    /// Fire-and-forget note that decays on its own
    Pluck { freq: f64 },
    /// Start a pure sine drone, ignored if that drone already sounds
    DroneOn { drone: Drone, freq: f64 },
    DroneOff { drone: Drone },
    /// Release everything that is held, drones included
    AllNotesOff,
    /// Silence and stop taking commands
    Shutdown,
}

/// What started a tone, so the matching off command can find it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Source {
    Key(char),
    Drone(Drone),
    Pluck,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Envelope {
    Pluck,
    Held,
    Released { at: f64, level: f64 },
}

/// One sounding note with its own envelope clock.
#[derive(Debug, Clone)]
struct Tone {
    source: Source,
    freq: f64,
    partials: Vec<(f64, f64)>,
    t: f64,
    envelope: Envelope,
}

impl Tone {
    fn new(source: Source, freq: f64, voice: &Voice, envelope: Envelope) -> Self {
        Self {
            source,
            freq,
            partials: voice.waveform.partials(),
            t: 0.0,
            envelope,
        }
    }

    fn drone(drone: Drone, freq: f64, voice: &Voice) -> Self {
        Self {
            source: Source::Drone(drone),
            freq,
            partials: vec![(1.0, voice.drone)],
            t: 0.0,
            envelope: Envelope::Held,
        }
    }

    fn level(&self, voice: &Voice) -> f64 {
        match self.envelope {
            Envelope::Pluck => voice.pluck_level(self.t),
            Envelope::Held => (self.t / voice.attack.max(f64::EPSILON)).min(1.0),
            Envelope::Released { at, level } => {
                let fade = 1.0 - (self.t - at) / voice.release.max(f64::EPSILON);
                level * fade.max(0.0)
            }
        }
    }

    fn finished(&self, voice: &Voice) -> bool {
        match self.envelope {
            Envelope::Pluck => self.t >= voice.pluck_length(),
            Envelope::Held => false,
            Envelope::Released { at, .. } => self.t - at >= voice.release,
        }
    }

    fn release(&mut self, voice: &Voice) {
        if self.envelope == Envelope::Held {
            self.envelope = Envelope::Released {
                at: self.t,
                level: self.level(voice),
            };
        }
    }

    fn next_sample(&mut self, voice: &Voice, dt: f64) -> f64 {
        let level = self.level(voice);
        let value: f64 = self
            .partials
            .iter()
            .map(|&(k, a)| a * (TAU * k * self.freq * self.t).sin())
            .sum();
        self.t += dt;
        value * level
    }
}

/// Polyphonic mix state owned by the audio callback.
#[derive(Debug)]
struct Mixer {
    voice: Voice,
    tones: Vec<Tone>,
    dt: f64,
    stopped: bool,
}

impl Mixer {
    fn new(voice: Voice, sample_rate: f64) -> Self {
        Self {
            voice,
            tones: Vec::new(),
            dt: 1.0 / sample_rate,
            stopped: false,
        }
    }

    fn held(&self, source: Source) -> bool {
        self.tones
            .iter()
            .any(|t| t.source == source && t.envelope == Envelope::Held)
    }

    fn release(&mut self, source: Source) {
        for tone in self.tones.iter_mut().filter(|t| t.source == source) {
            tone.release(&self.voice);
        }
    }

    fn handle(&mut self, cmd: LiveCommand) {
        match cmd {
            LiveCommand::NoteOn { key, freq } => {
                if !self.held(Source::Key(key)) {
                    self.tones
                        .push(Tone::new(Source::Key(key), freq, &self.voice, Envelope::Held));
                }
            }
            LiveCommand::NoteOff { key } => self.release(Source::Key(key)),
            LiveCommand::Pluck { freq } => {
                self.tones
                    .push(Tone::new(Source::Pluck, freq, &self.voice, Envelope::Pluck));
            }
            LiveCommand::DroneOn { drone, freq } => {
                if !self.held(Source::Drone(drone)) {
                    self.tones.push(Tone::drone(drone, freq, &self.voice));
                }
            }
            LiveCommand::DroneOff { drone } => self.release(Source::Drone(drone)),
            LiveCommand::AllNotesOff => {
                for tone in &mut self.tones {
                    tone.release(&self.voice);
                }
            }
            LiveCommand::Shutdown => {
                self.tones.clear();
                self.stopped = true;
            }
        }
    }

    /// Fill one interleaved buffer, the same mono signal on every channel.
    fn fill(&mut self, data: &mut [f32], channels: usize) {
        for frame in data.chunks_mut(channels.max(1)) {
            let mut value = 0.0_f64;
            for tone in &mut self.tones {
                value += tone.next_sample(&self.voice, self.dt);
            }
            let sample = (value * self.voice.gain).clamp(-1.0, 1.0) as f32;
            for s in frame.iter_mut() {
                *s = sample;
            }
        }
        let voice = &self.voice;
        self.tones.retain(|t| !t.finished(voice));
    }
}

/// Handle to the default output device. Dropping it closes the stream.
pub struct AudioEngine {
    tx: mpsc::Sender<LiveCommand>,
    _stream: cpal::Stream,
}

impl AudioEngine {
    pub fn new(voice: Voice) -> Result<Self, String> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or("no output audio device available")?;

        let config = device
            .default_output_config()
            .map_err(|e| format!("failed to get default output config: {}", e))?;

        let sample_rate = config.sample_rate() as f64;
        let channels = config.channels() as usize;
        debug!("audio output: {} Hz, {} channels", sample_rate, channels);

        let (tx, rx) = mpsc::channel::<LiveCommand>();
        let mut mixer = Mixer::new(voice, sample_rate);

        let stream = device
            .build_output_stream(
                &config.into(),
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    while let Ok(cmd) = rx.try_recv() {
                        mixer.handle(cmd);
                    }
                    if mixer.stopped {
                        data.fill(0.0);
                        return;
                    }
                    mixer.fill(data, channels);
                },
                move |err| {
                    error!("audio stream error: {}", err);
                },
                None,
            )
            .map_err(|e| format!("failed to build output stream: {}", e))?;

        stream
            .play()
            .map_err(|e| format!("failed to play stream: {}", e))?;

        Ok(Self {
            tx,
            _stream: stream,
        })
    }

    pub fn send(&self, cmd: LiveCommand) -> Result<(), String> {
        self.tx
            .send(cmd)
            .map_err(|_| "audio thread disconnected".to_string())
    }
}

/// Pluck each frequency in turn at `tempo`, then let the last one ring out.
pub fn play(freqs: &[(String, f64)], tempo: u32, voice: Voice) -> Result<(), String> {
    let beat = Duration::from_secs_f64(60.0 / tempo.max(1) as f64);
    let tail = Duration::from_secs_f64(voice.pluck_length().min(3.0));
    let engine = AudioEngine::new(voice)?;

    for (label, freq) in freqs {
        println!("  Playing {} ({:.2} Hz)", label, freq);
        engine.send(LiveCommand::Pluck { freq: *freq })?;
        std::thread::sleep(beat);
    }

    std::thread::sleep(tail);
    let _ = engine.send(LiveCommand::Shutdown);
    // Give the callback a chance to see the shutdown before the stream drops
    std::thread::sleep(Duration::from_millis(20));

    Ok(())
}
