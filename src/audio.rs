//! Sound cues, synthesized with fundsp and played through rodio.
//!
//! Every cue is rendered once into a sample buffer when the audio device opens.
//! Without a device the game runs silent.

use fundsp::prelude::*;
use rodio::buffer::SamplesBuffer;
use rodio::{OutputStream, OutputStreamHandle, Sink, Source};

const SAMPLE_RATE: u32 = 44_100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cue {
    Flap,
    Score,
    Ambient,
    Hit,
}

// ── Sounds ──────────────────────────────────────────────────────────────────

fn bake(seconds: f32, mut next: impl FnMut() -> f32) -> Vec<f32> {
    let n = (SAMPLE_RATE as f32 * seconds) as usize;
    (0..n).map(|_| next()).collect()
}

/// Falling saw sweep, 400Hz down to 80Hz.
fn death() -> Vec<f32> {
    let freq = lfo(|t: f32| lerp11(400.0, 80.0, (t / 0.4).min(1.0) * 2.0 - 1.0));
    let gain = lfo(|t: f32| lerp(0.15, 0.0, (t / 0.5).min(1.0)));
    let mut sound = (freq >> saw()) * gain;
    bake(0.5, || sound.get_mono())
}

/// Short upward chirp.
fn flap() -> Vec<f32> {
    let freq = lfo(|t: f32| lerp(300.0, 700.0, (t / 0.08).min(1.0)));
    let gain = lfo(|t: f32| lerp(0.12, 0.0, (t / 0.1).min(1.0)));
    let mut sound = (freq >> sine::<f32>()) * gain;
    bake(0.1, || sound.get_mono())
}

/// Two rising square-ish blips.
fn score() -> Vec<f32> {
    let freq = lfo(|t: f32| if t < 0.08 { 880.0 } else { 1320.0 });
    let gain = lfo(|t: f32| if t < 0.2 { 0.08 * (1.0 - t / 0.2) } else { 0.0 });
    let mut sound = (freq >> square()) * gain;
    bake(0.2, || sound.get_mono())
}

/// Low wobbling grumble that plays every so often during a run.
fn ambient() -> Vec<f32> {
    let freq = lfo(|t: f32| 110.0 + 25.0 * sin_hz(6.0, t));
    let gain = lfo(|t: f32| 0.1 * sin_hz(0.5 / 1.2, t).abs());
    let mut sound = (freq >> saw() >> lowpass_hz(900.0, 0.7)) * gain;
    bake(1.2, || sound.get_mono())
}

/// Looping arpeggio for the background.
fn music() -> Vec<f32> {
    const NOTES: [f32; 8] = [
        261.63, 329.63, 392.00, 523.25, 392.00, 329.63, 293.66, 349.23,
    ];
    const NOTE_SECS: f32 = 0.25;
    let mut out = Vec::new();
    for hz in NOTES {
        let gain = lfo(|t: f32| 0.05 * (-t * 6.0).exp());
        let mut note = (constant(hz) >> triangle()) * gain;
        out.extend(bake(NOTE_SECS, || note.get_mono()));
    }
    out
}

fn buffer(samples: &[f32]) -> SamplesBuffer<f32> {
    SamplesBuffer::new(1, SAMPLE_RATE, samples.to_vec())
}

// ── Player ──────────────────────────────────────────────────────────────────

struct Bank {
    flap: Vec<f32>,
    score: Vec<f32>,
    ambient: Vec<f32>,
    hit: Vec<f32>,
    music: Vec<f32>,
}

struct Device {
    _stream: OutputStream,
    handle: OutputStreamHandle,
    music: Sink,
    ambient: Sink,
}

pub struct Audio {
    device: Option<Device>,
    bank: Bank,
}

impl Audio {
    /// Opens the default output device. Failure is logged and leaves the game silent.
    pub fn new(enabled: bool) -> Self {
        let bank = Bank {
            flap: flap(),
            score: score(),
            ambient: ambient(),
            hit: death(),
            music: music(),
        };
        let device = if enabled { Self::open() } else { None };
        Audio { device, bank }
    }

    pub fn silent() -> Self {
        Audio {
            device: None,
            bank: Bank {
                flap: Vec::new(),
                score: Vec::new(),
                ambient: Vec::new(),
                hit: Vec::new(),
                music: Vec::new(),
            },
        }
    }

    fn open() -> Option<Device> {
        let (stream, handle) = match OutputStream::try_default() {
            Ok(pair) => pair,
            Err(e) => {
                log::warn!("no audio output, playing silent: {e}");
                return None;
            }
        };
        let sinks = Sink::try_new(&handle).and_then(|m| Sink::try_new(&handle).map(|a| (m, a)));
        match sinks {
            Ok((music, ambient)) => Some(Device {
                _stream: stream,
                handle,
                music,
                ambient,
            }),
            Err(e) => {
                log::warn!("audio sink unavailable, playing silent: {e}");
                None
            }
        }
    }

    pub fn is_active(&self) -> bool {
        self.device.is_some()
    }

    pub fn play(&self, cue: Cue) {
        let Some(dev) = &self.device else { return };
        match cue {
            Cue::Ambient => {
                dev.ambient.stop();
                dev.ambient.append(buffer(&self.bank.ambient));
            }
            Cue::Flap | Cue::Score | Cue::Hit => {
                let samples = match cue {
                    Cue::Flap => &self.bank.flap,
                    Cue::Score => &self.bank.score,
                    _ => &self.bank.hit,
                };
                if let Err(e) = dev.handle.play_raw(buffer(samples)) {
                    log::debug!("dropped {cue:?} cue: {e}");
                }
            }
        }
    }

    pub fn start_music(&self) {
        let Some(dev) = &self.device else { return };
        dev.music.stop();
        dev.music.append(buffer(&self.bank.music).repeat_infinite());
        dev.music.play();
    }

    /// Silences music and the ambient voice. One-shot cues run out on their own.
    pub fn stop_loops(&self) {
        if let Some(dev) = &self.device {
            dev.music.stop();
            dev.ambient.stop();
        }
    }
}

impl Drop for Audio {
    fn drop(&mut self) {
        self.stop_loops();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cues_have_expected_lengths_and_stay_in_range() {
        for (samples, secs) in [(flap(), 0.1), (score(), 0.2), (death(), 0.5), (ambient(), 1.2)] {
            assert_eq!(samples.len(), (SAMPLE_RATE as f32 * secs) as usize);
            assert!(samples.iter().all(|s| s.is_finite() && s.abs() <= 1.0));
        }
        assert_eq!(music().len(), 8 * (SAMPLE_RATE as f32 * 0.25) as usize);
    }

    #[test]
    fn silent_audio_ignores_cues() {
        let audio = Audio::silent();
        assert!(!audio.is_active());
        audio.play(Cue::Hit);
        audio.start_music();
        audio.stop_loops();
    }
}
