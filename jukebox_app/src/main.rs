//! Jukebox demo application
//!
//! Runs a scripted audio session headlessly against the simulated backend:
//! music changes with every transition kind, footsteps with random pitch,
//! a singleton alarm, an endless ambience loop and a settings screen
//! nudging the external mixer. Preferences persist in `jukebox_prefs.toml`.

use rand::Rng;
use rust_audio::config::ConfigError;
use rust_audio::foundation::logging;
use rust_audio::foundation::math::linear_to_mixer_db;
use rust_audio::prelude::*;
use std::cell::Cell;
use std::rc::Rc;
use thiserror::Error;

const FRAME_TIME: f32 = 1.0 / 60.0;
const SESSION_SECONDS: f32 = 12.0;

#[derive(Error, Debug)]
enum JukeboxError {
    #[error("Audio error: {0}")]
    Audio(#[from] AudioError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// Something the script does at a point in time
enum Cue {
    Music(&'static str, MusicTransition, f32),
    Alarm(f32),
    StartRain,
    StopRain,
    SettingsSfxVolume(f32),
    MasterMute,
    Pause,
    Resume,
}

struct Jukebox {
    audio: AudioManager<SimulatedBackend>,
    settings_mixer: SimulatedMixer,
    script: Vec<(f32, Cue)>,
    rain: Option<EffectKey>,
    alarms_finished: Rc<Cell<u32>>,
    elapsed: f32,
    next_step: f32,
}

impl Jukebox {
    fn new() -> Result<Self, JukeboxError> {
        let config = AudioConfig::load_or_default("audio.toml")?.with_mixer_parameters("MusicVol", "SfxVol");
        let preferences = FilePreferenceStore::open("jukebox_prefs.toml")?;

        let settings_mixer = SimulatedMixer::with_parameters(["MusicVol", "SfxVol"], linear_to_mixer_db(1.0));
        let mut audio = AudioManager::start(SimulatedBackend::new(), config, Box::new(preferences))?
            .with_external_mixer(Box::new(settings_mixer.clone()));

        for (id, length) in [("overture", 40.0), ("exploration", 95.0), ("battle", 60.0)] {
            audio.add_clip(Clip::new(id, length).into_ref());
        }

        let script = vec![
            (0.0, Cue::Music("overture", MusicTransition::Swift, 0.0)),
            (1.0, Cue::StartRain),
            (3.0, Cue::Music("exploration", MusicTransition::CrossFade, 2.0)),
            // Rejected: the cross-fade is still running
            (4.0, Cue::Music("battle", MusicTransition::LinearFade, 1.0)),
            (5.0, Cue::Alarm(3.0)),
            (5.5, Cue::Alarm(1.5)),
            (6.0, Cue::SettingsSfxVolume(0.5)),
            (7.0, Cue::Music("battle", MusicTransition::LinearFade, 2.0)),
            (8.0, Cue::Pause),
            (8.5, Cue::Resume),
            (9.0, Cue::MasterMute),
            (9.5, Cue::MasterMute),
            (10.0, Cue::StopRain),
        ];

        Ok(Self {
            audio,
            settings_mixer,
            script,
            rain: None,
            alarms_finished: Rc::new(Cell::new(0)),
            elapsed: 0.0,
            next_step: 0.0,
        })
    }

    fn run(&mut self) {
        let mut rng = rand::thread_rng();
        let mut next_report = 0.0;

        while self.elapsed < SESSION_SECONDS {
            self.run_cues();

            if self.elapsed >= self.next_step {
                let pitch = rng.gen_range(0.9..1.1);
                let step = Clip::new("footstep", 0.2).into_ref();
                self.audio.play_one_shot(EffectRequest::new(step).with_volume(0.7).with_pitch(pitch));
                self.next_step += 0.5;
            }

            self.audio.backend_mut().advance(FRAME_TIME);
            let report = self.audio.tick(FRAME_TIME);
            if !report.drift.is_empty() {
                log::info!("[{:5.2}s] mixer reconciled {:?}", self.elapsed, report.drift);
            }

            if self.elapsed >= next_report {
                self.report();
                next_report += 1.0;
            }
            self.elapsed += FRAME_TIME;
        }
    }

    fn run_cues(&mut self) {
        let due = self.script.iter().take_while(|(at, _)| *at <= self.elapsed).count();
        let cues: Vec<Cue> = self.script.drain(..due).map(|(_, cue)| cue).collect();
        for cue in cues {
            self.run_cue(cue);
        }
    }

    fn run_cue(&mut self, cue: Cue) {
        match cue {
            Cue::Music(id, transition, duration) => {
                let clip = self.audio.clip(id);
                let request = MusicRequest::new(clip).with_transition(transition, duration);
                if let Err(e) = self.audio.play_bgm(request) {
                    log::info!("[{:5.2}s] '{}' not started: {}", self.elapsed, id, e);
                }
            }
            Cue::Alarm(duration) => {
                let finished = Rc::clone(&self.alarms_finished);
                let alarm = Clip::new("alarm", 0.75).into_ref();
                let request = EffectRequest::new(alarm)
                    .singleton()
                    .at(Vec3::new(4.0, 0.0, -2.0))
                    .on_complete(move || finished.set(finished.get() + 1));
                self.audio.play_sfx(request, duration);
            }
            Cue::StartRain => {
                let rain = Clip::new("rain", 2.5).into_ref();
                self.rain = self.audio.repeat_sfx(EffectRequest::new(rain).with_volume(0.4), -1);
            }
            Cue::StopRain => {
                if let Some(key) = self.rain.take() {
                    self.audio.stop_sfx(key);
                }
            }
            Cue::SettingsSfxVolume(volume) => {
                self.settings_mixer.set_parameter("SfxVol", linear_to_mixer_db(volume));
            }
            Cue::MasterMute => {
                let muted = self.audio.toggle_master_mute();
                log::info!("[{:5.2}s] master mute {}", self.elapsed, if muted { "on" } else { "off" });
            }
            Cue::Pause => {
                if let Err(e) = self.audio.pause_bgm() {
                    log::warn!("Pause failed: {}", e);
                }
                self.audio.pause_all_sfx();
            }
            Cue::Resume => {
                if let Err(e) = self.audio.resume_bgm() {
                    log::warn!("Resume failed: {}", e);
                }
                self.audio.resume_all_sfx();
            }
        }
    }

    fn report(&self) {
        let Some(music) = self.audio.music() else {
            return;
        };
        let volumes = self.audio.volumes();
        log::info!(
            "[{:5.2}s] music {} {:?}{} | effects {} | volumes {:.2}/{:.2}",
            self.elapsed,
            music.current_clip().map_or("-", |clip| clip.id().as_str()),
            music.state(),
            music.next_clip().map_or(String::new(), |next| format!(" -> {}", next.id())),
            self.audio.effects().len(),
            volumes.music_volume,
            volumes.sfx_volume,
        );
    }
}

fn main() {
    logging::init_with_default("info");

    let mut jukebox = match Jukebox::new() {
        Ok(jukebox) => jukebox,
        Err(e) => {
            log::error!("Failed to start jukebox: {}", e);
            std::process::exit(1);
        }
    };

    jukebox.run();
    log::info!("Alarms finished: {}", jukebox.alarms_finished.get());
    jukebox.audio.destroy();
}
