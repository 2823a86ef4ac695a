//! Music transition properties
//!
//! Fades and cross-fades run through the manager tick, checking the
//! volume envelope on the simulated voices frame by frame.

use crate::audio::backend::simulated::SimulatedBackend;
use crate::audio::{AudioError, AudioManager, Clip, ClipRef, MemoryPreferenceStore, MusicRequest, MusicState, MusicTransition};
use crate::config::AudioConfig;

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const DT: f32 = 0.125;
    const EPSILON: f32 = 1e-4;

    fn playing(id: &str, music_volume: f32) -> AudioManager<SimulatedBackend> {
        let config = AudioConfig::default().with_volumes(music_volume, 1.0);
        let mut manager = AudioManager::start(SimulatedBackend::new(), config, Box::new(MemoryPreferenceStore::new())).unwrap();
        manager.play_bgm(MusicRequest::new(clip(id))).unwrap();
        manager
    }

    fn clip(id: &str) -> ClipRef {
        Clip::new(id, 120.0).into_ref()
    }

    fn primary_volume(manager: &AudioManager<SimulatedBackend>) -> f32 {
        let primary = manager.music().unwrap().primary_voice();
        manager.backend().voice(primary).unwrap().volume
    }

    fn step(manager: &mut AudioManager<SimulatedBackend>) {
        manager.backend_mut().advance(DT);
        manager.tick(DT);
    }

    #[test]
    fn test_cross_fade_never_exceeds_cap() {
        let mut manager = playing("day", 0.8);
        assert!(manager.music().unwrap().next_clip().is_none());

        manager
            .play_bgm(MusicRequest::new(clip("night")).with_transition(MusicTransition::CrossFade, 1.0))
            .unwrap();
        let outgoing = manager.music().unwrap().primary_voice();
        let incoming = manager.music().unwrap().shadow_voice().unwrap();

        let mut frames = 0;
        while manager.music().unwrap().is_transitioning() {
            step(&mut manager);
            frames += 1;
            assert!(frames <= 16, "cross-fade did not complete");

            if let Some(shadow) = manager.music().unwrap().shadow_voice() {
                let backend = manager.backend();
                let sum = backend.voice(outgoing).unwrap().volume + backend.voice(shadow).unwrap().volume;
                assert!(sum <= 0.8 + EPSILON, "frame {}: {} exceeds cap", frames, sum);
            }
        }

        let music = manager.music().unwrap();
        assert_eq!(music.current_clip().unwrap().id().as_str(), "night");
        assert_eq!(music.primary_voice(), incoming);
        assert!(music.shadow_voice().is_none());
        assert!(manager.backend().voice(outgoing).is_none());
        assert_relative_eq!(primary_volume(&manager), 0.8, epsilon = EPSILON);
        assert_eq!(manager.backend().voice_count(), 1);
    }

    #[test]
    fn test_linear_fade_out_then_in() {
        let mut manager = playing("menu", 1.0);
        manager
            .play_bgm(MusicRequest::new(clip("battle")).with_transition(MusicTransition::LinearFade, 1.0))
            .unwrap();

        let mut envelope = vec![primary_volume(&manager)];
        let mut frames = 0;
        while manager.music().unwrap().is_transitioning() {
            step(&mut manager);
            envelope.push(primary_volume(&manager));
            frames += 1;
            assert!(frames <= 32, "linear fade did not complete");
        }

        // Down to silence, then back up to the cap
        let trough = envelope
            .iter()
            .enumerate()
            .min_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
            .unwrap();
        assert_relative_eq!(envelope[trough], 0.0, epsilon = EPSILON);
        assert!(envelope[..=trough].windows(2).all(|w| w[1] <= w[0] + EPSILON));
        assert!(envelope[trough..].windows(2).all(|w| w[1] + EPSILON >= w[0]));
        assert_relative_eq!(*envelope.last().unwrap(), 1.0, epsilon = EPSILON);

        let music = manager.music().unwrap();
        assert_eq!(music.current_clip().unwrap().id().as_str(), "battle");
        assert!(music.next_clip().is_none());
    }

    #[test]
    fn test_rejected_request_leaves_transition_untouched() {
        let mut manager = playing("calm", 1.0);
        manager
            .play_bgm(MusicRequest::new(clip("storm")).with_transition(MusicTransition::LinearFade, 2.0))
            .unwrap();
        step(&mut manager);
        let before = manager.music().unwrap().snapshot();

        let cross = manager.play_bgm(MusicRequest::new(clip("finale")).with_transition(MusicTransition::CrossFade, 1.0));
        assert!(matches!(cross, Err(AudioError::TransitionInProgress)));
        let fade = manager.play_bgm(MusicRequest::new(clip("finale")).with_transition(MusicTransition::LinearFade, 1.0));
        assert!(matches!(fade, Err(AudioError::TransitionInProgress)));

        assert_eq!(manager.music().unwrap().snapshot(), before);
        assert!(manager.music().unwrap().shadow_voice().is_none());
    }

    #[test]
    fn test_swift_supersedes_pending_fade() {
        let mut manager = playing("calm", 1.0);
        manager
            .play_bgm(MusicRequest::new(clip("storm")).with_transition(MusicTransition::CrossFade, 2.0))
            .unwrap();
        step(&mut manager);

        manager.play_bgm(MusicRequest::new(clip("silence"))).unwrap();

        let music = manager.music().unwrap();
        assert!(!music.is_transitioning());
        assert!(music.shadow_voice().is_none());
        assert_eq!(music.current_clip().unwrap().id().as_str(), "silence");
        assert_eq!(manager.backend().voice_count(), 1);
        assert_relative_eq!(primary_volume(&manager), 1.0);
    }

    #[test]
    fn test_pause_suspends_transition() {
        let mut manager = playing("calm", 1.0);
        manager
            .play_bgm(MusicRequest::new(clip("storm")).with_transition(MusicTransition::LinearFade, 1.0))
            .unwrap();
        step(&mut manager);

        manager.pause_bgm().unwrap();
        let paused = manager.music().unwrap().snapshot();
        for _ in 0..20 {
            step(&mut manager);
        }
        assert_eq!(manager.music().unwrap().state(), MusicState::Paused);
        assert_eq!(manager.music().unwrap().snapshot(), paused);

        manager.resume_bgm().unwrap();
        for _ in 0..20 {
            step(&mut manager);
        }
        assert!(!manager.music().unwrap().is_transitioning());
        assert_eq!(manager.music().unwrap().current_clip().unwrap().id().as_str(), "storm");
    }

    #[test]
    fn test_cancel_settles_at_cap() {
        let mut manager = playing("calm", 0.6);
        manager
            .play_bgm(MusicRequest::new(clip("storm")).with_transition(MusicTransition::CrossFade, 1.0))
            .unwrap();
        step(&mut manager);
        step(&mut manager);

        manager.cancel_transition().unwrap();

        let music = manager.music().unwrap();
        assert!(!music.is_transitioning());
        assert!(music.shadow_voice().is_none());
        assert_eq!(music.current_clip().unwrap().id().as_str(), "calm");
        assert_relative_eq!(primary_volume(&manager), 0.6, epsilon = EPSILON);
    }

    #[test]
    fn test_volume_override_sets_channel() {
        let mut manager = playing("calm", 1.0);
        manager.play_bgm(MusicRequest::new(clip("storm")).with_volume(0.5)).unwrap();

        assert_eq!(manager.volumes().music_volume, 0.5);
        assert_relative_eq!(primary_volume(&manager), 0.5);
    }

    #[test]
    fn test_fade_with_volume_override_starts_from_current_level() {
        let mut manager = playing("calm", 1.0);
        manager
            .play_bgm(
                MusicRequest::new(clip("storm"))
                    .with_transition(MusicTransition::LinearFade, 2.0)
                    .with_volume(0.2),
            )
            .unwrap();
        assert_eq!(manager.volumes().music_volume, 0.2);

        step(&mut manager);
        assert_relative_eq!(primary_volume(&manager), 1.0 - DT / 2.0, epsilon = EPSILON);

        let mut envelope = vec![1.0, primary_volume(&manager)];
        let mut frames = 0;
        while manager.music().unwrap().is_transitioning() {
            step(&mut manager);
            envelope.push(primary_volume(&manager));
            frames += 1;
            assert!(frames <= 64, "linear fade did not complete");
        }

        let trough = envelope
            .iter()
            .enumerate()
            .min_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
            .unwrap();
        assert!(envelope[..=trough].windows(2).all(|w| w[1] <= w[0] + EPSILON));
        assert!(envelope[trough..].iter().all(|v| *v <= 0.2 + EPSILON));
        assert_relative_eq!(primary_volume(&manager), 0.2, epsilon = EPSILON);
        assert_eq!(manager.music().unwrap().current_clip().unwrap().id().as_str(), "storm");
    }

    #[test]
    fn test_cross_fade_with_volume_override_heads_for_new_level() {
        let mut manager = playing("day", 0.9);
        manager
            .play_bgm(
                MusicRequest::new(clip("night"))
                    .with_transition(MusicTransition::CrossFade, 1.0)
                    .with_volume(0.3),
            )
            .unwrap();
        let outgoing = manager.music().unwrap().primary_voice();

        step(&mut manager);
        assert_relative_eq!(manager.backend().voice(outgoing).unwrap().volume, 0.9 * (1.0 - DT), epsilon = EPSILON);

        let mut frames = 0;
        while manager.music().unwrap().is_transitioning() {
            if let Some(shadow) = manager.music().unwrap().shadow_voice() {
                let backend = manager.backend();
                let sum = backend.voice(outgoing).unwrap().volume + backend.voice(shadow).unwrap().volume;
                assert!(sum <= 0.9 + EPSILON, "frame {}: {} exceeds outgoing level", frames, sum);
            }
            step(&mut manager);
            frames += 1;
            assert!(frames <= 16, "cross-fade did not complete");
        }

        assert_relative_eq!(primary_volume(&manager), 0.3, epsilon = EPSILON);
        assert_eq!(manager.volumes().music_volume, 0.3);
    }

    #[test]
    fn test_inactive_music_forces_swift() {
        let mut manager = playing("calm", 1.0);
        manager.stop_bgm().unwrap();

        manager
            .play_bgm(MusicRequest::new(clip("storm")).with_transition(MusicTransition::CrossFade, 3.0))
            .unwrap();

        let music = manager.music().unwrap();
        assert!(!music.is_transitioning());
        assert_eq!(music.state(), MusicState::Playing);
        assert_eq!(music.current_clip().unwrap().id().as_str(), "storm");
    }
}
