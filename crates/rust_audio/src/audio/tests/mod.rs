//! Integration tests driving the audio manager through its public surface

mod transition_properties;
