// Fixed playback-rate presets selected from the UI

/// Speed and pitch applied to the engine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackParameters {
    pub speed: f32,
    pub pitch: f32,
}

impl PlaybackParameters {
    pub const DEFAULT: PlaybackParameters = PlaybackParameters::new(1.0, 1.0);

    pub const fn new(speed: f32, pitch: f32) -> Self {
        Self { speed, pitch }
    }
}

impl Default for PlaybackParameters {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// One of the three speed buttons. Pitch is always 1.0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlaybackRate {
    Half,
    Normal,
    Double,
}

impl PlaybackRate {
    pub const ALL: [PlaybackRate; 3] = [PlaybackRate::Half, PlaybackRate::Normal, PlaybackRate::Double];

    pub const fn parameters(self) -> PlaybackParameters {
        match self {
            PlaybackRate::Half => PlaybackParameters::new(0.5, 1.0),
            PlaybackRate::Normal => PlaybackParameters::DEFAULT,
            PlaybackRate::Double => PlaybackParameters::new(2.0, 1.0),
        }
    }

    /// Map a UI control identifier to a preset.
    ///
    /// Accepts the button names used by the layout (`half_speed`,
    /// `normal_speed`, `double_speed`, with or without a `btn_` prefix).
    /// Unknown identifiers yield `None` and the action is ignored.
    pub fn from_control_id(id: &str) -> Option<Self> {
        match id.trim().trim_start_matches("btn_") {
            "half_speed" => Some(PlaybackRate::Half),
            "normal_speed" => Some(PlaybackRate::Normal),
            "double_speed" => Some(PlaybackRate::Double),
            _ => None,
        }
    }

    /// Integer ids used across the JNI boundary.
    pub fn from_index(index: i32) -> Option<Self> {
        match index {
            0 => Some(PlaybackRate::Half),
            1 => Some(PlaybackRate::Normal),
            2 => Some(PlaybackRate::Double),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets_pin_pitch() {
        for rate in PlaybackRate::ALL {
            assert_eq!(rate.parameters().pitch, 1.0);
        }
        assert_eq!(PlaybackRate::Half.parameters().speed, 0.5);
        assert_eq!(PlaybackRate::Normal.parameters(), PlaybackParameters::DEFAULT);
        assert_eq!(PlaybackRate::Double.parameters().speed, 2.0);
    }

    #[test]
    fn test_control_ids() {
        assert_eq!(PlaybackRate::from_control_id("btn_half_speed"), Some(PlaybackRate::Half));
        assert_eq!(PlaybackRate::from_control_id("normal_speed"), Some(PlaybackRate::Normal));
        assert_eq!(PlaybackRate::from_control_id("btn_double_speed"), Some(PlaybackRate::Double));
        assert_eq!(PlaybackRate::from_control_id("btn_triple_speed"), None);
        assert_eq!(PlaybackRate::from_index(2), Some(PlaybackRate::Double));
        assert_eq!(PlaybackRate::from_index(-1), None);
    }
}
