//! Single-effect playback session.

use std::fmt;

/// Lifecycle of one playback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PlaybackState {
    #[default]
    Idle,
    /// A dynamic waveform is being uploaded.
    Uploading,
    Playing,
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlaybackState::Idle => write!(f, "Idle"),
            PlaybackState::Uploading => write!(f, "Uploading"),
            PlaybackState::Playing => write!(f, "Playing"),
        }
    }
}

/// Which effect is in flight, per actuator.
///
/// A session is `Playing` iff it holds an active id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PlaybackSession {
    active_id: Option<u16>,
    secondary_id: Option<u16>,
    state: PlaybackState,
}

impl PlaybackSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    /// Effect id on the primary actuator.
    pub fn active_id(&self) -> Option<u16> {
        self.active_id
    }

    /// Effect id on the secondary actuator, when dual.
    pub fn secondary_id(&self) -> Option<u16> {
        self.secondary_id
    }

    pub fn is_idle(&self) -> bool {
        self.state == PlaybackState::Idle
    }

    pub(crate) fn begin_upload(&mut self) {
        self.state = PlaybackState::Uploading;
    }

    pub(crate) fn start_playing(&mut self, primary: u16, secondary: Option<u16>) {
        self.active_id = Some(primary);
        self.secondary_id = secondary;
        self.state = PlaybackState::Playing;
    }

    pub(crate) fn clear(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle() {
        let mut session = PlaybackSession::new();
        assert!(session.is_idle());

        session.begin_upload();
        assert_eq!(session.state(), PlaybackState::Uploading);
        assert_eq!(session.active_id(), None);

        session.start_playing(14, Some(15));
        assert_eq!(session.state(), PlaybackState::Playing);
        assert_eq!(session.active_id(), Some(14));
        assert_eq!(session.secondary_id(), Some(15));

        session.clear();
        assert_eq!(session, PlaybackSession::default());
    }
}
