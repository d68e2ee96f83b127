use audio_backend::null_backend::NullChannelBackend;
use audio_backend::{
    BackendError, BackendKind, ChannelBackend, create_channel_backend, is_mock_backend_enabled,
};

#[test]
fn null_backend_never_yields_a_channel() {
    let mut backend = NullChannelBackend::new();
    assert_eq!(backend.kind(), BackendKind::Null);
    for _ in 0..3 {
        assert_eq!(
            backend.try_create_channel().err(),
            Some(BackendError::Unavailable)
        );
    }
}

#[test]
fn factory_reports_compiled_variant() {
    let backend = create_channel_backend();
    let expected = if is_mock_backend_enabled() {
        BackendKind::Mock
    } else {
        BackendKind::Null
    };
    assert_eq!(backend.kind(), expected);
}

#[cfg(feature = "mock-audio")]
mod mock {
    use audio_backend::mock_backend::MockChannelBackend;
    use audio_backend::{ChannelBackend, ChannelParam, PlaybackState};

    #[test]
    fn released_channels_are_reusable_after_exhaustion() {
        let mut backend = MockChannelBackend::with_capacity(3);
        let probe = backend.probe();
        let mut held: Vec<_> = (0..3)
            .map(|_| backend.try_create_channel().unwrap())
            .collect();
        assert!(backend.try_create_channel().is_err());

        held.pop();
        let mut again = backend.try_create_channel().expect("slot freed by drop");
        again.set_param(ChannelParam::Looping(true));
        again.play();
        assert_eq!(probe.live_channels(), 3);
        assert!(probe.channel(again.id()).unwrap().looping);
        assert_eq!(probe.finish_all_playing(), 1);
        assert_eq!(again.state(), PlaybackState::Stopped);
    }
}
