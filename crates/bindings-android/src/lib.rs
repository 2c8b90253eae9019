// JNI bridge for the player activity
// Each activity owns one SessionController, addressed by an opaque handle

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use reel_core::lifecycle::LEGACY_PLATFORM_CUTOVER;
use reel_core::{
    EngineFactory, Error, ForegroundEvent, LifecyclePolicy, PlaybackRate, Result, SessionConfig,
    SessionController,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

type SharedSession = Arc<Mutex<SessionController>>;

// Each session has its own lock; the registry lock only covers lookups
static SESSIONS: Lazy<Mutex<HashMap<i64, SharedSession>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));
static NEXT_SESSION_ID: AtomicI64 = AtomicI64::new(1);

/// Session settings for an activity: default source strategy, the given URI
/// (blank keeps the default) and the lifecycle policy for the OS version.
pub fn session_config(media_uri: &str, platform_version: u32) -> SessionConfig {
    let mut config = SessionConfig::default();
    let media_uri = media_uri.trim();
    if !media_uri.is_empty() {
        config.media_uri = media_uri.to_string();
    }
    config.with_lifecycle(LifecyclePolicy::from_platform_version(
        platform_version,
        LEGACY_PLATFORM_CUTOVER,
    ))
}

pub fn create_session(
    media_uri: &str,
    platform_version: u32,
    factory: impl EngineFactory + 'static,
) -> i64 {
    reel_core::init_logging();
    let config = session_config(media_uri, platform_version);
    log::info!(
        "Creating session for {} ({:?}, platform {})",
        config.media_uri,
        config.strategy,
        platform_version
    );
    let controller = SessionController::new(config, factory);

    let id = NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed);
    SESSIONS
        .lock()
        .insert(id, Arc::new(Mutex::new(controller)));
    id
}

fn lookup(id: i64) -> Result<SharedSession> {
    SESSIONS
        .lock()
        .get(&id)
        .cloned()
        .ok_or_else(|| Error::InvalidState(format!("no session with handle {}", id)))
}

fn with_session_mut<R>(id: i64, f: impl FnOnce(&mut SessionController) -> Result<R>) -> Result<R> {
    let session = lookup(id)?;
    let mut session = session.lock();
    f(&mut session)
}

fn with_session<R>(id: i64, f: impl FnOnce(&SessionController) -> R) -> Result<R> {
    let session = lookup(id)?;
    let session = session.lock();
    Ok(f(&session))
}

fn to_code(result: Result<()>) -> i32 {
    match result {
        Ok(()) => 0,
        Err(err) => {
            log::error!("JNI call failed: {}", err);
            -1
        }
    }
}

pub fn foreground(id: i64, event: ForegroundEvent) -> i32 {
    to_code(with_session_mut(id, |s| s.on_foreground(event)))
}

/// Speed buttons by position: 0 half, 1 normal, 2 double.
pub fn adjust_speed(id: i64, index: i32) -> i32 {
    let Some(rate) = PlaybackRate::from_index(index) else {
        log::warn!("Unknown speed control index {}", index);
        return -1;
    };
    to_code(with_session_mut(id, |s| {
        s.set_playback_rate(rate);
        Ok(())
    }))
}

/// Live engine position, or the saved one while no engine exists. -1 for an unknown handle.
pub fn position_ms(id: i64) -> i64 {
    with_session(id, |s| {
        s.engine()
            .map(|engine| engine.current_position())
            .unwrap_or(s.session().position)
    })
    .map(|position| position.as_millis() as i64)
    .unwrap_or(-1)
}

/// Release the session's engine and forget the handle.
pub fn destroy_session(id: i64) -> i32 {
    // Stopped outside the registry lock; stopping joins the engine worker
    let removed = SESSIONS.lock().remove(&id);
    match removed {
        Some(session) => {
            session.lock().stop();
            0
        }
        None => -1,
    }
}

mod jni_bridge {
    use super::*;
    use jni::objects::{JClass, JString};
    use jni::sys::{jint, jlong};
    use jni::JNIEnv;
    use reel_engine::CpalEngineFactory;

    fn jstring_to_string(env: &mut JNIEnv, jstr: &JString) -> Result<String> {
        let java_str = env
            .get_string(jstr)
            .map_err(|e| Error::Other(format!("invalid Java string: {}", e)))?;
        Ok(java_str.into())
    }

    #[no_mangle]
    pub extern "system" fn Java_com_reel_player_PlayerActivity_nativeCreate(
        mut env: JNIEnv,
        _class: JClass,
        media_uri: JString,
        platform_version: jint,
    ) -> jlong {
        let media_uri = match jstring_to_string(&mut env, &media_uri) {
            Ok(uri) => uri,
            Err(err) => {
                log::warn!("{}; using the default media", err);
                String::new()
            }
        };
        create_session(
            &media_uri,
            platform_version.max(0) as u32,
            CpalEngineFactory::default(),
        )
    }

    #[no_mangle]
    pub extern "system" fn Java_com_reel_player_PlayerActivity_nativeOnStart(
        _env: JNIEnv,
        _class: JClass,
        handle: jlong,
    ) -> jint {
        foreground(handle, ForegroundEvent::Start)
    }

    #[no_mangle]
    pub extern "system" fn Java_com_reel_player_PlayerActivity_nativeOnResume(
        _env: JNIEnv,
        _class: JClass,
        handle: jlong,
    ) -> jint {
        foreground(handle, ForegroundEvent::Resume)
    }

    #[no_mangle]
    pub extern "system" fn Java_com_reel_player_PlayerActivity_nativeOnPause(
        _env: JNIEnv,
        _class: JClass,
        handle: jlong,
    ) -> jint {
        foreground(handle, ForegroundEvent::Pause)
    }

    #[no_mangle]
    pub extern "system" fn Java_com_reel_player_PlayerActivity_nativeOnStop(
        _env: JNIEnv,
        _class: JClass,
        handle: jlong,
    ) -> jint {
        foreground(handle, ForegroundEvent::Stop)
    }

    #[no_mangle]
    pub extern "system" fn Java_com_reel_player_PlayerActivity_nativeAdjustSpeed(
        _env: JNIEnv,
        _class: JClass,
        handle: jlong,
        control_index: jint,
    ) -> jint {
        adjust_speed(handle, control_index)
    }

    #[no_mangle]
    pub extern "system" fn Java_com_reel_player_PlayerActivity_nativeGetPosition(
        _env: JNIEnv,
        _class: JClass,
        handle: jlong,
    ) -> jlong {
        position_ms(handle)
    }

    #[no_mangle]
    pub extern "system" fn Java_com_reel_player_PlayerActivity_nativeDestroy(
        _env: JNIEnv,
        _class: JClass,
        handle: jlong,
    ) -> jint {
        destroy_session(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reel_core::mock::MockEngineFactory;
    use reel_core::SourceStrategy;
    use std::time::Duration;

    #[test]
    fn test_session_config_from_activity_arguments() {
        let config = session_config("  ", 21);
        assert_eq!(config.media_uri, SessionConfig::default().media_uri);
        assert_eq!(config.lifecycle, LifecyclePolicy::LEGACY);
        assert_eq!(config.strategy, SourceStrategy::default());

        let config = session_config("https://example.com/a.mp4", 30);
        assert_eq!(config.media_uri, "https://example.com/a.mp4");
        assert_eq!(config.lifecycle, LifecyclePolicy::EAGER);
    }

    #[test]
    fn test_activity_round_trip() {
        let factory = MockEngineFactory::new();
        let id = create_session("clip.mp4", 30, factory.clone());

        assert_eq!(foreground(id, ForegroundEvent::Start), 0);
        assert_eq!(factory.live_count(), 1);
        // Eager policy: resume after start does not build a second engine
        assert_eq!(foreground(id, ForegroundEvent::Resume), 0);
        assert_eq!(factory.created_count(), 1);

        assert_eq!(adjust_speed(id, 2), 0);
        assert_eq!(
            factory.current_parameters(),
            Some(PlaybackRate::Double.parameters())
        );
        assert_eq!(adjust_speed(id, 7), -1);

        factory.set_playhead(0, Duration::from_millis(1_500));
        assert_eq!(position_ms(id), 1_500);

        assert_eq!(foreground(id, ForegroundEvent::Stop), 0);
        assert_eq!(factory.live_count(), 0);
        assert_eq!(position_ms(id), 1_500);

        assert_eq!(destroy_session(id), 0);
        assert_eq!(destroy_session(id), -1);
    }

    #[test]
    fn test_destroy_releases_live_engine() {
        let factory = MockEngineFactory::new();
        let id = create_session("", 21, factory.clone());
        assert_eq!(foreground(id, ForegroundEvent::Resume), 0);
        assert_eq!(factory.live_count(), 1);
        assert_eq!(destroy_session(id), 0);
        assert_eq!(factory.live_count(), 0);
    }

    #[test]
    fn test_other_sessions_stay_reachable_while_one_is_busy() {
        let factory = MockEngineFactory::new();
        let busy = create_session("a.mp4", 30, factory.clone());
        let other = create_session("b.mp4", 30, factory.clone());
        assert_eq!(foreground(other, ForegroundEvent::Start), 0);
        factory.set_playhead(0, Duration::from_millis(250));

        let result = with_session_mut(busy, |session| {
            // Runs while `busy` is locked, as a slow engine stop would
            assert_eq!(position_ms(other), 250);
            assert_eq!(adjust_speed(other, 0), 0);
            assert_eq!(foreground(other, ForegroundEvent::Stop), 0);
            assert_eq!(destroy_session(other), 0);
            session.on_foreground(ForegroundEvent::Start)
        });
        assert!(result.is_ok());
        assert_eq!(factory.live_count(), 1);
        assert_eq!(destroy_session(busy), 0);
        assert_eq!(factory.live_count(), 0);
    }

    #[test]
    fn test_unknown_handle() {
        assert_eq!(foreground(-42, ForegroundEvent::Start), -1);
        assert_eq!(position_ms(-42), -1);
        assert_eq!(adjust_speed(-42, 1), -1);
    }
}
