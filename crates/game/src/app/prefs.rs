use std::fs;
use std::path::PathBuf;

use lanternvale_engine::write_text_atomic;
use serde::{Deserialize, Serialize};
use tracing::warn;

pub(crate) const PREFS_FILE_NAME: &str = "client_prefs.json";

const DEFAULT_ZOOM: f32 = 1.0;
const DEFAULT_CAMERA_LERP: f32 = 0.08;

/// Persisted client preferences. Absent file or unreadable content falls
/// back to the defaults; writes go through a tmp-then-rename so a crash
/// mid-write never corrupts the previous file.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub(crate) struct ClientPrefs {
    #[serde(default = "default_zoom")]
    pub zoom: f32,
    #[serde(default = "default_camera_lerp")]
    pub camera_lerp: Option<f32>,
}

fn default_zoom() -> f32 {
    DEFAULT_ZOOM
}

fn default_camera_lerp() -> Option<f32> {
    Some(DEFAULT_CAMERA_LERP)
}

impl Default for ClientPrefs {
    fn default() -> Self {
        Self {
            zoom: DEFAULT_ZOOM,
            camera_lerp: Some(DEFAULT_CAMERA_LERP),
        }
    }
}

#[derive(Debug)]
pub(crate) struct PrefsStore {
    path: PathBuf,
    current: ClientPrefs,
}

impl PrefsStore {
    pub(crate) fn load(path: PathBuf) -> Self {
        let current = match fs::read_to_string(&path) {
            Ok(text) => match serde_json::from_str(&text) {
                Ok(prefs) => prefs,
                Err(error) => {
                    warn!(path = %path.display(), error = %error, "prefs_unreadable");
                    ClientPrefs::default()
                }
            },
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => ClientPrefs::default(),
            Err(error) => {
                warn!(path = %path.display(), error = %error, "prefs_unreadable");
                ClientPrefs::default()
            }
        };
        Self { path, current }
    }

    pub(crate) fn current(&self) -> ClientPrefs {
        self.current
    }

    pub(crate) fn set_zoom(&mut self, zoom: f32) {
        if (self.current.zoom - zoom).abs() < f32::EPSILON {
            return;
        }
        self.current.zoom = zoom;
        self.persist();
    }

    #[allow(dead_code)]
    pub(crate) fn set_camera_lerp(&mut self, camera_lerp: Option<f32>) {
        if self.current.camera_lerp == camera_lerp {
            return;
        }
        self.current.camera_lerp = camera_lerp;
        self.persist();
    }

    fn persist(&self) {
        let text = match serde_json::to_string_pretty(&self.current) {
            Ok(text) => text,
            Err(error) => {
                warn!(error = %error, "prefs_serialize_failed");
                return;
            }
        };
        if let Err(error) = write_text_atomic(&self.path, &text) {
            warn!(path = %self.path.display(), error = %error, "prefs_write_failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let temp = TempDir::new().expect("tempdir");
        let store = PrefsStore::load(temp.path().join(PREFS_FILE_NAME));
        assert_eq!(store.current(), ClientPrefs::default());
    }

    #[test]
    fn corrupt_file_falls_back_to_defaults() {
        let temp = TempDir::new().expect("tempdir");
        let path = temp.path().join(PREFS_FILE_NAME);
        fs::write(&path, "{ not json").expect("write");
        let store = PrefsStore::load(path);
        assert_eq!(store.current(), ClientPrefs::default());
    }

    #[test]
    fn zoom_change_round_trips_through_disk() {
        let temp = TempDir::new().expect("tempdir");
        let path = temp.path().join(PREFS_FILE_NAME);

        let mut store = PrefsStore::load(path.clone());
        store.set_zoom(1.5);
        store.set_camera_lerp(None);

        let reloaded = PrefsStore::load(path);
        assert!((reloaded.current().zoom - 1.5).abs() < 0.0001);
        assert_eq!(reloaded.current().camera_lerp, None);
    }

    #[test]
    fn unchanged_values_do_not_rewrite_the_file() {
        let temp = TempDir::new().expect("tempdir");
        let path = temp.path().join(PREFS_FILE_NAME);

        let mut store = PrefsStore::load(path.clone());
        store.set_zoom(DEFAULT_ZOOM);
        assert!(!path.exists());
    }

    #[test]
    fn partial_file_fills_missing_fields_with_defaults() {
        let temp = TempDir::new().expect("tempdir");
        let path = temp.path().join(PREFS_FILE_NAME);
        fs::write(&path, r#"{ "zoom": 2.0 }"#).expect("write");

        let store = PrefsStore::load(path);
        assert!((store.current().zoom - 2.0).abs() < 0.0001);
        assert_eq!(store.current().camera_lerp, Some(DEFAULT_CAMERA_LERP));
    }
}
