use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::sync::Arc;
use std::thread;

use lanternvale_engine::SceneId;
use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};

/// Wire shape of a scene response. The transport and the exact document are
/// owned by the server; the client only requires that a whole, well-formed
/// document arrives before anything is applied.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct SceneDocument {
    pub success: bool,
    pub scene: String,
    pub world_width: f32,
    pub world_height: f32,
    pub start_x: f32,
    pub start_y: f32,
    pub background: u32,
    pub items: Vec<SceneItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct SceneItem {
    pub item_type: u32,
    pub x: Vec<u32>,
    pub y: Vec<u32>,
    #[serde(default)]
    pub rotation: f32,
    #[serde(default)]
    pub sway: bool,
    #[serde(default = "default_visible")]
    pub visible: bool,
}

fn default_visible() -> bool {
    true
}

#[derive(Debug, Error)]
pub(crate) enum SceneFetchError {
    #[error("scene request transport failed: {0}")]
    Transport(#[source] Box<ureq::Error>),
    #[error("failed to read scene response body: {0}")]
    ReadBody(#[source] std::io::Error),
    #[error("failed to parse scene document at {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("server rejected scene request for '{scene}'")]
    Rejected { scene: String },
    #[error("scene fetch worker disappeared before answering")]
    WorkerLost,
}

pub(crate) trait SceneFetch: Send + Sync {
    fn fetch(&self, id: &SceneId) -> Result<SceneDocument, SceneFetchError>;
}

pub(crate) struct HttpSceneFetch {
    base_url: String,
}

impl HttpSceneFetch {
    pub(crate) fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }
}

impl SceneFetch for HttpSceneFetch {
    fn fetch(&self, id: &SceneId) -> Result<SceneDocument, SceneFetchError> {
        let url = format!("{}/scenes/{}", self.base_url.trim_end_matches('/'), id.as_str());
        let response = ureq::get(&url)
            .call()
            .map_err(|error| SceneFetchError::Transport(Box::new(error)))?;
        let body = response
            .into_string()
            .map_err(SceneFetchError::ReadBody)?;
        parse_scene_document(&body)
    }
}

pub(crate) fn parse_scene_document(body: &str) -> Result<SceneDocument, SceneFetchError> {
    let mut deserializer = serde_json::Deserializer::from_str(body);
    let document: SceneDocument =
        serde_path_to_error::deserialize(&mut deserializer).map_err(|error| {
            SceneFetchError::Parse {
                path: error.path().to_string(),
                source: error.into_inner(),
            }
        })?;
    if !document.success {
        return Err(SceneFetchError::Rejected {
            scene: document.scene,
        });
    }
    Ok(document)
}

/// Runs each scene fetch on a helper thread and hands the result back over
/// a channel. The simulation keeps ticking on the old scene until `poll`
/// yields the response; only that single poll point ever applies a swap.
pub(crate) struct SceneService {
    fetcher: Arc<dyn SceneFetch>,
    pending: Option<PendingFetch>,
}

struct PendingFetch {
    id: SceneId,
    receiver: Receiver<Result<SceneDocument, SceneFetchError>>,
}

impl SceneService {
    pub(crate) fn new(fetcher: Arc<dyn SceneFetch>) -> Self {
        Self {
            fetcher,
            pending: None,
        }
    }

    #[allow(dead_code)]
    pub(crate) fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    #[allow(dead_code)]
    pub(crate) fn pending_scene(&self) -> Option<&SceneId> {
        self.pending.as_ref().map(|pending| &pending.id)
    }

    /// Kicks off a fetch. A request while another is in flight is dropped;
    /// failed fetches are surfaced through `poll` and never retried here.
    pub(crate) fn request(&mut self, id: SceneId) -> bool {
        if let Some(pending) = &self.pending {
            warn!(
                requested = id.as_str(),
                in_flight = pending.id.as_str(),
                "scene_request_dropped"
            );
            return false;
        }

        info!(scene = id.as_str(), "scene_fetch_started");
        let (sender, receiver) = mpsc::channel();
        let fetcher = Arc::clone(&self.fetcher);
        let fetch_id = id.clone();
        thread::spawn(move || {
            let result = fetcher.fetch(&fetch_id);
            let _ = sender.send(result);
        });
        self.pending = Some(PendingFetch { id, receiver });
        true
    }

    /// Non-blocking; called once per tick from the frame callback.
    pub(crate) fn poll(&mut self) -> Option<(SceneId, Result<SceneDocument, SceneFetchError>)> {
        let pending = self.pending.as_ref()?;
        match pending.receiver.try_recv() {
            Ok(result) => {
                let pending = self.pending.take()?;
                Some((pending.id, result))
            }
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                let pending = self.pending.take()?;
                Some((pending.id, Err(SceneFetchError::WorkerLost)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use super::*;

    struct StaticFetch {
        body: String,
    }

    impl SceneFetch for StaticFetch {
        fn fetch(&self, _id: &SceneId) -> Result<SceneDocument, SceneFetchError> {
            parse_scene_document(&self.body)
        }
    }

    fn ok_body(scene: &str) -> String {
        format!(
            r#"{{
                "success": true,
                "scene": "{scene}",
                "world_width": 640.0,
                "world_height": 480.0,
                "start_x": 96.0,
                "start_y": 96.0,
                "background": 1,
                "items": [
                    {{ "item_type": 2, "x": [3, 4], "y": [5] }}
                ]
            }}"#
        )
    }

    fn poll_until(
        service: &mut SceneService,
    ) -> (SceneId, Result<SceneDocument, SceneFetchError>) {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            if let Some(result) = service.poll() {
                return result;
            }
            assert!(Instant::now() < deadline, "fetch never resolved");
            thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn parse_accepts_items_with_default_metadata() {
        let document = parse_scene_document(&ok_body("village")).expect("document");
        assert_eq!(document.scene, "village");
        assert_eq!(document.items.len(), 1);
        assert!(document.items[0].visible);
        assert!(!document.items[0].sway);
        assert_eq!(document.items[0].rotation, 0.0);
    }

    #[test]
    fn parse_error_carries_json_path() {
        let body = r#"{
            "success": true,
            "scene": "village",
            "world_width": 640.0,
            "world_height": 480.0,
            "start_x": 0.0,
            "start_y": 0.0,
            "background": 1,
            "items": [ { "item_type": "oops", "x": [], "y": [] } ]
        }"#;
        let err = parse_scene_document(body).expect_err("error");
        match err {
            SceneFetchError::Parse { path, .. } => assert!(path.contains("items")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn unsuccessful_document_is_rejected() {
        let body = r#"{
            "success": false,
            "scene": "village",
            "world_width": 0.0,
            "world_height": 0.0,
            "start_x": 0.0,
            "start_y": 0.0,
            "background": 0,
            "items": []
        }"#;
        let err = parse_scene_document(body).expect_err("error");
        assert!(matches!(err, SceneFetchError::Rejected { .. }));
    }

    #[test]
    fn service_delivers_result_without_blocking_the_caller() {
        let mut service = SceneService::new(Arc::new(StaticFetch {
            body: ok_body("village"),
        }));
        assert!(service.request(SceneId("village".to_string())));
        assert!(service.is_pending());

        let (id, result) = poll_until(&mut service);
        assert_eq!(id.as_str(), "village");
        assert!(result.is_ok());
        assert!(!service.is_pending());
    }

    #[test]
    fn second_request_while_pending_is_dropped() {
        struct NeverFetch;
        impl SceneFetch for NeverFetch {
            fn fetch(&self, _id: &SceneId) -> Result<SceneDocument, SceneFetchError> {
                thread::sleep(Duration::from_secs(60));
                Err(SceneFetchError::WorkerLost)
            }
        }

        let mut service = SceneService::new(Arc::new(NeverFetch));
        assert!(service.request(SceneId("one".to_string())));
        assert!(!service.request(SceneId("two".to_string())));
        assert_eq!(service.pending_scene().map(SceneId::as_str), Some("one"));
    }

    #[test]
    fn rejected_fetch_surfaces_as_error_result() {
        let mut service = SceneService::new(Arc::new(StaticFetch {
            body: r#"{
                "success": false, "scene": "cave",
                "world_width": 0.0, "world_height": 0.0,
                "start_x": 0.0, "start_y": 0.0,
                "background": 0, "items": []
            }"#
            .to_string(),
        }));
        service.request(SceneId("cave".to_string()));

        let (_, result) = poll_until(&mut service);
        assert!(matches!(result, Err(SceneFetchError::Rejected { .. })));
    }
}
