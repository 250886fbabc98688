use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::geometry::Container;
use crate::overlay::Overlay;
use crate::session::EditorSession;

/// Everything needed to reproduce one export: the editor geometry at the time
/// of saving plus the settled overlays, bottom first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    pub container: Container,
    pub density: f32,
    #[serde(default)]
    pub overlays: Vec<Overlay>,
}

impl Scene {
    pub fn from_session(session: &EditorSession, container: Container, density: f32) -> Self {
        Self {
            container,
            density,
            overlays: session.snapshot(),
        }
    }

    pub fn from_json(value: &str) -> Result<Self> {
        serde_json::from_str(value).with_context(|| "failed to parse scene")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read scene: {}", path.display()))?;
        Self::from_json(&content).with_context(|| format!("invalid scene: {}", path.display()))
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).with_context(|| "failed to serialize scene")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overlay::{OverlayKind, StickerSource, TextColor};

    #[test]
    fn parses_a_mixed_scene() {
        let scene = Scene::from_json(
            r##"{
                "container": {"width": 1080, "height": 1584},
                "density": 2.75,
                "overlays": [
                    {"id": 1, "kind": {"type": "text", "content": "when it compiles", "color": "#ffff00"},
                     "position": {"x": 24, "y": 40}, "scale": 1.4, "rotation": -8},
                    {"id": 2, "kind": {"type": "sticker", "source": {"resource": "sticker_panda"}}}
                ]
            }"##,
        )
        .expect("scene");
        assert_eq!(scene.container, Container::new(1080.0, 1584.0));
        assert_eq!(scene.overlays.len(), 2);
        assert_eq!(
            scene.overlays[0].kind,
            OverlayKind::Text {
                content: "when it compiles".to_string(),
                color: Some(TextColor::rgb(255, 255, 0)),
            }
        );
        assert_eq!(scene.overlays[0].rotation, -8.0);
        assert_eq!(
            scene.overlays[1].kind,
            OverlayKind::Sticker {
                source: StickerSource::Resource("sticker_panda".to_string()),
            }
        );
    }

    #[test]
    fn session_round_trips_through_json() {
        let mut session = EditorSession::new();
        session.add_text("top", TextColor::WHITE);
        session.add_sticker(StickerSource::File("/tmp/cat.png".into()));
        let scene = Scene::from_session(&session, Container::new(720.0, 1280.0), 2.0);
        let back = Scene::from_json(&scene.to_json().expect("json")).expect("parse");
        assert_eq!(back, scene);
    }

    #[test]
    fn bad_color_fails_to_parse() {
        let result = Scene::from_json(
            r#"{"container": {"width": 1, "height": 1}, "density": 1,
                "overlays": [{"id": 1, "kind": {"type": "text", "content": "x", "color": "red"}}]}"#,
        );
        assert!(result.is_err());
    }
}
