//! Composition snapshot as reported by the authoring host.
//!
//! Field names follow the host's JSON (`inPoint`, `frameRate`, ...) so the
//! same types read host query replies and interchange files.

use serde::{Deserialize, Deserializer, Serialize};

/// One layer as the host sees it. Identity is `index` (1-based, host-assigned).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerRecord {
    pub index: u32,
    pub name: String,
    pub in_point: f64,
    pub out_point: f64,
    pub duration: f64,
    #[serde(deserialize_with = "deserialize_rgb")]
    pub color: [u8; 3],
    #[serde(default)]
    pub shy: bool,
    #[serde(default = "default_true")]
    pub visible: bool,
    #[serde(default)]
    pub audio_active: bool,
}

fn default_true() -> bool {
    true
}

/// Label colours come in as floats (sometimes 256.0); clamp into 8-bit.
fn deserialize_rgb<'de, D>(deserializer: D) -> Result<[u8; 3], D::Error>
where
    D: Deserializer<'de>,
{
    let raw = <[f64; 3]>::deserialize(deserializer)?;
    Ok(raw.map(|c| if c.is_finite() { c.round().clamp(0.0, 255.0) as u8 } else { 0 }))
}

impl LayerRecord {
    pub fn new(index: u32, name: impl Into<String>, in_point: f64, out_point: f64) -> Self {
        Self {
            index,
            name: name.into(),
            in_point,
            out_point,
            duration: out_point - in_point,
            color: [128, 128, 128],
            shy: false,
            visible: true,
            audio_active: false,
        }
    }

    /// Set both edges, keeping `duration` consistent.
    pub fn set_span(&mut self, in_point: f64, out_point: f64) {
        self.in_point = in_point;
        self.out_point = out_point;
        self.duration = out_point - in_point;
    }
}

/// Active composition snapshot.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Composition {
    #[serde(default)]
    pub name: String,
    /// Seconds. Zero means "no composition loaded".
    pub duration: f64,
    #[serde(default)]
    pub frame_rate: f64,
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
    pub layers: Vec<LayerRecord>,
}

impl Default for Composition {
    fn default() -> Self {
        Self {
            name: String::new(),
            duration: 0.0,
            frame_rate: 0.0,
            width: 0,
            height: 0,
            layers: Vec::new(),
        }
    }
}

impl Composition {
    pub fn new(name: impl Into<String>, duration: f64, frame_rate: f64) -> Self {
        Self {
            name: name.into(),
            duration,
            frame_rate,
            width: 1920,
            height: 1080,
            layers: Vec::new(),
        }
    }

    pub fn layer(&self, index: u32) -> Option<&LayerRecord> {
        self.layers.iter().find(|l| l.index == index)
    }

    pub fn layer_mut(&mut self, index: u32) -> Option<&mut LayerRecord> {
        self.layers.iter_mut().find(|l| l.index == index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_host_reply() {
        let json = r#"{
            "name": "Main",
            "duration": 48,
            "frameRate": 25,
            "width": 1920,
            "height": 1080,
            "layers": [
                {"index": 1, "name": "Kick", "inPoint": 12, "outPoint": 35, "duration": 23,
                 "color": [255.9, 123.2, 0], "shy": false, "visible": true, "audioActive": true}
            ]
        }"#;
        let comp: Composition = serde_json::from_str(json).unwrap();
        assert_eq!(comp.duration, 48.0);
        assert_eq!(comp.frame_rate, 25.0);
        let layer = comp.layer(1).unwrap();
        assert_eq!(layer.color, [255, 123, 0]);
        assert!(layer.audio_active);
    }

    #[test]
    fn test_older_host_fields_default() {
        // Older host scripts omit shy/visible/audioActive
        let json = r#"{"index": 2, "name": "Bg", "inPoint": 0, "outPoint": 4,
                       "duration": 4, "color": [256, 12.4, -3]}"#;
        let layer: LayerRecord = serde_json::from_str(json).unwrap();
        assert_eq!(layer.color, [255, 12, 0]);
        assert!(!layer.shy);
        assert!(layer.visible);
        assert!(!layer.audio_active);
    }

    #[test]
    fn test_serializes_host_keys() {
        let mut comp = Composition::new("Out", 10.0, 30.0);
        comp.layers.push(LayerRecord::new(1, "A", 1.0, 2.5));
        let value = serde_json::to_value(&comp).unwrap();
        assert_eq!(value["frameRate"], 30.0);
        assert_eq!(value["layers"][0]["inPoint"], 1.0);
        assert_eq!(value["layers"][0]["duration"], 1.5);
        assert_eq!(value["layers"][0]["audioActive"], false);
    }
}
