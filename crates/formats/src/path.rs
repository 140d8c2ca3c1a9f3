use serde::{Deserialize, Serialize};

/// A JSON scalar that may arrive as a number or as a decimal string.
///
/// Deep-zoom coordinates exceed f64; paths keep them as strings and the
/// untagged form preserves every digit through deserialization.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum NumOrText {
    Num(f64),
    Text(String),
}

impl NumOrText {
    /// Decimal-string form, exact for `Text`, shortest round-trip for `Num`.
    pub fn as_decimal_string(&self) -> String {
        match self {
            NumOrText::Num(v) => format!("{v}"),
            NumOrText::Text(s) => s.clone(),
        }
    }
}

/// Standalone `paths.json` payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PathFile {
    pub path: PathSpec,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct PathSpec {
    pub keyframes: Vec<KeyframeSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct KeyframeSpec {
    pub camera: CameraSpec,
}

/// Keyframe camera as authored.
///
/// Several legacy spellings are accepted: `globalLevel` or `level` +
/// `zoomOffset`; `x`/`y` or `globalX`/`globalY`; or a `macro` form carrying
/// fractal-plane `re`/`im`. Resolution to the canonical camera lives in the
/// `camera` crate.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct CameraSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub global_level: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zoom_offset: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<NumOrText>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<NumOrText>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub global_x: Option<NumOrText>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub global_y: Option<NumOrText>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotation: Option<f64>,
    #[serde(default, rename = "macro", skip_serializing_if = "Option::is_none")]
    pub macro_kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub re: Option<NumOrText>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub im: Option<NumOrText>,
}

#[cfg(test)]
mod tests {
    use super::{NumOrText, PathFile};

    #[test]
    fn parses_mixed_keyframe_spellings() {
        let raw = r#"{
            "path": { "keyframes": [
                {"camera": {"globalLevel": 0.0, "x": 0.5, "y": 0.5}},
                {"camera": {"level": 10, "zoomOffset": 0.25, "globalX": "0.52", "globalY": "0.52"}},
                {"camera": {"macro": "mb", "globalLevel": 50.0, "re": "-0.7453", "im": "0.1127"}}
            ]}
        }"#;
        let file: PathFile = serde_json::from_str(raw).unwrap();
        let kfs = &file.path.keyframes;
        assert_eq!(kfs.len(), 3);
        assert_eq!(kfs[0].camera.global_level, Some(0.0));
        assert_eq!(kfs[1].camera.level, Some(10.0));
        assert_eq!(
            kfs[1].camera.global_x,
            Some(NumOrText::Text("0.52".to_string()))
        );
        assert_eq!(kfs[2].camera.macro_kind.as_deref(), Some("mb"));
    }

    #[test]
    fn string_coordinates_keep_digits() {
        let deep = "0.50000000000000000000000000000000000000000000000001";
        let raw = format!(r#"{{"path":{{"keyframes":[{{"camera":{{"globalLevel":160,"x":"{deep}","y":"0.5"}}}}]}}}}"#);
        let file: PathFile = serde_json::from_str(&raw).unwrap();
        let x = file.path.keyframes[0].camera.x.as_ref().unwrap();
        assert_eq!(x.as_decimal_string(), deep);
    }

    #[test]
    fn numeric_scalar_formats_plainly() {
        assert_eq!(NumOrText::Num(0.5).as_decimal_string(), "0.5");
        assert_eq!(NumOrText::Num(3.0).as_decimal_string(), "3");
    }
}
