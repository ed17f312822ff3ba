/*!
Construction de lignes de détection au format fetch_track

Une ligne = un objet JSON avec au minimum `camera_id` et, optionnellement,
`rec_mask` (1 = masque, 0 = sans masque, autre = inconnu).
*/

use serde_json::{Map, Value};

#[derive(Debug, Clone)]
pub struct DetectionLineBuilder {
    payload: Map<String, Value>,
}

impl DetectionLineBuilder {
    pub fn new(camera_id: i64) -> Self {
        let mut payload = Map::new();
        payload.insert("camera_id".to_string(), Value::from(camera_id));
        Self { payload }
    }

    /// Ligne sans `camera_id` (toujours ignorée par le scanner)
    pub fn anonymous() -> Self {
        Self { payload: Map::new() }
    }

    pub fn rec_mask(mut self, value: i64) -> Self {
        self.payload.insert("rec_mask".to_string(), Value::from(value));
        self
    }

    /// Champ libre, ex: `track_id`, `timestamp`
    pub fn field(mut self, key: &str, value: Value) -> Self {
        self.payload.insert(key.to_string(), value);
        self
    }

    pub fn build(&self) -> String {
        Value::Object(self.payload.clone()).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_contains_fields() {
        let line = DetectionLineBuilder::new(12).rec_mask(1).field("track_id", Value::from("t-1")).build();
        let parsed: Value = serde_json::from_str(&line).unwrap();
        assert_eq!(parsed["camera_id"], 12);
        assert_eq!(parsed["rec_mask"], 1);
        assert_eq!(parsed["track_id"], "t-1");
        assert!(!line.contains('\n'));
    }

    #[test]
    fn test_anonymous_line() {
        let parsed: Value = serde_json::from_str(&DetectionLineBuilder::anonymous().rec_mask(0).build()).unwrap();
        assert!(parsed.get("camera_id").is_none());
    }
}
