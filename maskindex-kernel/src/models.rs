use serde::{Deserialize, Serialize};

/// Valeur `rec_mask` émise par fetch_track : 1 = masque porté, 0 = non porté, le reste = inconnu
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaskState {
    Worn,
    NotWorn,
    Unknown,
}

impl MaskState {
    pub fn from_rec_mask(value: Option<&serde_json::Value>) -> Self {
        match value.and_then(|v| v.as_i64()) {
            Some(1) => MaskState::Worn,
            Some(0) => MaskState::NotWorn,
            _ => MaskState::Unknown,
        }
    }
}

/// Une ligne de sortie de fetch_track (un visage détecté)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetectionRecord {
    pub camera_id: i64,
    pub mask_state: MaskState,
}

impl DetectionRecord {
    /// Parse une ligne JSON. `None` si la ligne est illisible ou sans `camera_id` entier.
    pub fn parse_line(line: &str) -> Option<Self> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return None;
        }
        let value: serde_json::Value = serde_json::from_str(trimmed).ok()?;
        let object = value.as_object()?;
        let camera_id = object.get("camera_id")?.as_i64()?;
        Some(Self {
            camera_id,
            mask_state: MaskState::from_rec_mask(object.get("rec_mask")),
        })
    }
}

/// Compteurs d'une caméra pour un cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraAggregate {
    pub camera_id: i64,
    pub total_faces: u64,
    pub masked_faces: u64,
    pub mask_ratio: u8,
}

impl CameraAggregate {
    pub fn new(camera_id: i64) -> Self {
        Self { camera_id, total_faces: 0, masked_faces: 0, mask_ratio: 0 }
    }

    pub fn record(&mut self, state: MaskState) {
        self.total_faces += 1;
        if state == MaskState::Worn {
            self.masked_faces += 1;
        }
    }

    pub fn compute_ratio(&mut self) {
        self.mask_ratio = mask_ratio(self.masked_faces, self.total_faces);
    }
}

/// Pourcentage arrondi au demi supérieur, en arithmétique entière exacte.
/// round_half_up(m * 100 / t) == floor((200 * m + t) / (2 * t))
pub fn mask_ratio(masked_faces: u64, total_faces: u64) -> u8 {
    if total_faces == 0 {
        return 0;
    }
    let masked = masked_faces.min(total_faces) as u128;
    let total = total_faces as u128;
    ((200 * masked + total) / (2 * total)) as u8
}

/// Entrée publiée dans `center_mask`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankedEntry {
    /// Identifiant caméra
    pub id: i64,
    /// Taux de port du masque 0..=100
    pub value: u8,
}

impl From<&CameraAggregate> for RankedEntry {
    fn from(aggregate: &CameraAggregate) -> Self {
        Self { id: aggregate.camera_id, value: aggregate.mask_ratio }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_ratio_half_up() {
        assert_eq!(mask_ratio(1, 3), 33);
        assert_eq!(mask_ratio(2, 3), 67);
        assert_eq!(mask_ratio(1, 2), 50);
        assert_eq!(mask_ratio(1, 8), 13); // 12.5 -> 13
        assert_eq!(mask_ratio(0, 5), 0);
        assert_eq!(mask_ratio(5, 5), 100);
    }

    #[test]
    fn test_mask_ratio_bounds() {
        for total in 1..=40u64 {
            for masked in 0..=total {
                assert!(mask_ratio(masked, total) <= 100);
            }
        }
        assert_eq!(mask_ratio(0, 0), 0);
    }

    #[test]
    fn test_parse_line() {
        let rec = DetectionRecord::parse_line(r#"{"camera_id": 7, "rec_mask": 1}"#).unwrap();
        assert_eq!(rec.camera_id, 7);
        assert_eq!(rec.mask_state, MaskState::Worn);

        let rec = DetectionRecord::parse_line(r#"{"camera_id": 7, "rec_mask": 0, "x": "y"}"#).unwrap();
        assert_eq!(rec.mask_state, MaskState::NotWorn);

        let rec = DetectionRecord::parse_line(r#"{"camera_id": 7, "rec_mask": -1}"#).unwrap();
        assert_eq!(rec.mask_state, MaskState::Unknown);

        let rec = DetectionRecord::parse_line(r#"{"camera_id": 7}"#).unwrap();
        assert_eq!(rec.mask_state, MaskState::Unknown);
    }

    #[test]
    fn test_parse_line_rejects_malformed() {
        assert!(DetectionRecord::parse_line("").is_none());
        assert!(DetectionRecord::parse_line("not json").is_none());
        assert!(DetectionRecord::parse_line(r#"{"rec_mask": 1}"#).is_none());
        assert!(DetectionRecord::parse_line(r#"{"camera_id": "7", "rec_mask": 1}"#).is_none());
        assert!(DetectionRecord::parse_line("[1, 2]").is_none());
    }

    #[test]
    fn test_aggregate_counts() {
        let mut agg = CameraAggregate::new(1);
        agg.record(MaskState::Worn);
        agg.record(MaskState::Worn);
        agg.record(MaskState::NotWorn);
        agg.record(MaskState::Unknown);
        agg.compute_ratio();
        assert_eq!(agg.total_faces, 4);
        assert_eq!(agg.masked_faces, 2);
        assert_eq!(agg.mask_ratio, 50);
        assert_eq!(RankedEntry::from(&agg), RankedEntry { id: 1, value: 50 });
    }

    #[test]
    fn test_ranked_entry_wire_format() {
        let json = serde_json::to_string(&RankedEntry { id: 2, value: 0 }).unwrap();
        assert_eq!(json, r#"{"id":2,"value":0}"#);
    }
}
