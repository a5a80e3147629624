//! Screen marker sheet and board construction.
//!
//! A marker sheet lists ArUco markers shown around the stimulus, one row per
//! marker: `aruco_id,pos_x_cm,pos_y_cm,size_cm`. Positions are marker
//! centers and `size_cm` is the full image size including the white border.
//! The device expects the bottom-left corner of the black code area, so the
//! code size and corner are derived once on load.

use mindlink_common::tracker::client::TrackerError;
use mindlink_common::tracker::types::{ArucoDictionary, BoardMarker, ScreenBoard};
use serde::Deserialize;
use std::path::Path;
use tracing::{info, warn};

/// Dictionary used for every marker sheet.
pub const MARKER_DICTIONARY: ArucoDictionary = ArucoDictionary::Dict5x5_50;

#[derive(Debug, Deserialize)]
struct MarkerRow {
    aruco_id: u32,
    pos_x_cm: f64,
    pos_y_cm: f64,
    size_cm: f64,
}

/// One marker with its derived placement fields, centimeters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarkerDefinition {
    /// ArUco id.
    pub aruco_id: u32,
    /// Center X.
    pub pos_x_cm: f64,
    /// Center Y.
    pub pos_y_cm: f64,
    /// Image size including the border.
    pub size_image_cm: f64,
    /// Size of the black code area.
    pub size_cm: f64,
    /// Code area bottom-left corner X.
    pub corner_x_cm: f64,
    /// Code area bottom-left corner Y.
    pub corner_y_cm: f64,
}

impl MarkerDefinition {
    /// Build a definition from a sheet row.
    pub fn new(aruco_id: u32, pos_x_cm: f64, pos_y_cm: f64, size_image_cm: f64) -> Self {
        let n = f64::from(MARKER_DICTIONARY.bits());
        let size_cm = (2.0 + n) * size_image_cm / (n + 4.0);
        Self {
            aruco_id,
            pos_x_cm,
            pos_y_cm,
            size_image_cm,
            size_cm,
            corner_x_cm: pos_x_cm - size_cm / 2.0,
            corner_y_cm: pos_y_cm - size_cm / 2.0,
        }
    }
}

/// Marker sizes in pixels for rendering on a window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarkerPlacement {
    /// ArUco id.
    pub aruco_id: u32,
    /// Center X, centimeters.
    pub pos_x_cm: f64,
    /// Center Y, centimeters.
    pub pos_y_cm: f64,
    /// Code area size, centimeters.
    pub size_cm: f64,
    /// Code area size, pixels.
    pub code_size_px: u32,
    /// Full image size with border, pixels.
    pub image_size_px: u32,
}

/// Ordered marker definitions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MarkerSheet {
    markers: Vec<MarkerDefinition>,
}

impl MarkerSheet {
    /// Wrap already derived definitions.
    pub fn from_definitions(markers: Vec<MarkerDefinition>) -> Self {
        Self { markers }
    }

    /// Parse a CSV sheet from any reader.
    ///
    /// # Errors
    /// Returns `TrackerError::MarkerSheet` on malformed rows.
    pub fn from_reader<R: std::io::Read>(reader: R) -> Result<Self, TrackerError> {
        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);
        let mut markers = Vec::new();
        for (line, row) in rdr.deserialize::<MarkerRow>().enumerate() {
            let row = row.map_err(|e| TrackerError::MarkerSheet(format!("row {}: {e}", line + 1)))?;
            if !(row.size_cm > 0.0) {
                return Err(TrackerError::MarkerSheet(format!(
                    "row {}: size_cm must be greater than 0",
                    line + 1
                )));
            }
            markers.push(MarkerDefinition::new(
                row.aruco_id,
                row.pos_x_cm,
                row.pos_y_cm,
                row.size_cm,
            ));
        }
        Ok(Self { markers })
    }

    /// Load a CSV sheet from `path`.
    ///
    /// # Errors
    /// Returns `TrackerError::MarkerSheet` if the file cannot be opened or
    /// parsed.
    pub fn load(path: &Path) -> Result<Self, TrackerError> {
        let file = std::fs::File::open(path)
            .map_err(|e| TrackerError::MarkerSheet(format!("{}: {e}", path.display())))?;
        Self::from_reader(file)
    }

    /// Load a sheet, degrading to an empty one when it is missing or
    /// unreadable.
    pub fn load_or_empty(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            warn!("No marker sheet configured, screen tracking is unavailable");
            return Self::default();
        };
        match Self::load(path) {
            Ok(sheet) if sheet.is_empty() => {
                warn!("Marker sheet {} is empty", path.display());
                sheet
            }
            Ok(sheet) => {
                info!("Loaded {} markers from {}", sheet.len(), path.display());
                sheet
            }
            Err(e) => {
                warn!("{e}; screen tracking is unavailable");
                Self::default()
            }
        }
    }

    /// Whether the sheet has no markers.
    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }

    /// Number of markers.
    pub fn len(&self) -> usize {
        self.markers.len()
    }

    /// Marker definitions in sheet order.
    pub fn markers(&self) -> &[MarkerDefinition] {
        &self.markers
    }

    /// Board for a screen of `(width, height)` meters.
    pub fn screen_board(&self, screen_size_m: (f64, f64)) -> ScreenBoard {
        ScreenBoard {
            width_m: screen_size_m.0,
            height_m: screen_size_m.1,
            dictionary: MARKER_DICTIONARY,
            markers: self
                .markers
                .iter()
                .map(|m| BoardMarker {
                    id: m.aruco_id,
                    x_m: m.corner_x_cm * 1e-2,
                    y_m: m.corner_y_cm * 1e-2,
                    size_m: m.size_cm * 1e-2,
                })
                .collect(),
        }
    }

    /// Pixel sizes of every marker on a window `win_width_px` wide showing a
    /// display `physical_width_mm` wide.
    pub fn placements(&self, win_width_px: u32, physical_width_mm: f64) -> Vec<MarkerPlacement> {
        let px_per_cm = f64::from(win_width_px) / (physical_width_mm * 1e-1);
        let border_div = MARKER_DICTIONARY.bits() + 2;
        self.markers
            .iter()
            .map(|m| {
                let code_size_px = (m.size_cm * px_per_cm) as u32;
                let border_px = code_size_px / border_div;
                MarkerPlacement {
                    aruco_id: m.aruco_id,
                    pos_x_cm: m.pos_x_cm,
                    pos_y_cm: m.pos_y_cm,
                    size_cm: m.size_cm,
                    code_size_px,
                    image_size_px: code_size_px + 2 * border_px,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const EPS: f64 = 1e-9;

    #[test]
    fn derived_size_and_corner() {
        // 5x5 dictionary: code area is 7/9 of the image.
        let m = MarkerDefinition::new(3, 10.0, 20.0, 9.0);
        assert!((m.size_cm - 7.0).abs() < EPS);
        assert!((m.corner_x_cm - 6.5).abs() < EPS);
        assert!((m.corner_y_cm - 16.5).abs() < EPS);
    }

    #[test]
    fn parse_csv() {
        let data = "aruco_id,pos_x_cm,pos_y_cm,size_cm\n0, 4.5, 4.5, 9\n1,48.2,4.5,9\n";
        let sheet = MarkerSheet::from_reader(data.as_bytes()).unwrap();
        assert_eq!(sheet.len(), 2);
        assert_eq!(sheet.markers()[1].aruco_id, 1);
        assert!((sheet.markers()[1].pos_x_cm - 48.2).abs() < EPS);
    }

    #[test]
    fn header_only_is_empty() {
        let sheet = MarkerSheet::from_reader("aruco_id,pos_x_cm,pos_y_cm,size_cm\n".as_bytes())
            .unwrap();
        assert!(sheet.is_empty());
    }

    #[test]
    fn malformed_row_is_error() {
        let data = "aruco_id,pos_x_cm,pos_y_cm,size_cm\nzero,1,1,1\n";
        let result = MarkerSheet::from_reader(data.as_bytes());
        assert!(matches!(result, Err(TrackerError::MarkerSheet(_))));
    }

    #[test]
    fn missing_file_degrades_to_empty() {
        let sheet = MarkerSheet::load_or_empty(Some(Path::new("/nonexistent/aruco_info.csv")));
        assert!(sheet.is_empty());
        assert!(MarkerSheet::load_or_empty(None).is_empty());
    }

    #[test]
    fn load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "aruco_id,pos_x_cm,pos_y_cm,size_cm").unwrap();
        writeln!(file, "7,2.0,3.0,4.5").unwrap();
        file.flush().unwrap();

        let sheet = MarkerSheet::load_or_empty(Some(file.path()));
        assert_eq!(sheet.len(), 1);
    }

    #[test]
    fn board_in_meters() {
        let sheet = MarkerSheet::from_definitions(vec![MarkerDefinition::new(3, 10.0, 20.0, 9.0)]);
        let board = sheet.screen_board((0.527, 0.296));
        assert_eq!(board.dictionary, ArucoDictionary::Dict5x5_50);
        assert_eq!(board.markers.len(), 1);
        let marker = board.markers[0];
        assert_eq!(marker.id, 3);
        assert!((marker.x_m - 0.065).abs() < EPS);
        assert!((marker.y_m - 0.165).abs() < EPS);
        assert!((marker.size_m - 0.07).abs() < EPS);
    }

    #[test]
    fn pixel_placements() {
        let sheet = MarkerSheet::from_definitions(vec![MarkerDefinition::new(0, 5.0, 5.0, 9.0)]);
        // 1000 px over 50 cm: 20 px/cm, 7 cm code area.
        let placements = sheet.placements(1000, 500.0);
        assert_eq!(placements[0].code_size_px, 140);
        assert_eq!(placements[0].image_size_px, 140 + 2 * 20);
    }
}
