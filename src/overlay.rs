use serde::{Deserialize, Serialize};

/// Face rectangle as percentages of the submitted frame, ready to position an
/// overlay on the (mirrored) preview.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionBox {
    pub top_pct: f64,
    pub left_pct: f64,
    pub width_pct: f64,
    pub height_pct: f64,
}

/// Maps a service box `[top, right, bottom, left]` (pixels of the submitted
/// frame) to percentages.
///
/// The submitted frame was already mirrored, so this is pure scaling. Edges are
/// clamped into the frame first, which keeps every field within `[0, 100]`.
/// Returns `None` for an empty frame or non-finite coordinates.
pub fn map_detection_box(face_box: [f64; 4], frame_width: u32, frame_height: u32) -> Option<DetectionBox> {
    if frame_width == 0 || frame_height == 0 || face_box.iter().any(|v| !v.is_finite()) {
        return None;
    }

    let width = frame_width as f64;
    let height = frame_height as f64;
    let [top, right, bottom, left] = face_box;

    let (top, bottom) = ordered(top.clamp(0.0, height), bottom.clamp(0.0, height));
    let (left, right) = ordered(left.clamp(0.0, width), right.clamp(0.0, width));

    Some(DetectionBox {
        top_pct: top / height * 100.0,
        left_pct: left / width * 100.0,
        width_pct: (right - left) / width * 100.0,
        height_pct: (bottom - top) / height * 100.0,
    })
}

fn ordered(a: f64, b: f64) -> (f64, f64) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 0.05
    }

    #[test]
    fn maps_service_box_to_percentages() {
        let mapped = map_detection_box([50.0, 300.0, 250.0, 100.0], 500, 300).unwrap();
        assert!(approx(mapped.top_pct, 16.7));
        assert!(approx(mapped.left_pct, 20.0));
        assert!(approx(mapped.width_pct, 40.0));
        assert!(approx(mapped.height_pct, 66.7));
    }

    #[test]
    fn full_frame_box_is_whole_overlay() {
        let mapped = map_detection_box([0.0, 500.0, 375.0, 0.0], 500, 375).unwrap();
        assert_eq!(
            mapped,
            DetectionBox {
                top_pct: 0.0,
                left_pct: 0.0,
                width_pct: 100.0,
                height_pct: 100.0,
            }
        );
    }

    #[test]
    fn out_of_frame_edges_stay_in_range() {
        let boxes = [
            [-20.0, 520.0, 310.0, -5.0],
            [250.0, 100.0, 50.0, 300.0],
            [0.0, 0.0, 0.0, 0.0],
            [299.0, 499.0, 900.0, 498.0],
        ];
        for face_box in boxes {
            let mapped = map_detection_box(face_box, 500, 300).unwrap();
            for value in [mapped.top_pct, mapped.left_pct, mapped.width_pct, mapped.height_pct] {
                assert!((0.0..=100.0).contains(&value), "{face_box:?} -> {mapped:?}");
            }
            assert!(mapped.left_pct + mapped.width_pct <= 100.0 + 1e-9);
            assert!(mapped.top_pct + mapped.height_pct <= 100.0 + 1e-9);
        }
    }

    #[test]
    fn degenerate_input_has_no_box() {
        assert_eq!(map_detection_box([1.0, 2.0, 3.0, 4.0], 0, 300), None);
        assert_eq!(map_detection_box([f64::NAN, 2.0, 3.0, 4.0], 500, 300), None);
    }
}
