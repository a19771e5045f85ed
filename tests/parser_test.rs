//! Control listing parser tests
//!
//! Listings below are trimmed copies of real `v4l2-ctl -l` output.

use proptest::prelude::*;
use usbcam::controls::{extract_sections, parse, ControlKind};

const FULL_LISTING: &str = "
User Controls

                     brightness 0x00980900 (int)    : min=-64 max=64 step=1 default=0 value=10
                       contrast 0x00980901 (int)    : min=0 max=95 step=1 default=32 value=32
 white_balance_temperature_auto 0x0098090c (bool)   : default=1 value=1
           power_line_frequency 0x00980918 (menu)   : min=0 max=2 default=1 value=1
				0: Disabled
				1: 50 Hz
				2: 60 Hz

Codec Controls

             video_bitrate_mode 0x009909ce (menu)   : min=0 max=1 default=0 value=0
                  video_bitrate 0x009909cf (int)    : min=25000 max=25000000 step=25000 default=10000000 value=10000000

Camera Controls

                  exposure_auto 0x009a0901 (menu)   : min=0 max=3 default=3 value=3
              exposure_absolute 0x009a0902 (int)    : min=1 max=5000 step=1 default=157 value=157 flags=inactive

JPEG Compression Controls

            compression_quality 0x009d0903 (int)    : min=1 max=100 step=1 default=30 value=30
";

#[cfg(test)]
mod parser_tests {
    use super::*;

    fn names(raw: &str) -> Vec<String> {
        parse(raw).into_iter().map(|c| c.name).collect()
    }

    #[test]
    fn test_user_and_camera_sections_kept() {
        assert_eq!(
            names(FULL_LISTING),
            vec![
                "brightness",
                "contrast",
                "white_balance_temperature_auto",
                "power_line_frequency",
                "exposure_auto",
                "exposure_absolute",
            ]
        );
    }

    #[test]
    fn test_codec_and_jpeg_sections_dropped() {
        let sections = extract_sections(FULL_LISTING);
        assert!(!sections.contains("video_bitrate"));
        assert!(!sections.contains("compression_quality"));
        assert!(sections.contains("exposure_absolute"));
    }

    #[test]
    fn test_user_section_runs_to_end_without_codec_marker() {
        let raw = "User Controls\n\
            brightness 0x00980900 (int) : min=0 max=255 default=128 value=128\n\
            gain 0x00980913 (int) : min=0 max=100 default=0 value=4\n";
        assert_eq!(names(raw), vec!["brightness", "gain"]);
    }

    #[test]
    fn test_camera_section_needs_jpeg_marker() {
        let raw = "User Controls\n\
            brightness 0x00980900 (int) : min=0 max=255 default=128 value=128\n\
            Codec Controls\n\
            Camera Controls\n\
            zoom_absolute 0x009a090d (int) : min=100 max=500 default=100 value=100\n";
        assert_eq!(names(raw), vec!["brightness"]);
    }

    #[test]
    fn test_descriptor_fields() {
        let controls = parse(FULL_LISTING);
        let exposure = controls
            .iter()
            .find(|c| c.name == "exposure_absolute")
            .unwrap();
        assert_eq!(exposure.hex_id, "0x009a0902");
        assert_eq!(exposure.kind, ControlKind::Integer);
        assert_eq!((exposure.min, exposure.max), (Some(1), Some(5000)));
        assert_eq!(exposure.default, Some(157));
        assert_eq!(exposure.current, Some(157));
        assert!(exposure.is_inactive());

        let wb = controls
            .iter()
            .find(|c| c.name == "white_balance_temperature_auto")
            .unwrap();
        assert_eq!(wb.kind, ControlKind::Boolean);
        assert_eq!((wb.min, wb.max, wb.step), (None, None, None));
        assert_eq!(wb.effective_step(), 1);

        let plf = controls
            .iter()
            .find(|c| c.name == "power_line_frequency")
            .unwrap();
        assert_eq!(plf.kind, ControlKind::Menu);
    }

    #[test]
    fn test_current_is_reported_value_not_default() {
        let controls = parse(FULL_LISTING);
        let brightness = &controls[0];
        assert_eq!(brightness.default, Some(0));
        assert_eq!(brightness.current, Some(10));
    }

    #[test]
    fn test_menu_entries_and_short_lines_ignored() {
        let raw = "User Controls\n  0: Disabled\n  lonely 0x1\n  a b c\n";
        assert!(parse(raw).is_empty());
    }

    #[test]
    fn test_empty_input() {
        assert!(parse("").is_empty());
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Parsing the same text twice gives the same result.
    #[test]
    fn parse_is_idempotent(
        lines in prop::collection::vec(
            ("[a-z_]{1,12}", 0u32..0xFFFF, -100i64..100, 0i64..200, -100i64..300),
            0..12,
        )
    ) {
        let mut raw = String::from("User Controls\n");
        for (name, id, min, span, value) in &lines {
            raw.push_str(&format!(
                "{name} 0x{id:08x} (int) : min={min} max={} step=1 default={min} value={value}\n",
                min + span
            ));
        }
        prop_assert_eq!(parse(&raw), parse(&raw));
    }

    /// Arbitrary text never panics the parser.
    #[test]
    fn parse_never_panics(raw in "\\PC{0,400}") {
        let _ = parse(&raw);
    }
}
