//! Parsers for the capability tool's listings.

use crate::fourcc::FourCc;

/// Pixel formats from `--list-formats`, e.g. `[0]: 'YUYV' (YUYV 4:2:2)`.
/// First-seen order, duplicates suppressed.
pub fn parse_pixel_formats(text: &str) -> Vec<FourCc> {
    let mut formats = Vec::new();
    for line in text.lines() {
        let mut rest = line;
        while let Some(open) = rest.find('\'') {
            let after = &rest[open + 1..];
            let preceded_by_space = rest[..open].ends_with(char::is_whitespace);
            let Some(close) = after.find('\'') else {
                break;
            };
            if preceded_by_space {
                if let Ok(fourcc) = after[..close].parse::<FourCc>() {
                    if !formats.contains(&fourcc) {
                        formats.push(fourcc);
                    }
                }
            }
            rest = &after[close + 1..];
        }
    }
    formats
}

fn parse_size(token: &str) -> Option<(u32, u32)> {
    let token = token.trim_matches(|c: char| !c.is_ascii_digit());
    let (w, h) = token.split_once('x')?;
    Some((w.parse().ok()?, h.parse().ok()?))
}

/// Every `<W>x<H>` token of `--list-framesizes`.
pub fn parse_frame_sizes(text: &str) -> Vec<(u32, u32)> {
    text.split_whitespace().filter_map(parse_size).collect()
}

/// Every `<rate> fps` of `--list-frameintervals`, e.g.
/// `Interval: Discrete 0.033s (30.000 fps)`.
pub fn parse_frame_rates(text: &str) -> Vec<f64> {
    let tokens: Vec<&str> = text.split_whitespace().collect();
    tokens
        .windows(2)
        .filter(|pair| pair[1].trim_end_matches(')') == "fps")
        .filter_map(|pair| pair[0].trim_start_matches('(').parse::<f64>().ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const FORMATS: &str = "ioctl: VIDIOC_ENUM_FMT\n\
        \tType: Video Capture\n\n\
        \t[0]: 'YUYV' (YUYV 4:2:2)\n\
        \t[1]: 'MJPG' (Motion-JPEG, compressed)\n\
        \t[2]: 'YUYV' (YUYV 4:2:2)\n";

    #[test]
    fn test_pixel_formats() {
        assert_eq!(
            parse_pixel_formats(FORMATS),
            vec![FourCc::YUYV, FourCc::MJPG]
        );
    }

    #[test]
    fn test_frame_sizes() {
        let text = "\tSize: Discrete 640x480\n\tSize: Discrete 1280x720\n";
        assert_eq!(parse_frame_sizes(text), vec![(640, 480), (1280, 720)]);
    }

    #[test]
    fn test_frame_rates() {
        let text = "ioctl: VIDIOC_ENUM_FRAMEINTERVALS\n\
            \tInterval: Discrete 0.033s (30.000 fps)\n\
            \tInterval: Discrete 0.067s (15.000 fps)\n";
        assert_eq!(parse_frame_rates(text), vec![30.0, 15.0]);
    }
}
