use crate::constants::{PARALLAX_BASELINE_MM, PARALLAX_FOCAL_MM};
use std::f64::consts::PI;

pub(crate) fn degree_to_radian(degree: f64) -> f64 {
    degree * PI / 180.
}

pub(crate) fn radian_to_degree(radian: f64) -> f64 {
    radian * 180. / PI
}

/// Wraps an angle into `(-PI, PI]`.
pub(crate) fn normalize_angle(radian: f64) -> f64 {
    let two_pi = 2. * PI;
    let positive = ((radian % two_pi) + two_pi) % two_pi;
    if positive > PI {
        positive - two_pi
    } else {
        positive
    }
}

/// Short-range angular correction in radian for a measured range in millimeters.
///
/// Returns 0 for a zero range.
pub(crate) fn parallax_correction(range_mm: f64) -> f64 {
    if range_mm == 0. {
        return 0.;
    }
    f64::atan((PARALLAX_BASELINE_MM * (PARALLAX_FOCAL_MM - range_mm)) / PARALLAX_FOCAL_MM / range_mm)
}

/// Normalizes a Windows port name: `COMx` with `x > 4` needs the `\\.\` prefix.
pub(crate) fn normalize_port_name(port_name: &str) -> String {
    let bytes = port_name.as_bytes();
    if bytes.len() >= 3 && bytes[0..3].eq_ignore_ascii_case(b"com") {
        let needs_prefix = match bytes.get(3) {
            Some(digit) => bytes.len() > 4 || *digit > b'4',
            None => false,
        };
        if needs_prefix {
            return format!("\\\\.\\{}", port_name);
        }
    }
    port_name.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_angle() {
        assert!((normalize_angle(2. * PI - PI / 2.) - (-PI / 2.)).abs() < 1e-12);
        assert!((normalize_angle(PI) - PI).abs() < 1e-12);
        assert!((normalize_angle(-PI) - PI).abs() < 1e-12);
        assert!((normalize_angle(3. * PI / 2.) - (-PI / 2.)).abs() < 1e-12);
        assert!(normalize_angle(0.).abs() < 1e-12);
    }

    #[test]
    fn test_parallax_correction() {
        assert_eq!(parallax_correction(0.), 0.);
        assert_eq!(parallax_correction(155.3), 0.);
        let c = parallax_correction(1000.);
        let expected = f64::atan((21.8 * (155.3 - 1000.)) / 155.3 / 1000.);
        assert_eq!(c, expected);
        assert!(c < 0.);
    }

    #[test]
    fn test_degree_radian() {
        assert_eq!(degree_to_radian(180.), PI);
        assert!((radian_to_degree(PI / 2.) - 90.).abs() < 1e-12);
    }

    #[test]
    fn test_normalize_port_name() {
        assert_eq!(normalize_port_name("COM3"), "COM3");
        assert_eq!(normalize_port_name("COM4"), "COM4");
        assert_eq!(normalize_port_name("COM5"), "\\\\.\\COM5");
        assert_eq!(normalize_port_name("com12"), "\\\\.\\com12");
        assert_eq!(normalize_port_name("/dev/ttyUSB0"), "/dev/ttyUSB0");
    }
}
