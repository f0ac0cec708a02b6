use super::*;

#[test]
fn target_size_parses_widthxheight() {
    assert_eq!(
        TargetSize::parse(" 640x480 ").unwrap(),
        TargetSize {
            width: 640,
            height: 480
        }
    );
    assert_eq!(TargetSize::parse("12X34").unwrap().to_string(), "12x34");
}

#[test]
fn target_size_rejects_garbage_and_zero() {
    for bad in ["", "x", "100x", "x100", "10x-5", "abc", "0x10", "1.5x2", "10x10x10"] {
        let err = TargetSize::parse(bad).unwrap_err();
        assert_eq!(err.kind(), "invalid_size", "input {bad:?}");
    }
    assert!(TargetSize::parse("99999x10").is_err());
}

#[test]
fn hex_color_normalizes_hash_and_case() {
    assert_eq!(HexColor::parse("#ff0000").unwrap().digits(), "FF0000");
    assert_eq!(HexColor::parse("00ff00").unwrap().to_executor_arg(), "#00FF00");
    assert_eq!(HexColor::parse("").unwrap(), HexColor::white());
    assert_eq!(HexColor::parse("#1a2b3c").unwrap().rgb(), [0x1a, 0x2b, 0x3c]);
    assert!(HexColor::parse("#12345").is_err());
    assert!(HexColor::parse("zzzzzz").is_err());
}

#[test]
fn hex_color_serde_roundtrips_through_string() {
    let c: HexColor = serde_json::from_str("\"#abcdef\"").unwrap();
    assert_eq!(serde_json::to_string(&c).unwrap(), "\"ABCDEF\"");
    assert!(serde_json::from_str::<HexColor>("\"nothex\"").is_err());
}

#[test]
fn crop_geometry_uses_percent_syntax() {
    assert_eq!(CropRect::FULL.to_geometry(), "100%x100%+0%+0%");
    let c = CropRect {
        x: 12.5,
        y: 5.0,
        width: 50.0,
        height: 75.25,
    };
    assert_eq!(c.to_geometry(), "50%x75.25%+12.5%+5%");
}

#[test]
fn crop_validation_rejects_out_of_range() {
    assert!(CropRect::FULL.validate().is_ok());
    let mut c = CropRect::FULL;
    c.width = 120.0;
    assert!(c.validate().is_err());
    c = CropRect::FULL;
    c.x = -1.0;
    assert!(c.validate().is_err());
    c = CropRect {
        x: 60.0,
        y: 0.0,
        width: 50.0,
        height: 100.0,
    };
    assert!(c.validate().is_err());
    c.width = 0.0;
    assert!(c.validate().is_err());
    c = CropRect::FULL;
    c.height = f64::NAN;
    assert!(c.validate().is_err());
}

#[test]
fn crop_pixels_reference_source_dimensions() {
    let c = CropRect {
        x: 25.0,
        y: 10.0,
        width: 50.0,
        height: 80.0,
    };
    let r = c.to_pixels(200, 100);
    assert_eq!((r.x0, r.y0, r.width(), r.height()), (50.0, 10.0, 100.0, 80.0));

    let full = CropRect::FULL.to_pixels(7, 3);
    assert_eq!((full.width(), full.height()), (7.0, 3.0));
}

#[test]
fn crop_pixels_keep_at_least_one_pixel() {
    let c = CropRect {
        x: 99.9,
        y: 99.9,
        width: 0.1,
        height: 0.1,
    };
    let r = c.to_pixels(10, 10);
    assert!(r.width() >= 1.0 && r.height() >= 1.0);
    assert!(r.x1 <= 10.0 && r.y1 <= 10.0);
}

#[test]
fn pixel_offset_geometry_signs() {
    assert_eq!(PixelOffset { x: 0, y: 5 }.to_geometry(), "+0+5");
    assert_eq!(PixelOffset { x: -12, y: 3 }.to_geometry(), "-12+3");
    assert_eq!(PixelOffset { x: 4, y: -9 }.to_geometry(), "+4-9");
}
