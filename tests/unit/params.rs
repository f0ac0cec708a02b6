use super::*;

fn target(w: u32, h: u32) -> TargetSize {
    TargetSize::new(w, h).unwrap()
}

#[test]
fn tone_signed_values_subtract_nominal() {
    let tone = ToneAdjust {
        brightness: 80.0,
        contrast: 125.0,
    };
    assert_eq!(tone.signed(), (-20.0, 25.0));
    assert_eq!(ToneAdjust::NEUTRAL.signed(), (0.0, 0.0));
}

#[test]
fn overlay_larger_than_dimension_cap_is_rejected() {
    let mut placement = OverlayPlacement::new(Overlay::MensUniversityUniform);
    placement.scale_x = 1000.0;
    placement.scale_y = 1000.0;
    assert!(placement.validate().is_ok());

    let params = RenderParams::new(target(MAX_DIMENSION, MAX_DIMENSION)).with_overlay(placement);
    assert_eq!(params.validate().unwrap_err().kind(), "invalid_params");

    // The same scale is fine on a small target.
    let params = RenderParams::new(target(100, 100)).with_overlay(placement);
    assert!(params.validate().is_ok());
    assert_eq!(placement.pixel_size(target(100, 100)), (1000, 1000));
}

#[test]
fn tone_outside_domain_is_rejected() {
    let tone = ToneAdjust {
        brightness: 250.0,
        contrast: 100.0,
    };
    assert_eq!(tone.validate().unwrap_err().kind(), "invalid_params");
}

#[test]
fn overlay_size_scales_axes_independently() {
    let t = target(1000, 1200);
    let mut p = OverlayPlacement::new(Overlay::ManSuit);
    assert_eq!(p.pixel_size(t), (1000, 1200));

    p.scale_x = 50.0;
    assert_eq!(p.pixel_size(t), (500, 1200));
    p.scale_y = 150.0;
    assert_eq!(p.pixel_size(t), (500, 1800));
    p.scale_x = 75.0;
    assert_eq!(p.pixel_size(t).1, 1800);
}

#[test]
fn overlay_size_is_floored_at_one_pixel() {
    let mut p = OverlayPlacement::new(Overlay::WomenSuit);
    p.scale_x = 0.001;
    p.scale_y = 0.001;
    assert_eq!(p.pixel_size(target(10, 10)), (1, 1));
}

#[test]
fn overlay_offset_is_percent_of_target() {
    let t = target(600, 400);
    let mut p = OverlayPlacement::new(Overlay::ManSuit);
    p.offset_x = 10.0;
    p.offset_y = -25.0;
    let off = p.pixel_offset(t);
    assert_eq!((off.x, off.y), (60, -100));
    assert_eq!(off.to_geometry(), "+60-100");
}

#[test]
fn overlay_offset_shift_is_translation_equivariant() {
    let t = target(1000, 1000);
    let mut p = OverlayPlacement::new(Overlay::ManSuit);
    p.offset_x = 3.0;
    let before = p.pixel_offset(t).x;
    p.offset_x += 4.5;
    let after = p.pixel_offset(t).x;
    assert_eq!(after - before, 45);
}

#[test]
fn overlay_validation_rejects_non_finite_and_non_positive_scale() {
    let mut p = OverlayPlacement::new(Overlay::ManSuit);
    p.scale_x = 0.0;
    assert!(p.validate().is_err());
    p.scale_x = 100.0;
    p.offset_y = f64::INFINITY;
    assert!(p.validate().is_err());
}

#[test]
fn params_validate_covers_every_field() {
    let ok = RenderParams::new(target(300, 400))
        .with_background(HexColor::parse("#000000").unwrap())
        .with_overlay(OverlayPlacement::new(Overlay::MensUniversityUniform));
    assert!(ok.validate().is_ok());

    let bad_crop = ok.clone().with_crop(CropRect {
        x: 0.0,
        y: 0.0,
        width: 101.0,
        height: 100.0,
    });
    assert!(bad_crop.validate().is_err());

    let bad_target = RenderParams::new(TargetSize {
        width: 0,
        height: 10,
    });
    assert_eq!(bad_target.validate().unwrap_err().kind(), "invalid_size");
}
