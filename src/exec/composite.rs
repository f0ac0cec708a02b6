//! Per-pixel blending for the in-process executor.
//!
//! Rasters are straight-alpha RGBA8 on disk and in `image::RgbaImage`; blending happens in
//! premultiplied space and converts back.

pub(crate) type PremulRgba8 = [u8; 4];

pub(crate) fn premultiply(px: [u8; 4]) -> PremulRgba8 {
    let a = u16::from(px[3]);
    [
        mul_div255(u16::from(px[0]), a),
        mul_div255(u16::from(px[1]), a),
        mul_div255(u16::from(px[2]), a),
        px[3],
    ]
}

pub(crate) fn unpremultiply(px: PremulRgba8) -> [u8; 4] {
    let a = u32::from(px[3]);
    if a == 0 {
        return [0, 0, 0, 0];
    }
    let un = |c: u8| ((u32::from(c) * 255 + a / 2) / a).min(255) as u8;
    [un(px[0]), un(px[1]), un(px[2]), px[3]]
}

/// Porter-Duff source-over on premultiplied pixels.
pub(crate) fn over(dst: PremulRgba8, src: PremulRgba8) -> PremulRgba8 {
    if src[3] == 0 {
        return dst;
    }
    if src[3] == 255 {
        return src;
    }

    let inv = 255u16 - u16::from(src[3]);
    let mut out = [0u8; 4];
    for i in 0..4 {
        out[i] = src[i].saturating_add(mul_div255(u16::from(dst[i]), inv));
    }
    out
}

/// Straight-alpha over: `src` on top of `dst`.
pub(crate) fn over_straight(dst: [u8; 4], src: [u8; 4]) -> [u8; 4] {
    if src[3] == 255 {
        return src;
    }
    if src[3] == 0 {
        return dst;
    }
    unpremultiply(over(premultiply(dst), premultiply(src)))
}

/// Flatten a straight-alpha pixel onto an opaque background.
pub(crate) fn flatten(px: [u8; 4], bg: [u8; 3]) -> [u8; 3] {
    let a = u16::from(px[3]);
    if a == 255 {
        return [px[0], px[1], px[2]];
    }
    let inv = 255u16 - a;
    let ch = |c: u8, b: u8| {
        mul_div255(u16::from(c), a).saturating_add(mul_div255(u16::from(b), inv))
    };
    [ch(px[0], bg[0]), ch(px[1], bg[1]), ch(px[2], bg[2])]
}

fn mul_div255(x: u16, y: u16) -> u8 {
    (((u32::from(x) * u32::from(y)) + 127) / 255) as u8
}
