//! Grayscale raster helpers shared by the detector and the extractor.

/// Bilinear resize of an 8-bit grayscale buffer.
pub(crate) fn resize_bilinear(
    src: &[u8],
    src_w: usize,
    src_h: usize,
    dst_w: usize,
    dst_h: usize,
) -> Vec<u8> {
    let mut dst = vec![0u8; dst_w * dst_h];
    if src_w == 0 || src_h == 0 || dst_w == 0 || dst_h == 0 {
        return dst;
    }

    let sx = src_w as f32 / dst_w as f32;
    let sy = src_h as f32 / dst_h as f32;

    for y in 0..dst_h {
        let fy = (y as f32 + 0.5) * sy - 0.5;
        let y0 = (fy.floor() as i32).clamp(0, src_h as i32 - 1) as usize;
        let y1 = (y0 + 1).min(src_h - 1);
        let wy = (fy - fy.floor()).clamp(0.0, 1.0);

        for x in 0..dst_w {
            let fx = (x as f32 + 0.5) * sx - 0.5;
            let x0 = (fx.floor() as i32).clamp(0, src_w as i32 - 1) as usize;
            let x1 = (x0 + 1).min(src_w - 1);
            let wx = (fx - fx.floor()).clamp(0.0, 1.0);

            let tl = src[y0 * src_w + x0] as f32;
            let tr = src[y0 * src_w + x1] as f32;
            let bl = src[y1 * src_w + x0] as f32;
            let br = src[y1 * src_w + x1] as f32;

            let top = tl + (tr - tl) * wx;
            let bottom = bl + (br - bl) * wx;
            let v = top + (bottom - top) * wy;

            dst[y * dst_w + x] = v.round().clamp(0.0, 255.0) as u8;
        }
    }

    dst
}

/// Crop a rectangle out of a grayscale buffer, clamping to the frame bounds.
/// Pixels requested outside the frame are filled with 0.
pub(crate) fn crop(
    src: &[u8],
    src_w: usize,
    src_h: usize,
    x: i32,
    y: i32,
    w: usize,
    h: usize,
) -> Vec<u8> {
    let mut out = vec![0u8; w * h];
    for row in 0..h {
        let sy = y + row as i32;
        if sy < 0 || sy >= src_h as i32 {
            continue;
        }
        for col in 0..w {
            let sx = x + col as i32;
            if sx < 0 || sx >= src_w as i32 {
                continue;
            }
            out[row * w + col] = src[sy as usize * src_w + sx as usize];
        }
    }
    out
}
