use image::{GrayImage, Luma};
use qrcode::{Color, QrCode};

const QUIET_ZONE: u32 = 4;

/// Encodes `data` as a QR code and rasterizes it to an 8-bit grayscale image,
/// `module_px` pixels per module with a four-module quiet zone.
pub fn rasterize(data: &str, module_px: u32) -> Result<GrayImage, qrcode::types::QrError> {
    let code = QrCode::new(data.as_bytes())?;
    let modules = code.width() as u32;
    let colors = code.to_colors();
    let module_px = module_px.max(1);
    let side = (modules + 2 * QUIET_ZONE) * module_px;

    Ok(GrayImage::from_fn(side, side, |x, y| {
        let mx = (x / module_px) as i64 - QUIET_ZONE as i64;
        let my = (y / module_px) as i64 - QUIET_ZONE as i64;
        let inside = (0..modules as i64).contains(&mx) && (0..modules as i64).contains(&my);
        if inside && colors[(my as u32 * modules + mx as u32) as usize] == Color::Dark {
            Luma([0u8])
        } else {
            Luma([255u8])
        }
    }))
}
