//! QR payload rendering — PNG bytes for the HTTP API, Unicode blocks
//! for the terminal flow.

use wagate_core::error::GatewayError;

/// Render a QR payload as PNG image bytes.
pub fn qr_png(payload: &str) -> Result<Vec<u8>, GatewayError> {
    use image::{ImageBuffer, Luma};
    use qrcode::{Color, EcLevel, QrCode};

    let code = QrCode::with_error_correction_level(payload.as_bytes(), EcLevel::L)
        .map_err(|e| GatewayError::Client(format!("QR encoding failed: {e}")))?;

    let module_px: u32 = 10;
    let quiet: u32 = 2;
    let modules = code.width() as u32;
    let size = (modules + quiet * 2) * module_px;

    let img = ImageBuffer::from_fn(size, size, |x, y| {
        let mx = (x / module_px).saturating_sub(quiet);
        let my = (y / module_px).saturating_sub(quiet);
        let in_quiet_zone =
            x / module_px < quiet || y / module_px < quiet || mx >= modules || my >= modules;
        if in_quiet_zone {
            Luma([255u8])
        } else {
            match code[(mx as usize, my as usize)] {
                Color::Dark => Luma([0u8]),
                Color::Light => Luma([255u8]),
            }
        }
    });

    let mut buf = std::io::Cursor::new(Vec::new());
    img.write_to(&mut buf, image::ImageFormat::Png)
        .map_err(|e| GatewayError::Client(format!("PNG encoding failed: {e}")))?;

    Ok(buf.into_inner())
}

/// Render a QR payload for terminal display, two modules per text row.
pub fn qr_terminal(payload: &str) -> Result<String, GatewayError> {
    let code = qrcode::QrCode::new(payload.as_bytes())
        .map_err(|e| GatewayError::Client(format!("QR encoding failed: {e}")))?;

    Ok(code
        .render::<qrcode::render::unicode::Dense1x2>()
        .quiet_zone(true)
        .build())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_qr_png_has_png_magic() {
        let png = qr_png("2@abcdefgh,ijklmnop,qrstuvwx").unwrap();
        assert_eq!(&png[..4], &[0x89, 0x50, 0x4E, 0x47]);
    }

    #[test]
    fn test_qr_terminal_nonempty() {
        let rendered = qr_terminal("2@abcdefgh,ijklmnop,qrstuvwx").unwrap();
        assert!(!rendered.is_empty());
        assert!(rendered.contains('\n'));
    }
}
