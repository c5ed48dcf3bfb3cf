use image::{ImageBuffer, Luma};
use qrcode::render::svg;
use qrcode::{EcLevel, QrCode};

#[derive(thiserror::Error, Debug)]
pub enum QrGenerationError {
    #[error("QR code generation failed: {0}")]
    QrCodeError(#[from] qrcode::types::QrError),

    #[error("PNG encoding failed: {0}")]
    ImageError(#[from] image::ImageError),
}

/// Pixels per QR module in PNG output.
const MODULE_SIZE: u32 = 10;
/// Light modules around the symbol, as required by scanners.
const QUIET_ZONE: u32 = 4;

fn encode(data: &str) -> Result<QrCode, QrGenerationError> {
    Ok(QrCode::with_error_correction_level(data.as_bytes(), EcLevel::M)?)
}

/// Renders `data` (a share URL or ticket payload) as an SVG QR code.
pub fn generate_svg(data: &str) -> Result<String, QrGenerationError> {
    let code = encode(data)?;

    let svg = code
        .render::<svg::Color>()
        .min_dimensions(240, 240)
        .quiet_zone(true)
        .build();

    Ok(svg)
}

/// Renders `data` as a grayscale PNG.
pub fn generate_png(data: &str) -> Result<Vec<u8>, QrGenerationError> {
    let code = encode(data)?;
    let colors = code.to_colors();
    let width = code.width() as u32;
    let img_size = (width + QUIET_ZONE * 2) * MODULE_SIZE;

    let img = ImageBuffer::<Luma<u8>, Vec<u8>>::from_fn(img_size, img_size, |x, y| {
        let module_x = (x / MODULE_SIZE) as i64 - QUIET_ZONE as i64;
        let module_y = (y / MODULE_SIZE) as i64 - QUIET_ZONE as i64;
        let inside = (0..width as i64).contains(&module_x) && (0..width as i64).contains(&module_y);

        if inside && colors[(module_y as u32 * width + module_x as u32) as usize] == qrcode::types::Color::Dark {
            Luma([0u8])
        } else {
            Luma([255u8])
        }
    });

    let mut png_data = Vec::new();
    image::DynamicImage::ImageLuma8(img).write_to(
        &mut std::io::Cursor::new(&mut png_data),
        image::ImageOutputFormat::Png,
    )?;

    Ok(png_data)
}
