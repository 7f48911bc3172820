use std::io::Cursor;

use image::{ImageFormat, Rgb, RgbImage};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use studio_contracts::{Category, ImageData};

use super::{ContentRequest, ContentResponse, ContentTransport, RemoteFailure};

const DRYRUN_IMAGE_SIDE: u32 = 64;

/// Offline transport: answers every request shape deterministically from a
/// hash of the prompt, so the full wizard can run without credentials.
#[derive(Debug, Clone, Copy, Default)]
pub struct DryrunTransport;

impl ContentTransport for DryrunTransport {
    fn name(&self) -> &str {
        "dryrun"
    }

    fn generate_content(&self, request: &ContentRequest) -> Result<ContentResponse, RemoteFailure> {
        let prompt = request.prompt_text();
        let tag = short_id(&prompt);

        if request.response_image {
            let image = render_dryrun_image(&prompt)?;
            return Ok(ContentResponse::new(json!({
                "candidates": [{
                    "content": { "parts": [
                        { "text": format!("dryrun editorial {tag}") },
                        { "inlineData": { "mimeType": image.mime_type(), "data": image.to_base64() } }
                    ]}
                }]
            })));
        }

        let text = if request.response_json_array {
            let keywords: Vec<Value> = Category::ALL
                .iter()
                .map(|category| Value::String(format!("{} {tag}", category.fallback_keyword())))
                .collect();
            Value::Array(keywords).to_string()
        } else {
            format!(
                "[dryrun {tag}] {} ({} image input(s)).",
                first_line(&prompt),
                request.image_count()
            )
        };
        Ok(ContentResponse::new(json!({
            "candidates": [{ "content": { "parts": [{ "text": text }] } }]
        })))
    }
}

fn render_dryrun_image(prompt: &str) -> Result<ImageData, RemoteFailure> {
    let (r, g, b) = color_from_prompt(prompt);
    let mut image = RgbImage::new(DRYRUN_IMAGE_SIDE, DRYRUN_IMAGE_SIDE);
    for pixel in image.pixels_mut() {
        *pixel = Rgb([r, g, b]);
    }
    let mut encoded = Cursor::new(Vec::new());
    image
        .write_to(&mut encoded, ImageFormat::Png)
        .map_err(|err| RemoteFailure::message(format!("dryrun image encode failed: {err}")))?;
    Ok(ImageData::new(encoded.into_inner(), "image/png"))
}

fn color_from_prompt(prompt: &str) -> (u8, u8, u8) {
    let digest = Sha256::digest(prompt.as_bytes());
    (digest[0], digest[1], digest[2])
}

fn short_id(prompt: &str) -> String {
    let digest = Sha256::digest(prompt.as_bytes());
    hex::encode(&digest[..4])
}

fn first_line(text: &str) -> String {
    let line = text.lines().find(|line| !line.trim().is_empty()).unwrap_or("");
    line.chars().take(80).collect()
}
