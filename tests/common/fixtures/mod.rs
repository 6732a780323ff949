//! Sample data used across the HTTP tests.

pub const EMAIL: &str = "jane@example.com";

pub const BOUNDARY: &str = "dermalens-test-boundary";

/// JPEG magic followed by filler, enough for type sniffing.
pub const JPEG_BYTES: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F'];

/// What the vision model answers for a face with mild acne.
pub const DIAGNOSIS: &str = "## Skin Conditions Detected
Moderate acne on the forehead and chin, with some redness around active spots.

## Skin Type
Oily skin, especially in the T-zone.

## Recommendations
Use a gentle cleanser, a niacinamide serum and salicylic acid twice a week.

## Expected Timeline
Visible improvement in 6-8 weeks.

## Precautions
- Avoid harsh physical scrubs
- Patch test new products
";

/// A multipart body with a single `file` part.
pub fn multipart(file_name: &str, content_type: &str, bytes: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\n",
            file_name
        )
        .as_bytes(),
    );
    body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", content_type).as_bytes());
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());
    body
}

pub fn multipart_content_type() -> String {
    format!("multipart/form-data; boundary={}", BOUNDARY)
}
