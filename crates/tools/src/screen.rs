//! Screenshot capture shared by the action tool and task setup.

use screenpilot_core::computer::{ComputerProvider, UploadRequest};
use screenpilot_core::error::ComputerError;
use screenpilot_core::message::ImageSource;
use tracing::debug;

/// Take a screenshot and, when `upload` is set and the provider supports it,
/// swap the inline data for a hosted URL.
pub async fn capture_screen(
    computer: &dyn ComputerProvider,
    session_id: &str,
    step: u32,
    upload: bool,
) -> Result<ImageSource, ComputerError> {
    let base64 = computer.take_screenshot(session_id).await?;
    if !upload {
        return Ok(ImageSource::png(base64));
    }

    let request = UploadRequest {
        base64: base64.clone(),
        session_id: session_id.to_string(),
        step,
    };
    match computer.upload_screenshot(request).await? {
        Some(url) => {
            debug!(session_id, step, %url, "Uploaded screenshot");
            Ok(ImageSource::Url(url))
        }
        None => Ok(ImageSource::png(base64)),
    }
}
