//! HTML rendering for the index page

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image_cache::{CacheEntry, DEFAULT_CONTENT_TYPE};

const STYLE: &str = r#"
      body {
        font-family: Arial, sans-serif;
        max-width: 600px;
        margin: 50px auto;
        padding: 20px;
        background-color: #f5f5f5;
      }
      h1 {
        color: #333;
      }
      .container {
        background: white;
        padding: 20px;
        border-radius: 8px;
        box-shadow: 0 2px 4px rgba(0,0,0,0.1);
      }
      .container img {
        max-width: 100%;
        border-radius: 4px;
      }"#;

/// Render the index page, embedding the image when one is available
pub fn render_index(image: Option<&CacheEntry>) -> String {
    let body = match image {
        Some(entry) => format!(
            r#"<img src="{}" alt="Random image">"#,
            data_uri(&entry.content_type, &entry.blob)
        ),
        None => "<p class=\"loading\">Image is loading, refresh in a moment.</p>".to_string(),
    };

    format!(
        r#"<!DOCTYPE html>
<html>
  <head>
    <title>Todo App</title>
    <style>{STYLE}
    </style>
  </head>
  <body>
    <div class="container">
      <h1>Todo App</h1>
      {body}
      <p>Welcome to the Todo Application!</p>
    </div>
  </body>
</html>
"#
    )
}

/// `data:` URI for the given bytes
pub fn data_uri(content_type: &str, bytes: &[u8]) -> String {
    format!(
        "data:{};base64,{}",
        sanitize_mime(content_type),
        STANDARD.encode(bytes)
    )
}

/// Keep only the bare MIME type so it can sit inside an attribute
fn sanitize_mime(content_type: &str) -> &str {
    let mime = content_type.split(';').next().unwrap_or_default().trim();
    let valid = !mime.is_empty()
        && mime.contains('/')
        && mime
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '/' | '+' | '-' | '.'));

    if valid {
        mime
    } else {
        DEFAULT_CONTENT_TYPE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_render_with_image() {
        let entry = CacheEntry::new(
            b"hello".to_vec(),
            "image/png",
            "https://images.example.com/a.png",
            Utc::now(),
        );

        let html = render_index(Some(&entry));
        assert!(html.contains(r#"src="data:image/png;base64,aGVsbG8=""#));
        assert!(!html.contains("loading"));
    }

    #[test]
    fn test_render_loading() {
        let html = render_index(None);
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("loading"));
        assert!(!html.contains("<img"));
    }

    #[test]
    fn test_data_uri_strips_parameters() {
        assert_eq!(
            data_uri("image/jpeg; charset=binary", b"hi"),
            "data:image/jpeg;base64,aGk="
        );
    }

    #[test]
    fn test_data_uri_rejects_unsafe_mime() {
        assert_eq!(
            data_uri("image/png\" onerror=\"x", b""),
            "data:image/jpeg;base64,"
        );
        assert_eq!(data_uri("", b""), "data:image/jpeg;base64,");
    }
}
