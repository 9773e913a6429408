//! Landing page served at `/s/{id}`

use secret_protocol::ShareId;

/// Render the informational landing page.
///
/// The page never sees the key: a small script reads `location.href` in
/// the browser so the receive command shown includes the fragment.
pub(crate) fn render(id: &ShareId, filename: Option<&str>) -> String {
    let is_file = filename.is_some();
    let mode = if is_file { "file" } else { "text" };
    let what = match filename {
        Some(name) => format!("the file <strong>{}</strong>", escape_html(name)),
        None => "a text secret".to_string(),
    };

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<meta name="referrer" content="no-referrer">
<title>send-secret</title>
<style>
body {{ font-family: system-ui, sans-serif; max-width: 40rem; margin: 4rem auto; padding: 0 1rem; color: #222; }}
code {{ display: block; padding: .75rem; background: #f3f3f3; border-radius: 6px; word-break: break-all; }}
.note {{ color: #666; font-size: .9rem; }}
</style>
</head>
<body data-share-id="{id}" data-mode="{mode}">
<h1>send-secret</h1>
<p>Someone shared {what} with you. It is end-to-end encrypted and can only be retrieved a limited number of times.</p>
<p>Retrieve it from a terminal:</p>
<code id="cmd">send-secret receive &lt;this page's full URL&gt;</code>
<p class="note">The decryption key is in the part of the link after <em>#</em>. It never reaches this server.</p>
<script>
const shareId = "{id}";
const isFile = {is_file};
document.getElementById("cmd").textContent = "send-secret receive '" + location.href + "'";
</script>
</body>
</html>
"#
    )
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_mode_markers() {
        let id = ShareId::generate();
        let html = render(&id, Some("test.txt"));

        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("test.txt"));
        assert!(html.contains("isFile = true"));
        assert!(html.contains(r#"data-mode="file""#));
        assert!(html.contains(id.as_str()));
    }

    #[test]
    fn test_text_mode_markers() {
        let html = render(&ShareId::generate(), None);
        assert!(html.contains("isFile = false"));
        assert!(html.contains(r#"data-mode="text""#));
    }

    #[test]
    fn test_filename_is_escaped() {
        let html = render(&ShareId::generate(), Some("<script>alert(1)</script>.txt"));
        assert!(!html.contains("<script>alert(1)"));
        assert!(html.contains("&lt;script&gt;"));
    }
}
