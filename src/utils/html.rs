use ammonia;

/// Clean user-supplied text using the ammonia library.
///
/// Whitelist-based sanitization: safe tags (like <b>, <p>) survive, dangerous
/// tags (like <script>, <iframe>) and attributes (like onclick) are stripped.
/// Applied at write time to post content, comment text and bios, so stored
/// documents are safe to render directly.
pub fn clean_html(input: &str) -> String {
    ammonia::clean(input)
}
