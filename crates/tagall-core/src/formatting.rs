//! Telegram HTML helpers.

/// Escape HTML special characters for Telegram HTML parse mode.
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Clickable mention for a user without a public handle.
pub fn mention_link(user_id: i64, name: &str) -> String {
    format!(
        "<a href=\"tg://user?id={user_id}\">{}</a>",
        escape_html(name)
    )
}

/// `1. first\n2. second` rendering used by list replies.
pub fn numbered_lines<I, S>(items: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    items
        .into_iter()
        .enumerate()
        .map(|(i, s)| format!("{}. {}", i + 1, s.as_ref()))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_html_escapes_markup() {
        assert_eq!(
            escape_html("<b>Tom & \"Jerry\"</b>"),
            "&lt;b&gt;Tom &amp; &quot;Jerry&quot;&lt;/b&gt;"
        );
    }

    #[test]
    fn mention_link_escapes_name() {
        assert_eq!(
            mention_link(42, "A<B"),
            "<a href=\"tg://user?id=42\">A&lt;B</a>"
        );
    }

    #[test]
    fn numbered_lines_start_at_one() {
        assert_eq!(numbered_lines(["@a", "@b"]), "1. @a\n2. @b");
        assert_eq!(numbered_lines(Vec::<String>::new()), "");
    }
}
