/// Greedy word wrap against a pixel width. Words are never split; a word wider
/// than `max_width` gets a line of its own. CJK ideographs and kana wrap per
/// character, and `\n` always starts a new line.
pub(crate) fn wrap_text(text: &str, max_width: f32, measure: &dyn Fn(&str) -> f32) -> Vec<String> {
    if text.trim().is_empty() {
        return Vec::new();
    }
    let tokens = tokenize_text(text);
    wrap_tokens(&tokens, max_width, measure)
}

fn wrap_tokens(tokens: &[String], max_width: f32, measure: &dyn Fn(&str) -> f32) -> Vec<String> {
    let space_width = measure(" ");
    let mut result = Vec::new();
    let mut current = String::new();
    let mut width = 0.0;

    for token in tokens {
        if token == "\n" {
            if !current.trim().is_empty() {
                result.push(current.trim_end().to_string());
            }
            current.clear();
            width = 0.0;
            continue;
        }
        if token == " " {
            if !current.ends_with(' ') && !current.is_empty() {
                current.push(' ');
                width += space_width;
            }
            continue;
        }
        let token_width = measure(token);
        if width + token_width > max_width && !current.trim().is_empty() {
            result.push(current.trim_end().to_string());
            current.clear();
            width = 0.0;
        }
        current.push_str(token);
        width += token_width;
    }

    if !current.trim().is_empty() {
        result.push(current.trim_end().to_string());
    }
    result
}

fn is_cjk(ch: char) -> bool {
    matches!(
        ch as u32,
        0x4E00..=0x9FFF | 0x3400..=0x4DBF | 0x3040..=0x30FF | 0x31F0..=0x31FF
    )
}

fn tokenize_text(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();

    for ch in text.chars() {
        if ch == '\n' || ch.is_whitespace() || is_cjk(ch) {
            if !current.is_empty() {
                tokens.push(std::mem::take(&mut current));
            }
            let token = match ch {
                '\n' => "\n".to_string(),
                _ if ch.is_whitespace() => " ".to_string(),
                _ => ch.to_string(),
            };
            tokens.push(token);
            continue;
        }
        current.push(ch);
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}
