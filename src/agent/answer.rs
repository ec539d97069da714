//! Final answer extraction from the model's last reply.

/// Extract the answer from the model's final message.
///
/// Reasoning models emit their chain of thought before `delimiter`; only the
/// text after its last occurrence is kept. A leading `prefix` such as
/// `FINAL ANSWER:` is stripped case-insensitively.
pub fn extract_answer(content: &str, delimiter: &str, prefix: Option<&str>) -> String {
    let after = if delimiter.is_empty() {
        content
    } else {
        content
            .rsplit_once(delimiter)
            .map(|(_, tail)| tail)
            .unwrap_or(content)
    };
    let answer = after.trim();

    if let Some(prefix) = prefix.filter(|p| !p.is_empty()) {
        if let Some(head) = answer.get(..prefix.len()) {
            if head.eq_ignore_ascii_case(prefix) {
                return answer[prefix.len()..].trim().to_string();
            }
        }
    }

    answer.to_string()
}
