/// Collapse runs of whitespace and trim. With `prevent_shouting`, text that is
/// entirely upper case is lowered and then sentence-cased.
pub fn clean_sentence(input: &str, prevent_shouting: bool) -> String {
    let collapsed = input.split_whitespace().collect::<Vec<_>>().join(" ");

    if !prevent_shouting || !is_shouting(&collapsed) {
        return collapsed;
    }

    let lowered = collapsed.to_lowercase();
    let mut chars = lowered.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn is_shouting(text: &str) -> bool {
    let mut saw_letter = false;
    for ch in text.chars().filter(|ch| ch.is_alphabetic()) {
        saw_letter = true;
        if ch.is_lowercase() {
            return false;
        }
    }
    saw_letter
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collapses_whitespace() {
        assert_eq!(clean_sentence("  How   do\tI\nfix this? ", true), "How do I fix this?");
    }

    #[test]
    fn lowers_shouted_titles() {
        assert_eq!(clean_sentence("WHY IS THIS BROKEN", true), "Why is this broken");
    }

    #[test]
    fn keeps_mixed_case_and_numbers() {
        assert_eq!(clean_sentence("Rust 2024 on ARM", true), "Rust 2024 on ARM");
        assert_eq!(clean_sentence("1234", true), "1234");
    }

    #[test]
    fn leaves_shouting_alone_when_disabled() {
        assert_eq!(clean_sentence("LOUD", false), "LOUD");
    }
}
