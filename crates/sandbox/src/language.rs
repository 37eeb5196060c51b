/// Languages the sandbox can run, as a closed mapping from lowercased
/// tag to the interpreter's one-shot invocation.
const LANGUAGE_COMMANDS: &[(&str, [&str; 2])] = &[
    ("python", ["python", "-c"]),
    ("bash", ["bash", "-c"]),
    ("sh", ["sh", "-c"]),
    ("node", ["node", "-e"]),
    ("javascript", ["node", "-e"]),
];

/// Return the argv prefix for a language tag, or None when the tag is
/// not supported. Matching is case-insensitive.
pub fn language_command(language: &str) -> Option<[&'static str; 2]> {
    let language = language.to_ascii_lowercase();
    LANGUAGE_COMMANDS
        .iter()
        .find(|(tag, _)| *tag == language)
        .map(|(_, argv)| *argv)
}

/// The supported language tags, in registration order, for error
/// messages.
pub fn supported_languages() -> Vec<&'static str> {
    LANGUAGE_COMMANDS.iter().map(|(tag, _)| *tag).collect()
}
