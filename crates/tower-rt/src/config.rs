pub const ENV_PREFIX: &str = "TOWER";

pub fn env_key(section: &str, field: &str) -> String {
    format!("{ENV_PREFIX}_{}_{}", to_env_key(section), to_env_key(field))
}

pub fn env_override(section: &str, field: &str) -> Option<String> {
    std::env::var(env_key(section, field))
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn to_env_key(name: &str) -> String {
    let mut out = String::new();
    let mut prev_lower = false;
    for ch in name.chars() {
        if ch == '_' || ch == '-' || ch == '.' {
            if !out.is_empty() && !out.ends_with('_') {
                out.push('_');
            }
            prev_lower = false;
            continue;
        }
        if ch.is_ascii_uppercase() && prev_lower {
            out.push('_');
        }
        out.push(ch.to_ascii_uppercase());
        prev_lower = ch.is_ascii_lowercase() || ch.is_ascii_digit();
    }
    out
}
