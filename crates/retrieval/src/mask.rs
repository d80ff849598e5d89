/// Shortened form of a sensitive value for log lines: `ab***yz`.
/// Values of four characters or fewer are returned unchanged.
pub fn masked(value: &str) -> String {
    let count = value.chars().count();
    if count <= 4 {
        return value.to_string();
    }
    let head: String = value.chars().take(2).collect();
    let tail: String = value.chars().skip(count - 2).collect();
    format!("{head}***{tail}")
}
