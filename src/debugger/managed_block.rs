//! Sentinel-delimited block inside a user-owned text file
//!
//! The block is always preceded by one newline separator when the file has
//! other content. The separator belongs to the block, so stripping returns
//! the user's bytes exactly, trailing newline or not.

/// First line of the managed block
pub const BLOCK_START: &str = "# START xcbridge managed block";
/// Last line of the managed block
pub const BLOCK_END: &str = "# END xcbridge managed block";

/// Content of `text` outside any managed block, byte for byte
///
/// Every block found is dropped along with the separator written before it.
/// An unterminated block runs to the end of the file.
pub fn strip_managed_block(text: &str) -> String {
    let mut outside = String::with_capacity(text.len());
    let mut inside = false;
    let mut separator_taken = false;

    for line in text.split_inclusive('\n') {
        let bare = line.trim_end_matches(['\n', '\r']);
        if inside {
            if bare == BLOCK_END {
                inside = false;
            }
            continue;
        }
        if bare == BLOCK_START {
            inside = true;
            if outside.ends_with('\n') {
                outside.pop();
                separator_taken = true;
            }
            continue;
        }
        // Lines after the block must not join the last line before it.
        if separator_taken && !outside.is_empty() && !outside.ends_with('\n') {
            outside.push('\n');
        }
        separator_taken = false;
        outside.push_str(line);
    }

    outside
}

/// Append a managed block holding `body` to `outside`
pub fn with_managed_block(outside: &str, body: &[String]) -> String {
    let mut text = String::from(outside);
    if !text.is_empty() {
        text.push('\n');
    }

    text.push_str(BLOCK_START);
    text.push('\n');
    for line in body {
        text.push_str(line);
        text.push('\n');
    }
    text.push_str(BLOCK_END);
    text.push('\n');
    text
}
