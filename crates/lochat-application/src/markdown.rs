//! Code-fence normalization for finalized assistant messages.
//!
//! Models frequently emit fences with the language tag glued to the
//! opening backticks or floating on the first code line. This rewrites
//! every block to the canonical ````` ```lang\ncode\n``` ````` shape so
//! downstream rendering is consistent.

/// Normalizes fenced code blocks in `text`.
///
/// A first code line containing a single word is treated as the language
/// tag. An unterminated trailing block is kept (re-opened, not dropped).
pub fn normalize_code_blocks(text: &str) -> String {
    let mut in_code_block = false;
    let mut code_lines: Vec<&str> = Vec::new();
    let mut output: Vec<String> = Vec::new();

    for line in text.split('\n') {
        if line.starts_with("```") {
            if in_code_block {
                // End of code block
                let first = code_lines.first().map(|l| l.trim()).unwrap_or("");
                let (language, code) = if !first.is_empty() && !first.contains(' ') {
                    (first.to_string(), code_lines[1..].join("\n"))
                } else {
                    (String::new(), code_lines.join("\n"))
                };
                output.push(format!("```{}\n{}\n```", language, code));
                code_lines.clear();
                in_code_block = false;
            } else {
                in_code_block = true;
                let language = line[3..].trim();
                if !language.is_empty() {
                    code_lines.push(language);
                }
            }
        } else if in_code_block {
            code_lines.push(line);
        } else {
            output.push(line.to_string());
        }
    }

    if in_code_block {
        // Streaming can end mid-block; keep the partial content visible.
        output.push(format!("```\n{}", code_lines.join("\n")));
    }

    output.join("\n")
}
