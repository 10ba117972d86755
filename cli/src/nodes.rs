//! Node list files.
//!
//! One URL per line. Blank lines and `#` comments are skipped, as is anything
//! that is not an `http://` or `https://` URL. Order and duplicates are kept.

use std::path::Path;

use anyhow::{Context, Result};

pub fn parse_nodes(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter(|line| {
            let ok = line.starts_with("http://") || line.starts_with("https://");
            if !ok {
                tracing::warn!(entry = line, "ignoring node list entry that is not an HTTP(S) URL");
            }
            ok
        })
        .map(str::to_string)
        .collect()
}

pub fn load_nodes(path: &Path) -> Result<Vec<String>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read node list {}", path.display()))?;
    let nodes = parse_nodes(&text);
    tracing::debug!(path = %path.display(), nodes = nodes.len(), "loaded node list");
    Ok(nodes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skips_comments_blanks_and_non_urls() {
        let text = "\
# main nodes
https://api.hive.blog

  http://127.0.0.1:8091  
#https://disabled.example
wss://ws.example
anyx.io
https://api.hive.blog
";
        assert_eq!(
            parse_nodes(text),
            vec![
                "https://api.hive.blog",
                "http://127.0.0.1:8091",
                "https://api.hive.blog",
            ]
        );
    }

    #[test]
    fn missing_file_is_an_error() {
        let err = load_nodes(Path::new("/definitely/not/here/nodes.conf")).unwrap_err();
        assert!(err.to_string().contains("nodes.conf"));
    }
}
