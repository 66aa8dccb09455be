//! Island stylesheet processing.

use lightningcss::stylesheet::{MinifyOptions, ParserOptions, PrinterOptions, StyleSheet};

/// Concatenate stylesheet chunks in order and print them through
/// lightningcss (minified when asked). Empty input yields `None`.
pub fn process_styles(chunks: &[String], minify: bool) -> Result<Option<String>, String> {
    let css = chunks
        .iter()
        .map(|c| c.trim())
        .filter(|c| !c.is_empty())
        .collect::<Vec<_>>()
        .join("\n");
    if css.is_empty() {
        return Ok(None);
    }

    let mut stylesheet = StyleSheet::parse(&css, ParserOptions::default())
        .map_err(|e| format!("CSS parse error: {}", e))?;

    if minify {
        stylesheet
            .minify(MinifyOptions::default())
            .map_err(|e| format!("CSS minify error: {}", e))?;
    }

    let result = stylesheet
        .to_css(PrinterOptions {
            minify,
            ..Default::default()
        })
        .map_err(|e| format!("CSS print error: {}", e))?;

    Ok(Some(result.code))
}
